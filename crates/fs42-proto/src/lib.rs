pub mod config;
pub mod platform;
pub mod protocol;
pub mod schedule;

pub use protocol::{BumpFile, Channel, EmptyFolderMap, StationConf};
pub use schedule::{Day, Grid, Hour, Schedule, Slot, SlotAddr};
