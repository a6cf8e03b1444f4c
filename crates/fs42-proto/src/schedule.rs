//! Weekly schedule grid: 7 days × 24 hours of optional slots.
//!
//! ## Wire format
//!
//! ```json
//! {
//!   "schedule":   { "monday": { "0": { "tags": ["intro"] }, "14": {} } },
//!   "tags":       ["intro", "movies"],
//!   "tag_colors": { "intro": "#ff8800" }
//! }
//! ```
//!
//! The grid is sparse. A missing `(day, hour)` is unscheduled, `{}` is an
//! explicit off-air slot.

use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlotAddrError {
    #[error("day {0} is outside 0..=6")]
    DayOutOfRange(i64),
    #[error("hour {0} is outside 0..=23")]
    HourOutOfRange(i64),
    #[error("unrecognised day {0:?}")]
    UnknownDay(String),
    #[error("unrecognised hour {0:?}")]
    UnknownHour(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Day {
    pub const ALL: [Day; 7] = [
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
        Day::Saturday,
        Day::Sunday,
    ];

    /// 0 = Monday … 6 = Sunday.
    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(idx: u8) -> Option<Day> {
        Self::ALL.get(idx as usize).copied()
    }

    /// Lowercase weekday name used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Day::Monday => "monday",
            Day::Tuesday => "tuesday",
            Day::Wednesday => "wednesday",
            Day::Thursday => "thursday",
            Day::Friday => "friday",
            Day::Saturday => "saturday",
            Day::Sunday => "sunday",
        }
    }
}

impl TryFrom<i64> for Day {
    type Error = SlotAddrError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .ok()
            .and_then(Day::from_index)
            .ok_or(SlotAddrError::DayOutOfRange(value))
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts a weekday name (any case, `mon` prefixes included) or an index.
impl FromStr for Day {
    type Err = SlotAddrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(idx) = s.parse::<i64>() {
            return Day::try_from(idx);
        }
        let lower = s.to_ascii_lowercase();
        if lower.len() >= 3 {
            if let Some(day) = Self::ALL.iter().find(|d| d.as_str().starts_with(&lower)) {
                return Ok(*day);
            }
        }
        Err(SlotAddrError::UnknownDay(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hour(u8);

impl Hour {
    pub fn new(hour: u8) -> Option<Hour> {
        (hour < 24).then_some(Hour(hour))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = Hour> {
        (0..24).map(Hour)
    }
}

impl TryFrom<i64> for Hour {
    type Error = SlotAddrError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .ok()
            .and_then(Hour::new)
            .ok_or(SlotAddrError::HourOutOfRange(value))
    }
}

impl fmt::Display for Hour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Hour {
    type Err = SlotAddrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let n: i64 = s
            .trim()
            .parse()
            .map_err(|_| SlotAddrError::UnknownHour(s.to_string()))?;
        Hour::try_from(n)
    }
}

/// Position of a slot in the week. Slots have no other identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotAddr {
    pub day: Day,
    pub hour: Hour,
}

impl SlotAddr {
    pub fn new(day: Day, hour: Hour) -> Self {
        Self { day, hour }
    }

    /// Validate raw integers, e.g. from a command line.
    pub fn from_indices(day: i64, hour: i64) -> Result<Self, SlotAddrError> {
        Ok(Self {
            day: Day::try_from(day)?,
            hour: Hour::try_from(hour)?,
        })
    }
}

impl fmt::Display for SlotAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:02}:00", self.day, self.hour.0)
    }
}

/// One scheduled item.
///
/// `tags` carries the tag reference (the backend writes a single-element
/// list). Keys we do not know about are kept in `extra` and sent back as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Slot {
    pub fn tagged(tag: impl Into<String>) -> Self {
        Self {
            tags: vec![tag.into()],
            ..Self::default()
        }
    }

    pub fn off_air() -> Self {
        Self::default()
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn tag(&self) -> Option<&str> {
        self.tags.first().map(String::as_str)
    }

    pub fn is_off_air(&self) -> bool {
        self.tags.is_empty() && self.content.is_none()
    }
}

/// Sparse `(day, hour) → Slot` map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid(BTreeMap<SlotAddr, Slot>);

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, addr: SlotAddr) -> Option<&Slot> {
        self.0.get(&addr)
    }

    /// Replace whatever sits at `addr`.
    pub fn set(&mut self, addr: SlotAddr, slot: Slot) -> Option<Slot> {
        self.0.insert(addr, slot)
    }

    pub fn remove(&mut self, addr: SlotAddr) -> Option<Slot> {
        self.0.remove(&addr)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SlotAddr, &Slot)> {
        self.0.iter().map(|(a, s)| (*a, s))
    }

    pub fn day(&self, day: Day) -> impl Iterator<Item = (Hour, &Slot)> {
        self.0
            .range(SlotAddr::new(day, Hour(0))..=SlotAddr::new(day, Hour(23)))
            .map(|(a, s)| (a.hour, s))
    }
}

impl FromIterator<(SlotAddr, Slot)> for Grid {
    fn from_iter<I: IntoIterator<Item = (SlotAddr, Slot)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

struct DaySlots<'a>(Vec<(Hour, &'a Slot)>);

impl Serialize for DaySlots<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (hour, slot) in &self.0 {
            map.serialize_entry(&hour.to_string(), slot)?;
        }
        map.end()
    }
}

impl Serialize for Grid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut days: BTreeMap<Day, DaySlots<'_>> = BTreeMap::new();
        for (addr, slot) in &self.0 {
            days.entry(addr.day)
                .or_insert_with(|| DaySlots(Vec::new()))
                .0
                .push((addr.hour, slot));
        }
        days.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Grid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<BTreeMap<Day, Option<BTreeMap<String, Slot>>>>::deserialize(deserializer)?;
        let mut grid = Grid::new();
        for (day, hours) in raw.unwrap_or_default() {
            for (key, slot) in hours.unwrap_or_default() {
                let hour: Hour = key.parse().map_err(D::Error::custom)?;
                grid.set(SlotAddr::new(day, hour), slot);
            }
        }
        Ok(grid)
    }
}

/// One channel's week: the grid plus its tag metadata.
///
/// Tags referenced by slots are not required to appear in `tags`, and tags
/// without an entry in `tag_colors` render with a neutral color.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(rename = "schedule", default)]
    pub grid: Grid,
    /// Declared tags as a sorted set. The backend's list order and any
    /// duplicates are not kept, so a replace writes them back sorted.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub tag_colors: BTreeMap<String, String>,
}

impl Schedule {
    /// True for the fallback value handed out when a fetch fails.
    pub fn is_empty(&self) -> bool {
        self.grid.is_empty() && self.tags.is_empty() && self.tag_colors.is_empty()
    }

    pub fn slot(&self, addr: SlotAddr) -> Option<&Slot> {
        self.grid.get(addr)
    }

    pub fn color_for(&self, tag: &str) -> Option<&str> {
        self.tag_colors.get(tag).map(String::as_str)
    }

    /// Tags used by some slot but missing from `tags`.
    pub fn undeclared_tags(&self) -> BTreeSet<&str> {
        self.grid
            .iter()
            .flat_map(|(_, slot)| slot.tags.iter())
            .filter(|t| !self.tags.contains(*t))
            .map(String::as_str)
            .collect()
    }

    /// Tags in `tags` that have no color assigned.
    pub fn uncolored_tags(&self) -> BTreeSet<&str> {
        self.tags
            .iter()
            .filter(|t| !self.tag_colors.contains_key(*t))
            .map(String::as_str)
            .collect()
    }
}
