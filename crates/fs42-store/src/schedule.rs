//! Schedule accessor: one channel's weekly grid, tags and tag colors.

use fs42_proto::protocol::BumpFile;
use fs42_proto::schedule::{Schedule, Slot, SlotAddr};
use reqwest::Method;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{apply_policy, Result};
use crate::sync::Directory;
use crate::ChannelStore;

impl ChannelStore {
    /// Fetch the full week for `name`.
    ///
    /// Under the swallow policy a failure yields `Schedule::default()`;
    /// check [`Schedule::is_empty`] rather than relying on `Ok`.
    pub async fn get_schedule(&self, name: &str) -> Result<Schedule> {
        let url = self.api().endpoint(&["channels", name, "schedule"])?;
        let fetch = self.api().get_json::<Schedule>(url);
        let res = self.cancellable(fetch).await;
        if let Ok(schedule) = &res {
            debug!(
                "schedule {:?}: {} slots, {} tags",
                name,
                schedule.grid.len(),
                schedule.tags.len()
            );
        }
        apply_policy(self.listing_policy(), "fetch schedule", res, Schedule::default)
    }

    /// Overwrite the whole week. Slots absent from `schedule` are removed
    /// on the backend.
    pub async fn replace_schedule(&self, name: &str, schedule: &Schedule) -> Result<Arc<Directory>> {
        info!(
            "replace schedule {:?} ({} slots, {} tags)",
            name,
            schedule.grid.len(),
            schedule.tags.len()
        );
        let url = self.api().endpoint(&["channels", name, "schedule"])?;
        let write = self.api().send(Method::PUT, url, Some(schedule));
        let (_, directory) = self.write_then_reload("replace schedule", write).await?;
        Ok(directory)
    }

    /// Overwrite the slot at `addr`, leaving every other slot alone.
    ///
    /// The slot's tag is not checked against the channel's tag list.
    pub async fn patch_slot(&self, name: &str, addr: SlotAddr, slot: &Slot) -> Result<Arc<Directory>> {
        info!("patch slot {:?} {} -> {:?}", name, addr, slot.tag());
        let day = addr.day.as_str();
        let hour = addr.hour.to_string();
        let url = self
            .api()
            .endpoint(&["channels", name, "schedule", day, hour.as_str()])?;
        let write = self.api().send(Method::PATCH, url, Some(slot));
        let (_, directory) = self.write_then_reload("patch slot", write).await?;
        Ok(directory)
    }

    /// [`patch_slot`](Self::patch_slot) from raw indices (day 0 = Monday).
    /// Out-of-range values are rejected before anything is sent.
    pub async fn patch_slot_at(
        &self,
        name: &str,
        day: i64,
        hour: i64,
        slot: &Slot,
    ) -> Result<Arc<Directory>> {
        let addr = SlotAddr::from_indices(day, hour)?;
        self.patch_slot(name, addr, slot).await
    }

    /// Filler files available to `name`. Never `null`: a missing list is
    /// empty.
    pub async fn list_bump_files(&self, name: &str) -> Result<Vec<BumpFile>> {
        let url = self.api().endpoint(&["channels", name, "bump"])?;
        let fetch = self.api().get_json::<Option<Vec<BumpFile>>>(url);
        let res = self.cancellable(fetch).await.map(Option::unwrap_or_default);
        apply_policy(self.listing_policy(), "fetch bump files", res, Vec::new)
    }
}
