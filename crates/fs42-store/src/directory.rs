//! Channel directory: listing and channel lifecycle.

use fs42_proto::config::ErrorPolicy;
use fs42_proto::protocol::{
    clear_empty_folders, merge_empty_folders, Channel, EmptyFolderMap, StationConf,
    StationConfBody,
};
use reqwest::Method;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{apply_policy, Result, StoreError};
use crate::sync::{find_channel, Directory, Fetched};
use crate::{ApiClient, ChannelStore};

/// One full directory fetch: the channel list, then the empty-folder scan
/// merged onto it.
///
/// A failed channel list follows the listing policy (swallowed: empty
/// list). A failed scan never fails the fetch; every channel just gets no
/// empty folders.
pub(crate) async fn fetch_directory(api: ApiClient, listing: ErrorPolicy) -> Result<Fetched> {
    let res = api.get_json::<Vec<Channel>>(api.endpoint(&["channels"])?).await.map(Some);
    let Some(mut channels) = apply_policy(listing, "list channels", res, || None)? else {
        return Ok(Fetched {
            channels: Vec::new(),
            degraded: true,
        });
    };

    let degraded = match api
        .get_json::<EmptyFolderMap>(api.endpoint(&["channels-empty-folders"])?)
        .await
    {
        Ok(empty) => {
            merge_empty_folders(&mut channels, &empty);
            false
        }
        Err(e) => {
            warn!("empty folder scan unavailable: {}", e);
            clear_empty_folders(&mut channels);
            true
        }
    };

    debug!("fetched {} channels", channels.len());
    Ok(Fetched { channels, degraded })
}

impl ChannelStore {
    /// Fetch the full channel list (with empty folders) and make it the
    /// current directory.
    pub async fn list_channels(&self) -> Result<Arc<Directory>> {
        let reload = self.refresh();
        self.cancellable(reload).await
    }

    pub async fn create_channel(&self, conf: &StationConf) -> Result<Arc<Directory>> {
        info!(
            "create channel {:?}",
            conf.network_name().unwrap_or("<unnamed>")
        );
        let body = StationConfBody {
            station_conf: conf.clone(),
        };
        let url = self.api().endpoint(&["channels"])?;
        let write = self.api().send(Method::POST, url, Some(&body));
        let (_, directory) = self.write_then_reload("create channel", write).await?;
        Ok(directory)
    }

    /// Replace the configuration of the channel currently named `old_name`.
    ///
    /// The record is addressed by `old_name` even when `conf` carries a
    /// different `network_name`; that is how a rename reaches the backend.
    pub async fn update_channel(&self, old_name: &str, conf: &StationConf) -> Result<Arc<Directory>> {
        match conf.network_name() {
            Some(new_name) if new_name != old_name => {
                info!("update channel {:?} (renaming to {:?})", old_name, new_name)
            }
            _ => info!("update channel {:?}", old_name),
        }
        let body = StationConfBody {
            station_conf: conf.clone(),
        };
        let url = self.api().endpoint(&["channels", old_name])?;
        let write = self.api().send(Method::PUT, url, Some(&body));
        let (_, directory) = self.write_then_reload("update channel", write).await?;
        Ok(directory)
    }

    /// Rename a channel, keeping the rest of its configuration as the
    /// backend reports it right now.
    ///
    /// The PUT body replaces the whole conf, so the current one is read
    /// straight from `/channels` with failures returned whatever the listing
    /// policy says. Nothing is sent when `old_name` is not listed.
    pub async fn rename_channel(&self, old_name: &str, new_name: &str) -> Result<Arc<Directory>> {
        let url = self.api().endpoint(&["channels"])?;
        let channels = self
            .cancellable(self.api().get_json::<Vec<Channel>>(url))
            .await?;
        let Some(current) = find_channel(&channels, old_name) else {
            warn!("rename {:?}: channel not listed, nothing sent", old_name);
            return Err(StoreError::UnknownChannel(old_name.to_string()));
        };
        let conf = current.station_conf.clone().with_network_name(new_name);
        self.update_channel(&current.name, &conf).await
    }

    pub async fn delete_channel(&self, name: &str) -> Result<Arc<Directory>> {
        info!("delete channel {:?}", name);
        let url = self.api().endpoint(&["channels", name])?;
        let write = self.api().send(Method::DELETE, url, None::<&()>);
        let (_, directory) = self.write_then_reload("delete channel", write).await?;
        Ok(directory)
    }

    /// Ask the backend to reconcile channel directories and names.
    pub async fn normalize_channels(&self) -> Result<Arc<Directory>> {
        info!("normalize channels");
        let url = self.api().endpoint(&["channels", "normalize"])?;
        let write = self.api().send(Method::POST, url, None::<&()>);
        let (_, directory) = self.write_then_reload("normalize channels", write).await?;
        Ok(directory)
    }

    /// Baseline `station_conf` for a network type. `None` when the backend
    /// has none or the fetch failed under the swallow policy.
    pub async fn get_baseline(&self, network_type: &str) -> Result<Option<StationConf>> {
        let url = self.api().endpoint(&["channels", "baseline", network_type])?;
        let fetch = self.api().get_json::<StationConfBody>(url);
        let res = self.cancellable(fetch).await.map(|b| Some(b.station_conf));
        apply_policy(self.listing_policy(), "fetch baseline", res, || None)
    }
}
