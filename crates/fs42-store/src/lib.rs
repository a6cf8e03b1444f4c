//! Client-side store for FieldStation42 channel scheduling.
//!
//! One `ChannelStore` is one session against the scheduling backend. It
//! holds the channel directory as last fetched, reads schedules on demand,
//! and reloads the directory after every write. See [`sync`] for the
//! reload rules.

pub mod api;
pub mod directory;
pub mod error;
pub mod schedule;
pub mod station;
pub mod sync;

use fs42_proto::config::{BackendConfig, Config, ErrorPolicy, PolicyConfig};
use futures_util::future::FutureExt;
use reqwest::Url;
use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use api::ApiClient;
pub use error::{Result, StoreError};
pub use sync::{Directory, StoreEvent, SyncState};

use sync::{RefreshFuture, SyncCore};

struct Inner {
    api: ApiClient,
    policy: PolicyConfig,
    sync: Arc<SyncCore>,
    session: CancellationToken,
}

/// Session handle. Cheap to clone; clones share state and cancellation.
#[derive(Clone)]
pub struct ChannelStore {
    inner: Arc<Inner>,
    cancel: CancellationToken,
}

impl ChannelStore {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_backend(&config.backend, config.policy.clone())
    }

    pub fn with_backend(backend: &BackendConfig, policy: PolicyConfig) -> Result<Self> {
        let api = ApiClient::new(backend)?;
        let session = CancellationToken::new();
        info!(
            "channel store session against {} (listing={:?}, edits={:?})",
            api.base_url(),
            policy.listing,
            policy.edits
        );
        Ok(Self {
            inner: Arc::new(Inner {
                api,
                policy,
                sync: Arc::new(SyncCore::new(session.clone())),
                session: session.clone(),
            }),
            cancel: session,
        })
    }

    /// Handle for one view. Dropping or closing it aborts that view's
    /// in-flight calls; directory reloads already started keep running.
    pub fn scope(&self) -> StoreScope {
        StoreScope {
            store: ChannelStore {
                inner: Arc::clone(&self.inner),
                cancel: self.cancel.child_token(),
            },
        }
    }

    /// End the session. Every pending and future call returns
    /// [`StoreError::Cancelled`].
    pub fn shutdown(&self) {
        info!("channel store session shutting down");
        self.inner.session.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn base_url(&self) -> &Url {
        self.inner.api.base_url()
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.inner.policy
    }

    /// Directory as last fetched. Does not touch the network.
    pub async fn directory(&self) -> Arc<Directory> {
        self.inner.sync.snapshot().await
    }

    pub fn sync_state(&self) -> SyncState {
        self.inner.sync.state()
    }

    pub fn watch_sync_state(&self) -> watch::Receiver<SyncState> {
        self.inner.sync.watch_state()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.sync.subscribe()
    }

    fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    fn listing_policy(&self) -> ErrorPolicy {
        self.inner.policy.listing
    }

    fn edits_policy(&self) -> ErrorPolicy {
        self.inner.policy.edits
    }

    /// Race `fut` against this handle's cancellation.
    async fn cancellable<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(StoreError::Cancelled),
            res = fut => res,
        }
    }

    fn refresh(&self) -> RefreshFuture {
        let api = self.inner.api.clone();
        let listing = self.listing_policy();
        self.inner
            .sync
            .request_refresh(move || directory::fetch_directory(api, listing).boxed())
    }

    /// Run `write`, then reload the directory whatever the outcome: a
    /// failed or interrupted call may still have changed backend state.
    ///
    /// Returns `None` in place of the write's result when the failure was
    /// swallowed under the edits policy.
    async fn write_then_reload<T>(
        &self,
        op: &str,
        write: impl Future<Output = Result<T>>,
    ) -> Result<(Option<T>, Arc<Directory>)> {
        // Closed before anything was sent: no write happened, nothing to reload.
        if self.cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        let outcome = self.cancellable(write).await;
        if self.inner.session.is_cancelled() {
            return Err(StoreError::Cancelled);
        }

        self.inner.sync.note_write();
        let reload = self.refresh();
        if let Err(StoreError::Cancelled) = outcome {
            return Err(StoreError::Cancelled);
        }
        let directory = self.cancellable(reload).await;

        match outcome {
            Ok(value) => {
                info!("{}: ok", op);
                Ok((Some(value), directory?))
            }
            Err(e) => match self.edits_policy() {
                ErrorPolicy::Propagate => Err(e),
                ErrorPolicy::Swallow => {
                    warn!("{} failed, continuing: {}", op, e);
                    Ok((None, directory?))
                }
            },
        }
    }
}

/// A view-scoped [`ChannelStore`]. Cancels its calls when dropped.
pub struct StoreScope {
    store: ChannelStore,
}

impl StoreScope {
    pub fn close(self) {
        drop(self);
    }
}

impl Deref for StoreScope {
    type Target = ChannelStore;

    fn deref(&self) -> &ChannelStore {
        &self.store
    }
}

impl Drop for StoreScope {
    fn drop(&mut self) {
        self.store.cancel.cancel();
    }
}
