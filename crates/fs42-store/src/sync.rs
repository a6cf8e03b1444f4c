//! Directory snapshot and the refresh policy around it.
//!
//! The backend is the only source of truth. Every write is followed by a
//! reload of the channel list; the store never patches its own copy.
//!
//! Reloads are single-flight: callers asking for a refresh while one is in
//! flight share it, unless their write finished after that fetch could have
//! started. Those callers get a follow-up fetch chained behind the current
//! one, so fetches complete in the order they were requested and a snapshot
//! is never replaced by an older one.
//!
//! State transitions:
//!   Idle -> Fetching -> Fresh | Stale
//!   any  -> Stale (write completed, reload pending)
//!   Stale | Fresh -> Fetching -> ...

use chrono::{DateTime, Local};
use fs42_proto::protocol::Channel;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{broadcast, watch, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Result, StoreError};

/// Complete channel list as last fetched from the backend.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    pub channels: Vec<Channel>,
    /// Incremented on every applied refresh. 0 means never fetched.
    pub rev: u64,
    pub fetched_at: Option<DateTime<Local>>,
    /// The fetch that produced this snapshot fell back on a failure
    /// (empty list, or empty folders unavailable).
    pub degraded: bool,
}

impl Directory {
    pub fn get(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.name == name)
    }

    /// Exact match first, then case-insensitive, the way the backend
    /// resolves channel names.
    pub fn find(&self, name: &str) -> Option<&Channel> {
        find_channel(&self.channels, name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(|c| c.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

pub(crate) fn find_channel<'a>(channels: &'a [Channel], name: &str) -> Option<&'a Channel> {
    channels.iter().find(|c| c.name == name).or_else(|| {
        let lower = name.to_lowercase();
        channels.iter().find(|c| c.name.to_lowercase() == lower)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    /// Nothing fetched yet this session.
    #[default]
    Idle,
    Fetching,
    Fresh,
    /// Last refresh failed or degraded, or a write is waiting for its reload.
    Stale,
}

/// Notifications for views holding on to store data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    DirectoryUpdated { rev: u64 },
    SyncStateChanged(SyncState),
}

/// Outcome of one directory fetch, before it is applied.
#[derive(Debug)]
pub(crate) struct Fetched {
    pub channels: Vec<Channel>,
    pub degraded: bool,
}

pub(crate) type RefreshFuture = Shared<BoxFuture<'static, Result<Arc<Directory>>>>;

struct Inflight {
    /// Writes completed before this refresh was queued.
    writes_seen: u64,
    fut: RefreshFuture,
}

pub(crate) struct SyncCore {
    snapshot: RwLock<Arc<Directory>>,
    inflight: Mutex<Option<Inflight>>,
    writes: AtomicU64,
    next_seq: AtomicU64,
    applied_seq: AtomicU64,
    state_tx: watch::Sender<SyncState>,
    events: broadcast::Sender<StoreEvent>,
    session: CancellationToken,
}

impl SyncCore {
    pub fn new(session: CancellationToken) -> Self {
        let (state_tx, _) = watch::channel(SyncState::Idle);
        let (events, _) = broadcast::channel(64);
        Self {
            snapshot: RwLock::new(Arc::new(Directory::default())),
            inflight: Mutex::new(None),
            writes: AtomicU64::new(0),
            next_seq: AtomicU64::new(0),
            applied_seq: AtomicU64::new(0),
            state_tx,
            events,
            session,
        }
    }

    pub async fn snapshot(&self) -> Arc<Directory> {
        Arc::clone(&*self.snapshot.read().await)
    }

    pub fn state(&self) -> SyncState {
        *self.state_tx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SyncState> {
        self.state_tx.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Record a finished write. The held snapshot is stale until the next
    /// refresh lands.
    pub fn note_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.set_state(SyncState::Stale);
    }

    /// Get a refresh that starts after every write noted so far, joining
    /// the in-flight one when it qualifies.
    ///
    /// The fetch runs as its own task bound to the session, so a caller
    /// that stops waiting does not abort it.
    pub fn request_refresh<F>(self: &Arc<Self>, fetch: F) -> RefreshFuture
    where
        F: FnOnce() -> BoxFuture<'static, Result<Fetched>> + Send + 'static,
    {
        let writes_seen = self.writes.load(Ordering::SeqCst);
        let mut slot = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);

        let pending = slot
            .as_ref()
            .filter(|inflight| inflight.fut.peek().is_none());

        if let Some(inflight) = pending {
            if inflight.writes_seen >= writes_seen {
                debug!("refresh: joining in-flight fetch");
                return inflight.fut.clone();
            }
        }

        let prev = pending.map(|inflight| inflight.fut.clone());
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let core = Arc::clone(self);
        let session = self.session.clone();

        let task = tokio::spawn(async move {
            if let Some(prev) = prev {
                debug!("refresh #{}: waiting for previous fetch", seq);
                let _ = prev.await;
            }
            core.set_state(SyncState::Fetching);
            let fetched = tokio::select! {
                biased;
                _ = session.cancelled() => Err(StoreError::Cancelled),
                res = fetch() => res,
            };
            core.apply(seq, fetched).await
        });

        let fut = async move {
            match task.await {
                Ok(res) => res,
                Err(e) if e.is_cancelled() => Err(StoreError::Cancelled),
                Err(e) => Err(StoreError::Refresh(e.to_string())),
            }
        }
        .boxed()
        .shared();

        *slot = Some(Inflight {
            writes_seen,
            fut: fut.clone(),
        });
        fut
    }

    async fn apply(&self, seq: u64, fetched: Result<Fetched>) -> Result<Arc<Directory>> {
        let fetched = match fetched {
            Ok(fetched) => fetched,
            Err(e) => {
                if !e.is_cancelled() {
                    warn!("refresh #{} failed: {}", seq, e);
                }
                self.set_state(SyncState::Stale);
                return Err(e);
            }
        };

        let mut snapshot = self.snapshot.write().await;
        if self.applied_seq.load(Ordering::SeqCst) > seq {
            debug!("refresh #{}: newer snapshot already applied", seq);
            return Ok(Arc::clone(&*snapshot));
        }
        self.applied_seq.store(seq, Ordering::SeqCst);

        let next = Arc::new(Directory {
            channels: fetched.channels,
            rev: snapshot.rev + 1,
            fetched_at: Some(Local::now()),
            degraded: fetched.degraded,
        });
        *snapshot = Arc::clone(&next);
        drop(snapshot);

        debug!(
            "refresh #{}: applied rev {} ({} channels)",
            seq,
            next.rev,
            next.channels.len()
        );
        let _ = self.events.send(StoreEvent::DirectoryUpdated { rev: next.rev });
        self.set_state(if next.degraded {
            SyncState::Stale
        } else {
            SyncState::Fresh
        });
        Ok(next)
    }

    fn set_state(&self, next: SyncState) {
        let changed = self.state_tx.send_if_modified(|state| {
            if *state == next {
                false
            } else {
                *state = next;
                true
            }
        });
        if changed {
            let _ = self.events.send(StoreEvent::SyncStateChanged(next));
        }
    }
}
