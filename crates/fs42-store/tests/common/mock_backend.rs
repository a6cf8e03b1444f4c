#![allow(dead_code)]

//! In-process stand-in for the scheduling backend.
//!
//! Keeps channels, schedules, empty folders, baselines and bump lists in
//! memory and logs every request as `"<METHOD> <decoded path>"` so tests
//! can check exactly which record a call addressed.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, patch, post, put};
use axum::Router;
use fs42_proto::config::{BackendConfig, ErrorPolicy, PolicyConfig};
use fs42_store::ChannelStore;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct MockChannel {
    pub conf: Value,
    /// `{schedule, tags, tag_colors}` exactly as last written.
    pub schedule: Value,
}

impl MockChannel {
    pub fn new(conf: Value) -> Self {
        Self {
            conf,
            schedule: json!({ "schedule": {}, "tags": [], "tag_colors": {} }),
        }
    }
}

#[derive(Debug, Default)]
pub struct BackendState {
    pub channels: BTreeMap<String, MockChannel>,
    pub empty_folders: HashMap<String, Vec<String>>,
    pub baselines: HashMap<String, Value>,
    /// `None` makes the endpoint answer `null`.
    pub bumps: HashMap<String, Option<Vec<String>>>,
    pub runtime_files: Vec<String>,
    pub requests: Vec<String>,
    pub fail_channels: bool,
    pub fail_empty_folders: bool,
    pub fail_hot_start: bool,
    pub list_delay: Duration,
}

type SharedState = Arc<Mutex<BackendState>>;

pub struct MockBackend {
    pub url: String,
    state: SharedState,
    handle: JoinHandle<()>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let state: SharedState = Arc::new(Mutex::new(BackendState::default()));

        let app = Router::new()
            .route("/channels", get(list_channels).post(create_channel))
            .route("/channels-empty-folders", get(empty_folders))
            .route("/channels/normalize", post(normalize))
            .route("/channels/baseline/:kind", get(baseline))
            .route("/channels/:name", put(update_channel).delete(delete_channel))
            .route("/channels/:name/schedule", get(get_schedule).put(replace_schedule))
            .route("/channels/:name/schedule/:day/:hour", patch(patch_slot))
            .route("/channels/:name/bump", get(bumps))
            .route("/channels/:name/import-files", post(import_files))
            .route("/runtime-files", get(runtime_files))
            .route("/launch-scanner", post(launch_scanner))
            .route("/hot-start", post(hot_start))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock backend");
        let addr = listener.local_addr().expect("mock backend address");
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            url: format!("http://{}", addr),
            state,
            handle,
        }
    }

    pub fn state(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().expect("mock state poisoned")
    }

    pub fn seed_channel(&self, name: &str, conf: Value) {
        let mut conf = conf;
        conf["network_name"] = json!(name);
        self.state()
            .channels
            .insert(name.to_string(), MockChannel::new(conf));
    }

    pub fn seed_schedule(&self, name: &str, schedule: Value) {
        self.state()
            .channels
            .get_mut(name)
            .expect("seed channel first")
            .schedule = schedule;
    }

    pub fn requests(&self) -> Vec<String> {
        self.state().requests.clone()
    }

    pub fn count(&self, request: &str) -> usize {
        self.state().requests.iter().filter(|r| *r == request).count()
    }

    pub fn clear_requests(&self) {
        self.state().requests.clear();
    }

    pub fn store(&self) -> ChannelStore {
        self.store_with(PolicyConfig::default())
    }

    pub fn store_with(&self, policy: PolicyConfig) -> ChannelStore {
        store_for(&self.url, policy)
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn store_for(url: &str, policy: PolicyConfig) -> ChannelStore {
    let backend = BackendConfig {
        base_url: url.to_string(),
        request_timeout_secs: 5,
        connect_timeout_secs: 2,
        ..BackendConfig::default()
    };
    ChannelStore::with_backend(&backend, policy).expect("store should build")
}

pub fn propagate_all() -> PolicyConfig {
    PolicyConfig {
        listing: ErrorPolicy::Propagate,
        edits: ErrorPolicy::Propagate,
    }
}

pub fn swallow_all() -> PolicyConfig {
    PolicyConfig {
        listing: ErrorPolicy::Swallow,
        edits: ErrorPolicy::Swallow,
    }
}

/// Base URL of a port nothing listens on.
pub async fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    format!("http://{}", addr)
}

// ── handlers ──────────────────────────────────────────────────────────────────

type Reply = Result<Json<Value>, StatusCode>;

fn ok() -> Reply {
    Ok(Json(json!({ "status": "ok" })))
}

fn record(state: &SharedState, line: String) -> MutexGuard<'_, BackendState> {
    let mut guard = state.lock().expect("mock state poisoned");
    guard.requests.push(line);
    guard
}

async fn list_channels(State(state): State<SharedState>) -> Reply {
    let delay = {
        let s = record(&state, "GET /channels".into());
        if s.fail_channels {
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
        s.list_delay
    };
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let s = state.lock().expect("mock state poisoned");
    let list: Vec<Value> = s
        .channels
        .iter()
        .map(|(name, ch)| {
            json!({
                "name": name,
                "path": format!("catalog/{}", name.to_lowercase()),
                "config": ch.conf,
            })
        })
        .collect();
    Ok(Json(Value::Array(list)))
}

async fn empty_folders(State(state): State<SharedState>) -> Reply {
    let s = record(&state, "GET /channels-empty-folders".into());
    if s.fail_empty_folders {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    Ok(Json(json!(s.empty_folders)))
}

async fn create_channel(State(state): State<SharedState>, Json(body): Json<Value>) -> Reply {
    let mut s = record(&state, "POST /channels".into());
    let conf = body["station_conf"].clone();
    let name = conf["network_name"]
        .as_str()
        .ok_or(StatusCode::UNPROCESSABLE_ENTITY)?
        .to_string();
    s.channels.insert(name, MockChannel::new(conf));
    ok()
}

async fn update_channel(
    State(state): State<SharedState>,
    Path(name): Path<String>,
    Json(body): Json<Value>,
) -> Reply {
    let mut s = record(&state, format!("PUT /channels/{}", name));
    let conf = body["station_conf"].clone();
    let new_name = conf["network_name"].as_str().unwrap_or(&name).to_string();
    let mut channel = s.channels.remove(&name).ok_or(StatusCode::NOT_FOUND)?;
    channel.conf = conf;
    if let Some(folders) = s.empty_folders.remove(&name) {
        s.empty_folders.insert(new_name.clone(), folders);
    }
    s.channels.insert(new_name, channel);
    ok()
}

async fn delete_channel(State(state): State<SharedState>, Path(name): Path<String>) -> Reply {
    let mut s = record(&state, format!("DELETE /channels/{}", name));
    s.channels.remove(&name).ok_or(StatusCode::NOT_FOUND)?;
    s.empty_folders.remove(&name);
    ok()
}

/// Trims stray whitespace from names and makes every conf agree with its key.
async fn normalize(State(state): State<SharedState>) -> Reply {
    let mut s = record(&state, "POST /channels/normalize".into());
    let channels = std::mem::take(&mut s.channels);
    for (name, mut channel) in channels {
        let clean = name.trim().to_string();
        channel.conf["network_name"] = json!(clean);
        s.channels.insert(clean, channel);
    }
    ok()
}

async fn baseline(State(state): State<SharedState>, Path(kind): Path<String>) -> Reply {
    let s = record(&state, format!("GET /channels/baseline/{}", kind));
    let conf = s.baselines.get(&kind).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(json!({ "station_conf": conf })))
}

async fn get_schedule(State(state): State<SharedState>, Path(name): Path<String>) -> Reply {
    let s = record(&state, format!("GET /channels/{}/schedule", name));
    let channel = s.channels.get(&name).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(channel.schedule.clone()))
}

async fn replace_schedule(
    State(state): State<SharedState>,
    Path(name): Path<String>,
    Json(body): Json<Value>,
) -> Reply {
    let mut s = record(&state, format!("PUT /channels/{}/schedule", name));
    let channel = s.channels.get_mut(&name).ok_or(StatusCode::NOT_FOUND)?;
    channel.schedule = body;
    Ok(Json(channel.schedule.clone()))
}

async fn patch_slot(
    State(state): State<SharedState>,
    Path((name, day, hour)): Path<(String, String, String)>,
    Json(slot): Json<Value>,
) -> Reply {
    let mut s = record(
        &state,
        format!("PATCH /channels/{}/schedule/{}/{}", name, day, hour),
    );
    let channel = s.channels.get_mut(&name).ok_or(StatusCode::NOT_FOUND)?;
    channel.schedule["schedule"][day.as_str()][hour.as_str()] = slot;
    Ok(Json(channel.schedule.clone()))
}

async fn bumps(State(state): State<SharedState>, Path(name): Path<String>) -> Reply {
    let s = record(&state, format!("GET /channels/{}/bump", name));
    if !s.channels.contains_key(&name) {
        return Err(StatusCode::NOT_FOUND);
    }
    match s.bumps.get(&name) {
        Some(files) => Ok(Json(json!(files))),
        None => Ok(Json(json!([]))),
    }
}

async fn import_files(
    State(state): State<SharedState>,
    Path(name): Path<String>,
    Json(body): Json<Value>,
) -> Reply {
    let mut s = record(&state, format!("POST /channels/{}/import-files", name));
    if !s.channels.contains_key(&name) {
        return Err(StatusCode::NOT_FOUND);
    }
    let target = body["target"].as_str().unwrap_or_default().to_string();
    let moved: Vec<String> = body["files"]
        .as_array()
        .map(|files| {
            files
                .iter()
                .filter_map(Value::as_str)
                .filter_map(|f| f.rsplit('/').next())
                .map(|f| format!("catalog/{}/{}/{}", name.to_lowercase(), target, f))
                .collect()
        })
        .unwrap_or_default();
    if !moved.is_empty() {
        if let Some(folders) = s.empty_folders.get_mut(&name) {
            folders.retain(|f| f != &target);
        }
    }
    Ok(Json(json!({ "status": "ok", "files": moved })))
}

async fn runtime_files(State(state): State<SharedState>) -> Reply {
    let s = record(&state, "GET /runtime-files".into());
    Ok(Json(json!({ "files": s.runtime_files })))
}

async fn launch_scanner(State(state): State<SharedState>) -> Reply {
    let _s = record(&state, "POST /launch-scanner".into());
    Ok(Json(json!({ "url": "http://127.0.0.1:4242/" })))
}

async fn hot_start(State(state): State<SharedState>) -> Reply {
    let s = record(&state, "POST /hot-start".into());
    if s.fail_hot_start {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    ok()
}
