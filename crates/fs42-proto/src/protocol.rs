use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Channel setup as stored by the backend.
///
/// The client round-trips this object without interpreting it. The only
/// key it reads is `network_name`, the channel's display name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StationConf(pub Map<String, Value>);

impl StationConf {
    pub const NETWORK_NAME: &'static str = "network_name";

    pub fn network_name(&self) -> Option<&str> {
        self.0.get(Self::NETWORK_NAME).and_then(Value::as_str)
    }

    pub fn set_network_name(&mut self, name: impl Into<String>) {
        self.0
            .insert(Self::NETWORK_NAME.to_string(), Value::String(name.into()));
    }

    pub fn with_network_name(mut self, name: impl Into<String>) -> Self {
        self.set_network_name(name);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }
}

impl From<Map<String, Value>> for StationConf {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// One entry of `GET /channels`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    /// Content directory on the backend host.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(rename = "config", alias = "station_conf", default)]
    pub station_conf: StationConf,
    /// Filled client-side from `GET /channels-empty-folders`.
    #[serde(default)]
    pub empty_folders: Vec<String>,
}

/// `GET /channels-empty-folders`: channel name → folder paths with no content.
pub type EmptyFolderMap = HashMap<String, Vec<String>>;

/// Left-merge the scan result onto the channel list. A channel missing from
/// the map gets an empty list.
pub fn merge_empty_folders(channels: &mut [Channel], empty: &EmptyFolderMap) {
    for channel in channels.iter_mut() {
        channel.empty_folders = empty.get(&channel.name).cloned().unwrap_or_default();
    }
}

/// Clear every channel's empty-folder list (scan unavailable).
pub fn clear_empty_folders(channels: &mut [Channel]) {
    for channel in channels.iter_mut() {
        channel.empty_folders.clear();
    }
}

/// A filler file in the channel's bump directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BumpFile(pub String);

impl BumpFile {
    pub fn file_name(&self) -> &str {
        &self.0
    }

    /// Lowercased extension without the dot, if any.
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.0)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
    }
}

/// Body of `POST /channels`, `PUT /channels/{name}` and the response of
/// `GET /channels/baseline/{type}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfBody {
    pub station_conf: StationConf,
}

/// `GET /runtime-files`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeFiles {
    #[serde(default)]
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportAction {
    #[default]
    Copy,
    Move,
}

/// Body of `POST /channels/{name}/import-files`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRequest {
    /// Absolute source paths on the backend host.
    pub files: Vec<String>,
    /// Sub-directory of the channel's content dir, e.g. `shows`.
    pub target: String,
    #[serde(default)]
    pub action: ImportAction,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportOutcome {
    /// Destination paths of the files actually imported.
    #[serde(default)]
    pub files: Vec<String>,
}

/// `POST /launch-scanner`: where the catalog scanner UI is served.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerLaunch {
    pub url: String,
}
