#![allow(dead_code)]

pub mod mock_backend;

use fs42_proto::protocol::StationConf;
use serde_json::json;

/// Minimal station conf as the backend's baseline endpoint would hand it out.
pub fn station_conf(name: &str, network_type: &str) -> StationConf {
    serde_json::from_value(json!({
        "network_name": name,
        "network_type": network_type,
        "channel_number": 3,
        "content_dir": format!("catalog/{}", name.to_lowercase()),
    }))
    .expect("station conf literal")
}
