//! REST transport for the scheduling backend.
//!
//! Every identifier goes into the URL as its own path segment, so names
//! with spaces, slashes or `%` reach the backend percent-encoded.

use fs42_proto::config::BackendConfig;
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::error::{Result, StoreError};

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base: Url,
}

impl ApiClient {
    pub fn new(backend: &BackendConfig) -> Result<Self> {
        let base = Url::parse(backend.base_url.trim()).map_err(|e| StoreError::InvalidUrl {
            url: backend.base_url.clone(),
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(StoreError::InvalidUrl {
                url: backend.base_url.clone(),
                reason: "not a hierarchical url".into(),
            });
        }

        let client = Client::builder()
            .user_agent(backend.user_agent.clone())
            .connect_timeout(backend.connect_timeout())
            .timeout(backend.request_timeout())
            .build()
            .map_err(|e| StoreError::InvalidUrl {
                url: backend.base_url.clone(),
                reason: format!("failed to build http client: {}", e),
            })?;

        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// `base` + one percent-encoded segment per element of `segments`.
    ///
    /// `.` and `..` would be resolved away by the URL parser and an empty
    /// segment addresses the parent collection, so those are refused.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        if let Some(bad) = segments
            .iter()
            .find(|s| matches!(**s, "" | "." | ".."))
        {
            return Err(StoreError::InvalidName(bad.to_string()));
        }
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let text = self.execute(Method::GET, &url, None::<&()>).await?;
        decode(&url, &text)
    }

    pub async fn send_json<B, T>(&self, method: Method, url: Url, body: Option<&B>) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let text = self.execute(method, &url, body).await?;
        decode(&url, &text)
    }

    /// Fire a request and discard the response body (mutations answer with
    /// `{"status": "ok"}` or an echo of the stored document).
    pub async fn send<B>(&self, method: Method, url: Url, body: Option<&B>) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        self.execute(method, &url, body).await.map(|_| ())
    }

    async fn execute<B>(&self, method: Method, url: &Url, body: Option<&B>) -> Result<String>
    where
        B: Serialize + ?Sized,
    {
        debug!("{} {}", method, url);

        let mut request = self
            .client
            .request(method.clone(), url.clone())
            .header("Accept", "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let transport = |source: reqwest::Error| StoreError::Transport {
            method: method.clone(),
            url: url.to_string(),
            source: Arc::new(source),
        };

        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let text = response.text().await.map_err(transport)?;

        if !status.is_success() {
            return Err(StoreError::Status {
                method,
                url: url.to_string(),
                status,
                body: text,
            });
        }
        Ok(text)
    }
}

fn decode<T: DeserializeOwned>(url: &Url, text: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|e| StoreError::Decode {
        url: url.to_string(),
        source: Arc::new(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> ApiClient {
        ApiClient::new(&BackendConfig {
            base_url: base_url.to_string(),
            ..BackendConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let api = client("http://127.0.0.1:4343");
        let url = api.endpoint(&["channels", "Late Night/80s", "schedule"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:4343/channels/Late%20Night%2F80s/schedule"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_prefix() {
        let api = client("http://fs42.local/api/");
        let url = api.endpoint(&["channels", "normalize"]).unwrap();
        assert_eq!(url.as_str(), "http://fs42.local/api/channels/normalize");
    }

    #[test]
    fn test_endpoint_encodes_percent_and_question_mark() {
        let api = client("http://fs42.local");
        let url = api.endpoint(&["channels", "100%?", "bump"]).unwrap();
        assert_eq!(url.as_str(), "http://fs42.local/channels/100%25%3F/bump");
    }

    #[test]
    fn test_endpoint_refuses_dot_and_empty_names() {
        let api = client("http://fs42.local");
        for name in [".", "..", ""] {
            let err = api.endpoint(&["channels", name]).unwrap_err();
            assert!(matches!(err, StoreError::InvalidName(ref n) if n == name), "{name:?}");
        }
        // Dots inside a name are ordinary characters.
        let url = api.endpoint(&["channels", "...", "schedule"]).unwrap();
        assert_eq!(url.as_str(), "http://fs42.local/channels/.../schedule");
    }

    #[test]
    fn test_rejects_non_hierarchical_base() {
        let err = ApiClient::new(&BackendConfig {
            base_url: "mailto:ops@fs42.local".into(),
            ..BackendConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, StoreError::InvalidUrl { .. }));
    }

    #[test]
    fn test_rejects_garbage_base() {
        assert!(ApiClient::new(&BackendConfig {
            base_url: "not a url".into(),
            ..BackendConfig::default()
        })
        .is_err());
    }
}
