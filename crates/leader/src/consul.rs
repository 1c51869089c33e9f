//! Consul KV backend.
//!
//! Reads the leader marker with a consistent blocking query:
//! `GET /v1/kv/<key>?consistent&index=<n>&wait=<d>`. Consul holds the
//! request open until the key's index moves past `n` or the wait window
//! expires, then answers with the current record either way.

use crate::store::{LeaderMarker, LeaderStore, QueryOptions};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use common::{Error, Result};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, trace};

/// Default server-side wait window for blocking queries
pub const DEFAULT_WAIT_TIME: Duration = Duration::from_secs(1);

/// Extra client-side allowance on top of the wait window. Consul adds up to
/// wait/16 of jitter before answering.
const CLIENT_TIMEOUT_SLACK: Duration = Duration::from_secs(5);

const TOKEN_HEADER: &str = "X-Consul-Token";

/// One entry of a `/v1/kv` response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct KvPair {
    value: Option<String>,
    modify_index: u64,
}

/// Consul KV leader store
pub struct ConsulStore {
    endpoint: Url,
    wait_time: Duration,
    token: Option<String>,
    client: reqwest::Client,
}

impl ConsulStore {
    /// Create a new Consul store
    ///
    /// # Arguments
    /// * `endpoint` - Agent base URL (e.g., "http://127.0.0.1:8500")
    /// * `wait_time` - Server-side wait window for blocking reads
    /// * `token` - Optional ACL token
    pub fn new(endpoint: &str, wait_time: Duration, token: Option<String>) -> Result<Self> {
        let endpoint = parse_endpoint(endpoint)?;
        let client = reqwest::Client::builder()
            .timeout(wait_time + wait_time / 16 + CLIENT_TIMEOUT_SLACK)
            .build()
            .map_err(|e| Error::store(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint,
            wait_time,
            token,
            client,
        })
    }

    /// Build the request URL for a key
    pub fn kv_url(&self, key: &str, options: &QueryOptions) -> Result<Url> {
        let mut url = self
            .endpoint
            .join(&format!("v1/kv/{}", key.trim_start_matches('/')))
            .map_err(|e| Error::store(format!("Invalid key {:?}: {}", key, e)))?;

        {
            let mut query = url.query_pairs_mut();
            if options.require_consistent {
                query.append_key_only("consistent");
            }
            if options.wait_index > 0 {
                query.append_pair("index", &options.wait_index.to_string());
                query.append_pair("wait", &format!("{}ms", self.wait_time.as_millis()));
            }
        }

        Ok(url)
    }
}

#[async_trait]
impl LeaderStore for ConsulStore {
    async fn get(&self, key: &str, options: &QueryOptions) -> Result<Option<LeaderMarker>> {
        let url = self.kv_url(key, options)?;
        trace!(url = %url, "Consul KV read");

        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.header(TOKEN_HEADER, token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::store(format!("Request failed: {}", e)))?;

        match response.status() {
            StatusCode::OK => {
                let body = response
                    .bytes()
                    .await
                    .map_err(|e| Error::store(format!("Failed to read response: {}", e)))?;
                let marker = decode_kv(&body)?;
                debug!(key = key, marker = ?marker, "Consul KV read complete");
                Ok(marker)
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(Error::store(format!("Unexpected status {} for key {}", status, key))),
        }
    }

    fn name(&self) -> &str {
        "consul"
    }
}

/// Parse and normalise the agent URL so relative joins keep its path.
pub fn parse_endpoint(endpoint: &str) -> Result<Url> {
    let mut url =
        Url::parse(endpoint).map_err(|e| Error::config(format!("Invalid endpoint {:?}: {}", endpoint, e)))?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(Error::config(format!(
            "Endpoint must be an http(s) URL with a host: {}",
            endpoint
        )));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}

/// Decode a `/v1/kv` response body into a marker.
fn decode_kv(body: &[u8]) -> Result<Option<LeaderMarker>> {
    let pairs: Vec<KvPair> = serde_json::from_slice(body)?;
    let Some(pair) = pairs.into_iter().next() else {
        return Ok(None);
    };

    let value = match pair.value {
        Some(encoded) => {
            let raw = STANDARD
                .decode(encoded.as_bytes())
                .map_err(|e| Error::store(format!("Invalid base64 value: {}", e)))?;
            String::from_utf8_lossy(&raw).into_owned()
        }
        None => String::new(),
    };

    Ok(Some(LeaderMarker::new(value, pair.modify_index)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_validation() {
        assert!(parse_endpoint("http://127.0.0.1:8500").is_ok());
        assert!(parse_endpoint("https://consul.service:8501/").is_ok());

        assert!(parse_endpoint("127.0.0.1:8500").is_err());
        assert!(parse_endpoint("ftp://consul:21").is_err());
        assert!(parse_endpoint("").is_err());
    }

    #[test]
    fn test_kv_url_blocking() {
        let store = ConsulStore::new("http://127.0.0.1:8500", Duration::from_secs(1), None).unwrap();
        let options = QueryOptions {
            require_consistent: true,
            wait_index: 42,
        };

        let url = store.kv_url("/service/pg/leader", &options).unwrap();
        assert_eq!(url.path(), "/v1/kv/service/pg/leader");
        assert_eq!(url.query(), Some("consistent&index=42&wait=1000ms"));
    }

    #[test]
    fn test_kv_url_keeps_endpoint_path() {
        let store = ConsulStore::new("http://gateway/consul", DEFAULT_WAIT_TIME, None).unwrap();
        let url = store.kv_url("leader", &QueryOptions::default()).unwrap();

        assert_eq!(url.path(), "/consul/v1/kv/leader");
        assert_eq!(url.query(), Some("consistent"));
    }

    #[test]
    fn test_decode_kv() {
        // "node1" base64-encoded
        let body = br#"[{"LockIndex":0,"Key":"service/pg/leader","Flags":0,"Value":"bm9kZTE=","CreateIndex":10,"ModifyIndex":17}]"#;
        let marker = decode_kv(body).unwrap().unwrap();
        assert_eq!(marker, LeaderMarker::new("node1", 17));
    }

    #[test]
    fn test_decode_kv_null_value() {
        let body = br#"[{"Key":"leader","Value":null,"ModifyIndex":3}]"#;
        let marker = decode_kv(body).unwrap().unwrap();
        assert_eq!(marker.value, "");
        assert_eq!(marker.version, 3);
    }

    #[test]
    fn test_decode_kv_rejects_garbage() {
        assert!(decode_kv(b"not json").is_err());
        assert_eq!(decode_kv(b"[]").unwrap(), None);
    }
}
