//! HTTP theme store backed by the Shopify Admin asset API.
//!
//! ```text
//! PUT    https://<store>/admin/api/<version>/themes/<id>/assets.json   {"asset":{"key":…,"value"|"attachment":…}}
//! DELETE https://<store>/admin/api/<version>/themes/<id>/assets.json?asset[key]=<key>
//! ```
//!
//! Text files are sent as `value`, anything that is not UTF-8 as a base64
//! `attachment`. A 429 is retried after `Retry-After`.

use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use base64::Engine;
use serde_json::{json, Value};

use slate_core::{AssetKey, RemoteCredentials};

use crate::error::{io_err, SyncError};
use crate::store::RemoteStore;

const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RATE_LIMIT_RETRIES: u32 = 4;
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(2);
const MAX_RETRY_AFTER: Duration = Duration::from_secs(10);

pub struct ThemeStore {
    creds: RemoteCredentials,
    agent: ureq::Agent,
}

impl ThemeStore {
    pub fn new(creds: RemoteCredentials) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        Self { creds, agent }
    }

    /// `https://<store>/admin/api/<version>/themes/<id>/assets.json`
    pub fn assets_url(&self) -> String {
        let host = self
            .creds
            .store
            .trim()
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/');
        format!(
            "https://{host}/admin/api/{}/themes/{}/assets.json",
            self.creds.api_version, self.creds.theme_id
        )
    }

    fn send(
        &self,
        key: &AssetKey,
        request: impl Fn() -> Result<ureq::Response, ureq::Error>,
    ) -> Result<Option<u16>, SyncError> {
        let mut attempt = 0;
        loop {
            match request() {
                Ok(_) => return Ok(None),
                Err(ureq::Error::Status(429, response)) if attempt < MAX_RATE_LIMIT_RETRIES => {
                    let wait = retry_after(response.header("Retry-After"));
                    tracing::warn!("rate limited on {key}, retrying in {}ms", wait.as_millis());
                    sleep(wait);
                    attempt += 1;
                }
                Err(ureq::Error::Status(404, _)) => return Ok(Some(404)),
                Err(ureq::Error::Status(status, response)) => {
                    return Err(SyncError::Remote {
                        key: key.clone(),
                        status,
                        body: response.into_string().unwrap_or_default(),
                    })
                }
                Err(ureq::Error::Transport(transport)) => {
                    return Err(SyncError::Transport {
                        key: key.clone(),
                        message: transport.to_string(),
                    })
                }
            }
        }
    }
}

impl RemoteStore for ThemeStore {
    fn sync(&self, key: &AssetKey, path: &Path) -> Result<(), SyncError> {
        let bytes = std::fs::read(path).map_err(|e| io_err(path, e))?;
        let body = upload_body(key, bytes);
        let url = self.assets_url();
        match self.send(key, || {
            self.agent
                .put(&url)
                .set(ACCESS_TOKEN_HEADER, &self.creds.password)
                .send_json(&body)
        })? {
            None => Ok(()),
            Some(status) => Err(SyncError::Remote {
                key: key.clone(),
                status,
                body: "theme not found".to_string(),
            }),
        }
    }

    fn unsync(&self, key: &AssetKey) -> Result<(), SyncError> {
        let url = self.assets_url();
        let outcome = self.send(key, || {
            self.agent
                .delete(&url)
                .query("asset[key]", key.as_str())
                .set(ACCESS_TOKEN_HEADER, &self.creds.password)
                .call()
        })?;
        if outcome == Some(404) {
            tracing::debug!("{key} was already absent from the remote store");
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{} (theme {})", self.creds.store, self.creds.theme_id)
    }
}

/// JSON body of an asset upload.
pub fn upload_body(key: &AssetKey, bytes: Vec<u8>) -> Value {
    match String::from_utf8(bytes) {
        Ok(text) => json!({ "asset": { "key": key.as_str(), "value": text } }),
        Err(err) => {
            let encoded = base64::engine::general_purpose::STANDARD.encode(err.into_bytes());
            json!({ "asset": { "key": key.as_str(), "attachment": encoded } })
        }
    }
}

fn retry_after(header: Option<&str>) -> Duration {
    header
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| Duration::from_secs_f64(secs.min(MAX_RETRY_AFTER.as_secs_f64())))
        .unwrap_or(DEFAULT_RETRY_AFTER)
}
