//! Shareable links.
//!
//! Goal lists travel as `?data=<base64(JSON)>` and folder shares as
//! `?folder_share=<base64(JSON metadata)>`. The Base64 is taken over the UTF-8
//! bytes of the JSON, so non-ASCII text survives the trip unchanged. Long links
//! can be passed through a link shortener; when shortening fails for any
//! reason the original link is used.
use std::time::Duration;

use async_trait::async_trait;
use base64::{
    engine::general_purpose::{STANDARD as BASE64, URL_SAFE_NO_PAD},
    Engine as _,
};
use log::{debug, error, warn};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

use crate::{transfer, Goal, NovaError, Result};

pub const DATA_PARAM: &str = "data";
pub const FOLDER_SHARE_PARAM: &str = "folder_share";

/// Metadata carried by a folder share link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderShare {
    pub folder_id: i64,
    pub folder_name: String,
    #[serde(default)]
    pub owner_email: String,
    #[serde(default)]
    pub goals: Vec<Goal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl FolderShare {
    pub fn is_protected(&self) -> bool {
        self.password.as_deref().is_some_and(|p| !p.is_empty())
    }

    /// Releases the shared goals if the supplied password matches.
    pub fn unlock(&self, supplied: Option<&str>) -> Result<&[Goal]> {
        if self.is_protected() && self.password.as_deref() != supplied {
            warn!("Rejected password for shared folder {}", self.folder_id);
            return Err(NovaError::PermissionDenied {
                message: format!("Folder '{}' needs the correct password", self.folder_name),
            });
        }
        Ok(&self.goals)
    }
}

/// What a share link decodes to.
#[derive(Debug, Clone, PartialEq)]
pub enum SharedLink {
    Goals(Vec<Goal>),
    Folder(FolderShare),
}

/// Serializes a value to JSON and Base64-encodes its UTF-8 bytes.
pub fn encode_payload<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let json = serde_json::to_string(value)?;
    Ok(BASE64.encode(json.as_bytes()))
}

/// Decodes Base64 text back into the JSON string it carries.
pub fn decode_payload_json(encoded: &str) -> Result<String> {
    // Query strings sometimes turn '+' into ' ' on the way through
    let cleaned: String = encoded.trim().replace(' ', "+");

    let bytes = BASE64
        .decode(cleaned.as_bytes())
        .or_else(|_| URL_SAFE_NO_PAD.decode(cleaned.trim_end_matches('=').as_bytes()))
        .map_err(|e| NovaError::import_failed(format!("Share data is not valid Base64: {}", e)))?;

    String::from_utf8(bytes)
        .map_err(|e| NovaError::import_failed(format!("Share data is not UTF-8 text: {}", e)))
}

/// Decodes a Base64 payload into a typed value.
pub fn decode_payload<T: DeserializeOwned>(encoded: &str) -> Result<T> {
    let json = decode_payload_json(encoded)?;
    serde_json::from_str(&json)
        .map_err(|e| NovaError::import_failed(format!("Share data is not valid JSON: {}", e)))
}

fn with_param(base_url: &str, param: &str, payload: &str) -> Result<String> {
    let mut url = Url::parse(base_url).map_err(|e| NovaError::ConfigError {
        message: format!("Invalid share base URL '{}': {}", base_url, e),
    })?;
    url.query_pairs_mut().clear().append_pair(param, payload);
    Ok(url.into())
}

/// Builds a `?data=` link for a goal list.
pub fn goals_share_url(base_url: &str, goals: &[Goal]) -> Result<String> {
    let payload = encode_payload(goals)?;
    with_param(base_url, DATA_PARAM, &payload)
}

/// Builds a `?folder_share=` link for a folder.
pub fn folder_share_url(base_url: &str, share: &FolderShare) -> Result<String> {
    let payload = encode_payload(share)?;
    with_param(base_url, FOLDER_SHARE_PARAM, &payload)
}

/// Decodes a share link produced by [`goals_share_url`] or [`folder_share_url`].
///
/// Goal lists go through the same shape check as file imports.
pub fn parse_share_url(link: &str) -> Result<SharedLink> {
    let url = Url::parse(link.trim())
        .map_err(|e| NovaError::import_failed(format!("Not a valid link: {}", e)))?;

    for (key, value) in url.query_pairs() {
        if key == DATA_PARAM {
            let json = decode_payload_json(&value)?;
            let raw: serde_json::Value = serde_json::from_str(&json).map_err(|e| {
                NovaError::import_failed(format!("Share data is not valid JSON: {}", e))
            })?;
            return transfer::goals_from_value(raw).map(SharedLink::Goals);
        }
        if key == FOLDER_SHARE_PARAM {
            return decode_payload::<FolderShare>(&value).map(SharedLink::Folder);
        }
    }

    Err(NovaError::import_failed(format!(
        "Link has neither '{}' nor '{}' parameter",
        DATA_PARAM, FOLDER_SHARE_PARAM
    )))
}

/// Turns long links into short ones.
#[async_trait]
pub trait LinkShortener: Send + Sync {
    async fn shorten(&self, long_url: &str) -> Result<String>;
}

/// Shortener speaking the plain-text `GET <endpoint>?url=<long url>` protocol.
pub struct HttpLinkShortener {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpLinkShortener {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl LinkShortener for HttpLinkShortener {
    async fn shorten(&self, long_url: &str) -> Result<String> {
        debug!("Requesting short link from {}", self.endpoint);
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("url", long_url)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NovaError::RemoteService {
                message: format!("Link shortener answered {}", status),
            });
        }

        let short = response.text().await?.trim().to_string();
        if !(short.starts_with("http://") || short.starts_with("https://")) {
            return Err(NovaError::RemoteService {
                message: format!("Link shortener returned '{}'", short),
            });
        }
        Ok(short)
    }
}

/// Shortens `long_url` when it exceeds `threshold` characters.
///
/// Offline mode, a missing shortener and any shortener failure all yield the
/// original link.
pub async fn shorten_if_needed(
    long_url: String,
    threshold: usize,
    shortener: Option<&dyn LinkShortener>,
    offline: bool,
) -> String {
    if long_url.len() <= threshold {
        return long_url;
    }
    let Some(shortener) = shortener else {
        return long_url;
    };
    if offline {
        debug!("Offline mode: keeping {}-character link", long_url.len());
        return long_url;
    }

    match shortener.shorten(&long_url).await {
        Ok(short) => short,
        Err(e) => {
            error!("Link shortening failed, using the full link: {}", e);
            long_url
        }
    }
}
