use serde::{Deserialize, Serialize};

/// Request payload for minting a media handle
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResolveRequest {
    pub room: String,
    pub password: String,
    #[serde(alias = "tempUser")]
    pub identity: String,
    pub path: String,
}

/// A minted handle, as returned to the host
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveResponse {
    pub token: String,
    /// Path clients fetch the media from
    pub url: String,
    /// Expiry in unix milliseconds
    pub expires_at: i64,
    pub source_type: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MediaRootRequest {
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRootResponse {
    pub media_root: Option<String>,
}
