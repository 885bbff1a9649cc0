use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

const PLAYLIST_ITEMS_URL: &str = "https://www.googleapis.com/youtube/v3/playlistItems";
const VIDEOS_URL: &str = "https://www.googleapis.com/youtube/v3/videos";

/// Page size requested from the playlistItems endpoint (the API maximum).
const PAGE_SIZE: &str = "50";

/// One page of playlist membership as reported by the platform.
#[derive(Debug, Clone)]
pub struct PlaylistPage {
    /// Video ids in page-local order.
    pub video_ids: Vec<String>,
    /// Cursor for the next page; `None` on the last page.
    pub next_page_token: Option<String>,
    /// Platform's estimate of the full playlist size, when reported.
    pub total_results: Option<u64>,
}

/// Duration metadata for a single video. The duration stays an opaque
/// ISO-8601 token here; parsing happens in the resolver.
#[derive(Debug, Clone)]
pub struct VideoDetails {
    pub id: String,
    pub duration: String,
}

/// The two platform operations the aggregation core depends on.
///
/// Implementations issue exactly one network call per invocation and never
/// retry internally; retry policy belongs to the walker and resolver.
#[async_trait]
pub trait PlaylistApi: Send + Sync {
    /// Lists one page of playlist items. A `page_token` from a previous
    /// page continues the listing; `None` starts from the beginning.
    async fn list_page(
        &self,
        playlist_id: &str,
        page_token: Option<&str>,
    ) -> Result<PlaylistPage>;

    /// Fetches duration metadata for one batch of video ids. Deleted or
    /// private videos are simply absent from the returned list.
    async fn video_details(&self, ids: &[String]) -> Result<Vec<VideoDetails>>;
}

/// Matches the `list=` query parameter in URLs that `Url::parse` cannot
/// handle, such as scheme-less `www.youtube.com/playlist?list=...`.
fn list_param_pattern() -> &'static regex::Regex {
    static PATTERN: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    PATTERN.get_or_init(|| {
        regex::Regex::new(r"[?&]list=([a-zA-Z0-9_-]+)").expect("list pattern is valid")
    })
}

/// Pulls the playlist id out of a YouTube URL (`?list=...`), or passes a
/// bare playlist id through unchanged. Scheme-less URLs are accepted.
pub fn extract_playlist_id(input: &str) -> Result<String> {
    if let Ok(url) = Url::parse(input) {
        return url
            .query_pairs()
            .find(|(key, _)| key == "list")
            .map(|(_, value)| value.into_owned())
            .ok_or_else(|| Error::NotFound(format!("no playlist id in URL: {}", input)));
    }

    if let Some(caps) = list_param_pattern().captures(input) {
        return Ok(caps[1].to_string());
    }

    let looks_like_id = !input.is_empty()
        && input
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if looks_like_id {
        Ok(input.to_string())
    } else {
        Err(Error::NotFound(format!("not a playlist URL or id: {}", input)))
    }
}

/// YouTube Data API v3 client.
pub struct DataApiClient {
    http: reqwest::Client,
    api_key: String,
}

impl DataApiClient {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
        subject: &str,
    ) -> Result<T> {
        let response = self.http.get(endpoint).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, subject, &body));
        }
        // An undecodable body is treated like any other flaky response.
        response
            .json::<T>()
            .await
            .map_err(|e| Error::Transient(format!("undecodable API response: {}", e)))
    }
}

fn error_for_status(status: StatusCode, subject: &str, body: &str) -> Error {
    match status {
        StatusCode::NOT_FOUND => Error::NotFound(subject.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Error::Auth(format!("API returned {}: {}", status, body))
        }
        StatusCode::TOO_MANY_REQUESTS => Error::RateLimited,
        other => Error::Transient(format!("API error {}: {}", other, body)),
    }
}

#[async_trait]
impl PlaylistApi for DataApiClient {
    async fn list_page(
        &self,
        playlist_id: &str,
        page_token: Option<&str>,
    ) -> Result<PlaylistPage> {
        let mut query = vec![
            ("part", "contentDetails"),
            ("playlistId", playlist_id),
            ("maxResults", PAGE_SIZE),
            ("key", self.api_key.as_str()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        debug!(playlist_id, page_token = page_token.unwrap_or(""), "listing playlist page");
        let response: PlaylistItemsResponse = self
            .get_json(PLAYLIST_ITEMS_URL, &query, playlist_id)
            .await?;

        Ok(PlaylistPage {
            video_ids: response
                .items
                .into_iter()
                .map(|item| item.content_details.video_id)
                .collect(),
            next_page_token: response.next_page_token.filter(|t| !t.is_empty()),
            total_results: response.page_info.and_then(|p| p.total_results),
        })
    }

    async fn video_details(&self, ids: &[String]) -> Result<Vec<VideoDetails>> {
        let joined = ids.join(",");
        let query = [
            ("part", "contentDetails"),
            ("id", joined.as_str()),
            ("key", self.api_key.as_str()),
        ];

        debug!(batch_size = ids.len(), "fetching video details batch");
        let response: VideosResponse = self.get_json(VIDEOS_URL, &query, &joined).await?;

        Ok(response
            .items
            .into_iter()
            .map(|item| VideoDetails {
                id: item.id,
                duration: item.content_details.duration,
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemsResponse {
    #[serde(default)]
    items: Vec<PlaylistItem>,
    next_page_token: Option<String>,
    page_info: Option<PageInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItem {
    content_details: PlaylistItemContentDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemContentDetails {
    video_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    total_results: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    content_details: VideoContentDetails,
}

#[derive(Debug, Deserialize)]
struct VideoContentDetails {
    duration: String,
}
