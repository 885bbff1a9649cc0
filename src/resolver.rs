use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::client::PlaylistApi;
use crate::duration::parse_duration;
use crate::error::Result;
use crate::retry::RetryPolicy;

/// Why a video contributes (or fails to contribute) to the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    Resolved,
    Unavailable,
    ParseError,
}

/// Parsed duration for one video. `seconds` is zero unless `status` is
/// `Resolved`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoDuration {
    pub video_id: String,
    pub seconds: u64,
    pub status: ResolutionStatus,
}

impl VideoDuration {
    fn unavailable(video_id: String) -> Self {
        Self {
            video_id,
            seconds: 0,
            status: ResolutionStatus::Unavailable,
        }
    }
}

/// Batched duration lookup with bounded fan-out.
///
/// Ids are grouped into batches of at most `batch_size` (the platform's
/// per-request limit); up to `concurrency` batches are in flight at once.
/// Each batch accumulates into its own local map and the maps are merged at
/// the end, so completion order never affects the result.
pub struct DurationResolver<'a, A: PlaylistApi> {
    api: &'a A,
    batch_size: usize,
    concurrency: usize,
    retry: RetryPolicy,
}

impl<'a, A: PlaylistApi> DurationResolver<'a, A> {
    pub fn new(api: &'a A, batch_size: usize, concurrency: usize, retry: RetryPolicy) -> Self {
        Self {
            api,
            batch_size: batch_size.max(1),
            concurrency: concurrency.max(1),
            retry,
        }
    }

    /// Resolves durations for the given ids, producing one entry per
    /// distinct id. Videos missing from the platform response come back as
    /// `Unavailable`; unparseable duration tokens come back as `ParseError`.
    /// Batch-level transport failures are retried per batch; terminal
    /// failures abort the whole resolve.
    pub async fn resolve(&self, ids: &[String]) -> Result<HashMap<String, VideoDuration>> {
        let mut seen = HashSet::new();
        let distinct: Vec<String> = ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();

        let batches: Vec<Vec<String>> = distinct
            .chunks(self.batch_size)
            .map(|chunk| chunk.to_vec())
            .collect();
        debug!(
            videos = distinct.len(),
            batches = batches.len(),
            concurrency = self.concurrency,
            "resolving durations"
        );

        let partials: Vec<HashMap<String, VideoDuration>> = stream::iter(batches)
            .map(|batch| self.resolve_batch(batch))
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;

        let mut merged = HashMap::with_capacity(distinct.len());
        for partial in partials {
            merged.extend(partial);
        }
        Ok(merged)
    }

    async fn resolve_batch(&self, batch: Vec<String>) -> Result<HashMap<String, VideoDuration>> {
        let details = self
            .retry
            .run("video details batch", || self.api.video_details(&batch))
            .await?;

        let mut resolved = HashMap::with_capacity(batch.len());
        for item in details {
            let entry = match parse_duration(&item.duration) {
                Ok(seconds) => VideoDuration {
                    video_id: item.id.clone(),
                    seconds,
                    status: ResolutionStatus::Resolved,
                },
                Err(err) => {
                    warn!("unparseable duration for video {}: {}", item.id, err);
                    VideoDuration {
                        video_id: item.id.clone(),
                        seconds: 0,
                        status: ResolutionStatus::ParseError,
                    }
                }
            };
            resolved.insert(item.id, entry);
        }

        // Deleted and private videos are silently absent from the response.
        for id in batch {
            if !resolved.contains_key(&id) {
                warn!("video {} missing from metadata response, marking unavailable", id);
                resolved.insert(id.clone(), VideoDuration::unavailable(id));
            }
        }
        Ok(resolved)
    }
}
