use futures::TryStreamExt;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::client::PlaylistApi;
use crate::error::{Error, Result};
use crate::resolver::{DurationResolver, ResolutionStatus, VideoDuration};
use crate::retry::RetryPolicy;
use crate::walker::{PlaylistWalker, VideoRef};

/// Tuning knobs for one aggregation run.
///
/// Pagination is always sequential (continuation tokens are stateful
/// cursors); only batch resolution fans out.
#[derive(Debug, Clone)]
pub struct AggregateOptions {
    /// Maximum ids per metadata request.
    pub batch_size: usize,
    /// Concurrent duration batches in flight.
    pub resolver_concurrency: usize,
    /// Total tries per page/batch before giving up.
    pub retry_attempts: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    /// Overall deadline for one aggregation; `None` means no deadline.
    pub timeout: Option<Duration>,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            batch_size: 50,
            resolver_concurrency: 1,
            retry_attempts: 5,
            retry_base_delay: Duration::from_millis(500),
            retry_max_delay: Duration::from_secs(8),
            timeout: None,
        }
    }
}

impl AggregateOptions {
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry_attempts,
            base_delay: self.retry_base_delay,
            max_delay: self.retry_max_delay,
        }
    }
}

/// Complete aggregation outcome for one playlist.
///
/// `per_video` holds one entry per distinct video in playlist order;
/// `video_count` counts playlist entries, so it can exceed `per_video.len()`
/// when a playlist repeats a video.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateResult {
    pub playlist_id: String,
    /// Sum over entries with `Resolved` status; unresolved entries add 0.
    pub total_seconds: u64,
    pub video_count: usize,
    pub unresolved_count: usize,
    pub per_video: Vec<VideoDuration>,
}

/// Computes the total runtime of a playlist via the supplied API client.
pub struct PlaylistTimer<A: PlaylistApi> {
    api: A,
    options: AggregateOptions,
}

impl<A: PlaylistApi> PlaylistTimer<A> {
    pub fn new(api: A) -> Self {
        Self::with_options(api, AggregateOptions::default())
    }

    pub fn with_options(api: A, options: AggregateOptions) -> Self {
        Self { api, options }
    }

    /// Walks the playlist, resolves every duration, and folds the results.
    ///
    /// All-or-nothing: either a complete [`AggregateResult`] comes back, or
    /// exactly one of NotFound, Auth, ExhaustedRetries, Cancelled. A
    /// partially aggregated result is never observable.
    pub async fn aggregate(&self, playlist_id: &str) -> Result<AggregateResult> {
        self.aggregate_with_cancel(playlist_id, CancellationToken::new())
            .await
    }

    /// Like [`Self::aggregate`], but aborts with [`Error::Cancelled`] as
    /// soon as the token fires or the configured deadline passes, dropping
    /// any in-flight network call.
    pub async fn aggregate_with_cancel(
        &self,
        playlist_id: &str,
        cancel: CancellationToken,
    ) -> Result<AggregateResult> {
        let guarded = async {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(Error::Cancelled),
                result = self.aggregate_inner(playlist_id) => result,
            }
        };
        match self.options.timeout {
            Some(limit) => tokio::time::timeout(limit, guarded)
                .await
                .map_err(|_| Error::Cancelled)?,
            None => guarded.await,
        }
    }

    async fn aggregate_inner(&self, playlist_id: &str) -> Result<AggregateResult> {
        let retry = self.options.retry_policy();

        let walker = PlaylistWalker::new(&self.api, retry.clone());
        let refs: Vec<VideoRef> = walker.walk(playlist_id).try_collect().await?;
        info!("playlist {} has {} entries", playlist_id, refs.len());

        let ids: Vec<String> = refs.iter().map(|r| r.video_id.clone()).collect();
        let resolver = DurationResolver::new(
            &self.api,
            self.options.batch_size,
            self.options.resolver_concurrency,
            retry,
        );
        let durations = resolver.resolve(&ids).await?;

        let mut total_seconds: u64 = 0;
        let mut unresolved_count = 0;
        let mut per_video = Vec::with_capacity(refs.len());
        let mut emitted = HashSet::new();
        for video_ref in &refs {
            // A playlist can repeat a video; report each id once.
            if !emitted.insert(video_ref.video_id.as_str()) {
                continue;
            }
            let entry = durations.get(&video_ref.video_id).cloned().unwrap_or_else(|| {
                // Should not happen with correct batching.
                warn!(
                    "no resolution for video {}, treating as unavailable",
                    video_ref.video_id
                );
                VideoDuration {
                    video_id: video_ref.video_id.clone(),
                    seconds: 0,
                    status: ResolutionStatus::Unavailable,
                }
            });
            match entry.status {
                ResolutionStatus::Resolved => {
                    total_seconds = total_seconds.saturating_add(entry.seconds);
                }
                ResolutionStatus::Unavailable | ResolutionStatus::ParseError => {
                    unresolved_count += 1;
                }
            }
            per_video.push(entry);
        }

        if unresolved_count > 0 {
            warn!(
                "{} of {} videos in {} did not resolve",
                unresolved_count,
                refs.len(),
                playlist_id
            );
        }

        Ok(AggregateResult {
            playlist_id: playlist_id.to_string(),
            total_seconds,
            video_count: refs.len(),
            unresolved_count,
            per_video,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{PlaylistPage, VideoDetails};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// A whole fake platform: playlist pages plus a video metadata table.
    struct FakePlatform {
        pages: Vec<PlaylistPage>,
        durations: HashMap<String, String>,
        page_failures: AtomicU32,
    }

    impl FakePlatform {
        fn new(page_ids: &[&[&str]], durations: &[(&str, &str)]) -> Self {
            let last = page_ids.len().saturating_sub(1);
            let pages = page_ids
                .iter()
                .enumerate()
                .map(|(i, ids)| PlaylistPage {
                    video_ids: ids.iter().map(|s| s.to_string()).collect(),
                    next_page_token: (i < last).then(|| format!("page{}", i + 1)),
                    total_results: None,
                })
                .collect();
            Self {
                pages,
                durations: durations
                    .iter()
                    .map(|(id, d)| (id.to_string(), d.to_string()))
                    .collect(),
                page_failures: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl PlaylistApi for FakePlatform {
        async fn list_page(
            &self,
            playlist_id: &str,
            page_token: Option<&str>,
        ) -> Result<PlaylistPage> {
            if playlist_id == "PLmissing" {
                return Err(Error::NotFound(playlist_id.to_string()));
            }
            if self
                .page_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(Error::Transient("flaky".to_string()));
            }
            let index = match page_token {
                None => 0,
                Some(token) => token
                    .strip_prefix("page")
                    .and_then(|n| n.parse::<usize>().ok())
                    .expect("well-formed fake token"),
            };
            Ok(self.pages[index].clone())
        }

        async fn video_details(&self, ids: &[String]) -> Result<Vec<VideoDetails>> {
            Ok(ids
                .iter()
                .filter_map(|id| {
                    self.durations.get(id).map(|d| VideoDetails {
                        id: id.clone(),
                        duration: d.clone(),
                    })
                })
                .collect())
        }
    }

    fn quick_options() -> AggregateOptions {
        AggregateOptions {
            retry_base_delay: Duration::from_millis(10),
            retry_max_delay: Duration::from_millis(100),
            ..AggregateOptions::default()
        }
    }

    #[tokio::test]
    async fn test_aggregate_end_to_end_with_one_deleted_video() {
        let platform = FakePlatform::new(
            &[&["a", "b", "gone"]],
            &[("a", "PT1M"), ("b", "PT2M5S")],
        );
        let timer = PlaylistTimer::with_options(platform, quick_options());

        let result = timer.aggregate("PLtest").await.unwrap();

        assert_eq!(result.total_seconds, 185);
        assert_eq!(result.video_count, 3);
        assert_eq!(result.unresolved_count, 1);
        let order: Vec<&str> = result.per_video.iter().map(|v| v.video_id.as_str()).collect();
        assert_eq!(order, ["a", "b", "gone"]);
        assert_eq!(result.per_video[2].status, ResolutionStatus::Unavailable);
    }

    #[tokio::test]
    async fn test_aggregate_preserves_order_across_pages() {
        let platform = FakePlatform::new(
            &[&["a", "b"], &["c", "d"], &["e"]],
            &[
                ("a", "PT1S"),
                ("b", "PT2S"),
                ("c", "PT3S"),
                ("d", "PT4S"),
                ("e", "PT5S"),
            ],
        );
        let timer = PlaylistTimer::with_options(platform, quick_options());

        let result = timer.aggregate("PLtest").await.unwrap();

        assert_eq!(result.total_seconds, 15);
        assert_eq!(result.video_count, 5);
        assert_eq!(result.unresolved_count, 0);
        let order: Vec<&str> = result.per_video.iter().map(|v| v.video_id.as_str()).collect();
        assert_eq!(order, ["a", "b", "c", "d", "e"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_aggregate_survives_transient_page_failures() {
        let platform = FakePlatform::new(&[&["a"]], &[("a", "PT10S")]);
        platform.page_failures.store(2, Ordering::SeqCst);
        let timer = PlaylistTimer::with_options(platform, quick_options());

        let result = timer.aggregate("PLtest").await.unwrap();
        assert_eq!(result.total_seconds, 10);
        assert_eq!(result.video_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_aggregate_fails_with_exhausted_retries() {
        let platform = FakePlatform::new(&[&["a"]], &[("a", "PT10S")]);
        platform.page_failures.store(99, Ordering::SeqCst);
        let timer = PlaylistTimer::with_options(platform, quick_options());

        let result = timer.aggregate("PLtest").await;
        assert!(matches!(result, Err(Error::ExhaustedRetries { .. })));
    }

    #[tokio::test]
    async fn test_aggregate_propagates_not_found() {
        let platform = FakePlatform::new(&[&[]], &[]);
        let timer = PlaylistTimer::with_options(platform, quick_options());

        let result = timer.aggregate("PLmissing").await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_aggregate_counts_repeated_video_once() {
        let platform = FakePlatform::new(&[&["a", "a", "b"]], &[("a", "PT1M"), ("b", "PT30S")]);
        let timer = PlaylistTimer::with_options(platform, quick_options());

        let result = timer.aggregate("PLtest").await.unwrap();

        assert_eq!(result.video_count, 3);
        assert_eq!(result.per_video.len(), 2);
        assert_eq!(result.total_seconds, 90);
    }

    #[tokio::test]
    async fn test_aggregate_cancelled_token() {
        struct HangingApi;

        #[async_trait]
        impl PlaylistApi for HangingApi {
            async fn list_page(
                &self,
                _playlist_id: &str,
                _page_token: Option<&str>,
            ) -> Result<PlaylistPage> {
                futures::future::pending().await
            }
            async fn video_details(&self, _ids: &[String]) -> Result<Vec<VideoDetails>> {
                futures::future::pending().await
            }
        }

        let timer = PlaylistTimer::new(HangingApi);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = timer.aggregate_with_cancel("PLtest", cancel).await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_aggregate_deadline_maps_to_cancelled() {
        struct HangingApi;

        #[async_trait]
        impl PlaylistApi for HangingApi {
            async fn list_page(
                &self,
                _playlist_id: &str,
                _page_token: Option<&str>,
            ) -> Result<PlaylistPage> {
                futures::future::pending().await
            }
            async fn video_details(&self, _ids: &[String]) -> Result<Vec<VideoDetails>> {
                futures::future::pending().await
            }
        }

        let options = AggregateOptions {
            timeout: Some(Duration::from_millis(50)),
            ..AggregateOptions::default()
        };
        let timer = PlaylistTimer::with_options(HangingApi, options);

        let result = timer.aggregate("PLtest").await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_aggregate_empty_playlist() {
        let platform = FakePlatform::new(&[&[]], &[]);
        let timer = PlaylistTimer::with_options(platform, quick_options());

        let result = timer.aggregate("PLtest").await.unwrap();
        assert_eq!(result.total_seconds, 0);
        assert_eq!(result.video_count, 0);
        assert_eq!(result.unresolved_count, 0);
        assert!(result.per_video.is_empty());
    }
}
