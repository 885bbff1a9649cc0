use anyhow::{anyhow, Result};
use clap::{Arg, Command};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use playlist_timer::{
    at_speed, extract_playlist_id, format_duration, Config, DataApiClient, PlaylistTimer,
};

const PLAYBACK_SPEEDS: [f64; 4] = [1.25, 1.5, 1.75, 2.0];

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("playlist_timer=info,warn")
        .init();

    let matches = Command::new("playlist-timer")
        .version("0.1.0")
        .about("Computes the total runtime of a YouTube playlist")
        .arg(
            Arg::new("playlist")
                .value_name("URL_OR_ID")
                .help("Playlist URL (with a list= parameter) or bare playlist id")
                .required(true),
        )
        .arg(
            Arg::new("api-key")
                .short('k')
                .long("api-key")
                .value_name("KEY")
                .help("YouTube Data API key (overrides config file and YOUTUBE_API_KEY)"),
        )
        .arg(
            Arg::new("concurrency")
                .short('c')
                .long("concurrency")
                .value_name("NUM")
                .help("Concurrent metadata batches (1 = sequential)"),
        )
        .arg(
            Arg::new("timeout")
                .short('t')
                .long("timeout")
                .value_name("SECONDS")
                .help("Overall deadline for the whole aggregation"),
        )
        .arg(
            Arg::new("per-video")
                .long("per-video")
                .help("Print every video's duration, in playlist order")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Emit the aggregate result as JSON instead of text")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        warn!("Failed to load config, using defaults: {}", e);
        Config::default()
    });

    let api_key = matches
        .get_one::<String>("api-key")
        .cloned()
        .or_else(|| config.api.api_key.clone())
        .ok_or_else(|| anyhow!("no API key: pass --api-key or set YOUTUBE_API_KEY"))?;

    let input = matches
        .get_one::<String>("playlist")
        .expect("playlist argument is required");
    let playlist_id = extract_playlist_id(input)?;

    let timeout = matches
        .get_one::<String>("timeout")
        .map(|s| s.parse::<u64>())
        .transpose()?
        .map(Duration::from_secs);
    let mut options = config.aggregate_options(timeout);
    if let Some(concurrency) = matches.get_one::<String>("concurrency") {
        options.resolver_concurrency = concurrency.parse()?;
    }

    info!("🎬 Fetching playlist {}...", playlist_id);

    let client = DataApiClient::new(
        api_key,
        Duration::from_secs(config.api.request_timeout_seconds),
    )?;
    let timer = PlaylistTimer::with_options(client, options);

    // Ctrl-C aborts in-flight requests instead of leaving the run hanging.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling...");
                cancel.cancel();
            }
        });
    }

    let start = std::time::Instant::now();
    let result = timer.aggregate_with_cancel(&playlist_id, cancel).await?;
    info!(
        "✅ Aggregated {} videos in {:.2}s",
        result.video_count,
        start.elapsed().as_secs_f64()
    );

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if matches.get_flag("per-video") {
        for (i, video) in result.per_video.iter().enumerate() {
            println!(
                "{:4}. {}  {}",
                i + 1,
                video.video_id,
                format_duration(video.seconds)
            );
        }
        println!();
    }

    println!("Total duration: {}", format_duration(result.total_seconds));
    println!();
    for speed in PLAYBACK_SPEEDS {
        println!(
            "At {:.2}x: {}",
            speed,
            format_duration(at_speed(result.total_seconds, speed))
        );
    }

    if result.unresolved_count > 0 {
        warn!(
            "⚠️ {} of {} videos could not be resolved and contribute 0s",
            result.unresolved_count, result.video_count
        );
    }

    Ok(())
}
