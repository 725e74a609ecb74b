use clap::Parser;
use skip_segments::config::Config;
use skip_segments::page::StaticPage;
use skip_segments::types::SegmentResponse;
use skip_segments::{FetchCoordinator, VideoId};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Look up skip segments for a video, optionally following it while fresh.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Video id to look up
    video_id: String,

    /// Upload/air date label as shown on the watch page; treated as actively playing
    #[arg(long)]
    upload_label: Option<String>,

    /// URL fragment of the watch page, e.g. "#requiredSegment=..."
    #[arg(long)]
    fragment: Option<String>,

    /// Keep running and log every auto-refresh until Ctrl-C
    #[arg(long)]
    watch: bool,
}

fn log_response(video_id: &VideoId, response: &SegmentResponse) {
    match &response.segments {
        Some(segments) => {
            info!("{} segments for {} (status {})", segments.len(), video_id, response.status);
            for segment in segments {
                info!(
                    "  {:>8.2}s - {:>8.2}s  {:<16} {:<8} {}",
                    segment.start(),
                    segment.end(),
                    segment.category,
                    segment.action_type.as_str(),
                    segment.uuid
                );
            }
        }
        None => info!("No segments for {} (status {})", video_id, response.status),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    info!("🚀 Looking up segments on {}", config.server_url);

    let page = match &args.upload_label {
        Some(label) => StaticPage::playing(label.clone()),
        None => StaticPage::new(),
    };
    if let Some(fragment) = &args.fragment {
        page.set_fragment(fragment);
    }

    let coordinator = match FetchCoordinator::new(config, Arc::new(page)) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to create coordinator: {}", e);
            std::process::exit(1);
        }
    };

    let mut updates = coordinator.subscribe();
    let video_id = VideoId::new(args.video_id);
    let response = coordinator.get_segments_for_video(&video_id, false).await;
    log_response(&video_id, &response);

    if !args.watch {
        return;
    }

    if coordinator.refresh_state().is_none() {
        warn!("{} does not look fresh; nothing to watch", video_id);
        return;
    }

    let mut expiry_check = tokio::time::interval(Duration::from_secs(5));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                coordinator.stop_auto_refresh();
                info!("Stopped");
                break;
            }
            update = updates.recv() => match update {
                Ok(update) => log_response(&update.video_id, &update.response),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Missed {} refresh updates", skipped);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            _ = expiry_check.tick() => {}
        }

        if coordinator.refresh_state().is_none() {
            info!("Auto-refresh for {} expired", video_id);
            break;
        }
    }
}
