//! vfeed player - scripted feed session
//!
//! Drives a feed controller over simulated native players through a typical
//! session: settle on the first item, scroll through the feed, scroll back to
//! the top, navigate away and return, then unmount. Every observed
//! `FeedEvent` is printed to stdout as one JSON line.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vfeed_common::config::{FeedConfig, ReclaimMode};
use vfeed_common::UnitId;
use vfeed_player::config::Settings;
use vfeed_player::playback::{FeedController, ViewableItem};
use vfeed_player::simulation::SimulatedPlayer;

/// Nominal item height used for scroll offsets
const ITEM_EXTENT: f64 = 800.0;

/// Command-line arguments for vfeed-player
#[derive(Parser, Debug)]
#[command(name = "vfeed-player")]
#[command(about = "Run a scripted feed playback session against simulated players")]
#[command(version)]
struct Args {
    /// Config file (overrides VFEED_CONFIG and the platform default)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of feed items
    #[arg(short, long, default_value = "5")]
    items: usize,

    /// Reclaim strategy override
    #[arg(long, env = "VFEED_RECLAIM")]
    reclaim: Option<ReclaimMode>,

    /// Index of an item whose player refuses to start
    #[arg(long)]
    fail_unit: Option<usize>,

    /// Make every native stop/unload hang this long
    #[arg(long, default_value = "0")]
    hang_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Configuration before tracing so the configured level can apply
    let (mut config, source) =
        FeedConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(mode) = args.reclaim {
        config.reclaim.mode = mode;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Configuration source: {:?}", source);

    let settings = Settings::from_config(&config).context("Invalid configuration")?;
    let window = settings.resolver.suppression_window;
    info!(
        "Starting feed session with {} items ({} reclaim)",
        args.items, settings.reclaim.mode
    );

    let controller = FeedController::new(&settings);
    let printer = spawn_event_printer(&controller);

    run_session(&controller, &args, window).await;

    if let Some(cleanup) = controller.on_unmount() {
        cleanup.await.context("Cleanup task failed")?;
    }
    drop(controller);

    let printed = printer.await.context("Event printer failed")?;
    info!("Session complete, {} events observed", printed);
    Ok(())
}

/// Print every feed event as JSON until the bus closes
fn spawn_event_printer(controller: &FeedController) -> tokio::task::JoinHandle<usize> {
    let mut rx = controller.events().subscribe();
    tokio::spawn(async move {
        let mut printed = 0;
        loop {
            match rx.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(line) => {
                        println!("{}", line);
                        printed += 1;
                    }
                    Err(e) => warn!("Failed to serialize {}: {}", event.event_type(), e),
                },
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Event printer lagged, {} events dropped", n);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
        printed
    })
}

async fn run_session(controller: &FeedController, args: &Args, window: Duration) {
    let ids: Vec<UnitId> = (0..args.items).map(|i| UnitId::new(format!("clip-{}", i))).collect();
    controller.replace_items(ids.clone()).await;

    for (index, id) in ids.iter().enumerate() {
        let mut player = SimulatedPlayer::new(id.clone());
        if args.hang_ms > 0 {
            player = player.with_hang(Duration::from_millis(args.hang_ms));
        }
        if args.fail_unit == Some(index) {
            player = player.failing_play();
        }
        controller.mount_unit(id.clone(), Arc::new(player)).await;
    }

    let settle = window + Duration::from_millis(50);

    // Swipe down one item at a time; offsets sampled mid-swipe are noise
    for index in 1..ids.len() {
        controller.on_scroll_begin().await;
        let target = index as f64 * ITEM_EXTENT;
        controller.on_scroll_offset(target - ITEM_EXTENT * 0.6, ITEM_EXTENT).await;
        controller.on_scroll_offset(target, ITEM_EXTENT).await;
        controller.on_momentum_end().await;
        tokio::time::sleep(settle).await;
    }

    // Fling back to the top
    controller.on_scroll_begin().await;
    controller
        .on_viewable_items(&[ViewableItem {
            index: 0,
            percent_visible: 100.0,
        }])
        .await;
    controller.on_momentum_end().await;
    tokio::time::sleep(settle).await;

    let muted = controller.toggle_mute().await;
    info!("Mute toggled, now {}", if muted { "muted" } else { "unmuted" });

    controller.on_navigate_away().await;
    controller.on_focus_regained().await;
}
