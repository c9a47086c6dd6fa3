//! # Watch Tracker Example
//!
//! Connects to a running DKR Rando auto-tracker server and prints every event
//! the tracker reports. Warp map updates are accumulated into an area graph
//! and, when `--svg` is given, redrawn to that file after each change.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --example watch_tracker -- --port 4675 --svg map.svg
//! ```
//!
//! Press Ctrl-C to stop.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use dkr_map::{layout, render_svg, AreaGraph, LayoutOptions};
use dkr_tracker::logging::{init_logging, LoggingMode};
use dkr_tracker::payload::{decode, GoldBalloons};
use dkr_tracker::{Callbacks, DkrRandoAutoTracker, TrackerConfig, DEFAULT_PORT};
use parking_lot::Mutex;

#[derive(Debug, Parser)]
#[command(about = "Print events from a DKR Rando auto-tracker server")]
struct Args {
    /// Server port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Server host
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Delay between polling cycles in milliseconds
    #[arg(short, long, default_value_t = 1000)]
    delay: u64,

    /// Failed probes before reconnectFailed fires
    #[arg(short, long, default_value_t = 5)]
    reconnect_attempts: u32,

    /// Redraw the warp map to this SVG file on every map update
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Width and height of the SVG canvas in pixels
    #[arg(long, default_value_t = 500.0)]
    size: f64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(LoggingMode::Development)?;

    let graph = Arc::new(Mutex::new(AreaGraph::new()));
    let svg_path = args.svg.clone();
    let layout_options = LayoutOptions::default().with_size(args.size, args.size);

    let callbacks = Callbacks::new()
        .on_connected(|first| {
            if first {
                println!("connected");
            } else {
                println!("reconnected");
            }
        })
        .on_disconnected(|| println!("disconnected"))
        .on_reconnect_failed(|| {
            println!("server still unreachable");
            false
        })
        .on_server_error(|error| {
            println!("server error: {error}");
            false
        })
        .on_save_data_updated(|save| println!("save data updated: {save}"))
        .on_gold_balloons_updated(|value| match decode::<GoldBalloons>(value) {
            Ok(balloons) => println!("gold balloons: {}", balloons.total()),
            Err(e) => println!("unreadable gold balloon payload: {e}"),
        })
        .on_map_updated(move |map| {
            let mut graph = graph.lock();
            match graph.merge_value(map) {
                Ok(added) => println!("map updated: {added} new warps"),
                Err(e) => {
                    println!("unreadable map payload: {e}");
                    return;
                }
            }

            if let Some(path) = &svg_path {
                let svg = render_svg(&layout(&graph, &layout_options));
                if let Err(e) = std::fs::write(path, svg) {
                    println!("failed to write {}: {e}", path.display());
                }
            }
        });

    let config = TrackerConfig::new()
        .with_host(args.host)
        .with_port(args.port)
        .with_loop_delay(Duration::from_millis(args.delay))
        .with_reconnect_attempts(args.reconnect_attempts);

    let tracker = DkrRandoAutoTracker::with_config(config, callbacks)
        .context("failed to start tracker")?;
    println!("watching port {}, press Ctrl-C to stop", tracker.port());

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    tracker.stop_internal_loop();
    println!("{}", tracker.stats());
    Ok(())
}
