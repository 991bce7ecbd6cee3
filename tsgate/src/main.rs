//! tsgate - live MPEG-TS to HLS transmuxing gateway.
//!
//! Point it at nothing; point your players at it. A playlist request with
//! `?src=<upstream TS URL>` starts one transmuxing pipeline for that source,
//! shared by every viewer, torn down automatically once nobody asks anymore.

mod server;

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tsgate_hls::{GatewayConfig, StreamRegistry};

#[derive(Parser, Debug)]
#[command(name = "tsgate")]
#[command(version)]
#[command(about = "Live MPEG-TS to HLS transmuxing gateway")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:1323")]
    addr: String,

    /// Segment duration in seconds
    #[arg(long, default_value_t = 1.0)]
    interval: f64,

    /// Playlist window size in segments
    #[arg(long, default_value_t = 5)]
    window: usize,

    /// Seconds a finished segment stays retrievable
    #[arg(long, default_value_t = 60)]
    segment_ttl: u64,

    /// Idle seconds before a stream session is evicted
    #[arg(long, default_value_t = 180)]
    session_ttl: u64,

    /// Seconds between registry maintenance sweeps
    #[arg(long, default_value_t = 300)]
    sweep_interval: u64,
}

impl Args {
    fn into_config(self) -> GatewayConfig {
        GatewayConfig {
            listen_addr: self.addr,
            segment_interval: Duration::from_secs_f64(self.interval.max(0.1)),
            playlist_window: self.window,
            segment_ttl: Duration::from_secs(self.segment_ttl),
            registry_ttl: Duration::from_secs(self.session_ttl),
            sweep_interval: Duration::from_secs(self.sweep_interval),
            ..GatewayConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Args::parse().into_config();
    let addr = config.listen_addr.clone();
    let sweep_interval = config.sweep_interval;
    let registry = StreamRegistry::new(config);

    // periodic janitor for expired registry entries
    let sweeper = Arc::clone(&registry);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            sweeper.sweep();
        }
    });

    server::run(registry, &addr).await?;
    Ok(())
}
