//! Smartwatch demo driven by the uiharness automation server
//!
//! Run it, then talk to it with the CLI:
//!
//! ```text
//! uiharness widgets
//! uiharness click heart_area
//! uiharness screenshot -o watch.png
//! ```

mod app;
mod host;
mod watch;

use anyhow::Result;
use eframe::egui;
use tracing_subscriber::EnvFilter;
use uiharness_core::{Harness, HarnessConfig};

use crate::app::{WINDOW_SIZE, WatchApp};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let harness = Harness::new(HarnessConfig::from_env());
    let addr = harness.start_server_thread()?;
    tracing::info!("Automation server listening on {}", addr);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([WINDOW_SIZE, WINDOW_SIZE])
            .with_resizable(false),
        ..Default::default()
    };

    eframe::run_native(
        "Smartwatch",
        options,
        Box::new(move |cc| Ok(Box::new(WatchApp::new(cc, &harness)?))),
    )
    .map_err(|e| anyhow::anyhow!("Event loop failed: {}", e))
}
