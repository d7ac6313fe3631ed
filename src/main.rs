//! # tether
//!
//! Headless host shell: drives one bridge session over stdin/stdout with
//! desktop stand-ins for the device capabilities. Outbound messages are
//! printed one per line on stdout; logs go to stderr.

#![deny(unsafe_code)]

mod console;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use tether_bridge::{Bridge, Hosts, Shutdown};
use tether_core::host::LocationHistory;
use tether_core::{Fix, HostInput, NativeEvent};
use tether_host::{DesktopShell, FileCamera, JpegResizer, SimulatedLocation};
use tether_settings::BridgeSettings;
use tether_store::{Database, LocationHistoryRepo};
use tether_telemetry::TelemetryConfig;

/// Headless tether host shell.
#[derive(Parser, Debug)]
#[command(name = "tether", about = "Headless tether host shell")]
struct Cli {
    /// Settings file (defaults to ~/.tether/settings.json).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Still image the simulated camera returns for every shot. Must live
    /// outside the temp and cache dirs, which are purged on foreground.
    #[arg(long, default_value = "still.jpg")]
    still_image: PathBuf,

    /// Simulated route, `lat,lng[,accuracy]` points separated by `;`.
    #[arg(long)]
    route: Option<String>,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,
}

fn default_route() -> Vec<Fix> {
    vec![
        Fix::new(18.5204, 73.8567, Some(8.0)),
        Fix::new(18.5210, 73.8572, Some(35.0)),
        Fix::new(18.5216, 73.8579, Some(12.0)),
    ]
}

fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory: {}", path.display()))
}

fn open_history(settings: &BridgeSettings) -> Result<Option<Arc<dyn LocationHistory>>> {
    let Some(history) = &settings.history else {
        return Ok(None);
    };
    let db = Database::open(&history.db_path)
        .with_context(|| format!("Failed to open history db: {}", history.db_path.display()))?;
    let repo = LocationHistoryRepo::new(db);
    match repo.latest(&history.group_key, &history.subject_id) {
        Ok(Some(row)) => tracing::info!(
            path = %history.db_path.display(),
            lat = %row.lat,
            lng = %row.lng,
            at = %row.updated_at,
            "location history enabled, last recorded position"
        ),
        Ok(None) => tracing::info!(path = %history.db_path.display(), "location history enabled"),
        Err(e) => tracing::warn!(error = %e, "cannot read last recorded position"),
    }
    Ok(Some(Arc::new(repo)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.settings {
        Some(path) => tether_settings::load_settings_from_path(path),
        None => tether_settings::load_settings(),
    }
    .context("Failed to load settings")?;

    let _ = tether_telemetry::init_telemetry(&TelemetryConfig::from_level_str(
        &settings.logging.level,
        settings.logging.json || cli.json_logs,
    ));

    ensure_dir(&settings.lifecycle.temp_dir)?;
    ensure_dir(&settings.lifecycle.cache_dir)?;
    let output_dir = settings
        .capture
        .output_dir
        .clone()
        .unwrap_or_else(|| settings.lifecycle.temp_dir.clone());
    ensure_dir(&output_dir)?;

    let route = match &cli.route {
        Some(points) => console::parse_route(points)?,
        None => default_route(),
    };
    let location = Arc::new(SimulatedLocation::new(route));
    let shell = Arc::new(DesktopShell::new());

    let hosts = Hosts {
        location: location.clone(),
        camera: Arc::new(FileCamera::new(cli.still_image.clone(), output_dir.clone())),
        resizer: Arc::new(JpegResizer::new(output_dir)),
        shell: shell.clone(),
        connectivity: shell,
        history: open_history(&settings)?,
    };

    let (bridge, handle, mut surface) = Bridge::new(&settings, hosts);
    tracing::info!(
        version = %settings.shell.installed_version,
        content = %settings.shell.content_url,
        "tether shell ready"
    );

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(wire) = surface.recv().await {
            if stdout.write_all(wire.as_bytes()).await.is_err()
                || stdout.write_all(b"\n").await.is_err()
                || stdout.flush().await.is_err()
            {
                break;
            }
        }
    });

    let mut bridge_task = tokio::spawn(bridge.run());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let reason = loop {
        tokio::select! {
            done = &mut bridge_task => {
                break done.context("bridge task failed")?;
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    drop(handle);
                    break bridge_task.await.context("bridge task failed")?;
                };
                let input = match console::parse_line(&line) {
                    Ok(Some(input)) => input,
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::warn!(line = %line, error = %e, "unparsable input line");
                        continue;
                    }
                };
                if let HostInput::Native(NativeEvent::LocationStatus { location_on }) = &input {
                    location.set_enabled(*location_on);
                }
                if !handle.send(input).await {
                    break bridge_task.await.context("bridge task failed")?;
                }
            }
        }
    };

    let _ = tokio::time::timeout(Duration::from_secs(1), writer).await;
    match reason {
        Shutdown::ExitRequested => {
            tracing::info!("exit requested by surface");
            // A pending stdin read holds a blocking thread the runtime would
            // wait on forever at shutdown.
            std::process::exit(0);
        }
        Shutdown::Closed => tracing::info!("input closed"),
    }
    Ok(())
}
