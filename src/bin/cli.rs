//! Droid Explorer - automated GUI exploration of Android apps
//!
//! This is the CLI entry point for the droid-explorer tool.
//! Run with: cargo run --bin droid-explorer

use droid_explorer::store::{CoverageMonitor, StatementRecord};
use droid_explorer::{
    AdbBridge, AdbConnection, DaemonClient, ExplorationEngine, Explorer, ExplorerSettings,
};
use std::env;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();

    // Saved settings first, environment on top
    let mut settings = ExplorerSettings::load();
    settings.apply_env();

    let adb = Arc::new(AdbConnection::with_path(&settings.adb_path));

    if args.iter().any(|arg| arg == "--list-devices") {
        let devices = adb.list_devices()?;
        if devices.is_empty() {
            println!("No devices connected.");
        }
        for device in devices {
            println!(
                "{}\t{}\t{}",
                device.serial,
                device.status,
                device.model.as_deref().unwrap_or("-")
            );
        }
        return Ok(());
    }

    if args.iter().any(|arg| arg == "--save-settings") {
        settings.save().map_err(anyhow::Error::msg)?;
        if let Some(path) = ExplorerSettings::settings_path() {
            println!("Settings saved to {}", path.display());
        }
        return Ok(());
    }

    if settings.app_package.is_empty() {
        anyhow::bail!("APP_PACKAGE is not set");
    }
    if settings.device_serial.is_empty() {
        settings.device_serial = match adb.list_devices()?.into_iter().find(|d| d.status == "device") {
            Some(device) => device.serial,
            None => anyhow::bail!("No device connected and DEVICE_SERIAL is not set"),
        };
    }

    println!("Droid Explorer - automated Android GUI exploration");
    println!("==================================================");
    println!("App: {}", settings.app_package);
    println!("Device: {}", settings.device_serial);
    println!("Daemon port: {}", settings.daemon_port);
    if !settings.playback_trace.is_empty() {
        println!("Replaying: {}", settings.playback_trace);
    }
    if settings.action_limit > 0 {
        println!("Action limit: {}", settings.action_limit);
    }
    if settings.time_limit_secs > 0 {
        println!("Time limit: {}s", settings.time_limit_secs);
    }
    println!("==================================================\n");

    let client = DaemonClient::new(adb.clone(), settings.daemon_config());
    let engine = ExplorationEngine::new(settings.engine_config(), settings.strategy_pool()?);
    let mut explorer = Explorer::new(client, engine, settings.exploration_config());

    if !settings.coverage_dir.is_empty() {
        let serial = settings.device_serial.clone();
        let tag = settings.coverage_log_tag.clone();
        let reader_adb = adb.clone();
        let reader = Box::new(move || match reader_adb.read_logcat(&serial, &tag) {
            Ok(lines) => lines.iter().filter_map(|l| StatementRecord::parse(l)).collect(),
            Err(e) => {
                tracing::warn!("Failed to read executed statements: {}", e);
                Vec::new()
            }
        });
        let monitor = CoverageMonitor::from_dir(&settings.coverage_dir, &settings.app_package, reader)?;
        explorer = explorer.with_coverage(monitor);
    }

    let summary = explorer.explore().await?;

    println!("\n==================================================");
    println!("Actions: {}", summary.actions);
    println!("Distinct screens: {}", summary.distinct_screens);
    println!("Duration: {:.1}s", summary.duration.as_secs_f64());
    if let Some(reason) = &summary.termination_reason {
        println!("Terminated: {}", reason);
    }
    if let Some(coverage) = summary.coverage {
        println!("Statement coverage: {:.2}%", coverage * 100.0);
    }
    println!("==================================================");

    Ok(())
}
