mod collector;
mod config;
mod error;
mod gui;
mod logger;
mod platform;
mod remediation;
mod report;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use eframe::egui;
use tracing::{error, info};

use crate::collector::SignalCollector;
use crate::config::Settings;
use crate::platform::Platform;
use crate::report::{DeviceSignals, Verdict};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

/// Device security status at a glance: secure lock, developer mode, rooted
/// heuristic, storage encryption and network security.
#[derive(Parser)]
#[command(name = "devguard", version, about)]
struct Cli {
    /// Settings file (JSON). Defaults to ./devguard.json when present.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run the checks once, print a report and exit instead of opening the window
    #[arg(long)]
    headless: bool,

    /// Report format for --headless
    #[arg(short, long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("ERROR: {e}");
            return ExitCode::FAILURE;
        }
    };
    logger::init(cli.verbose, &settings.log_level);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("devguard-probe")
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let os = settings.os();
    let platform = Platform::host(os, &settings.reachability_host);
    info!("Starting devguard on {os}");

    if cli.headless {
        return run_headless(&runtime, &settings, &platform, cli.format);
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([420.0, 720.0])
            .with_min_inner_size([360.0, 560.0]),
        ..Default::default()
    };
    let handle = runtime.handle().clone();
    let result = eframe::run_native(
        "devguard",
        options,
        Box::new(move |cc| Box::new(gui::MainApp::new(cc, settings, platform, handle))),
    );
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Window closed with error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_headless(
    runtime: &tokio::runtime::Runtime,
    settings: &Settings,
    platform: &Platform,
    format: Format,
) -> ExitCode {
    let mut signals = DeviceSignals::new(settings.developer_mode());
    let collector = SignalCollector::start(
        runtime.handle(),
        platform,
        settings.probe_timeout(),
        Arc::new(|| {}),
    );
    runtime.block_on(collector.collect(&mut signals));

    let indicators = signals.indicators();
    match format {
        Format::Text => report::print_summary(&indicators),
        Format::Json => match report::to_json(&platform.os.to_string(), &indicators) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                error!("Failed to encode report: {e}");
                return ExitCode::FAILURE;
            }
        },
    }

    if report::verdict(&indicators) == Verdict::Secure {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
