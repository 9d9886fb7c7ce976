//! signalvoid CLI
//!
//! Anonymous heartbeat density engine for spotting silent areas.

use clap::{Parser, Subcommand};
use signalvoid::{
    config::Config,
    core::{classify, CellId, Preset, WindowCounts},
    engine::{Engine, ObserverSession},
    report::BatchReport,
    source::{LocationSample, ReplayConfig, ReplayInput, ReplaySource},
    store::JsonlStore,
    transparency::{create_shared_log_with_persistence, SharedTransparencyLog},
    Policy, PRIVACY_DECLARATION, VERSION,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "gateway")]
use signalvoid::BlockingGatewayClient;

#[derive(Parser)]
#[command(name = "signalvoid")]
#[command(version = VERSION)]
#[command(about = "Anonymous heartbeat density engine for spotting silent areas", long_about = None)]
struct Cli {
    /// Heartbeat log to use instead of the configured one
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one heartbeat for a position and classify its cell
    Observe {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replay location fixes (CSV `lat,lng` or JSON lines) through single-cell mode
    Watch {
        /// Input file, or `-` for stdin
        #[arg(long, default_value = "-")]
        input: String,

        /// Delay between fixes in milliseconds
        #[arg(long, default_value = "0")]
        interval_ms: u64,
    },

    /// Classify a cell without sending a heartbeat
    Inspect {
        /// Cell id, e.g. grid_123_567
        cell_id: String,
        #[arg(long)]
        json: bool,
    },

    /// Classify every active cell
    Batch {
        /// Repeat every N seconds until Ctrl+C (defaults to one pass)
        #[arg(long)]
        interval: Option<u64>,

        /// Repeat at the configured batch interval until Ctrl+C
        #[arg(long)]
        repeat: bool,

        /// Publish each report to the gateway (requires gateway feature)
        #[arg(long)]
        publish: bool,
    },

    /// Classify raw counts with a policy preset
    Classify {
        #[arg(long, allow_hyphen_values = true)]
        recent: i64,
        #[arg(long, allow_hyphen_values = true)]
        baseline: i64,
        /// Policy preset (realtime or batch)
        #[arg(long, default_value = "realtime")]
        preset: String,
    },

    /// Run the HTTP server (requires server feature)
    Serve {
        /// Port to bind (defaults to the configured port)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Show engine status
    Status {
        /// Clear the cumulative transparency counters
        #[arg(long)]
        reset: bool,
    },

    /// Display privacy declaration
    Privacy,

    /// Show configuration
    Config {
        /// Write the current configuration to the config file
        #[arg(long)]
        init: bool,

        /// Set and save the display timezone (IANA name)
        #[arg(long)]
        timezone: Option<String>,
    },

    /// Show the built-in policy presets
    Presets,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config();

    match cli.command {
        Commands::Observe { lat, lng, json } => cmd_observe(&config, cli.store, lat, lng, json),
        Commands::Watch { input, interval_ms } => {
            cmd_watch(&config, cli.store, &input, interval_ms)
        }
        Commands::Inspect { cell_id, json } => cmd_inspect(&config, cli.store, &cell_id, json),
        Commands::Batch {
            interval,
            repeat,
            publish,
        } => {
            let interval = config.batch_interval(interval, repeat);
            cmd_batch(&config, cli.store, interval, publish)
        }
        Commands::Classify {
            recent,
            baseline,
            preset,
        } => cmd_classify(&config, recent, baseline, &preset),
        Commands::Serve { port } => cmd_serve(&config, cli.store, port),
        Commands::Status { reset } => cmd_status(&config, cli.store, reset),
        Commands::Privacy => cmd_privacy(),
        Commands::Config { init, timezone } => cmd_config(config, init, timezone),
        Commands::Presets => cmd_presets(),
    }
}

fn load_config() -> Config {
    match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config ({e}), using defaults");
            Config::default()
        }
    }
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {message}");
    std::process::exit(1);
}

fn open_store(config: &Config, store: Option<PathBuf>) -> JsonlStore {
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }
    JsonlStore::open(store.unwrap_or_else(|| config.store_path()))
}

fn build_engine(
    config: &Config,
    store: Option<PathBuf>,
) -> (Engine<JsonlStore>, SharedTransparencyLog) {
    let log = create_shared_log_with_persistence(config.transparency_path());
    let engine = Engine::new(open_store(config, store), config.realtime, config.batch)
        .unwrap_or_else(|e| fail(e))
        .with_transparency(log.clone());
    (engine, log)
}

fn timezone(config: &Config) -> chrono_tz::Tz {
    config.timezone().unwrap_or_else(|e| {
        eprintln!("Warning: {e}, showing times in UTC");
        chrono_tz::Tz::UTC
    })
}

fn save_log(log: &SharedTransparencyLog) {
    if let Err(e) = log.save() {
        eprintln!("Warning: Could not save transparency log: {e}");
    }
}

fn cmd_observe(config: &Config, store: Option<PathBuf>, lat: f64, lng: f64, json: bool) {
    let (engine, log) = build_engine(config, store);
    let mut session = ObserverSession::new();

    let report = engine
        .observe(&mut session, &LocationSample::new(lat, lng))
        .unwrap_or_else(|e| fail(e));
    save_log(&log);

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(out) => println!("{out}"),
            Err(e) => fail(e),
        }
    } else {
        println!("{}", report.render(timezone(config)));
    }
}

fn cmd_watch(config: &Config, store: Option<PathBuf>, input: &str, interval_ms: u64) {
    let (engine, log) = build_engine(config, store);
    let tz = timezone(config);

    let mut source = ReplaySource::new(ReplayConfig {
        input: ReplayInput::from_arg(input),
        interval: Duration::from_millis(interval_ms),
    });
    if let Err(e) = source.start() {
        fail(e);
    }

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());

    let mut session = ObserverSession::new();
    println!("signalvoid v{VERSION}");
    println!("Session: {}", session.id());
    println!("Press Ctrl+C to stop");
    println!();

    let receiver = source.receiver().clone();
    while running.load(Ordering::SeqCst) {
        match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(sample) => match engine.observe(&mut session, &sample) {
                Ok(report) => {
                    println!("{}", report.render(tz));
                    println!();
                }
                Err(e) => eprintln!("Warning: Could not classify sample: {e}"),
            },
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }

    source.stop();
    save_log(&log);
    println!("Processed {} location samples", session.samples());
    println!();
    println!("{}", log.summary());
}

fn cmd_inspect(config: &Config, store: Option<PathBuf>, cell_id: &str, json: bool) {
    let cell: CellId = cell_id.parse().unwrap_or_else(|e| fail(e));
    let (engine, log) = build_engine(config, store);

    let report = engine.inspect(cell).unwrap_or_else(|e| fail(e));
    save_log(&log);

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(out) => println!("{out}"),
            Err(e) => fail(e),
        }
    } else {
        println!("{}", report.render(timezone(config)));
    }
}

#[allow(unused_variables)]
fn cmd_batch(config: &Config, store: Option<PathBuf>, interval: Option<Duration>, publish: bool) {
    let (engine, log) = build_engine(config, store);

    #[cfg(feature = "gateway")]
    let gateway = if publish {
        match BlockingGatewayClient::from_env() {
            Ok(client) => {
                tracing::info!(source = client.source_id(), "Publishing batch reports");
                match client.test_connection() {
                    Ok(true) => tracing::info!("Gateway connection: OK"),
                    Ok(false) => eprintln!("Warning: Gateway health check failed"),
                    Err(e) => eprintln!("Warning: Could not connect to gateway: {e}"),
                }
                Some(client)
            }
            Err(e) => fail(e),
        }
    } else {
        None
    };

    #[cfg(not(feature = "gateway"))]
    if publish {
        eprintln!("Warning: --publish flag ignored (gateway feature not enabled at compile time)");
    }

    let running = Arc::new(AtomicBool::new(true));
    if interval.is_some() {
        ctrlc_handler(running.clone());
    }

    loop {
        match engine.run_batch() {
            Ok(report) => {
                print_batch(&report);

                #[cfg(feature = "gateway")]
                if let Some(ref client) = gateway {
                    match client.publish(&report) {
                        Ok(response) => tracing::info!(
                            accepted = response.accepted,
                            "Published batch report"
                        ),
                        Err(e) => eprintln!("[Gateway] Publish failed: {e}"),
                    }
                }
            }
            // The trigger decides whether to retry; a failed pass just waits for the next tick.
            Err(e) => eprintln!("Error detecting silence: {e}"),
        }
        save_log(&log);

        let Some(interval) = interval else { break };
        let deadline = std::time::Instant::now() + interval;
        while running.load(Ordering::SeqCst) && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(100));
        }
        if !running.load(Ordering::SeqCst) {
            break;
        }
    }
}

fn print_batch(report: &BatchReport) {
    match serde_json::to_string_pretty(report) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Error serializing report: {e}"),
    }

    let counts: Vec<String> = report
        .status_counts()
        .iter()
        .map(|(status, count)| format!("{status}={count}"))
        .collect();
    tracing::info!(cells = report.grids.len(), "Batch status counts: {}", counts.join(" "));
}

fn cmd_classify(config: &Config, recent: i64, baseline: i64, preset: &str) {
    let preset: Preset = preset.parse().unwrap_or_else(|e| fail(e));
    let policy = config.policy(preset);

    // Raw counts are not tied to a place.
    let counts =
        WindowCounts::from_signed(CellId::new(0, 0), recent, baseline).unwrap_or_else(|e| fail(e));
    let result = classify(&counts, &policy.thresholds).unwrap_or_else(|e| fail(e));

    println!("Status: {}", result.status);
    println!("Confidence: {}", result.confidence);
    println!("{}", signalvoid::report::explanation(result.status));
}

#[allow(unused_variables)]
fn cmd_serve(config: &Config, store: Option<PathBuf>, port: Option<u16>) {
    #[cfg(feature = "server")]
    {
        use signalvoid::server::{run, ServerConfig};

        let store = Arc::new(open_store(config, store));
        let mut server_config = ServerConfig::new(port.unwrap_or(config.server_port), store);
        server_config.realtime = config.realtime;
        server_config.batch = config.batch;
        server_config.store_timeout = config.store_timeout;

        let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| fail(e));
        runtime.block_on(async move {
            let (addr, shutdown_tx) = run(server_config).await.unwrap_or_else(|e| fail(e));
            println!("Listening on http://{addr}");
            println!("Press Ctrl+C to stop");

            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("Error waiting for Ctrl+C: {e}");
            }
            let _ = shutdown_tx.send(());
        });
    }

    #[cfg(not(feature = "server"))]
    fail("server feature not enabled at compile time");
}

fn cmd_status(config: &Config, store: Option<PathBuf>, reset: bool) {
    if reset {
        let log = create_shared_log_with_persistence(config.transparency_path());
        log.reset();
        if let Err(e) = log.save() {
            fail(format!("Could not save transparency log: {e}"));
        }
        println!("Transparency counters cleared.");
        println!();
    }

    println!("signalvoid Status");
    println!("=================");
    println!();

    let store_path = store.unwrap_or_else(|| config.store_path());
    println!("Heartbeat log: {store_path:?}");
    match std::fs::metadata(&store_path) {
        Ok(meta) => println!("  Size: {} bytes", meta.len()),
        Err(_) => println!("  (not created yet)"),
    }
    println!();

    for preset in Preset::ALL {
        let policy = config.policy(preset);
        println!(
            "{} policy: recent {}s / baseline {}s",
            preset.name(),
            policy.recent_window.as_secs(),
            policy.baseline_window.as_secs()
        );
    }
    println!();

    let stats_path = config.transparency_path();
    if stats_path.exists() {
        if let Ok(content) = std::fs::read_to_string(&stats_path) {
            if let Ok(stats) = serde_json::from_str::<serde_json::Value>(&content) {
                println!("Cumulative Statistics:");
                for key in [
                    "samples_received",
                    "heartbeats_sent",
                    "append_failures",
                    "cells_classified",
                    "batch_passes",
                ] {
                    if let Some(value) = stats.get(key) {
                        println!("  {}: {value}", key.replace('_', " "));
                    }
                }
            }
        }
    } else {
        println!("No previous session data found.");
    }
}

fn cmd_privacy() {
    println!("{PRIVACY_DECLARATION}");
}

fn cmd_config(mut config: Config, init: bool, timezone: Option<String>) {
    let changed = timezone.is_some();
    if let Some(tz) = timezone {
        config.display_timezone = tz;
    }
    if init || changed {
        if let Err(e) = config.save() {
            fail(format!("Error saving config: {e}"));
        }
        println!("Saved configuration to {:?}", Config::config_path());
        println!();
    }

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

fn cmd_presets() {
    for preset in Preset::ALL {
        let policy = Policy::preset(preset);
        println!("[{}]", preset.name());
        println!(
            "{}",
            serde_json::to_string_pretty(&policy).unwrap_or_else(|_| "Error".to_string())
        );
        println!();
    }
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Warning: Could not set Ctrl+C handler: {e}");
    }
}
