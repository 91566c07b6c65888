use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use lan_server_scan::config::{
    parse_prefix, ScanConfig, DEFAULT_DRAIN_MS, DEFAULT_PORT, DEFAULT_TIMEOUT_MS, DEFAULT_WORKERS,
};
use lan_server_scan::types::{Endpoint, ProgressSnapshot, Severity};
use lan_server_scan::updates::ScanListener;
use lan_server_scan::{netdetect, server, ScanCoordinator};

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// lan-server-scan — find hosts on a subnet that accept connections on a service port.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "lan-server-scan",
    version,
    about = "Find hosts on a subnet that accept connections on a service port.",
    long_about = None
)]
struct Cli {
    /// Base address of the subnet (e.g., 192.168.1.1). If omitted, use this machine's LAN address.
    #[arg(long)]
    address: Option<String>,

    /// CIDR prefix length. Unparsable values mean 24; the rest are clamped to 1..=30.
    #[arg(long, default_value = "24", allow_hyphen_values = true)]
    prefix: String,

    /// Service port probed on every host.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Per-probe connect timeout in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,

    /// Max concurrent probes.
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// How often queued updates are applied, in milliseconds.
    #[arg(long = "drain-ms", default_value_t = DEFAULT_DRAIN_MS)]
    drain_ms: u64,

    /// Serve the JSON control API on this address (e.g., 127.0.0.1:8080) instead of scanning once.
    #[arg(long)]
    serve: Option<String>,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = ScanConfig {
        port: cli.port,
        timeout: Duration::from_millis(cli.timeout_ms),
        workers: cli.workers,
        drain_period: Duration::from_millis(cli.drain_ms.max(1)),
    };
    let drain_period = config.drain_period;
    let (coordinator, mut updates) = ScanCoordinator::new(config);

    if let Some(bind) = cli.serve.as_deref() {
        let shutdown = CancellationToken::new();
        let ctrl_c = shutdown.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            ctrl_c.cancel();
        });
        println!("Serving scan API at http://{bind}/api (Ctrl+C to stop)");
        return server::spawn_server(bind, Arc::new(coordinator), updates, shutdown).await;
    }

    let address = cli
        .address
        .clone()
        .unwrap_or_else(|| netdetect::default_base_address().to_string());
    let prefix = parse_prefix(&cli.prefix);

    println!("lan-server-scan configuration:");
    println!("  subnet       : {address}/{prefix}");
    println!("  port         : {}", cli.port);
    println!("  workers      : {}", cli.workers);
    println!("  timeout_ms   : {}", cli.timeout_ms);

    coordinator.start(&address, i64::from(prefix))?;

    let mut term = TerminalListener::default();
    let mut ticker = tokio::time::interval(drain_period);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;
    loop {
        tokio::select! {
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                coordinator.stop();
            }
            _ = ticker.tick() => {
                updates.apply(&mut term);
                if term.finished {
                    break;
                }
            }
        }
    }

    print_results_table(&term.results);
    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();
}

/// Renders updates as a single live progress line plus one line per find.
#[derive(Default)]
struct TerminalListener {
    results: Vec<Endpoint>,
    finished: bool,
}

impl ScanListener for TerminalListener {
    fn on_progress(&mut self, progress: ProgressSnapshot) {
        eprint!("\r{}", progress.status_line());
        let _ = std::io::stderr().flush();
    }

    fn on_results_changed(&mut self, results: &[Endpoint]) {
        for e in results.iter().filter(|e| !self.results.contains(e)) {
            eprintln!("\rFound {} at {}", e.label(), e.address());
        }
        self.results = results.to_vec();
    }

    fn on_status(&mut self, message: &str, severity: Severity) {
        match severity {
            Severity::Info => {}
            _ => eprintln!("\r{message}"),
        }
    }

    fn on_complete(&mut self, _found: usize) {
        self.finished = true;
    }

    fn on_stopped(&mut self) {
        self.finished = true;
    }
}

fn print_results_table(results: &[Endpoint]) {
    let mut name_w = "name".len();
    let mut addr_w = "address".len();
    for e in results {
        name_w = name_w.max(e.label().len());
        addr_w = addr_w.max(e.address().len());
    }

    println!("\nServers found: {}", results.len());
    if results.is_empty() {
        return;
    }
    println!("{:<name_w$}  {:<addr_w$}", "name", "address");
    println!("{:-<name_w$}  {:-<addr_w$}", "", "");
    for e in results {
        println!("{:<name_w$}  {:<addr_w$}", e.label(), e.address());
    }
}
