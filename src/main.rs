//! procgov - mode- and policy-driven process priority governor

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use procgov::{is_elevated, Algorithm, Governor, GovernorConfig, Mode, SystemProbe};

#[derive(Parser)]
#[command(name = "procgov")]
#[command(about = "User-space resource governor for process priorities and memory pressure", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show current system CPU, memory and swap usage
    Status,

    /// List running processes
    Processes {
        /// Show only the N biggest by resident size
        #[arg(short, long, default_value = "10")]
        top: usize,

        /// Emit the full table as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the governor until interrupted
    Run {
        #[arg(short, long, value_enum, default_value = "productivity")]
        mode: Mode,

        #[arg(short, long, value_enum, default_value = "hybrid")]
        algorithm: Algorithm,

        /// Suspension threshold in MB of resident memory
        #[arg(long, default_value = "200")]
        threshold_mb: f64,

        /// Time-slice hint in milliseconds (stored, reserved for future
        /// policies)
        #[arg(long, default_value = "5")]
        slice_ms: u64,

        /// Performance journal destination
        #[arg(long, default_value = "scheduler.log")]
        journal: String,

        /// Disable the performance journal
        #[arg(long)]
        no_journal: bool,

        /// Suppress the periodic stats line
        #[arg(short, long)]
        quiet: bool,
    },

    /// Print the default configuration as TOML
    Config,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Status => {
            let mut probe = SystemProbe::new();
            // The first CPU sample only establishes the baseline.
            probe.snapshot_system();
            thread::sleep(Duration::from_millis(500));
            let snap = probe.snapshot_system();

            println!("System Status:");
            println!("  CPU:    {:.2}%", snap.cpu_used_pct);
            println!("  Memory: {:.2}%", snap.mem_used_pct);
            println!("  Swap:   {:.2}%", snap.swap_used_pct);
        }

        Commands::Processes { top, json } => {
            let mut probe = SystemProbe::new();
            // Sample twice so per-process CPU% has an interval to average
            // over.
            probe.snapshot_processes();
            thread::sleep(Duration::from_millis(500));
            let mut records = probe.snapshot_processes();

            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
                return Ok(());
            }

            records.sort_by(|a, b| b.memory_bytes.cmp(&a.memory_bytes));
            println!("{} processes (top {} by memory):", records.len(), top);
            println!(
                "{:<8} {:<25} {:>9} {:>11} {:>11} {:>8}",
                "PID", "NAME", "PRIORITY", "STATUS", "MEMORY(MB)", "CPU(%)"
            );
            for rec in records.iter().take(top) {
                let mut name = rec.name.clone();
                if name.len() > 24 {
                    name.truncate(21);
                    name.push_str("...");
                }
                println!(
                    "{:<8} {:<25} {:>9} {:>11} {:>11.2} {:>8.2}",
                    rec.pid,
                    name,
                    rec.priority,
                    if rec.is_suspended { "suspended" } else { "running" },
                    rec.memory_mb(),
                    rec.cpu_percent
                );
            }
        }

        Commands::Run {
            mode,
            algorithm,
            threshold_mb,
            slice_ms,
            journal,
            no_journal,
            quiet,
        } => {
            if !is_elevated() {
                warn!("running unprivileged: priority boosts and signals to other users' processes will be denied");
            }

            let config = GovernorConfig {
                mode,
                algorithm,
                time_slice_ms: slice_ms,
                mem_threshold_mb: threshold_mb,
            };
            let governor = Governor::with_config(config);
            governor.set_journal_path(journal);
            governor.enable_journal(!no_journal);

            let term = Arc::new(AtomicBool::new(false));
            signal_hook::flag::register(signal_hook::consts::SIGTERM, term.clone())?;
            signal_hook::flag::register(signal_hook::consts::SIGINT, term.clone())?;

            info!("governor started (mode: {}, algorithm: {})", mode, algorithm);
            governor.start();

            while !term.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_secs(1));
                if !quiet {
                    let stats = governor.stats();
                    println!(
                        "cpu {:>6.2}% | mem {:>6.2}% | swap {:>6.2}% | {} processes, {} suspended",
                        governor.system_cpu_pct(),
                        governor.system_mem_pct(),
                        governor.system_swap_pct(),
                        stats.total_processes,
                        stats.suspended_processes
                    );
                }
            }

            info!("shutting down");
            governor.stop();
        }

        Commands::Config => {
            let config = GovernorConfig::default();
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
