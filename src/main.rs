//! # causal-broadcast
//!
//! Runs causal broadcast processes. `run` starts one process that talks to
//! its peers over TCP, as listed in an address file. `simulate` runs a
//! whole peer set inside one runtime over the in-memory network.
//!
//! ```text
//! causal-broadcast run --id 0 --addresses addresses.txt --scenario slides
//! causal-broadcast simulate --processes 3 --scenario second-message-first
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use cbcast_runtime::{
    create_network, AddressBook, CausalProcess, Inbox, ProcessConfig, ProcessId, ProcessReport,
    Result, Scenario, TcpTransport, Transport,
};
use clap::{Args, Parser, Subcommand};
use colored::*;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// ─── CLI ───────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "causal-broadcast")]
#[command(about = "Causal-order broadcast among a fixed peer set using vector clocks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one process over TCP using an address file
    Run {
        /// This process's id in the address file
        #[arg(long)]
        id: ProcessId,

        /// Address file, one `<id> <host> <port>` per line
        #[arg(long, default_value = "addresses.txt")]
        addresses: PathBuf,

        #[command(flatten)]
        timing: Timing,
    },
    /// Run a whole peer set in this process over the in-memory network
    Simulate {
        /// Number of processes
        #[arg(long, default_value_t = 3)]
        processes: usize,

        #[command(flatten)]
        timing: Timing,
    },
}

#[derive(Args, Clone)]
struct Timing {
    /// Sample policy: slides, second-message-first or hello-world
    #[arg(long, default_value = "slides")]
    scenario: Scenario,

    /// Delay applied to deliberately held back sends
    #[arg(long, default_value_t = 3000)]
    send_delay_ms: u64,

    /// Lower bound of the sleep between loop iterations
    #[arg(long, default_value_t = 100)]
    min_wait_ms: u64,

    /// Upper bound of the sleep between loop iterations
    #[arg(long, default_value_t = 500)]
    max_wait_ms: u64,
}

impl Timing {
    fn config(&self, id: ProcessId, process_count: usize) -> ProcessConfig {
        ProcessConfig::builder(id, process_count)
            .wait_range(self.min_wait_ms, self.max_wait_ms)
            .send_delay(self.send_delay_ms)
            .build()
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────

async fn run(id: ProcessId, addresses: PathBuf, timing: Timing) -> Result<()> {
    let book = AddressBook::load(&addresses)?;
    timing.scenario.check(book.len())?;
    let config = timing.config(id, book.len());
    info!(process = id, processes = book.len(), scenario = %timing.scenario, "loaded {}", addresses.display());

    let inbox = Inbox::new();
    let transport = TcpTransport::bind(id, book, inbox.clone()).await?;
    transport.wait_for_peers(config.connect_timeout()).await?;

    let grace = config.shutdown_grace();
    let process = CausalProcess::new(config, Arc::new(transport), inbox)?;
    let report = process.run(&mut timing.scenario.policy()).await?;
    print_report(&report);

    // peers may still be sending to us
    tokio::time::sleep(grace).await;
    Ok(())
}

async fn simulate(processes: usize, timing: Timing) -> Result<()> {
    let scenario = timing.scenario;
    scenario.check(processes)?;

    let mut handles = Vec::new();
    for (transport, inbox) in create_network(processes) {
        let config = timing.config(transport.local_id(), processes);
        let process = CausalProcess::new(config, Arc::new(transport), inbox)?;
        let mut policy = scenario.policy();
        handles.push(tokio::spawn(async move { process.run(&mut policy).await }));
    }

    let mut reports = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(report) => reports.push(report?),
            Err(e) => error!(error = %e, "process task failed"),
        }
    }

    reports.sort_by_key(|r| r.id);
    println!("\n  {}", format!("{} x {}", scenario, processes).bold().bright_white());
    for report in &reports {
        print_report(report);
    }
    Ok(())
}

fn print_report(report: &ProcessReport) {
    println!(
        "{} process {} finished with {}",
        "✓".bright_green().bold(),
        report.id.to_string().bold(),
        report.clock.to_string().bright_cyan()
    );
    for message in &report.deliveries {
        println!(
            "    {} from {} {}",
            "▸".bright_yellow(),
            message.source,
            message.payload.as_deref().unwrap_or("").dimmed()
        );
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Run {
            id,
            addresses,
            timing,
        } => run(id, addresses, timing).await,
        Commands::Simulate { processes, timing } => simulate(processes, timing).await,
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "✗".bright_red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
