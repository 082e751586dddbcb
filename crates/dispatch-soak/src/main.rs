//! dispatch-soak entry point.

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use dispatch_heap::HeapConfig;
use dispatch_soak::cli::Cli;
use dispatch_soak::{soak, Result, SoakReport};

fn main() {
    // DISPATCH_HEAP_* settings may live in a local .env
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    fmt().with_env_filter(filter).with_target(false).init();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mut config = HeapConfig::from_env()?;
    if let Some(max_len) = cli.max_len {
        config = config.with_max_len(max_len);
    }

    let report = soak::run(config, &cli.plan())?;
    print_report(&report, cli.json)
}

fn print_report(report: &SoakReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("produced:        {}", report.produced);
    println!("consumed:        {}", report.consumed);
    println!("evicted:         {}", report.evicted);
    println!("inversions:      {}", report.inversions);
    println!("overflow drains: {}", report.heap.overflow_drains);
    println!("requeued:        {}", report.heap.requeued);
    println!("elapsed:         {} ms", report.elapsed_ms);
    Ok(())
}
