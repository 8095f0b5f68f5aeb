mod config;

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use engine_logging::{engine_info, engine_warn, LogDestination, LogSettings};
use log::LevelFilter;
use pagestream_engine::{
    CsvLedger, FetchOrchestrator, Ledger, LedgerRow, ReqwestTransport, RunSummary,
};
use tokio_util::sync::CancellationToken;

use crate::config::HarvestConfig;

#[derive(Debug, Parser)]
#[command(name = "pagestream", version, about = "Harvest paginated JSON resources into files")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a harvest described by a RON file.
    Run {
        config: PathBuf,
        /// Skip URLs the ledger already lists as written.
        #[arg(long)]
        resume: bool,
        #[arg(long, value_enum, default_value_t = LogTarget::Terminal)]
        log: LogTarget,
        #[arg(long)]
        verbose: bool,
    },
    /// Print every row of a ledger.
    Ledger { dir: PathBuf, name: String },
    /// Delete a ledger, and with `--cascade` every artifact it lists.
    Clean {
        dir: PathBuf,
        name: String,
        #[arg(long)]
        cascade: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogTarget {
    Terminal,
    File,
    Both,
}

impl From<LogTarget> for LogDestination {
    fn from(target: LogTarget) -> Self {
        match target {
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::File => LogDestination::File,
            LogTarget::Both => LogDestination::Both,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            config,
            resume,
            log,
            verbose,
        } => {
            engine_logging::initialize(&LogSettings {
                destination: log.into(),
                level: if verbose {
                    LevelFilter::Debug
                } else {
                    LevelFilter::Info
                },
                ..LogSettings::default()
            });
            let summary = run(config, resume).await?;
            print_summary(&summary);
        }
        Command::Ledger { dir, name } => {
            engine_logging::initialize(&LogSettings::default());
            let ledger = CsvLedger::open(&dir, &name)
                .with_context(|| format!("opening ledger {name} in {}", dir.display()))?;
            for row in ledger.rows()? {
                match row? {
                    LedgerRow::Success { size, name, url } => println!("{size}\t{name}\t{url}"),
                    LedgerRow::Error { kind, url } => println!("{kind}\t-\t{url}"),
                }
            }
        }
        Command::Clean { dir, name, cascade } => {
            engine_logging::initialize(&LogSettings::default());
            let mut ledger = CsvLedger::open(&dir, &name)
                .with_context(|| format!("opening ledger {name} in {}", dir.display()))?;
            ledger
                .delete(cascade)
                .with_context(|| format!("deleting {}", ledger.path().display()))?;
            engine_info!("deleted {}", ledger.path().display());
        }
    }
    Ok(())
}

async fn run(config_path: PathBuf, resume: bool) -> anyhow::Result<RunSummary> {
    let config = HarvestConfig::load(&config_path)?;
    let ledger = CsvLedger::open(&config.output_dir, &config.ledger_name).with_context(|| {
        format!(
            "opening ledger {} in {}",
            config.ledger_name,
            config.output_dir.display()
        )
    })?;
    let skip_urls = if resume {
        let done = ledger.completed_urls()?;
        engine_info!("resuming, {} url(s) already written", done.len());
        done
    } else {
        HashSet::new()
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            engine_warn!("interrupt received, stopping after the current batch");
            on_signal.cancel();
        }
    });

    let mut orchestrator =
        FetchOrchestrator::builder(ReqwestTransport::default(), config.page_stream()?, ledger)
            .adapter(config.adapter())
            .target_dir(&config.output_dir)
            .config(config.run_config()?)
            .cancel_token(cancel)
            .skip_urls(skip_urls)
            .build()?;
    engine_info!(
        "harvesting {} into {}",
        config.resource,
        config.output_dir.display()
    );
    let summary = orchestrator.run().await?;
    Ok(summary)
}

fn print_summary(summary: &RunSummary) {
    println!(
        "batches={} pages={} written={} deleted={} abandoned={} depleted={}",
        summary.batches,
        summary.pages_fetched,
        summary.artifacts_written,
        summary.artifacts_deleted,
        summary.abandoned,
        summary.depleted
    );
    let mut faults: Vec<_> = summary.faults.iter().collect();
    faults.sort_by_key(|(kind, _)| kind.label());
    for (kind, count) in faults {
        println!("  {kind}: {count}");
    }
}
