//! violations - violation log viewer
//!
//! Read side of the violation CSV: tail recent records, export the whole
//! file, or clear it. Clearing is destructive and requires `--yes`.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write as _;
use std::path::PathBuf;

use ppe_sentinel::{LogView, LogViewer};

#[derive(Parser, Debug)]
#[command(name = "violations", about = "Inspect the PPE violation log")]
struct Args {
    /// Path to the violation CSV
    #[arg(long, env = "SENTINEL_LOG_PATH", default_value = "violations.csv")]
    log: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the most recent violations
    Tail {
        /// Number of records to show
        #[arg(short, long, default_value_t = 10)]
        count: usize,
    },
    /// Write the raw log to a file or stdout
    Export {
        /// Output path; stdout when omitted
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Delete the violation log
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    let viewer = LogViewer::new(&args.log);

    match args.command {
        Command::Tail { count } => tail(&viewer, count),
        Command::Export { out } => export(&viewer, out.as_deref()),
        Command::Clear { yes } => match viewer.clear(yes) {
            Ok(()) => {
                println!("violation log cleared");
                Ok(())
            }
            Err(e @ ppe_sentinel::PipelineError::ConfirmationRequired { .. }) => {
                Err(anyhow!("{}; pass --yes to confirm", e))
            }
            Err(e) => Err(e.into()),
        },
    }
}

fn tail(viewer: &LogViewer, count: usize) -> Result<()> {
    match viewer.read_tail(count)? {
        LogView::Empty => {
            println!("no violations recorded");
        }
        LogView::Records(records) => {
            println!("{:<20} {:<24} {}", "TIMESTAMP", "VIOLATION", "CONFIDENCE");
            for record in records {
                println!(
                    "{:<20} {:<24} {:.2}",
                    record.timestamp, record.label, record.confidence
                );
            }
        }
    }
    Ok(())
}

fn export(viewer: &LogViewer, out: Option<&std::path::Path>) -> Result<()> {
    let content = match viewer.export_all()? {
        Some(content) => content,
        None => {
            eprintln!("no violation log at {}", viewer.path().display());
            return Ok(());
        }
    };
    match out {
        Some(path) => {
            std::fs::write(path, &content)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("exported to {}", path.display());
        }
        None => {
            std::io::stdout()
                .write_all(content.as_bytes())
                .context("failed to write to stdout")?;
        }
    }
    Ok(())
}
