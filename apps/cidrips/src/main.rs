//! # cidrips
//!
//! Reads IPv4 or IPv6 addresses and networks, drops duplicates, and prints
//! the smallest CIDR block list the chosen level allows.
//!
//! ```text
//! cidrips -i hosts.txt                 # exact aggregation (level 0)
//! cidrips -i hosts.txt -l 3            # allow up to 7/8 false coverage per merge
//! cidrips -i - -m count -c 100 -f 6    # at most 100 IPv6 blocks
//! cidrips -i hosts.txt -p 'deny ' -P ';\n' -o acl.conf -A
//! ```

mod cli;
mod output;

use std::fs::File;
use std::io::{self, Read};
use std::process::ExitCode;

use anyhow::{Context, Result};
use cidrips_aggregate::{AggregationConfig, Aggregator};
use cidrips_core::{BigCounter, Counter, Family};
use cidrips_index::{ingest, DedupIndex, Scanner};
use clap::Parser;
use colored::*;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::cli::Cli;
use crate::output::{resolve_target, write_zones, Target};

enum Outcome {
    Written,
    Cancelled,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(Outcome::Written) => ExitCode::SUCCESS,
        Ok(Outcome::Cancelled) => {
            eprintln!("{}", "Cancelled by user.".yellow());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(fmt::layer().with_writer(io::stderr))
        .init();
}

fn run(cli: &Cli) -> Result<Outcome> {
    let config = cli.aggregation_config(cli.base_config()?)?;
    tracing::debug!(?config, family = %cli.family, "starting");

    let reader: Box<dyn Read> = if cli.reads_stdin() {
        Box::new(io::stdin())
    } else {
        let file = File::open(&cli.input)
            .with_context(|| format!("Failed to open input {}", cli.input))?;
        Box::new(file)
    };

    match cli.family {
        Family::V4 => finish::<u64>(cli, config, reader),
        Family::V6 => finish::<BigCounter>(cli, config, reader),
    }
}

fn finish<W: Counter>(cli: &Cli, config: AggregationConfig, reader: Box<dyn Read>) -> Result<Outcome> {
    let mut index = DedupIndex::new(W::FAMILY);
    let summary = ingest(Scanner::new(reader, W::FAMILY), &mut index)
        .with_context(|| format!("Failed to read addresses from {}", cli.input))?;
    tracing::info!(
        tokens = summary.tokens,
        unique = summary.unique,
        duplicates = summary.duplicates,
        "input loaded"
    );

    let result = Aggregator::with_config(config)
        .aggregate_index::<W>(&index)
        .context("Aggregation failed")?;
    drop(index);

    if !cli.no_stats {
        if cli.json {
            eprintln!("{}", serde_json::to_string(&result.stats)?);
        } else {
            eprintln!("{}", result.stats.to_string().cyan());
        }
    }

    let target = resolve_target(
        &cli.output,
        cli.on_existing(),
        cli.reads_stdin(),
        &mut io::stdin().lock(),
        &mut io::stderr(),
    )?;
    let Some(mut out) = target.open()? else {
        return Ok(Outcome::Cancelled);
    };
    write_zones(&result.zones, &cli.prefix, &cli.postfix, &mut *out)
        .with_context(|| match &target {
            Target::File { path, .. } => format!("Failed to write {}", path.display()),
            _ => "Failed to write output".to_string(),
        })?;
    Ok(Outcome::Written)
}
