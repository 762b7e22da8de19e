use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use tenure_metrics::config::CONFIG_ENV;
use tenure_metrics::{
    export, parse_date, Config, Inputs, RankedRecord, RankingStore, RecordDraft, StoreError,
};

#[derive(Parser)]
#[command(name = "tenure-metrics")]
#[command(about = "Indicator averages over leadership tenures, plus a ranked record list")]
#[command(version)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Print JSON instead of CSV / text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Join tenures to indicator rows at their start and end years
    Consolidate(TableArgs),

    /// Average every indicator over each tenure's year range
    Average(TableArgs),

    /// Manage the ranked record list
    Rankings {
        #[command(subcommand)]
        action: RankingsAction,
    },
}

#[derive(clap::Args)]
struct TableArgs {
    /// Tenure CSV (overrides [data] tenures)
    #[arg(long)]
    tenures: Option<PathBuf>,

    /// Indicator CSV (overrides [data] indicators)
    #[arg(long)]
    indicators: Option<PathBuf>,

    /// Write to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum RankingsAction {
    /// Show the list (most recent first, or by growth with --ranked)
    List {
        #[arg(long)]
        ranked: bool,
    },

    /// Add a record
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        start_date: String,
        #[arg(long)]
        end_date: String,
        #[arg(long)]
        start_value: f64,
        #[arg(long)]
        end_value: f64,
        /// Auxiliary value as NAME=VALUE, repeatable
        #[arg(long = "aux", value_parser = parse_aux)]
        auxiliary: Vec<(String, f64)>,
    },

    /// Remove a record by name
    Remove {
        name: String,
        /// Growth value picking one record when the name is shared
        #[arg(long)]
        growth: Option<f64>,
    },
}

fn parse_aux(raw: &str) -> std::result::Result<(String, f64), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", raw))?;
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("'{}': {}", value, e))?;
    Ok((name.trim().to_string(), value))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Consolidate(args) => {
            let inputs = load_inputs(&config, &args)?;
            let table = inputs.consolidate();
            let mut out = output(&args)?;
            if cli.json {
                serde_json::to_writer_pretty(&mut out, &table)?;
                writeln!(out)?;
            } else {
                export::write_consolidated(&table, out)?;
            }
        }
        Command::Average(args) => {
            let inputs = load_inputs(&config, &args)?;
            let table = inputs.average();
            let mut out = output(&args)?;
            if cli.json {
                serde_json::to_writer_pretty(&mut out, &table)?;
                writeln!(out)?;
            } else {
                export::write_averages(&table, out)?;
            }
        }
        Command::Rankings { action } => run_rankings(&config, action, cli.json)?,
    }

    Ok(())
}

fn load_inputs(config: &Config, args: &TableArgs) -> Result<Inputs> {
    let mut config = config.clone();
    if let Some(path) = &args.tenures {
        config.data.tenures = path.clone();
    }
    if let Some(path) = &args.indicators {
        config.data.indicators = path.clone();
    }

    Inputs::load(&config).with_context(|| {
        format!(
            "Failed to load {} and {}",
            config.data.tenures.display(),
            config.data.indicators.display()
        )
    })
}

fn output(args: &TableArgs) -> Result<Box<dyn Write>> {
    match &args.output {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(io::stdout().lock())),
    }
}

fn run_rankings(config: &Config, action: RankingsAction, json: bool) -> Result<()> {
    let backend = config.store.open_backend()?;
    let mut store = RankingStore::open(backend, config.store.options()).context("Failed to load rankings")?;

    match action {
        RankingsAction::List { ranked } => {
            let records: Vec<&RankedRecord> = if ranked {
                store.ranked()
            } else {
                store.records().iter().collect()
            };

            if json {
                let shown: Vec<_> = records.iter().map(|r| r.display_record()).collect();
                println!("{}", serde_json::to_string_pretty(&shown)?);
            } else {
                println!("🏆 {} records", records.len());
                for record in records {
                    print_record(record);
                }
            }
        }
        RankingsAction::Add {
            name,
            start_date,
            end_date,
            start_value,
            end_value,
            auxiliary,
        } => {
            let draft = RecordDraft {
                name: Some(name),
                start_date: Some(date_arg(&start_date)?),
                end_date: Some(date_arg(&end_date)?),
                start_value: Some(start_value),
                end_value: Some(end_value),
                auxiliary: auxiliary.into_iter().collect(),
            };

            let record = store.insert(&draft, &config.store.growth).map_err(user_facing)?;
            println!("✓ Added");
            print_record(&record);
        }
        RankingsAction::Remove { name, growth } => {
            let record = store.remove(&name, growth).map_err(user_facing)?;
            println!("✓ Removed");
            print_record(&record);
        }
    }

    Ok(())
}

fn date_arg(raw: &str) -> Result<NaiveDate> {
    match parse_date(raw) {
        Some(date) => Ok(date),
        None => bail!("'{}' is not a date (expected YYYY-MM-DD)", raw),
    }
}

fn print_record(record: &RankedRecord) {
    let shown = record.display_record();
    let auxiliary: Vec<String> = shown
        .auxiliary
        .iter()
        .map(|a| match a.value {
            Some(v) => format!("{}={:.2}", a.name, v),
            None => format!("{}=-", a.name),
        })
        .collect();

    println!(
        "  {:<28} {} → {}  growth {:>8.2}  {}",
        shown.name,
        shown.start_date,
        shown.end_date,
        shown.growth,
        auxiliary.join(" ")
    );
}

fn user_facing(err: StoreError) -> anyhow::Error {
    if err.is_user_error() {
        anyhow::anyhow!("❌ {}", err)
    } else {
        anyhow::Error::new(err).context("Rankings storage failed")
    }
}
