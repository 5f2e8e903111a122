use std::error::Error;
use std::path::PathBuf;
use std::process;

use chrono::{DateTime, TimeZone, Utc};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chronos_series::parser::{parse_duration, parse_timestamp};
use chronos_series::storage::Options;
use chronos_series::{BucketSize, SeriesConfig, TimeSeriesTable};

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect time-bucketed series layouts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the bucket a timestamp falls into
    Bucket {
        timestamp: String,
        #[arg(long, default_value = "1h")]
        size: String,
    },
    /// Print every bucket a range query touches
    Range {
        start: String,
        end: String,
        #[arg(long, default_value = "1h")]
        size: String,
    },
    /// Print the statements a series would issue for a range query
    Plan(PlanArgs),
}

#[derive(Args, Debug)]
struct PlanArgs {
    start: String,
    end: String,

    /// JSON config file; overrides the field/size flags
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "1h")]
    size: String,

    #[arg(long, default_value = "at")]
    time_field: String,

    #[arg(long, default_value = "id")]
    id_field: String,

    #[arg(long, default_value = "series")]
    table: String,

    #[arg(long)]
    limit: Option<usize>,
}

fn bucket_size(text: &str) -> Result<BucketSize, Box<dyn Error>> {
    Ok(BucketSize::from_duration(parse_duration(text)?)?)
}

fn window_start(bucket: i64) -> String {
    match Utc.timestamp_opt(bucket / 1000, 0).single() {
        Some(t) => t.to_rfc3339(),
        None => "out of range".to_string(),
    }
}

fn range(start: &str, end: &str) -> Result<(DateTime<Utc>, DateTime<Utc>), Box<dyn Error>> {
    Ok((parse_timestamp(start)?, parse_timestamp(end)?))
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    match cli.command {
        Command::Bucket { timestamp, size } => {
            let size = bucket_size(&size)?;
            let ts = parse_timestamp(&timestamp)?;
            let bucket = size.bucket_of(ts);
            println!("{}\t{}", bucket, window_start(bucket));
        }
        Command::Range { start, end, size } => {
            let size = bucket_size(&size)?;
            let (start, end) = range(&start, &end)?;
            let buckets = size.buckets_between(start, end);
            info!(count = buckets.len(), "enumerated buckets");
            for b in buckets {
                println!("{}\t{}", b, window_start(b));
            }
        }
        Command::Plan(args) => {
            let config = match &args.config {
                Some(path) => SeriesConfig::from_json(&std::fs::read_to_string(path)?)?,
                None => {
                    let size = bucket_size(&args.size)?;
                    SeriesConfig::new(&args.time_field, &args.id_field, size)?
                }
            };
            let (start, end) = range(&args.start, &args.end)?;

            let mut series = TimeSeriesTable::in_memory(&args.table, config);
            if let Some(limit) = args.limit {
                series = series.with_options(Options::default().with_limit(limit));
            }

            println!("{};", series.create_if_not_exist_statement()?);
            println!("{};", series.list(start, end).statement());
        }
    }
    Ok(())
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()) {
        error!("{}", e);
        process::exit(1);
    }
}
