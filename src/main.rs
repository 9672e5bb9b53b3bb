//! pizza-insights: roll-ups over pizza sales CSV files.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Any failure (bad arguments, unreadable file, invalid rows, write error)

mod cli;

use std::io::Write;
use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result, bail};
use cli::{Args, Command, OutputFormat, SummarizeArgs};
use jemallocator::Jemalloc;
use pizza_insights::config::{Config, DEFAULT_CONFIG_FILE};
use pizza_insights::processor::{
    GroupSpec,
    aggregator::{CategorySummary, round_half_up},
    query_builder::QueryResult,
    sales_processor::SalesProcessor,
};
use pizza_insights::report::{self, chart, export, table};
use rust_decimal::Decimal;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

fn main() {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    init_logging(&args);
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(args) {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// RUST_LOG wins over --verbose/--quiet when set.
fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level().as_str().to_ascii_lowercase()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

fn run(args: Args) -> Result<()> {
    if let Command::InitConfig = args.command {
        return init_config();
    }

    let mut config = Config::load(args.config.as_deref()).context("Failed to load config")?;
    if args.skip_invalid {
        config.skip_invalid = true;
    }

    match &args.command {
        Command::Summarize(s) => summarize(&config, s),
        Command::Totals {
            csv,
            divisor,
            decimals,
        } => {
            let processor = load(&config, csv)?;
            let totals = processor.totals()?;
            let divisor = Decimal::from(divisor.unwrap_or(config.revenue_divisor));
            let dp = decimals.unwrap_or(config.decimals);

            println!("records:           {}", totals.record_count);
            println!("total_quantity:    {}", totals.total_quantity);
            println!("total_revenue:     {}", totals.total_revenue);
            println!(
                "total_revenue / {}: {}",
                divisor,
                report::scaled(totals.total_revenue, divisor, dp)
            );
            println!(
                "total_quantity / {}: {}",
                divisor,
                report::scaled(Decimal::from(totals.total_quantity), divisor, 0)
            );
            Ok(())
        }
        Command::Average { csv, decimals } => {
            let processor = load(&config, csv)?;
            let avg = processor.average_unit_price()?;
            println!(
                "avg_price_per_pizza: {}",
                round_half_up(avg, decimals.unwrap_or(config.decimals))
            );
            Ok(())
        }
        Command::Chart {
            csv,
            by,
            title,
            output,
        } => {
            let processor = load(&config, csv)?;
            let rows = processor.group_by(&GroupSpec::new(by))?;
            let chart = chart::bubble_chart(title, &rows, config.bubble_scale);
            match output {
                Some(path) => export::write_json(path, &chart)?,
                None => println!("{}", serde_json::to_string_pretty(&chart)?),
            }
            Ok(())
        }
        Command::Export { csv, output } => {
            let processor = load(&config, csv)?;
            export::write_records_csv(output, processor.records().iter())
                .with_context(|| format!("Failed to export records from {}", csv.display()))?;
            println!("Wrote {} records to {}", processor.row_count(), output.display());
            Ok(())
        }
        Command::InitConfig => init_config(),
    }
}

fn init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);
    if path.exists() {
        bail!("{} already exists. Remove it first or edit it manually.", DEFAULT_CONFIG_FILE);
    }
    std::fs::write(path, Config::default_toml())
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;
    println!("Created {} with default settings.", DEFAULT_CONFIG_FILE);
    Ok(())
}

/// Loads the CSV; rejected rows abort unless skipping is enabled.
fn load(config: &Config, csv: &Path) -> Result<SalesProcessor> {
    let mut processor = SalesProcessor::with_options(config.load_options());
    let summary = processor
        .load_csv(csv)
        .with_context(|| format!("Failed to load {}", csv.display()))?;

    if config.skip_invalid {
        if !summary.errors.is_empty() {
            info!("skipped {} invalid rows", summary.errors.len());
        }
    } else {
        summary
            .into_result()
            .with_context(|| format!("Invalid row in {}", csv.display()))?;
    }
    Ok(processor)
}

fn summarize(config: &Config, args: &SummarizeArgs) -> Result<()> {
    let processor = Rc::new(load(config, &args.csv)?);

    let mut query = processor
        .query()
        .group_by_multi(&args.by)
        .order_by(args.sort);
    if let Some(n) = args.limit {
        query = query.limit(n);
    }

    let rows = match query.execute()? {
        QueryResult::Groups(rows) => rows,
        QueryResult::Totals(_) => bail!("--by needs at least one dimension"),
    };

    emit(&rows, args.format, args.output.as_deref())
}

fn emit(rows: &[CategorySummary], format: OutputFormat, output: Option<&Path>) -> Result<()> {
    match (format, output) {
        (OutputFormat::Table, Some(path)) => export::write_text(path, &table::render(rows))?,
        (OutputFormat::Table, None) => print!("{}", table::render(rows)),
        (OutputFormat::Csv, Some(path)) => export::write_summaries_csv(path, rows)?,
        (OutputFormat::Csv, None) => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            export::write_summary_rows(&mut lock, rows)?;
            lock.flush()?;
        }
        (OutputFormat::Json, Some(path)) => export::write_summaries_json(path, rows)?,
        (OutputFormat::Json, None) => println!("{}", serde_json::to_string_pretty(rows)?),
    }
    Ok(())
}
