//! Command-line interface argument parsing.

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use pizza_insights::processor::{Dimension, query_builder::SortKey};

/// Sales roll-ups over pizza order CSV files
///
/// Examples:
///   pizza-insights summarize pizza_sales.csv --by category
///   pizza-insights summarize pizza_sales.csv --by size,category --format csv -o by_size.csv
///   pizza-insights summarize pizza_sales.csv --by quarter,category --sort revenue
///   pizza-insights totals pizza_sales.csv --divisor 1000
///   pizza-insights chart pizza_sales.csv --by category -o bubbles.json
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    ///
    /// If not specified, looks for pizza-insights.toml in the current directory
    #[arg(short, long, global = true, value_name = "FILE", env = "PIZZA_INSIGHTS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Skip rows that fail to parse instead of aborting
    #[arg(long, global = true)]
    pub skip_invalid: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Grouped roll-ups of quantity, revenue and unit price
    Summarize(SummarizeArgs),

    /// Total revenue and quantity, raw and scaled
    Totals {
        /// Sales CSV file
        csv: PathBuf,

        /// Divide scaled totals by this (overrides config)
        #[arg(long)]
        divisor: Option<u32>,

        /// Decimal places for scaled values (overrides config)
        #[arg(long)]
        decimals: Option<u32>,
    },

    /// Mean unit price over every record
    Average {
        /// Sales CSV file
        csv: PathBuf,

        #[arg(long)]
        decimals: Option<u32>,
    },

    /// Bubble chart points (x = revenue, y = quantity, size = unit price) as JSON
    Chart {
        /// Sales CSV file
        csv: PathBuf,

        #[arg(long, value_delimiter = ',', default_value = "category")]
        by: Vec<Dimension>,

        #[arg(long, default_value = "Pizza Sales Analysis")]
        title: String,

        /// Write to FILE instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Validate the CSV and write the normalized records (overwrites FILE)
    Export {
        /// Sales CSV file
        csv: PathBuf,

        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Write a default pizza-insights.toml
    InitConfig,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct SummarizeArgs {
    /// Sales CSV file
    pub csv: PathBuf,

    /// Grouping dimensions: category, size, quarter
    #[arg(long, value_delimiter = ',', default_value = "category")]
    pub by: Vec<Dimension>,

    /// Row order: key, revenue, quantity, unit-price
    #[arg(long, default_value = "key")]
    pub sort: SortKey,

    /// Keep only the first N rows
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// Write to FILE instead of stdout (overwrites)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Csv,
    Json,
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }
        match &self.command {
            Command::Summarize(s) if s.by.is_empty() => {
                Err("--by needs at least one dimension".to_string())
            }
            Command::Chart { by, .. } if by.is_empty() => {
                Err("--by needs at least one dimension".to_string())
            }
            _ => Ok(()),
        }
    }

    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_summarize() {
        let args = Args::try_parse_from([
            "pizza-insights",
            "summarize",
            "sales.csv",
            "--by",
            "size,category",
            "--sort",
            "revenue",
            "--format",
            "csv",
        ])
        .unwrap();
        match args.command {
            Command::Summarize(s) => {
                assert_eq!(s.by, vec![Dimension::Size, Dimension::Category]);
                assert_eq!(s.sort, SortKey::RevenueDesc);
                assert_eq!(s.format, OutputFormat::Csv);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_dimension() {
        assert!(
            Args::try_parse_from(["pizza-insights", "summarize", "s.csv", "--by", "region"])
                .is_err()
        );
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        let args =
            Args::try_parse_from(["pizza-insights", "-v", "-q", "average", "s.csv"]).unwrap();
        assert!(args.validate().is_err());
    }
}
