//! # pizza_insights
//!
//! Loads pizza sales CSV files and rolls them up:
//!
//! - Memory-mapped CSV loading, parsed in parallel chunks with Rayon
//! - Exact decimal sums of quantity, revenue and unit price
//! - Group-by on any mix of category, size and order quarter
//! - Scalar totals and the mean unit price
//! - Fluent queries with ordering, limits and an LRU result cache
//! - Rolling aggregation over record batches with atomic snapshots
//! - CSV / JSON / Arrow output and bubble-chart points
//!
//! # Example
//!
//! ```no_run
//! use pizza_insights::processor::{Dimension, GroupSpec, sales_processor::SalesProcessor};
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut processor = SalesProcessor::new();
//!     processor.load_csv(Path::new("pizza_sales.csv"))?.into_result()?;
//!
//!     for row in processor.group_by(&GroupSpec::new(&[Dimension::Category]))? {
//!         println!(
//!             "{} => {} pizzas, {} revenue",
//!             row.group_key, row.total_quantity, row.total_revenue
//!         );
//!     }
//!
//!     println!("avg price: {}", processor.average_unit_price()?);
//!     Ok(())
//! }
//! ```

pub mod config;
mod helpers;
pub mod processor;
pub mod report;
