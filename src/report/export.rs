//! Writes results out with overwrite semantics.
//!
//! Every writer fills a temp file next to the target and then renames it
//! over the target, so readers see either the old file or the new one.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow2::{
    array::{Array, Float64Array, Int64Array, Utf8Array},
    chunk::Chunk,
    datatypes::{DataType, Field, Schema},
};
use rust_decimal::prelude::ToPrimitive;
use tempfile::NamedTempFile;
use tracing::info;

use crate::processor::{ProcessorError, aggregator::CategorySummary, record::SalesRecord};

const SUMMARY_HEADER: &str =
    "quarter,pizza_category,pizza_size,total_quantity,total_revenue,total_unit_price,record_count";
const RECORD_HEADER: &str = "pizza_category,pizza_size,quantity,unit_price,total_price,order_date";

fn export_err(path: &Path, source: std::io::Error) -> ProcessorError {
    ProcessorError::Export {
        path: path.to_path_buf(),
        source,
    }
}

/// Runs `fill` against a temp file, then persists it over `path`.
fn write_atomically<F>(path: &Path, fill: F) -> Result<(), ProcessorError>
where
    F: FnOnce(&mut BufWriter<&mut NamedTempFile>) -> std::io::Result<()>,
{
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(|e| export_err(path, e))?;

    let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| export_err(path, e))?;
    {
        let mut writer = BufWriter::new(&mut tmp);
        fill(&mut writer).map_err(|e| export_err(path, e))?;
        writer.flush().map_err(|e| export_err(path, e))?;
    }
    tmp.persist(path).map_err(|e| export_err(path, e.error))?;
    info!("wrote {}", path.display());
    Ok(())
}

fn csv_cell(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Summary rows as CSV into any writer.
pub fn write_summary_rows<W: Write>(w: &mut W, rows: &[CategorySummary]) -> std::io::Result<()> {
    writeln!(w, "{SUMMARY_HEADER}")?;
    for r in rows {
        let key = &r.group_key;
        writeln!(
            w,
            "{},{},{},{},{},{},{}",
            key.quarter.map(|q| q.to_string()).unwrap_or_default(),
            csv_cell(key.category.as_deref().unwrap_or_default()),
            csv_cell(key.size.as_deref().unwrap_or_default()),
            r.total_quantity,
            r.total_revenue,
            r.total_unit_price,
            r.record_count,
        )?;
    }
    Ok(())
}

pub fn write_summaries_csv(path: &Path, rows: &[CategorySummary]) -> Result<(), ProcessorError> {
    write_atomically(path, |w| write_summary_rows(w, rows))
}

pub fn write_text(path: &Path, text: &str) -> Result<(), ProcessorError> {
    write_atomically(path, |w| w.write_all(text.as_bytes()))
}

pub fn write_summaries_json(path: &Path, rows: &[CategorySummary]) -> Result<(), ProcessorError> {
    write_json(path, &rows)
}

/// Writes any serializable value as pretty JSON.
pub fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), ProcessorError> {
    write_atomically(path, |w| {
        serde_json::to_writer_pretty(&mut *w, value)?;
        writeln!(w)
    })
}

/// Raw record dump in the loader's column layout.
pub fn write_records_csv<'a, I>(path: &Path, records: I) -> Result<(), ProcessorError>
where
    I: IntoIterator<Item = &'a SalesRecord>,
{
    write_atomically(path, |w| {
        writeln!(w, "{RECORD_HEADER}")?;
        for r in records {
            writeln!(
                w,
                "{},{},{},{},{},{}",
                csv_cell(&r.pizza_category),
                csv_cell(&r.pizza_size),
                r.quantity,
                r.unit_price,
                r.total_price,
                r.order_date.format("%Y-%m-%d"),
            )?;
        }
        Ok(())
    })
}

/// Summaries as an Arrow chunk: group label, quantity, revenue, unit price.
pub fn summaries_to_arrow(rows: &[CategorySummary]) -> (Schema, Chunk<Arc<dyn Array>>) {
    let schema = Schema::from(vec![
        Field::new("group", DataType::Utf8, false),
        Field::new("total_quantity", DataType::Int64, false),
        Field::new("total_revenue", DataType::Float64, false),
        Field::new("total_unit_price", DataType::Float64, false),
    ]);

    let labels: Vec<String> = rows.iter().map(|r| r.group_key.label()).collect();
    let quantity: Vec<i64> = rows
        .iter()
        .map(|r| i64::try_from(r.total_quantity).unwrap_or(i64::MAX))
        .collect();
    let revenue: Vec<f64> = rows
        .iter()
        .map(|r| r.total_revenue.to_f64().unwrap_or(f64::NAN))
        .collect();
    let unit_price: Vec<f64> = rows
        .iter()
        .map(|r| r.total_unit_price.to_f64().unwrap_or(f64::NAN))
        .collect();

    let arrays: Vec<Arc<dyn Array>> = vec![
        Arc::new(Utf8Array::<i32>::from_slice(&labels)),
        Arc::new(Int64Array::from_vec(quantity)),
        Arc::new(Float64Array::from_vec(revenue)),
        Arc::new(Float64Array::from_vec(unit_price)),
    ];

    (schema, Chunk::new(arrays))
}
