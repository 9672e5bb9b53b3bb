use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod aggregator;
pub mod chunks;
pub mod query_builder;
pub mod record;
pub mod rolling;
pub mod sales_processor;

use record::Quarter;

/// Error type used across the crate
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid record {index}: {reason}")]
    InvalidRecord { index: usize, reason: String },

    #[error("empty input: {0}")]
    EmptyInput(&'static str),

    #[error("Schema/parse error: {0}")]
    Parse(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("failed to write {}: {source}", path.display())]
    Export {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("sum of {field} overflowed in group {group}")]
    Overflow { group: String, field: &'static str },

    #[error("config error: {0}")]
    Config(String),
}

impl ProcessorError {
    pub fn invalid(index: usize, reason: impl Into<String>) -> Self {
        ProcessorError::InvalidRecord {
            index,
            reason: reason.into(),
        }
    }

    pub fn overflow(group: &GroupKey, field: &'static str) -> Self {
        ProcessorError::Overflow {
            group: group.label(),
            field,
        }
    }
}

#[derive(Debug, Default)]
pub struct ParseSummary {
    pub rows_processed: usize,
    pub errors: Vec<ParseError>,
}

impl ParseSummary {
    /// Fails with the first row error, if any.
    pub fn into_result(self) -> Result<usize, ProcessorError> {
        match self.errors.into_iter().next() {
            Some(err) => Err(ProcessorError::invalid(err.line, err.error)),
            None => Ok(self.rows_processed),
        }
    }
}

/// A rejected CSV row. `line` is the 1-based line in the file.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub line: usize,
    pub error: String,
    pub raw: String,
}

/// Grouping dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Category,
    Size,
    Quarter,
}

impl Dimension {
    pub fn column_name(&self) -> &'static str {
        match self {
            Dimension::Category => "pizza_category",
            Dimension::Size => "pizza_size",
            Dimension::Quarter => "quarter",
        }
    }
}

impl std::str::FromStr for Dimension {
    type Err = ProcessorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "category" | "pizza_category" => Ok(Dimension::Category),
            "size" | "pizza_size" => Ok(Dimension::Size),
            "quarter" | "order_quarter" => Ok(Dimension::Quarter),
            other => Err(ProcessorError::Parse(format!("unknown dimension '{other}'"))),
        }
    }
}

/// Ordered set of grouping dimensions. Empty means scalar aggregation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct GroupSpec {
    dimensions: Vec<Dimension>,
}

impl GroupSpec {
    pub fn new(dimensions: &[Dimension]) -> Self {
        let mut spec = GroupSpec::default();
        for &d in dimensions {
            spec = spec.with(d);
        }
        spec
    }

    pub fn scalar() -> Self {
        GroupSpec::default()
    }

    /// Adds a dimension; duplicates are ignored.
    pub fn with(mut self, dimension: Dimension) -> Self {
        if !self.dimensions.contains(&dimension) {
            self.dimensions.push(dimension);
        }
        self
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn contains(&self, dimension: Dimension) -> bool {
        self.dimensions.contains(&dimension)
    }

    pub fn is_scalar(&self) -> bool {
        self.dimensions.is_empty()
    }

    /// True when every dimension of `self` is also in `other`.
    pub fn is_coarser_than(&self, other: &GroupSpec) -> bool {
        self.dimensions.iter().all(|d| other.contains(*d))
    }
}

/// Value(s) of the grouping dimensions for one group.
///
/// Only the dimensions named by the [`GroupSpec`] are populated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quarter: Option<Quarter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

impl GroupKey {
    /// Drops every dimension not present in `spec`.
    pub fn project(&self, spec: &GroupSpec) -> GroupKey {
        GroupKey {
            quarter: self.quarter.filter(|_| spec.contains(Dimension::Quarter)),
            category: self
                .category
                .clone()
                .filter(|_| spec.contains(Dimension::Category)),
            size: self.size.clone().filter(|_| spec.contains(Dimension::Size)),
        }
    }

    /// Human readable label, e.g. `2015-Q1 / Classic / L`.
    pub fn label(&self) -> String {
        let mut parts = Vec::with_capacity(3);
        if let Some(q) = &self.quarter {
            parts.push(q.to_string());
        }
        if let Some(c) = &self.category {
            parts.push(c.clone());
        }
        if let Some(s) = &self.size {
            parts.push(s.clone());
        }
        if parts.is_empty() {
            "all".to_string()
        } else {
            parts.join(" / ")
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}
