//! Additive roll-ups over [`SalesRecord`]s.
//!
//! Every entry point validates the whole input before folding, so a bad
//! record aborts the run and no partial summary escapes. Sums are exact
//! decimals; the parallel path folds each partition separately and merges
//! the partial maps by addition, which gives the same result as the
//! sequential fold.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use rayon::prelude::*;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::processor::{
    Dimension, GroupKey, GroupSpec, ProcessorError, chunks::RecordChunks, record::SalesRecord,
};

/// Inputs at least this long are folded in parallel.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 64 * 1024;

/// One row of grouped output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub group_key: GroupKey,
    pub total_quantity: u64,
    pub total_revenue: Decimal,
    pub total_unit_price: Decimal,
    pub record_count: u64,
}

impl CategorySummary {
    /// Mean unit price within the group.
    pub fn average_unit_price(&self) -> Option<Decimal> {
        if self.record_count == 0 {
            return None;
        }
        self.total_unit_price
            .checked_div(Decimal::from(self.record_count))
    }
}

/// Scalar roll-up over a whole input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesTotals {
    pub total_quantity: u64,
    pub total_revenue: Decimal,
    pub total_unit_price: Decimal,
    pub record_count: u64,
}

impl SalesTotals {
    /// Mean unit price over the counted records.
    ///
    /// # Errors
    /// [`ProcessorError::EmptyInput`] when no record was counted.
    pub fn average_unit_price(&self) -> Result<Decimal, ProcessorError> {
        if self.record_count == 0 {
            return Err(ProcessorError::EmptyInput(
                "average unit price over zero records",
            ));
        }
        self.total_unit_price
            .checked_div(Decimal::from(self.record_count))
            .ok_or_else(|| ProcessorError::overflow(&GroupKey::default(), "unit_price"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Accumulator {
    quantity: u64,
    revenue: Decimal,
    unit_price: Decimal,
    count: u64,
}

impl Accumulator {
    // Callers validate first, so quantity is non-negative.
    fn of(record: &SalesRecord) -> Self {
        Accumulator {
            quantity: record.quantity as u64,
            revenue: record.total_price,
            unit_price: record.unit_price,
            count: 1,
        }
    }

    /// Adds `other` in; on overflow returns the offending field and
    /// leaves `self` untouched.
    fn merge(&mut self, other: &Accumulator) -> Result<(), &'static str> {
        let quantity = self
            .quantity
            .checked_add(other.quantity)
            .ok_or("quantity")?;
        let revenue = self
            .revenue
            .checked_add(other.revenue)
            .ok_or("total_price")?;
        let unit_price = self
            .unit_price
            .checked_add(other.unit_price)
            .ok_or("unit_price")?;
        let count = self.count.checked_add(other.count).ok_or("record count")?;
        *self = Accumulator {
            quantity,
            revenue,
            unit_price,
            count,
        };
        Ok(())
    }

    fn add(&mut self, record: &SalesRecord) -> Result<(), &'static str> {
        self.merge(&Accumulator::of(record))
    }

    fn into_summary(self, group_key: GroupKey) -> CategorySummary {
        CategorySummary {
            group_key,
            total_quantity: self.quantity,
            total_revenue: self.revenue,
            total_unit_price: self.unit_price,
            record_count: self.count,
        }
    }

    fn into_totals(self) -> SalesTotals {
        SalesTotals {
            total_quantity: self.quantity,
            total_revenue: self.revenue,
            total_unit_price: self.unit_price,
            record_count: self.count,
        }
    }
}

pub(crate) type GroupMap = HashMap<GroupKey, Accumulator>;

pub(crate) fn key_for(record: &SalesRecord, spec: &GroupSpec) -> GroupKey {
    let mut key = GroupKey::default();
    for dimension in spec.dimensions() {
        match dimension {
            Dimension::Category => key.category = Some(record.pizza_category.clone()),
            Dimension::Size => key.size = Some(record.pizza_size.clone()),
            Dimension::Quarter => key.quarter = Some(record.quarter()),
        }
    }
    key
}

fn merge_into(map: &mut GroupMap, key: GroupKey, acc: &Accumulator) -> Result<(), ProcessorError> {
    match map.entry(key) {
        Entry::Occupied(mut slot) => {
            let merged = slot.get_mut().merge(acc);
            merged.map_err(|field| ProcessorError::overflow(slot.key(), field))
        }
        Entry::Vacant(slot) => {
            slot.insert(*acc);
            Ok(())
        }
    }
}

pub(crate) fn fold_partition(
    records: &[SalesRecord],
    spec: &GroupSpec,
) -> Result<GroupMap, ProcessorError> {
    let mut map = GroupMap::new();
    for record in records {
        merge_into(&mut map, key_for(record, spec), &Accumulator::of(record))?;
    }
    Ok(map)
}

pub(crate) fn merge_maps(mut into: GroupMap, from: GroupMap) -> Result<GroupMap, ProcessorError> {
    for (key, acc) in from {
        merge_into(&mut into, key, &acc)?;
    }
    Ok(into)
}

pub(crate) fn finish(map: &GroupMap) -> Vec<CategorySummary> {
    let mut out: Vec<CategorySummary> = map
        .iter()
        .map(|(key, acc)| acc.into_summary(key.clone()))
        .collect();
    out.sort_by(|a, b| a.group_key.cmp(&b.group_key));
    out
}

/// Validates every record; `offset` shifts the reported index.
pub(crate) fn validate_all(records: &[SalesRecord], offset: usize) -> Result<(), ProcessorError> {
    records
        .iter()
        .enumerate()
        .try_for_each(|(i, r)| r.validate(offset + i))
}

/// Rounds to `dp` decimal places, halves away from zero.
pub fn round_half_up(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// Pure aggregation engine. Holds only tuning knobs.
#[derive(Debug, Clone, Copy)]
pub struct Aggregator {
    parallel_threshold: usize,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator {
    pub fn new() -> Self {
        Aggregator {
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }

    /// Inputs with at least `threshold` records are folded with rayon.
    /// A threshold of zero always takes the parallel path.
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// Group-by aggregation
    ///
    /// Produces one [`CategorySummary`] per distinct key combination,
    /// sorted by key. Empty input yields no rows. A scalar spec yields a
    /// single row for non-empty input.
    ///
    /// # Errors
    /// [`ProcessorError::InvalidRecord`] for the first invalid record,
    /// [`ProcessorError::Overflow`] when a group's sum leaves the numeric range.
    pub fn group_by(
        &self,
        records: &[SalesRecord],
        spec: &GroupSpec,
    ) -> Result<Vec<CategorySummary>, ProcessorError> {
        validate_all(records, 0)?;

        let map = if records.len() >= self.parallel_threshold && !records.is_empty() {
            let part = partition_size(records.len());
            debug!(records = records.len(), part, "parallel group-by");
            records
                .par_chunks(part)
                .map(|p| fold_partition(p, spec))
                .try_reduce(GroupMap::new, merge_maps)?
        } else {
            fold_partition(records, spec)?
        };

        debug!(groups = map.len(), dims = ?spec.dimensions(), "group-by finished");
        Ok(finish(&map))
    }

    /// Group-by over the loader's chunked storage; each chunk is a partition.
    pub fn group_by_chunks(
        &self,
        chunks: &RecordChunks,
        spec: &GroupSpec,
    ) -> Result<Vec<CategorySummary>, ProcessorError> {
        let mut offset = 0;
        for chunk in chunks.chunks() {
            validate_all(chunk, offset)?;
            offset += chunk.len();
        }

        let map = chunks
            .chunks()
            .par_iter()
            .map(|chunk| fold_partition(chunk, spec))
            .try_reduce(GroupMap::new, merge_maps)?;
        Ok(finish(&map))
    }

    /// Scalar totals; zero for empty input.
    ///
    /// # Errors
    /// [`ProcessorError::InvalidRecord`] or [`ProcessorError::Overflow`].
    pub fn totals(&self, records: &[SalesRecord]) -> Result<SalesTotals, ProcessorError> {
        validate_all(records, 0)?;

        let acc = if records.len() >= self.parallel_threshold {
            records
                .par_iter()
                .try_fold(Accumulator::default, |mut acc, r| acc.add(r).map(|_| acc))
                .try_reduce(Accumulator::default, |mut a, b| a.merge(&b).map(|_| a))
        } else {
            let mut acc = Accumulator::default();
            records.iter().try_for_each(|r| acc.add(r)).map(|_| acc)
        }
        .map_err(|field| ProcessorError::overflow(&GroupKey::default(), field))?;

        Ok(acc.into_totals())
    }

    /// Arithmetic mean of `unit_price`.
    ///
    /// The division is exact to 28 significant digits; round with
    /// [`round_half_up`] for display.
    ///
    /// # Errors
    /// [`ProcessorError::EmptyInput`] when `records` is empty.
    pub fn average_unit_price(&self, records: &[SalesRecord]) -> Result<Decimal, ProcessorError> {
        self.totals(records)?.average_unit_price()
    }

    /// Re-aggregates summaries under a coarser grouping.
    ///
    /// # Errors
    /// [`ProcessorError::Parse`] when `coarser` names a dimension that the
    /// input summaries were not grouped by.
    pub fn regroup(
        &self,
        summaries: &[CategorySummary],
        coarser: &GroupSpec,
    ) -> Result<Vec<CategorySummary>, ProcessorError> {
        let mut map = GroupMap::new();
        for summary in summaries {
            let key = &summary.group_key;
            for dimension in coarser.dimensions() {
                let present = match dimension {
                    Dimension::Category => key.category.is_some(),
                    Dimension::Size => key.size.is_some(),
                    Dimension::Quarter => key.quarter.is_some(),
                };
                if !present {
                    return Err(ProcessorError::Parse(format!(
                        "cannot regroup by {}: input not grouped by it",
                        dimension.column_name()
                    )));
                }
            }

            let acc = Accumulator {
                quantity: summary.total_quantity,
                revenue: summary.total_revenue,
                unit_price: summary.total_unit_price,
                count: summary.record_count,
            };
            merge_into(&mut map, key.project(coarser), &acc)?;
        }
        Ok(finish(&map))
    }
}

fn partition_size(len: usize) -> usize {
    let threads = rayon::current_num_threads().max(1);
    len.div_ceil(threads).max(1)
}
