use lru::LruCache;

use crate::processor::aggregator::{CategorySummary, SalesTotals};
use crate::processor::sales_processor::SalesProcessor;
use crate::processor::{Dimension, GroupSpec, ProcessorError};
use std::cell::RefCell;
use std::num::NonZeroUsize;
use std::rc::Rc;

const CACHE_CAPACITY: usize = 128;

/// Output ordering for grouped results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortKey {
    /// Quarter, then category, then size
    #[default]
    GroupKey,
    RevenueDesc,
    QuantityDesc,
    UnitPriceDesc,
}

impl std::str::FromStr for SortKey {
    type Err = ProcessorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "key" | "group" => Ok(SortKey::GroupKey),
            "revenue" => Ok(SortKey::RevenueDesc),
            "quantity" => Ok(SortKey::QuantityDesc),
            "unit-price" | "unit_price" => Ok(SortKey::UnitPriceDesc),
            other => Err(ProcessorError::Parse(format!("unknown sort key '{other}'"))),
        }
    }
}

#[derive(Hash, Eq, PartialEq, Clone, Debug)]
pub struct QueryKey {
    dimensions: Vec<Dimension>,
    sort: SortKey,
    limit: Option<usize>,
}

#[derive(Debug)]
pub struct QueryCache {
    cache: RefCell<LruCache<QueryKey, QueryResult>>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCache {
    pub fn new() -> Self {
        Self {
            cache: RefCell::new(LruCache::new(
                NonZeroUsize::new(CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    pub fn get(&self, key: &QueryKey) -> Option<QueryResult> {
        self.cache.borrow_mut().get(key).cloned()
    }

    pub fn put(&self, key: QueryKey, value: QueryResult) {
        self.cache.borrow_mut().put(key, value);
    }

    pub fn len(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry; call after reloading the processor.
    pub fn clear(&self) {
        self.cache.borrow_mut().clear();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// One row per group
    Groups(Vec<CategorySummary>),
    /// No grouping dimensions
    Totals(SalesTotals),
}

/// Fluent roll-up query over a loaded [`SalesProcessor`]
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    processor: Rc<SalesProcessor>,
    cache: Option<Rc<QueryCache>>,
    spec: GroupSpec,
    sort: SortKey,
    limit: Option<usize>,
}

impl QueryBuilder {
    pub fn new(processor: Rc<SalesProcessor>, cache: Option<Rc<QueryCache>>) -> Self {
        Self {
            processor,
            cache,
            spec: GroupSpec::scalar(),
            sort: SortKey::default(),
            limit: None,
        }
    }

    /// Add a single group-by dimension
    pub fn group_by(mut self, dimension: Dimension) -> Self {
        self.spec = self.spec.with(dimension);
        self
    }

    /// Add multiple group-by dimensions
    pub fn group_by_multi(mut self, dimensions: &[Dimension]) -> Self {
        for &d in dimensions {
            self.spec = self.spec.with(d);
        }
        self
    }

    pub fn order_by(mut self, sort: SortKey) -> Self {
        self.sort = sort;
        self
    }

    /// Limit number of results
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Disable caching
    pub fn no_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    pub fn execute(self) -> Result<QueryResult, ProcessorError> {
        let key = QueryKey {
            dimensions: self.spec.dimensions().to_vec(),
            sort: self.sort,
            limit: self.limit,
        };

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&key) {
                return Ok(hit);
            }
        }

        let result = if self.spec.is_scalar() {
            QueryResult::Totals(self.processor.totals()?)
        } else {
            let mut rows = self.processor.group_by(&self.spec)?;
            sort_rows(&mut rows, self.sort);
            if let Some(n) = self.limit {
                rows.truncate(n);
            }
            QueryResult::Groups(rows)
        };

        if let Some(cache) = &self.cache {
            cache.put(key, result.clone());
        }
        Ok(result)
    }
}

/// Sorts in place; ties fall back to the group key.
pub fn sort_rows(rows: &mut [CategorySummary], sort: SortKey) {
    match sort {
        SortKey::GroupKey => rows.sort_by(|a, b| a.group_key.cmp(&b.group_key)),
        SortKey::RevenueDesc => rows.sort_by(|a, b| {
            b.total_revenue
                .cmp(&a.total_revenue)
                .then_with(|| a.group_key.cmp(&b.group_key))
        }),
        SortKey::QuantityDesc => rows.sort_by(|a, b| {
            b.total_quantity
                .cmp(&a.total_quantity)
                .then_with(|| a.group_key.cmp(&b.group_key))
        }),
        SortKey::UnitPriceDesc => rows.sort_by(|a, b| {
            b.total_unit_price
                .cmp(&a.total_unit_price)
                .then_with(|| a.group_key.cmp(&b.group_key))
        }),
    }
}

impl SalesProcessor {
    pub fn query(self: &Rc<Self>) -> QueryBuilder {
        QueryBuilder::new(self.clone(), None)
    }

    pub fn query_with_cache(self: &Rc<Self>, cache: &Rc<QueryCache>) -> QueryBuilder {
        QueryBuilder::new(self.clone(), Some(cache.clone()))
    }
}
