//! Incremental aggregation over a stream of record batches.
//!
//! Partial sums are merged under a lock; readers only ever see a complete
//! snapshot, swapped in after a whole batch has been folded.

use std::sync::{Arc, Mutex, RwLock};

use tracing::debug;

use crate::processor::{
    GroupSpec, ProcessorError,
    aggregator::{CategorySummary, GroupMap, finish, fold_partition, merge_maps, validate_all},
    record::SalesRecord,
};

#[derive(Debug)]
pub struct RollingAggregator {
    spec: GroupSpec,
    state: Mutex<State>,
    published: RwLock<Arc<Vec<CategorySummary>>>,
}

#[derive(Debug, Default)]
struct State {
    groups: GroupMap,
    ingested: usize,
}

impl RollingAggregator {
    pub fn new(spec: GroupSpec) -> Self {
        RollingAggregator {
            spec,
            state: Mutex::new(State::default()),
            published: RwLock::new(Arc::new(Vec::new())),
        }
    }

    pub fn spec(&self) -> &GroupSpec {
        &self.spec
    }

    /// Folds one batch and publishes a new snapshot.
    ///
    /// The whole batch is validated and folded first; a rejected or
    /// overflowing batch changes nothing.
    /// Reported indices count from the first record ever ingested.
    pub fn ingest(&self, batch: &[SalesRecord]) -> Result<(), ProcessorError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ProcessorError::Parse("rolling state poisoned".into()))?;
        validate_all(batch, state.ingested)?;

        let partial = fold_partition(batch, &self.spec)?;
        state.groups = merge_maps(state.groups.clone(), partial)?;
        state.ingested += batch.len();
        let snapshot = Arc::new(finish(&state.groups));

        // Publish while still holding the state lock so snapshots stay in order
        let mut published = self
            .published
            .write()
            .map_err(|_| ProcessorError::Parse("rolling snapshot poisoned".into()))?;
        *published = snapshot;

        debug!(
            batch = batch.len(),
            total = state.ingested,
            groups = state.groups.len(),
            "published rolling snapshot"
        );
        Ok(())
    }

    /// Latest complete snapshot.
    pub fn snapshot(&self) -> Arc<Vec<CategorySummary>> {
        match self.published.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Number of records folded so far.
    pub fn ingested(&self) -> usize {
        self.state.lock().map(|s| s.ingested).unwrap_or_default()
    }
}
