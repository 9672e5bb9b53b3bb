use crate::processor::record::SalesRecord;

/// Records stored as the chunks produced by the parallel loader.
///
/// Each chunk is also a natural partition for the parallel fold.
#[derive(Debug, Clone, Default)]
pub struct RecordChunks {
    chunks: Vec<Vec<SalesRecord>>,
}

impl RecordChunks {
    pub fn new() -> Self {
        RecordChunks { chunks: Vec::new() }
    }

    pub fn push_chunk(&mut self, chunk: Vec<SalesRecord>) {
        if !chunk.is_empty() {
            self.chunks.push(chunk);
        }
    }

    pub fn chunks(&self) -> &[Vec<SalesRecord>] {
        &self.chunks
    }

    pub fn iter(&self) -> impl Iterator<Item = &SalesRecord> + '_ {
        self.chunks.iter().flat_map(|chunk| chunk.iter())
    }

    pub fn total_len(&self) -> usize {
        self.chunks.iter().map(|c| c.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_len() == 0
    }
}

impl From<Vec<SalesRecord>> for RecordChunks {
    fn from(records: Vec<SalesRecord>) -> Self {
        let mut chunks = RecordChunks::new();
        chunks.push_chunk(records);
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn record(qty: i64) -> SalesRecord {
        SalesRecord {
            pizza_category: "Classic".into(),
            pizza_size: "M".into(),
            quantity: qty,
            unit_price: Decimal::ONE,
            total_price: Decimal::from(qty),
            order_date: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
        }
    }

    #[test]
    fn empty_chunks_are_skipped() {
        let mut chunks = RecordChunks::new();
        chunks.push_chunk(vec![record(1), record(2)]);
        chunks.push_chunk(vec![]);
        chunks.push_chunk(vec![record(3)]);

        assert_eq!(chunks.chunks().len(), 2);
        assert_eq!(chunks.total_len(), 3);
        assert!(!chunks.is_empty());
        assert!(RecordChunks::new().is_empty());
    }

    #[test]
    fn iter_keeps_load_order() {
        let mut chunks = RecordChunks::new();
        chunks.push_chunk(vec![record(1)]);
        chunks.push_chunk(vec![record(2)]);
        chunks.push_chunk(vec![record(3), record(4)]);
        chunks.push_chunk(vec![record(5)]);
        let qty: Vec<i64> = chunks.iter().map(|r| r.quantity).collect();
        assert_eq!(qty, vec![1, 2, 3, 4, 5]);
    }
}
