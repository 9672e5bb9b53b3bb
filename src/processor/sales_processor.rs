use memchr::memchr_iter;
use memmap2::Mmap;
use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};
use rust_decimal::Decimal;
use std::{fs::File, path::Path};
use tracing::{debug, info, warn};

use crate::{
    helpers::csv_fields::{field_str, split_fields, trim_cr},
    processor::{
        GroupSpec, ParseError, ParseSummary, ProcessorError,
        aggregator::{Aggregator, CategorySummary, DEFAULT_PARALLEL_THRESHOLD, SalesTotals},
        chunks::RecordChunks,
        record::SalesRecord,
    },
};

/// Columns the loader needs, in the order [`SalesRecord::parse`] takes them.
pub const REQUIRED_COLUMNS: [&str; 6] = [
    "pizza_category",
    "pizza_size",
    "quantity",
    "unit_price",
    "total_price",
    "order_date",
];

// Spreadsheet exports often start with one
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Loader tuning
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// chrono format strings tried in order; empty means the defaults
    pub date_formats: Vec<String>,
    pub parallel_threshold: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            date_formats: Vec::new(),
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

struct BatchResult {
    records: Vec<SalesRecord>,
    errors: Vec<ParseError>,
}

/// Loads sales CSV files and answers roll-up queries over them
///
/// # Examples
///
/// ```no_run
/// # use pizza_insights::processor::{Dimension, GroupSpec, sales_processor::SalesProcessor};
/// let mut processor = SalesProcessor::new();
/// processor.load_csv("pizza_sales.csv".as_ref()).unwrap();
/// let rows = processor.group_by(&GroupSpec::new(&[Dimension::Category])).unwrap();
/// println!("{rows:?}");
/// ```
#[derive(Debug, Default)]
pub struct SalesProcessor {
    records: RecordChunks,
    headers: Vec<String>,
    options: LoadOptions,
}

impl SalesProcessor {
    /// Create an empty processor
    pub fn new() -> Self {
        Self::with_options(LoadOptions::default())
    }

    pub fn with_options(options: LoadOptions) -> Self {
        SalesProcessor {
            records: RecordChunks::new(),
            headers: Vec::new(),
            options,
        }
    }

    /// Wraps records that were produced elsewhere.
    pub fn from_records(records: Vec<SalesRecord>) -> Self {
        SalesProcessor {
            records: RecordChunks::from(records),
            headers: REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            options: LoadOptions::default(),
        }
    }

    /// Loads a CSV file using memory mapping
    ///
    /// The header row must name every column in [`REQUIRED_COLUMNS`]
    /// (case-insensitive); other columns are ignored. Rows that fail to
    /// parse are reported in the returned [`ParseSummary`] and skipped.
    /// Replaces any previously loaded records.
    ///
    /// # Errors
    /// Returns a [`ProcessorError`] if:
    /// - File cannot be opened or mapped
    /// - The header line is missing or lacks a required column
    pub fn load_csv(&mut self, path: &Path) -> Result<ParseSummary, ProcessorError> {
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Err(ProcessorError::Parse("Missing header line".into()));
        }
        // SAFETY: the map is read-only and dropped before this function returns
        let mmap = unsafe { Mmap::map(&file)? };
        let buf: &[u8] = &mmap[..];

        // Parse header
        let header_end = buf.iter().position(|&b| b == b'\n').unwrap_or(buf.len());
        let header = &buf[..header_end];
        let header = header.strip_prefix(UTF8_BOM).unwrap_or(header);
        let mut fields = Vec::new();
        split_fields(trim_cr(header), &mut fields);
        let headers: Vec<String> = fields
            .iter()
            .map(|f| field_str(f).trim().to_string())
            .collect();
        let columns = Self::resolve_columns(&headers)?;

        let data_start = (header_end + 1).min(buf.len());
        let data = &buf[data_start..];

        // Find chunk boundaries (split by newlines)
        let num_threads = rayon::current_num_threads();
        let chunks = Self::find_chunk_boundaries(data, num_threads);

        // First file line of every chunk; the header is line 1
        let newline_counts: Vec<usize> = chunks
            .par_iter()
            .map(|(start, end)| memchr_iter(b'\n', &data[*start..*end]).count())
            .collect();
        let mut first_lines = Vec::with_capacity(chunks.len());
        let mut line = 2;
        for count in &newline_counts {
            first_lines.push(line);
            line += count;
        }

        let date_formats = &self.options.date_formats;
        let batch_results: Vec<BatchResult> = chunks
            .par_iter()
            .enumerate()
            .map(|(chunk_idx, (start, end))| {
                Self::parse_chunk(
                    &data[*start..*end],
                    &columns,
                    headers.len(),
                    first_lines[chunk_idx],
                    date_formats,
                )
            })
            .collect();

        let mut records = RecordChunks::new();
        let mut errors = Vec::new();
        for batch in batch_results {
            errors.extend(batch.errors);
            records.push_chunk(batch.records);
        }
        errors.sort_by_key(|e| e.line);

        let rows = records.total_len();
        debug!(chunks = chunks.len(), rows, "parsed csv chunks");
        if !errors.is_empty() {
            warn!(
                rejected = errors.len(),
                first_line = errors[0].line,
                "rejected rows while loading {}",
                path.display()
            );
        }
        info!(rows, "loaded {}", path.display());

        self.records = records;
        self.headers = headers;

        Ok(ParseSummary {
            rows_processed: rows,
            errors,
        })
    }

    fn resolve_columns(headers: &[String]) -> Result<[usize; 6], ProcessorError> {
        let mut idx = [0usize; 6];
        for (slot, name) in idx.iter_mut().zip(REQUIRED_COLUMNS) {
            *slot = headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
                .ok_or_else(|| ProcessorError::MissingColumn(name.to_string()))?;
        }
        Ok(idx)
    }

    fn find_chunk_boundaries(data: &[u8], num_chunks: usize) -> Vec<(usize, usize)> {
        if data.is_empty() {
            return vec![];
        }

        let num_chunks = num_chunks.max(1);
        let chunk_size = data.len() / num_chunks;
        let mut boundaries = Vec::with_capacity(num_chunks);
        let mut start = 0;

        for i in 0..num_chunks - 1 {
            let mut end = ((i + 1) * chunk_size).max(start);

            // Find next newline
            while end < data.len() && data[end] != b'\n' {
                end += 1;
            }

            if end < data.len() {
                end += 1; // Include the newline
            }

            if start < end {
                boundaries.push((start, end));
            }
            start = end;
        }

        // Last chunk gets everything remaining
        if start < data.len() {
            boundaries.push((start, data.len()));
        }

        boundaries
    }

    fn parse_chunk(
        chunk: &[u8],
        columns: &[usize; 6],
        num_cols: usize,
        first_line: usize,
        date_formats: &[String],
    ) -> BatchResult {
        let mut records = Vec::new();
        let mut errors = Vec::new();
        let mut fields = Vec::with_capacity(num_cols);

        // Every line ends at a newline except possibly the last one
        let mut start = 0;
        let ends = memchr_iter(b'\n', chunk).chain(
            (chunk.last() != Some(&b'\n'))
                .then_some(chunk.len())
                .into_iter(),
        );

        for (offset, end) in ends.enumerate() {
            let line_no = first_line + offset;
            let line = trim_cr(&chunk[start..end]);
            start = end + 1;

            if line.iter().all(|b| b.is_ascii_whitespace()) {
                continue;
            }

            split_fields(line, &mut fields);
            if fields.len() != num_cols {
                errors.push(ParseError {
                    line: line_no,
                    error: format!("Expected {} fields, got {}", num_cols, fields.len()),
                    raw: String::from_utf8_lossy(line).to_string(),
                });
                continue;
            }

            let f = |i: usize| field_str(fields[columns[i]]);
            let parsed = SalesRecord::parse(
                line_no,
                &f(0),
                &f(1),
                &f(2),
                &f(3),
                &f(4),
                &f(5),
                date_formats,
            );

            match parsed {
                Ok(record) => records.push(record),
                Err(err) => errors.push(ParseError {
                    line: line_no,
                    error: match err {
                        ProcessorError::InvalidRecord { reason, .. } => reason,
                        other => other.to_string(),
                    },
                    raw: String::from_utf8_lossy(line).to_string(),
                }),
            }
        }

        BatchResult { records, errors }
    }

    pub fn row_count(&self) -> usize {
        self.records.total_len()
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn records(&self) -> &RecordChunks {
        &self.records
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    fn aggregator(&self) -> Aggregator {
        Aggregator::new().with_parallel_threshold(self.options.parallel_threshold)
    }

    /// Group-by over everything loaded
    ///
    /// # Example
    /// ```no_run
    /// # use pizza_insights::processor::{Dimension, GroupSpec, sales_processor::SalesProcessor};
    /// # let processor = SalesProcessor::new();
    /// let rows = processor
    ///     .group_by(&GroupSpec::new(&[Dimension::Size, Dimension::Category]))
    ///     .unwrap();
    /// ```
    pub fn group_by(&self, spec: &GroupSpec) -> Result<Vec<CategorySummary>, ProcessorError> {
        match self.records.chunks() {
            [] => self.aggregator().group_by(&[], spec),
            [only] => self.aggregator().group_by(only, spec),
            _ => self.aggregator().group_by_chunks(&self.records, spec),
        }
    }

    /// Scalar totals; zero when nothing is loaded.
    pub fn totals(&self) -> Result<SalesTotals, ProcessorError> {
        let rows = self.group_by(&GroupSpec::scalar())?;
        Ok(rows
            .into_iter()
            .next()
            .map(|s| SalesTotals {
                total_quantity: s.total_quantity,
                total_revenue: s.total_revenue,
                total_unit_price: s.total_unit_price,
                record_count: s.record_count,
            })
            .unwrap_or_default())
    }

    /// Mean unit price over everything loaded.
    ///
    /// # Errors
    /// [`ProcessorError::EmptyInput`] when nothing is loaded.
    pub fn average_unit_price(&self) -> Result<Decimal, ProcessorError> {
        self.totals()?.average_unit_price()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::Dimension;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn make_processor_from_str(csv: &str) -> (SalesProcessor, ParseSummary) {
        let mut tmp = NamedTempFile::new().unwrap();
        write!(tmp, "{}", csv).unwrap();

        let mut processor = SalesProcessor::new();
        let summary = processor.load_csv(tmp.path()).unwrap();
        (processor, summary)
    }

    const CSV: &str = "\
pizza_id,order_id,quantity,order_date,unit_price,total_price,pizza_size,pizza_category,pizza_ingredients
1,1,2,1/1/2015,10.00,20.00,M,Classic,\"Sliced Ham, Pineapple, Mozzarella Cheese\"
2,2,3,1/2/2015,10.00,30.00,L,Classic,\"Pepperoni, Mozzarella Cheese\"
3,2,1,4/2/2015,12.00,12.00,M,Veggie,\"Mushrooms, Red Onions\"
";

    #[test]
    fn test_row_count() {
        let (processor, summary) = make_processor_from_str(CSV);
        assert_eq!(processor.row_count(), 3);
        assert_eq!(summary.rows_processed, 3);
        assert!(summary.errors.is_empty());
        assert_eq!(processor.headers().len(), 9);
    }

    #[test]
    fn test_group_by_category() {
        let (processor, _) = make_processor_from_str(CSV);
        let rows = processor
            .group_by(&GroupSpec::new(&[Dimension::Category]))
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].total_quantity, 5);
        assert_eq!(rows[0].total_revenue, Decimal::new(50, 0));
        assert_eq!(rows[1].total_unit_price, Decimal::new(12, 0));
    }

    #[test]
    fn test_missing_trailing_newline_and_crlf() {
        let csv = "pizza_category,pizza_size,quantity,unit_price,total_price,order_date\r\n\
                   Classic,M,1,10,10,2015-01-01\r\n\
                   \r\n\
                   Veggie,S,2,8,16,2015-05-01";
        let (processor, summary) = make_processor_from_str(csv);
        assert_eq!(processor.row_count(), 2);
        assert!(summary.errors.is_empty());
    }

    #[test]
    fn test_bad_rows_reported_with_line_numbers() {
        let csv = "pizza_category,pizza_size,quantity,unit_price,total_price,order_date
Classic,M,1,10,10,2015-01-01
Classic,M,-1,10,10,2015-01-01
Veggie,S,2,8,16
Veggie,S,2,8,16,someday
";
        let (processor, summary) = make_processor_from_str(csv);
        assert_eq!(processor.row_count(), 1);
        let lines: Vec<usize> = summary.errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3, 4, 5]);
        assert!(summary.errors[0].error.contains("negative quantity"));
        assert!(summary.into_result().is_err());
    }

    #[test]
    fn test_missing_column() {
        let mut tmp = NamedTempFile::new().unwrap();
        write!(tmp, "pizza_category,quantity\nClassic,1\n").unwrap();
        let mut processor = SalesProcessor::new();
        match processor.load_csv(tmp.path()) {
            Err(ProcessorError::MissingColumn(c)) => assert_eq!(c, "pizza_size"),
            other => panic!("expected MissingColumn, got {other:?}"),
        }
    }

    #[test]
    fn test_byte_order_mark_on_header() {
        let (processor, summary) = make_processor_from_str(
            "\u{feff}pizza_category,pizza_size,quantity,unit_price,total_price,order_date\n\
             Classic,M,2,10.0,20.0,2015-01-05\n",
        );
        assert!(summary.errors.is_empty());
        assert_eq!(processor.headers()[0], "pizza_category");
        let rows = processor
            .group_by(&GroupSpec::new(&[Dimension::Category]))
            .unwrap();
        assert_eq!(rows[0].group_key.category.as_deref(), Some("Classic"));
    }

    #[test]
    fn test_header_only() {
        let (processor, summary) = make_processor_from_str(
            "pizza_category,pizza_size,quantity,unit_price,total_price,order_date\n",
        );
        assert_eq!(processor.row_count(), 0);
        assert_eq!(summary.rows_processed, 0);
        assert!(processor.group_by(&GroupSpec::new(&[Dimension::Size])).unwrap().is_empty());
        assert!(matches!(
            processor.average_unit_price(),
            Err(ProcessorError::EmptyInput(_))
        ));
        assert_eq!(processor.totals().unwrap(), SalesTotals::default());
    }

    #[test]
    fn test_chunk_boundaries_cover_data() {
        let data = b"a\nbb\nccc\ndddd\n";
        let chunks = SalesProcessor::find_chunk_boundaries(data, 3);
        assert_eq!(chunks.first().map(|c| c.0), Some(0));
        assert_eq!(chunks.last().map(|c| c.1), Some(data.len()));
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
            assert_eq!(data[pair[0].1 - 1], b'\n');
        }
    }

    #[test]
    fn test_average() {
        let (processor, _) = make_processor_from_str(CSV);
        let avg = processor.average_unit_price().unwrap();
        assert_eq!(
            crate::processor::aggregator::round_half_up(avg, 2),
            Decimal::new(1067, 2)
        );
    }
}
