use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::processor::ProcessorError;

/// Date layouts accepted when none are configured.
pub const DEFAULT_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d-%m-%Y"];

/// One row of the sales dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub pizza_category: String,
    pub pizza_size: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub order_date: NaiveDate,
}

impl SalesRecord {
    /// Builds a record from raw text fields.
    ///
    /// `index` is only used to label the error.
    ///
    /// # Errors
    /// [`ProcessorError::InvalidRecord`] when a number or the date cannot be
    /// parsed, or when a numeric field is negative.
    #[allow(clippy::too_many_arguments)]
    pub fn parse(
        index: usize,
        pizza_category: &str,
        pizza_size: &str,
        quantity: &str,
        unit_price: &str,
        total_price: &str,
        order_date: &str,
        date_formats: &[String],
    ) -> Result<Self, ProcessorError> {
        let quantity = atoi_simd::parse::<i64>(quantity.trim().as_bytes()).map_err(|e| {
            ProcessorError::invalid(index, format!("quantity '{quantity}': {e}"))
        })?;
        let unit_price = parse_decimal(index, "unit_price", unit_price)?;
        let total_price = parse_decimal(index, "total_price", total_price)?;
        let order_date = parse_date(order_date, date_formats)
            .ok_or_else(|| ProcessorError::invalid(index, format!("order_date '{order_date}'")))?;

        let record = SalesRecord {
            pizza_category: pizza_category.trim().to_string(),
            pizza_size: pizza_size.trim().to_string(),
            quantity,
            unit_price,
            total_price,
            order_date,
        };
        record.validate(index)?;
        Ok(record)
    }

    /// Checks the numeric invariants.
    pub fn validate(&self, index: usize) -> Result<(), ProcessorError> {
        if self.quantity < 0 {
            return Err(ProcessorError::invalid(
                index,
                format!("negative quantity {}", self.quantity),
            ));
        }
        if self.unit_price.is_sign_negative() && !self.unit_price.is_zero() {
            return Err(ProcessorError::invalid(
                index,
                format!("negative unit_price {}", self.unit_price),
            ));
        }
        if self.total_price.is_sign_negative() && !self.total_price.is_zero() {
            return Err(ProcessorError::invalid(
                index,
                format!("negative total_price {}", self.total_price),
            ));
        }
        Ok(())
    }

    pub fn quarter(&self) -> Quarter {
        Quarter::of(self.order_date)
    }
}

fn parse_decimal(index: usize, column: &str, raw: &str) -> Result<Decimal, ProcessorError> {
    let trimmed = raw.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|e| ProcessorError::invalid(index, format!("{column} '{raw}': {e}")))
}

/// Tries each format in order; falls back to the built-in layouts when
/// `formats` is empty.
pub fn parse_date(raw: &str, formats: &[String]) -> Option<NaiveDate> {
    let raw = raw.trim();
    if formats.is_empty() {
        DEFAULT_DATE_FORMATS
            .iter()
            .find_map(|f| NaiveDate::parse_from_str(raw, f).ok())
    } else {
        formats
            .iter()
            .find_map(|f| NaiveDate::parse_from_str(raw, f).ok())
    }
}

/// Calendar quarter of an order date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Quarter {
    pub year: i32,
    pub quarter: u8,
}

impl Quarter {
    pub fn new(year: i32, quarter: u8) -> Option<Self> {
        (1..=4).contains(&quarter).then_some(Quarter { year, quarter })
    }

    pub fn of(date: NaiveDate) -> Self {
        Quarter {
            year: date.year(),
            quarter: (date.month0() / 3 + 1) as u8,
        }
    }

    /// First day of the quarter.
    pub fn start_date(&self) -> NaiveDate {
        let month = u32::from(self.quarter - 1) * 3 + 1;
        // month is always 1, 4, 7 or 10
        NaiveDate::from_ymd_opt(self.year, month, 1).unwrap_or_default()
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-Q{}", self.year, self.quarter)
    }
}
