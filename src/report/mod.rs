//! Output side: files, Arrow chunks, chart points and text tables.

pub mod chart;
pub mod export;
pub mod table;

use rust_decimal::Decimal;

use crate::processor::aggregator::round_half_up;

/// Divides for display (e.g. revenue in thousands) and rounds half-up.
///
/// A zero divisor leaves the value unscaled.
pub fn scaled(value: Decimal, divisor: Decimal, dp: u32) -> Decimal {
    let value = if divisor.is_zero() {
        value
    } else {
        value.checked_div(divisor).unwrap_or(value)
    };
    round_half_up(value, dp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revenue_in_thousands() {
        let revenue: Decimal = "817860.05".parse().unwrap();
        assert_eq!(
            scaled(revenue, Decimal::from(1000), 2),
            "817.86".parse::<Decimal>().unwrap()
        );
        assert_eq!(scaled(Decimal::from(49574), Decimal::from(1000), 0), Decimal::from(50));
        assert_eq!(scaled(Decimal::from(7), Decimal::ZERO, 0), Decimal::from(7));
    }
}
