use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::Serialize;

use crate::processor::aggregator::CategorySummary;

/// Default multiplier applied to `total_unit_price` for bubble area.
pub const DEFAULT_BUBBLE_SCALE: f64 = 50.0;

/// One bubble of the sales chart
///
/// x = revenue, y = units sold, size = summed unit price, color = group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BubblePoint {
    pub label: String,
    pub x: f64,
    pub y: u64,
    pub size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BubbleChart {
    pub title: String,
    pub x_label: &'static str,
    pub y_label: &'static str,
    pub points: Vec<BubblePoint>,
}

pub fn bubble_points(rows: &[CategorySummary], bubble_scale: f64) -> Vec<BubblePoint> {
    rows.iter()
        .map(|r| BubblePoint {
            label: r.group_key.label(),
            x: to_f64(r.total_revenue),
            y: r.total_quantity,
            size: to_f64(r.total_unit_price) * bubble_scale,
        })
        .collect()
}

pub fn bubble_chart(title: &str, rows: &[CategorySummary], bubble_scale: f64) -> BubbleChart {
    BubbleChart {
        title: title.to_string(),
        x_label: "total_revenue",
        y_label: "total_quantity",
        points: bubble_points(rows, bubble_scale),
    }
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}
