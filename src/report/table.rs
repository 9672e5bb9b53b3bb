use std::fmt::Write;

use crate::processor::aggregator::CategorySummary;

const HEADERS: [&str; 4] = ["group", "total_quantity", "total_revenue", "total_unit_price"];

/// Fixed-width text table, one line per summary.
pub fn render(rows: &[CategorySummary]) -> String {
    let cells: Vec<[String; 4]> = rows
        .iter()
        .map(|r| {
            [
                r.group_key.label(),
                r.total_quantity.to_string(),
                r.total_revenue.normalize().to_string(),
                r.total_unit_price.normalize().to_string(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &cells {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let line = |out: &mut String, row: [&str; 4]| {
        // first column left aligned, numbers right aligned
        let _ = writeln!(
            out,
            "{:<w0$}  {:>w1$}  {:>w2$}  {:>w3$}",
            row[0],
            row[1],
            row[2],
            row[3],
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2],
            w3 = widths[3],
        );
    };

    line(&mut out, HEADERS);
    let rule = widths.map(|w| "-".repeat(w));
    line(
        &mut out,
        [rule[0].as_str(), rule[1].as_str(), rule[2].as_str(), rule[3].as_str()],
    );
    for row in &cells {
        line(
            &mut out,
            [row[0].as_str(), row[1].as_str(), row[2].as_str(), row[3].as_str()],
        );
    }
    out
}
