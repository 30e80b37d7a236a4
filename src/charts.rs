//! Chart generation for enriched inventory tables.
//!
//! For each of {hardware, software} x {Tier, Status} a pie chart of the
//! value distribution is rendered; a table lacking the column simply
//! yields no chart for that slot. Rendering is deterministic for
//! identical inputs and writes each chart once under the session charts
//! directory.

use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::Result;
use crate::table::Table;

const CHART_SIZE: f64 = 360.0;
const RADIUS: f64 = 120.0;
const PALETTE: &[&str] = &[
    "#4e79a7", "#f28e2b", "#59a14f", "#e15759", "#76b7b2", "#edc948", "#b07aa1", "#9c755f",
];

/// Render the fixed chart set. Returns `chart name -> file path`; empty
/// tables or missing columns shrink the map, never error.
pub fn generate_charts(
    hw: &Table,
    sw: &Table,
    charts_dir: &Path,
) -> Result<BTreeMap<String, PathBuf>> {
    let slots = [
        (hw, "Tier", "hw_tier_distribution", "HW Tier Distribution"),
        (hw, "Status", "hw_status_pie", "HW Status Breakdown"),
        (sw, "Tier", "sw_tier_distribution", "SW Tier Distribution"),
        (sw, "Status", "sw_status_pie", "SW Status Breakdown"),
    ];

    let mut charts = BTreeMap::new();
    for (table, column, name, title) in slots {
        let counts = table.value_counts(column);
        if counts.is_empty() {
            debug!(chart = name, "no values for chart slot, skipping");
            continue;
        }
        let path = charts_dir.join(format!("{name}.svg"));
        match std::fs::write(&path, render_pie(title, &counts)) {
            Ok(()) => {
                charts.insert(name.to_string(), path);
            }
            Err(e) => {
                // One failed chart never fails the run.
                warn!(chart = name, error = %e, "failed to write chart");
            }
        }
    }
    Ok(charts)
}

/// A single pie chart with legend as standalone SVG text.
fn render_pie(title: &str, counts: &BTreeMap<String, usize>) -> String {
    let total: usize = counts.values().sum();
    let cx = CHART_SIZE / 2.0;
    let cy = CHART_SIZE / 2.0 + 10.0;

    let mut body = String::new();
    body.push_str(&format!(
        "<text x=\"{cx}\" y=\"24\" text-anchor=\"middle\" font-size=\"16\" \
         font-family=\"sans-serif\" font-weight=\"bold\">{}</text>\n",
        escape(title)
    ));

    // Slices start at twelve o'clock and run clockwise.
    let mut angle = -PI / 2.0;
    for (i, (_label, count)) in counts.iter().enumerate() {
        let fraction = *count as f64 / total as f64;
        let color = PALETTE[i % PALETTE.len()];
        if fraction >= 1.0 {
            body.push_str(&format!(
                "<circle cx=\"{cx}\" cy=\"{cy}\" r=\"{RADIUS}\" fill=\"{color}\"/>\n"
            ));
        } else {
            let sweep = fraction * 2.0 * PI;
            let (x0, y0) = (cx + RADIUS * angle.cos(), cy + RADIUS * angle.sin());
            let end = angle + sweep;
            let (x1, y1) = (cx + RADIUS * end.cos(), cy + RADIUS * end.sin());
            let large_arc = if sweep > PI { 1 } else { 0 };
            body.push_str(&format!(
                "<path d=\"M {cx:.2} {cy:.2} L {x0:.2} {y0:.2} \
                 A {RADIUS} {RADIUS} 0 {large_arc} 1 {x1:.2} {y1:.2} Z\" \
                 fill=\"{color}\" stroke=\"white\" stroke-width=\"1\"/>\n"
            ));
            angle = end;
        }
    }

    let legend_x = CHART_SIZE + 16.0;
    for (i, (label, count)) in counts.iter().enumerate() {
        let y = 50.0 + i as f64 * 22.0;
        let color = PALETTE[i % PALETTE.len()];
        let percent = 100.0 * *count as f64 / total as f64;
        body.push_str(&format!(
            "<rect x=\"{legend_x}\" y=\"{}\" width=\"14\" height=\"14\" fill=\"{color}\"/>\n\
             <text x=\"{}\" y=\"{}\" font-size=\"13\" font-family=\"sans-serif\">{} ({percent:.1}%)</text>\n",
            y - 11.0,
            legend_x + 20.0,
            y,
            escape(label)
        ));
    }

    let width = CHART_SIZE + 180.0;
    format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{}\" \
         viewBox=\"0 0 {width} {}\">\n{body}</svg>\n",
        CHART_SIZE + 20.0,
        CHART_SIZE + 20.0
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with(column: &str, values: &[&str]) -> Table {
        let mut table = Table::with_columns(vec![column]);
        for value in values {
            table.push_row(vec![(column.to_string(), Some(value.to_string()))]);
        }
        table
    }

    #[test]
    fn renders_one_chart_per_populated_slot() {
        let dir = tempfile::tempdir().unwrap();
        let hw = table_with("Tier", &["Excellent", "Obsolete", "Excellent"]);
        let sw = table_with("Status", &["Active", "Retired"]);

        let charts = generate_charts(&hw, &sw, dir.path()).unwrap();
        assert_eq!(
            charts.keys().collect::<Vec<_>>(),
            vec!["hw_tier_distribution", "sw_status_pie"]
        );
        for path in charts.values() {
            let svg = std::fs::read_to_string(path).unwrap();
            assert!(svg.starts_with("<svg"));
        }
    }

    #[test]
    fn empty_tables_yield_empty_map_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let charts = generate_charts(&Table::new(), &Table::new(), dir.path()).unwrap();
        assert!(charts.is_empty());
    }

    #[test]
    fn identical_inputs_render_identical_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let hw = table_with("Tier", &["A", "B", "B"]);
        let first = generate_charts(&hw, &Table::new(), dir.path()).unwrap();
        let bytes_first = std::fs::read(&first["hw_tier_distribution"]).unwrap();
        let second = generate_charts(&hw, &Table::new(), dir.path()).unwrap();
        let bytes_second = std::fs::read(&second["hw_tier_distribution"]).unwrap();
        assert_eq!(bytes_first, bytes_second);
    }

    #[test]
    fn single_category_renders_full_circle() {
        let dir = tempfile::tempdir().unwrap();
        let hw = table_with("Tier", &["Only", "Only"]);
        let charts = generate_charts(&hw, &Table::new(), dir.path()).unwrap();
        let svg = std::fs::read_to_string(&charts["hw_tier_distribution"]).unwrap();
        assert!(svg.contains("<circle"));
    }
}
