//! The fixed section-builder sequence.
//!
//! Each builder is a pure `(hw, sw) -> SectionSummary` function. The order
//! of [`builders`] defines report section numbering, so entries are only
//! ever appended, never reordered.

use std::collections::BTreeMap;

use crate::enrich::{SCORE_COLUMN, TIER_COLUMN};
use crate::ingest::InventoryKind;
use crate::table::Table;

use super::SectionSummary;

pub type SectionBuilder = fn(&Table, &Table) -> SectionSummary;

/// The report's section sequence, in order.
pub fn builders() -> &'static [SectionBuilder] {
    &[
        executive_summary,
        landscape_overview,
        hardware_inventory,
        software_inventory,
        tier_distribution,
        lifecycle_status,
        license_compliance,
        security_posture,
        performance,
        reliability,
        scalability,
        legacy_debt,
        obsolescence_risk,
        cloud_migration,
        strategic_alignment,
        business_impact,
        financial_implications,
        sustainability,
        recommendations,
        next_steps,
    ]
}

fn executive_summary(hw: &Table, sw: &Table) -> SectionSummary {
    SectionSummary::new(
        "executive_summary",
        "Executive Summary",
        format!(
            "The assessment covers {} hardware assets and {} software assets. \
             {} of all assets are classified Obsolete and {} Excellent",
            hw.row_count(),
            sw.row_count(),
            percent_of_total(hw, sw, "Obsolete"),
            percent_of_total(hw, sw, "Excellent"),
        ),
    )
}

fn landscape_overview(hw: &Table, sw: &Table) -> SectionSummary {
    let vendors = distinct_count(hw, "Manufacturer") + distinct_count(sw, "Vendor");
    SectionSummary::new(
        "landscape_overview",
        "IT Landscape Overview",
        format!(
            "The estate spans {} assets across {} vendors, with {} distinct \
             operating systems in use",
            hw.row_count() + sw.row_count(),
            vendors,
            distinct_count(hw, "Operating System"),
        ),
    )
}

fn hardware_inventory(hw: &Table, _sw: &Table) -> SectionSummary {
    SectionSummary::new(
        "hardware_inventory",
        "Hardware Inventory Breakdown",
        format!("{} hardware assets were inventoried", hw.row_count()),
    )
    .with_items(asset_names(hw, InventoryKind::Hardware))
}

fn software_inventory(_hw: &Table, sw: &Table) -> SectionSummary {
    SectionSummary::new(
        "software_inventory",
        "Software Inventory Breakdown",
        format!("{} software assets were inventoried", sw.row_count()),
    )
    .with_items(asset_names(sw, InventoryKind::Software))
}

fn tier_distribution(hw: &Table, sw: &Table) -> SectionSummary {
    SectionSummary::new(
        "tier_distribution",
        "Tier Distribution",
        format!(
            "Hardware tiers: {}. Software tiers: {}",
            counts_sentence(&hw.value_counts(TIER_COLUMN)),
            counts_sentence(&sw.value_counts(TIER_COLUMN)),
        ),
    )
}

fn lifecycle_status(hw: &Table, sw: &Table) -> SectionSummary {
    SectionSummary::new(
        "lifecycle_status",
        "Lifecycle Status",
        format!(
            "Hardware status: {}. Software status: {}",
            counts_sentence(&hw.value_counts("Status")),
            counts_sentence(&sw.value_counts("Status")),
        ),
    )
}

fn license_compliance(_hw: &Table, sw: &Table) -> SectionSummary {
    let counts = sw.value_counts("License Status");
    let expired = counts
        .iter()
        .filter(|(k, _)| {
            let k = k.to_lowercase();
            k.contains("expired") || k.contains("unlicensed") || k.contains("violation")
        })
        .map(|(_, v)| v)
        .sum::<usize>();
    SectionSummary::new(
        "license_compliance",
        "License Compliance",
        format!(
            "License status: {}. {} software assets need licensing attention",
            counts_sentence(&counts),
            expired
        ),
    )
}

fn security_posture(hw: &Table, sw: &Table) -> SectionSummary {
    let tagged = compliance_tagged(hw) + compliance_tagged(sw);
    SectionSummary::new(
        "security_posture",
        "Security Posture",
        format!(
            "{} of {} assets carry compliance or security tags",
            tagged,
            hw.row_count() + sw.row_count()
        ),
    )
}

fn performance(hw: &Table, _sw: &Table) -> SectionSummary {
    SectionSummary::new(
        "performance",
        "Performance",
        format!(
            "Average hardware tier score is {}; scores below the Standard \
             threshold indicate performance constraints",
            average_score_text(hw)
        ),
    )
}

fn reliability(hw: &Table, sw: &Table) -> SectionSummary {
    SectionSummary::new(
        "reliability",
        "Reliability",
        format!(
            "{} assets are past warranty or end of life and carry elevated \
             failure risk",
            past_eol(hw) + past_eol(sw)
        ),
    )
}

fn scalability(hw: &Table, _sw: &Table) -> SectionSummary {
    SectionSummary::new(
        "scalability",
        "Scalability",
        format!(
            "Average hardware tier score of {} reflects the estate's headroom \
             for growth in compute and storage capacity",
            average_score_text(hw)
        ),
    )
}

fn legacy_debt(hw: &Table, sw: &Table) -> SectionSummary {
    let legacy = tier_count(hw, "Obsolete") + tier_count(sw, "Obsolete");
    SectionSummary::new(
        "legacy_debt",
        "Legacy Systems & Technical Debt",
        format!("{} assets are classified Obsolete and constitute technical debt", legacy),
    )
    .with_items(tier_members(hw, sw, "Obsolete"))
}

fn obsolescence_risk(hw: &Table, sw: &Table) -> SectionSummary {
    let at_risk = tier_count(hw, "Standard") + tier_count(sw, "Standard");
    SectionSummary::new(
        "obsolescence_risk",
        "Obsolescence Risk",
        format!(
            "{} assets sit in the Standard tier and will reach obsolescence \
             within a typical refresh cycle",
            at_risk
        ),
    )
}

fn cloud_migration(hw: &Table, sw: &Table) -> SectionSummary {
    let candidates = tier_count(hw, "Standard")
        + tier_count(hw, "Obsolete")
        + tier_count(sw, "Standard")
        + tier_count(sw, "Obsolete");
    SectionSummary::new(
        "cloud_migration",
        "Cloud Migration Fit",
        format!(
            "{} aging assets are primary candidates for replacement with \
             cloud-hosted alternatives",
            candidates
        ),
    )
}

fn strategic_alignment(hw: &Table, sw: &Table) -> SectionSummary {
    SectionSummary::new(
        "strategic_alignment",
        "Strategic Alignment",
        format!(
            "{} of assets meet or exceed the Advanced tier and align with a \
             modern infrastructure baseline",
            percent_at_or_above(hw, sw)
        ),
    )
}

fn business_impact(hw: &Table, sw: &Table) -> SectionSummary {
    let exposed = tier_count(hw, "Obsolete") + tier_count(sw, "Obsolete");
    SectionSummary::new(
        "business_impact",
        "Business Impact",
        format!(
            "{} obsolete assets expose business processes to outage and \
             support-contract risk",
            exposed
        ),
    )
}

fn financial_implications(hw: &Table, sw: &Table) -> SectionSummary {
    let estimated = replacement_cost(hw) + replacement_cost(sw);
    SectionSummary::new(
        "financial_implications",
        "Financial Implications",
        format!(
            "Estimated replacement spend across suggested substitutes is \
             {estimated} USD"
        ),
    )
}

fn sustainability(hw: &Table, _sw: &Table) -> SectionSummary {
    let aged = tier_count(hw, "Obsolete");
    SectionSummary::new(
        "sustainability",
        "Sustainability",
        format!(
            "{} hardware assets past efficient service life drive \
             disproportionate energy use; consolidation reduces footprint",
            aged
        ),
    )
}

fn recommendations(hw: &Table, sw: &Table) -> SectionSummary {
    SectionSummary::new(
        "recommendations",
        "Recommendations",
        format!(
            "Decommission the {} Obsolete assets, upgrade the {} Standard \
             assets, and keep monitoring Advanced systems",
            tier_count(hw, "Obsolete") + tier_count(sw, "Obsolete"),
            tier_count(hw, "Standard") + tier_count(sw, "Standard"),
        ),
    )
}

fn next_steps(hw: &Table, sw: &Table) -> SectionSummary {
    SectionSummary::new(
        "next_steps",
        "Next Steps",
        format!(
            "Validate the {} flagged assets with their owners, then proceed \
             to the market gap analysis for procurement options",
            tier_count(hw, "Obsolete") + tier_count(sw, "Obsolete"),
        ),
    )
}

// Shared aggregation helpers.

fn counts_sentence(counts: &BTreeMap<String, usize>) -> String {
    if counts.is_empty() {
        return "no data".to_string();
    }
    counts
        .iter()
        .map(|(label, count)| format!("{label} {count}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn distinct_count(table: &Table, column: &str) -> usize {
    table.value_counts(column).len()
}

fn tier_count(table: &Table, tier: &str) -> usize {
    table.value_counts(TIER_COLUMN).get(tier).copied().unwrap_or(0)
}

fn percent_of_total(hw: &Table, sw: &Table, tier: &str) -> String {
    let total = hw.row_count() + sw.row_count();
    if total == 0 {
        return "0%".to_string();
    }
    let count = tier_count(hw, tier) + tier_count(sw, tier);
    format!("{}%", (100 * count) / total)
}

fn percent_at_or_above(hw: &Table, sw: &Table) -> String {
    let total = hw.row_count() + sw.row_count();
    if total == 0 {
        return "0%".to_string();
    }
    let aligned = tier_count(hw, "Excellent")
        + tier_count(hw, "Advanced")
        + tier_count(sw, "Excellent")
        + tier_count(sw, "Advanced");
    format!("{}%", (100 * aligned) / total)
}

fn average_score_text(table: &Table) -> String {
    let mut total = 0.0;
    let mut count = 0usize;
    for row in 0..table.row_count() {
        if let Some(score) = table
            .get(row, SCORE_COLUMN)
            .and_then(|v| v.parse::<f64>().ok())
        {
            total += score;
            count += 1;
        }
    }
    if count == 0 {
        "unavailable".to_string()
    } else {
        format!("{:.1}", total / count as f64)
    }
}

fn compliance_tagged(table: &Table) -> usize {
    let mut tagged = 0;
    for row in 0..table.row_count() {
        if table
            .get(row, "Compliance")
            .map(|v| !v.trim().is_empty())
            .unwrap_or(false)
        {
            tagged += 1;
        }
    }
    tagged
}

fn past_eol(table: &Table) -> usize {
    // Tier scoring already folded dates in; the Obsolete bucket is the
    // operational proxy for past-EOL here.
    tier_count(table, "Obsolete")
}

fn replacement_cost(table: &Table) -> u64 {
    let mut total = 0u64;
    for row in 0..table.row_count() {
        if let Some(price) = table
            .get(row, "Estimated Price (USD)")
            .and_then(|v| v.parse::<u64>().ok())
        {
            total += price;
        }
    }
    total
}

fn asset_names(table: &Table, kind: InventoryKind) -> Vec<String> {
    (0..table.row_count())
        .map(|row| crate::enrich::display_name(table, row, kind))
        .collect()
}

fn tier_members(hw: &Table, sw: &Table, tier: &str) -> Vec<String> {
    let mut members = Vec::new();
    for (table, kind) in [(hw, InventoryKind::Hardware), (sw, InventoryKind::Software)] {
        for row in 0..table.row_count() {
            if table.get(row, TIER_COLUMN) == Some(tier) {
                members.push(crate::enrich::display_name(table, row, kind));
            }
        }
    }
    members
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enriched_hw() -> Table {
        Table::from_csv_reader(
            "Device ID,Device Name,Tier Total Score,Tier,Status,Estimated Price (USD)\n\
             D-1,web01,92,Excellent,Active,4500\n\
             D-2,old01,18,Obsolete,Retired,5200\n"
                .as_bytes(),
        )
        .unwrap()
    }

    #[test]
    fn builder_sequence_has_twenty_stable_sections() {
        let all = builders();
        assert_eq!(all.len(), 20);
        let first = executive_summary(&Table::new(), &Table::new());
        assert_eq!(first.key, "executive_summary");
        let last = next_steps(&Table::new(), &Table::new());
        assert_eq!(last.key, "next_steps");
    }

    #[test]
    fn summaries_tolerate_empty_tables() {
        for builder in builders() {
            let summary = builder(&Table::new(), &Table::new());
            assert!(!summary.overview.is_empty(), "{} blank", summary.key);
            assert!(summary.items.is_empty());
        }
    }

    #[test]
    fn tier_aggregates_reflect_table_contents() {
        let hw = enriched_hw();
        let summary = tier_distribution(&hw, &Table::new());
        assert!(summary.overview.contains("Excellent 1"));
        assert!(summary.overview.contains("Obsolete 1"));

        let debt = legacy_debt(&hw, &Table::new());
        assert!(debt.overview.starts_with('1'));
        assert_eq!(debt.items, vec!["old01"]);
    }

    #[test]
    fn financial_total_sums_suggested_prices() {
        let summary = financial_implications(&enriched_hw(), &Table::new());
        assert!(summary.overview.contains("9700"));
    }
}
