//! Schema merge, replacement suggestion, and tier classification.
//!
//! An inventory table is reconciled against its reference template
//! (column union, template rows first), each row gets a market replacement
//! suggestion, and each row is joined to a tier category by nearest-score
//! classification. Rows are never dropped: a row that cannot be scored
//! receives the neutral score instead.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Error;
use crate::ingest::InventoryKind;
use crate::table::Table;
use crate::templates::TierMatrix;

/// Column written with the computed (or caller-supplied) numeric score.
pub const SCORE_COLUMN: &str = "Tier Total Score";
/// Column written with the assigned category label.
pub const TIER_COLUMN: &str = "Tier";

/// Market data returned for one asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSuggestion {
    pub recommended_model: String,
    pub vendor: String,
    pub estimated_price_usd: u32,
    pub availability: String,
    pub lead_time_days: u32,
}

/// Replacement-suggestion collaborator. External and non-deterministic in
/// production; tests inject a fixed implementation.
#[async_trait]
pub trait MarketLookup: Send + Sync {
    async fn lookup(&self, display_name: &str) -> MarketSuggestion;
}

/// Stock implementation simulating a vendor catalog lookup.
pub struct CatalogMarketLookup;

const SAMPLE_VENDORS: &[&str] = &["Dell", "HPE", "Lenovo", "Cisco", "Supermicro"];
const SAMPLE_MODELS: &[&str] = &[
    "PowerEdge R750",
    "ProLiant DL380",
    "ThinkSystem SR650",
    "UCS C240",
    "SYS-620U",
];
const SAMPLE_PRICES: &[u32] = &[4500, 5200, 6100, 4900, 5600];

#[async_trait]
impl MarketLookup for CatalogMarketLookup {
    async fn lookup(&self, _display_name: &str) -> MarketSuggestion {
        let mut rng = rand::rng();
        MarketSuggestion {
            recommended_model: SAMPLE_MODELS[rng.random_range(0..SAMPLE_MODELS.len())].to_string(),
            vendor: SAMPLE_VENDORS[rng.random_range(0..SAMPLE_VENDORS.len())].to_string(),
            estimated_price_usd: SAMPLE_PRICES[rng.random_range(0..SAMPLE_PRICES.len())],
            availability: "In Stock".to_string(),
            lead_time_days: rng.random_range(5..=14),
        }
    }
}

/// Enriches merged inventory tables. `today` anchors the date-sensitive
/// scoring dimensions so runs are reproducible in tests.
pub struct Enricher<'a> {
    tiers: &'a TierMatrix,
    market: &'a dyn MarketLookup,
    today: NaiveDate,
}

impl<'a> Enricher<'a> {
    pub fn new(tiers: &'a TierMatrix, market: &'a dyn MarketLookup) -> Self {
        Self {
            tiers,
            market,
            today: Utc::now().date_naive(),
        }
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Merge an inventory table against its reference template and enrich
    /// every row. Template columns all survive; inventory columns are never
    /// dropped; template rows precede inventory rows.
    pub async fn enrich(
        &self,
        inventory: &Table,
        kind: InventoryKind,
        template: &Table,
    ) -> Table {
        let mut merged = template.clone();
        merged.append(inventory);

        for row in 0..merged.row_count() {
            let name = display_name(&merged, row, kind);
            let suggestion = self.market.lookup(&name).await;
            merged.set(row, "Recommended Model", suggestion.recommended_model);
            merged.set(row, "Vendor", suggestion.vendor);
            merged.set(
                row,
                "Estimated Price (USD)",
                suggestion.estimated_price_usd.to_string(),
            );
            merged.set(row, "Availability", suggestion.availability);
            merged.set(
                row,
                "Lead Time (days)",
                suggestion.lead_time_days.to_string(),
            );

            self.assign_tier(&mut merged, row, &name);
        }

        merged
    }

    /// Resolve the row's score and category. A caller-supplied score wins;
    /// otherwise a tier-matrix keyword alias on the model/name is honored;
    /// otherwise the rubric runs, defaulting to neutral on missing inputs.
    fn assign_tier(&self, table: &mut Table, row: usize, display: &str) {
        let existing = table
            .get(row, SCORE_COLUMN)
            .and_then(|v| v.trim().parse::<f64>().ok());

        let score = match existing {
            Some(score) => score,
            None => {
                let model = table.get(row, "Model").unwrap_or(display);
                if let Some(alias) = self.tiers.alias_for(model) {
                    let alias = alias.to_string();
                    table.set(row, TIER_COLUMN, alias);
                    return;
                }
                let score = self.rubric_score(table, row);
                table.set(row, SCORE_COLUMN, format!("{score:.1}"));
                score
            }
        };

        let category = self.tiers.classify(score).to_string();
        table.set(row, TIER_COLUMN, category);
    }

    /// Weighted rubric over five dimensions, each 0..=100 with 50 as the
    /// neutral default for missing inputs. The row score is their mean.
    fn rubric_score(&self, table: &Table, row: usize) -> f64 {
        let dimensions = [
            self.capacity_score(table, row),
            self.security_score(table, row),
            self.reliability_score(table, row),
            self.performance_score(table, row),
            self.cost_score(table, row),
        ];
        if dimensions.iter().all(|d| d.is_none()) {
            debug!("{}", Error::ScoringDefaulted { row });
        }
        let total: f64 = dimensions.iter().map(|d| d.unwrap_or(NEUTRAL)).sum();
        total / dimensions.len() as f64
    }

    /// Normalized RAM plus storage.
    fn capacity_score(&self, table: &Table, row: usize) -> Option<f64> {
        let ram = numeric_by_fragment(table, row, &["ram", "memory"]);
        let storage = numeric_by_fragment(table, row, &["storage", "disk"]);
        match (ram, storage) {
            (None, None) => None,
            (ram, storage) => {
                let ram_part = ram.map(|gb| (gb / 128.0).min(1.0) * 100.0);
                let storage_part = storage.map(|gb| (gb / 2048.0).min(1.0) * 100.0);
                let parts = [ram_part, storage_part];
                let known: Vec<f64> = parts.into_iter().flatten().collect();
                Some(known.iter().sum::<f64>() / known.len() as f64)
            }
        }
    }

    /// Presence of compliance/security tags.
    fn security_score(&self, table: &Table, row: usize) -> Option<f64> {
        let value = value_by_fragment(table, row, &["compliance", "security", "encryption"])?;
        let negative = ["no", "none", "n/a", "non-compliant", "noncompliant"];
        if negative.contains(&value.trim().to_lowercase().as_str()) {
            Some(25.0)
        } else {
            Some(80.0)
        }
    }

    /// Warranty or end-of-life still in the future.
    fn reliability_score(&self, table: &Table, row: usize) -> Option<f64> {
        let raw = value_by_fragment(table, row, &["warranty", "end of life", "eol"])?;
        let date = parse_date(raw)?;
        Some(if date > self.today { 85.0 } else { 20.0 })
    }

    /// CPU family heuristic.
    fn performance_score(&self, table: &Table, row: usize) -> Option<f64> {
        let cpu = value_by_fragment(table, row, &["cpu", "processor"])?.to_lowercase();
        let score = if cpu.contains("xeon") || cpu.contains("epyc") {
            85.0
        } else if cpu.contains("i9") || cpu.contains("ryzen 9") {
            80.0
        } else if cpu.contains("i7") || cpu.contains("ryzen 7") {
            70.0
        } else if cpu.contains("i5") || cpu.contains("ryzen 5") {
            55.0
        } else if cpu.contains("i3")
            || cpu.contains("celeron")
            || cpu.contains("atom")
            || cpu.contains("pentium")
        {
            35.0
        } else {
            NEUTRAL
        };
        Some(score)
    }

    /// Decay past end-of-life: still supported scores well, each year past
    /// EOL erodes the score down to a floor.
    fn cost_score(&self, table: &Table, row: usize) -> Option<f64> {
        let raw = value_by_fragment(table, row, &["end of life", "eol"])?;
        let date = parse_date(raw)?;
        if date > self.today {
            return Some(75.0);
        }
        let years_past = (self.today.num_days_from_ce() - date.num_days_from_ce()) as f64 / 365.25;
        Some((75.0 - years_past * 15.0).max(20.0))
    }
}

const NEUTRAL: f64 = 50.0;

/// Display name for the market lookup: explicit name fields first, then
/// any id-suffixed column, then a synthetic placeholder.
pub fn display_name(table: &Table, row: usize, kind: InventoryKind) -> String {
    let candidates: &[&str] = match kind {
        InventoryKind::Hardware => &["Device Name", "Server Name", "Model", "Name"],
        InventoryKind::Software => &[
            "App Name",
            "Application Name",
            "Software Name",
            "Application",
            "Name",
        ],
    };
    for candidate in candidates {
        if let Some(value) = table.get(row, candidate) {
            if !value.trim().is_empty() {
                return value.trim().to_string();
            }
        }
    }

    for column in table.columns() {
        if column.trim().to_lowercase().ends_with("id") {
            if let Some(value) = table.get(row, column) {
                if !value.trim().is_empty() {
                    return value.trim().to_string();
                }
            }
        }
    }

    match kind {
        InventoryKind::Hardware => format!("Device-{row}"),
        InventoryKind::Software => format!("App-{row}"),
    }
}

fn value_by_fragment<'t>(table: &'t Table, row: usize, fragments: &[&str]) -> Option<&'t str> {
    for column in table.columns() {
        let lower = column.to_lowercase();
        if fragments.iter().any(|f| lower.contains(f)) {
            if let Some(value) = table.get(row, column) {
                if !value.trim().is_empty() {
                    return Some(value);
                }
            }
        }
    }
    None
}

fn numeric_by_fragment(table: &Table, row: usize, fragments: &[&str]) -> Option<f64> {
    value_by_fragment(table, row, fragments).and_then(parse_leading_number)
}

/// Parse "128", "128 GB", "1,024" style values.
fn parse_leading_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    cleaned.parse().ok().filter(|n: &f64| n.is_finite())
}

/// Parse the date formats inventory sheets actually contain.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    for format in ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date);
        }
    }
    // Bare year reads as the end of that year.
    if let Ok(year) = raw.parse::<i32>() {
        if (1990..=2100).contains(&year) {
            return NaiveDate::from_ymd_opt(year, 12, 31);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::TierMatrix;

    pub struct FixedMarketLookup;

    #[async_trait]
    impl MarketLookup for FixedMarketLookup {
        async fn lookup(&self, _display_name: &str) -> MarketSuggestion {
            MarketSuggestion {
                recommended_model: "PowerEdge R750".to_string(),
                vendor: "Dell".to_string(),
                estimated_price_usd: 4500,
                availability: "In Stock".to_string(),
                lead_time_days: 7,
            }
        }
    }

    fn matrix() -> TierMatrix {
        TierMatrix::parse(
            "Category,Threshold,Keywords\n\
             Excellent,90,gen11\n\
             Advanced,70,\n\
             Standard,45,\n\
             Obsolete,20,legacy\n",
        )
        .unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 1).unwrap()
    }

    fn template() -> Table {
        Table::from_csv_reader(
            "Device ID,Device Name,Model,CPU,RAM (GB),Storage (GB),End of Life,Compliance,Status,Tier Total Score,Tier\n"
                .as_bytes(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn merge_keeps_all_template_and_inventory_columns() {
        let inventory = Table::from_csv_reader(
            "Device ID,Custom Note\nD-1,keep me\n".as_bytes(),
        )
        .unwrap();
        let tiers = matrix();
        let enricher = Enricher::new(&tiers, &FixedMarketLookup).with_today(today());
        let enriched = enricher
            .enrich(&inventory, InventoryKind::Hardware, &template())
            .await;

        for column in template().columns() {
            assert!(enriched.has_column(column), "template column {column} lost");
        }
        assert!(enriched.has_column("Custom Note"));
        assert_eq!(enriched.get(0, "Custom Note"), Some("keep me"));
    }

    #[tokio::test]
    async fn market_columns_are_added_per_row() {
        let inventory =
            Table::from_csv_reader("Device ID,Device Name\nD-1,web01\n".as_bytes()).unwrap();
        let tiers = matrix();
        let enricher = Enricher::new(&tiers, &FixedMarketLookup).with_today(today());
        let enriched = enricher
            .enrich(&inventory, InventoryKind::Hardware, &template())
            .await;

        assert_eq!(enriched.get(0, "Recommended Model"), Some("PowerEdge R750"));
        assert_eq!(enriched.get(0, "Vendor"), Some("Dell"));
        assert_eq!(enriched.get(0, "Estimated Price (USD)"), Some("4500"));
        assert_eq!(enriched.get(0, "Lead Time (days)"), Some("7"));
    }

    #[tokio::test]
    async fn existing_scores_are_honored() {
        let inventory = Table::from_csv_reader(
            "Device ID,Tier Total Score\nD-1,92\nD-2,18\n".as_bytes(),
        )
        .unwrap();
        let tiers = matrix();
        let enricher = Enricher::new(&tiers, &FixedMarketLookup).with_today(today());
        let enriched = enricher
            .enrich(&inventory, InventoryKind::Hardware, &template())
            .await;

        assert_eq!(enriched.get(0, TIER_COLUMN), Some("Excellent"));
        assert_eq!(enriched.get(1, TIER_COLUMN), Some("Obsolete"));
    }

    #[tokio::test]
    async fn keyword_alias_wins_over_rubric() {
        let inventory =
            Table::from_csv_reader("Device ID,Model\nD-1,ProLiant Gen11\n".as_bytes()).unwrap();
        let tiers = matrix();
        let enricher = Enricher::new(&tiers, &FixedMarketLookup).with_today(today());
        let enriched = enricher
            .enrich(&inventory, InventoryKind::Hardware, &template())
            .await;
        assert_eq!(enriched.get(0, TIER_COLUMN), Some("Excellent"));
    }

    #[tokio::test]
    async fn unscorable_rows_get_neutral_not_dropped() {
        let inventory = Table::from_csv_reader("Device ID\nD-1\nD-2\n".as_bytes()).unwrap();
        let tiers = matrix();
        let enricher = Enricher::new(&tiers, &FixedMarketLookup).with_today(today());
        let enriched = enricher
            .enrich(&inventory, InventoryKind::Hardware, &template())
            .await;

        assert_eq!(enriched.row_count(), 2);
        // All five dimensions neutral: mean is 50, nearest threshold is 45.
        assert_eq!(enriched.get(0, SCORE_COLUMN), Some("50.0"));
        assert_eq!(enriched.get(0, TIER_COLUMN), Some("Standard"));
    }

    #[tokio::test]
    async fn rubric_rewards_capacity_and_recency() {
        let inventory = Table::from_csv_reader(
            "Device ID,CPU,RAM (GB),Storage (GB),End of Life,Compliance\n\
             D-1,Intel Xeon Gold,128,2048,2030-01-01,SOC2\n\
             D-2,Pentium 4,2,80,2012-06-30,none\n"
                .as_bytes(),
        )
        .unwrap();
        let tiers = matrix();
        let enricher = Enricher::new(&tiers, &FixedMarketLookup).with_today(today());
        let enriched = enricher
            .enrich(&inventory, InventoryKind::Hardware, &template())
            .await;

        let strong: f64 = enriched.get(0, SCORE_COLUMN).unwrap().parse().unwrap();
        let weak: f64 = enriched.get(1, SCORE_COLUMN).unwrap().parse().unwrap();
        assert!(strong > 80.0, "strong box scored {strong}");
        assert!(weak < 35.0, "weak box scored {weak}");
        assert_eq!(enriched.get(0, TIER_COLUMN), Some("Excellent"));
        assert_eq!(enriched.get(1, TIER_COLUMN), Some("Obsolete"));
    }

    #[test]
    fn display_name_priority() {
        let mut table = Table::with_columns(vec!["Device ID", "Device Name"]);
        table.push_row(vec![
            ("Device ID".to_string(), Some("D-9".to_string())),
            ("Device Name".to_string(), Some("core-sw".to_string())),
        ]);
        assert_eq!(display_name(&table, 0, InventoryKind::Hardware), "core-sw");

        let mut id_only = Table::with_columns(vec!["Asset ID"]);
        id_only.push_row(vec![("Asset ID".to_string(), Some("A-1".to_string()))]);
        assert_eq!(display_name(&id_only, 0, InventoryKind::Hardware), "A-1");

        let mut bare = Table::with_columns(vec!["Notes"]);
        bare.push_empty_row();
        assert_eq!(display_name(&bare, 0, InventoryKind::Software), "App-0");
    }

    #[test]
    fn date_parsing_accepts_common_formats() {
        assert!(parse_date("2030-01-15").is_some());
        assert!(parse_date("01/15/2030").is_some());
        assert!(parse_date("2030").is_some());
        assert!(parse_date("soon").is_none());
    }
}
