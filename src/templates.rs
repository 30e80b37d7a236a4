//! Reference templates and the tier classification matrix.
//!
//! Three resources load once per process: the hardware gap-analysis schema,
//! the software gap-analysis schema, and the tier matrix. The store is
//! immutable after load and shared by reference across sessions, so no
//! locking is needed.

use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::table::Table;

const HW_TEMPLATE_CSV: &str = include_str!("../templates/hw_gap_analysis.csv");
const SW_TEMPLATE_CSV: &str = include_str!("../templates/sw_gap_analysis.csv");
const TIER_MATRIX_CSV: &str = include_str!("../templates/tier_matrix.csv");

const HW_TEMPLATE_FILE: &str = "hw_gap_analysis.csv";
const SW_TEMPLATE_FILE: &str = "sw_gap_analysis.csv";
const TIER_MATRIX_FILE: &str = "tier_matrix.csv";

/// Read-only template store, loaded once at startup.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    hardware: Table,
    software: Table,
    tiers: TierMatrix,
}

impl TemplateStore {
    /// Load templates from `template_dir` when present, otherwise fall back
    /// to the compiled-in defaults. A directory missing one of the three
    /// files falls back per file.
    pub fn load(template_dir: Option<&Path>) -> Result<Self> {
        let hardware = load_table(template_dir, HW_TEMPLATE_FILE, HW_TEMPLATE_CSV)?;
        let software = load_table(template_dir, SW_TEMPLATE_FILE, SW_TEMPLATE_CSV)?;
        let tiers = TierMatrix::parse(&load_text(template_dir, TIER_MATRIX_FILE, TIER_MATRIX_CSV))?;
        debug!(
            hw_columns = hardware.columns().len(),
            sw_columns = software.columns().len(),
            tiers = tiers.entries().len(),
            "template store loaded"
        );
        Ok(Self {
            hardware,
            software,
            tiers,
        })
    }

    pub fn hardware(&self) -> &Table {
        &self.hardware
    }

    pub fn software(&self) -> &Table {
        &self.software
    }

    pub fn tiers(&self) -> &TierMatrix {
        &self.tiers
    }
}

fn load_text(dir: Option<&Path>, file: &str, embedded: &str) -> String {
    if let Some(dir) = dir {
        let path = dir.join(file);
        if let Ok(text) = std::fs::read_to_string(&path) {
            return text;
        }
    }
    embedded.to_string()
}

fn load_table(dir: Option<&Path>, file: &str, embedded: &str) -> Result<Table> {
    Table::from_csv_reader(load_text(dir, file, embedded).as_bytes())
}

/// One tier matrix entry: a score threshold, its category label, and the
/// model-name keywords that map straight to the category.
#[derive(Debug, Clone, PartialEq)]
pub struct TierEntry {
    pub label: String,
    pub threshold: f64,
    pub keywords: Vec<String>,
}

/// Ordered tier matrix. Classification is nearest-threshold, not
/// range-based: every finite score resolves to exactly one category.
#[derive(Debug, Clone, Default)]
pub struct TierMatrix {
    entries: Vec<TierEntry>,
}

impl TierMatrix {
    /// Parse `Category,Threshold,Keywords` CSV. Thresholds must be
    /// pairwise distinct or nearest-match would be ambiguous.
    pub fn parse(csv_text: &str) -> Result<Self> {
        let table = Table::from_csv_reader(csv_text.as_bytes())?;
        let mut entries = Vec::with_capacity(table.row_count());
        for row in 0..table.row_count() {
            let label = table
                .get(row, "Category")
                .ok_or_else(|| Error::Template(format!("tier matrix row {row} has no category")))?
                .to_string();
            let threshold: f64 = table
                .get(row, "Threshold")
                .ok_or_else(|| Error::Template(format!("tier matrix row {row} has no threshold")))?
                .parse()
                .map_err(|e| Error::Template(format!("tier matrix row {row}: {e}")))?;
            let keywords = table
                .get(row, "Keywords")
                .map(|k| {
                    k.split(';')
                        .map(|s| s.trim().to_lowercase())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default();
            entries.push(TierEntry {
                label,
                threshold,
                keywords,
            });
        }
        if entries.is_empty() {
            return Err(Error::Template("tier matrix is empty".to_string()));
        }
        for (i, a) in entries.iter().enumerate() {
            if entries[i + 1..].iter().any(|b| b.threshold == a.threshold) {
                return Err(Error::Template(format!(
                    "duplicate tier threshold {}",
                    a.threshold
                )));
            }
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[TierEntry] {
        &self.entries
    }

    /// Category labels in matrix order.
    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.label.as_str()).collect()
    }

    /// Nearest-threshold classification. Ties resolve to the earlier
    /// entry, keeping repeated calls deterministic.
    pub fn classify(&self, score: f64) -> &str {
        let mut best = &self.entries[0];
        let mut best_distance = (score - best.threshold).abs();
        for entry in &self.entries[1..] {
            let distance = (score - entry.threshold).abs();
            if distance < best_distance {
                best = entry;
                best_distance = distance;
            }
        }
        &best.label
    }

    /// Keyword alias match against a model or product name, mirroring the
    /// original model-string lookup. First matching entry wins.
    pub fn alias_for(&self, text: &str) -> Option<&str> {
        let haystack = text.to_lowercase();
        self.entries
            .iter()
            .find(|e| e.keywords.iter().any(|k| haystack.contains(k.as_str())))
            .map(|e| e.label.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_templates_load() {
        let store = TemplateStore::load(None).unwrap();
        assert!(store.hardware().has_column("Device ID"));
        assert!(store.hardware().has_column("Tier Total Score"));
        assert!(store.software().has_column("License Status"));
        assert_eq!(store.tiers().entries().len(), 4);
    }

    #[test]
    fn template_dir_overrides_embedded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("tier_matrix.csv"),
            "Category,Threshold,Keywords\nGood,80,\nBad,10,\n",
        )
        .unwrap();
        let store = TemplateStore::load(Some(dir.path())).unwrap();
        assert_eq!(store.tiers().labels(), vec!["Good", "Bad"]);
        // Missing files still fall back to the embedded defaults.
        assert!(store.hardware().has_column("Device ID"));
    }

    #[test]
    fn nearest_classification_is_deterministic() {
        let matrix =
            TierMatrix::parse("Category,Threshold,Keywords\nHigh,90,\nMid,50,\nLow,10,\n").unwrap();
        assert_eq!(matrix.classify(95.0), "High");
        assert_eq!(matrix.classify(49.0), "Mid");
        assert_eq!(matrix.classify(12.0), "Low");
        // Equidistant between Mid(50) and High(90): earlier entry wins.
        assert_eq!(matrix.classify(70.0), "High");
        for _ in 0..10 {
            assert_eq!(matrix.classify(70.0), "High");
        }
    }

    #[test]
    fn duplicate_thresholds_rejected() {
        let result = TierMatrix::parse("Category,Threshold,Keywords\nA,50,\nB,50,\n");
        assert!(result.is_err());
    }

    #[test]
    fn alias_matches_model_substrings() {
        let matrix = TierMatrix::parse(
            "Category,Threshold,Keywords\nExcellent,90,gen11\nObsolete,20,legacy;2014\n",
        )
        .unwrap();
        assert_eq!(matrix.alias_for("ProLiant Gen11 server"), Some("Excellent"));
        assert_eq!(matrix.alias_for("Legacy tower 2014"), Some("Obsolete"));
        assert_eq!(matrix.alias_for("Unremarkable box"), None);
    }
}
