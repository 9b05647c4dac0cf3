use crate::model;
use anyhow::Context;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_FILE: &str = "examd.json";

const DEFAULT_TRADES: [&str; 17] = [
    "TTC",
    "OCC",
    "DTMN",
    "EFS",
    "DVM",
    "LMN",
    "CLK SD",
    "STEWARD",
    "WASHERMAN",
    "CHEFCOM",
    "HOUSE KEEPER",
    "MESS KEEPER",
    "SKT",
    "MUSICIAN",
    "ARTSN WW",
    "HAIR DRESSER",
    "SP STAFF",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupEntry {
    pub code: String,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportLayout {
    Flat,
    #[default]
    Statements,
}

impl ReportLayout {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flat" => Some(ReportLayout::Flat),
            "statements" => Some(ReportLayout::Statements),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReportLayout::Flat => "flat",
            ReportLayout::Statements => "statements",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportConfig {
    pub layout: ReportLayout,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutoMarkConfig {
    /// Older workspaces stored 0 for ungraded answers. Setting this lets the
    /// auto-marker overwrite a graded zero as well.
    pub zero_counts_as_ungraded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkspaceConfig {
    pub trades: Vec<LookupEntry>,
    pub centers: Vec<LookupEntry>,
    pub report: ReportConfig,
    pub auto_mark: AutoMarkConfig,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            trades: DEFAULT_TRADES
                .iter()
                .map(|c| LookupEntry {
                    code: c.to_string(),
                    label: c.to_string(),
                })
                .collect(),
            centers: Vec::new(),
            report: ReportConfig::default(),
            auto_mark: AutoMarkConfig::default(),
        }
    }
}

impl WorkspaceConfig {
    pub fn center_label(&self, code: &str) -> Option<&str> {
        let code = code.trim();
        self.centers
            .iter()
            .find(|c| c.code.eq_ignore_ascii_case(code))
            .map(|c| c.label.as_str())
    }
}

/// Reads `examd.json` from the workspace. A missing file yields the defaults;
/// a present but malformed file is an error.
pub fn load_workspace_config(workspace: &Path) -> anyhow::Result<WorkspaceConfig> {
    let path = workspace.join(CONFIG_FILE);
    if !path.is_file() {
        return Ok(WorkspaceConfig::default());
    }
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.to_string_lossy()))?;
    let cfg: WorkspaceConfig = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a valid workspace config", path.to_string_lossy()))?;
    for t in &cfg.trades {
        if t.code.trim().is_empty() {
            anyhow::bail!("trade codes must not be empty");
        }
    }
    Ok(cfg)
}

/// Adds configured trades the store does not know yet. Existing trades keep
/// their stored label and order.
pub fn seed_trades(conn: &Connection, cfg: &WorkspaceConfig) -> rusqlite::Result<usize> {
    let mut added = 0;
    for t in &cfg.trades {
        if model::canonical_trade_code(conn, &t.code)?.is_none() {
            let label = if t.label.trim().is_empty() { &t.code } else { &t.label };
            model::upsert_trade(conn, &t.code, label)?;
            added += 1;
        }
    }
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults_for_missing_keys() {
        let cfg: WorkspaceConfig =
            serde_json::from_str(r#"{"report":{"layout":"flat"}}"#).expect("parse");
        assert_eq!(cfg.report.layout, ReportLayout::Flat);
        assert_eq!(cfg.trades.len(), 17);
        assert!(!cfg.auto_mark.zero_counts_as_ungraded);
    }

    #[test]
    fn explicit_trade_list_replaces_defaults() {
        let cfg: WorkspaceConfig = serde_json::from_str(
            r#"{"trades":[{"code":"NA","label":"Nursing Assistant"}],
                "autoMark":{"zeroCountsAsUngraded":true}}"#,
        )
        .expect("parse");
        assert_eq!(cfg.trades.len(), 1);
        assert_eq!(cfg.trades[0].label, "Nursing Assistant");
        assert!(cfg.auto_mark.zero_counts_as_ungraded);
    }

    #[test]
    fn center_lookup_ignores_case() {
        let mut cfg = WorkspaceConfig::default();
        cfg.centers.push(LookupEntry {
            code: "ARTRAC".into(),
            label: "Army Training Command".into(),
        });
        assert_eq!(cfg.center_label(" artrac "), Some("Army Training Command"));
        assert_eq!(cfg.center_label("x"), None);
    }
}
