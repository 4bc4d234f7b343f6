//! Known tables and the Table Selector.

use crate::domain::Domain;
use crate::error::{AssistantError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Minimum Jaro-Winkler similarity accepted when parsing a misspelled table name.
const TABLE_NAME_SIMILARITY: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableName {
    Invoices,
    Items,
    Taxpayers,
    AuditLogs,
}

impl TableName {
    pub const ALL: [TableName; 4] = [
        TableName::Invoices,
        TableName::Items,
        TableName::Taxpayers,
        TableName::AuditLogs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TableName::Invoices => "invoices",
            TableName::Items => "items",
            TableName::Taxpayers => "taxpayers",
            TableName::AuditLogs => "audit_logs",
        }
    }

    /// File name used by the CSV export this table is loaded from.
    pub fn file_name(&self) -> &'static str {
        match self {
            TableName::Invoices => "invoices.csv",
            TableName::Items => "items.csv",
            TableName::Taxpayers => "taxpayers.csv",
            TableName::AuditLogs => "invoice_audit_logs.csv",
        }
    }

    /// Literal mentions of the table or its entity, English and Arabic.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            TableName::Invoices => &["invoice", "billing", "فاتورة", "الفواتير", "فواتير"],
            TableName::Items => &[
                "item", "product", "hs code", "line total", "عنصر", "العناصر", "منتج", "المنتجات",
            ],
            TableName::Taxpayers => &[
                "taxpayer", "company", "companies", "business", "sector", "registration",
                "دافعي الضرائب", "شركة", "الشركات", "قطاع", "القطاعات",
            ],
            TableName::AuditLogs => &[
                "audit", "logs", "audit trail", "modification", "تدقيق", "سجل", "سجلات",
            ],
        }
    }

    pub fn all() -> BTreeSet<TableName> {
        TableName::ALL.iter().copied().collect()
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TableName {
    type Err = AssistantError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        if let Some(table) = TableName::ALL.iter().find(|t| t.as_str() == normalized) {
            return Ok(*table);
        }

        // Accept close spellings such as "invoice" or "audit_log"
        TableName::ALL
            .iter()
            .map(|t| (*t, strsim::jaro_winkler(t.as_str(), &normalized)))
            .filter(|(_, score)| *score >= TABLE_NAME_SIMILARITY)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(t, _)| t)
            .ok_or_else(|| AssistantError::InvalidFilter(format!("Unknown table '{}'", s)))
    }
}

/// Caller-supplied table restriction. `All` means no restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TableFilter {
    #[default]
    All,
    Only(TableName),
}

impl FromStr for TableFilter {
    type Err = AssistantError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase();
        if normalized == "all" || normalized == "all tables" {
            return Ok(TableFilter::All);
        }
        Ok(TableFilter::Only(s.parse()?))
    }
}

/// Chooses which tables are relevant to a question.
pub struct TableSelector;

impl TableSelector {
    pub fn new() -> Self {
        Self
    }

    /// An explicit override wins outright. Otherwise the domain defaults are
    /// unioned with any table named in the text; an empty result means every table.
    pub fn select(
        &self,
        text: &str,
        domains: &[Domain],
        table_override: TableFilter,
    ) -> BTreeSet<TableName> {
        if let TableFilter::Only(table) = table_override {
            debug!("Table override in effect: {}", table);
            return BTreeSet::from([table]);
        }

        let mut tables: BTreeSet<TableName> = domains
            .iter()
            .flat_map(|d| d.default_tables().iter().copied())
            .collect();

        let text_lower = text.to_lowercase();
        for table in TableName::ALL {
            if table.keywords().iter().any(|k| text_lower.contains(k)) {
                tables.insert(table);
            }
        }

        if tables.is_empty() {
            return TableName::all();
        }
        tables
    }
}

impl Default for TableSelector {
    fn default() -> Self {
        Self::new()
    }
}
