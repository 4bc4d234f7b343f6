//! Data sources producing the read-only table snapshot.
//!
//! The engine only ever borrows a [`TableSnapshot`]. Sources load it from the
//! CSV export directory, or synthesize placeholder data when no export is
//! available.

use crate::error::{AssistantError, Result};
use crate::tables::TableName;
use chrono::{Duration, NaiveDate};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const EMIRATES: [&str; 7] = [
    "Dubai",
    "Abu Dhabi",
    "Sharjah",
    "Ajman",
    "Fujairah",
    "Ras Al Khaimah",
    "Umm Al Quwain",
];

/// Named tables loaded for the current session. Any subset of the known
/// tables may be present.
#[derive(Debug, Clone, Default)]
pub struct TableSnapshot {
    tables: HashMap<TableName, DataFrame>,
}

impl TableSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, name: TableName, df: DataFrame) -> Self {
        self.tables.insert(name, df);
        self
    }

    pub fn insert(&mut self, name: TableName, df: DataFrame) {
        self.tables.insert(name, df);
    }

    pub fn get(&self, name: TableName) -> Option<&DataFrame> {
        self.tables.get(&name)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Loaded table names in canonical order.
    pub fn table_names(&self) -> Vec<TableName> {
        TableName::ALL
            .iter()
            .copied()
            .filter(|t| self.tables.contains_key(t))
            .collect()
    }
}

/// Produces the table snapshot the engine reads.
pub trait DataSource {
    fn get_tables(&self) -> Result<TableSnapshot>;
}

/// Loads CSV exports (`invoices.csv`, `items.csv`, `taxpayers.csv`,
/// `invoice_audit_logs.csv`) from a directory.
pub struct CsvDataSource {
    data_dir: PathBuf,
}

impl CsvDataSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn read_table(&self, path: &Path) -> Result<DataFrame> {
        let df = LazyCsvReader::new(path)
            .with_infer_schema_length(Some(1000))
            .with_ignore_errors(true)
            .finish()
            .map_err(|e| AssistantError::DataSource(format!("Failed to read CSV {}: {}", path.display(), e)))?
            .collect()
            .map_err(|e| AssistantError::DataSource(format!("Failed to collect {}: {}", path.display(), e)))?;
        Ok(df)
    }
}

impl DataSource for CsvDataSource {
    fn get_tables(&self) -> Result<TableSnapshot> {
        if !self.data_dir.is_dir() {
            return Err(AssistantError::DataSource(format!(
                "Data directory not found: {}",
                self.data_dir.display()
            )));
        }

        let mut snapshot = TableSnapshot::new();
        for table in TableName::ALL {
            let path = self.data_dir.join(table.file_name());
            if !path.exists() {
                continue;
            }
            match self.read_table(&path) {
                Ok(df) => {
                    info!("Loaded {} ({} rows) from {}", table, df.height(), path.display());
                    snapshot.insert(table, df);
                }
                Err(e) => warn!("Skipping {}: {}", table, e),
            }
        }
        Ok(snapshot)
    }
}

/// Seeded placeholder data with the same columns as the real export.
pub struct SyntheticDataSource {
    seed: u64,
}

impl SyntheticDataSource {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    fn invoices(&self, rng: &mut StdRng, start: NaiveDate) -> Result<DataFrame> {
        let n = 100;
        let mut is_anomaly = Vec::with_capacity(n);
        let mut anomaly_type: Vec<Option<&str>> = Vec::with_capacity(n);
        for _ in 0..n {
            if rng.gen_bool(0.1) {
                is_anomaly.push(1i64);
                anomaly_type.push(Some(pick(
                    rng,
                    &["Duplicate", "Round Amount", "Just Under Limit", "Foreign Bank"],
                )));
            } else {
                is_anomaly.push(0i64);
                anomaly_type.push(None);
            }
        }

        let df = DataFrame::new(vec![
            Series::new("invoice_number", (1..=n).map(|i| format!("INV{:03}", i)).collect::<Vec<_>>()),
            Series::new(
                "invoice_datetime",
                (0..n)
                    .map(|i| (start + Duration::days(i as i64)).format("%Y-%m-%d").to_string())
                    .collect::<Vec<_>>(),
            ),
            Series::new("buyer_emirate", (0..n).map(|_| pick(rng, &EMIRATES)).collect::<Vec<_>>()),
            Series::new("seller_emirate", (0..n).map(|_| pick(rng, &EMIRATES)).collect::<Vec<_>>()),
            Series::new(
                "invoice_tax_amount",
                (0..n).map(|_| round2(rng.gen_range(50.0..500.0))).collect::<Vec<f64>>(),
            ),
            Series::new(
                "invoice_without_tax",
                (0..n).map(|_| round2(rng.gen_range(1000.0..10000.0))).collect::<Vec<f64>>(),
            ),
            Series::new(
                "invoice_type",
                (0..n).map(|_| pick(rng, &["Standard", "Credit Note", "Debit Note"])).collect::<Vec<_>>(),
            ),
            Series::new(
                "invoice_category",
                (0..n).map(|_| pick(rng, &["Goods", "Services", "Mixed"])).collect::<Vec<_>>(),
            ),
            Series::new(
                "invoice_sales_type",
                (0..n).map(|_| pick(rng, &["B2B", "B2C", "B2G"])).collect::<Vec<_>>(),
            ),
            Series::new(
                "document_status",
                (0..n).map(|_| pick(rng, &["Issued", "Paid", "Cancelled"])).collect::<Vec<_>>(),
            ),
            Series::new("buyer_name", (1..=n).map(|i| format!("Company {}", i)).collect::<Vec<_>>()),
            Series::new("buyer_trn", (1..=n).map(|i| format!("TRN{:06}", i)).collect::<Vec<_>>()),
            Series::new("seller_name", (1..=n).map(|i| format!("Vendor {}", i % 20 + 1)).collect::<Vec<_>>()),
            Series::new("seller_trn", (1..=n).map(|i| format!("TRN{:06}", i % 20 + 1)).collect::<Vec<_>>()),
            Series::new(
                "vat_rate",
                (0..n).map(|_| if rng.gen_bool(0.95) { 5.0 } else { 0.0 }).collect::<Vec<f64>>(),
            ),
            Series::new(
                "vat_category",
                (0..n)
                    .map(|_| {
                        let roll: f64 = rng.gen();
                        if roll < 0.95 {
                            "Standard"
                        } else if roll < 0.98 {
                            "Zero Rated"
                        } else {
                            "Exempt"
                        }
                    })
                    .collect::<Vec<_>>(),
            ),
            Series::new("is_anomaly", is_anomaly),
            Series::new("anomaly_type", anomaly_type),
            Series::new(
                "anomaly_risk_score",
                (0..n).map(|_| round2(rng.gen_range(0.0..1.0))).collect::<Vec<f64>>(),
            ),
        ])?;
        Ok(df)
    }

    fn items(&self, rng: &mut StdRng) -> Result<DataFrame> {
        let n = 300;
        let df = DataFrame::new(vec![
            Series::new("item_id", (1..=n).map(|i| format!("ITEM{:04}", i)).collect::<Vec<_>>()),
            Series::new(
                "invoice_id",
                (0..n).map(|_| format!("INV{:03}", rng.gen_range(1..=100))).collect::<Vec<_>>(),
            ),
            Series::new("item_name", (1..=n).map(|i| format!("Product {}", i % 50 + 1)).collect::<Vec<_>>()),
            Series::new(
                "item_description",
                (1..=n).map(|i| format!("Description for Product {}", i % 50 + 1)).collect::<Vec<_>>(),
            ),
            Series::new("quantity", (0..n).map(|_| rng.gen_range(1i64..10)).collect::<Vec<i64>>()),
            Series::new(
                "unit_price",
                (0..n).map(|_| round2(rng.gen_range(100.0..1000.0))).collect::<Vec<f64>>(),
            ),
            Series::new(
                "line_discount",
                (0..n).map(|_| round2(rng.gen_range(0.0..50.0))).collect::<Vec<f64>>(),
            ),
            Series::new(
                "line_total",
                (0..n).map(|_| round2(rng.gen_range(100.0..5000.0))).collect::<Vec<f64>>(),
            ),
            Series::new(
                "line_vat_amount",
                (0..n).map(|_| round2(rng.gen_range(5.0..250.0))).collect::<Vec<f64>>(),
            ),
            Series::new(
                "hs_code",
                (0..n).map(|_| format!("HS{}", rng.gen_range(1000..9999))).collect::<Vec<_>>(),
            ),
        ])?;
        Ok(df)
    }

    fn taxpayers(&self, rng: &mut StdRng, start: NaiveDate) -> Result<DataFrame> {
        let n = 50;
        let df = DataFrame::new(vec![
            Series::new("tax_number", (1..=n).map(|i| format!("TRN{:06}", i)).collect::<Vec<_>>()),
            Series::new("name", (1..=n).map(|i| format!("Company {}", i)).collect::<Vec<_>>()),
            Series::new(
                "registration_date",
                (0..n)
                    .map(|i| (start + Duration::days(i as i64)).format("%Y-%m-%d").to_string())
                    .collect::<Vec<_>>(),
            ),
            Series::new(
                "legal_entity_type",
                (0..n)
                    .map(|_| pick(rng, &["LLC", "FZE", "Sole Proprietorship", "Partnership"]))
                    .collect::<Vec<_>>(),
            ),
            Series::new(
                "business_size",
                (0..n).map(|_| pick(rng, &["Small", "Medium", "Large"])).collect::<Vec<_>>(),
            ),
            Series::new(
                "sector",
                (0..n)
                    .map(|_| pick(rng, &["Retail", "Manufacturing", "Services", "Construction", "Technology"]))
                    .collect::<Vec<_>>(),
            ),
            Series::new(
                "number_of_employees",
                (0..n).map(|_| rng.gen_range(5i64..500)).collect::<Vec<i64>>(),
            ),
            Series::new(
                "ownership_type",
                (0..n).map(|_| pick(rng, &["Local", "Foreign", "Mixed"])).collect::<Vec<_>>(),
            ),
            Series::new(
                "tax_compliance_score",
                (0..n).map(|_| round2(rng.gen_range(60.0..100.0))).collect::<Vec<f64>>(),
            ),
            Series::new(
                "bank_account",
                (0..n)
                    .map(|_| format!("AE{}", rng.gen_range(100_000_000u64..999_999_999)))
                    .collect::<Vec<_>>(),
            ),
            Series::new(
                "bank_country",
                (0..n).map(|_| if rng.gen_bool(0.8) { "UAE" } else { "Other" }).collect::<Vec<_>>(),
            ),
        ])?;
        Ok(df)
    }

    fn audit_logs(&self, rng: &mut StdRng, start: NaiveDate) -> Result<DataFrame> {
        let n = 200;
        let df = DataFrame::new(vec![
            Series::new("log_id", (1..=n).map(|i| format!("LOG{:05}", i)).collect::<Vec<_>>()),
            Series::new(
                "invoice_id",
                (0..n).map(|_| format!("INV{:03}", rng.gen_range(1..=100))).collect::<Vec<_>>(),
            ),
            Series::new(
                "timestamp",
                (0..n)
                    .map(|i| (start + Duration::days(i as i64)).format("%Y-%m-%d").to_string())
                    .collect::<Vec<_>>(),
            ),
            Series::new(
                "user_id",
                (0..n).map(|_| format!("USER{:02}", rng.gen_range(1..=10))).collect::<Vec<_>>(),
            ),
            Series::new(
                "action_type",
                (0..n).map(|_| pick(rng, &["Create", "Update", "Delete", "View"])).collect::<Vec<_>>(),
            ),
            Series::new(
                "field_changed",
                (0..n)
                    .map(|_| {
                        let field = pick(rng, &["Amount", "Status", "Date", "Description", ""]);
                        if field.is_empty() {
                            None
                        } else {
                            Some(field)
                        }
                    })
                    .collect::<Vec<Option<&str>>>(),
            ),
            Series::new("old_value", (1..=n).map(|i| format!("Old Value {}", i)).collect::<Vec<_>>()),
            Series::new("new_value", (1..=n).map(|i| format!("New Value {}", i)).collect::<Vec<_>>()),
            Series::new("system_notes", (1..=n).map(|i| format!("System note {}", i)).collect::<Vec<_>>()),
        ])?;
        Ok(df)
    }
}

impl Default for SyntheticDataSource {
    fn default() -> Self {
        Self::new(42)
    }
}

impl DataSource for SyntheticDataSource {
    fn get_tables(&self) -> Result<TableSnapshot> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let invoice_start = start_date(2025, 1, 1)?;
        let registration_start = start_date(2020, 1, 1)?;

        let snapshot = TableSnapshot::new()
            .with_table(TableName::Invoices, self.invoices(&mut rng, invoice_start)?)
            .with_table(TableName::Items, self.items(&mut rng)?)
            .with_table(TableName::Taxpayers, self.taxpayers(&mut rng, registration_start)?)
            .with_table(TableName::AuditLogs, self.audit_logs(&mut rng, invoice_start)?);

        info!("Generated synthetic data for {} tables", snapshot.len());
        Ok(snapshot)
    }
}

/// CSV exports when available, synthetic data otherwise.
pub struct FallbackDataSource {
    primary: CsvDataSource,
    fallback: SyntheticDataSource,
}

impl FallbackDataSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            primary: CsvDataSource::new(data_dir),
            fallback: SyntheticDataSource::default(),
        }
    }
}

impl DataSource for FallbackDataSource {
    fn get_tables(&self) -> Result<TableSnapshot> {
        match self.primary.get_tables() {
            Ok(snapshot) if !snapshot.is_empty() => Ok(snapshot),
            Ok(_) => {
                warn!("No CSV exports found, using synthetic data");
                self.fallback.get_tables()
            }
            Err(e) => {
                warn!("Failed to load CSV exports ({}), using synthetic data", e);
                self.fallback.get_tables()
            }
        }
    }
}

fn pick<'a>(rng: &mut StdRng, options: &[&'a str]) -> &'a str {
    options.choose(rng).copied().unwrap_or_default()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn start_date(year: i32, month: u32, day: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| AssistantError::DataSource(format!("Invalid date {}-{}-{}", year, month, day)))
}
