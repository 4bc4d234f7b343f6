//! Domain-specific aggregate plans and their execution over polars frames.
//!
//! A plan says which rows are in scope, which scalar metrics to compute and
//! which group-by breakdowns to produce for one (domain, table) pair. Columns
//! absent from a loaded table are skipped rather than treated as errors, so
//! partial exports still yield a usable context.

use crate::domain::Domain;
use crate::entities::Emirate;
use crate::error::{AssistantError, Result};
use crate::tables::TableName;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// Metric names shared with the mock responder.
pub mod metric {
    pub const TOTAL_VAT: &str = "total_vat";
    pub const TOTAL_REVENUE: &str = "total_revenue";
    pub const AVG_VAT_RATE: &str = "avg_vat_rate";
    pub const INVOICE_COUNT: &str = "invoice_count";
    pub const ANOMALY_COUNT: &str = "anomaly_count";
    pub const AVG_RISK_SCORE: &str = "avg_risk_score";
    pub const MAX_RISK_SCORE: &str = "max_risk_score";
    pub const LINE_VAT: &str = "total_line_vat";
    pub const LINE_TOTAL: &str = "total_line_amount";
    pub const AVG_DISCOUNT: &str = "avg_line_discount";
    pub const TOTAL_DISCOUNT: &str = "total_line_discount";
    pub const AVG_COMPLIANCE: &str = "avg_compliance_score";
}

/// Breakdown names shared with the mock responder and chart renderer.
pub mod breakdown {
    pub const VAT_BY_EMIRATE: &str = "vat_by_buyer_emirate";
    pub const BY_VAT_CATEGORY: &str = "invoices_by_vat_category";
    pub const BY_ANOMALY_TYPE: &str = "anomalies_by_type";
    pub const REVENUE_BY_MONTH: &str = "revenue_by_month";
    pub const REVENUE_BY_SALES_TYPE: &str = "revenue_by_sales_type";
    pub const INVOICES_BY_EMIRATE: &str = "invoices_by_buyer_emirate";
    pub const REVENUE_BY_EMIRATE: &str = "revenue_by_buyer_emirate";
    pub const INVOICES_BY_SELLER_EMIRATE: &str = "invoices_by_seller_emirate";
    pub const AMOUNT_BY_ITEM: &str = "amount_by_item";
    pub const COMPLIANCE_BY_SECTOR: &str = "compliance_by_sector";
    pub const TAXPAYERS_BY_SIZE: &str = "taxpayers_by_business_size";
    pub const TAXPAYERS_BY_SECTOR: &str = "taxpayers_by_sector";
    pub const TAXPAYERS_BY_BANK_COUNTRY: &str = "taxpayers_by_bank_country";
    pub const TAXPAYERS_BY_OWNERSHIP: &str = "taxpayers_by_ownership";
    pub const CHANGES_BY_FIELD: &str = "changes_by_field";
    pub const ACTIONS_BY_TYPE: &str = "actions_by_type";
    pub const ACTIONS_BY_USER: &str = "actions_by_user";
}

const MONTH_KEY: &str = "__month";
const DEFAULT_SAMPLE_WIDTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    Sum(&'static str),
    Mean(&'static str),
    Max(&'static str),
    Count,
}

impl Measure {
    fn column(&self) -> Option<&'static str> {
        match self {
            Measure::Sum(c) | Measure::Mean(c) | Measure::Max(c) => Some(*c),
            Measure::Count => None,
        }
    }

    fn expr(&self) -> Expr {
        match self {
            Measure::Sum(c) => col(c).cast(DataType::Float64).sum(),
            Measure::Mean(c) => col(c).cast(DataType::Float64).mean(),
            Measure::Max(c) => col(c).cast(DataType::Float64).max(),
            Measure::Count => len().cast(DataType::Float64),
        }
    }

    fn label(&self) -> String {
        match self {
            Measure::Sum(c) => format!("sum({})", c),
            Measure::Mean(c) => format!("mean({})", c),
            Measure::Max(c) => format!("max({})", c),
            Measure::Count => "count".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Column(&'static str),
    /// `YYYY-MM` bucket of a date or datetime column
    Month(&'static str),
}

impl Dimension {
    fn column(&self) -> &'static str {
        match self {
            Dimension::Column(c) | Dimension::Month(c) => *c,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowFilter {
    Equals { column: &'static str, value: String },
    /// Rows whose integer flag column equals 1
    FlagSet(&'static str),
}

impl RowFilter {
    fn column(&self) -> &'static str {
        match self {
            RowFilter::Equals { column, .. } | RowFilter::FlagSet(column) => *column,
        }
    }

    fn expr(&self) -> Expr {
        match self {
            RowFilter::Equals { column, value } => {
                col(column).cast(DataType::String).eq(lit(value.as_str()))
            }
            RowFilter::FlagSet(column) => col(column).cast(DataType::Int64).eq(lit(1i64)),
        }
    }

    fn describe(&self) -> String {
        match self {
            RowFilter::Equals { column, value } => format!("{} = {}", column, value),
            RowFilter::FlagSet(column) => format!("{} = 1", column),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSpec {
    pub name: &'static str,
    pub measure: Measure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakdownSpec {
    pub name: &'static str,
    pub dimension: Dimension,
    pub measure: Measure,
}

/// What to compute for one table under one domain.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AggregatePlan {
    /// Restricts every metric, breakdown and sample
    pub scope: Option<RowFilter>,
    /// Additionally restricts metrics only
    pub focus: Option<RowFilter>,
    pub metrics: Vec<MetricSpec>,
    pub breakdowns: Vec<BreakdownSpec>,
    pub sample_columns: Vec<&'static str>,
}

fn m(name: &'static str, measure: Measure) -> MetricSpec {
    MetricSpec { name, measure }
}

fn b(name: &'static str, dimension: Dimension, measure: Measure) -> BreakdownSpec {
    BreakdownSpec {
        name,
        dimension,
        measure,
    }
}

impl AggregatePlan {
    /// Plan for a table under the question's primary domain.
    pub fn for_domain(domain: Domain, table: TableName, emirate: Option<Emirate>) -> Self {
        use self::breakdown::*;
        use self::metric::*;
        use Dimension::{Column, Month};
        use Measure::*;

        let mut plan = match (domain, table) {
            (Domain::TaxCompliance, TableName::Invoices) => AggregatePlan {
                metrics: vec![
                    m(TOTAL_VAT, Sum("invoice_tax_amount")),
                    m(TOTAL_REVENUE, Sum("invoice_without_tax")),
                    m(AVG_VAT_RATE, Mean("vat_rate")),
                    m(INVOICE_COUNT, Count),
                ],
                breakdowns: vec![
                    b(VAT_BY_EMIRATE, Column("buyer_emirate"), Sum("invoice_tax_amount")),
                    b(BY_VAT_CATEGORY, Column("vat_category"), Count),
                ],
                sample_columns: vec![
                    "invoice_number", "buyer_emirate", "invoice_tax_amount", "vat_rate",
                    "vat_category", "buyer_trn",
                ],
                ..Default::default()
            },
            (Domain::FraudDetection, TableName::Invoices) => AggregatePlan {
                scope: Some(RowFilter::FlagSet("is_anomaly")),
                metrics: vec![
                    m(ANOMALY_COUNT, Count),
                    m(AVG_RISK_SCORE, Mean("anomaly_risk_score")),
                    m(MAX_RISK_SCORE, Max("anomaly_risk_score")),
                    m(TOTAL_REVENUE, Sum("invoice_without_tax")),
                ],
                breakdowns: vec![b(BY_ANOMALY_TYPE, Column("anomaly_type"), Count)],
                sample_columns: vec![
                    "invoice_number", "anomaly_type", "anomaly_risk_score", "seller_name",
                    "invoice_without_tax", "buyer_emirate",
                ],
                ..Default::default()
            },
            (Domain::RevenueAnalysis, TableName::Invoices) => AggregatePlan {
                metrics: vec![
                    m(TOTAL_REVENUE, Sum("invoice_without_tax")),
                    m(TOTAL_VAT, Sum("invoice_tax_amount")),
                    m(INVOICE_COUNT, Count),
                ],
                breakdowns: vec![
                    b(REVENUE_BY_MONTH, Month("invoice_datetime"), Sum("invoice_without_tax")),
                    b(REVENUE_BY_SALES_TYPE, Column("invoice_sales_type"), Sum("invoice_without_tax")),
                ],
                sample_columns: vec![
                    "invoice_number", "invoice_datetime", "invoice_without_tax",
                    "invoice_sales_type", "document_status",
                ],
                ..Default::default()
            },
            (Domain::GeographicDistribution, TableName::Invoices) => AggregatePlan {
                metrics: vec![
                    m(INVOICE_COUNT, Count),
                    m(TOTAL_REVENUE, Sum("invoice_without_tax")),
                    m(TOTAL_VAT, Sum("invoice_tax_amount")),
                ],
                breakdowns: vec![
                    b(INVOICES_BY_EMIRATE, Column("buyer_emirate"), Count),
                    b(REVENUE_BY_EMIRATE, Column("buyer_emirate"), Sum("invoice_without_tax")),
                    b(INVOICES_BY_SELLER_EMIRATE, Column("seller_emirate"), Count),
                ],
                sample_columns: vec![
                    "invoice_number", "buyer_emirate", "seller_emirate", "invoice_without_tax",
                ],
                ..Default::default()
            },
            (Domain::TaxCompliance, TableName::Items) => AggregatePlan {
                metrics: vec![m(LINE_VAT, Sum("line_vat_amount")), m(LINE_TOTAL, Sum("line_total"))],
                sample_columns: vec!["item_id", "invoice_id", "line_total", "line_vat_amount", "hs_code"],
                ..Default::default()
            },
            (Domain::FraudDetection, TableName::Items) => AggregatePlan {
                metrics: vec![
                    m(AVG_DISCOUNT, Mean("line_discount")),
                    m(TOTAL_DISCOUNT, Sum("line_discount")),
                ],
                sample_columns: vec!["item_id", "invoice_id", "unit_price", "line_discount", "line_total"],
                ..Default::default()
            },
            (Domain::RevenueAnalysis, TableName::Items) => AggregatePlan {
                metrics: vec![m(LINE_TOTAL, Sum("line_total"))],
                breakdowns: vec![b(AMOUNT_BY_ITEM, Column("item_name"), Sum("line_total"))],
                sample_columns: vec!["item_id", "item_name", "quantity", "unit_price", "line_total"],
                ..Default::default()
            },
            (Domain::GeographicDistribution, TableName::Items) => AggregatePlan {
                metrics: vec![m(LINE_TOTAL, Sum("line_total"))],
                sample_columns: vec!["item_id", "invoice_id", "item_name", "line_total"],
                ..Default::default()
            },
            (Domain::TaxCompliance, TableName::Taxpayers) => AggregatePlan {
                metrics: vec![m(AVG_COMPLIANCE, Mean("tax_compliance_score"))],
                breakdowns: vec![
                    b(COMPLIANCE_BY_SECTOR, Column("sector"), Mean("tax_compliance_score")),
                    b(TAXPAYERS_BY_SIZE, Column("business_size"), Count),
                ],
                sample_columns: vec!["tax_number", "name", "sector", "business_size", "tax_compliance_score"],
                ..Default::default()
            },
            (Domain::FraudDetection, TableName::Taxpayers) => AggregatePlan {
                metrics: vec![m(AVG_COMPLIANCE, Mean("tax_compliance_score"))],
                breakdowns: vec![b(TAXPAYERS_BY_BANK_COUNTRY, Column("bank_country"), Count)],
                sample_columns: vec!["tax_number", "name", "bank_country", "ownership_type"],
                ..Default::default()
            },
            (Domain::RevenueAnalysis, TableName::Taxpayers) => AggregatePlan {
                breakdowns: vec![
                    b(TAXPAYERS_BY_SECTOR, Column("sector"), Count),
                    b(TAXPAYERS_BY_SIZE, Column("business_size"), Count),
                ],
                sample_columns: vec!["tax_number", "name", "sector", "business_size", "number_of_employees"],
                ..Default::default()
            },
            (Domain::GeographicDistribution, TableName::Taxpayers) => AggregatePlan {
                breakdowns: vec![b(TAXPAYERS_BY_OWNERSHIP, Column("ownership_type"), Count)],
                sample_columns: vec!["tax_number", "name", "ownership_type", "bank_country"],
                ..Default::default()
            },
            (Domain::TaxCompliance, TableName::AuditLogs) => AggregatePlan {
                breakdowns: vec![b(CHANGES_BY_FIELD, Column("field_changed"), Count)],
                sample_columns: vec!["log_id", "invoice_id", "action_type", "field_changed", "timestamp"],
                ..Default::default()
            },
            (Domain::FraudDetection, TableName::AuditLogs) => AggregatePlan {
                breakdowns: vec![
                    b(ACTIONS_BY_TYPE, Column("action_type"), Count),
                    b(ACTIONS_BY_USER, Column("user_id"), Count),
                ],
                sample_columns: vec!["log_id", "invoice_id", "user_id", "action_type", "field_changed"],
                ..Default::default()
            },
            (Domain::RevenueAnalysis | Domain::GeographicDistribution, TableName::AuditLogs) => {
                AggregatePlan {
                    breakdowns: vec![b(ACTIONS_BY_TYPE, Column("action_type"), Count)],
                    sample_columns: vec!["log_id", "invoice_id", "action_type", "timestamp"],
                    ..Default::default()
                }
            }
        };

        if let (Some(emirate), TableName::Invoices) = (emirate, table) {
            plan.focus = Some(RowFilter::Equals {
                column: "buyer_emirate",
                value: emirate.data_value().to_string(),
            });
        }

        plan
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupValue {
    pub key: String,
    pub value: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breakdown {
    pub name: String,
    pub dimension: String,
    pub measure: String,
    /// At most `max_groups`, largest value first (months chronologically)
    pub groups: Vec<GroupValue>,
    pub total_groups: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SampleRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Computed aggregates for one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableAggregate {
    pub table: TableName,
    pub row_count: usize,
    pub scope: Option<String>,
    /// Scope column the plan needs but the table lacks. Scoped aggregates are skipped.
    pub scope_unavailable: Option<String>,
    pub rows_in_scope: usize,
    pub focus: Option<String>,
    /// Focus column the plan needs but the table lacks. Figures cover every row.
    pub focus_unavailable: Option<String>,
    pub rows_in_focus: usize,
    /// Rows matching the focus before scoping
    pub rows_matching_focus: usize,
    pub metrics: Vec<Metric>,
    pub breakdowns: Vec<Breakdown>,
    pub sample: SampleRows,
}

impl TableAggregate {
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.iter().find(|m| m.name == name).map(|m| m.value)
    }

    pub fn breakdown(&self, name: &str) -> Option<&Breakdown> {
        self.breakdowns.iter().find(|b| b.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateLimits {
    pub max_groups: usize,
    pub max_sample_rows: usize,
}

impl Default for AggregateLimits {
    fn default() -> Self {
        Self {
            max_groups: 10,
            max_sample_rows: 20,
        }
    }
}

/// Executes aggregate plans against a borrowed frame.
pub struct Aggregator {
    limits: AggregateLimits,
}

impl Aggregator {
    pub fn new(limits: AggregateLimits) -> Self {
        Self { limits }
    }

    pub fn run(&self, table: TableName, df: &DataFrame, plan: &AggregatePlan) -> Result<TableAggregate> {
        let columns: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
        let has = |c: &str| columns.iter().any(|name| name == c);

        if let Some(filter) = plan.scope.as_ref().filter(|f| !has(f.column())) {
            debug!("{}: scope column {} missing, skipping scoped aggregates", table, filter.column());
            return Ok(TableAggregate {
                table,
                row_count: df.height(),
                scope: None,
                scope_unavailable: Some(filter.column().to_string()),
                rows_in_scope: 0,
                focus: None,
                focus_unavailable: None,
                rows_in_focus: 0,
                rows_matching_focus: 0,
                metrics: Vec::new(),
                breakdowns: Vec::new(),
                sample: SampleRows::default(),
            });
        }
        let scope = plan.scope.as_ref();

        let focus_unavailable = plan
            .focus
            .as_ref()
            .filter(|f| !has(f.column()))
            .map(|f| f.column().to_string());
        if let Some(column) = &focus_unavailable {
            debug!("{}: focus column {} missing, aggregating all rows", table, column);
        }
        let focus = plan.focus.as_ref().filter(|f| has(f.column()));

        let scoped = match scope {
            Some(filter) => df.clone().lazy().filter(filter.expr()).collect()?,
            None => df.clone(),
        };
        let focused = match focus {
            Some(filter) => scoped.clone().lazy().filter(filter.expr()).collect()?,
            None => scoped.clone(),
        };
        let rows_matching_focus = match (scope, focus) {
            (Some(_), Some(filter)) => df.clone().lazy().filter(filter.expr()).collect()?.height(),
            _ => focused.height(),
        };

        let metrics = self.compute_metrics(&focused, plan, &has)?;

        let mut breakdowns = Vec::new();
        for spec in &plan.breakdowns {
            let measure_present = spec.measure.column().map(|c| has(c)).unwrap_or(true);
            if !has(spec.dimension.column()) || !measure_present {
                debug!("{}: skipping breakdown {} (missing column)", table, spec.name);
                continue;
            }
            breakdowns.push(self.compute_breakdown(&scoped, spec)?);
        }

        let sample = self.sample_rows(&scoped, plan, &has)?;

        Ok(TableAggregate {
            table,
            row_count: df.height(),
            scope: scope.map(|f| f.describe()),
            scope_unavailable: None,
            rows_in_scope: scoped.height(),
            focus: focus.map(|f| f.describe()),
            focus_unavailable,
            rows_in_focus: focused.height(),
            rows_matching_focus,
            metrics,
            breakdowns,
            sample,
        })
    }

    fn compute_metrics(
        &self,
        df: &DataFrame,
        plan: &AggregatePlan,
        has: &dyn Fn(&str) -> bool,
    ) -> Result<Vec<Metric>> {
        let specs: Vec<&MetricSpec> = plan
            .metrics
            .iter()
            .filter(|s| s.measure.column().map(|c| has(c)).unwrap_or(true))
            .collect();

        if specs.is_empty() || df.width() == 0 {
            return Ok(Vec::new());
        }

        let exprs: Vec<Expr> = specs.iter().map(|s| s.measure.expr().alias(s.name)).collect();
        let out = df.clone().lazy().select(exprs).collect()?;

        let mut metrics = Vec::with_capacity(specs.len());
        for spec in specs {
            let value = out
                .column(spec.name)?
                .cast(&DataType::Float64)?
                .f64()?
                .get(0);
            // mean/max of an empty frame is null; leave the metric out
            if let Some(value) = value {
                metrics.push(Metric {
                    name: spec.name.to_string(),
                    value,
                });
            }
        }
        Ok(metrics)
    }

    fn compute_breakdown(&self, df: &DataFrame, spec: &BreakdownSpec) -> Result<Breakdown> {
        let (frame, key_column) = match spec.dimension {
            Dimension::Column(c) => (df.clone(), c),
            Dimension::Month(c) => (with_month_column(df, c)?, MONTH_KEY),
        };

        let grouped = frame
            .lazy()
            .group_by([col(key_column).cast(DataType::String)])
            .agg([
                spec.measure.expr().alias("__value"),
                len().cast(DataType::UInt64).alias("__count"),
            ])
            .collect()?;

        let keys = grouped.column(key_column)?.cast(&DataType::String)?;
        let keys = keys.str()?;
        let values = grouped.column("__value")?.cast(&DataType::Float64)?;
        let values = values.f64()?;
        let counts = grouped.column("__count")?.u64()?;

        let mut groups: Vec<GroupValue> = (0..grouped.height())
            .map(|i| GroupValue {
                key: keys.get(i).unwrap_or("Unknown").to_string(),
                value: values.get(i).unwrap_or(0.0),
                count: counts.get(i).unwrap_or(0) as usize,
            })
            .collect();

        match spec.dimension {
            Dimension::Month(_) => groups.sort_by(|a, b| a.key.cmp(&b.key)),
            Dimension::Column(_) => groups.sort_by(|a, b| {
                b.value
                    .partial_cmp(&a.value)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.key.cmp(&b.key))
            }),
        }

        let total_groups = groups.len();
        match spec.dimension {
            // keep the most recent months
            Dimension::Month(_) => {
                let skip = total_groups.saturating_sub(self.limits.max_groups);
                groups.drain(..skip);
            }
            Dimension::Column(_) => groups.truncate(self.limits.max_groups),
        }

        Ok(Breakdown {
            name: spec.name.to_string(),
            dimension: match spec.dimension {
                Dimension::Column(c) => c.to_string(),
                Dimension::Month(c) => format!("month({})", c),
            },
            measure: spec.measure.label(),
            groups,
            total_groups,
        })
    }

    fn sample_rows(
        &self,
        df: &DataFrame,
        plan: &AggregatePlan,
        has: &dyn Fn(&str) -> bool,
    ) -> Result<SampleRows> {
        let mut columns: Vec<String> = plan
            .sample_columns
            .iter()
            .filter(|c| has(**c))
            .map(|c| c.to_string())
            .collect();
        if columns.is_empty() {
            columns = df
                .get_column_names()
                .iter()
                .take(DEFAULT_SAMPLE_WIDTH)
                .map(|s| s.to_string())
                .collect();
        }

        let head = df.head(Some(self.limits.max_sample_rows));
        let mut rows = Vec::with_capacity(head.height());
        for row_idx in 0..head.height() {
            let mut row = Vec::with_capacity(columns.len());
            for name in &columns {
                let value = head
                    .column(name)?
                    .get(row_idx)
                    .map_err(|e| AssistantError::Aggregation(format!("Failed to read {}: {}", name, e)))?;
                row.push(format_cell(&value));
            }
            rows.push(row);
        }

        Ok(SampleRows { columns, rows })
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(AggregateLimits::default())
    }
}

/// Append a `YYYY-MM` bucket column derived from a date-like column.
fn with_month_column(df: &DataFrame, column: &str) -> Result<DataFrame> {
    let as_text = df.column(column)?.cast(&DataType::String)?;
    let months: Vec<Option<String>> = as_text
        .str()?
        .into_iter()
        .map(|v| v.filter(|s| s.len() >= 7).and_then(|s| s.get(..7)).map(|s| s.to_string()))
        .collect();

    let mut out = df.clone();
    out.with_column(Series::new(MONTH_KEY, months))?;
    Ok(out)
}

fn format_cell(value: &AnyValue) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::Boolean(b) => b.to_string(),
        AnyValue::String(s) => s.to_string(),
        AnyValue::Int32(i) => i.to_string(),
        AnyValue::Int64(i) => i.to_string(),
        AnyValue::UInt32(u) => u.to_string(),
        AnyValue::UInt64(u) => u.to_string(),
        AnyValue::Float32(f) => format!("{:.2}", f),
        AnyValue::Float64(f) => format!("{:.2}", f),
        other => other.to_string().trim_matches('"').to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoices() -> DataFrame {
        df![
            "invoice_number" => ["INV001", "INV002", "INV003", "INV004"],
            "invoice_datetime" => ["2025-01-03", "2025-01-20", "2025-02-11", "2025-03-01"],
            "buyer_emirate" => ["Dubai", "Sharjah", "Dubai", "Ajman"],
            "invoice_tax_amount" => [100.0, 50.0, 25.5, 10.0],
            "invoice_without_tax" => [2000.0, 1000.0, 510.0, 200.0],
            "is_anomaly" => [0i64, 1, 1, 0],
            "anomaly_type" => [None, Some("Duplicate"), Some("Round Amount"), None],
            "anomaly_risk_score" => [0.1, 0.9, 0.7, 0.2]
        ]
        .unwrap()
    }

    #[test]
    fn test_tax_plan_with_emirate_focus() {
        let plan = AggregatePlan::for_domain(Domain::TaxCompliance, TableName::Invoices, Some(Emirate::Dubai));
        let agg = Aggregator::default().run(TableName::Invoices, &invoices(), &plan).unwrap();

        assert_eq!(agg.row_count, 4);
        assert_eq!(agg.rows_in_focus, 2);
        assert_eq!(agg.focus.as_deref(), Some("buyer_emirate = Dubai"));
        assert!((agg.metric(metric::TOTAL_VAT).unwrap() - 125.5).abs() < 1e-9);
        assert_eq!(agg.metric(metric::INVOICE_COUNT), Some(2.0));
        // vat_rate column is absent
        assert_eq!(agg.metric(metric::AVG_VAT_RATE), None);

        // breakdowns ignore the focus
        let by_emirate = agg.breakdown(breakdown::VAT_BY_EMIRATE).unwrap();
        assert_eq!(by_emirate.total_groups, 3);
        assert_eq!(by_emirate.groups[0].key, "Dubai");
        assert_eq!(by_emirate.groups[0].count, 2);
    }

    #[test]
    fn test_fraud_plan_scopes_to_anomalies() {
        let plan = AggregatePlan::for_domain(Domain::FraudDetection, TableName::Invoices, None);
        let agg = Aggregator::default().run(TableName::Invoices, &invoices(), &plan).unwrap();

        assert_eq!(agg.rows_in_scope, 2);
        assert_eq!(agg.metric(metric::ANOMALY_COUNT), Some(2.0));
        assert!((agg.metric(metric::MAX_RISK_SCORE).unwrap() - 0.9).abs() < 1e-9);
        let by_type = agg.breakdown(breakdown::BY_ANOMALY_TYPE).unwrap();
        assert_eq!(by_type.groups.len(), 2);
        assert_eq!(agg.sample.rows.len(), 2);
    }

    #[test]
    fn test_missing_scope_column_skips_scoped_aggregates() {
        let frame = invoices().drop("is_anomaly").unwrap();
        let plan = AggregatePlan::for_domain(Domain::FraudDetection, TableName::Invoices, None);
        let agg = Aggregator::default().run(TableName::Invoices, &frame, &plan).unwrap();

        assert_eq!(agg.row_count, 4);
        assert_eq!(agg.scope, None);
        assert_eq!(agg.scope_unavailable.as_deref(), Some("is_anomaly"));
        assert_eq!(agg.metric(metric::ANOMALY_COUNT), None);
        assert_eq!(agg.metric(metric::AVG_RISK_SCORE), None);
        assert!(agg.breakdowns.is_empty());
        assert!(agg.sample.rows.is_empty());
    }

    #[test]
    fn test_missing_focus_column_is_reported() {
        let frame = invoices().drop("buyer_emirate").unwrap();
        let plan = AggregatePlan::for_domain(Domain::TaxCompliance, TableName::Invoices, Some(Emirate::Dubai));
        let agg = Aggregator::default().run(TableName::Invoices, &frame, &plan).unwrap();

        assert_eq!(agg.focus, None);
        assert_eq!(agg.focus_unavailable.as_deref(), Some("buyer_emirate"));
        assert!((agg.metric(metric::TOTAL_VAT).unwrap() - 185.5).abs() < 1e-9);
    }

    #[test]
    fn test_focus_total_ignores_scope() {
        let plan = AggregatePlan::for_domain(Domain::FraudDetection, TableName::Invoices, Some(Emirate::Dubai));
        let agg = Aggregator::default().run(TableName::Invoices, &invoices(), &plan).unwrap();

        assert_eq!(agg.rows_in_scope, 2);
        assert_eq!(agg.rows_in_focus, 1);
        assert_eq!(agg.rows_matching_focus, 2);
    }

    #[test]
    fn test_revenue_by_month_is_chronological() {
        let plan = AggregatePlan::for_domain(Domain::RevenueAnalysis, TableName::Invoices, None);
        let agg = Aggregator::default().run(TableName::Invoices, &invoices(), &plan).unwrap();
        let months = agg.breakdown(breakdown::REVENUE_BY_MONTH).unwrap();
        let keys: Vec<&str> = months.groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["2025-01", "2025-02", "2025-03"]);
        assert!((months.groups[0].value - 3000.0).abs() < 1e-9);
    }

    #[test]
    fn test_group_and_sample_limits() {
        let limits = AggregateLimits {
            max_groups: 2,
            max_sample_rows: 3,
        };
        let plan = AggregatePlan::for_domain(Domain::GeographicDistribution, TableName::Invoices, None);
        let agg = Aggregator::new(limits).run(TableName::Invoices, &invoices(), &plan).unwrap();
        let by_emirate = agg.breakdown(breakdown::INVOICES_BY_EMIRATE).unwrap();
        assert_eq!(by_emirate.groups.len(), 2);
        assert_eq!(by_emirate.total_groups, 3);
        assert_eq!(agg.sample.rows.len(), 3);
        assert_eq!(agg.sample.rows[0][1], "Dubai");
    }

    #[test]
    fn test_empty_frame_yields_empty_aggregate() {
        let plan = AggregatePlan::for_domain(Domain::TaxCompliance, TableName::Invoices, None);
        let agg = Aggregator::default()
            .run(TableName::Invoices, &DataFrame::empty(), &plan)
            .unwrap();
        assert_eq!(agg.row_count, 0);
        assert!(agg.metrics.is_empty());
        assert!(agg.breakdowns.is_empty());
        assert!(agg.sample.rows.is_empty());
    }
}
