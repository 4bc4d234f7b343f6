//! Chart data for a routed question.
//!
//! Renderers return a serializable [`ChartSpec`] (kind, labels and data
//! points) rather than drawing anything; `None` means no chart can be built
//! from the data at hand.

use crate::aggregation::{
    AggregateLimits, AggregatePlan, Aggregator, BreakdownSpec, Dimension, Measure, RowFilter,
};
use crate::data_source::TableSnapshot;
use crate::domain::Domain;
use crate::error::Result;
use crate::language::Language;
use crate::query_context::QueryContext;
use crate::tables::TableName;
use crate::visualization::VisualizationType;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const SERIES_NAME: &str = "chart_series";
const MAX_POINTS: usize = 24;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub x: String,
    pub y: f64,
    /// Set for grouped charts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub kind: VisualizationType,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub points: Vec<ChartPoint>,
}

pub trait ChartRenderer {
    fn render(
        &self,
        visualization: VisualizationType,
        snapshot: &TableSnapshot,
        query: &QueryContext,
    ) -> Option<ChartSpec>;
}

struct Labels {
    title: (&'static str, &'static str),
    x: (&'static str, &'static str),
    y: (&'static str, &'static str),
}

impl Labels {
    fn pick(pair: (&'static str, &'static str), language: Language) -> String {
        match language {
            Language::En => pair.0.to_string(),
            Language::Ar => pair.1.to_string(),
        }
    }
}

/// Single-dimension series over one table.
struct SeriesPlan {
    table: TableName,
    scope: Option<RowFilter>,
    dimension: Dimension,
    measure: Measure,
    labels: Labels,
}

/// Two-key series for grouped bars.
struct GroupedPlan {
    table: TableName,
    x: &'static str,
    series: &'static str,
    value: &'static str,
    labels: Labels,
}

const COUNT_LABEL: (&str, &str) = ("Invoices", "الفواتير");
const REVENUE_LABEL: (&str, &str) = ("Revenue (AED)", "الإيرادات (درهم)");

fn series_plan(visualization: VisualizationType, domain: Domain) -> SeriesPlan {
    match (visualization, domain) {
        (VisualizationType::Line, Domain::TaxCompliance) => SeriesPlan {
            table: TableName::Invoices,
            scope: None,
            dimension: Dimension::Month("invoice_datetime"),
            measure: Measure::Sum("invoice_tax_amount"),
            labels: Labels {
                title: ("Monthly VAT collected", "ضريبة القيمة المضافة الشهرية"),
                x: ("Month", "الشهر"),
                y: ("VAT (AED)", "الضريبة (درهم)"),
            },
        },
        (VisualizationType::Line, _) => SeriesPlan {
            table: TableName::Invoices,
            scope: None,
            dimension: Dimension::Month("invoice_datetime"),
            measure: Measure::Sum("invoice_without_tax"),
            labels: Labels {
                title: ("Monthly revenue", "الإيرادات الشهرية"),
                x: ("Month", "الشهر"),
                y: REVENUE_LABEL,
            },
        },
        (VisualizationType::Map, _) | (_, Domain::GeographicDistribution) => SeriesPlan {
            table: TableName::Invoices,
            scope: None,
            dimension: Dimension::Column("buyer_emirate"),
            measure: Measure::Count,
            labels: Labels {
                title: ("Invoices by emirate", "الفواتير حسب الإمارة"),
                x: ("Emirate", "الإمارة"),
                y: COUNT_LABEL,
            },
        },
        (_, Domain::FraudDetection) => SeriesPlan {
            table: TableName::Invoices,
            scope: Some(RowFilter::FlagSet("is_anomaly")),
            dimension: Dimension::Column("anomaly_type"),
            measure: Measure::Count,
            labels: Labels {
                title: ("Anomaly types", "أنواع الشذوذ"),
                x: ("Anomaly type", "نوع الشذوذ"),
                y: COUNT_LABEL,
            },
        },
        (_, Domain::RevenueAnalysis) => SeriesPlan {
            table: TableName::Invoices,
            scope: None,
            dimension: Dimension::Column("invoice_sales_type"),
            measure: Measure::Sum("invoice_without_tax"),
            labels: Labels {
                title: ("Revenue by sales type", "الإيرادات حسب نوع البيع"),
                x: ("Sales type", "نوع البيع"),
                y: REVENUE_LABEL,
            },
        },
        (_, Domain::TaxCompliance) => SeriesPlan {
            table: TableName::Invoices,
            scope: None,
            dimension: Dimension::Column("vat_category"),
            measure: Measure::Count,
            labels: Labels {
                title: ("Invoices by VAT category", "الفواتير حسب فئة الضريبة"),
                x: ("VAT category", "فئة الضريبة"),
                y: COUNT_LABEL,
            },
        },
    }
}

fn grouped_plan(domain: Domain) -> GroupedPlan {
    match domain {
        Domain::TaxCompliance | Domain::FraudDetection => GroupedPlan {
            table: TableName::Taxpayers,
            x: "sector",
            series: "business_size",
            value: "tax_compliance_score",
            labels: Labels {
                title: ("Tax compliance by sector", "الامتثال الضريبي حسب القطاع"),
                x: ("Sector", "القطاع"),
                y: ("Average compliance score", "متوسط درجة الامتثال"),
            },
        },
        Domain::RevenueAnalysis | Domain::GeographicDistribution => GroupedPlan {
            table: TableName::Invoices,
            x: "buyer_emirate",
            series: "invoice_sales_type",
            value: "invoice_without_tax",
            labels: Labels {
                title: ("Average invoice value by emirate", "متوسط قيمة الفاتورة حسب الإمارة"),
                x: ("Emirate", "الإمارة"),
                y: REVENUE_LABEL,
            },
        },
    }
}

/// Builds chart series with the same aggregation engine used for answers.
pub struct SeriesChartRenderer {
    aggregator: Aggregator,
}

impl SeriesChartRenderer {
    pub fn new() -> Self {
        Self {
            aggregator: Aggregator::new(AggregateLimits {
                max_groups: MAX_POINTS,
                max_sample_rows: 0,
            }),
        }
    }

    fn render_series(
        &self,
        visualization: VisualizationType,
        snapshot: &TableSnapshot,
        query: &QueryContext,
    ) -> Result<Option<ChartSpec>> {
        let plan = series_plan(visualization, query.primary_domain);
        let Some(df) = snapshot.get(plan.table) else {
            debug!("Chart table {} not loaded", plan.table);
            return Ok(None);
        };

        let aggregate_plan = AggregatePlan {
            scope: plan.scope.clone(),
            breakdowns: vec![BreakdownSpec {
                name: SERIES_NAME,
                dimension: plan.dimension,
                measure: plan.measure,
            }],
            ..Default::default()
        };
        let aggregate = self.aggregator.run(plan.table, df, &aggregate_plan)?;

        let points: Vec<ChartPoint> = aggregate
            .breakdown(SERIES_NAME)
            .map(|b| {
                b.groups
                    .iter()
                    .map(|g| ChartPoint {
                        x: g.key.clone(),
                        y: g.value,
                        series: None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(build_spec(visualization, &plan.labels, query.language, points))
    }

    fn render_grouped(&self, snapshot: &TableSnapshot, query: &QueryContext) -> Result<Option<ChartSpec>> {
        let plan = grouped_plan(query.primary_domain);
        let Some(df) = snapshot.get(plan.table) else {
            debug!("Chart table {} not loaded", plan.table);
            return Ok(None);
        };

        let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
        if [plan.x, plan.series, plan.value]
            .iter()
            .any(|c| !names.iter().any(|n| n == c))
        {
            debug!("Chart columns missing from {}", plan.table);
            return Ok(None);
        }

        let grouped = df
            .clone()
            .lazy()
            .group_by([
                col(plan.x).cast(DataType::String),
                col(plan.series).cast(DataType::String),
            ])
            .agg([col(plan.value).cast(DataType::Float64).mean().alias("__value")])
            .collect()?;

        let xs = grouped.column(plan.x)?.cast(&DataType::String)?;
        let xs = xs.str()?;
        let series = grouped.column(plan.series)?.cast(&DataType::String)?;
        let series = series.str()?;
        let values = grouped.column("__value")?.cast(&DataType::Float64)?;
        let values = values.f64()?;

        let mut points: Vec<ChartPoint> = (0..grouped.height())
            .filter_map(|i| {
                Some(ChartPoint {
                    x: xs.get(i).unwrap_or("Unknown").to_string(),
                    y: values.get(i)?,
                    series: Some(series.get(i).unwrap_or("Unknown").to_string()),
                })
            })
            .collect();
        points.sort_by(|a, b| a.x.cmp(&b.x).then_with(|| a.series.cmp(&b.series)));

        Ok(build_spec(
            VisualizationType::GroupedBar,
            &plan.labels,
            query.language,
            points,
        ))
    }
}

impl Default for SeriesChartRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ChartRenderer for SeriesChartRenderer {
    fn render(
        &self,
        visualization: VisualizationType,
        snapshot: &TableSnapshot,
        query: &QueryContext,
    ) -> Option<ChartSpec> {
        let result = match visualization {
            VisualizationType::GroupedBar => self.render_grouped(snapshot, query),
            _ => self.render_series(visualization, snapshot, query),
        };

        match result {
            Ok(spec) => spec,
            Err(e) => {
                warn!("Failed to build {} chart: {}", visualization, e);
                None
            }
        }
    }
}

fn build_spec(
    kind: VisualizationType,
    labels: &Labels,
    language: Language,
    points: Vec<ChartPoint>,
) -> Option<ChartSpec> {
    if points.is_empty() {
        return None;
    }
    Some(ChartSpec {
        kind,
        title: Labels::pick(labels.title, language),
        x_label: Labels::pick(labels.x, language),
        y_label: Labels::pick(labels.y, language),
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_context::QueryRouter;

    fn snapshot() -> TableSnapshot {
        let invoices = df![
            "invoice_datetime" => ["2024-01-05", "2024-01-20", "2024-02-03", "2024-03-11"],
            "buyer_emirate" => ["Dubai", "Sharjah", "Dubai", "Dubai"],
            "invoice_without_tax" => [1000.0, 500.0, 250.0, 100.0],
            "invoice_tax_amount" => [50.0, 25.0, 12.5, 5.0],
            "invoice_sales_type" => ["B2B", "B2C", "B2B", "B2C"]
        ]
        .unwrap();
        let taxpayers = df![
            "sector" => ["Retail", "Retail", "Energy"],
            "business_size" => ["Small", "Large", "Large"],
            "tax_compliance_score" => [60.0, 80.0, 90.0]
        ]
        .unwrap();
        TableSnapshot::new()
            .with_table(TableName::Invoices, invoices)
            .with_table(TableName::Taxpayers, taxpayers)
    }

    #[test]
    fn test_monthly_trend_is_chronological() {
        let query = QueryRouter::new().route("Show me the monthly revenue trend over the past year");
        let spec = SeriesChartRenderer::new()
            .render(VisualizationType::Line, &snapshot(), &query)
            .unwrap();

        assert_eq!(spec.kind, VisualizationType::Line);
        let months: Vec<&str> = spec.points.iter().map(|p| p.x.as_str()).collect();
        assert_eq!(months, vec!["2024-01", "2024-02", "2024-03"]);
        assert_eq!(spec.points[0].y, 1500.0);
    }

    #[test]
    fn test_map_counts_by_emirate() {
        let query = QueryRouter::new().route("أظهر لي توزيع الفواتير حسب الإمارة");
        let spec = SeriesChartRenderer::new()
            .render(VisualizationType::Map, &snapshot(), &query)
            .unwrap();

        assert_eq!(spec.title, "الفواتير حسب الإمارة");
        assert_eq!(spec.points[0].x, "Dubai");
        assert_eq!(spec.points[0].y, 3.0);
    }

    #[test]
    fn test_grouped_compliance_by_sector() {
        let query = QueryRouter::new().route("Compare tax compliance rates across different sectors");
        let spec = SeriesChartRenderer::new()
            .render(VisualizationType::GroupedBar, &snapshot(), &query)
            .unwrap();

        assert_eq!(spec.points.len(), 3);
        assert_eq!(spec.points[0].x, "Energy");
        assert_eq!(spec.points[0].series.as_deref(), Some("Large"));
    }

    #[test]
    fn test_no_chart_without_data() {
        let query = QueryRouter::new().route("Show me the monthly revenue trend over the past year");
        let renderer = SeriesChartRenderer::new();
        assert!(renderer
            .render(VisualizationType::Line, &TableSnapshot::new(), &query)
            .is_none());

        let empty = snapshot().get(TableName::Invoices).unwrap().head(Some(0));
        let snapshot = TableSnapshot::new().with_table(TableName::Invoices, empty);
        assert!(renderer.render(VisualizationType::Line, &snapshot, &query).is_none());
    }
}
