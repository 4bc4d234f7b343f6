//! Context Assembler
//!
//! Turns a [`QueryContext`] plus the borrowed table snapshot into a bounded
//! [`ResponseContext`]: per-table aggregates for the relevant tables and a
//! compact text excerpt that never exceeds the configured character budget.

use crate::aggregation::{AggregateLimits, AggregatePlan, Aggregator, Breakdown, TableAggregate};
use crate::data_source::TableSnapshot;
use crate::query_context::QueryContext;
use crate::tables::TableName;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use tracing::{debug, info, warn};

/// Appended when the excerpt had to be cut to fit the budget.
pub const TRUNCATION_MARKER: &str = "\n…[truncated]";

/// Bounded data excerpt grounding one answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseContext {
    pub query: QueryContext,
    /// Aggregates for relevant tables present in the snapshot, canonical order
    pub tables: Vec<TableAggregate>,
    /// Relevant tables that were not loaded or could not be aggregated
    pub missing_tables: Vec<TableName>,
    /// True when the snapshot held no tables at all
    pub no_tables_loaded: bool,
    pub serialized_excerpt: String,
    pub truncated: bool,
    pub budget: usize,
}

impl ResponseContext {
    pub fn table(&self, name: TableName) -> Option<&TableAggregate> {
        self.tables.iter().find(|t| t.table == name)
    }

    /// At least one relevant table has a row.
    pub fn has_data(&self) -> bool {
        self.tables.iter().any(|t| t.row_count > 0)
    }

    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|t| t.row_count).sum()
    }
}

pub struct ContextAssembler {
    aggregator: Aggregator,
    budget: usize,
}

impl ContextAssembler {
    pub fn new(limits: AggregateLimits, budget: usize) -> Self {
        Self {
            aggregator: Aggregator::new(limits),
            budget,
        }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Assemble the context. Missing tables and per-table aggregation failures
    /// leave a partial context instead of failing the request.
    pub fn assemble(&self, query: &QueryContext, snapshot: &TableSnapshot) -> ResponseContext {
        let mut tables = Vec::new();
        let mut missing_tables = Vec::new();

        for table in &query.relevant_tables {
            let Some(df) = snapshot.get(*table) else {
                debug!("Relevant table {} not loaded", table);
                missing_tables.push(*table);
                continue;
            };

            let plan = AggregatePlan::for_domain(query.primary_domain, *table, query.emirate_focus);
            match self.aggregator.run(*table, df, &plan) {
                Ok(aggregate) => tables.push(aggregate),
                Err(e) => {
                    warn!("Failed to aggregate {}: {}", table, e);
                    missing_tables.push(*table);
                }
            }
        }

        let full_text = serialize_context(query, &tables, &missing_tables);
        let (serialized_excerpt, truncated) = fit_to_budget(&full_text, self.budget);

        info!(
            tables = tables.len(),
            missing = missing_tables.len(),
            chars = serialized_excerpt.chars().count(),
            truncated,
            "Assembled response context"
        );

        ResponseContext {
            query: query.clone(),
            tables,
            missing_tables,
            no_tables_loaded: snapshot.is_empty(),
            serialized_excerpt,
            truncated,
            budget: self.budget,
        }
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(AggregateLimits::default(), 6000)
    }
}

fn serialize_context(
    query: &QueryContext,
    tables: &[TableAggregate],
    missing_tables: &[TableName],
) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "domain={} domains={} language={}",
        query.primary_domain,
        query.domains().iter().join(","),
        query.language
    );
    if let Some(emirate) = query.emirate_focus {
        let _ = writeln!(out, "focus_emirate={}", emirate);
    }

    for aggregate in tables {
        out.push('\n');
        serialize_table(&mut out, aggregate);
    }
    for table in missing_tables {
        let _ = writeln!(out, "\n[{}] not loaded", table);
    }
    out
}

fn serialize_table(out: &mut String, aggregate: &TableAggregate) {
    let _ = write!(out, "[{}] rows={}", aggregate.table, aggregate.row_count);
    match &aggregate.scope_unavailable {
        Some(column) => {
            let _ = write!(out, " scope_unavailable={}", column);
        }
        None => {
            let _ = write!(out, " in_scope={}", aggregate.rows_in_scope);
        }
    }
    if let Some(scope) = &aggregate.scope {
        let _ = write!(out, " scope=({})", scope);
    }
    if let Some(focus) = &aggregate.focus {
        let _ = write!(out, " focus=({}) in_focus={}", focus, aggregate.rows_in_focus);
    }
    if let Some(column) = &aggregate.focus_unavailable {
        let _ = write!(out, " focus_unavailable={}", column);
    }
    out.push('\n');

    if !aggregate.metrics.is_empty() {
        let metrics = aggregate
            .metrics
            .iter()
            .map(|m| format!("{}={:.2}", m.name, m.value))
            .join(" | ");
        let _ = writeln!(out, "{}", metrics);
    }

    for breakdown in &aggregate.breakdowns {
        serialize_breakdown(out, breakdown);
    }

    if !aggregate.sample.rows.is_empty() {
        let _ = writeln!(
            out,
            "sample ({} of {}):",
            aggregate.sample.rows.len(),
            aggregate.rows_in_scope
        );
        let _ = writeln!(out, "{}", aggregate.sample.columns.join(","));
        for row in &aggregate.sample.rows {
            let _ = writeln!(out, "{}", row.join(","));
        }
    }
}

fn serialize_breakdown(out: &mut String, breakdown: &Breakdown) {
    let groups = breakdown
        .groups
        .iter()
        .map(|g| format!("{}={:.2} ({})", g.key, g.value, g.count))
        .join("; ");
    let _ = write!(out, "{} [{}]: {}", breakdown.name, breakdown.measure, groups);
    if breakdown.total_groups > breakdown.groups.len() {
        let _ = write!(out, "; +{} more", breakdown.total_groups - breakdown.groups.len());
    }
    out.push('\n');
}

/// Cut `text` to at most `budget` characters, marking any cut explicitly.
pub fn fit_to_budget(text: &str, budget: usize) -> (String, bool) {
    if text.chars().count() <= budget {
        return (text.to_string(), false);
    }

    let marker_len = TRUNCATION_MARKER.chars().count();
    if budget <= marker_len {
        return (TRUNCATION_MARKER.chars().take(budget).collect(), true);
    }

    let mut cut: String = text.chars().take(budget - marker_len).collect();
    cut.push_str(TRUNCATION_MARKER);
    (cut, true)
}
