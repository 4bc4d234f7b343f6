//! Query Context Builder
//!
//! Composes language detection, domain classification, table selection and
//! visualization inference into one immutable [`QueryContext`]. Building is a
//! pure function of its inputs, so a context can be re-derived later from a
//! stored question (for example to regenerate its chart).

use crate::domain::{Domain, DomainClassifier, DomainFilter, DomainMatch};
use crate::entities::{find_emirate, Emirate};
use crate::language::{detect_language, Language};
use crate::tables::{TableFilter, TableName, TableSelector};
use crate::visualization::{infer_visualization, VisualizationType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

/// Classification result for one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryContext {
    pub language: Language,
    pub raw_text: String,
    /// Never empty
    pub relevant_domains: Vec<DomainMatch>,
    pub primary_domain: Domain,
    /// Set when the classifier found no keyword and fell back to every domain
    pub no_strong_match: bool,
    /// Never empty
    pub relevant_tables: BTreeSet<TableName>,
    pub visualization_type: Option<VisualizationType>,
    pub emirate_focus: Option<Emirate>,
}

impl QueryContext {
    pub fn domains(&self) -> Vec<Domain> {
        self.relevant_domains.iter().map(|m| m.domain).collect()
    }

    pub fn is_relevant(&self, table: TableName) -> bool {
        self.relevant_tables.contains(&table)
    }
}

/// Caller-side knobs applied while routing a question.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoutingOverrides {
    pub language_hint: Option<Language>,
    pub table: TableFilter,
    pub domain: DomainFilter,
}

/// Routes questions to domains and tables.
pub struct QueryRouter {
    classifier: DomainClassifier,
    selector: TableSelector,
}

impl QueryRouter {
    pub fn new() -> Self {
        Self {
            classifier: DomainClassifier::new(),
            selector: TableSelector::new(),
        }
    }

    /// Build the context for a question without any caller overrides.
    pub fn route(&self, question: &str) -> QueryContext {
        self.route_with(question, RoutingOverrides::default())
    }

    pub fn route_with(&self, question: &str, overrides: RoutingOverrides) -> QueryContext {
        let language = overrides
            .language_hint
            .unwrap_or_else(|| detect_language(question));

        let classification = self.classifier.classify(question, language);

        let (relevant_domains, primary_domain, no_strong_match) = match overrides.domain {
            DomainFilter::Only(domain) => {
                let matched_keywords = classification
                    .matches
                    .iter()
                    .find(|m| m.domain == domain)
                    .map(|m| m.matched_keywords.clone())
                    .unwrap_or_default();
                let forced = DomainMatch {
                    domain,
                    confidence: matched_keywords.len(),
                    matched_keywords,
                };
                (vec![forced], domain, false)
            }
            DomainFilter::All => {
                let primary = classification.primary();
                let no_strong_match = classification.no_strong_match;
                (classification.matches, primary, no_strong_match)
            }
        };

        let domains: Vec<Domain> = relevant_domains.iter().map(|m| m.domain).collect();
        let relevant_tables = self.selector.select(question, &domains, overrides.table);

        let context = QueryContext {
            language,
            raw_text: question.to_string(),
            relevant_domains,
            primary_domain,
            no_strong_match,
            relevant_tables,
            visualization_type: infer_visualization(question),
            emirate_focus: find_emirate(question),
        };

        info!(
            language = %context.language,
            primary_domain = %context.primary_domain,
            tables = ?context.relevant_tables,
            visualization = ?context.visualization_type,
            "Routed question"
        );

        context
    }
}

impl Default for QueryRouter {
    fn default() -> Self {
        Self::new()
    }
}
