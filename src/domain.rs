//! Domain Classifier
//!
//! Maps question text to the analytic domains it talks about using a fixed
//! keyword table per language. Confidence is the number of distinct keywords
//! found; ties fall back to the fixed domain priority order.

use crate::error::{AssistantError, Result};
use crate::language::Language;
use crate::tables::TableName;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Analytic domain. Declaration order is the tie-break priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    TaxCompliance,
    FraudDetection,
    RevenueAnalysis,
    GeographicDistribution,
}

impl Domain {
    /// All domains in priority order.
    pub const ALL: [Domain; 4] = [
        Domain::TaxCompliance,
        Domain::FraudDetection,
        Domain::RevenueAnalysis,
        Domain::GeographicDistribution,
    ];

    /// Primary domain used when nothing in the question matches.
    pub const DEFAULT: Domain = Domain::TaxCompliance;

    pub fn id(&self) -> &'static str {
        match self {
            Domain::TaxCompliance => "tax_compliance",
            Domain::FraudDetection => "fraud_detection",
            Domain::RevenueAnalysis => "revenue_analysis",
            Domain::GeographicDistribution => "geographic_distribution",
        }
    }

    pub fn priority(&self) -> usize {
        Domain::ALL.iter().position(|d| d == self).unwrap_or(Domain::ALL.len())
    }

    /// Tables a domain primarily draws from.
    pub fn default_tables(&self) -> &'static [TableName] {
        match self {
            Domain::TaxCompliance => &[TableName::Invoices, TableName::Taxpayers],
            Domain::FraudDetection => &[TableName::Invoices, TableName::AuditLogs],
            Domain::RevenueAnalysis => &[TableName::Invoices, TableName::Items],
            Domain::GeographicDistribution => &[TableName::Invoices],
        }
    }

    pub fn keywords(&self, language: Language) -> &'static [&'static str] {
        match (self, language) {
            (Domain::TaxCompliance, Language::En) => &[
                "tax", "vat", "compliance", "compliant", "trn", "exempt", "zero rated",
                "filing", "tax rate",
            ],
            (Domain::TaxCompliance, Language::Ar) => &[
                "ضريبة", "الضريبة", "ضريبي", "الضريبي", "القيمة المضافة", "امتثال", "الامتثال",
                "معفى",
            ],
            (Domain::FraudDetection, Language::En) => &[
                "fraud", "anomaly", "anomalies", "suspicious", "risk", "duplicate", "irregular",
                "outlier",
            ],
            (Domain::FraudDetection, Language::Ar) => &[
                "احتيال", "الاحتيال", "شذوذ", "الشذوذ", "مشبوه", "مخاطر", "مكرر",
            ],
            (Domain::RevenueAnalysis, Language::En) => &[
                "revenue", "sales", "income", "earnings", "turnover", "profit", "monthly",
            ],
            (Domain::RevenueAnalysis, Language::Ar) => &[
                "إيرادات", "الإيرادات", "مبيعات", "المبيعات", "دخل", "أرباح",
            ],
            (Domain::GeographicDistribution, Language::En) => &[
                "emirate", "region", "geographic", "location", "city", "area",
            ],
            (Domain::GeographicDistribution, Language::Ar) => &[
                "إمارة", "الإمارة", "الإمارات", "منطقة", "جغرافي", "موقع", "مدينة",
            ],
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl FromStr for Domain {
    type Err = AssistantError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        Domain::ALL
            .iter()
            .copied()
            .find(|d| d.id() == normalized)
            .ok_or_else(|| AssistantError::InvalidFilter(format!("Unknown domain '{}'", s)))
    }
}

/// Caller-supplied domain restriction. `All` means "let the classifier decide".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DomainFilter {
    #[default]
    All,
    Only(Domain),
}

impl FromStr for DomainFilter {
    type Err = AssistantError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase();
        if normalized == "all" || normalized == "all domains" {
            return Ok(DomainFilter::All);
        }
        Ok(DomainFilter::Only(s.parse()?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainMatch {
    pub domain: Domain,
    /// Number of distinct keywords found
    pub confidence: usize,
    pub matched_keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainClassification {
    /// Ordered by confidence, then domain priority. Never empty.
    pub matches: Vec<DomainMatch>,
    /// Set when no keyword matched and `matches` holds every domain.
    pub no_strong_match: bool,
}

impl DomainClassification {
    pub fn domains(&self) -> Vec<Domain> {
        self.matches.iter().map(|m| m.domain).collect()
    }

    /// Best single domain, or the system default when nothing matched.
    pub fn primary(&self) -> Domain {
        if self.no_strong_match {
            return Domain::DEFAULT;
        }
        self.matches.first().map(|m| m.domain).unwrap_or(Domain::DEFAULT)
    }
}

/// Keyword-driven domain classifier.
pub struct DomainClassifier;

impl DomainClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify `text` into domains. English keywords are always tested since
    /// Arabic questions often carry English terms such as "VAT".
    pub fn classify(&self, text: &str, language: Language) -> DomainClassification {
        let text_lower = text.to_lowercase();

        let mut matches: Vec<DomainMatch> = Domain::ALL
            .iter()
            .filter_map(|domain| {
                let mut matched: Vec<String> = Vec::new();
                let mut lists = vec![domain.keywords(Language::En)];
                if language == Language::Ar {
                    lists.push(domain.keywords(Language::Ar));
                }
                for keyword in lists.into_iter().flatten() {
                    if text_lower.contains(keyword) && !matched.iter().any(|m| m == keyword) {
                        matched.push(keyword.to_string());
                    }
                }
                if matched.is_empty() {
                    None
                } else {
                    Some(DomainMatch {
                        domain: *domain,
                        confidence: matched.len(),
                        matched_keywords: matched,
                    })
                }
            })
            .collect();

        if matches.is_empty() {
            debug!("No domain keyword matched, falling back to all domains");
            return DomainClassification {
                matches: Domain::ALL
                    .iter()
                    .map(|d| DomainMatch {
                        domain: *d,
                        confidence: 0,
                        matched_keywords: Vec::new(),
                    })
                    .collect(),
                no_strong_match: true,
            };
        }

        matches.sort_by(|a, b| {
            b.confidence
                .cmp(&a.confidence)
                .then_with(|| a.domain.priority().cmp(&b.domain.priority()))
        });

        debug!(
            "Classified domains: {:?}",
            matches.iter().map(|m| (m.domain.id(), m.confidence)).collect::<Vec<_>>()
        );

        DomainClassification {
            matches,
            no_strong_match: false,
        }
    }
}

impl Default for DomainClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vat_question_is_tax_compliance() {
        let classifier = DomainClassifier::new();
        let result = classifier.classify("What is the total VAT collected in Dubai?", Language::En);
        assert!(!result.no_strong_match);
        assert_eq!(result.primary(), Domain::TaxCompliance);
        assert_eq!(result.domains(), vec![Domain::TaxCompliance]);
        assert_eq!(result.matches[0].matched_keywords, vec!["vat".to_string()]);
    }

    #[test]
    fn test_arabic_emirate_question_is_geographic() {
        let classifier = DomainClassifier::new();
        let result = classifier.classify("أظهر لي توزيع الفواتير حسب الإمارة", Language::Ar);
        assert_eq!(result.primary(), Domain::GeographicDistribution);
        assert_eq!(result.matches[0].confidence, 2);
    }

    #[test]
    fn test_ties_follow_priority_order() {
        let classifier = DomainClassifier::new();
        // one keyword each for fraud and revenue
        let result = classifier.classify("suspicious revenue", Language::En);
        assert_eq!(result.domains(), vec![Domain::FraudDetection, Domain::RevenueAnalysis]);
    }

    #[test]
    fn test_higher_confidence_wins_over_priority() {
        let classifier = DomainClassifier::new();
        let result = classifier.classify("tax on monthly revenue and sales", Language::En);
        assert_eq!(result.primary(), Domain::RevenueAnalysis);
        assert_eq!(result.matches[0].confidence, 3);
        assert_eq!(result.matches[1].domain, Domain::TaxCompliance);
    }

    #[test]
    fn test_no_match_returns_all_domains() {
        let classifier = DomainClassifier::new();
        let result = classifier.classify("hello there", Language::En);
        assert!(result.no_strong_match);
        assert_eq!(result.domains(), Domain::ALL.to_vec());
        assert_eq!(result.primary(), Domain::DEFAULT);
    }

    #[test]
    fn test_classification_is_idempotent() {
        let classifier = DomainClassifier::new();
        let text = "Compare fraud risk across emirates";
        assert_eq!(
            classifier.classify(text, Language::En),
            classifier.classify(text, Language::En)
        );
    }

    #[test]
    fn test_parse_domain_filter() {
        assert_eq!("All".parse::<DomainFilter>().unwrap(), DomainFilter::All);
        assert_eq!(
            "fraud_detection".parse::<DomainFilter>().unwrap(),
            DomainFilter::Only(Domain::FraudDetection)
        );
        assert_eq!(
            "Geographic Distribution".parse::<DomainFilter>().unwrap(),
            DomainFilter::Only(Domain::GeographicDistribution)
        );
        assert!("weather".parse::<DomainFilter>().is_err());
    }
}
