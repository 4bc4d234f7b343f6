use einvoice_assistant::domain::DomainClassifier;
use einvoice_assistant::language::detect_language;
use einvoice_assistant::query_context::RoutingOverrides;
use einvoice_assistant::{Language, QueryRouter, TableFilter, TableName};
use proptest::prelude::*;
use std::collections::BTreeSet;

fn any_table() -> impl Strategy<Value = TableName> {
    prop::sample::select(TableName::ALL.to_vec())
}

proptest! {
    #[test]
    fn arabic_script_is_detected_as_arabic(text in "[\u{0621}-\u{064A}]{1,40}( [\u{0621}-\u{064A}]{1,10}){0,5}") {
        prop_assert_eq!(detect_language(&text), Language::Ar);
    }

    #[test]
    fn ascii_letters_are_detected_as_english(text in "[a-zA-Z]{1,40}( [a-zA-Z]{1,10}){0,5}") {
        prop_assert_eq!(detect_language(&text), Language::En);
    }

    #[test]
    fn relevant_tables_are_never_empty(text in "\\PC{0,80}") {
        let ctx = QueryRouter::new().route(&text);
        prop_assert!(!ctx.relevant_tables.is_empty());
        prop_assert!(!ctx.relevant_domains.is_empty());
    }

    #[test]
    fn table_override_wins(text in "\\PC{0,80}", table in any_table()) {
        let overrides = RoutingOverrides {
            table: TableFilter::Only(table),
            ..Default::default()
        };
        let ctx = QueryRouter::new().route_with(&text, overrides);
        prop_assert_eq!(ctx.relevant_tables, BTreeSet::from([table]));
    }

    #[test]
    fn classification_is_idempotent(text in "\\PC{0,80}") {
        let classifier = DomainClassifier::new();
        let language = detect_language(&text);
        prop_assert_eq!(classifier.classify(&text, language), classifier.classify(&text, language));
    }
}
