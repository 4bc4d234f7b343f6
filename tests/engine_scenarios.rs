use async_trait::async_trait;
use einvoice_assistant::answer::AnswerStrategy;
use einvoice_assistant::data_source::{CsvDataSource, DataSource, SyntheticDataSource, TableSnapshot};
use einvoice_assistant::domain::Domain;
use einvoice_assistant::formatter::format_number;
use einvoice_assistant::llm::{BackendClient, BackendError};
use einvoice_assistant::{
    AssistantEngine, EngineConfig, EngineRequest, Language, TableFilter, TableName,
    VisualizationType,
};
use polars::prelude::*;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct CountingBackend {
    credential: bool,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl CountingBackend {
    fn new(credential: bool, delay: Option<Duration>) -> Arc<Self> {
        Arc::new(Self {
            credential,
            delay,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl BackendClient for CountingBackend {
    fn has_credential(&self) -> bool {
        self.credential
    }

    async fn complete(&self, _prompt: &str, _model: &str) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok("backend answer".to_string())
    }
}

fn synthetic() -> TableSnapshot {
    SyntheticDataSource::default().get_tables().unwrap()
}

fn dubai_vat_total(snapshot: &TableSnapshot) -> f64 {
    let invoices = snapshot.get(TableName::Invoices).unwrap();
    let out = invoices
        .clone()
        .lazy()
        .filter(col("buyer_emirate").eq(lit("Dubai")))
        .select([col("invoice_tax_amount").sum()])
        .collect()
        .unwrap();
    out.column("invoice_tax_amount")
        .unwrap()
        .cast(&DataType::Float64)
        .unwrap()
        .f64()
        .unwrap()
        .get(0)
        .unwrap_or(0.0)
}

fn temp_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("einvoice-{}-{}", label, uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_csv(dir: &PathBuf, table: TableName, df: &DataFrame) -> Result<(), Box<dyn std::error::Error>> {
    let mut file = std::fs::File::create(dir.join(table.file_name()))?;
    CsvWriter::new(&mut file).finish(&mut df.clone())?;
    Ok(())
}

#[tokio::test]
async fn test_total_vat_in_dubai() {
    let snapshot = synthetic();
    let engine = AssistantEngine::new(&EngineConfig::default());

    let response = engine
        .ask(&EngineRequest::new("What is the total VAT collected in Dubai?"), &snapshot)
        .await;

    let ctx = &response.query_context;
    assert_eq!(ctx.language, Language::En);
    assert_eq!(ctx.primary_domain, Domain::TaxCompliance);
    assert!(ctx.relevant_tables.contains(&TableName::Invoices));

    assert!(response.answer.success);
    assert_eq!(response.answer.strategy, AnswerStrategy::Mock);
    let expected = format_number(dubai_vat_total(&snapshot), Language::En);
    let text = response.answer.response_text.unwrap();
    assert!(
        text.contains(&format!("Total VAT collected in Dubai: {} AED", expected)),
        "{}",
        text
    );
}

#[tokio::test]
async fn test_arabic_distribution_by_emirate() {
    let engine = AssistantEngine::new(&EngineConfig::default());
    let response = engine
        .ask(&EngineRequest::new("أظهر لي توزيع الفواتير حسب الإمارة"), &synthetic())
        .await;

    let ctx = &response.query_context;
    assert_eq!(ctx.language, Language::Ar);
    assert_eq!(ctx.primary_domain, Domain::GeographicDistribution);
    assert_eq!(ctx.visualization_type, Some(VisualizationType::Map));
    assert!(ctx.relevant_tables.contains(&TableName::Invoices));
    assert!(response.answer.success);
    assert!(response.formatted_text.starts_with('\u{2067}'));
}

#[tokio::test]
async fn test_no_credential_never_calls_backend() {
    let backend = CountingBackend::new(false, None);
    let engine = AssistantEngine::with_backend(
        &EngineConfig::default(),
        Some(backend.clone() as Arc<dyn BackendClient>),
    );

    for question in einvoice_assistant::ui_text::example_questions(Language::En) {
        let response = engine.ask(&EngineRequest::new(*question), &synthetic()).await;
        assert_eq!(response.answer.strategy, AnswerStrategy::Mock);
    }
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_backend_timeout_resolves_to_mock() {
    let backend = CountingBackend::new(true, Some(Duration::from_secs(10)));
    let config = EngineConfig {
        backend_timeout: Duration::from_millis(50),
        ..Default::default()
    };
    let engine = AssistantEngine::with_backend(&config, Some(backend.clone() as Arc<dyn BackendClient>));
    assert!(engine.uses_backend());

    let response = engine
        .ask(&EngineRequest::new("What are the most common anomaly types in invoices?"), &synthetic())
        .await;
    assert!(response.answer.success);
    assert_eq!(response.answer.strategy, AnswerStrategy::Mock);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

    // the engine stays usable after a timed-out call
    let again = engine
        .ask(&EngineRequest::new("Show me the monthly revenue trend over the past year"), &synthetic())
        .await;
    assert!(again.answer.success);
}

#[tokio::test]
async fn test_backend_answer_when_available() {
    let backend = CountingBackend::new(true, None);
    let engine = AssistantEngine::with_backend(
        &EngineConfig::default(),
        Some(backend.clone() as Arc<dyn BackendClient>),
    );

    let response = engine
        .ask(&EngineRequest::new("Show me fraud anomalies"), &synthetic())
        .await;
    assert_eq!(response.answer.strategy, AnswerStrategy::Backend);
    assert_eq!(response.formatted_text, "backend answer");
}

#[tokio::test]
async fn test_table_override_is_exact() {
    let engine = AssistantEngine::new(&EngineConfig::default());
    for question in [
        "What is the total VAT collected in Dubai?",
        "Show me the audit logs",
        "أظهر لي توزيع الفواتير حسب الإمارة",
    ] {
        let request = EngineRequest::new(question).with_table(TableFilter::Only(TableName::Items));
        let response = engine.ask(&request, &synthetic()).await;
        assert_eq!(
            response.query_context.relevant_tables,
            BTreeSet::from([TableName::Items])
        );
        assert!(response.answer.success);
    }
}

#[tokio::test]
async fn test_csv_export_with_missing_tables() -> Result<(), Box<dyn std::error::Error>> {
    let dir = temp_dir("partial");
    let synthetic = synthetic();
    write_csv(&dir, TableName::Invoices, synthetic.get(TableName::Invoices).unwrap())?;

    let snapshot = CsvDataSource::new(&dir).get_tables()?;
    assert_eq!(snapshot.table_names(), vec![TableName::Invoices]);

    let engine = AssistantEngine::new(&EngineConfig::default());
    let response = engine
        .ask(&EngineRequest::new("What is the total VAT collected in Dubai?"), &snapshot)
        .await;
    assert!(response.answer.success);
    let text = response.answer.response_text.unwrap();
    assert!(text.contains(&format_number(dubai_vat_total(&snapshot), Language::En)));
    assert!(text.contains("Taxpayers"));

    std::fs::remove_dir_all(&dir).ok();
    Ok(())
}

#[tokio::test]
async fn test_no_tables_is_the_only_failure() {
    let engine = AssistantEngine::new(&EngineConfig::default());
    let response = engine
        .ask(&EngineRequest::new("ما هو إجمالي ضريبة القيمة المضافة المحصلة في دبي؟"), &TableSnapshot::new())
        .await;
    assert!(!response.answer.success);
    assert!(response.answer.response_text.is_none());
    assert!(response.answer.message.is_some());
}

#[tokio::test]
async fn test_override_to_unloaded_table_still_answers() {
    let synthetic = synthetic();
    let snapshot = TableSnapshot::new()
        .with_table(TableName::Invoices, synthetic.get(TableName::Invoices).unwrap().clone());
    let engine = AssistantEngine::new(&EngineConfig::default());

    let request = EngineRequest::new("Show me the audit logs").with_table(TableFilter::Only(TableName::AuditLogs));
    let response = engine.ask(&request, &snapshot).await;
    assert!(response.answer.success);
    let text = response.answer.response_text.unwrap();
    assert!(text.contains("No data is available"));
    assert!(text.contains("Audit Logs"));
}

#[test]
fn test_chart_regenerated_from_stored_question() {
    let engine = AssistantEngine::new(&EngineConfig::default());
    let snapshot = synthetic();

    let spec = engine
        .chart_for_question("Show me the distribution of invoices by emirate", &snapshot)
        .unwrap();
    assert_eq!(spec.kind, VisualizationType::Map);
    let total: f64 = spec.points.iter().map(|p| p.y).sum();
    assert_eq!(total, 100.0);
}
