//! Answer Generator
//!
//! Picks between the backend strategy (an external generative model fed the
//! assembled excerpt) and the mock strategy (templates over local
//! aggregates). Backend failures never escape: they are logged and the mock
//! answer is returned instead.

use crate::language::Language;
use crate::llm::{BackendClient, BackendError, DEFAULT_MODEL};
use crate::mock_responder::MockResponder;
use crate::response_context::ResponseContext;
use crate::visualization::VisualizationType;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStrategy {
    Backend,
    Mock,
}

/// Outcome of answering one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub success: bool,
    pub response_text: Option<String>,
    /// User-facing explanation when `success` is false
    pub message: Option<String>,
    pub visualization_type: Option<VisualizationType>,
    pub strategy: AnswerStrategy,
}

impl AnswerResult {
    pub fn ok(
        text: impl Into<String>,
        visualization_type: Option<VisualizationType>,
        strategy: AnswerStrategy,
    ) -> Self {
        Self {
            success: true,
            response_text: Some(text.into()),
            message: None,
            visualization_type,
            strategy,
        }
    }

    pub fn failure(
        message: impl Into<String>,
        visualization_type: Option<VisualizationType>,
        strategy: AnswerStrategy,
    ) -> Self {
        Self {
            success: false,
            response_text: None,
            message: Some(message.into()),
            visualization_type,
            strategy,
        }
    }

    /// Text to show the user: the answer, or the failure message.
    pub fn display_text(&self) -> &str {
        self.response_text
            .as_deref()
            .or(self.message.as_deref())
            .unwrap_or_default()
    }
}

/// Delegates to an external generative backend.
pub struct BackendStrategy {
    client: Arc<dyn BackendClient>,
    model: String,
    timeout: Duration,
}

impl BackendStrategy {
    pub fn new(client: Arc<dyn BackendClient>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            model: model.into(),
            timeout,
        }
    }

    pub fn has_credential(&self) -> bool {
        self.client.has_credential()
    }

    pub async fn answer(&self, question: &str, ctx: &ResponseContext) -> AnswerResult {
        let visualization = ctx.query.visualization_type;
        let prompt = build_prompt(question, ctx);

        let outcome = match tokio::time::timeout(self.timeout, self.client.complete(&prompt, &self.model)).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout(self.timeout.as_secs())),
        };

        match outcome {
            Ok(text) => AnswerResult::ok(text, visualization, AnswerStrategy::Backend),
            Err(e) => AnswerResult::failure(e.to_string(), visualization, AnswerStrategy::Backend),
        }
    }
}

/// Persona header, language instruction, data excerpt and question.
pub fn build_prompt(question: &str, ctx: &ResponseContext) -> String {
    let language_instruction = match ctx.query.language {
        Language::En => "Respond in English.",
        Language::Ar => "Respond in Arabic (العربية). Keep numbers exact.",
    };
    let truncation_note = if ctx.truncated {
        "\nThe data excerpt was truncated; say so if the answer depends on missing rows."
    } else {
        ""
    };

    format!(
        r#"You are an e-invoice assistant for UAE tax authority analysts.
You answer questions about invoices, invoice items, taxpayers and invoice audit logs.
Focus area: {domain}.
{language_instruction}
Use only the figures in the data excerpt below. If the excerpt cannot answer the question, say what is missing.{truncation_note}

Data excerpt:
{excerpt}

Question: {question}"#,
        domain = ctx.query.primary_domain,
        language_instruction = language_instruction,
        truncation_note = truncation_note,
        excerpt = ctx.serialized_excerpt,
        question = question,
    )
}

pub struct AnswerGenerator {
    backend: Option<BackendStrategy>,
    mock: MockResponder,
}

impl AnswerGenerator {
    pub fn new(client: Option<Arc<dyn BackendClient>>, model: impl Into<String>, timeout: Duration) -> Self {
        let model = model.into();
        Self {
            backend: client.map(|c| BackendStrategy::new(c, model, timeout)),
            mock: MockResponder::new(),
        }
    }

    pub fn mock_only() -> Self {
        Self {
            backend: None,
            mock: MockResponder::new(),
        }
    }

    /// True when answers will be attempted against the backend first.
    pub fn uses_backend(&self) -> bool {
        self.backend.as_ref().map(|b| b.has_credential()).unwrap_or(false)
    }

    pub async fn generate(&self, question: &str, ctx: &ResponseContext) -> AnswerResult {
        if !ctx.has_data() {
            debug!("Context has no rows, skipping backend");
            return self.mock.respond(question, ctx);
        }

        match self.backend.as_ref().filter(|b| b.has_credential()) {
            Some(backend) => {
                info!("Answering with backend strategy");
                let result = backend.answer(question, ctx).await;
                if result.success {
                    return result;
                }
                warn!(
                    "Backend strategy failed ({}), falling back to mock answer",
                    result.message.as_deref().unwrap_or("unknown error")
                );
            }
            None => debug!("No backend credential, answering with mock strategy"),
        }

        self.mock.respond(question, ctx)
    }
}

impl Default for AnswerGenerator {
    fn default() -> Self {
        Self::new(None, DEFAULT_MODEL, Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::TableSnapshot;
    use crate::query_context::QueryRouter;
    use crate::response_context::ContextAssembler;
    use crate::tables::TableName;
    use async_trait::async_trait;
    use polars::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    enum Script {
        Reply(&'static str),
        Fail(BackendError),
        Sleep(Duration),
    }

    struct FakeBackend {
        credential: bool,
        script: Script,
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeBackend {
        fn new(credential: bool, script: Script) -> Arc<Self> {
            Arc::new(Self {
                credential,
                script,
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl BackendClient for FakeBackend {
        fn has_credential(&self) -> bool {
            self.credential
        }

        async fn complete(&self, prompt: &str, _model: &str) -> Result<String, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.script {
                Script::Reply(text) => Ok(text.to_string()),
                Script::Fail(err) => Err(err.clone()),
                Script::Sleep(d) => {
                    tokio::time::sleep(*d).await;
                    Ok("too late".to_string())
                }
            }
        }
    }

    fn context(question: &str) -> ResponseContext {
        let invoices = df![
            "buyer_emirate" => ["Dubai", "Sharjah"],
            "invoice_tax_amount" => [100.0, 50.0],
            "invoice_without_tax" => [2000.0, 1000.0]
        ]
        .unwrap();
        let snapshot = TableSnapshot::new().with_table(TableName::Invoices, invoices);
        let query = QueryRouter::new().route(question);
        ContextAssembler::default().assemble(&query, &snapshot)
    }

    fn generator(backend: Arc<FakeBackend>, timeout: Duration) -> AnswerGenerator {
        AnswerGenerator::new(Some(backend as Arc<dyn BackendClient>), "gpt-4", timeout)
    }

    #[tokio::test]
    async fn test_backend_answer_is_used() {
        let backend = FakeBackend::new(true, Script::Reply("VAT in Dubai is 100 AED."));
        let gen = generator(backend.clone(), Duration::from_secs(5));
        let ctx = context("What is the total VAT collected in Dubai?");

        let result = gen.generate("What is the total VAT collected in Dubai?", &ctx).await;
        assert!(result.success);
        assert_eq!(result.strategy, AnswerStrategy::Backend);
        assert_eq!(result.response_text.as_deref(), Some("VAT in Dubai is 100 AED."));

        let prompts = backend.prompts.lock().unwrap();
        assert!(prompts[0].contains("Question: What is the total VAT collected in Dubai?"));
        assert!(prompts[0].contains(&ctx.serialized_excerpt));
    }

    #[tokio::test]
    async fn test_no_credential_never_calls_backend() {
        let backend = FakeBackend::new(false, Script::Reply("unused"));
        let gen = generator(backend.clone(), Duration::from_secs(5));
        let ctx = context("What is the total VAT collected in Dubai?");

        assert!(!gen.uses_backend());
        let result = gen.generate("What is the total VAT collected in Dubai?", &ctx).await;
        assert!(result.success);
        assert_eq!(result.strategy, AnswerStrategy::Mock);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_timeout_falls_back_to_mock() {
        let backend = FakeBackend::new(true, Script::Sleep(Duration::from_secs(5)));
        let gen = generator(backend.clone(), Duration::from_millis(20));
        let ctx = context("What is the total VAT collected in Dubai?");

        let result = gen.generate("What is the total VAT collected in Dubai?", &ctx).await;
        assert!(result.success);
        assert_eq!(result.strategy, AnswerStrategy::Mock);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_backend_strategy_maps_errors_to_failure() {
        let backend = FakeBackend::new(true, Script::Fail(BackendError::Auth("bad key".to_string())));
        let strategy = BackendStrategy::new(backend, "gpt-4", Duration::from_secs(5));
        let ctx = context("Show me fraud anomalies");

        let result = strategy.answer("Show me fraud anomalies", &ctx).await;
        assert!(!result.success);
        assert!(result.message.unwrap().contains("bad key"));
    }

    #[tokio::test]
    async fn test_quota_error_falls_back_to_mock() {
        let backend = FakeBackend::new(true, Script::Fail(BackendError::Quota("429".to_string())));
        let gen = generator(backend, Duration::from_secs(5));
        let ctx = context("Show me the monthly revenue trend over the past year");

        let result = gen.generate("Show me the monthly revenue trend over the past year", &ctx).await;
        assert!(result.success);
        assert_eq!(result.strategy, AnswerStrategy::Mock);
        assert_eq!(result.visualization_type, Some(VisualizationType::Line));
    }

    #[test]
    fn test_prompt_language_instruction() {
        let ctx = context("أظهر لي توزيع الفواتير حسب الإمارة");
        let prompt = build_prompt("أظهر لي توزيع الفواتير حسب الإمارة", &ctx);
        assert!(prompt.contains("Respond in Arabic"));
        assert!(prompt.contains("Focus area: geographic_distribution"));
    }
}
