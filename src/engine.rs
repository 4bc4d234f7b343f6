//! End-to-end pipeline: route, assemble, answer, format.
//!
//! The engine holds no per-user state. Conversation history lives in a
//! [`ConversationState`] the caller passes in per turn, and the table
//! snapshot is only ever borrowed.

use crate::answer::{AnswerGenerator, AnswerResult};
use crate::chart::{ChartRenderer, ChartSpec, SeriesChartRenderer};
use crate::config::EngineConfig;
use crate::conversation::{ChatTurn, ConversationState};
use crate::data_source::TableSnapshot;
use crate::domain::DomainFilter;
use crate::formatter::ResponseFormatter;
use crate::language::Language;
use crate::llm::{BackendClient, LlmClient};
use crate::query_context::{QueryContext, QueryRouter, RoutingOverrides};
use crate::response_context::ContextAssembler;
use crate::tables::TableFilter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// One question plus caller overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineRequest {
    pub question: String,
    pub language_hint: Option<Language>,
    pub table_override: TableFilter,
    pub domain_override: DomainFilter,
}

impl EngineRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Default::default()
        }
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language_hint = Some(language);
        self
    }

    pub fn with_table(mut self, table: TableFilter) -> Self {
        self.table_override = table;
        self
    }

    pub fn with_domain(mut self, domain: DomainFilter) -> Self {
        self.domain_override = domain;
        self
    }

    fn overrides(&self) -> RoutingOverrides {
        RoutingOverrides {
            language_hint: self.language_hint,
            table: self.table_override,
            domain: self.domain_override,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineResponse {
    pub request_id: String,
    pub answer: AnswerResult,
    /// Answer text or failure message, formatted for the question's language
    pub formatted_text: String,
    /// Classification used, so a chart can be requested for it later
    pub query_context: QueryContext,
    pub excerpt_truncated: bool,
}

pub struct AssistantEngine {
    router: QueryRouter,
    assembler: ContextAssembler,
    generator: AnswerGenerator,
    formatter: ResponseFormatter,
    charts: Box<dyn ChartRenderer + Send + Sync>,
}

impl AssistantEngine {
    /// Engine using the OpenAI-compatible client when an API key is configured.
    pub fn new(config: &EngineConfig) -> Self {
        let client = config.api_key.as_ref().map(|key| {
            Arc::new(LlmClient::with_settings(
                Some(key.clone()),
                config.base_url.clone(),
                config.temperature,
                config.backend_timeout,
            )) as Arc<dyn BackendClient>
        });
        Self::with_backend(config, client)
    }

    pub fn with_backend(config: &EngineConfig, client: Option<Arc<dyn BackendClient>>) -> Self {
        Self {
            router: QueryRouter::new(),
            assembler: ContextAssembler::new(config.limits, config.excerpt_budget),
            generator: AnswerGenerator::new(client, config.model.clone(), config.backend_timeout),
            formatter: ResponseFormatter::new(),
            charts: Box::new(SeriesChartRenderer::new()),
        }
    }

    pub fn with_chart_renderer(mut self, renderer: Box<dyn ChartRenderer + Send + Sync>) -> Self {
        self.charts = renderer;
        self
    }

    pub fn uses_backend(&self) -> bool {
        self.generator.uses_backend()
    }

    pub fn route(&self, request: &EngineRequest) -> QueryContext {
        self.router.route_with(&request.question, request.overrides())
    }

    /// Answer one question against a borrowed snapshot. Never fails: every
    /// problem is reported through `AnswerResult`.
    pub async fn ask(&self, request: &EngineRequest, snapshot: &TableSnapshot) -> EngineResponse {
        let request_id = Uuid::new_v4().to_string();
        let span = info_span!("ask", request_id = %request_id);

        async {
            let query_context = self.route(request);
            let ctx = self.assembler.assemble(&query_context, snapshot);
            let answer = self.generator.generate(&request.question, &ctx).await;
            let formatted_text = self
                .formatter
                .format(answer.display_text(), query_context.language);

            info!(
                success = answer.success,
                strategy = ?answer.strategy,
                truncated = ctx.truncated,
                "Answered question"
            );

            EngineResponse {
                request_id: request_id.clone(),
                answer,
                formatted_text,
                query_context,
                excerpt_truncated: ctx.truncated,
            }
        }
        .instrument(span)
        .await
    }

    /// Run one chat turn, recording the question and formatted answer in
    /// `state`. Blank input is ignored.
    pub async fn chat(
        &self,
        state: &mut ConversationState,
        input: &str,
        snapshot: &TableSnapshot,
    ) -> Option<EngineResponse> {
        let question = input.trim();
        if question.is_empty() {
            return None;
        }

        state.push(ChatTurn::user(question));
        let request = EngineRequest::new(question)
            .with_table(state.table_filter)
            .with_domain(state.domain_filter);
        let response = self.ask(&request, snapshot).await;
        state.push(ChatTurn::assistant(
            response.formatted_text.clone(),
            response.answer.visualization_type,
        ));
        Some(response)
    }

    /// Re-derive the classification of a stored question and build its chart.
    pub fn chart_for_question(&self, question: &str, snapshot: &TableSnapshot) -> Option<ChartSpec> {
        let query_context = self.router.route(question);
        let visualization = query_context.visualization_type?;
        self.charts.render(visualization, snapshot, &query_context)
    }

    /// Chart for the most recent user question in a session.
    pub fn chart_for_conversation(
        &self,
        state: &ConversationState,
        snapshot: &TableSnapshot,
    ) -> Option<ChartSpec> {
        self.chart_for_question(state.last_user_question()?, snapshot)
    }
}
