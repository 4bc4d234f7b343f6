pub mod aggregation;
pub mod answer;
pub mod chart;
pub mod config;
pub mod conversation;
pub mod data_source;
pub mod domain;
pub mod engine;
pub mod entities;
pub mod error;
pub mod formatter;
pub mod language;
pub mod llm;
pub mod mock_responder;
pub mod query_context;
pub mod response_context;
pub mod tables;
pub mod ui_text;
pub mod visualization;

pub use answer::{AnswerGenerator, AnswerResult, AnswerStrategy};
pub use config::EngineConfig;
pub use conversation::ConversationState;
pub use data_source::{DataSource, FallbackDataSource, TableSnapshot};
pub use domain::{Domain, DomainFilter};
pub use engine::{AssistantEngine, EngineRequest, EngineResponse};
pub use error::{AssistantError, Result};
pub use language::Language;
pub use query_context::{QueryContext, QueryRouter};
pub use response_context::{ContextAssembler, ResponseContext};
pub use tables::{TableFilter, TableName};
pub use visualization::VisualizationType;
