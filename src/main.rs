use einvoice_assistant::chart::ChartSpec;
use einvoice_assistant::conversation::ConversationState;
use einvoice_assistant::data_source::{DataSource, FallbackDataSource, TableSnapshot};
use einvoice_assistant::engine::{AssistantEngine, EngineRequest};
use einvoice_assistant::ui_text::{
    chat_commands, domain_filter_display_name, example_questions, table_filter_display_name,
    ui_text, TextId,
};
use einvoice_assistant::{DomainFilter, EngineConfig, Language, TableFilter};

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "einvoice-assistant")]
#[command(about = "Bilingual question answering over e-invoice data")]
#[command(version)]
struct Args {
    /// OpenAI API key (or set OPENAI_API_KEY env var)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Model name (or set EINVOICE_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Directory holding the CSV exports (or set EINVOICE_DATA_DIR)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a single question
    Ask {
        question: String,

        /// Restrict to one table (invoices, items, taxpayers, audit_logs)
        #[arg(long, default_value = "all")]
        table: TableFilter,

        /// Force a domain (tax_compliance, fraud_detection, revenue_analysis, geographic_distribution)
        #[arg(long, default_value = "all")]
        domain: DomainFilter,

        /// Answer language (en, ar); detected from the question when omitted
        #[arg(long)]
        lang: Option<Language>,
    },
    /// Interactive chat session
    Chat {
        #[arg(long, default_value = "en")]
        lang: Language,
    },
    /// Print example questions
    Examples {
        #[arg(long, default_value = "en")]
        lang: Language,
    },
    /// Print chart data for a question as JSON
    Chart { question: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("einvoice_assistant=info")),
        )
        .init();

    let args = Args::parse();

    let mut config = EngineConfig::from_env()?;
    if let Some(key) = args.api_key.filter(|k| !k.trim().is_empty()) {
        config.api_key = Some(key);
    }
    if let Some(model) = args.model {
        config.model = model;
    }
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }

    match args.command {
        Commands::Examples { lang } => {
            for (i, question) in example_questions(lang).iter().enumerate() {
                println!("{}. {}", i + 1, question);
            }
            Ok(())
        }
        Commands::Ask {
            question,
            table,
            domain,
            lang,
        } => {
            let snapshot = load_snapshot(&config)?;
            let engine = AssistantEngine::new(&config);
            let mut request = EngineRequest::new(question).with_table(table).with_domain(domain);
            if let Some(lang) = lang {
                request = request.with_language(lang);
            }
            let response = engine.ask(&request, &snapshot).await;
            println!("{}", response.formatted_text);
            if let Some(viz) = response.answer.visualization_type {
                println!("\n[chart: {}]", viz);
            }
            Ok(())
        }
        Commands::Chart { question } => {
            let snapshot = load_snapshot(&config)?;
            let engine = AssistantEngine::new(&config);
            match engine.chart_for_question(&question, &snapshot) {
                Some(spec) => println!("{}", serde_json::to_string_pretty(&spec)?),
                None => println!("{}", ui_text(TextId::NoChart, Language::En)),
            }
            Ok(())
        }
        Commands::Chat { lang } => {
            let snapshot = load_snapshot(&config)?;
            let engine = AssistantEngine::new(&config);
            run_chat(&engine, &config, &snapshot, lang).await
        }
    }
}

fn load_snapshot(config: &EngineConfig) -> Result<TableSnapshot> {
    let snapshot = FallbackDataSource::new(&config.data_dir).get_tables()?;
    info!("Loaded tables: {:?}", snapshot.table_names());
    Ok(snapshot)
}

async fn run_chat(
    engine: &AssistantEngine,
    config: &EngineConfig,
    snapshot: &TableSnapshot,
    lang: Language,
) -> Result<()> {
    let mut state = ConversationState::new(lang);

    println!("{}", ui_text(TextId::Title, lang));
    println!("{}\n", ui_text(TextId::Subtitle, lang));
    if engine.uses_backend() {
        println!("{}: {}", ui_text(TextId::ModelSelector, lang), config.model);
        println!("{}: {:.1}\n", ui_text(TextId::Temperature, lang), config.temperature);
    } else {
        println!("{}", ui_text(TextId::ApiKeyMissing, lang));
        println!("{}\n", ui_text(TextId::ApiKeyHelp, lang));
    }
    if let Some(welcome) = state.history().first() {
        println!("{}\n", welcome.content);
    }
    print_help(state.language);

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let input = line.trim();

        match input.split_once(' ').unwrap_or((input, "")) {
            ("/quit" | "/exit", _) => break,
            ("/clear", _) => {
                state.clear();
                if let Some(welcome) = state.history().first() {
                    println!("{}\n", welcome.content);
                }
            }
            ("/lang", value) => match value.parse::<Language>() {
                Ok(language) => {
                    state.set_language(language);
                    println!("{}\n", ui_text(TextId::WelcomeMessage, language));
                }
                Err(e) => println!("{}\n", e),
            },
            ("/table", value) => match value.parse::<TableFilter>() {
                Ok(filter) => {
                    state.table_filter = filter;
                    println!(
                        "{}: {}\n",
                        ui_text(TextId::TableFilterLabel, state.language),
                        table_filter_display_name(filter, state.language)
                    );
                }
                Err(e) => println!("{}\n", e),
            },
            ("/domain", value) => match value.parse::<DomainFilter>() {
                Ok(filter) => {
                    state.domain_filter = filter;
                    println!(
                        "{}: {}\n",
                        ui_text(TextId::DomainFilterLabel, state.language),
                        domain_filter_display_name(filter, state.language)
                    );
                }
                Err(e) => println!("{}\n", e),
            },
            ("/help", _) => print_help(state.language),
            ("/examples", _) => {
                for question in example_questions(state.language) {
                    println!("- {}", question);
                }
                println!();
            }
            ("/chart", _) => match engine.chart_for_conversation(&state, snapshot) {
                Some(spec) => print_chart(&spec),
                None => println!("{}\n", ui_text(TextId::NoChart, state.language)),
            },
            _ => {
                if let Some(response) = engine.chat(&mut state, input, snapshot).await {
                    println!("{}\n", response.formatted_text);
                }
            }
        }
    }

    Ok(())
}

fn print_help(language: Language) {
    println!("{}", ui_text(TextId::ChatPlaceholder, language));
    for (command, label) in chat_commands(language) {
        println!("  {:<20} {}", command, label);
    }
    println!();
}

fn print_chart(spec: &ChartSpec) {
    println!("{} ({})", spec.title, spec.kind);
    println!("{} / {}", spec.x_label, spec.y_label);
    for point in &spec.points {
        match &point.series {
            Some(series) => println!("  {} [{}]: {:.2}", point.x, series, point.y),
            None => println!("  {}: {:.2}", point.x, point.y),
        }
    }
    println!();
}
