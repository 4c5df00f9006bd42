use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use pdfchat_azure::{AzureBackends, EnvSource};
use pdfchat_cli::{ChatShell, format_sources, print_answer, print_success};
use pdfchat_core::Backends;
use pdfchat_rag::{
    DEFAULT_EVAL_DATA, DEFAULT_EVAL_OUTPUT, DEFAULT_PRODUCTS_CSV, DEFAULT_SEARCH_TOP,
    EvaluationRunner, GroundednessEvaluator, KnowledgeBase, ProductLoader, PromptTemplate,
    read_dataset,
};

#[derive(Parser)]
#[command(name = "pdfchat")]
#[command(about = "Chat with your PDFs using Azure AI Search and Azure OpenAI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the web UI (default)
    Serve {
        /// Address to listen on [env: PDFCHAT_BIND]
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Log in with the configured service principal
    Login,
    /// Index a PDF, replacing the index
    Index {
        pdf: PathBuf,
        /// Target index [default: AISEARCH_INDEX_NAME]
        #[arg(long)]
        index_name: Option<String>,
    },
    /// Delete a search index
    DeleteIndex { name: String },
    /// List the indexes on the search service
    ListIndexes,
    /// Load the product catalog CSV into its own index
    LoadProducts {
        /// Target index [default: PRODUCT_INDEX_NAME]
        #[arg(long)]
        index_name: Option<String>,
        #[arg(long, default_value = DEFAULT_PRODUCTS_CSV)]
        csv_file: PathBuf,
    },
    /// Ask one question against the knowledge base
    Ask { question: String },
    /// Interactive chat in the terminal
    Chat,
    /// Score answer groundedness over a JSONL dataset
    Evaluate {
        #[arg(long, default_value = DEFAULT_EVAL_DATA)]
        data: PathBuf,
        #[arg(long, default_value = DEFAULT_EVAL_OUTPUT)]
        output: PathBuf,
        #[arg(long, default_value_t = 1)]
        concurrency: usize,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Knowledge base over the Azure backends, honoring the prompt and search settings
fn knowledge_base(backends: Arc<AzureBackends>) -> Result<KnowledgeBase> {
    let env = backends.env().clone();
    let top = env.parse_or("SEARCH_TOP", DEFAULT_SEARCH_TOP)?;

    let mut kb = KnowledgeBase::new(backends)?.with_search_top(top);
    if let Some(path) = env.get("PDFCHAT_PROMPT_TEMPLATE") {
        let prompt = PromptTemplate::from_prompty(Path::new(&path))
            .with_context(|| format!("loading prompt template {}", path))?;
        kb = kb.with_prompt(prompt);
    }
    Ok(kb)
}

#[tokio::main]
async fn main() -> Result<()> {
    let env = EnvSource::process();
    init_tracing();
    let cli = Cli::parse();

    let backends = Arc::new(AzureBackends::new(env.clone()));

    match cli.command.unwrap_or(Command::Serve { bind: None }) {
        Command::Serve { bind } => {
            let bind = match bind {
                Some(bind) => bind,
                None => env
                    .get_or("PDFCHAT_BIND", pdfchat_web::DEFAULT_BIND)
                    .parse()
                    .context("PDFCHAT_BIND is not a valid socket address")?,
            };
            let kb = Arc::new(knowledge_base(backends)?);
            println!("{} Serving pdfchat on http://{}", "🌐".blue(), bind);
            pdfchat_web::serve(bind, kb).await?;
        }
        Command::Login => {
            let token = knowledge_base(backends)?.authenticate().await?;
            print_success(&format!(
                "Logged in, token valid until {}",
                token.expires_at.format("%Y-%m-%d %H:%M:%S UTC")
            ));
        }
        Command::Index { pdf, index_name } => {
            let index_name = match index_name {
                Some(name) => name,
                None => backends.index_name()?,
            };
            let record = knowledge_base(backends)?.index(&index_name, &pdf).await?;
            print_success(&format!(
                "Indexed '{}' into '{}' as document '{}'",
                pdf.display(),
                index_name,
                record.id
            ));
        }
        Command::DeleteIndex { name } => {
            knowledge_base(backends)?.delete(&name).await?;
            print_success(&format!("Deleted index '{}'", name));
        }
        Command::ListIndexes => {
            let names = knowledge_base(backends)?.list().await?;
            if names.is_empty() {
                println!("{}", "No indexes found.".dimmed());
            }
            for name in names {
                println!("{}", name);
            }
        }
        Command::LoadProducts {
            index_name,
            csv_file,
        } => {
            let index_name = match index_name {
                Some(name) => name,
                None => backends.product_index_name()?,
            };
            let count = ProductLoader::new(backends).load(&index_name, &csv_file).await?;
            print_success(&format!(
                "Uploaded {} products to '{}' index",
                count, index_name
            ));
        }
        Command::Ask { question } => {
            let index_name = backends.index_name()?;
            let answer = knowledge_base(backends)?.ask(&index_name, &question).await?;
            print_answer(&answer.message.content, &answer.grounding_data);
        }
        Command::Chat => {
            let mut shell = ChatShell::new(knowledge_base(backends)?);
            shell.run().await?;
        }
        Command::Evaluate {
            data,
            output,
            concurrency,
        } => {
            let index_name = backends.index_name()?;
            let evaluator = GroundednessEvaluator::new(backends.evaluation_model()?)?;
            let inputs = read_dataset(&data)?;
            let kb = Arc::new(knowledge_base(backends)?);

            let report = EvaluationRunner::new(kb, evaluator, index_name)
                .with_concurrency(concurrency)
                .run(inputs)
                .await;
            report.write_json(&output)?;

            println!("{}", "----- Summarized Metrics -----".bold());
            println!("{}", serde_json::to_string_pretty(&report.metrics)?);
            println!("{}", "----- Rows -----".bold());
            for row in &report.rows {
                match (row.groundedness, &row.error) {
                    (Some(score), _) => println!(
                        "{:>3}  {}  {}  {}",
                        row.line_number,
                        score.to_string().green(),
                        row.query,
                        format_sources(&row.context).dimmed()
                    ),
                    (None, error) => println!(
                        "{:>3}  {}  {}  {}",
                        row.line_number,
                        "-".red(),
                        row.query,
                        error.as_deref().unwrap_or("failed").red()
                    ),
                }
            }
            print_success(&format!("Evaluation results saved to {}", output.display()));
        }
    }

    Ok(())
}
