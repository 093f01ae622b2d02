use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use dialoguer::{Input, Select};
use lectern_core::bootstrap::{AppBuilder, resolve_config_path};
use lectern_core::{Orchestrator, Reply};
use lectern_llm::{EmbeddingModel, InferenceProvider};
use lectern_memory::document::Chunk;

#[derive(Parser, Debug)]
#[command(
    name = "lectern",
    version,
    about = "Ask questions about a research paper, answered from its own text"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract and split a document, then print its chunks
    Chunk {
        file: PathBuf,

        /// Print full chunk text instead of a one-line preview
        #[arg(long, default_value_t = false)]
        full: bool,
    },
    /// Answer a single question about a document
    Ask {
        file: PathBuf,

        /// Embedding model; defaults to `embedding.model` from the config
        #[arg(long, short)]
        model: Option<String>,

        question: String,
    },
    /// Pick an embedding model, then ask questions until `exit`
    Chat { file: PathBuf },
}

const PREVIEW_CHARS: usize = 80;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_subscriber();

    let config_path = resolve_config_path(cli.config.as_deref());
    let app = AppBuilder::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    tracing::debug!(path = %app.config_path().display(), "configuration loaded");

    let mut orchestrator = app.build_orchestrator()?;

    match cli.command {
        Command::Chunk { file, full } => {
            upload(&mut orchestrator, &file).await?;
            if let Some(session) = orchestrator.session() {
                print_chunks(&session.chunks, full);
            }
        }
        Command::Ask {
            file,
            model,
            question,
        } => {
            let model = match model {
                Some(name) => name,
                None => app.config().embedding_model()?.as_str().to_owned(),
            };
            upload(&mut orchestrator, &file).await?;
            prepare_index(&mut orchestrator, &model).await?;
            let reply = orchestrator.ask(&question).await;
            println!("{reply}");
            if reply.is_failure() {
                bail!("question could not be answered");
            }
        }
        Command::Chat { file } => {
            upload(&mut orchestrator, &file).await?;
            chat(&mut orchestrator, app.config().embedding_model()?).await?;
        }
    }

    Ok(())
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

fn ensure_ok(reply: &Reply) -> anyhow::Result<()> {
    if reply.is_failure() {
        bail!("{reply}");
    }
    Ok(())
}

async fn upload<P: InferenceProvider>(
    orchestrator: &mut Orchestrator<P>,
    file: &Path,
) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let file_name = file
        .file_name()
        .map_or_else(|| file.display().to_string(), |n| n.to_string_lossy().into_owned());

    let reply = orchestrator.upload(&file_name, &bytes).await;
    println!("{reply}");
    ensure_ok(&reply)
}

async fn prepare_index<P: InferenceProvider>(
    orchestrator: &mut Orchestrator<P>,
    model: &str,
) -> anyhow::Result<()> {
    let reply = orchestrator.select_embedder(model);
    println!("{reply}");
    ensure_ok(&reply)?;

    let reply = orchestrator.build_index().await;
    println!("{reply}");
    ensure_ok(&reply)
}

async fn chat<P: InferenceProvider>(
    orchestrator: &mut Orchestrator<P>,
    default_model: EmbeddingModel,
) -> anyhow::Result<()> {
    let names = EmbeddingModel::ALL.map(EmbeddingModel::as_str);
    let default = EmbeddingModel::ALL
        .iter()
        .position(|m| *m == default_model)
        .unwrap_or(0);

    let selection = Select::new()
        .with_prompt("Embedding model")
        .items(names)
        .default(default)
        .interact()?;
    prepare_index(orchestrator, names[selection]).await?;

    loop {
        let question: String = Input::new()
            .with_prompt("Question (empty or `exit` to quit)")
            .allow_empty(true)
            .interact_text()?;
        let question = question.trim();
        if is_exit(question) {
            break;
        }
        // Failed questions keep the session open.
        println!("{}", orchestrator.ask(question).await);
    }

    Ok(())
}

fn is_exit(input: &str) -> bool {
    input.is_empty() || input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn print_chunks(chunks: &[Chunk], full: bool) {
    for chunk in chunks {
        let page = chunk
            .metadata
            .page
            .map_or_else(|| "-".to_owned(), |p| p.to_string());
        if full {
            println!("--- chunk {} (page {page}) ---\n{}", chunk.chunk_index, chunk.content);
        } else {
            println!("[{:>4}] p{page:<3} {}", chunk.chunk_index, preview(&chunk.content));
        }
    }
}

fn preview(text: &str) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect();
    if flat.chars().count() <= PREVIEW_CHARS {
        return flat;
    }
    let mut cut: String = flat.chars().take(PREVIEW_CHARS).collect();
    cut.push_str("...");
    cut
}
