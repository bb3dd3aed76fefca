use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ddoksori_chat::config::Config;
use ddoksori_chat::conversation::ChatSession;
use ddoksori_chat::models::SearchRequest;
use ddoksori_chat::presentation::format_case;
use ddoksori_chat::repl;
use ddoksori_chat::transport::{CaseLookup, HttpTransport};

#[derive(Parser)]
#[command(name = "ddoksori", version, about = "소비자 분쟁 상담 챗봇 터미널 클라이언트")]
struct Cli {
    /// Path to the JSON config file (default: ddoksori.json)
    #[arg(long, short, global = true, default_value = "")]
    config: String,

    /// Backend base URL, overrides `api_base_url`
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Number of chunks to retrieve per question
    #[arg(long, global = true)]
    top_k: Option<usize>,

    /// Restrict retrieval to a chunk type (repeatable)
    #[arg(long = "chunk-type", global = true)]
    chunk_types: Vec<String>,

    /// Restrict retrieval to an agency (repeatable)
    #[arg(long = "agency", global = true)]
    agencies: Vec<String>,

    /// Print answers at once instead of typing them out
    #[arg(long, global = true)]
    no_stream: bool,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive chat (default)
    Chat,
    /// Ask a single question and exit
    Ask {
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Check backend health
    Health,
    /// Retrieve matching chunks without generating an answer
    Search {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Print every chunk of one case document (a source's doc_id)
    Case { case_uid: String },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

impl Cli {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(url) = &self.api_url {
            config.api_base_url = url.clone();
        }
        if let Some(top_k) = self.top_k {
            config.top_k = top_k;
        }
        if !self.chunk_types.is_empty() {
            config.chunk_types = Some(self.chunk_types.clone());
        }
        if !self.agencies.is_empty() {
            config.agencies = Some(self.agencies.clone());
        }
        if self.no_stream {
            config.streaming.enabled = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // 1. Load config
    let mut config = Config::load(&cli.config)?;
    cli.apply_overrides(&mut config);
    config.validate().context("invalid configuration")?;

    // 2. Init transport
    let transport = HttpTransport::new(&config.api_base_url, config.request_timeout())
        .context("failed to create HTTP client")?;
    info!("Backend: {}", transport.base_url());

    let streaming = config
        .streaming
        .enabled
        .then(|| config.streaming_options());

    // 3. Dispatch
    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => {
            let mut session = ChatSession::new(transport, config.request_options());
            let input = repl::spawn_stdin_lines();
            tokio::select! {
                res = repl::run(&mut session, streaming, input) => res?,
                _ = tokio::signal::ctrl_c() => println!(),
            }
        }
        Command::Ask { question } => {
            let mut session = ChatSession::new(transport, config.request_options());
            repl::ask(&mut session, &question.join(" "), streaming).await?;
        }
        Command::Health => {
            let health = transport
                .health_check()
                .await
                .context("health check failed")?;
            println!(
                "status: {}\ndatabase: {}",
                health.status,
                health.database.as_deref().unwrap_or("-")
            );
            if let Some(error) = &health.error {
                println!("error: {error}");
            }
            anyhow::ensure!(health.is_healthy(), "backend is {}", health.status);
        }
        Command::Search { query } => {
            let request = SearchRequest {
                query: query.join(" "),
                top_k: Some(config.top_k),
                chunk_types: config.chunk_types.clone(),
                agencies: config.agencies.clone(),
            };
            let response = transport.search(&request).await.context("search failed")?;
            println!("{} results for {:?}", response.results_count, response.query);
            for result in &response.results {
                println!("{}", serde_json::to_string_pretty(result)?);
            }
        }
        Command::Case { case_uid } => {
            let case = transport
                .get_case(&case_uid)
                .await
                .with_context(|| format!("case lookup failed for {case_uid}"))?;
            println!("{}", format_case(&case));
        }
    }

    Ok(())
}
