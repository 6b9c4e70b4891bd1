use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use colorbook::{
    export, GeminiConfig, GeminiGateway, GenerationRequest, PageStatus, Resolution, RunOutcome,
    SkipReason, Studio, StudioEvent,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "colorbook", version, about = "Generate printable AI coloring books for kids")]
struct Cli {
    /// Override the AI service root URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Give up on a single request after this many seconds (default: wait forever)
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Log requests and page transitions
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Draw a book and save it as <name>_Coloring_Book.pdf
    Generate {
        /// What the book is about
        #[arg(long)]
        theme: String,
        /// Name printed on the cover
        #[arg(long)]
        name: String,
        /// Image size: 1K or 2K
        #[arg(long, default_value = "1K")]
        resolution: Resolution,
        /// Directory the PDF is written to
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Ask the assistant a question, or chat interactively when none is given
    Chat { question: Option<String> },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let mut config = GeminiConfig::from_env()?;
    if let Some(url) = cli.base_url {
        config = config.base_url(url);
    }
    if let Some(secs) = cli.timeout_secs {
        config = config.timeout(Duration::from_secs(secs));
    }
    let studio = Studio::new(Arc::new(GeminiGateway::new(config)?));

    match cli.command {
        Command::Generate { theme, name, resolution, out } => {
            generate(&studio, GenerationRequest { theme, child_name: name, resolution }, out).await
        }
        Command::Chat { question: Some(q) } => {
            if let Some(reply) = studio.send_chat_message(&q).await {
                println!("{}", reply.text);
            }
            Ok(())
        }
        Command::Chat { question: None } => chat_loop(&studio).await,
    }
}

async fn generate(studio: &Studio, request: GenerationRequest, out: PathBuf) -> anyhow::Result<()> {
    studio.set_request(request);
    studio.on_event(|event| match event {
        StudioEvent::Progress(msg) => println!("{}", msg),
        StudioEvent::PageUpdated { index, page } if page.status.is_terminal() => {
            let mark = if page.status == PageStatus::Done { "ok" } else { "failed" };
            println!("  [{}] page {}: {}", mark, index + 1, page.title);
        }
        _ => {}
    });

    match studio.start_generation().await {
        RunOutcome::Skipped(SkipReason::InvalidInput) => {
            bail!("theme must be longer than 2 characters and name longer than 1")
        }
        RunOutcome::Skipped(SkipReason::AlreadyRunning) => bail!("a book is already being drawn"),
        RunOutcome::Failed(reason) => bail!("could not come up with scenes: {}", reason),
        RunOutcome::Completed { done, failed } => {
            if done == 0 {
                log::warn!("no page could be drawn, the book only has a cover");
            }
            let st = studio.snapshot();
            let path = export::save_pdf(&out, &st.request.child_name, &st.request.theme, &st.pages)
                .with_context(|| format!("writing book to {}", out.display()))?;
            println!(
                "Saved {} ({} drawings, {} failed)",
                path.display(),
                st.finished_pages().count(),
                failed
            );
            Ok(())
        }
    }
}

async fn chat_loop(studio: &Studio) -> anyhow::Result<()> {
    println!("Ask me anything about drawing! (type 'exit' to leave)");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if matches!(line.trim(), "exit" | "quit") {
            break;
        }
        if let Some(reply) = studio.send_chat_message(&line).await {
            println!("bot> {}", reply.text);
        }
    }
    Ok(())
}
