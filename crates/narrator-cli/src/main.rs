//! Narrator CLI - narrate long documents with Google Cloud Text-to-Speech

use anyhow::{bail, Context};
use clap::Parser;
use std::io::IsTerminal;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod progress;
mod settings;

use cli::Cli;
use narrator_core::Narrator;
use progress::SynthesisProgress;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log);

    let settings = settings::load_settings(&cli).context("Failed to load configuration")?;
    if cli.print_config {
        print!("{}", settings::render_toml(&settings)?);
        return Ok(());
    }
    debug!("Configuration: {:?}", settings);

    let document = read_document(&cli).await?;
    info!("Narrating into {:?}", cli.output);

    let progress = Arc::new(if cli.log || cli.json {
        SynthesisProgress::hidden()
    } else {
        SynthesisProgress::new()
    });
    let narrator = Narrator::with_defaults(settings)?.with_observer(progress.clone());

    let result = narrator.narrate(&document, &cli.output).await;
    progress.finish();
    let narration = result.map_err(|e| {
        let stage = e.stage();
        anyhow::Error::new(e).context(format!("Narration failed during {stage}"))
    })?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&narration)?);
    } else if !cli.log {
        for entry in narration.toc.iter().filter(|entry| entry.title.is_some()) {
            println!("{}", entry);
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let fallback = if verbose {
        "narrator=debug,narrator_core=debug"
    } else {
        "narrator=info,narrator_core=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// The document comes from `--text`, else the positional argument, else
/// piped stdin.
async fn read_document(cli: &Cli) -> anyhow::Result<String> {
    if let Some(path) = &cli.text {
        return tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {:?}", path));
    }
    if let Some(text) = &cli.input {
        return Ok(text.clone());
    }

    if std::io::stdin().is_terminal() {
        bail!("No input: pass the text as an argument, use --text <file>, or pipe it on stdin");
    }
    let mut text = String::new();
    tokio::io::stdin()
        .read_to_string(&mut text)
        .await
        .context("Failed to read stdin")?;
    Ok(text)
}
