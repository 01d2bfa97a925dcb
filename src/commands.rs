use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;
use indicatif::ProgressBar;
use std::time::Duration;
use tracing::{error, info};

use crate::bootstrap::{BootstrapOutcome, ensure_collection};
use crate::config::Config;
use crate::openai::OpenAiClient;
use crate::qdrant::QdrantClient;
use crate::session::{Session, SessionManager, Turn};

/// Run the interactive chat loop
#[inline]
pub fn run_chat(verbose: bool) -> Result<()> {
    // Configuration must resolve before any provider call is attempted.
    let config = Config::resolve()?;

    let openai = OpenAiClient::new(&config.openai)?;
    let qdrant = QdrantClient::new(&config.qdrant)?;

    println!("{}", style("🧬 KIMIA Assess Chatbot").bold().cyan());
    println!();

    if verbose {
        run_startup_diagnostics(&qdrant, &config)?;
        println!();
    }

    let manager = SessionManager::new(
        openai,
        qdrant,
        config.qdrant.collection.clone(),
        config.qdrant.top_k,
    );
    let mut session = Session::new();

    println!("Ask me anything about KIMIA Assess. Empty input or 'exit' ends the session.");
    println!();

    loop {
        let input: String = Input::new()
            .with_prompt("You")
            .allow_empty(true)
            .interact_text()?;
        let question = input.trim();

        if question.is_empty()
            || question.eq_ignore_ascii_case("exit")
            || question.eq_ignore_ascii_case("quit")
        {
            break;
        }

        // One turn in flight at a time; input is blocked until it settles.
        let spinner = thinking_spinner();
        let result = manager.process_turn(question, &session);
        spinner.finish_and_clear();

        match result {
            Ok(turn) => {
                session.push(turn);
                print_transcript(&session);
                if let Some(latest) = session.turns().last() {
                    print_sources(latest);
                }
            }
            Err(e) => {
                // The failed turn leaves the session unchanged.
                error!("Turn failed: {}", e);
                println!("{}", style(format!("❌ {e}")).red());
                println!("The conversation is unchanged. You can resubmit your question.");
                println!();
            }
        }
    }

    info!("Chat session ended with {} turns", session.len());
    println!("Goodbye!");

    Ok(())
}

/// Check connectivity and the target collection, optionally creating and
/// seeding it
#[inline]
pub fn check_collection(create: bool) -> Result<()> {
    let config = Config::resolve()?;
    let qdrant = QdrantClient::new(&config.qdrant)?;

    println!("{}", style("🔍 Checking Qdrant connection...").bold());
    println!("URL: {}", config.qdrant.url);
    println!("Collection: {}", config.qdrant.collection);
    println!();

    let collections = qdrant
        .list_collections()
        .context("Failed to list collections")?;

    println!("📋 Existing collections ({}):", collections.len());
    for name in &collections {
        println!("  - {name}");
    }
    println!();

    let target = &config.qdrant.collection;
    if collections.iter().any(|name| name == target) {
        println!(
            "{}",
            style(format!("✅ Collection '{target}' already exists!")).green()
        );

        match qdrant.collection_info(target) {
            Ok(info) => {
                println!("📊 Status: {}", info.status);
                if let Some(count) = info.points_count {
                    println!("📊 Points: {count}");
                }
            }
            Err(e) => {
                println!(
                    "{}",
                    style(format!("⚠️  Could not fetch collection info: {e}")).yellow()
                );
            }
        }

        return Ok(());
    }

    println!(
        "{}",
        style(format!("❌ Collection '{target}' does not exist!")).red()
    );

    let similar: Vec<&String> = collections
        .iter()
        .filter(|name| {
            let lowered = name.to_lowercase();
            lowered.contains("kimia") || lowered.contains("assess")
        })
        .collect();
    if !similar.is_empty() {
        println!("💡 Similar collections found: {similar:?}");
    }

    if !create {
        println!("Run 'kimia-chat check --create' to create and seed it.");
        return Ok(());
    }

    println!("🔧 Creating collection...");
    let openai = OpenAiClient::new(&config.openai)?;

    match ensure_collection(&qdrant, &openai, &config.qdrant)? {
        BootstrapOutcome::Created { seeded_documents } => {
            println!(
                "{}",
                style(format!("✅ Collection '{target}' created successfully!")).green()
            );
            if seeded_documents > 0 {
                println!(
                    "{}",
                    style(format!(
                        "✅ Added {seeded_documents} sample documents to collection!"
                    ))
                    .green()
                );
            } else {
                println!(
                    "{}",
                    style("⚠️  Collection created but seeding failed; see logs.").yellow()
                );
            }
        }
        BootstrapOutcome::AlreadyExists => {
            // Raced with another bootstrap run; nothing left to do.
            println!(
                "{}",
                style(format!("✅ Collection '{target}' already exists!")).green()
            );
        }
    }

    Ok(())
}

fn run_startup_diagnostics(qdrant: &QdrantClient, config: &Config) -> Result<()> {
    println!("{}", style("🔍 Checking environment setup...").yellow());
    println!("{}", style("✅ Configuration resolved").green());

    let collections = qdrant
        .list_collections()
        .context("Failed to reach Qdrant")?;
    println!(
        "{}",
        style(format!("✅ Qdrant reachable ({} collections)", collections.len())).green()
    );

    if collections.iter().any(|c| c == &config.qdrant.collection) {
        println!(
            "{}",
            style(format!(
                "✅ Collection '{}' found",
                config.qdrant.collection
            ))
            .green()
        );
    } else {
        println!(
            "{}",
            style(format!(
                "⚠️  Collection '{}' not found. Run 'kimia-chat check --create' first.",
                config.qdrant.collection
            ))
            .yellow()
        );
    }

    Ok(())
}

fn thinking_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_message("Thinking...");
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Print the transcript most recent first.
fn print_transcript(session: &Session) {
    println!();
    for turn in session.turns().iter().rev() {
        println!("{} {}", style("You:").bold(), turn.question);
        println!("{} {}", style("Bot:").bold().green(), turn.answer);
        println!("{}", style("---").dim());
    }
}

fn print_sources(turn: &Turn) {
    println!("{}", style("📚 Source Documents").bold());
    for source in &turn.sources {
        println!("  {} {}", style("From:").bold(), source.origin);
        println!("  {}", source.snippet);
        println!("  {}", style("---").dim());
    }
    println!();
}
