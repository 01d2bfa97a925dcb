use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Password};

use super::{Config, KeyResolver, OPENAI_API_KEY, QDRANT_API_KEY, QDRANT_URL, save_secrets};

/// Prompt for the provider secrets and write them to the secrets file.
#[inline]
pub fn run_interactive_config() -> Result<()> {
    println!("{}", style("🔧 KIMIA Chat Configuration Setup").bold().cyan());
    println!();

    let config_dir = Config::config_dir().context("Failed to determine config directory")?;
    let resolver = KeyResolver::from_dir(&config_dir).context("Failed to read secrets file")?;

    println!("{}", style("Provider Secrets").bold().yellow());
    println!("Configure the OpenAI and Qdrant credentials used for retrieval and generation.");
    println!();

    let openai_api_key = prompt_secret("OpenAI API key", resolver.get(OPENAI_API_KEY))?;

    let qdrant_url: String = Input::new()
        .with_prompt("Qdrant URL")
        .default(
            resolver
                .get(QDRANT_URL)
                .unwrap_or_else(|| "http://localhost:6333".to_string()),
        )
        .validate_with(|input: &String| -> Result<(), &str> {
            if url::Url::parse(input).is_ok() {
                Ok(())
            } else {
                Err("Must be a valid URL, e.g. https://my-cluster.qdrant.io:6333")
            }
        })
        .interact_text()?;

    let qdrant_api_key = prompt_secret("Qdrant API key", resolver.get(QDRANT_API_KEY))?;

    println!();
    println!("{}", style("Testing Qdrant connection...").yellow());

    if test_qdrant_connection(&qdrant_url, &qdrant_api_key) {
        println!("{}", style("✓ Qdrant connection successful!").green());
    } else {
        println!(
            "{}",
            style("⚠ Warning: Could not connect to Qdrant").yellow()
        );
        println!("You can continue, but make sure Qdrant is reachable before chatting.");
    }

    println!();
    if Confirm::new()
        .with_prompt("Save secrets?")
        .default(true)
        .interact()?
    {
        let path = save_secrets(&config_dir, &openai_api_key, &qdrant_url, &qdrant_api_key)
            .context("Failed to save secrets")?;
        println!("{}", style("✓ Secrets saved successfully!").green());
        println!("Secrets saved to: {}", style(path.display()).cyan());
    } else {
        println!("Secrets not saved.");
    }

    Ok(())
}

/// Print the resolved configuration with secrets masked.
#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::resolve().context("Failed to resolve configuration")?;

    println!("{}", style("📋 Current Configuration").bold().cyan());
    println!();

    println!("{}", style("OpenAI Settings:").bold().yellow());
    println!(
        "  API Key: {}",
        style(mask_secret(&config.openai.api_key)).cyan()
    );
    println!("  Chat Model: {}", style(&config.openai.chat_model).cyan());
    println!(
        "  Embedding Model: {}",
        style(&config.openai.embedding_model).cyan()
    );
    println!(
        "  Temperature: {}",
        style(config.openai.temperature).cyan()
    );

    println!();
    println!("{}", style("Qdrant Settings:").bold().yellow());
    println!("  URL: {}", style(&config.qdrant.url).cyan());
    println!(
        "  API Key: {}",
        style(mask_secret(&config.qdrant.api_key)).cyan()
    );
    println!("  Collection: {}", style(&config.qdrant.collection).cyan());
    println!("  Top K: {}", style(config.qdrant.top_k).cyan());
    println!(
        "  Vector Dimension: {}",
        style(config.qdrant.vector_dimension).cyan()
    );

    let settings_path = Config::settings_file_path().context("Failed to get settings path")?;
    let secrets_path = Config::secrets_file_path().context("Failed to get secrets path")?;
    println!();
    println!("Settings file: {}", style(settings_path.display()).dim());
    println!("Secrets file: {}", style(secrets_path.display()).dim());

    Ok(())
}

fn prompt_secret(prompt: &str, existing: Option<String>) -> Result<String> {
    if let Some(current) = existing {
        let keep = Confirm::new()
            .with_prompt(format!(
                "{} is already set ({}). Keep it?",
                prompt,
                mask_secret(&current)
            ))
            .default(true)
            .interact()?;
        if keep {
            return Ok(current);
        }
    }

    let value = Password::new()
        .with_prompt(prompt)
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Value cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact()?;

    Ok(value)
}

fn test_qdrant_connection(url: &str, api_key: &str) -> bool {
    let Ok(base) = url::Url::parse(url) else {
        return false;
    };
    let Ok(target) = base.join("/collections") else {
        return false;
    };

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    agent
        .get(target.as_str())
        .header("api-key", api_key)
        .call()
        .is_ok()
}

/// Mask a secret for display, keeping only the last four characters.
pub(crate) fn mask_secret(secret: &str) -> String {
    let count = secret.chars().count();
    if count <= 4 {
        return "***".to_string();
    }
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("***{}", tail)
}
