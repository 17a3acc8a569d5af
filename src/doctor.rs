//! Self-check for a deployed instance: config, persona store, and the
//! default-persona invariant the resolver depends on.

use crate::config::Config;
use crate::persona::{PersonaStore, SqlitePersonaStore};
use anyhow::{Context, Result, bail};
use std::path::Path;

pub async fn run(config: &Config) -> Result<()> {
    println!("mailsage doctor");
    println!("  config: {}", config.config_path.display());

    config.validate().context("config validation")?;
    println!("  config validation: ok");

    let store = SqlitePersonaStore::open(
        Path::new(&config.persona.database_path),
        &config.persona.default_persona_id,
    )
    .await
    .context("opening persona store")?;
    println!("  persona store: ok ({})", config.persona.database_path);

    let default_id = &config.persona.default_persona_id;
    match store.lookup_by_id(default_id).await? {
        Some(persona) => println!("  default persona: ok ({} — {})", default_id, persona.name),
        None => bail!("default persona {default_id} missing: service cannot resolve requests"),
    }

    if config.analysis.api_key.is_none() {
        println!("  analysis api key: not set (ok for unauthenticated endpoints)");
    }
    if config.delivery.api_key.is_none() {
        println!("  delivery api key: NOT SET — outbound email will be rejected");
    }

    println!("all checks passed");
    Ok(())
}
