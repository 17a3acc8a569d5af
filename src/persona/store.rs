use super::types::{EmailConfig, Persona};
use crate::error::PersonaError;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;

/// Durable persona lookup. Read-only from the pipeline's perspective;
/// writes happen out-of-band through administrative tooling.
pub trait PersonaStore: Send + Sync {
    fn lookup_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<Persona>, PersonaError>> + Send;

    fn lookup_by_id(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<Persona>, PersonaError>> + Send;
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS personas (
    persona_id    TEXT PRIMARY KEY,
    email_address TEXT NOT NULL UNIQUE,
    name          TEXT NOT NULL,
    system_prompt TEXT NOT NULL,
    focus_areas   TEXT NOT NULL,
    tone          TEXT NOT NULL,
    primary_color TEXT NOT NULL,
    header_text   TEXT NOT NULL,
    is_active     INTEGER NOT NULL DEFAULT 1,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_personas_email ON personas(email_address);
";

const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert email marketing analyst specializing in \
retail e-commerce campaigns. Analyze the campaign provided and give detailed, actionable \
feedback: identify the lifecycle stage, score the subject line, body, and call-to-action out \
of ten, flag technical and compliance issues, estimate conversion impact, and close with \
numbered recommendations and transferable lessons.";

/// SQLite-backed store. Opens (creating on first run), migrates the schema,
/// and seeds the default persona so a fresh database can always resolve.
#[derive(Clone)]
pub struct SqlitePersonaStore {
    pool: SqlitePool,
}

impl SqlitePersonaStore {
    pub async fn open(path: &Path, default_persona_id: &str) -> Result<Self, PersonaError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        for statement in SCHEMA.split(';').filter(|s| !s.trim().is_empty()) {
            sqlx::query(statement).execute(&pool).await?;
        }

        let store = Self { pool };
        store.seed_default(default_persona_id).await?;
        Ok(store)
    }

    async fn seed_default(&self, default_persona_id: &str) -> Result<(), PersonaError> {
        if self.lookup_by_id(default_persona_id).await?.is_some() {
            return Ok(());
        }

        let now = Utc::now();
        let persona = Persona {
            persona_id: default_persona_id.to_string(),
            email_address: "feedback@mailsage.dev".into(),
            name: "Marketing Analyst".into(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            focus_areas: vec![
                "subject lines".into(),
                "call to action".into(),
                "conversion impact".into(),
            ],
            tone: "direct".into(),
            email_config: EmailConfig::default(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        persona.validate().map_err(PersonaError::Store)?;
        self.insert(&persona).await?;
        tracing::info!(persona_id = default_persona_id, "seeded default persona");
        Ok(())
    }

    /// Administrative write path; the pipeline itself never calls this.
    pub async fn insert(&self, persona: &Persona) -> Result<(), PersonaError> {
        let focus_areas = serde_json::to_string(&persona.focus_areas)
            .map_err(|e| PersonaError::Store(e.to_string()))?;
        sqlx::query(
            "INSERT OR REPLACE INTO personas \
             (persona_id, email_address, name, system_prompt, focus_areas, tone, \
              primary_color, header_text, is_active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&persona.persona_id)
        .bind(&persona.email_address)
        .bind(&persona.name)
        .bind(&persona.system_prompt)
        .bind(&focus_areas)
        .bind(&persona.tone)
        .bind(&persona.email_config.primary_color)
        .bind(&persona.email_config.header_text)
        .bind(persona.is_active)
        .bind(persona.created_at)
        .bind(persona.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch_one(
        &self,
        column: &str,
        value: &str,
    ) -> Result<Option<Persona>, PersonaError> {
        let query = format!(
            "SELECT persona_id, email_address, name, system_prompt, focus_areas, tone, \
             primary_color, header_text, is_active, created_at, updated_at \
             FROM personas WHERE {column} = ? AND is_active = 1"
        );
        let row = sqlx::query(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_persona).transpose()
    }
}

fn row_to_persona(row: sqlx::sqlite::SqliteRow) -> Result<Persona, PersonaError> {
    let focus_areas: String = row.get("focus_areas");
    let focus_areas: Vec<String> =
        serde_json::from_str(&focus_areas).map_err(|e| PersonaError::Store(e.to_string()))?;
    let created_at: DateTime<Utc> = row.get("created_at");
    let updated_at: DateTime<Utc> = row.get("updated_at");

    Ok(Persona {
        persona_id: row.get("persona_id"),
        email_address: row.get("email_address"),
        name: row.get("name"),
        system_prompt: row.get("system_prompt"),
        focus_areas,
        tone: row.get("tone"),
        email_config: EmailConfig {
            primary_color: row.get("primary_color"),
            header_text: row.get("header_text"),
        },
        is_active: row.get("is_active"),
        created_at,
        updated_at,
    })
}

impl PersonaStore for SqlitePersonaStore {
    async fn lookup_by_email(&self, email: &str) -> Result<Option<Persona>, PersonaError> {
        self.fetch_one("email_address", email).await
    }

    async fn lookup_by_id(&self, id: &str) -> Result<Option<Persona>, PersonaError> {
        self.fetch_one("persona_id", id).await
    }
}
