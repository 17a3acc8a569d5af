use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Branding applied to the outbound feedback email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailConfig {
    pub primary_color: String,
    pub header_text: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            primary_color: "#1a73e8".into(),
            header_text: "Your Campaign Feedback".into(),
        }
    }
}

/// A named analysis profile selected by recipient address. Created and
/// updated by an administrative process; read-only inside the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub persona_id: String,
    /// Routing key, unique across personas.
    pub email_address: String,
    pub name: String,
    pub system_prompt: String,
    pub focus_areas: Vec<String>,
    pub tone: String,
    pub email_config: EmailConfig,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Persona {
    /// Admission rules enforced when personas are written or seeded.
    pub fn validate(&self) -> Result<(), String> {
        let prompt_chars = self.system_prompt.chars().count();
        if !(100..=5000).contains(&prompt_chars) {
            return Err(format!(
                "system_prompt must be 100-5000 chars, got {prompt_chars}"
            ));
        }
        if self.focus_areas.is_empty() || self.focus_areas.len() > 10 {
            return Err(format!(
                "focus_areas must hold 1-10 entries, got {}",
                self.focus_areas.len()
            ));
        }
        if self.email_address.trim().is_empty() {
            return Err("email_address must not be empty".into());
        }
        Ok(())
    }
}
