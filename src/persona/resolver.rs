use super::cache::PersonaCache;
use super::store::PersonaStore;
use super::types::Persona;
use crate::error::PersonaError;
use std::sync::Arc;
use std::time::Duration;

/// Maps a recipient address to its governing persona.
///
/// Resolution never fails for unknown addresses: those fall back to the
/// default persona, which is cached under the requested address so repeat
/// traffic to an unknown alias stops hitting the durable store. Only a
/// missing default persona errors, and that is a service misconfiguration.
pub struct PersonaResolver<S: PersonaStore> {
    store: S,
    cache: Arc<PersonaCache>,
    default_id: String,
    store_timeout: Duration,
}

impl<S: PersonaStore> PersonaResolver<S> {
    pub fn new(
        store: S,
        cache: Arc<PersonaCache>,
        default_id: impl Into<String>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            default_id: default_id.into(),
            store_timeout,
        }
    }

    pub fn default_id(&self) -> &str {
        &self.default_id
    }

    pub async fn resolve(&self, recipient: &str) -> Result<Persona, PersonaError> {
        let key = normalize_address(recipient);

        if let Some(persona) = self.cache.get(&key) {
            return Ok(persona);
        }

        if let Some(persona) = self.lookup_by_email(&key).await? {
            self.cache.insert(key, persona.clone());
            return Ok(persona);
        }

        // Unknown recipient: fall back to the default persona and cache it
        // under the requested address too.
        tracing::warn!(
            recipient_len = key.len(),
            default_id = %self.default_id,
            "no persona for recipient, falling back to default"
        );
        let persona = self
            .lookup_default()
            .await?
            .ok_or_else(|| PersonaError::NoPersonaFound {
                default_id: self.default_id.clone(),
            })?;
        self.cache.insert(key, persona.clone());
        Ok(persona)
    }

    async fn lookup_by_email(&self, email: &str) -> Result<Option<Persona>, PersonaError> {
        tokio::time::timeout(self.store_timeout, self.store.lookup_by_email(email))
            .await
            .map_err(|_| PersonaError::Store("lookup_by_email timed out".into()))?
    }

    async fn lookup_default(&self) -> Result<Option<Persona>, PersonaError> {
        tokio::time::timeout(self.store_timeout, self.store.lookup_by_id(&self.default_id))
            .await
            .map_err(|_| PersonaError::Store("lookup_by_id timed out".into()))?
    }
}

/// Case-fold and trim; the routing key is an email address and addresses
/// compare case-insensitively here.
fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}
