pub mod cache;
pub mod resolver;
pub mod store;
pub mod types;

pub use cache::PersonaCache;
pub use resolver::PersonaResolver;
pub use store::{PersonaStore, SqlitePersonaStore};
pub use types::{EmailConfig, Persona};
