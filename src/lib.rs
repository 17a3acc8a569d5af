#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation,
    clippy::return_self_not_must_use
)]

pub mod analysis;
pub mod config;
pub mod content;
pub mod delivery;
pub mod doctor;
pub mod error;
pub mod gateway;
pub mod http;
pub mod persona;

pub use config::Config;
pub use error::{AnalysisError, ContentError, MailsageError, PersonaError, Result};
