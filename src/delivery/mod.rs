pub mod client;
pub mod template;

pub use client::{DeliveryClient, DeliveryError, DeliveryResult, OutboundEmail};
pub use template::{RenderedEmail, render_error_notice, render_feedback};
