pub mod client;
pub mod request;

pub use client::{AnalysisClient, AnalysisResult};
pub use request::{AnalysisRequest, ContentItem, RequestConfig, build};
