//! Client modules for external API interactions

pub mod summary_client;

pub use summary_client::{Summarizer, SummaryClient};
