pub mod client;
pub mod config;
pub mod error;
pub mod forum;
pub mod orchestrator;
pub mod types;
pub mod utils;

#[cfg(test)]
mod testing;

pub use client::{RawResponse, SpoofedClient, Transport};
pub use error::{AuthError, ConfigError, RequestError, TransportError};
pub use forum::Forum;
pub use orchestrator::{AutoLiker, DelayRange, LikePlan, Pacer, TokioPacer};
pub use types::{
    BrowseReport, CredentialBundle, Credentials, LikeOutcome, LikeResult, RunSummary, TopicRecord,
    UserProfile, ValidationReport,
};
