pub mod auth;
pub mod client;
pub mod error;
pub mod models;

pub use auth::{StaticToken, TokenSource};
pub use client::RulesClient;
pub use error::{Result, RulesApiError, ERROR_CODE};
pub use models::{release_name, PageOfRulesets, Release, RulesetFile, RulesetSource};
