use secrecy::SecretString;

use crate::providers::openai::{DEFAULT_BASE_URL, DEFAULT_MODEL};

pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const BASE_URL_VAR: &str = "OPENAI_BASE_URL";

/// Runtime settings for the OpenAI provider.
///
/// The key is not validated here. A missing key only shows up when the
/// upstream rejects the call.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
}

impl Config {
    /// Read settings from the process environment. Call `dotenvy::dotenv()`
    /// first if a `.env` file should contribute.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let api_key = lookup(API_KEY_VAR)
            .filter(|key| !key.is_empty())
            .map(SecretString::from);
        let base_url = lookup(BASE_URL_VAR)
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());

        Self {
            api_key,
            base_url,
            model: DEFAULT_MODEL.to_owned(),
        }
    }
}
