use std::path::PathBuf;

/// Where the question bank lives unless `QUIZ_BANK_DIR` says otherwise
pub const DEFAULT_BANK_DIR: &str = "DATA";

/// Settings read from the environment (and `.env`, loaded in `main`).
/// The bot token itself is read by `Bot::from_env` from `TELOXIDE_TOKEN`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bank_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let bank_dir = lookup("QUIZ_BANK_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BANK_DIR.to_string());
        Self {
            bank_dir: PathBuf::from(bank_dir),
        }
    }
}
