//! Language configuration for staging and running submissions

use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use serde::Deserialize;

use crate::error::{JudgeError, Result};

/// Configuration for a supported interpreter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageConfig {
    /// Canonical language name (e.g., "python")
    pub name: String,
    /// Name of the staged source file (e.g., "main.py")
    pub source_file: String,
    /// Run command (program followed by its arguments)
    pub run_command: Vec<String>,
    /// Extra environment variables for the child process
    pub env: Vec<(String, String)>,
}

impl LanguageConfig {
    /// Program to spawn, or an error if the command is empty
    pub fn program(&self) -> Result<&str> {
        self.run_command
            .first()
            .map(String::as_str)
            .ok_or_else(|| JudgeError::EmptyCommand(self.name.clone()))
    }

    /// Arguments following the program
    pub fn args(&self) -> &[String] {
        self.run_command.get(1..).unwrap_or_default()
    }
}

/// Raw TOML configuration for a language
#[derive(Debug, Deserialize)]
struct RawLanguageConfig {
    source_file: String,
    run_command: String,
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default)]
    aliases: Vec<String>,
}

/// Global language configurations
static LANGUAGES: OnceLock<HashMap<String, LanguageConfig>> = OnceLock::new();

const BUILTIN_LANGUAGES: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/files/languages.toml"));

/// Initialize language configurations from the embedded TOML table.
///
/// Calling this more than once is a no-op.
pub fn init_languages() -> anyhow::Result<()> {
    if LANGUAGES.get().is_some() {
        return Ok(());
    }

    let languages = parse_languages(BUILTIN_LANGUAGES)?;
    // A concurrent initializer may have won; both parsed the same table.
    let _ = LANGUAGES.set(languages);
    Ok(())
}

fn parse_languages(content: &str) -> anyhow::Result<HashMap<String, LanguageConfig>> {
    let raw_configs: HashMap<String, RawLanguageConfig> = toml::from_str(content)?;

    let mut languages = HashMap::new();

    for (name, raw) in raw_configs {
        let run_command = into_command(&raw.run_command);
        if run_command.is_empty() {
            anyhow::bail!("Empty run_command for {}", name);
        }

        let config = LanguageConfig {
            name: name.to_lowercase(),
            source_file: raw.source_file,
            run_command,
            env: raw.env.into_iter().collect(),
        };

        languages.insert(name.to_lowercase(), config.clone());

        for alias in raw.aliases {
            languages.insert(alias.to_lowercase(), config.clone());
        }
    }

    Ok(languages)
}

/// Get language configuration by language name or alias
pub fn get_language_config(language: &str) -> Option<LanguageConfig> {
    LANGUAGES.get()?.get(&language.to_lowercase()).cloned()
}

/// Like [`get_language_config`], but reports unknown languages as an error
pub fn require_language(language: &str) -> Result<LanguageConfig> {
    get_language_config(language).ok_or_else(|| JudgeError::UnsupportedLanguage(language.to_string()))
}

/// Get all supported language names (including aliases)
pub fn get_supported_languages() -> Vec<String> {
    let mut names: Vec<String> = LANGUAGES
        .get()
        .map(|langs| langs.keys().cloned().collect())
        .unwrap_or_default();
    names.sort();
    names
}

fn into_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(|s| s.to_string()).collect()
}
