mod chat;
mod command;

pub use chat::ChatCompletionsOracle;
pub use command::CommandOracle;

use std::fmt;
use std::str::FromStr;

use crate::config::Settings;
use crate::data::CodeOracle;
use crate::error::OracleError;

/// Named oracle backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    OpenAi,
    SiliconFlow,
    /// External program speaking JSON over stdin/stdout.
    Command,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::OpenAi => "openai",
            BackendKind::SiliconFlow => "siliconflow",
            BackendKind::Command => "command",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = OracleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(BackendKind::OpenAi),
            "siliconflow" => Ok(BackendKind::SiliconFlow),
            "command" => Ok(BackendKind::Command),
            other => Err(OracleError::NotConfigured(other.to_string())),
        }
    }
}

/// One configured oracle, whatever its transport.
pub enum OracleBackend {
    Chat(ChatCompletionsOracle),
    Command(CommandOracle),
    /// Stand-in for a backend that could not be built; every call fails.
    Unavailable(OracleError),
}

impl OracleBackend {
    /// Builds the backend `kind`, using `model` instead of the configured
    /// default model when given.
    pub fn build(kind: BackendKind, model: Option<&str>, settings: &Settings) -> Result<Self, OracleError> {
        match kind {
            BackendKind::OpenAi => Ok(OracleBackend::Chat(ChatCompletionsOracle::new(
                kind.as_str(),
                &settings.openai,
                model,
                settings.oracle_timeout,
            )?)),
            BackendKind::SiliconFlow => Ok(OracleBackend::Chat(ChatCompletionsOracle::new(
                kind.as_str(),
                &settings.siliconflow,
                model,
                settings.oracle_timeout,
            )?)),
            BackendKind::Command => {
                let command = settings
                    .oracle_command
                    .as_deref()
                    .ok_or_else(|| OracleError::NotConfigured(kind.to_string()))?;
                Ok(OracleBackend::Command(CommandOracle::from_command_line(
                    command,
                    model.unwrap_or_default(),
                    settings.oracle_timeout,
                )?))
            }
        }
    }

    /// Short description for progress output.
    pub fn describe(&self) -> String {
        match self {
            OracleBackend::Chat(oracle) => format!("{} ({})", oracle.name(), oracle.model()),
            OracleBackend::Command(oracle) => format!("command ({})", oracle.program()),
            OracleBackend::Unavailable(e) => format!("none ({})", e),
        }
    }
}

impl CodeOracle for OracleBackend {
    async fn generate(&self, prompt: &str) -> Result<String, OracleError> {
        match self {
            OracleBackend::Chat(oracle) => oracle.generate(prompt).await,
            OracleBackend::Command(oracle) => oracle.generate(prompt).await,
            OracleBackend::Unavailable(e) => Err(e.clone()),
        }
    }
}

/// Instruction sent as the system message to chat backends.
pub(crate) const SYSTEM_PROMPT: &str =
    "You are an expert Go engineer writing table-driven unit tests. Answer with Go code only.";
