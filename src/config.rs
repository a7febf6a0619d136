use std::time::Duration;
use tracing::warn;

use crate::contexts::ScaffoldTemplate;
use crate::oracles::BackendKind;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_SILICONFLOW_MODEL: &str = "Pro/deepseek-ai/DeepSeek-R1";
pub const DEFAULT_SILICONFLOW_BASE_URL: &str = "https://api.siliconflow.cn/v1";
pub const DEFAULT_ORACLE_TIMEOUT_SECS: u64 = 120;

/// Connection settings of one chat-completions provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

impl ApiSettings {
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub openai: ApiSettings,
    pub siliconflow: ApiSettings,
    pub oracle_timeout: Duration,
    /// Program run by the `command` backend.
    pub oracle_command: Option<String>,
    pub service_import: Option<String>,
    pub helpers_import: Option<String>,
}

impl Settings {
    /// Reads settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let oracle_timeout = match get("TESTSMITH_ORACLE_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    warn!(
                        "ignoring TESTSMITH_ORACLE_TIMEOUT_SECS={}, using {}s",
                        raw, DEFAULT_ORACLE_TIMEOUT_SECS
                    );
                    DEFAULT_ORACLE_TIMEOUT_SECS
                }
            },
            None => DEFAULT_ORACLE_TIMEOUT_SECS,
        };

        Self {
            openai: ApiSettings {
                api_key: get("OPENAI_API_KEY"),
                model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
                base_url: get("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            },
            siliconflow: ApiSettings {
                api_key: get("SILICONFLOW_API_KEY"),
                model: get("SILICONFLOW_MODEL").unwrap_or_else(|| DEFAULT_SILICONFLOW_MODEL.to_string()),
                base_url: get("SILICONFLOW_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_SILICONFLOW_BASE_URL.to_string()),
            },
            oracle_timeout: Duration::from_secs(oracle_timeout),
            oracle_command: get("TESTSMITH_ORACLE_COMMAND"),
            service_import: get("TESTSMITH_SERVICE_IMPORT"),
            helpers_import: get("TESTSMITH_HELPERS_IMPORT"),
        }
    }

    /// Backend used for roles the registry does not name.
    pub fn default_backend(&self) -> BackendKind {
        if self.siliconflow.is_configured() {
            BackendKind::SiliconFlow
        } else if self.openai.is_configured() {
            BackendKind::OpenAi
        } else {
            BackendKind::Command
        }
    }

    pub fn scaffold_template(&self) -> ScaffoldTemplate {
        let mut template = ScaffoldTemplate::default();
        if let Some(import) = &self.service_import {
            template.service_import = import.clone();
        }
        if let Some(import) = &self.helpers_import {
            template.helpers_import = import.clone();
        }
        template
    }
}
