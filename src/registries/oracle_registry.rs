use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use yaml_rust::{Yaml, YamlLoader};

use crate::error::OracleError;
use crate::oracles::BackendKind;

pub const DEFAULT_REGISTRY_PATH: &str = "testsmith.yml";

/// Pipeline step an oracle serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OracleRole {
    Enrich,
    Debug,
}

impl OracleRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            OracleRole::Enrich => "enrich",
            OracleRole::Debug => "debug",
        }
    }
}

impl fmt::Display for OracleRole {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend and optional model override for one role.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleConfig {
    pub backend: BackendKind,
    pub model: Option<String>,
}

/// File-based role-to-backend mapping.
///
/// ```yaml
/// enrich: siliconflow          # short form
/// debug:                       # long form
///   backend: openai
///   model: gpt-4o-mini
/// ```
#[derive(Clone)]
pub struct FileOracleRegistry {
    registry_path: PathBuf,
    default_backend: BackendKind,
}

impl FileOracleRegistry {
    /// Creates a new FileOracleRegistry
    ///
    /// # Arguments
    /// * `registry_path` - Optional path to the registry file (defaults to "testsmith.yml")
    /// * `default_backend` - Backend for roles the file does not name
    pub fn new(registry_path: Option<PathBuf>, default_backend: BackendKind) -> Self {
        Self {
            registry_path: registry_path.unwrap_or_else(|| PathBuf::from(DEFAULT_REGISTRY_PATH)),
            default_backend,
        }
    }

    /// Loads the registry from the file. A missing file is an empty registry.
    fn load_registry(&self) -> Result<HashMap<String, RoleConfig>, OracleError> {
        if !self.registry_path.exists() {
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(&self.registry_path).map_err(|e| {
            OracleError::NotConfigured(format!(
                "failed to read oracle registry {}: {}",
                self.registry_path.display(),
                e
            ))
        })?;

        parse_registry(&content, self.default_backend)
    }

    pub fn get_role(&self, role: OracleRole) -> Result<RoleConfig, OracleError> {
        let registry = self.load_registry()?;

        Ok(registry.get(role.as_str()).cloned().unwrap_or(RoleConfig {
            backend: self.default_backend,
            model: None,
        }))
    }
}

/// Parses the YAML registry into a HashMap keyed by role name.
/// Supports the short form (backend name) and the long form (object with
/// backend and model).
fn parse_registry(yaml_content: &str, default_backend: BackendKind) -> Result<HashMap<String, RoleConfig>, OracleError> {
    let docs = YamlLoader::load_from_str(yaml_content)
        .map_err(|e| OracleError::NotConfigured(format!("invalid registry YAML: {}", e)))?;

    let mut registry = HashMap::new();
    let Some(hash) = docs.first().and_then(|doc| doc.as_hash()) else {
        return Ok(registry);
    };

    for (key, value) in hash {
        let Some(role) = key.as_str() else {
            continue;
        };
        let config = if let Some(backend) = value.as_str() {
            RoleConfig {
                backend: backend.parse()?,
                model: None,
            }
        } else if let Some(v_hash) = value.as_hash() {
            let backend = match v_hash.get(&Yaml::String("backend".to_string())).and_then(|v| v.as_str()) {
                Some(name) => name.parse()?,
                None => default_backend,
            };
            let model = v_hash
                .get(&Yaml::String("model".to_string()))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
            RoleConfig { backend, model }
        } else {
            RoleConfig {
                backend: default_backend,
                model: None,
            }
        };

        registry.insert(role.to_string(), config);
    }

    Ok(registry)
}
