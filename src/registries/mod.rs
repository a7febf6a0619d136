mod oracle_registry;

pub use oracle_registry::{DEFAULT_REGISTRY_PATH, FileOracleRegistry, OracleRole, RoleConfig};
