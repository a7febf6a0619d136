pub mod config;
pub mod contexts;
pub mod data;
pub mod error;
pub mod oracles;
pub mod prompts;
pub mod registries;
pub mod runners;
