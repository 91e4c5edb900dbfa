// src/config/mod.rs
// Configuration: TOML file, environment overrides, validation

pub mod env;
pub mod file;

pub use env::ConfigValidation;
pub use file::{
    ClassifierConfig, CorrelatorConfig, ExecutorConfig, ProxyConfig, RouterConfig, ServerConfig,
    WorkedExample,
};
