// Configuration management module
// TOML settings under the base directory, with model runner environment overrides

pub mod display;
pub mod settings;

pub use display::{render_config, show_config};
pub use settings::{
    ChatConfig, Config, ConfigError, EmbeddingApi, EmbeddingConfig, IngestConfig,
    RetrievalConfig, StoreConfig,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}
