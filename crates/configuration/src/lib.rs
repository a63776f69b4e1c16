use crate::error::ConfigError;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;
pub mod telemetry;

// Re-export the core types to provide a clean public API.
pub use settings::{
    ApiConfig, Config, DatabaseSettings, LoggingConfig, ScannerSettings, WriterSettings,
};
pub use telemetry::init_tracing;

/// Loads the application configuration from a TOML file plus environment overrides.
///
/// Any key can be overridden with a `SCANNER__<SECTION>__<KEY>` variable, e.g.
/// `SCANNER__SCANNER__FEE_PCT=0.1`. The result is validated before it is returned.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::with_name(path))
        .add_source(
            config::Environment::with_prefix("SCANNER")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("scanner.top_averages")
                .try_parsing(true),
        )
        .build()?;

    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;

    Ok(config)
}

/// Parses configuration from an in-memory TOML document. Environment overrides are not applied.
pub fn config_from_toml(contents: &str) -> Result<Config, ConfigError> {
    let config = config::Config::builder()
        .add_source(config::File::from_str(contents, config::FileFormat::Toml))
        .build()?
        .try_deserialize::<Config>()?;
    config.validate()?;
    Ok(config)
}
