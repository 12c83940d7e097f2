//! Layered configuration loading
//!
//! Priority (highest to lowest):
//! 1. Command line flags
//! 2. Environment variables (`TTS_` prefix, `_` between nested keys)
//! 3. Configuration file (`--config`, else `<config dir>/narrator/config.toml`)
//! 4. Built-in defaults

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat, Map};
use narrator_core::NarratorConfig;
use std::path::PathBuf;

use crate::cli::Cli;

const ENV_PREFIX: &str = "TTS";
const REDACTED: &str = "<redacted>";

/// `<config dir>/narrator/config.toml`, when the platform has a config dir
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("narrator").join("config.toml"))
}

/// Load settings from the process environment.
pub fn load_settings(cli: &Cli) -> Result<NarratorConfig, ConfigError> {
    load_settings_with_env(cli, None)
}

/// Load settings, reading `TTS_*` variables from `env` instead of the
/// process environment when given.
pub fn load_settings_with_env(
    cli: &Cli,
    env: Option<Map<String, String>>,
) -> Result<NarratorConfig, ConfigError> {
    let mut builder = Config::builder().add_source(Config::try_from(&NarratorConfig::default())?);

    builder = match &cli.config {
        Some(path) => builder.add_source(File::from(path.as_path()).format(FileFormat::Toml)),
        None => match default_config_path() {
            Some(path) => builder.add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(false),
            ),
            None => builder,
        },
    };

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("_")
            .try_parsing(true)
            .source(env),
    );

    let settings: NarratorConfig = apply_flags(builder, cli)?.build()?.try_deserialize()?;
    settings
        .validate()
        .map_err(|e| ConfigError::Message(e.to_string()))?;
    Ok(settings)
}

fn apply_flags(
    builder: ConfigBuilder<DefaultState>,
    cli: &Cli,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    builder
        .set_override_option("keep", cli.keep.then_some(true))?
        .set_override_option("retries", cli.retries.map(u64::from))?
        .set_override_option("concurrency", cli.concurrency.map(|n| n as u64))?
        .set_override_option("acodec", cli.acodec.clone())?
        .set_override_option("endpoint", cli.endpoint.clone())?
        .set_override_option("audio.encoding", cli.audio_encoding.clone())?
        .set_override_option("audio.frequency", cli.audio_frequency.map(u64::from))?
        .set_override_option("language.code", cli.language_code.clone())?
        .set_override_option("voice.name", cli.voice_name.clone())?
        .set_override_option("voice.gender", cli.voice_gender.clone())?
        .set_override_option("voice.pitch", cli.voice_pitch)?
        .set_override_option("voice.rate", cli.voice_rate)?
        .set_override_option("voice.volume", cli.voice_volume)?
        .set_override_option("quote.break", cli.quote_break)?
        .set_override_option("quote.emphasis", cli.quote_emphasis.clone())?
        .set_override_option("heading.break", cli.heading_break)?
        .set_override_option("heading.difference", cli.heading_difference)?
        .set_override_option("heading.emphasis", cli.heading_emphasis.clone())?
        .set_override_option("ellipsis.break", cli.ellipsis_break)?
        .set_override_option("dash.break", cli.dash_break)?
        .set_override_option("newline.break", cli.newline_break)?
        .set_override_option("block.separator", cli.block_separator.map(String::from))?
        .set_override_option("block.length", cli.block_length.map(|n| n as u64))
}

/// The configuration as TOML, with credentials masked.
pub fn render_toml(settings: &NarratorConfig) -> Result<String, toml::ser::Error> {
    let mut shown = settings.clone();
    if shown.credential.key.is_some() {
        shown.credential.key = Some(REDACTED.to_string());
    }
    if shown.credential.token.is_some() {
        shown.credential.token = Some(REDACTED.to_string());
    }
    toml::to_string_pretty(&shown)
}
