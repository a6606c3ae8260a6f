mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config = parse_config(&content)
        .with_context(|| format!("Failed to load config file: {:?}", path))?;

    Ok(config)
}

/// Parse configuration from TOML text
///
/// Tildes in paths are expanded. The result is not validated: command-line
/// overrides may still fill in missing values, so callers run
/// [`validate_config`] once they are applied.
pub fn parse_config(content: &str) -> Result<Config> {
    let mut config: Config = toml::from_str(content).context("Failed to parse config")?;

    expand_paths(&mut config);

    Ok(config)
}

/// Apply command-line overrides on top of a loaded config.
///
/// Non-empty `sources` replace the watch paths. A destination selects the
/// directory sink and a URL selects the HTTP sink.
pub fn apply_overrides(
    config: &mut Config,
    sources: Vec<PathBuf>,
    destination: Option<PathBuf>,
    url: Option<String>,
) {
    if !sources.is_empty() {
        config.watch.paths = sources;
    }
    if let Some(destination) = destination {
        config.upload.kind = SinkKind::Directory;
        config.upload.destination = Some(destination);
    }
    if let Some(url) = url {
        config.upload.kind = SinkKind::Http;
        config.upload.base_url = Some(url);
    }
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./hdspush.toml",
        "~/.config/hdspush/config.toml",
        "/etc/hdspush/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!(config = %path.display(), "Using config file");
            return load_config(path);
        }
    }

    Ok(Config::default())
}

fn expand_paths(config: &mut Config) {
    let expand = |path: &Path| {
        let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
        PathBuf::from(expanded)
    };

    config.watch.paths = config.watch.paths.iter().map(|p| expand(p)).collect();
    if let Some(destination) = &config.upload.destination {
        config.upload.destination = Some(expand(destination));
    }
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    let pipeline = &config.pipeline;
    if pipeline.file_workers == 0 {
        anyhow::bail!("pipeline.file_workers cannot be 0");
    }
    if pipeline.upload_workers == 0 {
        anyhow::bail!("pipeline.upload_workers cannot be 0");
    }
    if pipeline.queue_capacity == 0 {
        anyhow::bail!("pipeline.queue_capacity cannot be 0");
    }
    if pipeline.recent_fragments == 0 {
        anyhow::bail!("pipeline.recent_fragments cannot be 0");
    }

    if config.watch.poll_interval_ms == 0 {
        anyhow::bail!("watch.poll_interval_ms cannot be 0");
    }

    for path in &config.watch.paths {
        if !path.exists() {
            tracing::warn!("Watch path does not exist: {:?}", path);
        }
    }

    match config.upload.kind {
        SinkKind::Directory => {
            if config.upload.destination.is_none() {
                anyhow::bail!("upload.kind = \"directory\" requires upload.destination");
            }
        }
        SinkKind::Http => match &config.upload.base_url {
            Some(url) if !url.trim().is_empty() => {}
            _ => anyhow::bail!("upload.kind = \"http\" requires upload.base_url"),
        },
    }

    Ok(())
}
