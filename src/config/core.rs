use super::ToolboxConfig;
use anyhow::{Context, Result, bail};
use figment::{
    Figment,
    providers::{Env, Format, Json, Toml, Yaml},
};
use std::path::{Path, PathBuf};

// Embed the default config at compile time
const DEFAULT_CONFIG: &str = include_str!("../../default-config.toml");

const ENV_PREFIX: &str = "TOOLBOX_";
const EXTENSIONS: [&str; 4] = ["toml", "json", "yaml", "yml"];

impl ToolboxConfig {
    /// Load with the standard source order: defaults, user config, project
    /// config in the current directory, then environment variables.
    pub fn load() -> Result<Self> {
        Self::load_with_custom_config(None)
    }

    /// Like [`ToolboxConfig::load`], but `custom_config` replaces the user and
    /// project files. A custom file that does not exist is an error.
    pub fn load_with_custom_config(custom_config: Option<&Path>) -> Result<Self> {
        Self::figment(custom_config)?
            .extract()
            .context("Failed to load configuration")
    }

    pub(crate) fn figment(custom_config: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::new().merge(Toml::string(DEFAULT_CONFIG));

        if let Some(custom_path) = custom_config {
            if !custom_path.is_file() {
                bail!("Config file not found: {}", custom_path.display());
            }
            figment = merge_file(figment, custom_path);
        } else {
            if let Some(user_dir) = user_config_dir() {
                for ext in EXTENSIONS {
                    figment = merge_file(figment, &user_dir.join(format!("config.{ext}")));
                }
            }
            for ext in EXTENSIONS {
                figment = merge_file(figment, Path::new(&format!("toolbox.{ext}")));
            }
        }

        // Environment variables always have highest priority
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }
}

/// Merge `path` with the provider matching its extension; missing files are skipped
fn merge_file(figment: Figment, path: &Path) -> Figment {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match extension.as_str() {
        "json" => figment.merge(Json::file(path)),
        "yaml" | "yml" => figment.merge(Yaml::file(path)),
        _ => figment.merge(Toml::file(path)),
    }
}

fn user_config_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config").join("toolbox"))
}
