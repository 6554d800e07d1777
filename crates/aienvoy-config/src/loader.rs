// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./aienvoy.toml` > `~/.config/aienvoy/aienvoy.toml` > `/etc/aienvoy/aienvoy.toml`
//! with environment variable overrides via `AIENVOY_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::AienvoyConfig;

/// System-wide configuration file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/aienvoy/aienvoy.toml";

/// Configuration file looked up in the working directory.
pub const LOCAL_CONFIG_PATH: &str = "aienvoy.toml";

/// Config sections that environment variables may address.
///
/// Ordered so that no entry is a prefix of a later one.
const ENV_SECTIONS: &[&str] = &[
    "service",
    "storage",
    "aws",
    "claude_web",
    "bard",
    "telegram",
    "prometheus",
];

/// Path of the per-user configuration file, if a config dir exists.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("aienvoy/aienvoy.toml"))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/aienvoy/aienvoy.toml` (system-wide)
/// 3. `~/.config/aienvoy/aienvoy.toml` (user XDG config)
/// 4. `./aienvoy.toml` (local directory)
/// 5. `AIENVOY_*` environment variables
pub fn load_config() -> Result<AienvoyConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<AienvoyConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AienvoyConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<AienvoyConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AienvoyConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for the XDG hierarchy.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(AienvoyConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// Environment variable provider.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `AIENVOY_TELEGRAM_BOT_TOKEN` must become `telegram.bot_token`,
/// and `AIENVOY_CLAUDE_WEB_SESSION_KEY` must become `claude_web.session_key`.
fn env_provider() -> Env {
    Env::prefixed("AIENVOY_").map(|key| map_env_key(key.as_str()).into())
}

/// Maps a lowercased, prefix-stripped env var name to a dotted config path.
pub fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
