/*
 * config.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Scadenziario, a mailbox date-extraction exporter.
 *
 * Scadenziario is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Scadenziario is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Scadenziario.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Run configuration: persisted key=value defaults overlaid with explicit
//! invocation arguments. Validated once, immutable afterwards.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Recognized keys in the defaults file.
const KEY_FOLDER: &str = "FOLDER_PATH";
const KEY_KEYWORDS: &str = "KEYWORDS";
const KEY_DAYS: &str = "DAYS";
const KEY_TENANT: &str = "TENANT";
const KEY_CLIENT_ID: &str = "CLIENT_ID";
const KEY_OUTPUT: &str = "OUTPUT_CSV";

/// Validated, immutable configuration for one export run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Slash-separated folder display names from the mailbox root.
    pub folder_path: String,
    /// Search keywords; empty means no search clause.
    pub keywords: Vec<String>,
    /// Lookback window in days (> 0).
    pub window_days: u32,
    /// Directory tenant id, or "common".
    pub tenant: String,
    /// Registered application (client) id.
    pub client_id: String,
    /// Output file path.
    pub output_target: PathBuf,
}

/// Explicit invocation arguments. Any `Some` value takes precedence over the
/// persisted defaults file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub folder_path: Option<String>,
    pub keywords: Option<String>,
    pub window_days: Option<u32>,
    pub tenant: Option<String>,
    pub client_id: Option<String>,
    pub output_target: Option<PathBuf>,
}

/// Default config directory: ~/.scadenziario.
pub fn default_config_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .map(|h| h.join(".scadenziario"))
}

/// Parse a key=value defaults file. Missing file is an empty map; blank
/// lines and `#` comments are skipped.
pub fn load_defaults(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(e) => {
            return Err(ConfigError::new(format!(
                "cannot read '{}': {}",
                path.display(),
                e
            )))
        }
    };
    let mut out = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            out.insert(k.trim().to_string(), v.trim().to_string());
        }
    }
    tracing::debug!(path = %path.display(), entries = out.len(), "loaded defaults file");
    Ok(out)
}

/// Split a keyword list on commas, trimming and dropping empties and
/// duplicates while preserving first-seen order.
fn parse_keywords(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if !out.iter().any(|k| k.eq_ignore_ascii_case(part)) {
            out.push(part.to_string());
        }
    }
    out
}

impl RunConfig {
    /// Build from persisted defaults plus explicit overrides, then validate.
    pub fn from_sources(
        defaults: &HashMap<String, String>,
        overrides: &Overrides,
    ) -> Result<Self, ConfigError> {
        let folder_path = overrides
            .folder_path
            .clone()
            .or_else(|| defaults.get(KEY_FOLDER).cloned())
            .unwrap_or_else(|| "Inbox".to_string());

        let keywords_raw = overrides
            .keywords
            .clone()
            .or_else(|| defaults.get(KEY_KEYWORDS).cloned())
            .unwrap_or_default();

        let window_days = match overrides.window_days {
            Some(d) => d,
            None => match defaults.get(KEY_DAYS) {
                Some(raw) => raw.parse::<u32>().map_err(|_| {
                    ConfigError::new(format!("{} is not a number: '{}'", KEY_DAYS, raw))
                })?,
                None => 7,
            },
        };

        let tenant = overrides
            .tenant
            .clone()
            .or_else(|| defaults.get(KEY_TENANT).cloned())
            .unwrap_or_else(|| "common".to_string());

        let client_id = overrides
            .client_id
            .clone()
            .or_else(|| defaults.get(KEY_CLIENT_ID).cloned())
            .unwrap_or_default();

        let output_target = overrides
            .output_target
            .clone()
            .or_else(|| defaults.get(KEY_OUTPUT).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("mail_dates.csv"));

        let config = Self {
            folder_path,
            keywords: parse_keywords(&keywords_raw),
            window_days,
            tenant,
            client_id,
            output_target,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.folder_path.trim().is_empty() {
            return Err(ConfigError::new("folder path is empty"));
        }
        if self.window_days == 0 {
            return Err(ConfigError::new("lookback window must be at least 1 day"));
        }
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::new(format!(
                "{} missing: set it in the defaults file or pass --client-id",
                KEY_CLIENT_ID
            )));
        }
        Ok(())
    }
}
