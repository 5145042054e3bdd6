//! Optional on-disk settings, merged under CLI flags.
//!
//! Flags resolve as `flag.or(settings.value).unwrap_or(default)`, so the
//! file only supplies defaults for what the command line leaves out.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    /// Default worker count when `-t` is not given.
    pub threads: Option<usize>,
    /// Default window page budget when `-p` is not given.
    pub window_pages: Option<u64>,
}

impl Settings {
    /// Reads `$HOME/.config/pagefetch/config.json`.
    ///
    /// Callers fall back to `Settings::default()` when the file is missing
    /// or malformed.
    pub fn load() -> Result<Self> {
        let json = std::fs::read_to_string(Self::path()?)?;
        serde_json::from_str(&json).context("invalid config.json")
    }

    fn path() -> Result<PathBuf> {
        let home = std::env::var_os("HOME").context("HOME is not set")?;
        Ok(PathBuf::from(home).join(".config/pagefetch/config.json"))
    }
}
