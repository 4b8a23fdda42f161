use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "numbers-abi.toml";

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub boundary: BoundaryConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    /// Directory relative paths resolve against (the config file's directory)
    #[serde(skip)]
    pub root: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct BoundaryConfig {
    /// Rust file or directory holding the exported functions
    #[serde(default = "default_source")]
    pub source: String,
    /// Generated C header consumed by foreign callers
    #[serde(default = "default_header")]
    pub header: String,
    /// Include guard; derived from the header file name when unset
    pub guard: Option<String>,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            header: default_header(),
            guard: None,
        }
    }
}

fn default_source() -> String {
    "src/boundary.rs".to_string()
}

fn default_header() -> String {
    "include/numbers_abi.h".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ProbeConfig {
    /// Shared libraries probed when none are given on the command line
    #[serde(default)]
    pub libraries: Vec<String>,
}

impl Config {
    pub fn source_path(&self) -> PathBuf {
        self.root.join(&self.boundary.source)
    }

    pub fn header_path(&self) -> PathBuf {
        self.root.join(&self.boundary.header)
    }

    pub fn library_paths(&self) -> Vec<PathBuf> {
        self.probe
            .libraries
            .iter()
            .map(|lib| self.root.join(lib))
            .collect()
    }

    pub fn guard(&self) -> String {
        match &self.boundary.guard {
            Some(guard) => guard.clone(),
            None => crate::ffi_codegen::guard_from_path(Path::new(&self.boundary.header)),
        }
    }
}

/// Load and parse numbers-abi.toml configuration file
pub fn load_config(path: &str) -> Result<Config> {
    let content = fs::read_to_string(path)
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                anyhow::anyhow!("could not find `{}`", path)
            } else {
                anyhow::anyhow!("failed to read `{}`: {}", path, e)
            }
        })?;

    let mut config: Config = toml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("failed to parse `{}`: {}", path, e))?;

    config.root = Path::new(path)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    validate_boundary(&config.boundary)?;

    Ok(config)
}

fn validate_boundary(boundary: &BoundaryConfig) -> Result<()> {
    if boundary.source.trim().is_empty() {
        anyhow::bail!("`boundary.source` must not be empty");
    }
    if boundary.header.trim().is_empty() {
        anyhow::bail!("`boundary.header` must not be empty");
    }
    if let Some(guard) = &boundary.guard {
        let valid = guard
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && guard.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            anyhow::bail!("`boundary.guard` '{}' is not a valid C identifier", guard);
        }
    }
    Ok(())
}
