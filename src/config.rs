use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable naming a JSON config file.
pub const CONFIG_PATH_ENV: &str = "OUTLINE_READER_CONFIG";
pub const CACHE_CAPACITY_ENV: &str = "OUTLINE_READER_CACHE_CAPACITY";
pub const MAX_DEPTH_ENV: &str = "OUTLINE_READER_MAX_DEPTH";
pub const COLLAPSE_ENV: &str = "OUTLINE_READER_COLLAPSE";

/// Tunable thresholds for heading detection in unstructured text.
///
/// Signal precedence is fixed (numbering, then keyword, then short line);
/// these values only decide when each signal fires and what level it yields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicConfig {
    /// Pages scanned by the heuristic PDF extractor.
    pub max_pages: usize,
    /// Latin lines up to this many characters count as short-line headings.
    pub short_line_max_chars: usize,
    /// Same threshold for lines containing CJK script.
    pub cjk_short_line_max_chars: usize,
    /// Level assigned to headings detected only by the short-line signal.
    pub short_line_level: u32,
    pub min_heading_chars: usize,
    /// Unstyled DOCX paragraphs longer than this are body text even when numbered.
    pub max_numbered_paragraph_chars: usize,
    /// Inferred levels deeper than this are capped.
    pub max_heading_level: u32,
    pub enable_short_line: bool,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            max_pages: 40,
            short_line_max_chars: 32,
            cjk_short_line_max_chars: 20,
            short_line_level: 2,
            min_heading_chars: 2,
            max_numbered_paragraph_chars: 80,
            max_heading_level: 6,
            enable_short_line: true,
        }
    }
}

/// Server-wide configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub cache_capacity: usize,
    pub cache_max_age_secs: u64,
    /// `None` means no clamping.
    pub default_max_depth: Option<u32>,
    pub default_collapse_chains: bool,
    pub chain_separator: String,
    pub heuristics: HeuristicConfig,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 32,
            cache_max_age_secs: 3600,
            default_max_depth: Some(4),
            default_collapse_chains: false,
            chain_separator: " › ".to_string(),
            heuristics: HeuristicConfig::default(),
        }
    }
}

impl ReaderConfig {
    /// Load from the file named by `OUTLINE_READER_CONFIG` (if any), then
    /// apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(Path::new(&path))?,
            _ => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Apply overrides from a key lookup (the process environment in production).
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(CACHE_CAPACITY_ENV) {
            self.cache_capacity = raw
                .trim()
                .parse()
                .with_context(|| format!("Invalid {}: {}", CACHE_CAPACITY_ENV, raw))?;
        }

        if let Some(raw) = lookup(MAX_DEPTH_ENV) {
            self.default_max_depth = parse_max_depth(&raw)
                .with_context(|| format!("Invalid {}: {}", MAX_DEPTH_ENV, raw))?;
        }

        if let Some(raw) = lookup(COLLAPSE_ENV) {
            self.default_collapse_chains = match raw.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => anyhow::bail!("Invalid {}: {}", COLLAPSE_ENV, other),
            };
        }

        Ok(())
    }
}

/// Parse a depth setting: a non-negative integer, or `unbounded`/`none`/`all`.
pub fn parse_max_depth(raw: &str) -> Result<Option<u32>> {
    let value = raw.trim().to_lowercase();
    match value.as_str() {
        "" | "unbounded" | "none" | "all" => Ok(None),
        _ => Ok(Some(value.parse::<u32>().context("depth must be a non-negative integer")?)),
    }
}
