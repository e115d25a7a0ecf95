use std::path::Path;

use anyhow::Context as _;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Tunable constants of the extraction and tracking heuristics.
///
/// Loaded from YAML; every field falls back to its default when omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Heuristics {
    /// Share of the page's words the detected container must hold.
    pub coverage_threshold: f64,
    /// Visible share above which a paragraph can be the reading position.
    pub visibility_threshold: f64,
    pub date_max_words: usize,
    pub author_max_words: usize,
    /// Limit for the last, page-wide author class lookup.
    pub author_fallback_max_words: usize,
    /// Substrings that disqualify a candidate by its id or class.
    pub blacklist: Vec<String>,
    pub noise_class_pattern: String,
    pub math_exemption_class: String,
    pub paragraph_tag: String,
    pub fallback_block_tag: String,
    pub unknown_author: String,
    pub unknown_date: String,
}

impl Default for Heuristics {
    fn default() -> Self {
        Self {
            coverage_threshold: 0.4,
            visibility_threshold: 0.5,
            date_max_words: 10,
            author_max_words: 5,
            author_fallback_max_words: 6,
            blacklist: vec!["comment".to_string()],
            noise_class_pattern: "(meta|contributions|ad-slot)".to_string(),
            math_exemption_class: "mwe-math-fallback-image-inline".to_string(),
            paragraph_tag: "p".to_string(),
            fallback_block_tag: "div".to_string(),
            unknown_author: "Unknown author".to_string(),
            unknown_date: "Unknown date".to_string(),
        }
    }
}

impl Heuristics {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read heuristics: {}", path.display()))?;
        let heuristics: Self = serde_yaml::from_str(&raw)
            .with_context(|| format!("parse heuristics: {}", path.display()))?;
        Ok(heuristics)
    }

    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn compile(mut self) -> anyhow::Result<CompiledHeuristics> {
        if !(0.0..=1.0).contains(&self.coverage_threshold) {
            anyhow::bail!(
                "coverage_threshold must be within [0, 1]: {}",
                self.coverage_threshold
            );
        }
        if !(0.0..=1.0).contains(&self.visibility_threshold) {
            anyhow::bail!(
                "visibility_threshold must be within [0, 1]: {}",
                self.visibility_threshold
            );
        }
        if self.paragraph_tag.trim().is_empty() {
            anyhow::bail!("paragraph_tag must not be empty");
        }
        // Parsed documents carry lower-case tag names.
        self.paragraph_tag = self.paragraph_tag.trim().to_ascii_lowercase();
        self.fallback_block_tag = self.fallback_block_tag.trim().to_ascii_lowercase();
        let noise_class = Regex::new(&self.noise_class_pattern)
            .with_context(|| format!("compile noise_class_pattern: {}", self.noise_class_pattern))?;
        Ok(CompiledHeuristics {
            settings: self,
            noise_class,
        })
    }
}

/// [`Heuristics`] with the noise pattern compiled.
#[derive(Debug, Clone)]
pub struct CompiledHeuristics {
    pub settings: Heuristics,
    noise_class: Regex,
}

impl CompiledHeuristics {
    pub fn is_noise_class(&self, class_token: &str) -> bool {
        self.noise_class.is_match(class_token)
    }

    pub fn is_blacklisted(&self, id: &str, class_name: &str) -> bool {
        self.settings
            .blacklist
            .iter()
            .filter(|entry| !entry.is_empty())
            .any(|entry| class_name.contains(entry.as_str()) || id.contains(entry.as_str()))
    }
}

impl Default for CompiledHeuristics {
    fn default() -> Self {
        Self {
            settings: Heuristics::default(),
            noise_class: Regex::new("(meta|contributions|ad-slot)").expect("noise class pattern"),
        }
    }
}

impl std::ops::Deref for CompiledHeuristics {
    type Target = Heuristics;

    fn deref(&self) -> &Heuristics {
        &self.settings
    }
}
