//! Engine configuration, loadable from YAML

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::engine::constants::{FIELD_LEMMA, FIELD_POS, FIELD_WORD};
use crate::index::DEFAULT_BUCKET_REUSE_THRESHOLD;
use crate::query::RewriteOptions;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SpanConfig {
    pub matching: MatchingConfig,
    pub expansion: ExpansionConfig,
    pub buckets: BucketConfig,
    pub schema: SchemaConfig,
}

/// Choice between automaton and postings matching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub forward_index_enabled: bool,
    /// Multi-term patterns with at most this many literal characters are
    /// always matched by automaton
    pub nfa_fixed_char_threshold: usize,
    pub nfa_cost_factor: u64,
    pub max_nfa_states: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        let options = RewriteOptions::default();
        Self {
            forward_index_enabled: options.forward_index_enabled,
            nfa_fixed_char_threshold: options.nfa_fixed_char_threshold,
            nfa_cost_factor: options.nfa_cost_factor,
            max_nfa_states: options.max_nfa_states,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionConfig {
    pub max_term_expansions: usize,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            max_term_expansions: RewriteOptions::default().max_term_expansions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketConfig {
    /// Hits a bucket may hold before its buffers are released instead of cleared
    pub reuse_threshold: usize,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            reuse_threshold: DEFAULT_BUCKET_REUSE_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Annotations indexed per token; the first one is the default annotation
    pub annotations: Vec<String>,
    /// Logical field queries target
    pub base_field: String,
    /// Store annotations so they can serve as a forward index
    pub store_annotations: bool,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            annotations: vec![FIELD_WORD.to_string(), FIELD_LEMMA.to_string(), FIELD_POS.to_string()],
            base_field: "contents".to_string(),
            store_annotations: true,
        }
    }
}

impl SpanConfig {
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(anyhow!("Config file not found: {}", path.display()));
        }
        let yaml = fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path.display(), e))?;
        Self::from_yaml_str(&yaml).map_err(|e| anyhow!("Invalid config in {}: {}", path.display(), e))
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: SpanConfig = serde_yaml::from_str(yaml)?;
        if config.schema.annotations.is_empty() {
            return Err(anyhow!("schema.annotations must name at least one annotation"));
        }
        Ok(config)
    }

    pub fn default_annotation(&self) -> &str {
        self.schema.annotations.first().map_or(FIELD_WORD, String::as_str)
    }

    pub fn rewrite_options(&self) -> RewriteOptions {
        RewriteOptions {
            forward_index_enabled: self.matching.forward_index_enabled && self.schema.store_annotations,
            nfa_fixed_char_threshold: self.matching.nfa_fixed_char_threshold,
            nfa_cost_factor: self.matching.nfa_cost_factor,
            max_nfa_states: self.matching.max_nfa_states,
            max_term_expansions: self.expansion.max_term_expansions,
            default_annotation: self.default_annotation().to_string(),
        }
    }
}
