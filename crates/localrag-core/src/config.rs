//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (`__` separates nested keys, e.g. `APP_LLM__MODEL`).
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::BuildPolicy;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate_for_env(&env_name)?;
        Ok(config)
    }

    /// Wrap an already-assembled figment (tests, embedding hosts).
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment: Figment::from(Serialized::defaults(Settings::default())).merge(figment) }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extract and validate the typed settings tree.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate_for_env(&self, env: &str) -> anyhow::Result<()> {
        match env {
            "prod" | "production" => {
                let use_fake: bool = self.get("embedding.use_fake")?;
                if use_fake {
                    anyhow::bail!("embedding.use_fake must be false in production");
                }
            }
            "dev" | "development" | "test" | "testing" => {}
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub chunking: ChunkingSettings,
    pub index: IndexSettings,
    pub embedding: EmbeddingSettings,
    pub llm: LlmSettings,
    pub retrieval: RetrievalSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub docs_dir: PathBuf,
    /// File extensions to ingest; empty means every regular file.
    pub extensions: Vec<String>,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self { docs_dir: PathBuf::from("knowledge_base"), extensions: Vec::new() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub separator: String,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self { chunk_size: 300, chunk_overlap: 30, separator: "\n".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub index_path: PathBuf,
    pub metadata_path: PathBuf,
    pub build_policy: BuildPolicy,
    /// Refuse to open an index whose metadata has gaps instead of warning.
    pub strict_consistency: bool,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from("text_search_index.bin"),
            metadata_path: PathBuf::from("index_metadata.json"),
            build_policy: BuildPolicy::IfAbsent,
            strict_consistency: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Directory holding `tokenizer.json`, `config.json` and the weights.
    /// Empty means: look at `APP_MODEL_DIR`, `MODEL_DIR`, then `models/bge-m3`.
    pub model_dir: String,
    pub max_len: usize,
    pub use_fake: bool,
    pub fake_dim: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { model_dir: String::new(), max_len: 512, use_fake: false, fake_dim: 1024 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub models: Vec<String>,
    pub max_tokens: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "deepseek-r1:7b".to_string(),
            models: ["deepseek-r1:7b", "llama3", "mistral", "qwen:7b"].map(String::from).to_vec(),
            max_tokens: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub k: usize,
    pub max_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { k: 3, max_k: 5 }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let c = &self.chunking;
        if c.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunking.chunk_size must be > 0".into()));
        }
        if c.chunk_overlap > c.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunking.chunk_overlap ({}) must not exceed chunking.chunk_size ({})",
                c.chunk_overlap, c.chunk_size
            )));
        }
        if self.retrieval.k == 0 || self.retrieval.k > self.retrieval.max_k {
            return Err(Error::InvalidConfig(format!(
                "retrieval.k must be within 1..={} (got {})",
                self.retrieval.max_k, self.retrieval.k
            )));
        }
        if self.embedding.use_fake && self.embedding.fake_dim == 0 {
            return Err(Error::InvalidConfig("embedding.fake_dim must be > 0".into()));
        }
        Ok(())
    }

    /// Expand `~`/env vars in every path and anchor relative ones at `base`.
    pub fn resolved(mut self, base: &Path) -> Self {
        self.data.docs_dir = resolve_with_base(base, self.data.docs_dir.to_string_lossy());
        self.index.index_path = resolve_with_base(base, self.index.index_path.to_string_lossy());
        self.index.metadata_path =
            resolve_with_base(base, self.index.metadata_path.to_string_lossy());
        if !self.embedding.model_dir.is_empty() {
            self.embedding.model_dir = resolve_with_base(base, &self.embedding.model_dir)
                .to_string_lossy()
                .into_owned();
        }
        self
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
