use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::embedding::{glove_path, EmbeddingFormat};

pub const MAPPINGS_FILE: &str = "mappings.json";
pub const WEIGHTS_FILE: &str = "embedding_weights.json";

/// Pipeline settings, read from an optional TOML file.
///
/// Missing keys fall back to the defaults below; command-line flags are
/// applied on top by the binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepConfig {
    /// Where the corpus, mappings and weights are written.
    pub data_dir: PathBuf,
    /// Directory holding `glove.6B.{embed_dim}d.txt`.
    pub embedding_dir: PathBuf,
    pub embed_dim: usize,
    pub embedding_format: EmbeddingFormat,
    /// Restrict the vocabulary to words seen in the corpus.
    pub filter_corpus: bool,
    pub maxlen: usize,
    pub step: usize,
    pub test_fraction: f32,
    pub seed: u64,
}

impl Default for PrepConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            embedding_dir: PathBuf::from("data/word_embeddings"),
            embed_dim: 50,
            embedding_format: EmbeddingFormat::Word2VecText,
            filter_corpus: false,
            maxlen: 50,
            step: 1,
            test_fraction: 0.2,
            seed: 12345,
        }
    }
}

impl PrepConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn embedding_path(&self) -> PathBuf {
        glove_path(&self.embedding_dir, self.embed_dim)
    }

    pub fn mappings_path(&self) -> PathBuf {
        self.data_dir.join(MAPPINGS_FILE)
    }

    pub fn weights_path(&self) -> PathBuf {
        self.data_dir.join(WEIGHTS_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: PrepConfig = toml::from_str(
            r#"
            embed_dim = 100
            embedding_format = "glove"
            filter_corpus = true
            "#,
        )
        .unwrap();
        assert_eq!(config.embed_dim, 100);
        assert_eq!(config.embedding_format, EmbeddingFormat::Glove);
        assert!(config.filter_corpus);
        assert_eq!(config.maxlen, 50);
        assert_eq!(
            config.embedding_path(),
            PathBuf::from("data/word_embeddings/glove.6B.100d.txt")
        );
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prep.toml");
        fs::write(&path, "data_dir = \"out\"\nseed = 7\n").unwrap();
        let config = PrepConfig::load_or_default(Some(&path)).unwrap();
        assert_eq!(config.mappings_path(), PathBuf::from("out/mappings.json"));
        assert_eq!(config.seed, 7);
        assert_eq!(PrepConfig::load_or_default(None).unwrap(), PrepConfig::default());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(PrepConfig::load(Path::new("/nonexistent/prep.toml")).is_err());
    }
}
