use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PrepError, Result};
use crate::mappings::Vocabulary;

/// A pretrained word embedding that can be enumerated and queried by word.
pub trait WordEmbedding {
    /// Every word the embedding has a vector for.
    fn vocabulary(&self) -> Vocabulary;

    /// Dimension shared by all vectors.
    fn dims(&self) -> usize;

    /// Fails with `KeyLookup` when the word is absent.
    fn vector(&self, word: &str) -> Result<&[f32]>;

    fn contains(&self, word: &str) -> bool {
        self.vector(word).is_ok()
    }

    /// Number of words in the vocabulary.
    fn vocab_len(&self) -> usize {
        self.vocabulary().len()
    }
}

/// On-disk text layout of an embedding file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbeddingFormat {
    /// `word f1 .. fD` per line, no header.
    #[serde(rename = "glove")]
    Glove,
    /// GloVe lines preceded by a `count dims` header.
    #[serde(rename = "word2vec-text")]
    Word2VecText,
}

/// In-memory word vectors.
#[derive(Debug, Clone, Default)]
pub struct KeyedVectors {
    vectors: HashMap<String, Vec<f32>>,
    dims: usize,
}

impl KeyedVectors {
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Vec<f32>)>,
    {
        let mut kv = KeyedVectors::default();
        for (n, (word, vector)) in pairs.into_iter().enumerate() {
            kv.insert(n + 1, word, vector)?;
        }
        Ok(kv)
    }

    fn insert(&mut self, line: usize, word: String, vector: Vec<f32>) -> Result<()> {
        if self.vectors.is_empty() {
            self.dims = vector.len();
        } else if vector.len() != self.dims {
            return Err(PrepError::Format {
                line,
                message: format!(
                    "vector for {word:?} has {} dimensions, expected {}",
                    vector.len(),
                    self.dims
                ),
            });
        }
        self.vectors.insert(word, vector);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn load(path: &Path, format: EmbeddingFormat) -> Result<Self> {
        info!(path = %path.display(), ?format, "Loading word embedding");
        let file = File::open(path)?;
        let kv = Self::read_text(BufReader::new(file), format)?;
        info!(words = kv.len(), dims = kv.dims, "Word embedding loaded");
        Ok(kv)
    }

    pub fn read_text<R: BufRead>(reader: R, format: EmbeddingFormat) -> Result<Self> {
        let mut kv = KeyedVectors::default();
        let mut header: Option<(usize, usize, usize)> = None;

        for (n, line) in reader.lines().enumerate() {
            let line_no = n + 1;
            let line = line?;
            let mut fields = line.split_whitespace();
            let Some(word) = fields.next() else {
                continue;
            };

            if format == EmbeddingFormat::Word2VecText && header.is_none() {
                let count = parse_header_field(word, line_no)?;
                let dims = parse_header_field(fields.next().unwrap_or(""), line_no)?;
                header = Some((line_no, count, dims));
                continue;
            }

            let vector = fields
                .map(|field| {
                    field.parse::<f32>().map_err(|e| PrepError::Format {
                        line: line_no,
                        message: format!("{field:?}: {e}"),
                    })
                })
                .collect::<Result<Vec<f32>>>()?;
            if vector.is_empty() {
                return Err(PrepError::Format {
                    line: line_no,
                    message: format!("no vector for {word:?}"),
                });
            }
            kv.insert(line_no, word.to_string(), vector)?;
        }

        if let Some((line, count, dims)) = header {
            if kv.len() != count || (!kv.is_empty() && kv.dims != dims) {
                return Err(PrepError::Format {
                    line,
                    message: format!(
                        "header declares {count} x {dims}, body has {} x {}",
                        kv.len(),
                        kv.dims
                    ),
                });
            }
            kv.dims = dims;
        }
        Ok(kv)
    }
}

fn parse_header_field(field: &str, line: usize) -> Result<usize> {
    field.parse().map_err(|_| PrepError::Format {
        line,
        message: format!("bad word2vec header field {field:?}"),
    })
}

impl WordEmbedding for KeyedVectors {
    fn vocabulary(&self) -> Vocabulary {
        self.vectors.keys().cloned().collect()
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn vector(&self, word: &str) -> Result<&[f32]> {
        self.vectors
            .get(word)
            .map(Vec::as_slice)
            .ok_or_else(|| PrepError::missing_word(word))
    }

    fn contains(&self, word: &str) -> bool {
        self.vectors.contains_key(word)
    }

    fn vocab_len(&self) -> usize {
        self.vectors.len()
    }
}

/// Conventional file name of the 6B GloVe release at a given dimension.
pub fn glove_path(dir: &Path, embed_dim: usize) -> PathBuf {
    dir.join(format!("glove.6B.{embed_dim}d.txt"))
}

/// Prepends the word2vec `count dims` header to a GloVe file.
///
/// Returns the number of vectors and their dimension.
pub fn convert_glove_to_word2vec(input: &Path, output: &Path) -> Result<(usize, usize)> {
    let mut n_lines = 0;
    let mut dims = None;
    for line in BufReader::new(File::open(input)?).lines() {
        let line = line?;
        let n_fields = line.split_whitespace().count();
        if n_fields == 0 {
            continue;
        }
        n_lines += 1;
        if dims.is_none() {
            dims = Some(n_fields - 1);
        }
    }
    let dims = dims.ok_or_else(|| PrepError::Format {
        line: 1,
        message: "GloVe file is empty".into(),
    })?;
    debug!(n_lines, dims, "Counted GloVe vectors");

    let mut out = BufWriter::new(File::create(output)?);
    writeln!(out, "{n_lines} {dims}")?;
    for line in BufReader::new(File::open(input)?).lines() {
        let line = line?;
        if !line.trim().is_empty() {
            writeln!(out, "{line}")?;
        }
    }
    out.flush()?;

    info!(output = %output.display(), n_lines, dims, "Wrote word2vec text file");
    Ok((n_lines, dims))
}
