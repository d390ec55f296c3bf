//! Word/index/vector lookup tables and the initial embedding weights built from them.
//!
//! Index 0 is reserved for the newline sentinel, which doubles as the
//! end-of-headline marker in the formatted model inputs. Real words are
//! numbered from 1 in sorted order, so the same vocabulary always yields
//! the same tables.

use std::collections::{BTreeSet, HashMap};

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::embedding::WordEmbedding;
use crate::error::{PrepError, Result};

pub const NEWLINE: &str = "\n";
pub const NEWLINE_INDEX: usize = 0;

/// A set of words, iterated in sorted order.
pub type Vocabulary = BTreeSet<String>;

/// One tokenized body or headline.
pub type Document = Vec<String>;

/// The three aligned lookup tables produced by [`build_mappings`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mappings {
    pub word_idx: HashMap<String, usize>,
    pub idx_word: HashMap<usize, String>,
    pub word_vector: HashMap<String, Vec<f32>>,
}

impl Mappings {
    /// Number of real words, not counting the newline sentinel.
    pub fn vocab_size(&self) -> usize {
        self.word_idx.len() - usize::from(self.word_idx.contains_key(NEWLINE))
    }

    pub fn embedding_weights(&self) -> Result<Array2<f32>> {
        build_embedding_weights(&self.word_idx, &self.word_vector)
    }
}

/// Words of the embedding that also occur somewhere in `bodies` or `headlines`.
///
/// The embedding itself is left untouched.
pub fn filter_vocabulary<E>(embedding: &E, bodies: &[Document], headlines: &[Document]) -> Vocabulary
where
    E: WordEmbedding + ?Sized,
{
    let corpus_words: BTreeSet<&str> = bodies
        .iter()
        .chain(headlines)
        .flatten()
        .map(String::as_str)
        .collect();

    corpus_words
        .into_iter()
        .filter(|word| embedding.contains(word))
        .map(String::from)
        .collect()
}

/// Builds the word→index, index→word and word→vector tables.
///
/// With `filter_to_corpus` the vocabulary is restricted to words seen in
/// `bodies` or `headlines`; both must then be given and non-empty.
pub fn build_mappings<E>(
    embedding: &E,
    filter_to_corpus: bool,
    bodies: Option<&[Document]>,
    headlines: Option<&[Document]>,
) -> Result<Mappings>
where
    E: WordEmbedding + ?Sized,
{
    let mut vocab = if filter_to_corpus {
        match (bodies, headlines) {
            (Some(bodies), Some(headlines)) if !bodies.is_empty() && !headlines.is_empty() => {
                let vocab = filter_vocabulary(embedding, bodies, headlines);
                info!(
                    embedding = embedding.vocab_len(),
                    filtered = vocab.len(),
                    "Restricted embedding vocabulary to corpus words"
                );
                vocab
            }
            _ => {
                return Err(PrepError::InvalidArgument(
                    "bodies and headlines must be passed in when filtering to the corpus".into(),
                ))
            }
        }
    } else {
        embedding.vocabulary()
    };
    vocab.remove(NEWLINE);

    let capacity = vocab.len() + 1;
    let mut word_idx = HashMap::with_capacity(capacity);
    let mut idx_word = HashMap::with_capacity(capacity);
    let mut word_vector = HashMap::with_capacity(capacity);

    for (i, word) in vocab.into_iter().enumerate() {
        let vector = embedding.vector(&word)?.to_vec();
        word_idx.insert(word.clone(), i + 1);
        idx_word.insert(i + 1, word.clone());
        word_vector.insert(word, vector);
    }

    word_idx.insert(NEWLINE.to_string(), NEWLINE_INDEX);
    idx_word.insert(NEWLINE_INDEX, NEWLINE.to_string());
    word_vector.insert(NEWLINE.to_string(), vec![0.0; embedding.dims()]);

    debug!(words = word_idx.len(), dims = embedding.dims(), "Built mapping tables");
    Ok(Mappings {
        word_idx,
        idx_word,
        word_vector,
    })
}

/// Dense `(vocab_size + 1, dims)` matrix whose row `i` is the vector of the word at index `i`.
pub fn build_embedding_weights(
    word_idx: &HashMap<String, usize>,
    word_vector: &HashMap<String, Vec<f32>>,
) -> Result<Array2<f32>> {
    let vocab_size = word_idx.len() - usize::from(word_idx.contains_key(NEWLINE));
    let n_rows = vocab_size + 1;
    let n_dims = word_vector
        .get(NEWLINE)
        .or_else(|| word_vector.values().next())
        .map_or(0, Vec::len);

    let mut weights = Array2::<f32>::zeros((n_rows, n_dims));
    for (word, &idx) in word_idx {
        let vector = word_vector
            .get(word)
            .ok_or_else(|| PrepError::missing_word(word))?;
        if idx >= n_rows {
            return Err(PrepError::InvalidArgument(format!(
                "index {idx} of {word:?} exceeds vocabulary size {vocab_size}"
            )));
        }
        if vector.len() != n_dims {
            return Err(PrepError::InvalidArgument(format!(
                "vector for {word:?} has {} dimensions, expected {n_dims}",
                vector.len()
            )));
        }
        weights
            .row_mut(idx)
            .assign(&ArrayView1::from(vector.as_slice()));
    }

    info!(shape = ?weights.shape(), "Built embedding weights");
    Ok(weights)
}

/// Joins the words behind `indices` with single spaces.
pub fn stringify_indices(indices: &[usize], idx_word: &HashMap<usize, String>) -> Result<String> {
    let words = indices
        .iter()
        .map(|idx| {
            idx_word
                .get(idx)
                .map(String::as_str)
                .ok_or_else(|| PrepError::missing_index(*idx))
        })
        .collect::<Result<Vec<&str>>>()?;
    Ok(words.join(" "))
}

/// Stringifies an input sequence and its one-hot target.
///
/// Every position of `y` equal to one is treated as a target word; `y` is
/// not checked for being strictly one-hot.
pub fn stringify_example<T>(
    x: &[usize],
    y: &[T],
    idx_word: &HashMap<usize, String>,
) -> Result<(String, String)>
where
    T: Copy + PartialEq + From<u8>,
{
    let one = T::from(1);
    let hot: Vec<usize> = y
        .iter()
        .enumerate()
        .filter(|&(_, &v)| v == one)
        .map(|(idx, _)| idx)
        .collect();

    Ok((stringify_indices(x, idx_word)?, stringify_indices(&hot, idx_word)?))
}
