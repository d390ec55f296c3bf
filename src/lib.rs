//! Data preparation for a headline-generation model.
//!
//! Raw newsgroup posts are split into headline and body and tokenized
//! ([`corpus`]), pretrained GloVe vectors are loaded ([`embedding`]), and
//! aligned word/index/vector tables plus the initial embedding weights are
//! built from them ([`mappings`]). [`vectorize`] turns the corpus into
//! sliding-window model inputs.

pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod mappings;
pub mod vectorize;

pub use error::{PrepError, Result};
