//! Turning raw newsgroup articles into aligned, tokenized bodies and headlines.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokenizers::pre_tokenizers::whitespace::Whitespace;
use tokenizers::{OffsetReferential, OffsetType, PreTokenizedString, PreTokenizer, Tokenizer};
use tracing::{debug, info, warn};

use crate::error::{PrepError, Result};
use crate::mappings::Document;

pub const BODIES_FILE: &str = "bodies.json";
pub const HEADLINES_FILE: &str = "headlines.json";

static SUBJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Subject:(.*)").expect("subject regex"));
static LINES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)Lines:(.*)").expect("lines regex"));

/// Raw headline and body text of one article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub headline: String,
    pub body: String,
}

/// Splits a raw newsgroup post into headline and body.
///
/// The headline is the rest of the `Subject:` line; the body is everything
/// after the first `Lines:` field. Posts missing either are rejected.
pub fn split_article(raw: &str) -> Option<Article> {
    let headline = SUBJECT_RE.captures(raw)?.get(1)?.as_str().trim();
    let body = LINES_RE.captures(raw)?.get(1)?.as_str();
    Some(Article {
        headline: headline.to_string(),
        body: body.to_string(),
    })
}

/// Tokenized bodies and headlines; `bodies[i]` belongs with `headlines[i]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Corpus {
    pub bodies: Vec<Document>,
    pub headlines: Vec<Document>,
}

impl Corpus {
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    fn push(&mut self, body: Document, headline: Document) {
        self.bodies.push(body);
        self.headlines.push(headline);
    }

    pub fn save(&self, data_dir: &Path) -> Result<()> {
        fs::create_dir_all(data_dir)?;
        fs::write(data_dir.join(BODIES_FILE), serde_json::to_vec(&self.bodies)?)?;
        fs::write(
            data_dir.join(HEADLINES_FILE),
            serde_json::to_vec(&self.headlines)?,
        )?;
        info!(dir = %data_dir.display(), articles = self.len(), "Saved corpus");
        Ok(())
    }

    pub fn load(data_dir: &Path) -> Result<Self> {
        let bodies: Vec<Document> =
            serde_json::from_slice(&fs::read(data_dir.join(BODIES_FILE))?)?;
        let headlines: Vec<Document> =
            serde_json::from_slice(&fs::read(data_dir.join(HEADLINES_FILE))?)?;
        if bodies.len() != headlines.len() {
            return Err(PrepError::InvalidArgument(format!(
                "{} bodies but {} headlines in {}",
                bodies.len(),
                headlines.len(),
                data_dir.display()
            )));
        }
        Ok(Corpus { bodies, headlines })
    }

    /// Shuffles the pairs with a seeded RNG and holds out `test_fraction` of them.
    pub fn split_train_test(self, test_fraction: f32, seed: u64) -> Result<(Corpus, Corpus)> {
        if !(0.0..=1.0).contains(&test_fraction) {
            return Err(PrepError::InvalidArgument(format!(
                "test fraction {test_fraction} is outside [0, 1]"
            )));
        }
        let mut pairs: Vec<(Document, Document)> =
            self.bodies.into_iter().zip(self.headlines).collect();

        let mut rng = StdRng::seed_from_u64(seed);
        pairs.shuffle(&mut rng);

        let n_test = (pairs.len() as f32 * test_fraction).round() as usize;
        let mut train = Corpus::default();
        let mut test = Corpus::default();
        for (i, (body, headline)) in pairs.into_iter().enumerate() {
            if i < n_test {
                test.push(body, headline);
            } else {
                train.push(body, headline);
            }
        }
        debug!(train = train.len(), test = test.len(), "Split corpus");
        Ok((train, test))
    }
}

/// Tokenizes and normalizes article text.
///
/// Tokens come from the `tokenizers` whitespace pre-tokenizer unless a
/// tokenizer file is supplied. Every token is lowercased; stopwords are
/// matched after lowercasing.
#[derive(Default)]
pub struct Cleaner {
    tokenizer: Option<Tokenizer>,
    remove_punct: bool,
    stopwords: HashSet<String>,
}

impl Cleaner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokenizer_file(mut self, path: &Path) -> Result<Self> {
        let tokenizer =
            Tokenizer::from_file(path).map_err(|e| PrepError::Tokenizer(e.to_string()))?;
        self.tokenizer = Some(tokenizer);
        Ok(self)
    }

    pub fn remove_punctuation(mut self, remove: bool) -> Self {
        self.remove_punct = remove;
        self
    }

    pub fn with_stopwords<I>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        self.stopwords = words.into_iter().map(|w| w.to_lowercase()).collect();
        self
    }

    /// One stopword per line; blank lines are ignored.
    pub fn load_stopwords(path: &Path) -> Result<Vec<String>> {
        Ok(fs::read_to_string(path)?
            .lines()
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .map(String::from)
            .collect())
    }

    pub fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        let text: String = if self.remove_punct {
            text.chars().filter(|c| !c.is_ascii_punctuation()).collect()
        } else {
            text.to_string()
        };

        let tokens = match &self.tokenizer {
            Some(tokenizer) => tokenizer
                .encode(text.as_str(), false)
                .map_err(|e| PrepError::Tokenizer(e.to_string()))?
                .get_tokens()
                .to_vec(),
            None => {
                let mut pretokenized = PreTokenizedString::from(text.as_str());
                Whitespace::default()
                    .pre_tokenize(&mut pretokenized)
                    .map_err(|e| PrepError::Tokenizer(e.to_string()))?;
                pretokenized
                    .get_splits(OffsetReferential::Original, OffsetType::Byte)
                    .into_iter()
                    .map(|(token, _, _)| token.to_string())
                    .collect()
            }
        };

        Ok(tokens
            .into_iter()
            .map(|token| token.to_lowercase())
            .filter(|token| !self.stopwords.contains(token))
            .collect())
    }

    pub fn clean(&self, body: &str, headline: &str) -> Result<(Document, Document)> {
        Ok((self.tokenize(body)?, self.tokenize(headline)?))
    }
}

fn collect_article_paths(dir: &Path, paths: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_article_paths(&path, paths)?;
        } else {
            paths.push(path);
        }
    }
    Ok(())
}

/// Reads every article under `articles_dir` and cleans it into a corpus.
///
/// Files are visited in sorted path order. Unreadable files and posts
/// without a headline or body are skipped.
pub fn prepare_corpus(articles_dir: &Path, cleaner: &Cleaner) -> Result<Corpus> {
    let mut paths = Vec::new();
    collect_article_paths(articles_dir, &mut paths)?;
    paths.sort();

    let mut corpus = Corpus::default();
    let mut skipped = 0usize;
    for path in &paths {
        let raw = match fs::read(path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(err) => {
                warn!(path = %path.display(), %err, "Cannot read article. Continuing...");
                skipped += 1;
                continue;
            }
        };
        let Some(article) = split_article(&raw) else {
            warn!(path = %path.display(), "No headline or body found. Continuing...");
            skipped += 1;
            continue;
        };
        let (body, headline) = cleaner.clean(&article.body, &article.headline)?;
        corpus.push(body, headline);
    }

    if skipped > 0 {
        warn!(skipped, total = paths.len(), "Skipped articles");
    }
    info!(articles = corpus.len(), "Prepared corpus");
    Ok(corpus)
}

#[cfg(test)]
mod tests {
    use super::*;

    const POST: &str = "From: someone@example.com\n\
        Subject: Re: Engine swap question\n\
        Organization: None\n\
        Lines: 3\n\
        \n\
        The engine runs well.\n\
        It is a V8.\n";

    fn words(text: &str) -> Document {
        text.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn splits_subject_and_body() {
        let article = split_article(POST).unwrap();
        assert_eq!(article.headline, "Re: Engine swap question");
        assert!(article.body.starts_with(" 3\n"));
        assert!(article.body.contains("It is a V8."));
    }

    #[test]
    fn rejects_posts_missing_a_field() {
        assert!(split_article("Subject: only a headline\n").is_none());
        assert!(split_article("Lines: 2\nonly a body\n").is_none());
    }

    #[test]
    fn tokenizes_and_lowercases() {
        let cleaner = Cleaner::new();
        assert_eq!(
            cleaner.tokenize("The Engine runs").unwrap(),
            words("the engine runs")
        );
    }

    #[test]
    fn removes_punctuation_and_stopwords() {
        let cleaner = Cleaner::new()
            .remove_punctuation(true)
            .with_stopwords(["The".to_string(), "is".to_string()]);
        let (body, headline) = cleaner
            .clean("The engine, it is a V8!", "Re: Engine swap")
            .unwrap();
        assert_eq!(body, words("engine it a v8"));
        assert_eq!(headline, words("re engine swap"));
    }

    #[test]
    fn keeps_punctuation_tokens_by_default() {
        let tokens = Cleaner::new().tokenize("swap?").unwrap();
        assert_eq!(tokens, words("swap ?"));
    }

    #[test]
    fn prepares_and_persists_corpus() {
        let articles = tempfile::tempdir().unwrap();
        fs::create_dir(articles.path().join("rec.autos")).unwrap();
        fs::write(articles.path().join("rec.autos").join("1"), POST).unwrap();
        fs::write(articles.path().join("2"), "no fields here").unwrap();

        let corpus = prepare_corpus(articles.path(), &Cleaner::new()).unwrap();
        assert_eq!(corpus.len(), 1);
        assert_eq!(corpus.headlines[0], words("re : engine swap question"));

        let data = tempfile::tempdir().unwrap();
        corpus.save(data.path()).unwrap();
        assert_eq!(Corpus::load(data.path()).unwrap(), corpus);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directories_are_not_followed() {
        let articles = tempfile::tempdir().unwrap();
        let group = articles.path().join("rec.autos");
        fs::create_dir(&group).unwrap();
        fs::write(group.join("1"), POST).unwrap();
        std::os::unix::fs::symlink(articles.path(), group.join("loop")).unwrap();

        let corpus = prepare_corpus(articles.path(), &Cleaner::new()).unwrap();
        assert_eq!(corpus.len(), 1);
    }

    #[test]
    fn split_is_reproducible() {
        let corpus = Corpus {
            bodies: (0..10).map(|i| vec![format!("b{i}")]).collect(),
            headlines: (0..10).map(|i| vec![format!("h{i}")]).collect(),
        };
        let (train, test) = corpus.clone().split_train_test(0.2, 12345).unwrap();
        assert_eq!((train.len(), test.len()), (8, 2));
        for (body, headline) in test.bodies.iter().zip(&test.headlines) {
            assert_eq!(body[0][1..], headline[0][1..]);
        }

        let (train_again, test_again) = corpus.clone().split_train_test(0.2, 12345).unwrap();
        assert_eq!(train, train_again);
        assert_eq!(test, test_again);

        assert!(corpus.split_train_test(1.5, 1).is_err());
    }
}
