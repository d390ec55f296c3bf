//! Index sequences and sliding-window `(X, y)` pairs for the headline model.

use std::collections::HashMap;

use ndarray::{s, Array2, Axis};
use tracing::{debug, info};

use crate::error::{PrepError, Result};
use crate::mappings::{Document, NEWLINE_INDEX};

/// Model inputs built by [`format_inputs`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSet {
    /// One row of `maxlen + 1` word indices per example.
    pub xs: Array2<usize>,
    /// One-hot targets, one row per example.
    pub ys: Array2<u8>,
    /// Bodies of the pairs that produced examples.
    pub bodies: Vec<Vec<usize>>,
    /// Matching headlines, each ending in the end marker.
    pub headlines: Vec<Vec<usize>>,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.xs.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.nrows() == 0
    }

    /// Takes the first example of each of the first `nobs` headlines.
    ///
    /// The second set is what remains for training or evaluation: all of
    /// `self` when `keep` is set, otherwise the examples and pairs after
    /// those headlines.
    pub fn subset(&self, nobs: usize, keep: bool) -> (TrainingSet, TrainingSet) {
        let nobs = nobs.min(self.headlines.len());
        let mut rows = Vec::with_capacity(nobs);
        let mut row_idx = 0;
        for headline in &self.headlines[..nobs] {
            if row_idx >= self.len() {
                break;
            }
            rows.push(row_idx);
            row_idx += headline.len();
        }
        let row_idx = row_idx.min(self.len());

        let picked = TrainingSet {
            xs: self.xs.select(Axis(0), &rows),
            ys: self.ys.select(Axis(0), &rows),
            bodies: self.bodies[..nobs].to_vec(),
            headlines: self.headlines[..nobs].to_vec(),
        };
        let rest = if keep {
            self.clone()
        } else {
            TrainingSet {
                xs: self.xs.slice(s![row_idx.., ..]).to_owned(),
                ys: self.ys.slice(s![row_idx.., ..]).to_owned(),
                bodies: self.bodies[nobs..].to_vec(),
                headlines: self.headlines[nobs..].to_vec(),
            }
        };
        debug!(picked = picked.len(), rest = rest.len(), keep, "Took headline subset");
        (picked, rest)
    }
}

fn vectorize(words: &[String], word_idx: &HashMap<String, usize>) -> Vec<usize> {
    words
        .iter()
        .filter_map(|word| word_idx.get(word).copied())
        .collect()
}

/// Maps every token to its index, dropping tokens outside the vocabulary.
///
/// Pairs where either side ends up empty are dropped, so the outputs stay aligned.
pub fn vectorize_texts(
    bodies: &[Document],
    headlines: &[Document],
    word_idx: &HashMap<String, usize>,
) -> (Vec<Vec<usize>>, Vec<Vec<usize>>) {
    let mut vec_bodies = Vec::new();
    let mut vec_headlines = Vec::new();
    for (body, headline) in bodies.iter().zip(headlines) {
        let vec_body = vectorize(body, word_idx);
        let vec_headline = vectorize(headline, word_idx);
        if !vec_body.is_empty() && !vec_headline.is_empty() {
            vec_bodies.push(vec_body);
            vec_headlines.push(vec_headline);
        }
    }
    debug!(
        kept = vec_bodies.len(),
        dropped = bodies.len().min(headlines.len()) - vec_bodies.len(),
        "Vectorized texts"
    );
    (vec_bodies, vec_headlines)
}

/// Builds the `X`/`y` matrices from vectorized bodies and headlines.
///
/// Each headline gets the end marker appended. A pair is kept only when the
/// headline fits both `(len(body) - maxlen) / step` and `maxlen`. For every
/// position `idx` of the marked headline one example is emitted:
/// `X = body[idx..maxlen] ++ [0] ++ headline[..idx]`, `y = headline[idx]`.
pub fn format_inputs(
    vec_bodies: &[Vec<usize>],
    vec_headlines: &[Vec<usize>],
    num_classes: usize,
    maxlen: usize,
    step: usize,
) -> Result<TrainingSet> {
    if maxlen == 0 || step == 0 {
        return Err(PrepError::InvalidArgument(format!(
            "maxlen ({maxlen}) and step ({step}) must be positive"
        )));
    }

    let mut xs = Vec::new();
    let mut targets = Vec::new();
    let mut bodies = Vec::new();
    let mut headlines = Vec::new();

    for (body, hline) in vec_bodies.iter().zip(vec_headlines) {
        let max_hline_len = (body.len() as i64 - maxlen as i64).div_euclid(step as i64);
        if hline.len() as i64 > max_hline_len || hline.len() > maxlen {
            continue;
        }

        let mut marked = hline.clone();
        marked.push(NEWLINE_INDEX);
        for (idx, &word) in marked.iter().enumerate() {
            xs.extend_from_slice(&body[idx..maxlen]);
            xs.push(NEWLINE_INDEX);
            xs.extend_from_slice(&marked[..idx]);
            targets.push(word);
        }
        bodies.push(body.clone());
        headlines.push(marked);
    }

    let n_examples = targets.len();
    let xs = Array2::from_shape_vec((n_examples, maxlen + 1), xs)
        .map_err(|e| PrepError::InvalidArgument(e.to_string()))?;

    let mut ys = Array2::<u8>::zeros((n_examples, num_classes));
    for (row, &target) in targets.iter().enumerate() {
        if target >= num_classes {
            return Err(PrepError::InvalidArgument(format!(
                "target index {target} out of range for {num_classes} classes"
            )));
        }
        ys[[row, target]] = 1;
    }

    info!(
        pairs = bodies.len(),
        x_shape = ?xs.shape(),
        y_shape = ?ys.shape(),
        "Formatted model inputs"
    );
    Ok(TrainingSet {
        xs,
        ys,
        bodies,
        headlines,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word_idx() -> HashMap<String, usize> {
        [("\n", 0), ("cat", 1), ("dog", 2), ("fish", 3)]
            .into_iter()
            .map(|(w, i)| (w.to_string(), i))
            .collect()
    }

    fn doc(text: &str) -> Document {
        text.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn vectorize_drops_unknown_words_and_empty_pairs() {
        let bodies = vec![doc("the cat saw a dog"), doc("cat"), doc("nothing known")];
        let headlines = vec![doc("dog fish"), doc("unknown"), doc("cat")];
        let (vb, vh) = vectorize_texts(&bodies, &headlines, &word_idx());
        assert_eq!(vb, vec![vec![1, 2]]);
        assert_eq!(vh, vec![vec![2, 3]]);
    }

    #[test]
    fn formats_sliding_windows() {
        let bodies = vec![vec![1, 2, 3, 1, 2, 3]];
        let headlines = vec![vec![3, 2]];
        let set = format_inputs(&bodies, &headlines, 4, 3, 1).unwrap();

        assert_eq!(set.len(), 3);
        assert_eq!(set.xs.shape(), &[3, 4]);
        assert_eq!(set.xs.row(0).to_vec(), vec![1, 2, 3, 0]);
        assert_eq!(set.xs.row(1).to_vec(), vec![2, 3, 0, 3]);
        assert_eq!(set.xs.row(2).to_vec(), vec![3, 0, 3, 2]);

        assert_eq!(set.ys.shape(), &[3, 4]);
        for row in set.ys.rows() {
            assert_eq!(row.iter().map(|&v| v as u32).sum::<u32>(), 1);
        }
        assert_eq!(set.ys[[0, 3]], 1);
        assert_eq!(set.ys[[1, 2]], 1);
        assert_eq!(set.ys[[2, 0]], 1);

        assert_eq!(set.headlines, vec![vec![3, 2, 0]]);
    }

    #[test]
    fn drops_bodies_too_short_for_headline() {
        let bodies = vec![vec![1, 2, 3, 1], vec![1, 2, 3, 1, 2, 3]];
        let headlines = vec![vec![3, 2], vec![1]];
        let set = format_inputs(&bodies, &headlines, 4, 3, 1).unwrap();
        assert_eq!(set.bodies, vec![vec![1, 2, 3, 1, 2, 3]]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn step_shrinks_allowed_headline_length() {
        let bodies = vec![vec![1, 2, 3, 1, 2, 3]];
        let headlines = vec![vec![3, 2]];
        let set = format_inputs(&bodies, &headlines, 4, 3, 2).unwrap();
        assert!(set.is_empty());
        assert_eq!(set.xs.shape(), &[0, 4]);
    }

    fn three_headlines() -> TrainingSet {
        let bodies = vec![vec![1, 2, 3, 1, 2, 3]; 3];
        let headlines = vec![vec![3, 2], vec![1], vec![2, 2]];
        format_inputs(&bodies, &headlines, 4, 3, 1).unwrap()
    }

    #[test]
    fn subset_takes_one_row_per_headline() {
        let set = three_headlines();
        assert_eq!(set.len(), 8);

        let (picked, rest) = set.subset(2, true);
        assert_eq!(picked.len(), 2);
        assert_eq!(picked.xs.row(0), set.xs.row(0));
        assert_eq!(picked.xs.row(1), set.xs.row(3));
        assert_eq!(picked.ys.row(1), set.ys.row(3));
        assert_eq!(picked.headlines, vec![vec![3, 2, 0], vec![1, 0]]);
        assert_eq!(rest, set);
    }

    #[test]
    fn subset_can_hold_rows_out() {
        let set = three_headlines();
        let (picked, rest) = set.subset(2, false);
        assert_eq!(picked.len(), 2);
        assert_eq!(rest.len(), 3);
        assert_eq!(rest.xs.row(0), set.xs.row(5));
        assert_eq!(rest.headlines, vec![vec![2, 2, 0]]);
        assert_eq!(rest.bodies.len(), 1);

        let (all, none_left) = set.subset(10, false);
        assert_eq!(all.len(), 3);
        assert!(none_left.is_empty());
    }

    #[test]
    fn rejects_bad_arguments() {
        let bodies = vec![vec![1, 2, 3, 1, 2, 3]];
        let headlines = vec![vec![3]];
        assert!(format_inputs(&bodies, &headlines, 4, 0, 1).is_err());
        assert!(format_inputs(&bodies, &headlines, 4, 3, 0).is_err());
        assert!(matches!(
            format_inputs(&bodies, &headlines, 3, 3, 1),
            Err(PrepError::InvalidArgument(_))
        ));
    }
}
