use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

use crate::normalize::tokenize;

/// Sparse vector with strictly increasing indices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    /// Build from unsorted `(index, value)` pairs; duplicates are summed and zeros dropped.
    pub fn from_pairs(mut pairs: Vec<(u32, f32)>) -> Self {
        pairs.sort_by_key(|(i, _)| *i);
        let mut out = SparseVector::default();
        for (i, v) in pairs {
            if out.indices.last() == Some(&i) {
                if let Some(last) = out.values.last_mut() {
                    *last += v;
                }
            } else {
                out.indices.push(i);
                out.values.push(v);
            }
        }
        out.retain_nonzero();
        out
    }

    pub fn from_dense(dense: &[f32]) -> Self {
        let mut out = SparseVector::default();
        for (i, &v) in dense.iter().enumerate() {
            if v != 0.0 {
                out.indices.push(i as u32);
                out.values.push(v);
            }
        }
        out
    }

    fn retain_nonzero(&mut self) {
        let mut k = 0;
        for j in 0..self.indices.len() {
            if self.values[j] != 0.0 {
                self.indices[k] = self.indices[j];
                self.values[k] = self.values[j];
                k += 1;
            }
        }
        self.indices.truncate(k);
        self.values.truncate(k);
    }

    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, f32)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    pub fn norm(&self) -> f32 {
        self.values.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    pub fn normalize(&mut self) {
        let norm = self.norm();
        if norm > 0.0 {
            for v in self.values.iter_mut() {
                *v /= norm;
            }
        }
    }

    pub fn dot(&self, other: &SparseVector) -> f32 {
        let (mut i, mut j, mut acc) = (0, 0, 0.0f32);
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    acc += self.values[i] * other.values[j];
                    i += 1;
                    j += 1;
                }
            }
        }
        acc
    }

    /// Dot product against a dense row.
    pub fn dot_dense(&self, dense: &[f32]) -> f32 {
        self.iter().map(|(i, v)| dense.get(i as usize).copied().unwrap_or(0.0) * v).sum()
    }

    /// Append `tail` after `width` columns of `self`.
    pub fn concat_dense(&self, width: usize, tail: &[f32]) -> SparseVector {
        let mut out = self.clone();
        for (k, &v) in tail.iter().enumerate() {
            if v != 0.0 {
                out.indices.push((width + k) as u32);
                out.values.push(v);
            }
        }
        out
    }

    /// Largest index + 1, zero for an empty vector.
    pub fn span(&self) -> usize {
        self.indices.last().map(|&i| i as usize + 1).unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
pub struct TfidfParams {
    pub ngram_range: (usize, usize),
    pub max_features: usize,
    pub min_df: usize,
    pub max_df: f32,
    pub stemming: bool,
}

impl Default for TfidfParams {
    fn default() -> Self {
        Self { ngram_range: (1, 1), max_features: usize::MAX, min_df: 1, max_df: 1.0, stemming: false }
    }
}

/// TF-IDF with sublinear tf, smoothed idf `ln((1+n)/(1+df)) + 1` and L2 norm.
/// Vocabulary indices follow term order, so fitting is deterministic.
#[derive(Debug, Clone, Default)]
pub struct TfidfVectorizer {
    params: TfidfParams,
    vocabulary: HashMap<String, u32>,
    idf: Vec<f32>,
}

impl TfidfVectorizer {
    pub fn new(params: TfidfParams) -> Self {
        Self { params, vocabulary: HashMap::new(), idf: Vec::new() }
    }

    pub fn vocabulary_size(&self) -> usize {
        self.idf.len()
    }

    pub fn contains(&self, term: &str) -> bool {
        self.vocabulary.contains_key(term)
    }

    fn analyze(&self, text: &str) -> Vec<String> {
        let tokens = tokenize(text, self.params.stemming);
        let (lo, hi) = self.params.ngram_range;
        let mut terms = Vec::new();
        for n in lo.max(1)..=hi.max(lo) {
            if n > tokens.len() {
                break;
            }
            for window in tokens.windows(n) {
                terms.push(window.join(" "));
            }
        }
        terms
    }

    /// Learn vocabulary and idf, then vectorize every document.
    pub fn fit_transform<S: AsRef<str> + Sync>(&mut self, documents: &[S]) -> Vec<SparseVector> {
        let analyzed: Vec<Vec<String>> = documents.par_iter().map(|d| self.analyze(d.as_ref())).collect();
        self.fit_analyzed(&analyzed);
        analyzed.par_iter().map(|terms| self.vectorize(terms)).collect()
    }

    fn fit_analyzed(&mut self, analyzed: &[Vec<String>]) {
        let n_docs = analyzed.len();
        let mut df: BTreeMap<&str, usize> = BTreeMap::new();
        let mut totals: BTreeMap<&str, usize> = BTreeMap::new();
        for terms in analyzed {
            let mut seen: HashSet<&str> = HashSet::new();
            for term in terms {
                *totals.entry(term.as_str()).or_insert(0) += 1;
                if seen.insert(term.as_str()) {
                    *df.entry(term.as_str()).or_insert(0) += 1;
                }
            }
        }

        let max_count = (self.params.max_df as f64 * n_docs as f64).floor() as usize;
        let mut kept: Vec<&str> = df
            .iter()
            .filter(|(_, d)| **d >= self.params.min_df && **d <= max_count)
            .map(|(t, _)| *t)
            .collect();
        if kept.is_empty() && !df.is_empty() {
            debug!(terms = df.len(), n_docs, "document-frequency bounds pruned every term, keeping all");
            kept = df.keys().copied().collect();
        }
        if kept.len() > self.params.max_features {
            kept.sort_by(|a, b| totals[b].cmp(&totals[a]).then_with(|| a.cmp(b)));
            kept.truncate(self.params.max_features);
            kept.sort();
        }

        self.vocabulary = kept.iter().enumerate().map(|(i, t)| (t.to_string(), i as u32)).collect();
        self.idf = kept
            .iter()
            .map(|t| ((1.0 + n_docs as f32) / (1.0 + df[t] as f32)).ln() + 1.0)
            .collect();
    }

    fn vectorize(&self, terms: &[String]) -> SparseVector {
        let mut counts: HashMap<u32, u32> = HashMap::new();
        for term in terms {
            if let Some(&tid) = self.vocabulary.get(term) {
                *counts.entry(tid).or_insert(0) += 1;
            }
        }
        let pairs = counts
            .into_iter()
            .map(|(tid, tf_raw)| {
                let tf = 1.0 + (tf_raw as f32).ln();
                (tid, tf * self.idf[tid as usize])
            })
            .collect();
        let mut v = SparseVector::from_pairs(pairs);
        v.normalize();
        v
    }

    pub fn transform(&self, text: &str) -> SparseVector {
        self.vectorize(&self.analyze(text))
    }
}
