use rayon::prelude::*;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::{EngineError, Result};
use crate::vectorizer::SparseVector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Cosine,
    Euclidean,
    Manhattan,
}

impl FromStr for Metric {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "cosine" => Ok(Metric::Cosine),
            "euclidean" | "l2" => Ok(Metric::Euclidean),
            "manhattan" | "l1" | "cityblock" => Ok(Metric::Manhattan),
            other => Err(EngineError::Configuration(format!("unknown distance metric '{other}'"))),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Metric::Cosine => "cosine",
            Metric::Euclidean => "euclidean",
            Metric::Manhattan => "manhattan",
        };
        f.write_str(s)
    }
}

impl Metric {
    /// Distance between two vectors whose norms are already known.
    /// Cosine distance is `1 - cos`; a zero vector is at distance 1 from everything.
    fn distance(self, a: &SparseVector, a_norm: f32, b: &SparseVector, b_norm: f32) -> f32 {
        match self {
            Metric::Cosine => {
                if a_norm == 0.0 || b_norm == 0.0 {
                    1.0
                } else {
                    (1.0 - a.dot(b) / (a_norm * b_norm)).max(0.0)
                }
            }
            Metric::Euclidean => (a_norm * a_norm + b_norm * b_norm - 2.0 * a.dot(b)).max(0.0).sqrt(),
            Metric::Manhattan => manhattan(a, b),
        }
    }
}

fn manhattan(a: &SparseVector, b: &SparseVector) -> f32 {
    let (mut i, mut j, mut acc) = (0, 0, 0.0f32);
    while i < a.indices.len() || j < b.indices.len() {
        let ai = a.indices.get(i).copied().unwrap_or(u32::MAX);
        let bj = b.indices.get(j).copied().unwrap_or(u32::MAX);
        if ai == bj {
            acc += (a.values[i] - b.values[j]).abs();
            i += 1;
            j += 1;
        } else if ai < bj {
            acc += a.values[i].abs();
            i += 1;
        } else {
            acc += b.values[j].abs();
            j += 1;
        }
    }
    acc
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance: f32,
}

/// Exhaustive nearest-neighbor search; distances are computed in parallel.
#[derive(Debug, Clone)]
pub struct NearestNeighbors {
    metric: Metric,
    width: usize,
    vectors: Vec<SparseVector>,
    norms: Vec<f32>,
}

impl NearestNeighbors {
    pub fn fit(vectors: Vec<SparseVector>, width: usize, metric: Metric) -> Result<Self> {
        if let Some(span) = vectors.iter().map(SparseVector::span).max() {
            if span > width {
                return Err(EngineError::DimensionMismatch { expected: width, actual: span });
            }
        }
        let norms = vectors.par_iter().map(SparseVector::norm).collect();
        Ok(Self { metric, width, vectors, norms })
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn vector(&self, index: usize) -> Option<&SparseVector> {
        self.vectors.get(index)
    }

    /// The `k` closest vectors, nearest first; ties broken by index.
    pub fn kneighbors(&self, query: &SparseVector, k: usize) -> Result<Vec<Neighbor>> {
        if query.span() > self.width {
            return Err(EngineError::DimensionMismatch { expected: self.width, actual: query.span() });
        }
        let q_norm = query.norm();
        let mut all: Vec<Neighbor> = self
            .vectors
            .par_iter()
            .zip(self.norms.par_iter())
            .enumerate()
            .map(|(index, (v, &norm))| Neighbor { index, distance: self.metric.distance(query, q_norm, v, norm) })
            .collect();
        all.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.index.cmp(&b.index)));
        all.truncate(k);
        Ok(all)
    }
}

/// Map a distance onto (0, 1].
pub fn similarity(distance: f32) -> f32 {
    1.0 / (1.0 + distance)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points() -> Vec<SparseVector> {
        vec![
            SparseVector::from_dense(&[1.0, 0.0, 0.0]),
            SparseVector::from_dense(&[0.9, 0.1, 0.0]),
            SparseVector::from_dense(&[0.0, 0.0, 1.0]),
            SparseVector::from_dense(&[0.0, 0.0, 0.0]),
        ]
    }

    #[test]
    fn parses_metrics() {
        assert_eq!("Cosine".parse::<Metric>().unwrap(), Metric::Cosine);
        assert_eq!("l1".parse::<Metric>().unwrap(), Metric::Manhattan);
        assert!(matches!("jaccard".parse::<Metric>(), Err(EngineError::Configuration(_))));
    }

    #[test]
    fn cosine_orders_by_angle() {
        let nn = NearestNeighbors::fit(points(), 3, Metric::Cosine).unwrap();
        let q = SparseVector::from_dense(&[1.0, 0.0, 0.0]);
        let hits = nn.kneighbors(&q, 3).unwrap();
        assert_eq!(hits.iter().map(|h| h.index).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(hits[0].distance.abs() < 1e-6);
        assert_eq!(hits[2].distance, 1.0);
    }

    #[test]
    fn euclidean_and_manhattan_agree_on_order() {
        let q = SparseVector::from_dense(&[0.0, 0.0, 0.9]);
        for metric in [Metric::Euclidean, Metric::Manhattan] {
            let nn = NearestNeighbors::fit(points(), 3, metric).unwrap();
            let hits = nn.kneighbors(&q, 2).unwrap();
            assert_eq!(hits[0].index, 2, "{metric}");
            assert!((hits[0].distance - 0.1).abs() < 1e-5, "{metric}");
        }
    }

    #[test]
    fn rejects_mismatched_width() {
        let nn = NearestNeighbors::fit(points(), 3, Metric::Cosine).unwrap();
        let q = SparseVector::from_dense(&[0.0, 0.0, 0.0, 1.0]);
        assert!(matches!(nn.kneighbors(&q, 1), Err(EngineError::DimensionMismatch { .. })));
        assert!((similarity(1.0) - 0.5).abs() < 1e-6);
    }
}
