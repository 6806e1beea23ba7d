//! Truncated linear projection for wide recipe vectors.
//!
//! Randomized subspace iteration against the sparse corpus matrix, then an
//! exact eigendecomposition of the small `k x k` Gram matrix. The random
//! sketch is seeded, so fitting the same matrix twice gives the same
//! components.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::vectorizer::SparseVector;

const JACOBI_MAX_SWEEPS: usize = 60;
const JACOBI_TOLERANCE: f64 = 1e-12;
const RANK_EPSILON: f64 = 1e-10;

#[derive(Debug, Clone)]
pub struct TruncatedSvd {
    input_width: usize,
    /// Right singular vectors, one dense row of `input_width` per component.
    components: Vec<Vec<f32>>,
    singular_values: Vec<f32>,
}

impl TruncatedSvd {
    pub fn fit(rows: &[SparseVector], input_width: usize, n_components: usize, power_iterations: usize, seed: u64) -> Result<Self> {
        let k = n_components.min(rows.len()).min(input_width);
        if k == 0 {
            return Err(EngineError::Configuration("cannot fit a projection on an empty matrix".into()));
        }
        if let Some(span) = rows.iter().map(SparseVector::span).max() {
            if span > input_width {
                return Err(EngineError::DimensionMismatch { expected: input_width, actual: span });
            }
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let sketch: Vec<Vec<f32>> = (0..k)
            .map(|_| (0..input_width).map(|_| rng.gen_range(-1.0f32..1.0)).collect())
            .collect();

        let mut q = orthonormalize(multiply(rows, &sketch));
        for _ in 0..power_iterations {
            let z = orthonormalize(multiply_transpose(rows, &q, input_width));
            let z: Vec<Vec<f32>> = z.into_iter().map(|c| c.into_iter().map(|x| x as f32).collect()).collect();
            q = orthonormalize(multiply(rows, &z));
        }

        // B = Q^T X, one dense row of input_width per basis vector.
        let b = multiply_transpose(rows, &q, input_width);
        let gram: Vec<Vec<f64>> = (0..k)
            .map(|i| (0..k).map(|j| dot(&b[i], &b[j])).collect())
            .collect();
        let (eigenvalues, eigenvectors) = jacobi_eigen(gram);

        let mut order: Vec<usize> = (0..k).collect();
        order.sort_by(|&x, &y| eigenvalues[y].total_cmp(&eigenvalues[x]));

        let mut components = Vec::new();
        let mut singular_values = Vec::new();
        for idx in order {
            let lambda = eigenvalues[idx];
            if lambda <= RANK_EPSILON {
                continue;
            }
            let sigma = lambda.sqrt();
            let mut v = vec![0.0f64; input_width];
            for (j, row) in b.iter().enumerate() {
                let w = eigenvectors[j][idx];
                if w == 0.0 {
                    continue;
                }
                for (acc, x) in v.iter_mut().zip(row) {
                    *acc += w * x;
                }
            }
            components.push(v.into_iter().map(|x| (x / sigma) as f32).collect());
            singular_values.push(sigma as f32);
        }
        debug!(requested = n_components, kept = components.len(), input_width, "fitted truncated projection");
        Ok(Self { input_width, components, singular_values })
    }

    pub fn input_width(&self) -> usize {
        self.input_width
    }

    pub fn output_width(&self) -> usize {
        self.components.len()
    }

    pub fn singular_values(&self) -> &[f32] {
        &self.singular_values
    }

    pub fn transform(&self, x: &SparseVector) -> Result<SparseVector> {
        if x.span() > self.input_width {
            return Err(EngineError::DimensionMismatch { expected: self.input_width, actual: x.span() });
        }
        let dense: Vec<f32> = self.components.iter().map(|c| x.dot_dense(c)).collect();
        Ok(SparseVector::from_dense(&dense))
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// X * M for dense columns `M[j]` of the input width. Returns columns of length `rows.len()`.
fn multiply(rows: &[SparseVector], columns: &[Vec<f32>]) -> Vec<Vec<f64>> {
    columns
        .par_iter()
        .map(|col| rows.iter().map(|r| r.dot_dense(col) as f64).collect())
        .collect()
}

/// X^T * Q for columns `Q[j]` of length `rows.len()`. Returns dense columns of `width`.
fn multiply_transpose(rows: &[SparseVector], q: &[Vec<f64>], width: usize) -> Vec<Vec<f64>> {
    q.par_iter()
        .map(|col| {
            let mut out = vec![0.0f64; width];
            for (r, &weight) in rows.iter().zip(col) {
                if weight == 0.0 {
                    continue;
                }
                for (i, v) in r.iter() {
                    out[i as usize] += weight * v as f64;
                }
            }
            out
        })
        .collect()
}

/// Modified Gram-Schmidt. Columns that collapse are zeroed.
fn orthonormalize(mut columns: Vec<Vec<f64>>) -> Vec<Vec<f64>> {
    for j in 0..columns.len() {
        let (done, rest) = columns.split_at_mut(j);
        let current = &mut rest[0];
        for prev in done.iter() {
            let proj = dot(prev, current);
            for (c, p) in current.iter_mut().zip(prev) {
                *c -= proj * p;
            }
        }
        let norm = dot(current, current).sqrt();
        if norm > RANK_EPSILON {
            current.iter_mut().for_each(|c| *c /= norm);
        } else {
            current.iter_mut().for_each(|c| *c = 0.0);
        }
    }
    columns
}

/// Cyclic Jacobi eigendecomposition of a symmetric matrix.
/// Returns eigenvalues and eigenvectors as columns of the second matrix.
fn jacobi_eigen(mut a: Vec<Vec<f64>>) -> (Vec<f64>, Vec<Vec<f64>>) {
    let n = a.len();
    let mut v: Vec<Vec<f64>> = (0..n).map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect()).collect();
    let scale: f64 = a.iter().enumerate().map(|(i, row)| row[i] * row[i]).sum::<f64>().max(f64::MIN_POSITIVE);

    for _ in 0..JACOBI_MAX_SWEEPS {
        let off: f64 = (0..n).flat_map(|p| (p + 1..n).map(move |q| (p, q))).map(|(p, q)| a[p][q] * a[p][q]).sum();
        if off <= JACOBI_TOLERANCE * scale {
            break;
        }
        for p in 0..n {
            for q in p + 1..n {
                let apq = a[p][q];
                if apq.abs() < f64::MIN_POSITIVE {
                    continue;
                }
                let theta = (a[q][q] - a[p][p]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;
                for row in a.iter_mut() {
                    let (akp, akq) = (row[p], row[q]);
                    row[p] = c * akp - s * akq;
                    row[q] = s * akp + c * akq;
                }
                for k in 0..n {
                    let (apk, aqk) = (a[p][k], a[q][k]);
                    a[p][k] = c * apk - s * aqk;
                    a[q][k] = s * apk + c * aqk;
                }
                for row in v.iter_mut() {
                    let (vkp, vkq) = (row[p], row[q]);
                    row[p] = c * vkp - s * vkq;
                    row[q] = s * vkp + c * vkq;
                }
            }
        }
    }
    let eigenvalues = (0..n).map(|i| a[i][i]).collect();
    (eigenvalues, v)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix() -> Vec<SparseVector> {
        vec![
            SparseVector::from_dense(&[3.0, 0.0, 0.0, 1.0]),
            SparseVector::from_dense(&[0.0, 2.0, 0.0, 0.0]),
            SparseVector::from_dense(&[3.0, 0.0, 0.0, 1.0]),
            SparseVector::from_dense(&[0.0, 0.0, 1.0, 0.0]),
        ]
    }

    #[test]
    fn recovers_dominant_directions() {
        let svd = TruncatedSvd::fit(&matrix(), 4, 2, 4, 42).unwrap();
        assert_eq!(svd.output_width(), 2);
        // Rows 0 and 2 span the strongest direction: sigma = sqrt(2 * 10).
        assert!((svd.singular_values()[0] - 20f32.sqrt()).abs() < 1e-3);
        assert!((svd.singular_values()[1] - 2.0).abs() < 1e-3);
    }

    #[test]
    fn projection_preserves_norm_inside_the_subspace() {
        let svd = TruncatedSvd::fit(&matrix(), 4, 3, 4, 7).unwrap();
        let x = SparseVector::from_dense(&[3.0, 0.0, 0.0, 1.0]);
        let projected = svd.transform(&x).unwrap();
        assert!((projected.norm() - x.norm()).abs() < 1e-3);
    }

    #[test]
    fn fitting_is_deterministic() {
        let a = TruncatedSvd::fit(&matrix(), 4, 2, 2, 42).unwrap();
        let b = TruncatedSvd::fit(&matrix(), 4, 2, 2, 42).unwrap();
        assert_eq!(a.components, b.components);
    }

    #[test]
    fn rejects_wider_inputs() {
        let svd = TruncatedSvd::fit(&matrix(), 4, 2, 1, 1).unwrap();
        let wide = SparseVector::from_dense(&[0.0, 0.0, 0.0, 0.0, 1.0]);
        assert!(matches!(svd.transform(&wide), Err(EngineError::DimensionMismatch { .. })));
    }

    #[test]
    fn jacobi_diagonalizes() {
        let (values, _) = jacobi_eigen(vec![vec![2.0, 1.0], vec![1.0, 2.0]]);
        let mut values = values;
        values.sort_by(f64::total_cmp);
        assert!((values[0] - 1.0).abs() < 1e-9);
        assert!((values[1] - 3.0).abs() < 1e-9);
    }
}
