//! Distance metrics for the vector index. Grounded on
//! `core::vector::similarity`'s cosine/dot implementations, adapted to the
//! spec's exact metric definitions: plain squared L2 (no square root),
//! `1 - a·b` for COSINE (vectors are unit-normalized before insertion so
//! this reuses an inner-product HNSW space), and `-a·b` for DOT so that
//! "smaller is more similar" holds uniformly across all three metrics.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    L2,
    Cosine,
    Dot,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::L2 => "L2",
            Metric::Cosine => "COSINE",
            Metric::Dot => "DOT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "L2" => Some(Metric::L2),
            "COSINE" => Some(Metric::Cosine),
            "DOT" => Some(Metric::Dot),
            _ => None,
        }
    }

    /// Distance between two vectors under this metric, smaller = more
    /// similar in all three cases. `a` and `b` are expected to already be
    /// normalized per `prepare`.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::L2 => l2_squared(a, b),
            Metric::Cosine => 1.0 - dot(a, b),
            Metric::Dot => -dot(a, b),
        }
    }

    /// Vectors are normalized to unit length for COSINE (so the stored
    /// inner product directly yields cosine similarity); L2 and DOT store
    /// the raw vector.
    pub fn prepare(&self, v: &[f32]) -> Vec<f32> {
        match self {
            Metric::Cosine => normalize(v),
            Metric::L2 | Metric::Dot => v.to_vec(),
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn normalize(v: &[f32]) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        v.to_vec()
    } else {
        v.iter().map(|x| x / norm).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l2_is_sum_of_squared_differences() {
        assert_eq!(Metric::L2.distance(&[0.0, 0.0], &[3.0, 4.0]), 25.0);
    }

    #[test]
    fn cosine_of_identical_unit_vectors_is_zero() {
        let a = Metric::Cosine.prepare(&[1.0, 0.0, 0.0]);
        let b = Metric::Cosine.prepare(&[2.0, 0.0, 0.0]);
        assert!((Metric::Cosine.distance(&a, &b)).abs() < 1e-6);
    }

    #[test]
    fn dot_is_negative_inner_product() {
        assert_eq!(Metric::Dot.distance(&[1.0, 2.0], &[3.0, 4.0]), -11.0);
    }
}
