//! Core data models used by the library.

use serde::{Deserialize, Serialize};

/// One entry written to an index: id, its embedding and the source text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: u64,
    pub vector: Vec<f32>,
    pub text: String,
}

/// Hit as returned by a backend, score still on the backend's own scale.
#[derive(Clone, Debug, PartialEq)]
pub struct RawHit {
    pub id: u64,
    pub score: f32,
    pub text: String,
}

/// A single retrieval hit with a normalized score in `[0, 1]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: u64,
    pub score: f32,
    pub text: String,
}

/// Raw score scale reported by a backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScoreScale {
    /// Cosine similarity in `[-1, 1]`.
    Cosine,
    /// Cosine similarity offset by `+1.0`, in `[0, 2]`.
    CosinePlusOne,
}

impl ScoreScale {
    /// Maps a raw score to `[0, 1]`; both scales land on `(cos + 1) / 2`.
    pub fn normalize(self, raw: f32) -> f32 {
        let s = match self {
            ScoreScale::Cosine => (raw + 1.0) / 2.0,
            ScoreScale::CosinePlusOne => raw / 2.0,
        };
        s.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_scales_agree_for_the_same_cosine() {
        for cos in [-1.0f32, -0.25, 0.0, 0.6, 1.0] {
            let a = ScoreScale::Cosine.normalize(cos);
            let b = ScoreScale::CosinePlusOne.normalize(cos + 1.0);
            assert!((a - b).abs() < 1e-6, "cos={cos}: {a} vs {b}");
        }
    }

    #[test]
    fn out_of_range_scores_are_clamped() {
        assert_eq!(ScoreScale::Cosine.normalize(1.0001), 1.0);
        assert_eq!(ScoreScale::CosinePlusOne.normalize(-0.01), 0.0);
    }
}
