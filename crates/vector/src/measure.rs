//! Similarity measures
//!
//! All measures are normalized to "higher = more similar" so that search
//! results can be ranked the same way regardless of measure.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Similarity measure used by a vector index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Measure {
    /// Cosine similarity: dot(a,b) / (||a|| * ||b||)
    /// Range: [-1, 1]. Zero vectors score 0.
    #[default]
    Cosine,

    /// Raw dot product, unbounded
    Dot,

    /// Negative Euclidean distance, so closer vectors score higher
    /// Range: (-inf, 0]
    L2,
}

impl Measure {
    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Measure::Cosine => "cosine",
            Measure::Dot => "dot",
            Measure::L2 => "l2",
        }
    }

    /// Parse from string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cosine" => Some(Measure::Cosine),
            "dot" | "dot_product" => Some(Measure::Dot),
            "l2" | "euclidean" => Some(Measure::L2),
            _ => None,
        }
    }

    /// Similarity score of two equal-length vectors
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Measure::Cosine => cosine(a, b),
            Measure::Dot => dot(a, b),
            Measure::L2 => -l2(a, b),
        }
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = dot(a, a).sqrt();
    let norm_b = dot(b, b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot(a, b) / (norm_a * norm_b)
}

fn l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}
