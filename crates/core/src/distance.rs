//! The distance-function catalog (spec.md §1 — "named distance metrics").

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Distance {
  L2,
  Cosine,
  Dot,
}

impl Distance {
  pub fn as_str(&self) -> &'static str {
    match self {
      Distance::L2 => "L2",
      Distance::Cosine => "COSINE",
      Distance::Dot => "DOT",
    }
  }

  /// Lower is closer for every metric here: cosine and dot are negated so
  /// that "smallest distance wins" holds uniformly for callers doing a
  /// top-k selection (spec.md treats distance as "non-negative real";
  /// dot/cosine are turned into a distance by negation, a standard trick).
  pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    match self {
      Distance::L2 => a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f32>().sqrt(),
      Distance::Cosine => {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let nb = b.iter().map(|y| y * y).sum::<f32>().sqrt();
        if na == 0.0 || nb == 0.0 { 1.0 } else { 1.0 - dot / (na * nb) }
      }
      Distance::Dot => -a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>(),
    }
  }
}

impl fmt::Display for Distance {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unrecognized distance metric: {0}")]
pub struct ParseDistanceError(pub String);

impl std::str::FromStr for Distance {
  type Err = ParseDistanceError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_uppercase().as_str() {
      "L2" => Ok(Distance::L2),
      "COSINE" => Ok(Distance::Cosine),
      "DOT" => Ok(Distance::Dot),
      other => Err(ParseDistanceError(other.to_string())),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn l2_of_identical_vectors_is_zero() {
    let v = vec![1.0, 2.0, 3.0];
    assert_eq!(Distance::L2.distance(&v, &v), 0.0);
  }

  #[test]
  fn cosine_of_identical_vectors_is_zero() {
    let v = vec![1.0, 2.0, 3.0];
    assert!(Distance::Cosine.distance(&v, &v).abs() < 1e-6);
  }

  #[test]
  fn round_trips_through_display_and_parse() {
    for d in [Distance::L2, Distance::Cosine, Distance::Dot] {
      let parsed: Distance = d.to_string().parse().unwrap();
      assert_eq!(parsed, d);
    }
  }

  #[test]
  fn parse_is_case_insensitive() {
    assert_eq!("l2".parse::<Distance>().unwrap(), Distance::L2);
    assert_eq!("cosine".parse::<Distance>().unwrap(), Distance::Cosine);
  }
}
