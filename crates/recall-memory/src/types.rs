use serde::{Deserialize, Serialize};

/// Payload field holding the caller-visible record id.
pub const FIELD_ID: &str = "id";
/// Payload field holding the original text.
pub const FIELD_TEXT: &str = "text";
pub const FIELD_CREATED_AT: &str = "created_at";
pub const FIELD_UPDATED_AT: &str = "updated_at";

/// The persisted unit: text, its embedding and bookkeeping timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub text: String,
    /// Empty when the record was read back from an engine that does not return vectors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,
    /// Seconds since the Unix epoch.
    pub created_at: i64,
    /// Seconds since the Unix epoch.
    pub updated_at: i64,
}

impl MemoryRecord {
    /// Build a record stamped with the current time.
    #[must_use]
    pub fn new(id: impl Into<String>, text: impl Into<String>, embedding: Vec<f32>) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: id.into(),
            text: text.into(),
            embedding,
            created_at: now,
            updated_at: now,
        }
    }

    /// Drop the vector, keeping only what callers display.
    #[must_use]
    pub fn without_embedding(mut self) -> Self {
        self.embedding = Vec::new();
        self
    }
}

/// A ranked hit. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub text: String,
    /// Raw L2 distance reported by the engine; lower is closer.
    pub distance: f32,
    /// `1 / (1 + distance)`, in `(0, 1]`.
    pub score: f32,
}

/// Normalize an L2 distance into a similarity score.
///
/// Strictly decreasing in `distance`; negative inputs are clamped to zero so the result
/// stays in `(0, 1]`.
#[must_use]
pub fn distance_to_score(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn zero_distance_scores_one() {
        assert!((distance_to_score(0.0) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn unit_distance_scores_half() {
        assert!((distance_to_score(1.0) - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn negative_distance_clamped() {
        assert!((distance_to_score(-3.0) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn new_record_sets_equal_timestamps() {
        let r = MemoryRecord::new("a", "hello", vec![1.0]);
        assert_eq!(r.created_at, r.updated_at);
        assert!(r.created_at > 0);
    }

    #[test]
    fn serialized_record_omits_empty_embedding() {
        let r = MemoryRecord::new("a", "hello", vec![1.0]).without_embedding();
        let json = serde_json::to_value(&r).unwrap();
        assert!(json.get("embedding").is_none());
        assert_eq!(json["id"], "a");
    }

    proptest! {
        #[test]
        fn score_in_unit_interval(d in 0.0_f32..1.0e6) {
            let s = distance_to_score(d);
            prop_assert!(s > 0.0 && s <= 1.0);
        }

        #[test]
        fn score_strictly_decreasing(a in 0.0_f32..1.0e3, delta in 1.0e-2_f32..1.0e3) {
            prop_assert!(distance_to_score(a + delta) < distance_to_score(a));
        }
    }
}
