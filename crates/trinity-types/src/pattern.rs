use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Kind of pattern detected by WITNESS. The set is open-ended (spec: "one of
/// {failure, opportunity, user_intent, ...}"), so known kinds get their own
/// variant for exhaustive matching in ARCHITECT's complexity scoring, with
/// `Other` carrying anything a pattern detector invents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatternType {
    Failure,
    Opportunity,
    UserIntent,
    ConstitutionalViolation,
    CodeDuplication,
    MissingTests,
    Other(String),
}

impl PatternType {
    pub fn as_str(&self) -> &str {
        match self {
            PatternType::Failure => "failure",
            PatternType::Opportunity => "opportunity",
            PatternType::UserIntent => "user_intent",
            PatternType::ConstitutionalViolation => "constitutional_violation",
            PatternType::CodeDuplication => "code_duplication",
            PatternType::MissingTests => "missing_tests",
            PatternType::Other(s) => s,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "failure" => PatternType::Failure,
            "opportunity" => PatternType::Opportunity,
            "user_intent" => PatternType::UserIntent,
            "constitutional_violation" => PatternType::ConstitutionalViolation,
            "code_duplication" => PatternType::CodeDuplication,
            "missing_tests" => PatternType::MissingTests,
            other => PatternType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for PatternType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PatternType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PatternTypeVisitor;
        impl Visitor<'_> for PatternTypeVisitor {
            type Value = PatternType;
            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a pattern type string")
            }
            fn visit_str<E: de::Error>(self, v: &str) -> Result<PatternType, E> {
                Ok(PatternType::parse(v))
            }
        }
        deserializer.deserialize_str(PatternTypeVisitor)
    }
}

/// A durable, deduplicated pattern row (§3 of the spec).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub id: i64,
    pub pattern_type: PatternType,
    pub pattern_name: String,
    pub content: String,
    pub confidence: f64,
    pub evidence_count: u32,
    pub times_seen: u32,
    pub times_successful: u32,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Option<Value>,
    pub embedding_id: Option<i64>,
}

impl Pattern {
    /// `success_rate` per spec.md §9's resolution of the ambiguous source
    /// behavior: clamp `times_successful` to `times_seen` before dividing,
    /// and never divide by zero.
    pub fn success_rate(&self) -> f64 {
        let successful = self.times_successful.min(self.times_seen);
        successful as f64 / self.times_seen.max(1) as f64
    }
}
