//! Persisted prediction history.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::prediction::{ModelResults, PredictionOutcome, RiskClass};

/// One stored prediction. Records are append-only and never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Unique identifier
    pub id: String,

    pub user_id: String,

    pub created_at: chrono::DateTime<chrono::Utc>,

    /// Class predicted by the primary model
    pub result: RiskClass,

    /// Primary model's risk score, in percent
    pub risk_probability: f64,

    pub advice: Option<String>,

    /// Raw attributes exactly as submitted
    pub input_snapshot: Map<String, Value>,

    /// Every model's result, keyed by model id
    pub model_scores: ModelResults,
}

impl HistoryRecord {
    /// Build a record from a completed prediction.
    ///
    /// Returns `None` when the primary model produced no result.
    #[must_use]
    pub fn from_outcome(
        user_id: impl Into<String>,
        input: &Map<String, Value>,
        outcome: &PredictionOutcome,
    ) -> Option<Self> {
        let primary = outcome.primary_prediction()?;
        Some(Self {
            id: uuid_v4(),
            user_id: user_id.into(),
            created_at: chrono::Utc::now(),
            result: primary.class,
            risk_probability: primary.risk_score,
            advice: outcome.advice.clone(),
            input_snapshot: input.clone(),
            model_scores: outcome.results.clone(),
        })
    }
}

/// Generate a random UUID v4 using a CSPRNG.
///
/// Uses ChaCha20Rng seeded from OS entropy so identifiers are unpredictable
/// on all platforms.
#[must_use]
pub fn uuid_v4() -> String {
    use rand::Rng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    let mut rng = ChaCha20Rng::from_entropy();
    let bytes: [u8; 16] = rng.gen();

    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3],
        bytes[4], bytes[5],
        (bytes[6] & 0x0f) | 0x40, bytes[7],
        (bytes[8] & 0x3f) | 0x80, bytes[9],
        bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15]
    )
}
