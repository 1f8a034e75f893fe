use serde::{Deserialize, Serialize};

/// Body of `POST /api/applications/:id/score`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRequest {
    pub organization_id: i64,
}

/// Body of `POST /api/jobs/:id/score-batch`. `rescore` selects the forced
/// mode that re-scores every application instead of only unscored ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchScoreRequest {
    pub organization_id: i64,
    #[serde(default)]
    pub rescore: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rescore_defaults_to_false() {
        let request: BatchScoreRequest =
            serde_json::from_str(r#"{"organization_id": 7}"#).unwrap();
        assert_eq!(request.organization_id, 7);
        assert!(!request.rescore);
    }
}
