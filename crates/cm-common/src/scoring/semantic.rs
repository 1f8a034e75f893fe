//! Semantic similarity adapter: one batched embeddings call, raw cosine
//! similarity, then a fixed rescale into 0-100.

use async_trait::async_trait;

use super::ScoringError;
use crate::llm::InferenceClient;

/// Observed resume/job cosine similarities cluster between ~0.45 (weak) and
/// ~0.85 (strong); the linear map sends 0.45 to 0 and 0.85 to 100. The
/// constants are a compatibility contract, do not tune them casually.
pub const SIMILARITY_FLOOR: f32 = 0.45;
pub const SIMILARITY_SCALE: f32 = 250.0;

/// Raw cosine similarity in [-1, 1]. Dimension mismatches and zero vectors
/// yield 0 rather than an error.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        tracing::warn!(
            a_len = a.len(),
            b_len = b.len(),
            "embedding dimension mismatch; returning zero similarity"
        );
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// `clamp(round(max(0, (similarity - 0.45) * 250)), 0, 100)`
pub fn rescale_similarity(similarity: f32) -> u8 {
    let scaled = ((similarity - SIMILARITY_FLOOR) * SIMILARITY_SCALE).max(0.0);
    scaled.round().clamp(0.0, 100.0) as u8
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed every input in one batched call, preserving order.
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ScoringError>;
}

#[async_trait]
impl EmbeddingProvider for InferenceClient {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ScoringError> {
        Ok(self.create_embeddings(texts).await?)
    }
}

/// 0-100 semantic score for one candidate/job pair.
pub async fn semantic_score(
    provider: &dyn EmbeddingProvider,
    candidate_text: &str,
    job_text: &str,
) -> Result<u8, ScoringError> {
    let embeddings = provider.embed(&[candidate_text, job_text]).await?;

    let [candidate, job] = embeddings.as_slice() else {
        return Err(ScoringError::ExternalService(format!(
            "embedding batch returned {} vectors, expected 2",
            embeddings.len()
        )));
    };

    Ok(rescale_similarity(cosine_similarity(candidate, job)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::testing::FixedEmbeddings;

    #[test]
    fn identical_vectors_have_similarity_one() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn orthogonal_vectors_have_similarity_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn opposite_vectors_have_negative_similarity() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn zero_vectors_yield_zero_similarity() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn dimension_mismatch_yields_zero_similarity() {
        assert_eq!(cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn rescale_follows_the_contract_points() {
        assert_eq!(rescale_similarity(1.0), 100); // (1-0.45)*250 = 137.5, clamped
        assert_eq!(rescale_similarity(0.85), 100);
        assert_eq!(rescale_similarity(0.65), 50);
        assert_eq!(rescale_similarity(0.45), 0);
        assert_eq!(rescale_similarity(0.2), 0); // negative before clamp
        assert_eq!(rescale_similarity(-1.0), 0);
    }

    #[tokio::test]
    async fn semantic_score_joins_the_batched_embeddings() {
        // Identical vectors: similarity 1.0, rescaled to 100.
        let provider = FixedEmbeddings::new(vec![vec![0.6, 0.8], vec![0.6, 0.8]]);
        let score = semantic_score(&provider, "candidate", "job").await.unwrap();
        assert_eq!(score, 100);
    }

    #[tokio::test]
    async fn wrong_arity_is_an_external_service_error() {
        let provider = FixedEmbeddings::new(vec![vec![1.0]]);
        let err = semantic_score(&provider, "candidate", "job")
            .await
            .unwrap_err();
        assert!(matches!(err, ScoringError::ExternalService(_)));
    }
}
