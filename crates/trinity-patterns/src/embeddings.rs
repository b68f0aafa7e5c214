// Embedding service: generates fixed-dimension dense vectors for pattern
// content so the store can do approximate-nearest-neighbor search. Degrades
// gracefully to a disabled state whenever the local-embeddings feature is
// off or model initialization fails.

use crate::types::{PatternError, PatternResult, DEFAULT_EMBEDDING_DIMENSION, DEFAULT_EMBEDDING_MODEL};

#[cfg(feature = "local-embeddings")]
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

/// Embedding service for generating vector representations. When built
/// without the `local-embeddings` feature, or when model initialization
/// fails, `is_available()` returns `false` and `embed`/`embed_batch` return
/// [`PatternError::Embedding`] — callers fall back to the structured-only
/// search path (§4.2).
pub struct EmbeddingService {
    model_name: String,
    dimension: usize,
    #[cfg(feature = "local-embeddings")]
    model: Option<TextEmbedding>,
    disabled_reason: Option<String>,
}

impl EmbeddingService {
    pub fn new() -> Self {
        Self::with_model(
            DEFAULT_EMBEDDING_MODEL.to_string(),
            DEFAULT_EMBEDDING_DIMENSION,
        )
    }

    pub fn with_model(model_name: String, dimension: usize) -> Self {
        let (model, disabled_reason) = Self::init_model(&model_name);

        if let Some(reason) = &disabled_reason {
            tracing::warn!(
                target: "trinity.patterns",
                "embeddings disabled: model={} reason={}",
                model_name,
                reason
            );
        } else {
            tracing::info!(
                target: "trinity.patterns",
                "embeddings enabled: model={} dimension={}",
                model_name,
                dimension
            );
        }

        Self {
            model_name,
            dimension,
            #[cfg(feature = "local-embeddings")]
            model,
            disabled_reason,
        }
    }

    #[cfg(feature = "local-embeddings")]
    fn init_model(model_name: &str) -> (Option<TextEmbedding>, Option<String>) {
        let Some(parsed_model) = Self::parse_model_id(model_name) else {
            return (
                None,
                Some(format!(
                    "unsupported embedding model id '{}'; supported: {}",
                    model_name, DEFAULT_EMBEDDING_MODEL
                )),
            );
        };

        let options = InitOptions::new(parsed_model);

        match TextEmbedding::try_new(options) {
            Ok(model) => (Some(model), None),
            Err(err) => (
                None,
                Some(format!(
                    "failed to initialize embedding model '{}': {}",
                    model_name, err
                )),
            ),
        }
    }

    #[cfg(not(feature = "local-embeddings"))]
    fn init_model(_model_name: &str) -> (Option<()>, Option<String>) {
        (
            None,
            Some("local-embeddings feature not enabled".to_string()),
        )
    }

    #[cfg(feature = "local-embeddings")]
    fn parse_model_id(model_name: &str) -> Option<EmbeddingModel> {
        match model_name.trim().to_ascii_lowercase().as_str() {
            "all-minilm-l6-v2" | "all_minilm_l6_v2" => Some(EmbeddingModel::AllMiniLML6V2),
            _ => None,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Returns whether semantic embeddings are currently available.
    pub fn is_available(&self) -> bool {
        #[cfg(feature = "local-embeddings")]
        {
            self.model.is_some()
        }
        #[cfg(not(feature = "local-embeddings"))]
        {
            false
        }
    }

    pub fn disabled_reason(&self) -> Option<&str> {
        self.disabled_reason.as_deref()
    }

    fn unavailable_error(&self) -> PatternError {
        let reason = self
            .disabled_reason
            .as_deref()
            .unwrap_or("embedding backend unavailable");
        PatternError::Embedding(format!("embeddings disabled: {reason}"))
    }

    fn ensure_dimension(&self, embedding: &[f32]) -> PatternResult<()> {
        if embedding.len() != self.dimension {
            return Err(PatternError::Embedding(format!(
                "embedding dimension mismatch: expected {}, got {}",
                self.dimension,
                embedding.len()
            )));
        }
        Ok(())
    }

    #[cfg(feature = "local-embeddings")]
    pub async fn embed(&self, text: &str) -> PatternResult<Vec<f32>> {
        let Some(model) = self.model.as_ref() else {
            return Err(self.unavailable_error());
        };

        let mut embeddings = model
            .embed(vec![text.to_string()], None)
            .map_err(|e| PatternError::Embedding(e.to_string()))?;
        let embedding = embeddings
            .pop()
            .ok_or_else(|| PatternError::Embedding("no embedding generated".to_string()))?;
        self.ensure_dimension(&embedding)?;
        Ok(embedding)
    }

    #[cfg(not(feature = "local-embeddings"))]
    pub async fn embed(&self, _text: &str) -> PatternResult<Vec<f32>> {
        Err(self.unavailable_error())
    }

    #[cfg(feature = "local-embeddings")]
    pub async fn embed_batch(&self, texts: &[String]) -> PatternResult<Vec<Vec<f32>>> {
        let Some(model) = self.model.as_ref() else {
            return Err(self.unavailable_error());
        };

        let embeddings = model
            .embed(texts.to_vec(), None)
            .map_err(|e| PatternError::Embedding(e.to_string()))?;

        for embedding in &embeddings {
            self.ensure_dimension(embedding)?;
        }

        Ok(embeddings)
    }

    #[cfg(not(feature = "local-embeddings"))]
    pub async fn embed_batch(&self, _texts: &[String]) -> PatternResult<Vec<Vec<f32>>> {
        Err(self.unavailable_error())
    }

}

impl Default for EmbeddingService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embed_dimension_or_unavailable() {
        let service = EmbeddingService::new();

        if !service.is_available() {
            let err = service.embed("Hello world").await.unwrap_err();
            assert!(err.to_string().contains("embeddings disabled"));
            return;
        }

        let embedding = service.embed("Hello world").await.unwrap();
        assert_eq!(embedding.len(), DEFAULT_EMBEDDING_DIMENSION);
    }
}
