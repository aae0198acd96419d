use async_trait::async_trait;
use dockbay_core::{EmbeddingModel, Result};

pub const DIM: usize = 16;

/// One-hot vector at `char_count % 16`; texts containing "FAIL" get no vector.
pub struct OneHot;

impl OneHot {
    pub fn vector_for(text: &str) -> Vec<f32> {
        let mut v = vec![0.0; DIM];
        v[text.chars().count() % DIM] = 1.0;
        v
    }
}

#[async_trait]
impl EmbeddingModel for OneHot {
    fn dim(&self) -> usize {
        DIM
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| if t.contains("FAIL") { Vec::new() } else { Self::vector_for(t) })
            .collect())
    }
}
