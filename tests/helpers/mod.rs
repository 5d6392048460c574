#![allow(dead_code)]

use anyhow::Result;
use vecgate::provider::EmbeddingProvider;

/// Deterministic embedding provider for tests. Every call returns the same
/// vector: a spike at `seed` over `dim` dimensions.
pub struct StubProvider {
    pub dim: usize,
    pub seed: usize,
    pub label: String,
}

impl StubProvider {
    pub fn boxed(dim: usize, seed: usize, label: &str) -> Box<dyn EmbeddingProvider> {
        Box::new(Self {
            dim,
            seed,
            label: label.to_string(),
        })
    }
}

impl EmbeddingProvider for StubProvider {
    fn load(&mut self) -> Result<()> {
        Ok(())
    }

    fn unload(&mut self) {}

    fn get_embedding(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(test_embedding(self.dim, self.seed))
    }

    fn describe(&self) -> String {
        format!("stub provider '{}'", self.label)
    }
}

/// Generate a deterministic embedding with a spike at position `seed`.
/// Each seed produces a distinct, orthogonal-ish vector.
pub fn test_embedding(dim: usize, seed: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; dim];
    v[seed % dim] = 1.0;
    v
}
