//! Local ONNX Runtime embedding provider.
//!
//! Runs all-MiniLM-L6-v2 via `ort`: tokenization, inference, mean pooling
//! over the attention mask, and L2 normalization. The model and tokenizer are
//! loaded from the cache directory on [`EmbeddingProvider::load`] and dropped
//! again on unload.

use std::sync::Mutex;

use anyhow::{Context, Result};
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;

use super::{EmbeddingProvider, EMBEDDING_DIM};
use crate::config::LocalProviderConfig;

/// Model used when the caller asks for model name `"default"`.
const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";

/// Maximum sequence length for all-MiniLM-L6-v2 (trained at 256).
const MAX_SEQ_LEN: usize = 256;

/// Local ONNX-based embedding provider.
pub struct LocalProvider {
    model_name: String,
    cache_dir: String,
    runtime: Option<OnnxRuntime>,
}

struct OnnxRuntime {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
}

// Safety: Tokenizer is Send+Sync. Session is behind a Mutex.
// The Mutex guarantees exclusive access during run().
unsafe impl Send for LocalProvider {}
unsafe impl Sync for LocalProvider {}

impl LocalProvider {
    /// Construct an unloaded provider. Model name `"default"` resolves to
    /// all-MiniLM-L6-v2.
    pub fn new(model_name: &str, config: &LocalProviderConfig) -> Self {
        let model_name = if model_name == "default" {
            DEFAULT_MODEL.to_string()
        } else {
            model_name.to_string()
        };
        Self {
            model_name,
            cache_dir: config.cache_dir.clone(),
            runtime: None,
        }
    }
}

impl EmbeddingProvider for LocalProvider {
    fn load(&mut self) -> Result<()> {
        let cache_dir = crate::config::expand_tilde(&self.cache_dir);
        let model_path = cache_dir.join("model.onnx");
        let tokenizer_path = cache_dir.join("tokenizer.json");

        anyhow::ensure!(
            model_path.exists(),
            "ONNX model not found at {}. Run `vecgate model download` first.",
            model_path.display()
        );
        anyhow::ensure!(
            tokenizer_path.exists(),
            "Tokenizer not found at {}. Run `vecgate model download` first.",
            tokenizer_path.display()
        );

        let session = Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(&model_path)
            .context("failed to load ONNX model")?;

        tracing::info!(model = %model_path.display(), "ONNX model loaded");

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("failed to load tokenizer: {e}"))?;

        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: MAX_SEQ_LEN,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("failed to set truncation: {e}"))?;

        self.runtime = Some(OnnxRuntime {
            session: Mutex::new(session),
            tokenizer,
        });
        Ok(())
    }

    fn unload(&mut self) {
        self.runtime = None;
    }

    fn get_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let runtime = self
            .runtime
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("model '{}' is not loaded", self.model_name))?;

        let encoding = runtime
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("tokenization failed: {e}"))?;

        let seq_len = encoding.get_ids().len();
        anyhow::ensure!(seq_len > 0, "tokenizer produced an empty sequence");

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        // token_type_ids: all zeros (single sentence, no segment B)
        let token_type_ids = vec![0i64; seq_len];

        let shape = vec![1i64, seq_len as i64];
        let input_ids_tensor = Tensor::from_array((shape.clone(), input_ids.into_boxed_slice()))?;
        let attention_mask_tensor = Tensor::from_array((
            shape.clone(),
            attention_mask.clone().into_boxed_slice(),
        ))?;
        let token_type_ids_tensor =
            Tensor::from_array((shape, token_type_ids.into_boxed_slice()))?;

        let mut session = runtime
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("session lock poisoned: {e}"))?;

        let outputs = session.run(ort::inputs! {
            "input_ids" => input_ids_tensor,
            "attention_mask" => attention_mask_tensor,
            "token_type_ids" => token_type_ids_tensor,
        })?;

        // The output name varies by ONNX export. Try common names, fall back to index 0.
        let token_emb_value = outputs
            .get("token_embeddings")
            .or_else(|| outputs.get("last_hidden_state"))
            .unwrap_or_else(|| &outputs[0]);

        let (out_shape, data) = token_emb_value
            .try_extract_tensor::<f32>()
            .context("failed to extract token embeddings tensor")?;

        let dims: &[i64] = &out_shape;
        anyhow::ensure!(
            dims.len() == 3 && dims[0] == 1 && dims[2] == EMBEDDING_DIM as i64,
            "unexpected token embeddings shape: {dims:?}, expected [1, seq, {EMBEDDING_DIM}]"
        );
        let out_seq_len = dims[1] as usize;
        let hidden_dim = dims[2] as usize;

        // Mean pooling over non-padding tokens
        let mut sum = vec![0.0f32; hidden_dim];
        let mut count = 0.0f32;
        for s in 0..out_seq_len {
            let mask = if s < attention_mask.len() {
                attention_mask[s] as f32
            } else {
                0.0
            };
            if mask > 0.0 {
                let offset = s * hidden_dim;
                for d in 0..hidden_dim {
                    sum[d] += data[offset + d] * mask;
                }
                count += mask;
            }
        }
        if count > 0.0 {
            for d in sum.iter_mut() {
                *d /= count;
            }
        }

        Ok(l2_normalize(&sum))
    }

    fn describe(&self) -> String {
        format!("Local ONNX embedding model '{}'", self.model_name)
    }
}

/// L2-normalize a vector. Returns a zero vector if the input norm is zero.
fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}
