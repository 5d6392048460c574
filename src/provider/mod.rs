//! Embedding providers — adapters that turn text into numeric vectors.
//!
//! Defines the [`EmbeddingProvider`] capability contract and the finite set of
//! supported provider kinds: a local ONNX model ([`local`]) and a remote
//! Ollama proxy ([`ollama`]). Providers are stateful: they are constructed
//! unloaded, acquire their backend resources in [`EmbeddingProvider::load`],
//! and release them in [`EmbeddingProvider::unload`].

pub mod local;
pub mod ollama;

use anyhow::Result;

/// Number of dimensions produced by the local provider (all-MiniLM-L6-v2).
pub const EMBEDDING_DIM: usize = 384;

/// Capability contract for embedding providers.
///
/// All methods are synchronous — callers in async contexts should use
/// `tokio::task::spawn_blocking`. Failures are reported through `Result`;
/// nothing panics across this boundary. Callers must not invoke `load` twice
/// without an intervening `unload`.
pub trait EmbeddingProvider: Send + Sync {
    /// Acquire backend resources (model files, HTTP client).
    fn load(&mut self) -> Result<()>;

    /// Release backend resources. Always succeeds.
    fn unload(&mut self);

    /// Embed a single text string into a vector.
    fn get_embedding(&self, text: &str) -> Result<Vec<f32>>;

    /// Human-readable description for registry listings.
    fn describe(&self) -> String;
}

/// The finite set of supported provider kinds, matched exhaustively at
/// construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Local ONNX Runtime model.
    Default,
    /// Remote Ollama embedding proxy.
    Ollama,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Ollama => "ollama",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Self::Default),
            "ollama" => Ok(Self::Ollama),
            _ => Err(format!("unsupported provider type: {s}")),
        }
    }
}
