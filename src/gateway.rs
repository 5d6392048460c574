//! Gateway orchestrator: coordinates the provider registry with the vector
//! store.
//!
//! [`Gateway`] is constructed once at process start and shared via `Arc`; a
//! mutex serializes registry access and another serializes the store handle.
//! Startup pre-loads optional providers and connects the mandatory vector
//! store, reporting each step in a [`StartupReport`] rather than printing —
//! presentation stays with the caller.

use std::sync::Mutex;

use serde::Serialize;

use crate::config::GatewayConfig;
use crate::outcome::{GatewayError, Outcome};
use crate::registry::{derive_model_id, LoadedModel, ModelInfo, ModelRegistry};
use crate::store::{create_store, DocumentRecord, VectorStore};

/// Fixed id the local provider is pre-loaded under at startup. Matches the
/// store's default embedding name so unconfigured setups resolve out of the
/// box.
pub const LOCAL_MODEL_ID: &str = "default";

/// Fixed id the Ollama proxy is pre-loaded under at startup.
pub const OLLAMA_MODEL_ID: &str = "ollama";

/// One startup step and its outcome.
#[derive(Debug, Serialize)]
pub struct StartupStep {
    pub step: &'static str,
    pub outcome: Outcome,
}

/// Report returned from [`Gateway::bootstrap`]. Providers are optional;
/// the vector store is mandatory, so [`succeeded`](Self::succeeded) reflects
/// the store step alone.
#[derive(Debug, Default, Serialize)]
pub struct StartupReport {
    pub steps: Vec<StartupStep>,
    store_connected: bool,
}

impl StartupReport {
    fn push(&mut self, step: &'static str, outcome: Outcome) {
        self.steps.push(StartupStep { step, outcome });
    }

    pub fn succeeded(&self) -> bool {
        self.store_connected
    }
}

/// The orchestrator. Owns the only registry and the only store handle in the
/// process.
pub struct Gateway {
    registry: Mutex<ModelRegistry>,
    store: Option<Mutex<Box<dyn VectorStore>>>,
}

impl Gateway {
    /// Construct a gateway with an explicit store handle (or none). Startup
    /// normally goes through [`bootstrap`](Self::bootstrap) instead.
    pub fn new(config: &GatewayConfig, store: Option<Box<dyn VectorStore>>) -> Self {
        Self {
            registry: Mutex::new(ModelRegistry::new(config.provider.clone())),
            store: store.map(Mutex::new),
        }
    }

    /// Pre-load configured providers and connect the vector store.
    ///
    /// Each step reports independently; a provider failure never aborts the
    /// remaining steps. The returned report's `succeeded()` is false only
    /// when the store connection failed.
    pub fn bootstrap(config: &GatewayConfig) -> (Self, StartupReport) {
        let mut gateway = Self::new(config, None);
        let mut report = StartupReport::default();

        if config.provider.local.enabled {
            let result = gateway.load_model(
                "default",
                &config.provider.local.model,
                Some(LOCAL_MODEL_ID),
                None,
            );
            report.push("local provider", load_outcome(result));
        }

        if config.provider.ollama.enabled {
            let result = gateway.load_model(
                "ollama",
                &config.provider.ollama.model,
                Some(OLLAMA_MODEL_ID),
                None,
            );
            report.push("ollama provider", load_outcome(result));
        }

        match create_store(&config.store) {
            Ok(store) if store.is_valid() => {
                report.push(
                    "vector store",
                    Outcome::success(format!(
                        "connected to '{}' collection '{}'",
                        config.store.backend, config.store.collection
                    )),
                );
                report.store_connected = true;
                gateway.store = Some(Mutex::new(store));
            }
            Ok(_) => {
                report.push(
                    "vector store",
                    GatewayError::Internal("vector store probe failed".into()).into(),
                );
            }
            Err(e) => {
                report.push(
                    "vector store",
                    GatewayError::Internal(format!("vector store connection failed: {e}")).into(),
                );
            }
        }

        (gateway, report)
    }

    // ---- model operations -------------------------------------------------

    pub fn list_models(&self) -> Result<Vec<ModelInfo>, GatewayError> {
        Ok(self.lock_registry()?.list())
    }

    pub fn load_model(
        &self,
        model_type: &str,
        model_name: &str,
        model_id: Option<&str>,
        parameters: Option<&serde_json::Value>,
    ) -> Result<LoadedModel, GatewayError> {
        self.lock_registry()?
            .load(model_type, model_name, model_id, parameters)
    }

    /// Register an already-initialized provider under the derived id.
    pub fn insert_provider(
        &self,
        model_type: &str,
        model_name: &str,
        model_id: Option<&str>,
        provider: Box<dyn crate::provider::EmbeddingProvider>,
    ) -> Result<LoadedModel, GatewayError> {
        Ok(self
            .lock_registry()?
            .insert_loaded(model_type, model_name, model_id, provider))
    }

    pub fn unload_model(
        &self,
        model_type: &str,
        model_name: &str,
        model_id: Option<&str>,
    ) -> Result<String, GatewayError> {
        self.lock_registry()?
            .unload(model_type, model_name, model_id, true)
    }

    /// Unload every model; returns the count unloaded.
    pub fn unload_all_models(&self) -> Result<usize, GatewayError> {
        Ok(self.lock_registry()?.unload_all())
    }

    /// Embed `text` with the addressed model, loading it first when needed.
    ///
    /// The auto-load reuses the regular load path; any failure there is
    /// reported as NotFound. An empty embedding from the provider is an
    /// internal error.
    pub fn embed(
        &self,
        text: &str,
        model_type: &str,
        model_name: &str,
        model_id: Option<&str>,
    ) -> Result<Vec<f32>, GatewayError> {
        let mut registry = self.lock_registry()?;
        let id = derive_model_id(model_type, model_name, model_id);

        if registry.resolve(&id).is_none() {
            if let Err(e) = registry.load(model_type, model_name, model_id, None) {
                tracing::warn!(id = %id, error = %e, "auto-load failed");
                return Err(GatewayError::NotFound("model not found".into()));
            }
        }
        let provider = registry
            .resolve(&id)
            .ok_or_else(|| GatewayError::NotFound("model not found".into()))?;

        let embedding = provider
            .get_embedding(text)
            .map_err(|e| GatewayError::Internal(format!("embedding failed: {e}")))?;
        if embedding.is_empty() {
            return Err(GatewayError::Internal("invalid embedding detected".into()));
        }
        Ok(embedding)
    }

    // ---- document operations ----------------------------------------------

    /// Nearest-neighbor query. Synthesizes the query embedding from
    /// `document` via the store's default provider when none is supplied.
    pub fn query_documents(
        &self,
        max_records: usize,
        document: Option<&str>,
        embedding: Option<Vec<f32>>,
        filter: Option<&serde_json::Value>,
    ) -> Result<Vec<DocumentRecord>, GatewayError> {
        let store = self.lock_store()?;
        let embedding = self.resolve_embedding(&**store, document, embedding)?;
        store
            .query_documents(max_records, &embedding, filter)
            .map_err(|e| GatewayError::Internal(format!("vector query failed: {e}")))
    }

    /// Upsert a document. The id is mandatory; a missing embedding is
    /// synthesized from the document text.
    pub fn learn_document(&self, mut doc: DocumentRecord) -> Result<(), GatewayError> {
        if doc.id.trim().is_empty() {
            return Err(GatewayError::BadRequest("document id is required".into()));
        }
        let mut store = self.lock_store()?;
        let embedding = self.resolve_embedding(
            &**store,
            doc.document.as_deref(),
            doc.embedding.take().filter(|e| !e.is_empty()),
        )?;
        doc.embedding = Some(embedding);
        store
            .learn_document(&doc)
            .map_err(|e| GatewayError::Internal(format!("document store failed: {e}")))
    }

    pub fn count_documents(&self) -> Result<u64, GatewayError> {
        let store = self.lock_store()?;
        store
            .count()
            .map_err(|e| GatewayError::Internal(format!("document count failed: {e}")))
    }

    // ---- internals ---------------------------------------------------------

    /// Use the supplied embedding when present (empty counts as absent),
    /// otherwise synthesize one from `document` via the store's configured
    /// default provider. That provider must already be loaded — this path
    /// never auto-loads.
    fn resolve_embedding(
        &self,
        store: &dyn VectorStore,
        document: Option<&str>,
        embedding: Option<Vec<f32>>,
    ) -> Result<Vec<f32>, GatewayError> {
        if let Some(embedding) = embedding.filter(|e| !e.is_empty()) {
            return Ok(embedding);
        }
        let Some(text) = document else {
            return Err(GatewayError::BadRequest(
                "either document or embedding is required".into(),
            ));
        };

        let name = store.embedding_name().to_string();
        let registry = self.lock_registry()?;
        let provider = registry.resolve(&name).ok_or_else(|| {
            GatewayError::BadRequest(format!("default embedding provider '{name}' is not loaded"))
        })?;
        let embedding = provider
            .get_embedding(text)
            .map_err(|e| GatewayError::BadRequest(format!("embedding synthesis failed: {e}")))?;
        if embedding.is_empty() {
            return Err(GatewayError::BadRequest(
                "embedding synthesis produced an empty vector".into(),
            ));
        }
        Ok(embedding)
    }

    fn lock_registry(&self) -> Result<std::sync::MutexGuard<'_, ModelRegistry>, GatewayError> {
        self.registry
            .lock()
            .map_err(|_| GatewayError::Internal("registry lock poisoned".into()))
    }

    fn lock_store(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, Box<dyn VectorStore>>, GatewayError> {
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| GatewayError::BadRequest("no vector engine connected".into()))?;
        store
            .lock()
            .map_err(|_| GatewayError::Internal("store lock poisoned".into()))
    }
}

fn load_outcome(result: Result<LoadedModel, GatewayError>) -> Outcome {
    match result {
        Ok(loaded) => Outcome::success(format!("model '{}' loaded", loaded.id)),
        Err(e) => e.into(),
    }
}
