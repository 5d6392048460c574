//! Provider lifecycle registry.
//!
//! Owns the mapping from derived model id to loaded provider instance and
//! implements load, unload, listing, and lookup. Identity is decided solely
//! by [`derive_model_id`]; records are kept in insertion order. The registry
//! itself is not synchronized — the gateway wraps it in a mutex.

use std::str::FromStr;

use serde::Serialize;

use crate::config::ProvidersConfig;
use crate::outcome::GatewayError;
use crate::provider::{local::LocalProvider, ollama::OllamaProvider, EmbeddingProvider, ProviderKind};

/// Placeholder id emitted by UI forms; treated the same as an absent id.
pub const PLACEHOLDER_ID: &str = "string";

/// Derive the registry key for a provider.
///
/// Pure and referentially stable: an explicit id wins verbatim (unless empty
/// or the [`PLACEHOLDER_ID`] sentinel), the `default` type maps to the bare
/// model name, and any other type prefixes the name with `"{type}::"`.
pub fn derive_model_id(model_type: &str, model_name: &str, model_id: Option<&str>) -> String {
    match model_id {
        Some(id) if !id.is_empty() && id != PLACEHOLDER_ID => id.to_string(),
        _ if model_type == "default" => model_name.to_string(),
        _ => format!("{model_type}::{model_name}"),
    }
}

/// A loaded provider owned by the registry. Callers never receive the
/// instance itself, only its id and description.
struct ProviderRecord {
    id: String,
    description: String,
    provider: Box<dyn EmbeddingProvider>,
}

/// Listing entry returned by [`ModelRegistry::list`].
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub description: String,
}

/// Result of a successful load: the resolved id and the provider description.
#[derive(Debug, Clone, Serialize)]
pub struct LoadedModel {
    pub id: String,
    pub description: String,
}

/// The provider registry. At most one loaded provider per derived id.
pub struct ModelRegistry {
    config: ProvidersConfig,
    records: Vec<ProviderRecord>,
}

impl ModelRegistry {
    pub fn new(config: ProvidersConfig) -> Self {
        Self {
            config,
            records: Vec::new(),
        }
    }

    /// Derive the id and check membership.
    pub fn is_loaded(&self, model_type: &str, model_name: &str, model_id: Option<&str>) -> bool {
        let id = derive_model_id(model_type, model_name, model_id);
        self.position(&id).is_some()
    }

    /// Validate the provider type, construct and load the provider, then
    /// store it under the derived id.
    ///
    /// An unsupported type is rejected before any mutation. Provider load
    /// failures are reported with the provider's reason. `parameters` carries
    /// per-load overrides for the provider (the Ollama kind reads `url` and
    /// `model`); absent keys fall back to the process config.
    pub fn load(
        &mut self,
        model_type: &str,
        model_name: &str,
        model_id: Option<&str>,
        parameters: Option<&serde_json::Value>,
    ) -> Result<LoadedModel, GatewayError> {
        let kind = ProviderKind::from_str(model_type).map_err(GatewayError::BadRequest)?;

        let mut provider: Box<dyn EmbeddingProvider> = match kind {
            ProviderKind::Default => {
                Box::new(LocalProvider::new(model_name, &self.config.local))
            }
            ProviderKind::Ollama => {
                Box::new(OllamaProvider::new(model_name, &self.config.ollama, parameters))
            }
        };

        provider.load().map_err(|e| {
            GatewayError::BadRequest(format!("loading model '{model_name}' failed: {e}"))
        })?;

        Ok(self.insert_loaded(model_type, model_name, model_id, provider))
    }

    /// Register an already-initialized provider under the derived id.
    ///
    /// Used by [`load`](Self::load) and available to callers that bring their
    /// own [`EmbeddingProvider`] implementation. Last load wins: an existing
    /// record under the same id is replaced without an unload call, so
    /// resource release is left to the old provider's `Drop`. Known leak risk
    /// for providers whose backends need an explicit unload.
    pub fn insert_loaded(
        &mut self,
        model_type: &str,
        model_name: &str,
        model_id: Option<&str>,
        provider: Box<dyn EmbeddingProvider>,
    ) -> LoadedModel {
        let id = derive_model_id(model_type, model_name, model_id);
        let description = provider.describe();
        let record = ProviderRecord {
            id: id.clone(),
            description: description.clone(),
            provider,
        };
        match self.position(&id) {
            Some(pos) => self.records[pos] = record,
            None => self.records.push(record),
        }
        tracing::info!(id = %id, %description, "model loaded");
        LoadedModel { id, description }
    }

    /// Unload the provider under the derived id.
    ///
    /// The provider's `unload` is best-effort; once the record exists the
    /// operation succeeds. The record is removed only when
    /// `delete_from_cache` is set.
    pub fn unload(
        &mut self,
        model_type: &str,
        model_name: &str,
        model_id: Option<&str>,
        delete_from_cache: bool,
    ) -> Result<String, GatewayError> {
        let id = derive_model_id(model_type, model_name, model_id);
        let pos = self
            .position(&id)
            .ok_or_else(|| GatewayError::BadRequest(format!("model '{id}' not loaded")))?;

        self.records[pos].provider.unload();
        if delete_from_cache {
            self.records.remove(pos);
        }
        tracing::info!(id = %id, "model unloaded");
        Ok(id)
    }

    /// Unload every record, then clear the whole map at the end.
    /// Returns the number of records unloaded.
    pub fn unload_all(&mut self) -> usize {
        let count = self.records.len();
        // unload while iterating without removing; the collection is cleared
        // in one step afterwards
        for record in &mut self.records {
            record.provider.unload();
        }
        self.records.clear();
        count
    }

    /// Snapshot of all records in insertion order.
    pub fn list(&self) -> Vec<ModelInfo> {
        self.records
            .iter()
            .map(|r| ModelInfo {
                id: r.id.clone(),
                description: r.description.clone(),
            })
            .collect()
    }

    /// Direct lookup by id, no side effects.
    pub fn resolve(&self, id: &str) -> Option<&dyn EmbeddingProvider> {
        self.position(id).map(|pos| &*self.records[pos].provider)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.records.iter().position(|r| r.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    struct StubProvider {
        dim: usize,
        label: String,
    }

    impl StubProvider {
        fn boxed(dim: usize, label: &str) -> Box<dyn EmbeddingProvider> {
            Box::new(Self {
                dim,
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
            Ok(vec![0.1; self.dim])
        }
        fn describe(&self) -> String {
            format!("stub '{}'", self.label)
        }
    }

    fn registry() -> ModelRegistry {
        ModelRegistry::new(ProvidersConfig::default())
    }

    #[test]
    fn derive_is_pure_and_idempotent() {
        let a = derive_model_id("custom", "modelA", None);
        let b = derive_model_id("custom", "modelA", None);
        assert_eq!(a, b);
        assert_eq!(a, "custom::modelA");
    }

    #[test]
    fn derive_prefers_explicit_id() {
        assert_eq!(derive_model_id("default", "x", Some("my-id")), "my-id");
        assert_eq!(derive_model_id("custom", "x", Some("my-id")), "my-id");
    }

    #[test]
    fn derive_treats_placeholder_as_absent() {
        assert_eq!(derive_model_id("default", "modelA", Some("string")), "modelA");
        assert_eq!(derive_model_id("default", "modelA", Some("")), "modelA");
    }

    #[test]
    fn derive_uses_bare_name_for_default_type() {
        assert_eq!(derive_model_id("default", "modelA", None), "modelA");
        assert_eq!(derive_model_id("ollama", "modelA", None), "ollama::modelA");
    }

    #[test]
    fn unsupported_type_never_mutates() {
        let mut reg = registry();
        let err = reg.load("chroma", "modelA", None, None).unwrap_err();
        assert!(matches!(err, GatewayError::BadRequest(_)));
        assert!(reg.list().is_empty());
    }

    #[test]
    fn load_ollama_provider_and_resolve() {
        // Ollama load only validates config and builds the client; no network.
        let mut reg = registry();
        let loaded = reg.load("ollama", "modelA", None, None).unwrap();
        assert_eq!(loaded.id, "ollama::modelA");
        assert!(reg.is_loaded("ollama", "modelA", None));
        assert!(reg.resolve("ollama::modelA").is_some());
    }

    #[test]
    fn load_with_parameters_overrides_proxy_settings() {
        let mut reg = registry();
        let params = serde_json::json!({
            "url": "http://embed.internal:11434",
            "model": "mxbai-embed-large"
        });
        let loaded = reg
            .load("ollama", "default", None, Some(&params))
            .unwrap();
        // per-load model override shows up in the description; the id still
        // derives from the requested type and name
        assert_eq!(loaded.id, "ollama::default");
        assert!(loaded.description.contains("mxbai-embed-large"));
    }

    #[test]
    fn load_local_provider_without_model_files_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ProvidersConfig::default();
        config.local.cache_dir = dir.path().to_string_lossy().into_owned();
        let mut reg = ModelRegistry::new(config);

        let err = reg.load("default", "modelA", None, None).unwrap_err();
        assert!(matches!(err, GatewayError::BadRequest(_)));
        assert!(!reg.is_loaded("default", "modelA", None));
    }

    #[test]
    fn unload_round_trip() {
        let mut reg = registry();
        reg.insert_loaded("default", "modelA", None, StubProvider::boxed(8, "a"));
        assert!(reg.is_loaded("default", "modelA", None));

        reg.unload("default", "modelA", None, true).unwrap();
        assert!(!reg.is_loaded("default", "modelA", None));
        assert!(reg.resolve("modelA").is_none());
    }

    #[test]
    fn unload_missing_model_is_bad_request() {
        let mut reg = registry();
        let err = reg.unload("default", "ghost", None, true).unwrap_err();
        assert!(matches!(err, GatewayError::BadRequest(_)));
    }

    #[test]
    fn unload_by_explicit_id_ignores_type_and_name() {
        let mut reg = registry();
        reg.insert_loaded("default", "modelA", None, StubProvider::boxed(8, "a"));
        // id match alone determines identity once the id is explicit
        reg.unload("x", "y", Some("modelA"), true).unwrap();
        assert!(reg.list().is_empty());
    }

    #[test]
    fn unload_all_reports_count_and_clears() {
        let mut reg = registry();
        reg.insert_loaded("default", "modelA", None, StubProvider::boxed(8, "a"));
        reg.insert_loaded("custom", "modelB", None, StubProvider::boxed(8, "b"));
        reg.insert_loaded("custom", "modelC", None, StubProvider::boxed(8, "c"));

        assert_eq!(reg.unload_all(), 3);
        assert!(reg.list().is_empty());
        assert_eq!(reg.unload_all(), 0);
    }

    #[test]
    fn same_name_different_type_coexist() {
        let mut reg = registry();
        reg.insert_loaded("default", "modelA", None, StubProvider::boxed(8, "a"));
        reg.insert_loaded("custom", "modelA", None, StubProvider::boxed(8, "b"));

        let listed = reg.list();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, "modelA");
        assert_eq!(listed[1].id, "custom::modelA");
    }

    #[test]
    fn duplicate_load_overwrites_silently() {
        let mut reg = registry();
        reg.insert_loaded("default", "modelA", None, StubProvider::boxed(8, "old"));
        reg.insert_loaded("default", "modelA", None, StubProvider::boxed(8, "new"));

        let listed = reg.list();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].description.contains("new"));
    }

    #[test]
    fn list_keeps_insertion_order() {
        let mut reg = registry();
        for name in ["one", "two", "three"] {
            reg.insert_loaded("default", name, None, StubProvider::boxed(4, name));
        }
        let ids: Vec<_> = reg.list().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["one", "two", "three"]);
    }
}
