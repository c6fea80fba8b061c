//! Typed capability dispatch.
//!
//! The tool collaborator advertises its capabilities once at startup; they
//! are resolved into a registry keyed by capability id. Desires reference
//! capability ids, and the orchestrator dispatches through the registry —
//! no stringly-typed lookup at action time.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use kokoro_core::{CollaboratorKind, CoreError};
use serde::{Deserialize, Serialize};

/// A capability advertised by the tool collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub id: String,
    #[serde(default)]
    pub description: String,
    /// True when the capability needs input captured on the caller's side
    /// (e.g. a camera frame) rather than being host-invokable. Selecting a
    /// desire backed by such a capability without an attachment triggers the
    /// camera-request branch.
    #[serde(default)]
    pub requires_attachment: bool,
}

/// The external tool/sensor collaborator.
#[async_trait]
pub trait ToolHost: Send + Sync {
    async fn list_capabilities(&self) -> Result<Vec<CapabilityDescriptor>>;
    async fn invoke(&self, id: &str, args: serde_json::Value) -> Result<serde_json::Value>;
}

/// A host with no capabilities; desires fall back to conversation-only
/// actions.
pub struct NullToolHost;

#[async_trait]
impl ToolHost for NullToolHost {
    async fn list_capabilities(&self) -> Result<Vec<CapabilityDescriptor>> {
        Ok(vec![])
    }

    async fn invoke(&self, id: &str, _args: serde_json::Value) -> Result<serde_json::Value> {
        anyhow::bail!("no tool host configured, cannot invoke '{}'", id)
    }
}

/// Capability id → descriptor, resolved once at startup.
pub struct CapabilityRegistry {
    host: Arc<dyn ToolHost>,
    descriptors: HashMap<String, CapabilityDescriptor>,
}

impl CapabilityRegistry {
    /// Ask the host for its capabilities and build the registry.
    pub async fn resolve(host: Arc<dyn ToolHost>) -> Result<Self> {
        let listed = host.list_capabilities().await?;
        let mut descriptors = HashMap::new();
        for descriptor in listed {
            tracing::debug!(capability = %descriptor.id, "registered capability");
            descriptors.insert(descriptor.id.clone(), descriptor);
        }
        tracing::info!("capability registry resolved: {} entries", descriptors.len());
        Ok(Self { host, descriptors })
    }

    /// An empty registry (no tool collaborator).
    pub fn empty() -> Self {
        Self {
            host: Arc::new(NullToolHost),
            descriptors: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&CapabilityDescriptor> {
        self.descriptors.get(id)
    }

    /// First of the given capability ids that this registry knows about.
    pub fn first_supported<'a>(&'a self, ids: &[String]) -> Option<&'a CapabilityDescriptor> {
        ids.iter().find_map(|id| self.descriptors.get(id))
    }

    /// Invoke a registered capability. Unknown ids are a configuration
    /// mismatch (`NotFound`); host failures surface as tool collaborator
    /// errors.
    pub async fn invoke(
        &self,
        id: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, CoreError> {
        if !self.descriptors.contains_key(id) {
            return Err(CoreError::not_found("capability", id));
        }
        self.host
            .invoke(id, args)
            .await
            .map_err(|e| CoreError::collaborator(CollaboratorKind::Tool, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedHost;

    #[async_trait]
    impl ToolHost for FixedHost {
        async fn list_capabilities(&self) -> Result<Vec<CapabilityDescriptor>> {
            Ok(vec![
                CapabilityDescriptor {
                    id: "get_current_time".into(),
                    description: "current wall-clock time".into(),
                    requires_attachment: false,
                },
                CapabilityDescriptor {
                    id: "capture_image".into(),
                    description: "camera frame from the client".into(),
                    requires_attachment: true,
                },
            ])
        }

        async fn invoke(&self, id: &str, _args: serde_json::Value) -> Result<serde_json::Value> {
            match id {
                "get_current_time" => Ok(serde_json::json!({"time": "12:00"})),
                _ => anyhow::bail!("cannot invoke {}", id),
            }
        }
    }

    #[tokio::test]
    async fn test_resolve_and_lookup() {
        let registry = CapabilityRegistry::resolve(Arc::new(FixedHost)).await.unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.get("capture_image").unwrap().requires_attachment);

        let caps = vec!["missing".to_string(), "get_current_time".to_string()];
        assert_eq!(registry.first_supported(&caps).unwrap().id, "get_current_time");
    }

    #[tokio::test]
    async fn test_invoke_unknown_is_not_found() {
        let registry = CapabilityRegistry::empty();
        let err = registry.invoke("ghost", serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_invoke_failure_is_tool_collaborator_error() {
        let registry = CapabilityRegistry::resolve(Arc::new(FixedHost)).await.unwrap();
        let err = registry
            .invoke("capture_image", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Collaborator {
                kind: CollaboratorKind::Tool,
                ..
            }
        ));
    }
}
