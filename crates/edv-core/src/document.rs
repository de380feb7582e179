//! Document model.
//!
//! A [`StructuredDocument`] is the unit stored in a vault. Its `content` is
//! already encrypted by the client and is never interpreted here; only the
//! `id` is read, to key the document within its vault.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A document as submitted by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredDocument {
    /// Identifier, unique within one vault.
    pub id: String,
    /// Unencrypted client metadata.
    #[serde(default)]
    pub meta: Map<String, Value>,
    /// Opaque (encrypted) payload.
    #[serde(default)]
    pub content: Map<String, Value>,
}

impl StructuredDocument {
    /// A document with the given id and content and no metadata.
    #[must_use]
    pub fn new(id: impl Into<String>, content: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            meta: Map::new(),
            content,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn meta_and_content_default_to_empty() {
        let doc: StructuredDocument = serde_json::from_value(json!({"id": "doc-1"})).unwrap();
        assert_eq!(doc.id, "doc-1");
        assert!(doc.meta.is_empty());
        assert!(doc.content.is_empty());
    }

    #[test]
    fn missing_id_is_rejected() {
        let result: Result<StructuredDocument, _> =
            serde_json::from_value(json!({"content": {"message": "hello"}}));
        assert!(result.is_err());
    }
}
