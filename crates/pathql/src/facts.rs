//! Fact-base loading.
//!
//! A fact base is a JSON document holding the rows of every entity type and
//! the relationships between types:
//!
//! ```json
//! {
//!   "entities": {
//!     "class": [{"id": 1, "name": "MyClass"}],
//!     "method": [{"id": 7, "name": "run", "class_id": 1}]
//!   },
//!   "relationships": [
//!     {"entity": "class", "attribute": "methods", "related": ["method"]}
//!   ]
//! }
//! ```

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use pathql_core::EntityData;
use pathql_query::{EvaluationContext, RelationshipMap};
use serde::Deserialize;

/// Rows and relationships loaded from disk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FactBase {
    /// Rows per entity type.
    #[serde(default)]
    pub entities: EntityData,
    /// Relationship declarations.
    #[serde(default)]
    pub relationships: Vec<RelationshipDecl>,
}

/// One `entity.attribute -> related` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RelationshipDecl {
    /// Owning entity type.
    pub entity: String,
    /// Attribute holding the relationship.
    pub attribute: String,
    /// Entity types the attribute points at.
    #[serde(default)]
    pub related: Vec<String>,
}

impl FactBase {
    /// Parse a fact base from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("invalid fact base")
    }

    /// Read and parse a fact base file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let facts = Self::from_json(&text)
            .with_context(|| format!("failed to load {}", path.display()))?;
        tracing::debug!(
            "loaded {} rows of {} entity types and {} relationships from {}",
            facts.row_count(),
            facts.entities.len(),
            facts.relationships.len(),
            path.display()
        );
        Ok(facts)
    }

    /// Total number of rows across entity types.
    pub fn row_count(&self) -> usize {
        self.entities.values().map(Vec::len).sum()
    }

    /// Relationship map built from the declarations.
    pub fn relationship_map(&self) -> RelationshipMap {
        let mut map = RelationshipMap::new();
        for decl in &self.relationships {
            map.add_relationship(&decl.entity, &decl.attribute, decl.related.iter().cloned());
        }
        map
    }

    /// Evaluation context over this fact base.
    pub fn into_context(self) -> EvaluationContext {
        let relationships = Arc::new(self.relationship_map());
        EvaluationContext::new(relationships, self.entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathql_core::Value;
    use std::io::Write;

    const FACTS: &str = r#"{
        "entities": {
            "class": [{"id": 1, "name": "MyClass", "tags": ["a", "b"]}],
            "method": [{"id": 7, "name": "run", "class_id": 1}, {"id": 8, "name": "stop"}]
        },
        "relationships": [
            {"entity": "class", "attribute": "methods", "related": ["method"]},
            {"entity": "class", "attribute": "fields", "related": ["field"]}
        ]
    }"#;

    #[test]
    fn test_from_json() {
        let facts = FactBase::from_json(FACTS).unwrap();
        assert_eq!(facts.row_count(), 3);
        assert_eq!(
            facts.entities["class"][0].get("tags"),
            Some(&Value::List(vec![Value::from("a"), Value::from("b")]))
        );
        assert_eq!(facts.relationships[1].related, vec!["field"]);
    }

    #[test]
    fn test_relationship_map() {
        let map = FactBase::from_json(FACTS).unwrap().relationship_map();
        assert!(map.has_relationship("method", "class"));
        assert!(map.has_relationship("class", "field"));
        assert!(!map.has_relationship("method", "field"));
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let facts = FactBase::from_json("{}").unwrap();
        assert_eq!(facts.row_count(), 0);
        assert!(facts.relationship_map().is_empty());
    }

    #[test]
    fn test_invalid_json() {
        let err = FactBase::from_json(r#"{"entities": []}"#).unwrap_err();
        assert!(format!("{err:#}").contains("invalid fact base"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FACTS.as_bytes()).unwrap();

        let context = FactBase::load(file.path()).unwrap().into_context();
        assert_eq!(context.entity_data["method"].len(), 2);
        assert!(context.relationships.has_relationship("class", "method"));

        let err = FactBase::load(Path::new("/nonexistent/facts.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
