//! Declared relationships between entity types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Entity type to attribute name to related entity types.
///
/// Storage is directional, lookup is symmetric.
///
/// ```
/// use pathql_query::RelationshipMap;
///
/// let mut map = RelationshipMap::new();
/// map.add_relationship("class", "methods", ["method"]);
/// assert!(map.has_relationship("class", "method"));
/// assert!(map.has_relationship("method", "class"));
/// assert!(!map.has_relationship("class", "field"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationshipMap {
    edges: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl RelationshipMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `entity` relates to `related` through `attribute`.
    ///
    /// Repeated calls for the same attribute extend its list.
    pub fn add_relationship<I, S>(&mut self, entity: &str, attribute: &str, related: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let targets = self
            .edges
            .entry(entity.to_string())
            .or_default()
            .entry(attribute.to_string())
            .or_default();
        for target in related {
            let target = target.into();
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
    }

    /// Whether `a` lists `b` under any attribute, or `b` lists `a`.
    pub fn has_relationship(&self, a: &str, b: &str) -> bool {
        self.links(a, b) || self.links(b, a)
    }

    fn links(&self, from: &str, to: &str) -> bool {
        self.edges
            .get(from)
            .is_some_and(|attributes| attributes.values().any(|list| list.iter().any(|e| e == to)))
    }

    /// Related entity types stored under `entity`'s `attribute`.
    pub fn related(&self, entity: &str, attribute: &str) -> &[String] {
        self.edges
            .get(entity)
            .and_then(|attributes| attributes.get(attribute))
            .map_or(&[], Vec::as_slice)
    }

    /// Number of entity types with outgoing relationships.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Whether no relationship has been declared.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symmetric_lookup() {
        let mut map = RelationshipMap::new();
        map.add_relationship("class", "methods", ["method"]);
        assert!(map.has_relationship("class", "method"));
        assert!(map.has_relationship("method", "class"));
    }

    #[test]
    fn test_unlinked_entities() {
        let mut map = RelationshipMap::new();
        map.add_relationship("class", "methods", ["method"]);
        assert!(!map.has_relationship("class", "field"));
        assert!(!map.has_relationship("field", "method"));
        assert!(!map.has_relationship("class", "class"));
    }

    #[test]
    fn test_add_extends_without_duplicates() {
        let mut map = RelationshipMap::new();
        map.add_relationship("class", "members", ["method", "field"]);
        map.add_relationship("class", "members", ["field", "constructor"]);
        assert_eq!(map.related("class", "members"), ["method", "field", "constructor"]);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_json_shape() {
        let mut map = RelationshipMap::new();
        map.add_relationship("class", "methods", ["method"]);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"class":{"methods":["method"]}}"#);
    }
}
