//! Entity rows and row identity.

use std::collections::BTreeMap;

use crate::Value;

/// Attribute name carrying a row's identity.
pub const ID_FIELD: &str = "id";

/// One instance of an entity: a flat attribute mapping.
pub type Row = BTreeMap<String, Value>;

/// Entity type name to its ordered rows.
pub type EntityData = BTreeMap<String, Vec<Row>>;

/// Identity of a row, taken from its [`ID_FIELD`].
///
/// Rows without an id, or whose id has no identity rendering (see
/// [`Value::identity`]), return `None`.
pub fn row_identity(row: &Row) -> Option<String> {
    row.get(ID_FIELD).and_then(Value::identity)
}

/// Name of the attribute that references `entity` from another row (`<entity>_id`).
pub fn foreign_key(entity: &str) -> String {
    format!("{entity}_{ID_FIELD}")
}

/// Whether `child` points at `parent` through `<parent_entity>_id`.
pub fn references(parent: &Row, parent_entity: &str, child: &Row) -> bool {
    let Some(id) = row_identity(parent) else {
        return false;
    };
    child
        .get(&foreign_key(parent_entity))
        .and_then(Value::identity)
        .is_some_and(|fk| fk == id)
}

/// Merge two rows, namespacing every attribute with its side's name.
///
/// ```
/// use pathql_core::{merge_rows, row, Value};
///
/// let merged = merge_rows("class", &row! { "id" => 1 }, "method", &row! { "id" => 7 });
/// assert_eq!(merged.get("class.id"), Some(&Value::from(1)));
/// assert_eq!(merged.get("method.id"), Some(&Value::from(7)));
/// assert!(merged.get("id").is_none());
/// ```
pub fn merge_rows(left_name: &str, left: &Row, right_name: &str, right: &Row) -> Row {
    let mut merged = Row::new();
    for (key, value) in left {
        merged.insert(format!("{left_name}.{key}"), value.clone());
    }
    for (key, value) in right {
        merged.insert(format!("{right_name}.{key}"), value.clone());
    }
    merged
}

/// Build a [`Row`] from `key => value` pairs.
///
/// ```
/// use pathql_core::{row, Value};
///
/// let r = row! { "id" => 1, "name" => "MyClass" };
/// assert_eq!(r.get("name"), Some(&Value::from("MyClass")));
/// ```
#[macro_export]
macro_rules! row {
    () => {
        $crate::Row::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut row = $crate::Row::new();
        $(
            row.insert(::std::string::String::from($key), $crate::Value::from($value));
        )+
        row
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;

    #[test]
    fn test_row_identity() {
        assert_eq!(row_identity(&row! { "id" => 1 }).as_deref(), Some("1"));
        assert_eq!(row_identity(&row! { "id" => "m-1" }).as_deref(), Some("m-1"));
        assert_eq!(row_identity(&row! { "name" => "x" }), None);
        assert_eq!(row_identity(&row! { "id" => true }), None);
    }

    #[test]
    fn test_references() {
        let class = row! { "id" => 1, "name" => "MyClass" };
        let method = row! { "id" => 10, "class_id" => 1 };
        let other = row! { "id" => 11, "class_id" => 2 };
        assert!(references(&class, "class", &method));
        assert!(!references(&class, "class", &other));
        assert!(!references(&method, "method", &class));
    }

    #[test]
    fn test_references_matches_string_and_number_ids() {
        let class = row! { "id" => "1" };
        let method = row! { "class_id" => 1 };
        assert!(references(&class, "class", &method));
    }
}
