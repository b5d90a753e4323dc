use serde::{Deserialize, Serialize};
use serde_json::Value;

use vcfdb_core::consts::FIELD_ID;
use vcfdb_core::{Document, Result, VcfdbError};

///
/// Selects documents inside one container.
///
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Filter {
    All,
    Id { id: String },
    IdNot { id: String },
    /// The field holds an array of exactly `len` elements.
    ArrayLen { field: String, len: usize },
    /// The field holds an array whose elements are all `null` (or no elements).
    AllNull { field: String },
    FieldEq { field: String, value: Value },
    And { filters: Vec<Filter> },
}

impl Filter {
    pub fn id(id: impl Into<String>) -> Self {
        Filter::Id { id: id.into() }
    }

    pub fn id_not(id: impl Into<String>) -> Self {
        Filter::IdNot { id: id.into() }
    }

    pub fn array_len(field: impl Into<String>, len: usize) -> Self {
        Filter::ArrayLen {
            field: field.into(),
            len,
        }
    }

    pub fn all_null(field: impl Into<String>) -> Self {
        Filter::AllNull {
            field: field.into(),
        }
    }

    pub fn field_eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::FieldEq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::And { filters }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Id { id } => document_id(doc) == Some(id.as_str()),
            Filter::IdNot { id } => document_id(doc) != Some(id.as_str()),
            Filter::ArrayLen { field, len } => doc
                .get(field)
                .and_then(Value::as_array)
                .is_some_and(|array| array.len() == *len),
            Filter::AllNull { field } => doc
                .get(field)
                .and_then(Value::as_array)
                .is_some_and(|array| array.iter().all(Value::is_null)),
            Filter::FieldEq { field, value } => doc.get(field) == Some(value),
            Filter::And { filters } => filters.iter().all(|f| f.matches(doc)),
        }
    }
}

pub(crate) fn document_id(doc: &Document) -> Option<&str> {
    doc.get(FIELD_ID).and_then(Value::as_str)
}

///
/// Field-level modification of one document.
///
/// Operators are applied in a fixed order: `set_on_insert` (only when the
/// update created the document), `set`, `push`, then `slice`.
///
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Update {
    #[serde(default, skip_serializing_if = "Document::is_empty")]
    pub set: Document,
    #[serde(default, skip_serializing_if = "Document::is_empty")]
    pub set_on_insert: Document,
    /// Values appended to array fields; a missing field starts as an empty array.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub push: Vec<(String, Vec<Value>)>,
    /// Array fields truncated to their first `len` elements.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub slice: Vec<(String, usize)>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(field.into(), value.into());
        self
    }

    pub fn set_on_insert(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_on_insert.insert(field.into(), value.into());
        self
    }

    pub fn push(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.push.push((field.into(), values));
        self
    }

    pub fn slice(mut self, field: impl Into<String>, len: usize) -> Self {
        self.slice.push((field.into(), len));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
            && self.set_on_insert.is_empty()
            && self.push.is_empty()
            && self.slice.is_empty()
    }

    ///
    /// Apply the update to `doc` in place. On error `doc` may be partially
    /// modified; callers apply to a copy.
    ///
    pub fn apply(&self, doc: &mut Document, inserted: bool) -> Result<()> {
        if inserted {
            for (key, value) in &self.set_on_insert {
                check_not_id(key, doc, value)?;
                doc.insert(key.clone(), value.clone());
            }
        }

        for (key, value) in &self.set {
            check_not_id(key, doc, value)?;
            doc.insert(key.clone(), value.clone());
        }

        for (key, values) in &self.push {
            let entry = doc
                .entry(key.clone())
                .or_insert_with(|| Value::Array(Vec::new()));
            match entry {
                Value::Array(array) => array.extend(values.iter().cloned()),
                _ => {
                    return Err(VcfdbError::Storage(format!(
                        "can't push to non-array field `{}`",
                        key
                    )));
                }
            }
        }

        for (key, len) in &self.slice {
            match doc.get_mut(key) {
                Some(Value::Array(array)) => array.truncate(*len),
                Some(_) => {
                    return Err(VcfdbError::Storage(format!(
                        "can't slice non-array field `{}`",
                        key
                    )));
                }
                None => {}
            }
        }

        Ok(())
    }
}

fn check_not_id(key: &str, doc: &Document, value: &Value) -> Result<()> {
    if key == FIELD_ID && doc.get(FIELD_ID) != Some(value) {
        return Err(VcfdbError::Storage("the `_id` field is immutable".to_string()));
    }
    Ok(())
}

///
/// One element of a bulk write.
///
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WriteOp {
    /// Fails on a duplicate `_id`.
    Insert { document: Document },
    /// Update the document with this `_id`, creating it if absent.
    Upsert { id: String, update: Update },
}

///
/// A single mutation of the store. Each op is applied atomically: readers see
/// either none or all of its effects.
///
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StoreOp {
    CreateContainer {
        name: String,
    },
    Insert {
        container: String,
        document: Document,
    },
    /// Insert, or replace the document with the same `_id`.
    Replace {
        container: String,
        document: Document,
    },
    Update {
        container: String,
        filter: Filter,
        update: Update,
        /// Only valid with an `Id` filter.
        upsert: bool,
        multi: bool,
    },
    Delete {
        container: String,
        filter: Filter,
        multi: bool,
    },
    DropContainer {
        name: String,
    },
    RenameContainer {
        from: String,
        to: String,
    },
    Bulk {
        container: String,
        ops: Vec<WriteOp>,
        ordered: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[rstest]
    #[case(Filter::All, true)]
    #[case(Filter::id("chr1:100"), true)]
    #[case(Filter::id_not("chr1:100"), false)]
    #[case(Filter::array_len("IDs", 2), true)]
    #[case(Filter::array_len("IDs", 3), false)]
    #[case(Filter::array_len("POS", 1), false)]
    #[case(Filter::all_null("IDs"), false)]
    #[case(Filter::all_null("POS"), false)]
    #[case(Filter::field_eq("POS", 100), true)]
    #[case(Filter::and(vec![Filter::All, Filter::field_eq("REF", "C")]), false)]
    fn test_filter_matches(#[case] filter: Filter, #[case] expected: bool) {
        let d = doc(json!({"_id": "chr1:100", "POS": 100, "REF": "A", "IDs": [null, "rs1"]}));
        assert_eq!(filter.matches(&d), expected);
    }

    #[rstest]
    fn test_update_operator_order() {
        let update = Update::new()
            .set_on_insert("IDs", json!([null]))
            .set("REF", "A")
            .push("IDs", vec![json!("rs1"), json!("rs2")])
            .slice("IDs", 2);

        let mut d = doc(json!({"_id": "x"}));
        update.apply(&mut d, true).unwrap();
        assert_eq!(Value::Object(d), json!({"_id": "x", "REF": "A", "IDs": [null, "rs1"]}));
    }

    #[rstest]
    fn test_update_set_on_insert_ignored_for_existing() {
        let update = Update::new()
            .set_on_insert("CHROM", "chr2")
            .push("IDs", vec![json!(null)]);
        let mut d = doc(json!({"_id": "x", "CHROM": "chr1", "IDs": ["a"]}));
        update.apply(&mut d, false).unwrap();
        assert_eq!(Value::Object(d), json!({"_id": "x", "CHROM": "chr1", "IDs": ["a", null]}));
    }

    #[rstest]
    fn test_slice_is_idempotent() {
        let update = Update::new().slice("samples", 1);
        let mut d = doc(json!({"_id": "x", "samples": [1, 2, 3]}));
        update.apply(&mut d, false).unwrap();
        update.apply(&mut d, false).unwrap();
        assert_eq!(d.get("samples"), Some(&json!([1])));
    }

    #[rstest]
    fn test_push_to_scalar_fails() {
        let update = Update::new().push("POS", vec![json!(1)]);
        let mut d = doc(json!({"_id": "x", "POS": 5}));
        assert!(update.apply(&mut d, false).is_err());
    }

    #[rstest]
    fn test_id_is_immutable() {
        let update = Update::new().set("_id", "y");
        let mut d = doc(json!({"_id": "x"}));
        assert!(update.apply(&mut d, false).is_err());
    }

    #[rstest]
    fn test_store_op_serialization_roundtrip() {
        let op = StoreOp::Update {
            container: "c".to_string(),
            filter: Filter::array_len("IDs", 1),
            update: Update::new().push("IDs", vec![json!(null)]),
            upsert: false,
            multi: true,
        };
        let line = serde_json::to_string(&op).unwrap();
        let back: StoreOp = serde_json::from_str(&line).unwrap();
        assert_eq!(back, op);
    }
}
