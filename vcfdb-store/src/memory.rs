use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;

use vcfdb_core::consts::FIELD_ID;
use vcfdb_core::{Document, Result, VcfdbError};

use crate::ops::{Filter, StoreOp, Update, WriteOp, document_id};
use crate::store::DocumentStore;

type Container = BTreeMap<String, Document>;

///
/// Every container and document of a store. Shared by both backends; the
/// journaled store replays its log into one of these.
///
#[derive(Debug, Default, Clone)]
pub(crate) struct Catalog {
    containers: BTreeMap<String, Container>,
}

impl Catalog {
    pub(crate) fn list_containers(&self) -> Vec<String> {
        self.containers.keys().cloned().collect()
    }

    pub(crate) fn get(&self, container: &str, id: &str) -> Option<Document> {
        self.containers
            .get(container)
            .and_then(|c| c.get(id))
            .cloned()
    }

    pub(crate) fn find(&self, container: &str, filter: &Filter) -> Vec<Document> {
        match self.containers.get(container) {
            Some(c) => c.values().filter(|d| filter.matches(d)).cloned().collect(),
            None => Vec::new(),
        }
    }

    pub(crate) fn apply(&mut self, op: &StoreOp) -> Result<usize> {
        match op {
            StoreOp::CreateContainer { name } => {
                if self.containers.contains_key(name) {
                    Ok(0)
                } else {
                    self.containers.insert(name.clone(), Container::new());
                    Ok(1)
                }
            }
            StoreOp::Insert {
                container,
                document,
            } => {
                insert(self.container_mut(container), document.clone())?;
                Ok(1)
            }
            StoreOp::Replace {
                container,
                document,
            } => {
                let id = require_id(document)?;
                self.container_mut(container).insert(id, document.clone());
                Ok(1)
            }
            StoreOp::Update {
                container,
                filter,
                update,
                upsert,
                multi,
            } => self.update(container, filter, update, *upsert, *multi),
            StoreOp::Delete {
                container,
                filter,
                multi,
            } => {
                let Some(c) = self.containers.get_mut(container) else {
                    return Ok(0);
                };
                let mut ids = matching_ids(c, filter);
                if !*multi {
                    ids.truncate(1);
                }
                for id in &ids {
                    c.remove(id);
                }
                Ok(ids.len())
            }
            StoreOp::DropContainer { name } => Ok(usize::from(self.containers.remove(name).is_some())),
            StoreOp::RenameContainer { from, to } => {
                if self.containers.contains_key(to) {
                    return Err(VcfdbError::Storage(format!(
                        "can't rename `{}`: target container `{}` already exists",
                        from, to
                    )));
                }
                let c = self.containers.remove(from).ok_or_else(|| {
                    VcfdbError::Storage(format!("container `{}` does not exist", from))
                })?;
                self.containers.insert(to.clone(), c);
                Ok(1)
            }
            StoreOp::Bulk {
                container,
                ops,
                ordered,
            } => bulk(self.container_mut(container), ops, *ordered),
        }
    }

    fn container_mut(&mut self, name: &str) -> &mut Container {
        self.containers.entry(name.to_string()).or_default()
    }

    fn update(
        &mut self,
        container: &str,
        filter: &Filter,
        update: &Update,
        upsert: bool,
        multi: bool,
    ) -> Result<usize> {
        if upsert {
            let Filter::Id { id } = filter else {
                return Err(VcfdbError::Storage(
                    "upsert requires an `_id` filter".to_string(),
                ));
            };
            upsert_one(self.container_mut(container), id, update)?;
            return Ok(1);
        }

        let Some(c) = self.containers.get_mut(container) else {
            return Ok(0);
        };
        let mut ids = matching_ids(c, filter);
        if !multi {
            ids.truncate(1);
        }

        // apply to copies first so a failing document leaves the container untouched
        let mut updated = Vec::with_capacity(ids.len());
        for id in ids {
            let mut doc = c[&id].clone();
            update.apply(&mut doc, false)?;
            updated.push((id, doc));
        }
        let n = updated.len();
        for (id, doc) in updated {
            c.insert(id, doc);
        }
        Ok(n)
    }
}

fn require_id(document: &Document) -> Result<String> {
    document_id(document)
        .map(str::to_string)
        .ok_or_else(|| VcfdbError::Storage("document has no string `_id` field".to_string()))
}

fn matching_ids(container: &Container, filter: &Filter) -> Vec<String> {
    match filter {
        Filter::Id { id } => container.get(id).map(|_| vec![id.clone()]).unwrap_or_default(),
        _ => container
            .iter()
            .filter(|(_, d)| filter.matches(d))
            .map(|(id, _)| id.clone())
            .collect(),
    }
}

fn insert(container: &mut Container, document: Document) -> Result<()> {
    let id = require_id(&document)?;
    if container.contains_key(&id) {
        return Err(VcfdbError::Storage(format!("duplicate key `{}`", id)));
    }
    container.insert(id, document);
    Ok(())
}

fn upsert_one(container: &mut Container, id: &str, update: &Update) -> Result<()> {
    let (mut doc, inserted) = match container.get(id) {
        Some(existing) => (existing.clone(), false),
        None => {
            let mut fresh = Document::new();
            fresh.insert(FIELD_ID.to_string(), Value::String(id.to_string()));
            (fresh, true)
        }
    };
    update.apply(&mut doc, inserted)?;
    container.insert(id.to_string(), doc);
    Ok(())
}

fn bulk(container: &mut Container, ops: &[WriteOp], ordered: bool) -> Result<usize> {
    let mut applied = 0;
    let mut first_error = None;

    for op in ops {
        let outcome = match op {
            WriteOp::Insert { document } => insert(container, document.clone()),
            WriteOp::Upsert { id, update } => upsert_one(container, id, update),
        };
        match outcome {
            Ok(()) => applied += 1,
            Err(e) if ordered => {
                return Err(VcfdbError::Storage(format!(
                    "bulk write stopped after {} of {} operations: {}",
                    applied,
                    ops.len(),
                    e
                )));
            }
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(VcfdbError::Storage(format!(
            "bulk write applied {} of {} operations, first failure: {}",
            applied,
            ops.len(),
            e
        ))),
        None => Ok(applied),
    }
}

///
/// Store keeping every container in memory. Used by the tests and as the
/// working state of [`crate::JournalStore`].
///
#[derive(Debug, Default)]
pub struct MemoryStore {
    catalog: RwLock<Catalog>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Catalog>> {
        self.catalog
            .read()
            .map_err(|_| VcfdbError::Storage("store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Catalog>> {
        self.catalog
            .write()
            .map_err(|_| VcfdbError::Storage("store lock poisoned".to_string()))
    }
}

impl DocumentStore for MemoryStore {
    fn execute(&self, op: StoreOp) -> Result<usize> {
        self.write()?.apply(&op)
    }

    fn list_containers(&self) -> Result<Vec<String>> {
        Ok(self.read()?.list_containers())
    }

    fn get(&self, container: &str, id: &str) -> Result<Option<Document>> {
        Ok(self.read()?.get(container, id))
    }

    fn find(&self, container: &str, filter: &Filter) -> Result<Vec<Document>> {
        Ok(self.read()?.find(container, filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[fixture]
    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert("c", doc(json!({"_id": "a", "IDs": [1]}))).unwrap();
        store.insert("c", doc(json!({"_id": "b", "IDs": [1, 2]}))).unwrap();
        store
    }

    #[rstest]
    fn test_insert_duplicate_fails(store: MemoryStore) {
        let result = store.insert("c", doc(json!({"_id": "a"})));
        assert!(result.is_err());
        assert_eq!(store.count("c", &Filter::All).unwrap(), 2);
    }

    #[rstest]
    fn test_insert_requires_id(store: MemoryStore) {
        assert!(store.insert("c", doc(json!({"POS": 1}))).is_err());
    }

    #[rstest]
    fn test_update_many_by_array_len(store: MemoryStore) {
        let n = store
            .update_many("c", Filter::array_len("IDs", 1), Update::new().push("IDs", vec![json!(null)]))
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(store.get("c", "a").unwrap().unwrap()["IDs"], json!([1, null]));
        assert_eq!(store.get("c", "b").unwrap().unwrap()["IDs"], json!([1, 2]));
    }

    #[rstest]
    fn test_failed_update_leaves_container_untouched(store: MemoryStore) {
        store.insert("c", doc(json!({"_id": "z", "IDs": 5}))).unwrap();
        let result = store.update_many("c", Filter::All, Update::new().push("IDs", vec![json!(0)]));
        assert!(result.is_err());
        assert_eq!(store.get("c", "a").unwrap().unwrap()["IDs"], json!([1]));
    }

    #[rstest]
    fn test_ordered_bulk_stops_at_duplicate(store: MemoryStore) {
        let ops = vec![
            WriteOp::Insert { document: doc(json!({"_id": "c"})) },
            WriteOp::Insert { document: doc(json!({"_id": "a"})) },
            WriteOp::Insert { document: doc(json!({"_id": "d"})) },
        ];
        assert!(store.bulk_write("c", ops, true).is_err());
        assert!(store.get("c", "c").unwrap().is_some());
        assert!(store.get("c", "d").unwrap().is_none());
    }

    #[rstest]
    fn test_unordered_bulk_continues(store: MemoryStore) {
        let ops = vec![
            WriteOp::Insert { document: doc(json!({"_id": "a"})) },
            WriteOp::Insert { document: doc(json!({"_id": "d"})) },
        ];
        assert!(store.bulk_write("c", ops, false).is_err());
        assert!(store.get("c", "d").unwrap().is_some());
    }

    #[rstest]
    fn test_upsert_creates_then_updates() {
        let store = MemoryStore::new();
        let update = Update::new()
            .set_on_insert("IDs", json!([null]))
            .push("IDs", vec![json!("rs1")]);
        assert!(store.update_one("c", "x", update.clone(), true).unwrap());
        assert!(store.update_one("c", "x", update, true).unwrap());
        assert_eq!(store.get("c", "x").unwrap().unwrap()["IDs"], json!([null, "rs1", "rs1"]));
    }

    #[rstest]
    fn test_rename_and_drop(store: MemoryStore) {
        store.rename_container("c", "d").unwrap();
        assert!(!store.container_exists("c").unwrap());
        assert!(store.container_exists("d").unwrap());
        assert!(store.rename_container("missing", "e").is_err());

        store.create_container("e").unwrap();
        assert!(store.rename_container("d", "e").is_err());

        assert!(store.drop_container("d").unwrap());
        assert!(!store.drop_container("d").unwrap());
    }

    #[rstest]
    fn test_delete_one_and_many(store: MemoryStore) {
        assert!(store.delete_one("c", "a").unwrap());
        assert!(!store.delete_one("c", "a").unwrap());
        assert_eq!(store.delete_many("c", Filter::All).unwrap(), 1);
        assert!(store.container_exists("c").unwrap());
    }
}
