use vcfdb_core::{Document, Result};

use crate::ops::{Filter, StoreOp, Update, WriteOp};

///
/// A schemaless document store organised in named containers.
///
/// Implementations are shared between threads and must give every
/// [`StoreOp`] atomic visibility.
///
pub trait DocumentStore: Send + Sync {
    ///
    /// Apply one mutation. Returns the number of documents (or containers)
    /// affected.
    ///
    fn execute(&self, op: StoreOp) -> Result<usize>;

    fn list_containers(&self) -> Result<Vec<String>>;

    fn get(&self, container: &str, id: &str) -> Result<Option<Document>>;

    /// Documents matching `filter`, in `_id` order. A missing container is empty.
    fn find(&self, container: &str, filter: &Filter) -> Result<Vec<Document>>;

    fn container_exists(&self, name: &str) -> Result<bool> {
        Ok(self.list_containers()?.iter().any(|c| c == name))
    }

    fn count(&self, container: &str, filter: &Filter) -> Result<usize> {
        Ok(self.find(container, filter)?.len())
    }

    /// Returns `true` if the container did not exist yet.
    fn create_container(&self, name: &str) -> Result<bool> {
        let created = self.execute(StoreOp::CreateContainer {
            name: name.to_string(),
        })?;
        Ok(created > 0)
    }

    fn insert(&self, container: &str, document: Document) -> Result<()> {
        self.execute(StoreOp::Insert {
            container: container.to_string(),
            document,
        })?;
        Ok(())
    }

    fn insert_or_replace(&self, container: &str, document: Document) -> Result<()> {
        self.execute(StoreOp::Replace {
            container: container.to_string(),
            document,
        })?;
        Ok(())
    }

    /// Returns `true` if a document matched (or was created by `upsert`).
    fn update_one(&self, container: &str, id: &str, update: Update, upsert: bool) -> Result<bool> {
        let matched = self.execute(StoreOp::Update {
            container: container.to_string(),
            filter: Filter::id(id),
            update,
            upsert,
            multi: false,
        })?;
        Ok(matched > 0)
    }

    fn update_many(&self, container: &str, filter: Filter, update: Update) -> Result<usize> {
        self.execute(StoreOp::Update {
            container: container.to_string(),
            filter,
            update,
            upsert: false,
            multi: true,
        })
    }

    fn delete_one(&self, container: &str, id: &str) -> Result<bool> {
        let deleted = self.execute(StoreOp::Delete {
            container: container.to_string(),
            filter: Filter::id(id),
            multi: false,
        })?;
        Ok(deleted > 0)
    }

    fn delete_many(&self, container: &str, filter: Filter) -> Result<usize> {
        self.execute(StoreOp::Delete {
            container: container.to_string(),
            filter,
            multi: true,
        })
    }

    /// Returns `true` if the container existed.
    fn drop_container(&self, name: &str) -> Result<bool> {
        let dropped = self.execute(StoreOp::DropContainer {
            name: name.to_string(),
        })?;
        Ok(dropped > 0)
    }

    fn rename_container(&self, from: &str, to: &str) -> Result<()> {
        self.execute(StoreOp::RenameContainer {
            from: from.to_string(),
            to: to.to_string(),
        })?;
        Ok(())
    }

    ///
    /// Apply a batch of writes. With `ordered`, the batch stops at the first
    /// failing op (earlier ops stay applied) and that failure is returned.
    ///
    fn bulk_write(&self, container: &str, ops: Vec<WriteOp>, ordered: bool) -> Result<usize> {
        self.execute(StoreOp::Bulk {
            container: container.to_string(),
            ops,
            ordered,
        })
    }
}
