use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use fs2::FileExt;
use log::{debug, info, warn};

use vcfdb_core::{Document, Result, VcfdbError};

use crate::memory::Catalog;
use crate::ops::{Filter, StoreOp};
use crate::store::DocumentStore;

const JOURNAL_FILE: &str = "journal.jsonl";
const LOCK_FILE: &str = "LOCK";

#[derive(Debug)]
struct JournalState {
    catalog: Catalog,
    writer: BufWriter<File>,
}

///
/// A store persisted in a directory as an append-only journal of
/// [`StoreOp`]s, one JSON object per line.
///
/// Every op is written and flushed before it is applied, so replaying the
/// journal on open rebuilds the exact state, including the effects of ops
/// that failed halfway (an ordered bulk write that stopped early).
///
/// The directory is held with an exclusive advisory lock for the lifetime of
/// the store.
///
#[derive(Debug)]
pub struct JournalStore {
    state: RwLock<JournalState>,
    _lock: File,
}

impl JournalStore {
    ///
    /// Open (or create) the store in `dir`.
    ///
    /// # Arguments
    ///
    /// - dir: directory holding the journal; created if missing
    ///
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(dir.join(LOCK_FILE))?;
        lock.try_lock_exclusive().map_err(|_| {
            VcfdbError::Storage(format!(
                "store at {} is locked by another process",
                dir.display()
            ))
        })?;

        let journal_path = dir.join(JOURNAL_FILE);
        let (catalog, torn_at) = replay(&journal_path)?;
        // a torn last line would corrupt the next append
        if let Some(len) = torn_at {
            OpenOptions::new().write(true).open(&journal_path)?.set_len(len)?;
            info!("Truncated journal {} to {} bytes", journal_path.display(), len);
        }

        let writer = BufWriter::new(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&journal_path)?,
        );

        Ok(JournalStore {
            state: RwLock::new(JournalState { catalog, writer }),
            _lock: lock,
        })
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, JournalState>> {
        self.state
            .read()
            .map_err(|_| VcfdbError::Storage("store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, JournalState>> {
        self.state
            .write()
            .map_err(|_| VcfdbError::Storage("store lock poisoned".to_string()))
    }
}

///
/// Rebuild the catalog from the journal at `path`.
///
/// Returns the byte length to truncate the journal to when its last line is
/// torn: unterminated, or terminated but unparsable. Any other unparsable
/// line is an error.
///
fn replay(path: &Path) -> Result<(Catalog, Option<u64>)> {
    let mut catalog = Catalog::default();
    if !path.exists() {
        return Ok((catalog, None));
    }

    let mut reader = BufReader::new(File::open(path)?);
    let mut line = String::new();
    let mut offset = 0u64;
    let mut line_no = 0usize;
    loop {
        line.clear();
        let read = reader.read_line(&mut line)?;
        if read == 0 {
            break;
        }
        line_no += 1;
        if !line.ends_with('\n') {
            // the op was never acknowledged: its newline is written before the flush
            warn!("Dropping unterminated last journal line {}", line_no);
            return Ok((catalog, Some(offset)));
        }
        let text = line.trim();
        if !text.is_empty() {
            match serde_json::from_str::<StoreOp>(text) {
                Ok(op) => {
                    // failures were already reported when the op first ran
                    if let Err(e) = catalog.apply(&op) {
                        debug!("Replayed failing op at line {}: {}", line_no, e);
                    }
                }
                Err(e) if reader.fill_buf()?.is_empty() => {
                    warn!("Dropping unreadable last journal line {}: {}", line_no, e);
                    return Ok((catalog, Some(offset)));
                }
                Err(e) => {
                    return Err(VcfdbError::Storage(format!(
                        "corrupt journal {} at line {}: {}",
                        path.display(),
                        line_no,
                        e
                    )));
                }
            }
        }
        offset += read as u64;
    }

    debug!("Replayed {} journal lines from {}", line_no, path.display());
    Ok((catalog, None))
}

impl DocumentStore for JournalStore {
    fn execute(&self, op: StoreOp) -> Result<usize> {
        let mut state = self.write()?;
        serde_json::to_writer(&mut state.writer, &op)?;
        state.writer.write_all(b"\n")?;
        state.writer.flush()?;
        state.catalog.apply(&op)
    }

    fn list_containers(&self) -> Result<Vec<String>> {
        Ok(self.read()?.catalog.list_containers())
    }

    fn get(&self, container: &str, id: &str) -> Result<Option<Document>> {
        Ok(self.read()?.catalog.get(container, id))
    }

    fn find(&self, container: &str, filter: &Filter) -> Result<Vec<Document>> {
        Ok(self.read()?.catalog.find(container, filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;
    use tempfile::tempdir;

    use crate::ops::Update;

    fn doc(value: serde_json::Value) -> Document {
        match value {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[rstest]
    fn test_second_open_is_locked() {
        let dir = tempdir().unwrap();
        let _store = JournalStore::open(dir.path()).unwrap();
        assert!(JournalStore::open(dir.path()).is_err());
    }

    #[rstest]
    fn test_state_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = JournalStore::open(dir.path()).unwrap();
            store.insert("c", doc(json!({"_id": "a", "IDs": ["rs1"]}))).unwrap();
            store
                .update_one("c", "a", Update::new().push("IDs", vec![json!(null)]), false)
                .unwrap();
            // journaled even though it fails
            assert!(store.insert("c", doc(json!({"_id": "a"}))).is_err());
        }
        let store = JournalStore::open(dir.path()).unwrap();
        assert_eq!(
            store.get("c", "a").unwrap().unwrap()["IDs"],
            json!(["rs1", null])
        );
    }

    #[rstest]
    fn test_torn_tail_is_skipped() {
        let dir = tempdir().unwrap();
        {
            let store = JournalStore::open(dir.path()).unwrap();
            store.insert("c", doc(json!({"_id": "a"}))).unwrap();
        }
        let journal = dir.path().join(JOURNAL_FILE);
        let mut content = fs::read_to_string(&journal).unwrap();
        content.push_str("{\"op\":\"insert\",\"contai");
        fs::write(&journal, content).unwrap();

        {
            let store = JournalStore::open(dir.path()).unwrap();
            assert_eq!(store.count("c", &Filter::All).unwrap(), 1);
            store.insert("c", doc(json!({"_id": "b"}))).unwrap();
        }
        let store = JournalStore::open(dir.path()).unwrap();
        assert_eq!(store.count("c", &Filter::All).unwrap(), 2);
    }

    #[rstest]
    fn test_corrupt_middle_line_fails() {
        let dir = tempdir().unwrap();
        let journal = dir.path().join(JOURNAL_FILE);
        fs::write(
            &journal,
            "not json\n{\"op\":\"create_container\",\"name\":\"c\"}\n",
        )
        .unwrap();
        assert!(JournalStore::open(dir.path()).is_err());
    }

    #[rstest]
    fn test_unterminated_op_is_truncated() {
        let dir = tempdir().unwrap();
        {
            let store = JournalStore::open(dir.path()).unwrap();
            store.insert("c", doc(json!({"_id": "a"}))).unwrap();
        }
        let journal = dir.path().join(JOURNAL_FILE);
        let acknowledged = fs::metadata(&journal).unwrap().len();
        let mut content = fs::read_to_string(&journal).unwrap();
        content.push_str(r#"{"op":"create_container","name":"lost"}"#);
        fs::write(&journal, content).unwrap();

        let store = JournalStore::open(dir.path()).unwrap();
        assert_eq!(store.list_containers().unwrap(), vec!["c"]);
        assert_eq!(fs::metadata(&journal).unwrap().len(), acknowledged);
    }
}
