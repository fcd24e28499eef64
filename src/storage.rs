//! Key-value storage backing the ledger state
//!
//! The engine only needs ordered prefix scans and atomic batches, so any
//! ordered key-value store can stand behind [`Database`]. [`MemDb`] is the
//! in-process implementation.

use std::collections::BTreeMap;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Database is closed")]
    Closed,

    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Batch operations for atomic writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// Ordered list of writes applied all-or-nothing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    ops: Vec<BatchOp>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push(BatchOp::Put { key, value });
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.ops.push(BatchOp::Delete { key });
    }

    /// Value this batch would leave at `key`, if it touches `key`
    ///
    /// `Some(None)` means the batch deletes it.
    pub fn pending(&self, key: &[u8]) -> Option<Option<&[u8]>> {
        self.ops.iter().rev().find_map(|op| match op {
            BatchOp::Put { key: k, value } if k.as_slice() == key => Some(Some(value.as_slice())),
            BatchOp::Delete { key: k } if k.as_slice() == key => Some(None),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

/// Storage backend abstraction
pub trait Database: Send {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    fn put(&mut self, key: &[u8], value: &[u8]) -> StorageResult<()>;

    fn delete(&mut self, key: &[u8]) -> StorageResult<()>;

    fn contains(&self, key: &[u8]) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Entries whose key starts with `prefix`, in lexicographic key order
    fn scan_prefix(&self, prefix: &[u8]) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Apply every operation of `batch` in order, atomically
    fn write_batch(&mut self, batch: Batch) -> StorageResult<()>;

    /// Release the backend; every later call fails with [`StorageError::Closed`]
    fn close(&mut self) -> StorageResult<()>;
}

/// In-memory ordered store
#[derive(Debug, Default)]
pub struct MemDb {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
    closed: bool,
}

impl MemDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check_open(&self) -> StorageResult<()> {
        if self.closed {
            return Err(StorageError::Closed);
        }
        Ok(())
    }
}

impl Database for MemDb {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        self.check_open()?;
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.check_open()?;
        self.entries.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> StorageResult<()> {
        self.check_open()?;
        self.entries.remove(key);
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>> {
        self.check_open()?;
        Ok(self
            .entries
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    fn write_batch(&mut self, batch: Batch) -> StorageResult<()> {
        // Nothing below can fail once the open check passes.
        self.check_open()?;
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { key, value } => {
                    self.entries.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    self.entries.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn close(&mut self) -> StorageResult<()> {
        self.check_open()?;
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_prefix_ordered() {
        let mut db = MemDb::new();
        db.put(b"addr\x02", b"b").unwrap();
        db.put(b"addr\x01", b"a").unwrap();
        db.put(b"utxo\x01", b"u").unwrap();
        db.put(b"add", b"x").unwrap();

        let found = db.scan_prefix(b"addr").unwrap();
        assert_eq!(
            found,
            vec![
                (b"addr\x01".to_vec(), b"a".to_vec()),
                (b"addr\x02".to_vec(), b"b".to_vec()),
            ]
        );
    }

    #[test]
    fn test_batch_applies_in_order() {
        let mut db = MemDb::new();
        db.put(b"k1", b"old").unwrap();

        let mut batch = Batch::new();
        batch.delete(b"k1".to_vec());
        batch.put(b"k2".to_vec(), b"v2".to_vec());
        batch.put(b"k1".to_vec(), b"new".to_vec());
        assert_eq!(batch.pending(b"k1"), Some(Some(b"new".as_slice())));
        assert_eq!(batch.pending(b"k3"), None);

        db.write_batch(batch).unwrap();
        assert_eq!(db.get(b"k1").unwrap(), Some(b"new".to_vec()));
        assert!(db.contains(b"k2").unwrap());
        assert_eq!(db.len(), 2);
    }

    #[test]
    fn test_closed_db_rejects_calls() {
        let mut db = MemDb::new();
        db.close().unwrap();
        assert_eq!(db.get(b"k"), Err(StorageError::Closed));
        assert_eq!(db.write_batch(Batch::new()), Err(StorageError::Closed));
        assert_eq!(db.close(), Err(StorageError::Closed));
    }
}
