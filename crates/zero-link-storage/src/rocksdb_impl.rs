//! RocksDB storage implementation.

use crate::{
    column_families::all_column_families,
    errors::{Result, StorageError},
    traits::{deserialize_value, serialize_key, serialize_value, Batch, Storage},
};
use async_trait::async_trait;
use rocksdb::{Options, WriteBatch, DB};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    path::Path,
    sync::{Arc, Mutex},
};
use tracing::{debug, warn};

/// RocksDB storage implementation
pub struct RocksDbStorage {
    db: Arc<DB>,
    /// Serializes read-modify-write primitives (`take`, `put_if_absent`)
    rmw_lock: Mutex<()>,
    /// Keeps the directory of a test database alive as long as the handle
    _temp_dir: Option<tempfile::TempDir>,
}

impl RocksDbStorage {
    /// Open RocksDB database at the specified path
    ///
    /// Creates all required column families if they don't exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = Self::open_db(path.as_ref())?;
        Ok(Self {
            db: Arc::new(db),
            rmw_lock: Mutex::new(()),
            _temp_dir: None,
        })
    }

    /// Open RocksDB database in a fresh temp directory
    ///
    /// This is public for use in other crates' test modules.
    pub fn open_test() -> Result<Self> {
        let temp_dir = tempfile::TempDir::new().map_err(StorageError::IoError)?;
        let db = Self::open_db(temp_dir.path())?;
        Ok(Self {
            db: Arc::new(db),
            rmw_lock: Mutex::new(()),
            _temp_dir: Some(temp_dir),
        })
    }

    fn open_db(path: &Path) -> Result<DB> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let db = DB::open_cf(&opts, path, all_column_families())
            .map_err(|e| StorageError::Database(e.to_string()))?;

        debug!("Opened RocksDB at {:?}", path);
        Ok(db)
    }

    /// Get column family handle
    fn cf_handle(&self, cf: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(cf)
            .ok_or_else(|| StorageError::InvalidColumnFamily(cf.to_string()))
    }

    fn get_bytes(&self, cf: &str, key_bytes: &[u8]) -> Result<Option<Vec<u8>>> {
        let cf_handle = self.cf_handle(cf)?;
        self.db
            .get_cf(cf_handle, key_bytes)
            .map_err(|e| StorageError::Database(e.to_string()))
    }
}

#[async_trait]
impl Storage for RocksDbStorage {
    async fn get<K, V>(&self, cf: &str, key: &K) -> Result<Option<V>>
    where
        K: Serialize + Send + Sync,
        V: DeserializeOwned,
    {
        let key_bytes = serialize_key(key)?;

        match self.get_bytes(cf, &key_bytes)? {
            Some(bytes) => Ok(Some(deserialize_value(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn put<K, V>(&self, cf: &str, key: &K, value: &V) -> Result<()>
    where
        K: Serialize + Send + Sync,
        V: Serialize + Send + Sync,
    {
        let cf_handle = self.cf_handle(cf)?;
        let key_bytes = serialize_key(key)?;
        let value_bytes = serialize_value(value)?;

        self.db
            .put_cf(cf_handle, &key_bytes, &value_bytes)
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(())
    }

    async fn put_if_absent<K, V>(&self, cf: &str, key: &K, value: &V) -> Result<bool>
    where
        K: Serialize + Send + Sync,
        V: Serialize + Send + Sync,
    {
        let cf_handle = self.cf_handle(cf)?;
        let key_bytes = serialize_key(key)?;
        let value_bytes = serialize_value(value)?;

        let _guard = self.rmw_lock.lock().map_err(|_| StorageError::LockPoisoned)?;

        if self.get_bytes(cf, &key_bytes)?.is_some() {
            return Ok(false);
        }

        self.db
            .put_cf(cf_handle, &key_bytes, &value_bytes)
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(true)
    }

    async fn delete<K>(&self, cf: &str, key: &K) -> Result<()>
    where
        K: Serialize + Send + Sync,
    {
        let key_bytes = serialize_key(key)?;
        self.delete_raw(cf, &key_bytes).await
    }

    async fn take<K, V>(&self, cf: &str, key: &K) -> Result<Option<V>>
    where
        K: Serialize + Send + Sync,
        V: DeserializeOwned,
    {
        let cf_handle = self.cf_handle(cf)?;
        let key_bytes = serialize_key(key)?;

        let bytes = {
            let _guard = self.rmw_lock.lock().map_err(|_| StorageError::LockPoisoned)?;

            let Some(bytes) = self.get_bytes(cf, &key_bytes)? else {
                return Ok(None);
            };

            self.db
                .delete_cf(cf_handle, &key_bytes)
                .map_err(|e| StorageError::Database(e.to_string()))?;

            bytes
        };

        Ok(Some(deserialize_value(&bytes)?))
    }

    async fn get_by_prefix<K, V>(&self, cf: &str, prefix: &K) -> Result<Vec<(Vec<u8>, V)>>
    where
        K: Serialize + Send + Sync,
        V: DeserializeOwned,
    {
        let cf_handle = self.cf_handle(cf)?;
        let prefix_bytes = serialize_key(prefix)?;

        let mut results = Vec::new();

        // Seek to the prefix; works without a configured prefix extractor
        let iter = self.db.iterator_cf(
            cf_handle,
            rocksdb::IteratorMode::From(&prefix_bytes, rocksdb::Direction::Forward),
        );

        for item in iter {
            let (key, value) = item.map_err(|e| StorageError::Database(e.to_string()))?;

            if key.starts_with(&prefix_bytes) {
                results.push((key.to_vec(), deserialize_value(&value)?));
            } else {
                // Keys are sorted, so once we're past the prefix, we're done
                break;
            }
        }

        Ok(results)
    }

    async fn scan_all<V>(&self, cf: &str) -> Result<Vec<(Vec<u8>, V)>>
    where
        V: DeserializeOwned,
    {
        let cf_handle = self.cf_handle(cf)?;

        let mut results = Vec::new();
        let iter = self.db.iterator_cf(cf_handle, rocksdb::IteratorMode::Start);

        for item in iter {
            let (key, value) = item.map_err(|e| StorageError::Database(e.to_string()))?;
            match deserialize_value(&value) {
                Ok(decoded) => results.push((key.to_vec(), decoded)),
                Err(e) => warn!(cf, key_len = key.len(), error = %e, "Skipping undecodable row"),
            }
        }

        Ok(results)
    }

    async fn delete_raw(&self, cf: &str, key: &[u8]) -> Result<()> {
        let cf_handle = self.cf_handle(cf)?;

        self.db
            .delete_cf(cf_handle, key)
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(())
    }

    fn batch(&self) -> Box<dyn Batch> {
        Box::new(RocksDbBatch {
            db: Arc::clone(&self.db),
            write_batch: WriteBatch::default(),
        })
    }
}

/// RocksDB batch implementation
pub struct RocksDbBatch {
    db: Arc<DB>,
    write_batch: WriteBatch,
}

#[async_trait]
impl Batch for RocksDbBatch {
    fn put_raw(&mut self, cf: &str, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        let cf_handle = self
            .db
            .cf_handle(cf)
            .ok_or_else(|| StorageError::InvalidColumnFamily(cf.to_string()))?;

        self.write_batch.put_cf(cf_handle, &key, &value);

        Ok(())
    }

    fn delete_raw(&mut self, cf: &str, key: Vec<u8>) -> Result<()> {
        let cf_handle = self
            .db
            .cf_handle(cf)
            .ok_or_else(|| StorageError::InvalidColumnFamily(cf.to_string()))?;

        self.write_batch.delete_cf(cf_handle, &key);

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let ops = self.write_batch.len();
        self.db
            .write(self.write_batch)
            .map_err(|e| StorageError::Database(e.to_string()))?;

        debug!(ops, "Batch committed");
        Ok(())
    }
}
