// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::errors::Error;
use super::Store;
use anyhow::Result;
use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
pub use sled::{Batch, Config, Db, Mode};
use std::path::Path;

/// Disk-backed datastore of the node, backed by an embedded [sled::Db].
///
/// The keyed operations map one-to-one onto `sled`'s API; the interesting
/// batching happens in [Store::bulk_write], which turns a whole tipset's
/// block writes into a single atomic [Batch].
///
/// Usage:
/// ```no_run
/// use redwood_db::sled::SledDb;
///
/// let db = SledDb::open("chain_data").unwrap();
/// ```
#[derive(Debug)]
pub struct SledDb {
    db: Db,
}

impl SledDb {
    /// Opens (creating if absent) a database at the given path, tuned for
    /// the chain store's write-heavy load.
    pub fn open<P>(path: P) -> Result<Self, Error>
    where
        P: AsRef<Path>,
    {
        Self::open_with_config(Config::new().path(path).mode(Mode::HighThroughput))
    }

    /// Opens a database with custom configuration.
    pub fn open_with_config(config: Config) -> Result<Self, Error> {
        let db = config.open()?;
        Ok(Self { db })
    }

    /// An ephemeral database that is discarded on drop. Test use only.
    pub fn temporary() -> Result<Self, Error> {
        Self::open_with_config(Config::new().temporary(true))
    }
}

impl Store for SledDb {
    fn read<K>(&self, key: K) -> Result<Option<Vec<u8>>, Error>
    where
        K: AsRef<[u8]>,
    {
        let value = self.db.get(key)?;
        Ok(value.map(|ivec| ivec.to_vec()))
    }

    fn write<K, V>(&self, key: K, value: V) -> Result<(), Error>
    where
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        self.db.insert(key.as_ref(), value.as_ref())?;
        Ok(())
    }

    fn delete<K>(&self, key: K) -> Result<(), Error>
    where
        K: AsRef<[u8]>,
    {
        self.db.remove(key.as_ref())?;
        Ok(())
    }

    fn exists<K>(&self, key: K) -> Result<bool, Error>
    where
        K: AsRef<[u8]>,
    {
        Ok(self.db.contains_key(key.as_ref())?)
    }

    fn bulk_write<K, V>(&self, keys: &[K], values: &[V]) -> Result<(), Error>
    where
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        if keys.len() != values.len() {
            return Err(Error::InvalidBulkLen);
        }
        let mut batch = Batch::default();
        for (key, value) in keys.iter().zip(values.iter()) {
            batch.insert(key.as_ref(), value.as_ref());
        }
        Ok(self.db.apply_batch(batch)?)
    }
}

impl Blockstore for SledDb {
    fn get(&self, k: &Cid) -> Result<Option<Vec<u8>>> {
        Ok(self.read(k.to_bytes())?)
    }

    fn put_keyed(&self, k: &Cid, block: &[u8]) -> Result<()> {
        Ok(self.write(k.to_bytes(), block)?)
    }
}
