// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{Error, Store};
use ahash::HashMap;
use anyhow::Result;
use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use parking_lot::RwLock;
use std::sync::Arc;

/// In-memory datastore used by tests. Clones share the same underlying map,
/// which stands in for a backend surviving a store restart.
#[derive(Debug, Default, Clone)]
pub struct MemoryDB {
    map: Arc<RwLock<HashMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryDB {
    /// Runs `f` against the map under a single write lock.
    fn update<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut HashMap<Vec<u8>, Vec<u8>>) -> R,
    {
        f(&mut self.map.write())
    }
}

impl Store for MemoryDB {
    fn read<K>(&self, key: K) -> Result<Option<Vec<u8>>, Error>
    where
        K: AsRef<[u8]>,
    {
        let map = self.map.read();
        Ok(map.get(key.as_ref()).map(|value| value.to_vec()))
    }

    fn write<K, V>(&self, key: K, value: V) -> Result<(), Error>
    where
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        self.update(|map| {
            map.insert(key.as_ref().to_vec(), value.as_ref().to_vec());
        });
        Ok(())
    }

    fn delete<K>(&self, key: K) -> Result<(), Error>
    where
        K: AsRef<[u8]>,
    {
        self.update(|map| {
            map.remove(key.as_ref());
        });
        Ok(())
    }

    fn exists<K>(&self, key: K) -> Result<bool, Error>
    where
        K: AsRef<[u8]>,
    {
        self.read(key).map(|value| value.is_some())
    }

    fn bulk_write<K, V>(&self, keys: &[K], values: &[V]) -> Result<(), Error>
    where
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        if keys.len() != values.len() {
            return Err(Error::InvalidBulkLen);
        }
        // one lock acquisition for the whole batch
        self.update(|map| {
            for (key, value) in keys.iter().zip(values.iter()) {
                map.insert(key.as_ref().to_vec(), value.as_ref().to_vec());
            }
        });
        Ok(())
    }
}

impl Blockstore for MemoryDB {
    fn get(&self, k: &Cid) -> Result<Option<Vec<u8>>> {
        Ok(self.read(k.to_bytes())?)
    }

    fn put_keyed(&self, k: &Cid, block: &[u8]) -> Result<()> {
        Ok(self.write(k.to_bytes(), block)?)
    }
}
