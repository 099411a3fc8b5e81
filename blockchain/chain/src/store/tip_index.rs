// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::errors::Error;
use ahash::HashMap;
use blocks::{Tipset, TipsetKeys};
use cid::Cid;
use fvm_shared::clock::ChainEpoch;
use parking_lot::RwLock;
use std::sync::Arc;

/// `TipsetMetadata` is the type stored as the value in the `TipIndex`. It
/// binds a tipset to the root CID of the chain's state after applying the
/// messages in this tipset to its parent state.
#[derive(Clone, PartialEq, Debug)]
pub struct TipsetMetadata {
    /// Root of the aggregate state after applying tipset
    pub tipset_state_root: Cid,

    /// The set of blocks that forms the tipset
    pub tipset: Arc<Tipset>,
}

/// Tracks tipsets and their states by tipset key and by parent key and epoch.
///
/// All operations are thread-safe: readers proceed concurrently, writers are
/// serialized on the internal lock. The index carries no persistence of its
/// own; it is rebuilt from the datastore on load.
#[derive(Default)]
pub struct TipIndex {
    inner: RwLock<TipIndexInner>,
}

#[derive(Default)]
struct TipIndexInner {
    /// Lookup of recorded tipsets and their state roots by tipset key
    by_key: HashMap<TipsetKeys, Arc<TipsetMetadata>>,
    /// Lookup of the tipsets that share a parent set and epoch
    by_parents_height: HashMap<(TipsetKeys, ChainEpoch), HashMap<TipsetKeys, Arc<TipsetMetadata>>>,
}

impl TipIndex {
    /// Constructor
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds an entry to the index. After this call the metadata can be looked
    /// up by the key of the tipset, or by its parent key and epoch.
    ///
    /// Tipsets are immutable once indexed: reinserting an identical pair is a
    /// no-op, while a differing state root for an already indexed tipset
    /// fails with a conflict and leaves the index unchanged.
    pub fn put(&self, meta: TipsetMetadata) -> Result<(), Error> {
        let key = meta.tipset.key().clone();
        let mut inner = self.inner.write();
        if let Some(existing) = inner.by_key.get(&key) {
            if existing.tipset_state_root == meta.tipset_state_root {
                return Ok(());
            }
            return Err(Error::Conflict(key.to_string()));
        }

        let parents = meta.tipset.parents().clone();
        let epoch = meta.tipset.epoch();
        let meta = Arc::new(meta);
        inner.by_key.insert(key.clone(), meta.clone());
        inner
            .by_parents_height
            .entry((parents, epoch))
            .or_default()
            .insert(key, meta);
        Ok(())
    }

    fn get(&self, key: &TipsetKeys) -> Result<Arc<TipsetMetadata>, Error> {
        self.inner
            .read()
            .by_key
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("tipset {key}")))
    }

    /// Returns the tipset given by the input key.
    pub fn get_tipset(&self, key: &TipsetKeys) -> Result<Arc<Tipset>, Error> {
        Ok(self.get(key)?.tipset.clone())
    }

    /// Returns the state root of the tipset given by the input key.
    pub fn get_tipset_state_root(&self, key: &TipsetKeys) -> Result<Cid, Error> {
        Ok(self.get(key)?.tipset_state_root)
    }

    /// Returns true iff the tipset given by the input key is indexed.
    pub fn has(&self, key: &TipsetKeys) -> bool {
        self.inner.read().by_key.contains_key(key)
    }

    /// Returns every indexed tipset whose blocks have the given parent set
    /// and epoch.
    pub fn get_by_parents_and_height(
        &self,
        parent_key: &TipsetKeys,
        epoch: ChainEpoch,
    ) -> Result<Vec<Arc<TipsetMetadata>>, Error> {
        self.inner
            .read()
            .by_parents_height
            .get(&(parent_key.clone(), epoch))
            .map(|bucket| bucket.values().cloned().collect())
            .ok_or_else(|| {
                Error::NotFound(format!("tipsets with parents {parent_key}, height {epoch}"))
            })
    }

    /// Returns true iff some indexed tipset has the given parent set and
    /// epoch.
    pub fn has_by_parents_and_height(&self, parent_key: &TipsetKeys, epoch: ChainEpoch) -> bool {
        self.inner
            .read()
            .by_parents_height
            .contains_key(&(parent_key.clone(), epoch))
    }

    /// Drops every entry. Used when the index is rebuilt from the datastore.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.by_key.clear();
        inner.by_parents_height.clear();
    }

    /// Number of indexed tipsets.
    pub fn len(&self) -> usize {
        self.inner.read().by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().by_key.is_empty()
    }
}
