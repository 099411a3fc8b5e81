// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{Error, TipIndex, TipsetMetadata};
use crate::publisher::{Publisher, Subscriber, NEW_HEAD_TOPIC};
use blocks::{BlockHeader, Tipset, TipsetKeys};
use cid::Cid;
use db::{BlockStore, Store};
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::{from_slice, to_vec};
use fvm_shared::clock::ChainEpoch;
use log::{debug, info, warn};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Datastore key of the heaviest tipset currently tracked.
const HEAD_KEY: &str = "/chain/heaviestTipSet";

/// Datastore key under which the genesis block CID is recorded at
/// initialization.
pub const GENESIS_KEY: &str = "/consensus/genesisCid";

/// Capacity of the head-change backlog held for each subscriber. A subscriber
/// that falls further behind blocks head updates until it drains.
const HEAD_CHANGE_BACKLOG: usize = 128;

/// Derives the datastore key binding a tipset to its state root. The exact
/// form is private to the store; it only has to be stable across restarts,
/// which it is because it depends on nothing but the tipset key and epoch.
fn metadata_key(key: &TipsetKeys, epoch: ChainEpoch) -> String {
    format!("/tipset/state/h-{epoch}-{key}")
}

/// Stores the chain's blocks, tracks tipsets and their state roots, and
/// maintains the heaviest tipset. Blocks reach persistent storage exclusively
/// through this store, so everything persisted belongs to a chain that was
/// validated by the caller.
pub struct ChainStore<DB> {
    /// Content-addressed storage for blocks, also accessed directly for chain
    /// metadata: the head key and the tipset to state root mapping. Private
    /// to the store.
    db: Arc<DB>,

    /// CID of the genesis block. Constant after construction.
    genesis: Cid,

    /// Tipset at the head of the best-known chain.
    head: RwLock<Option<Arc<Tipset>>>,

    /// Publishes an event every time the head changes. Tipsets published here
    /// are queued and delivered to subscribers in the order discovered.
    publisher: Publisher<Arc<Tipset>>,

    /// Tracks tipsets by key and by epoch/parent set for use by expected
    /// consensus.
    tip_index: TipIndex,
}

impl<DB> ChainStore<DB>
where
    DB: BlockStore,
{
    /// Constructor
    pub fn new(db: Arc<DB>, genesis: Cid) -> Self {
        Self {
            db,
            genesis,
            head: RwLock::new(None),
            publisher: Publisher::new(HEAD_CHANGE_BACKLOG),
            tip_index: TipIndex::new(),
        }
    }

    /// Returns the genesis CID of the chain tracked by this store.
    pub fn genesis_cid(&self) -> &Cid {
        &self.genesis
    }

    /// Writes the genesis block to the blockstore and records its CID under
    /// [GENESIS_KEY].
    pub fn set_genesis(&self, header: &BlockHeader) -> Result<(), Error> {
        let ts = Tipset::new(vec![header.clone()])?;
        self.persist_headers(&ts)?;
        let val = to_vec(header.cid())?;
        Ok(self.db.write(GENESIS_KEY, val)?)
    }

    /// Persists the blocks of a tipset, indexes the tipset with its state
    /// root, and records the state root in the datastore.
    pub fn put_tipset_and_state(&self, meta: TipsetMetadata) -> Result<(), Error> {
        if meta.tipset_state_root == Cid::default() {
            return Err(Error::InvalidArgument(format!(
                "undefined state root for tipset {}",
                meta.tipset.key()
            )));
        }

        // Persist blocks. Stray writes from an aborted call are harmless:
        // block writes are idempotent.
        self.persist_headers(&meta.tipset)?;

        // Update tipindex.
        let record = to_vec(&meta.tipset_state_root)?;
        let record_key = metadata_key(meta.tipset.key(), meta.tipset.epoch());
        self.tip_index.put(meta)?;

        // Persist the state mapping.
        Ok(self.db.write(record_key, record)?)
    }

    /// Sets the passed in tipset as the new head of this chain. The key is
    /// persisted, the in-memory head swapped, and the tipset published to
    /// subscribers of [NEW_HEAD_TOPIC], all under the head lock so that
    /// concurrent callers observe heads and events in the same order.
    pub fn set_head(&self, ts: Arc<Tipset>) -> Result<(), Error> {
        debug!("set head {}", ts.key());
        let mut head = self.head.write();

        // Ensure consistency by storing this new head on disk first.
        let val = to_vec(ts.key())?;
        self.db.write(HEAD_KEY, val)?;
        *head = Some(ts.clone());

        // Publish an event that we have a new head. A shut down publisher
        // drops the event; the head update itself has already been persisted.
        if self.publisher.publish(ts, NEW_HEAD_TOPIC) == 0 && self.publisher.is_shut_down() {
            warn!("head change publisher is shut down, dropping event");
        }
        Ok(())
    }

    /// Returns the key of the current head tipset, or the empty key if no
    /// head is tracked yet.
    pub fn get_head(&self) -> TipsetKeys {
        self.head
            .read()
            .as_ref()
            .map(|ts| ts.key().clone())
            .unwrap_or_default()
    }

    /// Returns the tipset at the head of the best-known chain.
    pub fn heaviest_tipset(&self) -> Option<Arc<Tipset>> {
        self.head.read().clone()
    }

    /// Returns the chain height of the head tipset, or 0 if no head is
    /// tracked yet.
    pub fn block_height(&self) -> ChainEpoch {
        self.head
            .read()
            .as_ref()
            .map(|ts| ts.epoch())
            .unwrap_or_default()
    }

    /// Returns a subscription delivering every future head change in the
    /// order the heads were set.
    pub fn subscribe_head_changes(&self) -> Subscriber<Arc<Tipset>> {
        self.publisher.subscribe(NEW_HEAD_TOPIC)
    }

    /// Stops all activities and cleans up: subscribers are disconnected and
    /// further head changes go unpublished.
    pub fn stop(&self) {
        self.publisher.shutdown();
    }

    /// Retrieves a block by CID.
    pub fn get_block(&self, cid: &Cid) -> Result<BlockHeader, Error> {
        let data = self
            .db
            .get(cid)?
            .ok_or_else(|| Error::NotFound(format!("block {cid}")))?;
        from_slice(&data)
            .map_err(|e| Error::Encoding(format!("failed to decode block {cid}: {e}")))
    }

    /// Retrieves the blocks referenced in the input key.
    pub fn get_blocks(&self, keys: &TipsetKeys) -> Result<Vec<BlockHeader>, Error> {
        keys.cids().iter().map(|cid| self.get_block(cid)).collect()
    }

    /// Indicates whether the block is in the store.
    pub fn has_block(&self, cid: &Cid) -> bool {
        self.db.has(cid).unwrap_or(false)
    }

    /// Indicates whether all of the blocks are in the store.
    pub fn has_all_blocks(&self, cids: &[Cid]) -> bool {
        cids.iter().all(|cid| self.has_block(cid))
    }

    /// Reconstructs a tipset by fetching each member block from the
    /// blockstore.
    pub fn tipset_from_keys(&self, keys: &TipsetKeys) -> Result<Arc<Tipset>, Error> {
        let headers = self.get_blocks(keys)?;
        Ok(Arc::new(Tipset::new(headers)?))
    }

    /// Returns the indexed tipset whose block CIDs correspond to the input
    /// key.
    pub fn get_tipset(&self, key: &TipsetKeys) -> Result<Arc<Tipset>, Error> {
        self.tip_index.get_tipset(key)
    }

    /// Returns the state root of the indexed tipset whose block CIDs
    /// correspond to the input key.
    pub fn get_tipset_state_root(&self, key: &TipsetKeys) -> Result<Cid, Error> {
        self.tip_index.get_tipset_state_root(key)
    }

    /// Returns true iff the tipset referenced by the input key is indexed.
    pub fn has_tipset(&self, key: &TipsetKeys) -> bool {
        self.tip_index.has(key)
    }

    /// Returns the indexed tipsets and states that have the given parent set
    /// and height.
    pub fn get_by_parents_and_height(
        &self,
        parent_key: &TipsetKeys,
        epoch: ChainEpoch,
    ) -> Result<Vec<Arc<TipsetMetadata>>, Error> {
        self.tip_index.get_by_parents_and_height(parent_key, epoch)
    }

    /// Returns true if the index contains any tipset with the given parent
    /// set and height.
    pub fn has_by_parents_and_height(&self, parent_key: &TipsetKeys, epoch: ChainEpoch) -> bool {
        self.tip_index.has_by_parents_and_height(parent_key, epoch)
    }

    /// Rebuilds the in-memory tipset index by traversing backwards from the
    /// most recent head recorded in the datastore.
    ///
    /// Loading trusts that the datastore preserves the CIDs of the heaviest
    /// tipset under the head key, and that only validated tipsets were ever
    /// put to the store; it does NOT validate state transitions. It fails if
    /// the head does not link back to the configured genesis block or if any
    /// link of the chain is missing, and on failure the index is left empty.
    pub fn load(&self, token: &CancellationToken) -> Result<(), Error> {
        // Clear the tipset index.
        self.tip_index.clear();

        let result = self.load_chain(token);
        if result.is_err() {
            self.tip_index.clear();
        }
        result
    }

    fn load_chain(&self, token: &CancellationToken) -> Result<(), Error> {
        let head_key = self.load_head()?;
        let head_ts = self.tipset_from_keys(&head_key)?;
        let start_height = head_ts.epoch();
        info!("start loading chain at tipset {head_key}, height {start_height}");
        // Ensure we only produce 10 log messages regardless of the chain
        // height.
        let log_status_every = start_height / 10;

        // Tipsets come directly from the blockstore, not from the tipset
        // index which is being rebuilt by this traversal.
        let mut cursor = head_ts.clone();
        loop {
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }

            if log_status_every != 0 && cursor.epoch() % log_status_every == 0 {
                info!("load tipset {}, height {}", cursor.key(), cursor.epoch());
            }

            let state_root = self.load_state_root(&cursor)?;
            self.put_tipset_and_state(TipsetMetadata {
                tipset_state_root: state_root,
                tipset: cursor.clone(),
            })?;

            if cursor.parents().is_empty() {
                break;
            }
            cursor = self.tipset_from_keys(cursor.parents())?;
        }

        // Check genesis here.
        if cursor.len() != 1 {
            return Err(Error::GenesisMismatch(format!(
                "load terminated with a tipset of {} blocks, expected genesis with exactly 1",
                cursor.len()
            )));
        }
        let loaded = cursor.blocks()[0].cid();
        if loaded != &self.genesis {
            return Err(Error::GenesisMismatch(format!(
                "expected genesis cid {}, loaded genesis cid {loaded}",
                self.genesis
            )));
        }

        info!("finished loading {start_height} tipsets from {head_key}");
        // Set actual head, re-publishing it so subscribers observe the
        // post-load head.
        self.set_head(head_ts)
    }

    /// Loads the latest known head key from the datastore.
    fn load_head(&self) -> Result<TipsetKeys, Error> {
        let bytes = self.db.read(HEAD_KEY)?.ok_or(Error::NoHead)?;
        from_slice(&bytes).map_err(|e| Error::Encoding(format!("failed to decode head key: {e}")))
    }

    /// Loads the recorded state root of a tipset from the datastore.
    fn load_state_root(&self, ts: &Tipset) -> Result<Cid, Error> {
        let key = metadata_key(ts.key(), ts.epoch());
        let bytes = self.db.read(&key)?.ok_or_else(|| {
            Error::NotFound(format!("state root record for tipset {}", ts.key()))
        })?;
        from_slice(&bytes).map_err(|e| {
            Error::Encoding(format!(
                "failed to decode state root of tipset {}: {e}",
                ts.key()
            ))
        })
    }

    /// Writes the blocks of a tipset that are not yet stored. Block writes
    /// are idempotent: a block is keyed by the hash of its canonical bytes.
    fn persist_headers(&self, ts: &Tipset) -> Result<(), Error> {
        let mut blocks = Vec::with_capacity(ts.len());
        for header in ts.blocks() {
            if !self.db.has(header.cid())? {
                blocks.push((*header.cid(), header.raw_data().to_vec()));
            }
        }
        Ok(self.db.put_many_keyed(blocks)?)
    }
}
