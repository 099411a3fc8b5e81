// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::{ElectionProof, Ticket, TipsetKeys};
use cid::multihash::{Code, MultihashDigest};
use cid::Cid;
use derive_builder::Builder;
use fvm_ipld_encoding::{to_vec, DAG_CBOR};
use fvm_shared::address::Address;
use fvm_shared::bigint::bigint_ser::{BigIntDe, BigIntSer};
use fvm_shared::bigint::BigInt;
use fvm_shared::clock::ChainEpoch;
use fvm_shared::crypto::signature::Signature;
use serde::{
    de::{self, Deserializer},
    ser::{self, Serializer},
    Deserialize,
};
use std::fmt;

/// Header of a block.
///
/// Usage:
/// ```
/// use redwood_blocks::{BlockHeader, Ticket, TipsetKeys};
/// use fvm_shared::address::Address;
///
/// BlockHeader::builder()
///     .miner_address(Address::new_id(0))
///     .parents(TipsetKeys::default())
///     .epoch(0)
///     .timestamp(0)
///     .ticket(Ticket::default())
///     .build_and_validate()
///     .unwrap();
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Builder)]
#[builder(name = "BlockHeaderBuilder")]
pub struct BlockHeader {
    // CHAIN LINKING
    /// The set of parents this block was based on. Typically one, but can be
    /// several in the case where there were multiple winning ticket holders
    /// for an epoch.
    #[builder(default)]
    parents: TipsetKeys,

    /// The aggregate chain weight of the parent set.
    #[builder(default)]
    weight: BigInt,

    /// The period in which a new block is generated. There may be multiple
    /// rounds in an epoch.
    #[builder(default)]
    epoch: ChainEpoch,

    // MINER INFO
    /// The address of the miner actor that mined this block.
    #[builder(default = "Address::new_id(0)")]
    miner_address: Address,

    // STATE
    /// The CID of the root of the message merkle links for this block.
    #[builder(default)]
    messages: Cid,

    /// The CID of the root of an array of message receipts.
    #[builder(default)]
    message_receipts: Cid,

    /// The CID of the chain state after applying the parent tipset.
    #[builder(default)]
    state_root: Cid,

    // CONSENSUS
    /// Timestamp, in seconds since the Unix epoch, at which this block was
    /// created.
    #[builder(default)]
    timestamp: u64,

    /// The ticket submitted with this block.
    #[builder(default)]
    ticket: Ticket,

    /// The result of the leader election for this block's epoch.
    #[builder(default)]
    election_proof: ElectionProof,

    // SIGNATURES
    /// The signature of the miner over the header CID.
    #[builder(default)]
    signature: Option<Signature>,

    // CACHE
    /// Stores the CID of the block after the first call to `cid()`.
    #[builder(default)]
    cached_cid: Cid,

    /// Stores the canonical serialized bytes of the block.
    #[builder(default)]
    cached_bytes: Vec<u8>,
}

impl ser::Serialize for BlockHeader {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (
            &self.parents,
            BigIntSer(&self.weight),
            &self.epoch,
            &self.miner_address,
            &self.messages,
            &self.message_receipts,
            &self.state_root,
            &self.timestamp,
            &self.ticket,
            &self.election_proof,
            &self.signature,
        )
            .serialize(serializer)
    }
}

impl<'de> de::Deserialize<'de> for BlockHeader {
    fn deserialize<D>(deserializer: D) -> Result<Self, <D as Deserializer<'de>>::Error>
    where
        D: Deserializer<'de>,
    {
        let (
            parents,
            BigIntDe(weight),
            epoch,
            miner_address,
            messages,
            message_receipts,
            state_root,
            timestamp,
            ticket,
            election_proof,
            signature,
        ) = Deserialize::deserialize(deserializer)?;

        BlockHeader::builder()
            .parents(parents)
            .weight(weight)
            .epoch(epoch)
            .miner_address(miner_address)
            .messages(messages)
            .message_receipts(message_receipts)
            .state_root(state_root)
            .timestamp(timestamp)
            .ticket(ticket)
            .election_proof(election_proof)
            .signature(signature)
            .build_and_validate()
            .map_err(de::Error::custom)
    }
}

impl BlockHeader {
    /// Generates a `BlockHeader` builder as a constructor.
    pub fn builder() -> BlockHeaderBuilder {
        BlockHeaderBuilder::default()
    }
    /// Getter for `BlockHeader` parents
    pub fn parents(&self) -> &TipsetKeys {
        &self.parents
    }
    /// Getter for `BlockHeader` weight
    pub fn weight(&self) -> &BigInt {
        &self.weight
    }
    /// Getter for `BlockHeader` epoch
    pub fn epoch(&self) -> ChainEpoch {
        self.epoch
    }
    /// Getter for `BlockHeader` miner address
    pub fn miner_address(&self) -> &Address {
        &self.miner_address
    }
    /// Getter for `BlockHeader` messages root
    pub fn messages(&self) -> &Cid {
        &self.messages
    }
    /// Getter for `BlockHeader` message receipts root
    pub fn message_receipts(&self) -> &Cid {
        &self.message_receipts
    }
    /// Getter for `BlockHeader` state root
    pub fn state_root(&self) -> &Cid {
        &self.state_root
    }
    /// Getter for `BlockHeader` timestamp
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }
    /// Getter for `BlockHeader` ticket
    pub fn ticket(&self) -> &Ticket {
        &self.ticket
    }
    /// Getter for `BlockHeader` election proof
    pub fn election_proof(&self) -> &ElectionProof {
        &self.election_proof
    }
    /// Getter for `BlockHeader` signature
    pub fn signature(&self) -> &Option<Signature> {
        &self.signature
    }
    /// Getter for `BlockHeader` CID. The cache is filled on construction, so
    /// this never recomputes the hash.
    pub fn cid(&self) -> &Cid {
        &self.cached_cid
    }
    /// Returns the canonical serialized bytes of the header.
    pub fn raw_data(&self) -> &[u8] {
        &self.cached_bytes
    }
    /// Fills the cache with the canonical bytes and CID of the header.
    fn update_cache(&mut self) -> Result<(), String> {
        self.cached_bytes = to_vec(self).map_err(|e| e.to_string())?;
        self.cached_cid = Cid::new_v1(DAG_CBOR, Code::Blake2b256.digest(&self.cached_bytes));
        Ok(())
    }
}

/// Human-readable string representation of a block CID.
impl fmt::Display for BlockHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block: {}", self.cid())
    }
}

impl BlockHeaderBuilder {
    pub fn build_and_validate(&self) -> Result<BlockHeader, String> {
        // Convert header builder into header struct
        let mut header = self.build().map_err(|e| e.to_string())?;

        // Fill header cache with raw bytes and cid
        header.update_cache()?;

        Ok(header)
    }
}
