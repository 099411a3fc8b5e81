// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::{BlockHeader, Error, Ticket};
use cid::Cid;
use fvm_shared::bigint::BigInt;
use fvm_shared::clock::ChainEpoch;
use serde::{
    de::{self, Deserializer},
    ser::{self, Serializer},
    Deserialize,
};
use std::fmt;

/// A set of CIDs forming a unique key for a tipset.
///
/// The CIDs are kept sorted by their byte representation, so two keys built
/// from the same blocks compare equal regardless of insertion order. Note that
/// this is *not* the canonical iteration order of blocks in a tipset, which is
/// by ticket.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct TipsetKeys {
    cids: Vec<Cid>,
}

impl TipsetKeys {
    pub fn new(mut cids: Vec<Cid>) -> Self {
        cids.sort_by_key(|cid| cid.to_bytes());
        Self { cids }
    }

    /// Returns tipset header CIDs.
    pub fn cids(&self) -> &[Cid] {
        &self.cids
    }

    /// An empty key marks the absence of a tracked head.
    pub fn is_empty(&self) -> bool {
        self.cids.is_empty()
    }
}

impl fmt::Display for TipsetKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, cid) in self.cids.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{cid}")?;
        }
        write!(f, "}}")
    }
}

impl ser::Serialize for TipsetKeys {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.cids.serialize(serializer)
    }
}

impl<'de> de::Deserialize<'de> for TipsetKeys {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let cids: Vec<Cid> = Deserialize::deserialize(deserializer)?;
        Ok(TipsetKeys::new(cids))
    }
}

/// An immutable set of blocks at the same height with the same parent set.
/// Blocks in a tipset are canonically ordered by ticket, ties broken by CID.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tipset {
    blocks: Vec<BlockHeader>,
    key: TipsetKeys,
}

#[allow(clippy::len_without_is_empty)]
impl Tipset {
    /// Builds a new tipset from a collection of blocks.
    /// A valid tipset contains a non-empty collection of blocks with distinct
    /// CIDs that all specify identical parents, epoch and parent weight.
    pub fn new(headers: Vec<BlockHeader>) -> Result<Self, Error> {
        if headers.is_empty() {
            return Err(Error::NoBlocks);
        }

        let mut sorted_headers: Vec<BlockHeader> = Vec::with_capacity(headers.len());
        let mut cids = Vec::with_capacity(headers.len());

        // validate conditions against the 0th header
        for (i, header) in headers.into_iter().enumerate() {
            if i > 0 {
                if header.parents() != sorted_headers[0].parents() {
                    return Err(Error::InvalidTipset(
                        "parent cids are not equal".to_string(),
                    ));
                }
                if header.epoch() != sorted_headers[0].epoch() {
                    return Err(Error::InvalidTipset("epochs are not equal".to_string()));
                }
                if header.weight() != sorted_headers[0].weight() {
                    return Err(Error::InvalidTipset("weights are not equal".to_string()));
                }
            }
            if cids.contains(header.cid()) {
                return Err(Error::InvalidTipset(format!(
                    "duplicate block cid {}",
                    header.cid()
                )));
            }
            cids.push(*header.cid());
            sorted_headers.push(header);
        }

        // sort headers by ticket, breaking ties with the header CIDs, which
        // are distinct
        sorted_headers
            .sort_by_key(|header| (header.ticket().vrfproof.clone(), header.cid().to_bytes()));

        Ok(Self {
            blocks: sorted_headers,
            key: TipsetKeys::new(cids),
        })
    }

    /// Returns epoch of the tipset.
    pub fn epoch(&self) -> ChainEpoch {
        self.blocks[0].epoch()
    }
    /// Returns all blocks in the tipset in canonical order.
    pub fn blocks(&self) -> &[BlockHeader] {
        &self.blocks
    }
    /// Consumes the tipset, returning its blocks.
    pub fn into_blocks(self) -> Vec<BlockHeader> {
        self.blocks
    }
    /// Returns the smallest ticket of all blocks in the tipset.
    pub fn min_ticket(&self) -> &Ticket {
        self.blocks[0].ticket()
    }
    /// Returns the smallest timestamp of all blocks in the tipset.
    pub fn min_timestamp(&self) -> u64 {
        self.blocks
            .iter()
            .map(|block| block.timestamp())
            .min()
            .unwrap_or_default()
    }
    /// Returns the number of blocks in the tipset.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }
    /// A tipset can never be constructed empty.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
    /// Returns the canonical key for the tipset.
    pub fn key(&self) -> &TipsetKeys {
        &self.key
    }
    /// Returns the sorted CIDs of the tipset's blocks.
    pub fn cids(&self) -> &[Cid] {
        self.key.cids()
    }
    /// Returns the CIDs of the parents of the blocks in the tipset.
    pub fn parents(&self) -> &TipsetKeys {
        self.blocks[0].parents()
    }
    /// Returns the tipset's parent weight.
    pub fn weight(&self) -> &BigInt {
        self.blocks[0].weight()
    }
}

impl fmt::Display for Tipset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tipset: {}", self.key)
    }
}
