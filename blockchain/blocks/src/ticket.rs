// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::vrf_proof::VRFProof;
use fvm_ipld_encoding::tuple::*;

/// A Ticket is a marker of a tick of the blockchain's clock. It is the source
/// of randomness for proofs of storage and leader election. It is generated
/// by the miner of a block using a VRF.
#[derive(
    Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Default, Serialize_tuple, Deserialize_tuple,
)]
pub struct Ticket {
    /// A proof output by running a VRF on the VRF output of the parent ticket
    pub vrfproof: VRFProof,
}

impl Ticket {
    /// Ticket constructor
    pub fn new(vrfproof: VRFProof) -> Self {
        Self { vrfproof }
    }
}
