// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::vrf_proof::VRFProof;
use fvm_ipld_encoding::tuple::*;

/// Proof that a miner won the leader election for an epoch.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize_tuple, Deserialize_tuple)]
pub struct ElectionProof {
    /// A proof output by running a VRF on the election randomness
    pub vrfproof: VRFProof,
}
