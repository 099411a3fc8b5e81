// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::multihash::{Code, MultihashDigest};
use cid::Cid;
use fvm_ipld_encoding::{from_slice, to_vec, DAG_CBOR};
use fvm_shared::address::Address;
use fvm_shared::bigint::BigInt;
use redwood_blocks::{BlockHeader, Error, Ticket, Tipset, TipsetKeys, VRFProof};

const WEIGHT: u64 = 10;

fn template_key(data: &[u8]) -> Cid {
    Cid::new_v1(DAG_CBOR, Code::Blake2b256.digest(data))
}

// template_header defines a block header used in testing
fn template_header(ticket_p: Vec<u8>, timestamp: u64, miner: u64) -> BlockHeader {
    BlockHeader::builder()
        .parents(TipsetKeys::new(vec![template_key(b"parent content")]))
        .weight(BigInt::from(WEIGHT))
        .epoch(1)
        .miner_address(Address::new_id(miner))
        .timestamp(timestamp)
        .ticket(Ticket::new(VRFProof::new(ticket_p)))
        .build_and_validate()
        .unwrap()
}

// header_setup returns a vec of block headers to be used for testing purposes
fn header_setup() -> Vec<BlockHeader> {
    vec![
        template_header(vec![1, 4, 3, 6, 7, 1, 2], 7, 1),
        template_header(vec![1, 4, 3, 6, 1, 1, 2], 4, 2),
        template_header(vec![9, 0, 5, 8, 7, 9, 2], 1, 3),
    ]
}

fn setup() -> Tipset {
    Tipset::new(header_setup()).expect("tipset is invalid")
}

#[test]
fn new_test() {
    let headers = header_setup();
    assert!(Tipset::new(headers).is_ok(), "result is invalid");
}

#[test]
fn min_ticket_test() {
    let tipset = setup();
    let expected_value: &[u8] = &[1, 4, 3, 6, 1, 1, 2];
    assert_eq!(tipset.min_ticket().vrfproof.as_bytes(), expected_value);
}

#[test]
fn min_timestamp_test() {
    let tipset = setup();
    assert_eq!(tipset.min_timestamp(), 1);
}

#[test]
fn len_test() {
    let tipset = setup();
    assert_eq!(tipset.len(), 3);
    assert!(!tipset.is_empty());
}

#[test]
fn parents_test() {
    let tipset = setup();
    assert_eq!(
        *tipset.parents(),
        TipsetKeys::new(vec![template_key(b"parent content")])
    );
}

#[test]
fn weight_test() {
    let tipset = setup();
    assert_eq!(tipset.weight(), &BigInt::from(WEIGHT));
}

#[test]
fn key_is_insertion_order_independent() {
    let mut headers = header_setup();
    let forward = Tipset::new(headers.clone()).unwrap();
    headers.reverse();
    let backward = Tipset::new(headers).unwrap();
    assert_eq!(forward.key(), backward.key());
    assert_eq!(forward.blocks(), backward.blocks());
}

#[test]
fn blocks_ordered_by_ticket() {
    let tipset = setup();
    let mut tickets: Vec<_> = tipset
        .blocks()
        .iter()
        .map(|header| header.ticket().clone())
        .collect();
    let sorted = {
        let mut t = tickets.clone();
        t.sort();
        t
    };
    assert_eq!(tickets, sorted);
    tickets.dedup();
    assert_eq!(tickets.len(), 3);
}

#[test]
fn empty_tipset_is_rejected() {
    assert_eq!(Tipset::new(vec![]).unwrap_err(), Error::NoBlocks);
}

#[test]
fn mismatched_parents_are_rejected() {
    let mut headers = header_setup();
    headers.push(
        BlockHeader::builder()
            .parents(TipsetKeys::new(vec![template_key(b"other parent")]))
            .weight(BigInt::from(WEIGHT))
            .epoch(1)
            .miner_address(Address::new_id(4))
            .ticket(Ticket::new(VRFProof::new(vec![5])))
            .build_and_validate()
            .unwrap(),
    );
    assert!(matches!(
        Tipset::new(headers),
        Err(Error::InvalidTipset(_))
    ));
}

#[test]
fn mismatched_epochs_are_rejected() {
    let mut headers = header_setup();
    headers.push(
        BlockHeader::builder()
            .parents(TipsetKeys::new(vec![template_key(b"parent content")]))
            .weight(BigInt::from(WEIGHT))
            .epoch(2)
            .miner_address(Address::new_id(4))
            .ticket(Ticket::new(VRFProof::new(vec![5])))
            .build_and_validate()
            .unwrap(),
    );
    assert!(matches!(
        Tipset::new(headers),
        Err(Error::InvalidTipset(_))
    ));
}

#[test]
fn mismatched_weights_are_rejected() {
    let mut headers = header_setup();
    headers.push(
        BlockHeader::builder()
            .parents(TipsetKeys::new(vec![template_key(b"parent content")]))
            .weight(BigInt::from(WEIGHT + 1))
            .epoch(1)
            .miner_address(Address::new_id(4))
            .ticket(Ticket::new(VRFProof::new(vec![5])))
            .build_and_validate()
            .unwrap(),
    );
    assert!(matches!(
        Tipset::new(headers),
        Err(Error::InvalidTipset(_))
    ));
}

#[test]
fn duplicate_blocks_are_rejected() {
    let mut headers = header_setup();
    headers.push(headers[0].clone());
    assert!(matches!(
        Tipset::new(headers),
        Err(Error::InvalidTipset(_))
    ));
}

#[test]
fn keys_round_trip_through_cbor() {
    let key = TipsetKeys::new(vec![
        template_key(b"first block"),
        template_key(b"second block"),
    ]);
    let bytes = to_vec(&key).unwrap();
    let decoded: TipsetKeys = from_slice(&bytes).unwrap();
    assert_eq!(decoded, key);
}
