// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use redwood_db::Store;

pub fn write<DB>(db: &DB)
where
    DB: Store,
{
    db.write(b"test key", b"test value").unwrap();
    // a second write to the same key replaces the value
    db.write(b"test key", b"a different value").unwrap();
    assert_eq!(
        db.read(b"test key").unwrap(),
        Some(b"a different value".to_vec())
    );
}

pub fn read<DB>(db: &DB)
where
    DB: Store,
{
    db.write([7, 7], [1, 2, 3]).unwrap();
    assert_eq!(db.read([7, 7]).unwrap(), Some(vec![1, 2, 3]));
    assert_eq!(db.read([7, 8]).unwrap(), None);
}

pub fn exists<DB>(db: &DB)
where
    DB: Store,
{
    db.write(b"present", []).unwrap();
    assert!(db.exists(b"present").unwrap());
}

pub fn does_not_exist<DB>(db: &DB)
where
    DB: Store,
{
    assert!(!db.exists(b"never written").unwrap());
    assert_eq!(db.read(b"never written").unwrap(), None);
}

pub fn delete<DB>(db: &DB)
where
    DB: Store,
{
    db.write(b"short lived", b"value").unwrap();
    db.delete(b"short lived").unwrap();
    assert!(!db.exists(b"short lived").unwrap());
    // deleting an absent key is not an error
    db.delete(b"short lived").unwrap();
}

pub fn bulk_write<DB>(db: &DB)
where
    DB: Store,
{
    let keys = [[10], [20], [30]];
    let values = [[11], [21], [31]];
    db.bulk_write(&keys, &values).unwrap();
    for (key, value) in keys.iter().zip(values.iter()) {
        assert_eq!(db.read(key).unwrap(), Some(value.to_vec()));
    }
}

pub fn bulk_write_length_mismatch<DB>(db: &DB)
where
    DB: Store,
{
    let keys = [[10], [20]];
    let values = [[11]];
    assert!(db.bulk_write(&keys, &values).is_err());
    // nothing from the rejected batch may land
    assert!(!db.exists([10]).unwrap());
}

pub fn bulk_read<DB>(db: &DB)
where
    DB: Store,
{
    let keys = [[40], [50], [60]];
    let values = [[41], [51], [61]];
    db.bulk_write(&keys, &values).unwrap();

    // one absent key in the middle yields a None, not an error
    let queried = [[40], [45], [50]];
    let results = db.bulk_read(&queried).unwrap();
    assert_eq!(results[0], Some(vec![41]));
    assert_eq!(results[1], None);
    assert_eq!(results[2], Some(vec![51]));
}

pub fn bulk_delete<DB>(db: &DB)
where
    DB: Store,
{
    let keys = [[70], [80], [90]];
    let values = [[71], [81], [91]];
    db.bulk_write(&keys, &values).unwrap();
    db.bulk_delete(&keys[..2]).unwrap();
    assert!(!db.exists([70]).unwrap());
    assert!(!db.exists([80]).unwrap());
    assert!(db.exists([90]).unwrap());
}
