use std::collections::BTreeMap;

use pretty_assertions::assert_eq;
use rand::prelude::StdRng;
use rand::SeedableRng;
use skipmem::cmp::DefaultComparator;
use skipmem::iter::Iter;
use skipmem::{SkipList, SkipListOptions};
use test_utils::{random_byte_keys, random_ops, shuffled_keys, Op};

fn assert_matches_model(list: &SkipList<u64, u64>, model: &BTreeMap<u64, u64>) {
    assert_eq!(list.len(), model.len());
    let entries: Vec<_> = list.iter().map(|(k, v)| (*k, *v)).collect();
    let expected: Vec<_> = model.iter().map(|(k, v)| (*k, *v)).collect();
    assert_eq!(entries, expected);
}

#[test]
fn random_ops_match_btreemap() {
    for seed in 0..8 {
        let mut list = SkipList::with_options(SkipListOptions {
            seed,
            ..Default::default()
        });
        let mut model = BTreeMap::new();
        for op in random_ops(seed, 2000, 256) {
            match op {
                Op::Insert(k, v) => {
                    assert_eq!(list.insert(k, v).unwrap(), model.insert(k, v));
                }
                Op::Erase(k) => {
                    let before = list.len();
                    let removed = model.remove(&k).is_some();
                    assert_eq!(list.erase(&k), removed);
                    assert_eq!(list.len(), if removed { before - 1 } else { before });
                    assert_eq!(list.find(&k), None);
                }
            }
            list.validate().unwrap();
        }
        assert_matches_model(&list, &model);
        for k in 0..256 {
            assert_eq!(list.find(&k), model.get(&k));
        }
    }
}

#[test]
fn never_inserted_keys_are_missing() {
    let mut list = SkipList::new();
    for k in shuffled_keys(17, 500) {
        list.insert(k * 2, k).unwrap();
    }
    for k in 0..500 {
        assert!(list.find(&(k * 2 + 1)).is_none());
        assert_eq!(list.find(&(k * 2)), Some(&k));
    }
}

#[test]
fn erase_everything_then_reuse() {
    let mut list = SkipList::with_rng(DefaultComparator, StdRng::seed_from_u64(5), 32);
    let keys = shuffled_keys(2, 300);
    for &k in &keys {
        list.insert(k, k).unwrap();
    }
    let height = list.height();
    for &k in keys.iter().rev() {
        assert!(list.erase(&k));
    }
    assert!(list.is_empty());
    assert_eq!(list.height(), height);
    list.validate().unwrap();

    for &k in &keys[..50] {
        list.insert(k, k + 1).unwrap();
    }
    list.validate().unwrap();
    assert_eq!(list.len(), 50);
    for &k in &keys[..50] {
        assert_eq!(list.find(&k), Some(&(k + 1)));
    }
}

#[test]
fn cursor_walks_both_directions() {
    let mut list = SkipList::new();
    for k in shuffled_keys(8, 64) {
        list.insert(k, ()).unwrap();
    }

    let mut cursor = list.cursor();
    cursor.seek_to_first();
    let mut forward = Vec::new();
    while let Some((k, _)) = cursor.current() {
        forward.push(*k);
        cursor.next().unwrap();
    }
    assert_eq!(forward, (0..64).collect::<Vec<_>>());

    cursor.seek_to_last();
    let mut backward = Vec::new();
    while let Some((k, _)) = cursor.current() {
        backward.push(*k);
        cursor.prev().unwrap();
    }
    assert_eq!(backward, (0..64).rev().collect::<Vec<_>>());
}

#[test]
fn byte_keys_keep_lexicographic_order() {
    let mut list = SkipList::new();
    let keys = random_byte_keys(21, 400, 8);
    for key in &keys {
        list.insert(key.clone(), key.len()).unwrap();
    }
    list.validate().unwrap();

    let mut expected = keys.clone();
    expected.sort();
    expected.dedup();
    let stored: Vec<_> = list.iter().map(|(k, _)| k.clone()).collect();
    assert_eq!(stored, expected);
    for key in &keys {
        assert_eq!(list.find(key.as_slice()), Some(&key.len()));
    }
}
