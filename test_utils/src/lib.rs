use rand::prelude::{SliceRandom, StdRng};
use rand::{Rng, SeedableRng};

pub const ALPHABET_KEYS: [&str; 26] = [
    "aba", "abb", "abc", "abd", "abe", "abf", "abg", "abh", "abi", "abj", "abk", "abl", "abm",
    "abn", "abo", "abp", "abq", "abr", "abs", "abt", "abu", "abv", "abw", "abx", "aby", "abz",
];

/// `0..n` in a seeded random order.
pub fn shuffled_keys(seed: u64, n: u64) -> Vec<u64> {
    let mut keys: Vec<u64> = (0..n).collect();
    keys.shuffle(&mut StdRng::seed_from_u64(seed));
    keys
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Insert(u64, u64),
    Erase(u64),
}

/// A reproducible mix of inserts and erases over `0..key_space`.
///
/// Roughly one op in three is an erase so that lists both grow and shrink.
pub fn random_ops(seed: u64, count: usize, key_space: u64) -> Vec<Op> {
    let mut rand = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let key = rand.gen_range(0..key_space);
            if rand.gen_ratio(1, 3) {
                Op::Erase(key)
            } else {
                Op::Insert(key, rand.gen())
            }
        })
        .collect()
}

/// Random byte keys of length `1..=max_len`.
pub fn random_byte_keys(seed: u64, count: usize, max_len: usize) -> Vec<Vec<u8>> {
    let mut rand = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let len = rand.gen_range(1..=max_len);
            (0..len).map(|_| rand.gen()).collect()
        })
        .collect()
}
