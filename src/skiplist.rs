use crate::arena::{Arena, Handle};
use crate::cmp::{Comparator, DefaultComparator};
use crate::ensure;
use crate::error::Error;
use crate::iter::Iter;
use rand::prelude::StdRng;
use rand::{RngCore, SeedableRng};
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};
use std::mem::size_of;
use thiserror::Error;
use tracing::trace;

const MAX_HEIGHT: usize = 32;
const DEFAULT_SEED: u64 = 0xdeadbeef;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SkipListError {
    #[error("keys out of order at level {level}")]
    OutOfOrder { level: usize },
    #[error("node at level {level} references a released entry")]
    DanglingIndex { level: usize },
    #[error("down link at level {level} does not reach the same key")]
    BrokenDownLink { level: usize },
    #[error("level {level} holds {found} keys, expected {expected}")]
    LengthMismatch {
        level: usize,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Clone)]
pub struct SkipListOptions {
    /// Upper bound on the number of levels a key can be promoted through.
    pub max_height: usize,
    /// Seed for the default coin source.
    pub seed: u64,
}

impl Default for SkipListOptions {
    fn default() -> Self {
        Self {
            max_height: MAX_HEIGHT,
            seed: DEFAULT_SEED,
        }
    }
}

/// Canonical storage for a key. Allocated once per distinct key.
struct Entry<K, V> {
    key: K,
    value: V,
}

type EntryRef<K, V> = Handle<Entry<K, V>>;
type NodeRef<K, V> = Handle<Node<K, V>>;

/// Link cell at one level. Every cell for a key shares its entry handle.
struct Node<K, V> {
    entry: Option<EntryRef<K, V>>,
    forward: Option<NodeRef<K, V>>,
    down: Option<NodeRef<K, V>>,
}

impl<K, V> Node<K, V> {
    fn sentinel(down: Option<NodeRef<K, V>>) -> Self {
        Self {
            entry: None,
            forward: None,
            down,
        }
    }
}

struct Level<K, V> {
    sentinel: NodeRef<K, V>,
    len: usize,
}

/// Ordered map built from stacked linked levels.
///
/// ```text
/// L2: HEAD ----------------> 5
///      |                     |
/// L1: HEAD ------> 3 ------> 5
///      |           |         |
/// L0: HEAD -> 1 -> 3 -> 4 -> 5 -> 9
/// ```
///
/// Level 0 holds every key. A key reaches level `i + 1` with probability 1/2
/// once it is on level `i`. Levels are created on demand by insertion and are
/// never removed.
pub struct SkipList<K, V, C = DefaultComparator, R = StdRng> {
    cmp: C,
    rand: R,
    entries: Arena<Entry<K, V>>,
    nodes: Arena<Node<K, V>>,
    // levels[0] is the base level
    levels: Vec<Level<K, V>>,
    max_height: usize,
    len: usize,
}

impl<K: Ord, V> SkipList<K, V> {
    pub fn new() -> Self {
        Self::with_options(SkipListOptions::default())
    }

    pub fn with_options(options: SkipListOptions) -> Self {
        SkipList::with_rng(
            DefaultComparator,
            StdRng::seed_from_u64(options.seed),
            options.max_height,
        )
    }
}

impl<K: Ord, V> Default for SkipList<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, C, R> SkipList<K, V, C, R>
where
    R: RngCore,
{
    pub fn with_rng(cmp: C, rand: R, max_height: usize) -> Self {
        let mut nodes = Arena::new();
        let sentinel = nodes.insert(Node::sentinel(None));
        Self {
            cmp,
            rand,
            entries: Arena::new(),
            nodes,
            levels: vec![Level { sentinel, len: 0 }],
            max_height: max_height.max(1),
            len: 0,
        }
    }

    /// Reserves everything a new key of `height` levels needs and returns how
    /// many levels it adds. Nothing is linked here.
    fn reserve_for(
        &mut self,
        height: usize,
        prevs: &mut Vec<NodeRef<K, V>>,
    ) -> crate::Result<usize> {
        let grown = height.saturating_sub(self.levels.len());
        self.entries.try_reserve(1)?;
        self.nodes.try_reserve(height.saturating_add(grown))?;
        self.levels.try_reserve(grown)?;
        prevs.try_reserve(grown)?;
        Ok(grown)
    }

    fn random_height(&mut self) -> usize {
        let mut height = 1;
        while height < self.max_height && self.rand.next_u32() & 1 == 1 {
            height += 1;
        }
        height
    }

    /// Inserts `key`, returning the value it replaced.
    ///
    /// A replaced key keeps its nodes; only the value at the base entry changes.
    /// Every allocation a new key needs is reserved before anything is linked,
    /// so an allocation failure leaves the list as it was.
    pub fn insert(&mut self, key: K, value: V) -> crate::Result<Option<V>>
    where
        C: Comparator<K>,
    {
        let mut prevs = Vec::new();
        prevs.try_reserve(self.levels.len())?;
        let mut current = self.top();
        loop {
            current = self.get_bound(current, &key);
            if self.compare(current, &key) == Ordering::Equal {
                if let Some(entry) = self.nodes[current].entry {
                    let old = std::mem::replace(&mut self.entries[entry].value, value);
                    return Ok(Some(old));
                }
            }
            prevs.push(current);
            match self.nodes[current].down {
                Some(down) => current = down,
                None => break,
            }
        }
        // walk order was top-down, splicing goes bottom-up
        prevs.reverse();

        let height = self.random_height();
        let grown = self.reserve_for(height, &mut prevs)?;

        for _ in 0..grown {
            let below = self.top();
            let sentinel = self.nodes.insert(Node::sentinel(Some(below)));
            self.levels.push(Level { sentinel, len: 0 });
            prevs.push(sentinel);
            trace!(height = self.levels.len(), "skiplist grew a level");
        }

        let entry = self.entries.insert(Entry { key, value });
        let mut below = None;
        for (level, &prev) in prevs.iter().take(height).enumerate() {
            let forward = self.nodes[prev].forward;
            let node = self.nodes.insert(Node {
                entry: Some(entry),
                forward,
                down: below,
            });
            self.nodes[prev].forward = Some(node);
            self.levels[level].len += 1;
            below = Some(node);
        }

        self.len += 1;
        Ok(None)
    }
}

impl<K, V, C, R> SkipList<K, V, C, R> {
    fn top(&self) -> NodeRef<K, V> {
        self.levels[self.levels.len() - 1].sentinel
    }

    fn base(&self) -> NodeRef<K, V> {
        self.levels[0].sentinel
    }

    fn entry_of(&self, node: NodeRef<K, V>) -> Option<&Entry<K, V>> {
        self.nodes[node].entry.map(|entry| &self.entries[entry])
    }

    /// Orders `node` against `key`. A sentinel sorts before every key.
    fn compare<Q>(&self, node: NodeRef<K, V>, key: &Q) -> Ordering
    where
        K: Borrow<Q>,
        C: Comparator<Q>,
        Q: ?Sized,
    {
        match self.entry_of(node) {
            Some(entry) => self.cmp.cmp(entry.key.borrow(), key),
            None => Ordering::Less,
        }
    }

    /// Last node forward of `start` whose key is `<= key`.
    fn get_bound<Q>(&self, start: NodeRef<K, V>, key: &Q) -> NodeRef<K, V>
    where
        K: Borrow<Q>,
        C: Comparator<Q>,
        Q: ?Sized,
    {
        let mut current = start;
        while let Some(next) = self.nodes[current].forward {
            if self.compare(next, key) == Ordering::Greater {
                break;
            }
            current = next;
        }
        current
    }

    /// Last node forward of `start` whose key is `< key`.
    fn get_strict_bound<Q>(&self, start: NodeRef<K, V>, key: &Q) -> NodeRef<K, V>
    where
        K: Borrow<Q>,
        C: Comparator<Q>,
        Q: ?Sized,
    {
        let mut current = start;
        while let Some(next) = self.nodes[current].forward {
            if self.compare(next, key) != Ordering::Less {
                break;
            }
            current = next;
        }
        current
    }

    fn find_entry<Q>(&self, key: &Q) -> Option<EntryRef<K, V>>
    where
        K: Borrow<Q>,
        C: Comparator<Q>,
        Q: ?Sized,
    {
        let mut current = self.top();
        loop {
            current = self.get_bound(current, key);
            if self.compare(current, key) == Ordering::Equal {
                return self.nodes[current].entry;
            }
            current = self.nodes[current].down?;
        }
    }

    pub fn find<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        C: Comparator<Q>,
        Q: ?Sized,
    {
        self.find_entry(key).map(|entry| &self.entries[entry].value)
    }

    pub fn find_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        C: Comparator<Q>,
        Q: ?Sized,
    {
        let entry = self.find_entry(key)?;
        Some(&mut self.entries[entry].value)
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        C: Comparator<Q>,
        Q: ?Sized,
    {
        self.find_entry(key).is_some()
    }

    /// Unlinks `key` from every level it reached and returns its value.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        C: Comparator<Q>,
        Q: ?Sized,
    {
        let mut found = None;
        let mut current = self.top();
        let mut level = self.levels.len();
        loop {
            level -= 1;
            let prev = self.get_strict_bound(current, key);
            if let Some(next) = self.nodes[prev].forward {
                if self.compare(next, key) == Ordering::Equal {
                    let forward = self.nodes[next].forward;
                    self.nodes[prev].forward = forward;
                    if let Some(node) = self.nodes.remove(next) {
                        found = node.entry;
                    }
                    self.levels[level].len -= 1;
                }
            }
            match self.nodes[prev].down {
                Some(down) => current = down,
                None => break,
            }
        }

        let entry = self.entries.remove(found?)?;
        self.len -= 1;
        Some(entry.value)
    }

    /// Returns `true` if `key` was present.
    pub fn erase<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        C: Comparator<Q>,
        Q: ?Sized,
    {
        self.remove(key).is_some()
    }

    /// Base-level node holding the last key `< key`, or the base sentinel.
    fn base_strict_bound<Q>(&self, key: &Q) -> NodeRef<K, V>
    where
        K: Borrow<Q>,
        C: Comparator<Q>,
        Q: ?Sized,
    {
        let mut current = self.top();
        loop {
            current = self.get_strict_bound(current, key);
            match self.nodes[current].down {
                Some(down) => current = down,
                None => return current,
            }
        }
    }

    fn find_greater_or_equal<Q>(&self, key: &Q) -> Option<NodeRef<K, V>>
    where
        K: Borrow<Q>,
        C: Comparator<Q>,
        Q: ?Sized,
    {
        self.nodes[self.base_strict_bound(key)].forward
    }

    fn find_less_than<Q>(&self, key: &Q) -> Option<NodeRef<K, V>>
    where
        K: Borrow<Q>,
        C: Comparator<Q>,
        Q: ?Sized,
    {
        let node = self.base_strict_bound(key);
        self.nodes[node].entry.map(|_| node)
    }

    fn find_first(&self) -> Option<NodeRef<K, V>> {
        self.nodes[self.base()].forward
    }

    fn find_last(&self) -> Option<NodeRef<K, V>> {
        let mut current = self.top();
        loop {
            while let Some(next) = self.nodes[current].forward {
                current = next;
            }
            match self.nodes[current].down {
                Some(down) => current = down,
                None => break,
            }
        }
        self.nodes[current].entry.map(|_| current)
    }

    fn pair(&self, node: NodeRef<K, V>) -> Option<(&K, &V)> {
        self.entry_of(node).map(|entry| (&entry.key, &entry.value))
    }

    pub fn first(&self) -> Option<(&K, &V)> {
        self.find_first().and_then(|node| self.pair(node))
    }

    pub fn last(&self) -> Option<(&K, &V)> {
        self.find_last().and_then(|node| self.pair(node))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of levels, including empty ones left behind by removals.
    pub fn height(&self) -> usize {
        self.levels.len()
    }

    pub fn allocated_bytes(&self) -> usize {
        self.entries.allocated_bytes()
            + self.nodes.allocated_bytes()
            + self.levels.capacity() * size_of::<Level<K, V>>()
    }

    /// Keys on each level, top level first.
    pub fn level_keys(&self) -> Vec<Vec<&K>> {
        self.levels
            .iter()
            .rev()
            .map(|level| {
                let mut keys = Vec::with_capacity(level.len);
                let mut current = self.nodes[level.sentinel].forward;
                while let Some(node) = current {
                    if let Some(entry) = self.entry_of(node) {
                        keys.push(&entry.key);
                    }
                    current = self.nodes[node].forward;
                }
                keys
            })
            .collect()
    }

    pub fn iter(&self) -> Entries<'_, K, V, C, R> {
        Entries {
            list: self,
            node: self.find_first(),
            remaining: self.len,
        }
    }

    pub fn cursor(&self) -> SkipListCursor<'_, K, V, C, R> {
        SkipListCursor {
            list: self,
            node: None,
        }
    }

    /// Walks every level and checks the ordering and linking invariants.
    pub fn validate(&self) -> crate::Result<()>
    where
        C: Comparator<K>,
    {
        let mut below = None;
        for (index, level) in self.levels.iter().enumerate() {
            let sentinel = &self.nodes[level.sentinel];
            ensure!(
                sentinel.entry.is_none() && sentinel.down == below,
                SkipListError::BrokenDownLink { level: index }.into()
            );

            let mut found = 0;
            let mut prev: Option<&K> = None;
            let mut current = sentinel.forward;
            while let Some(node) = current {
                let link = &self.nodes[node];
                let entry = match link.entry.and_then(|entry| self.entries.get(entry)) {
                    Some(entry) => entry,
                    None => return Err(SkipListError::DanglingIndex { level: index }.into()),
                };
                if let Some(prev) = prev {
                    ensure!(
                        self.cmp.cmp(prev, &entry.key) == Ordering::Less,
                        SkipListError::OutOfOrder { level: index }.into()
                    );
                }
                let linked_down = match (below, link.down) {
                    (None, None) => true,
                    (Some(_), Some(down)) => self.nodes.get(down).map(|d| d.entry) == Some(link.entry),
                    _ => false,
                };
                ensure!(
                    linked_down,
                    SkipListError::BrokenDownLink { level: index }.into()
                );
                prev = Some(&entry.key);
                found += 1;
                current = link.forward;
            }

            ensure!(
                found == level.len,
                SkipListError::LengthMismatch {
                    level: index,
                    expected: level.len,
                    found,
                }
                .into()
            );
            below = Some(level.sentinel);
        }

        ensure!(
            self.levels[0].len == self.len && self.entries.len() == self.len,
            SkipListError::LengthMismatch {
                level: 0,
                expected: self.len,
                found: self.entries.len(),
            }
            .into()
        );
        Ok(())
    }
}

impl<K: Debug, V, C, R> SkipList<K, V, C, R> {
    pub fn dbg_print(&self) {
        println!("{}", self)
    }
}

impl<K: Debug, V, C, R> Display for SkipList<K, V, C, R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let height = self.levels.len();
        for (i, keys) in self.level_keys().into_iter().enumerate() {
            write!(f, "L{}: HEAD", height - 1 - i)?;
            for key in keys {
                write!(f, " -> {:?}", key)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl<K: Debug, V: Debug, C, R> Debug for SkipList<K, V, C, R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Entries in key order.
pub struct Entries<'a, K, V, C, R> {
    list: &'a SkipList<K, V, C, R>,
    node: Option<NodeRef<K, V>>,
    remaining: usize,
}

impl<'a, K, V, C, R> Iterator for Entries<'a, K, V, C, R> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.node?;
        self.node = self.list.nodes[node].forward;
        self.remaining = self.remaining.saturating_sub(1);
        self.list.pair(node)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K, V, C, R> ExactSizeIterator for Entries<'a, K, V, C, R> {}

impl<'a, K, V, C, R> IntoIterator for &'a SkipList<K, V, C, R> {
    type Item = (&'a K, &'a V);
    type IntoIter = Entries<'a, K, V, C, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct SkipListCursor<'a, K, V, C, R> {
    list: &'a SkipList<K, V, C, R>,
    node: Option<NodeRef<K, V>>,
}

impl<'a, K, V, C, R> SkipListCursor<'a, K, V, C, R> {
    fn is_valid(&self) -> crate::Result<NodeRef<K, V>> {
        self.node.ok_or(Error::InvalidIterator)
    }
}

impl<'a, K, V, C, R> Iter for SkipListCursor<'a, K, V, C, R>
where
    C: Comparator<K>,
{
    type Key = K;
    type Item = (&'a K, &'a V);

    fn valid(&self) -> bool {
        self.node.is_some()
    }

    fn prev(&mut self) -> crate::Result<()> {
        let node = self.is_valid()?;
        let list = self.list;
        self.node = match list.entry_of(node) {
            Some(entry) => list.find_less_than(&entry.key),
            None => None,
        };
        Ok(())
    }

    fn next(&mut self) -> crate::Result<()> {
        let node = self.is_valid()?;
        self.node = self.list.nodes[node].forward;
        Ok(())
    }

    fn current(&self) -> Option<Self::Item> {
        let list = self.list;
        self.node.and_then(|node| list.pair(node))
    }

    fn seek(&mut self, target: &K) {
        self.node = self.list.find_greater_or_equal(target);
    }

    fn seek_to_first(&mut self) {
        self.node = self.list.find_first();
    }

    fn seek_to_last(&mut self) {
        self.node = self.list.find_last();
    }
}
