use std::mem::size_of;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tracing::debug;

use crate::ensure;
use crate::error::Error;
use crate::skiplist::{SkipList, SkipListOptions};
use crate::types::{MemEntry, ValueType, MAX_SEQUENCE};

// tag plus key and value length prefixes
const ENTRY_OVERHEAD: usize = size_of::<u64>() + 2 * size_of::<u32>();

#[derive(Debug, Clone)]
pub struct MemTableOptions {
    /// Charged size at which the table asks to be flushed.
    pub write_buffer_size: usize,
    pub skiplist: SkipListOptions,
}

impl Default for MemTableOptions {
    fn default() -> Self {
        Self {
            write_buffer_size: 4 << 20,
            skiplist: SkipListOptions::default(),
        }
    }
}

fn charge(key: &[u8], value: &[u8]) -> usize {
    key.len() + value.len() + ENTRY_OVERHEAD
}

/// In-memory write buffer of an LSM tree.
///
/// Deletes are recorded as tombstones so that a lookup can stop at this table
/// instead of falling through to older data.
pub struct MemTable {
    table: SkipList<Bytes, MemEntry>,
    options: MemTableOptions,
    last_seq: u64,
    usage: usize,
}

impl MemTable {
    pub fn new() -> Self {
        Self::with_options(MemTableOptions::default())
    }

    pub fn with_options(options: MemTableOptions) -> Self {
        Self {
            table: SkipList::with_options(options.skiplist.clone()),
            options,
            last_seq: 0,
            usage: 0,
        }
    }

    /// Records a write. A write older than the one already stored for `key`
    /// is dropped, so the highest sequence number wins regardless of arrival
    /// order.
    pub fn add(
        &mut self,
        seq: u64,
        vtype: ValueType,
        key: impl Into<Bytes>,
        value: impl Into<Bytes>,
    ) -> crate::Result<()> {
        ensure!(seq <= MAX_SEQUENCE, Error::SequenceOverflow(seq));
        let key = key.into();
        self.last_seq = self.last_seq.max(seq);
        if let Some(stored) = self.table.find(&key) {
            if stored.seq() > seq {
                debug!(seq, stored = stored.seq(), "dropping write older than the stored entry");
                return Ok(());
            }
        }

        let value = value.into();
        let added = charge(&key, &value);
        let was_full = self.should_flush();

        let entry = MemEntry::new(seq, vtype, value);
        let replaced = self.table.insert(key.clone(), entry)?;
        if let Some(old) = replaced {
            self.usage -= charge(&key, old.value());
        }
        self.usage += added;

        if !was_full && self.should_flush() {
            debug!(
                usage = self.usage,
                limit = self.options.write_buffer_size,
                entries = self.table.len(),
                "memtable reached its write buffer size"
            );
        }
        Ok(())
    }

    pub fn put(
        &mut self,
        seq: u64,
        key: impl Into<Bytes>,
        value: impl Into<Bytes>,
    ) -> crate::Result<()> {
        self.add(seq, ValueType::Value, key, value)
    }

    pub fn delete(&mut self, seq: u64, key: impl Into<Bytes>) -> crate::Result<()> {
        self.add(seq, ValueType::Deletion, key, Bytes::new())
    }

    /// Live value for `key`. Tombstoned and unknown keys both return `None`;
    /// use [`MemTable::lookup`] to tell them apart.
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        match self.table.find(key) {
            Some(entry) if !entry.is_deletion() => Some(entry.value()),
            _ => None,
        }
    }

    pub fn lookup(&self, key: &[u8]) -> Option<&MemEntry> {
        self.table.find(key)
    }

    /// Drops `key` from the table entirely, tombstone included.
    pub fn purge(&mut self, key: &[u8]) -> bool {
        match self.table.remove(key) {
            Some(entry) => {
                self.usage -= charge(key, entry.value());
                true
            }
            None => false,
        }
    }

    /// Number of keys, tombstones included.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_seq
    }

    pub fn approximate_memory_usage(&self) -> usize {
        self.usage
    }

    pub fn allocated_bytes(&self) -> usize {
        self.table.allocated_bytes()
    }

    pub fn should_flush(&self) -> bool {
        self.usage >= self.options.write_buffer_size
    }

    /// Records in key order, tombstones included.
    pub fn iter(&self) -> impl Iterator<Item = (&Bytes, &MemEntry)> + '_ {
        self.table.iter()
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}

/// [`MemTable`] behind a single reader-writer lock.
#[derive(Clone)]
pub struct SharedMemTable {
    inner: Arc<RwLock<MemTable>>,
}

impl SharedMemTable {
    pub fn new(table: MemTable) -> Self {
        Self {
            inner: Arc::new(RwLock::new(table)),
        }
    }

    pub fn put(
        &self,
        seq: u64,
        key: impl Into<Bytes>,
        value: impl Into<Bytes>,
    ) -> crate::Result<()> {
        self.inner.write().put(seq, key, value)
    }

    pub fn delete(&self, seq: u64, key: impl Into<Bytes>) -> crate::Result<()> {
        self.inner.write().delete(seq, key)
    }

    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        let table = self.inner.read();
        match table.lookup(key) {
            Some(entry) if !entry.is_deletion() => Some(entry.value().clone()),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn should_flush(&self) -> bool {
        self.inner.read().should_flush()
    }

    /// Runs `f` with shared access, e.g. to iterate while flushing.
    pub fn read<T>(&self, f: impl FnOnce(&MemTable) -> T) -> T {
        f(&self.inner.read())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::memtable::{MemTable, MemTableOptions, SharedMemTable, ENTRY_OVERHEAD};
    use crate::types::{ValueType, MAX_SEQUENCE};
    use pretty_assertions::assert_eq;
    use std::thread;

    #[test]
    fn test_put_get() {
        let mut table = MemTable::new();
        table.put(1, "b", "2").unwrap();
        table.put(2, "a", "1").unwrap();
        assert_eq!(table.get(b"a"), Some(b"1".as_slice()));
        assert_eq!(table.get(b"b"), Some(b"2".as_slice()));
        assert_eq!(table.get(b"c"), None);
        assert_eq!(table.len(), 2);
        assert_eq!(table.last_sequence(), 2);
    }

    #[test]
    fn test_newest_sequence_wins() {
        let mut table = MemTable::new();
        table.put(5, "k", "new").unwrap();
        table.put(3, "k", "old").unwrap();
        assert_eq!(table.get(b"k"), Some(b"new".as_slice()));
        assert_eq!(table.lookup(b"k").unwrap().seq(), 5);
        assert_eq!(table.approximate_memory_usage(), 1 + 3 + ENTRY_OVERHEAD);

        // a late tombstone does not hide a newer value
        table.delete(4, "k").unwrap();
        assert_eq!(table.get(b"k"), Some(b"new".as_slice()));

        // equal sequence replaces, as a retried write would
        table.put(5, "k", "again").unwrap();
        assert_eq!(table.get(b"k"), Some(b"again".as_slice()));
        table.delete(6, "k").unwrap();
        assert_eq!(table.get(b"k"), None);
        assert_eq!(table.last_sequence(), 6);
    }

    #[test]
    fn test_sequence_bounds() {
        let mut table = MemTable::new();
        table.put(MAX_SEQUENCE, "k", "v").unwrap();
        assert_eq!(table.lookup(b"k").unwrap().seq(), MAX_SEQUENCE);
        assert_eq!(table.last_sequence(), MAX_SEQUENCE);

        let overflow = MAX_SEQUENCE + 1;
        assert!(matches!(
            table.put(overflow, "j", "v"),
            Err(Error::SequenceOverflow(seq)) if seq == overflow
        ));
        assert!(matches!(
            table.delete(u64::MAX, "k"),
            Err(Error::SequenceOverflow(_))
        ));
        assert!(table.lookup(b"j").is_none());
        assert_eq!(table.len(), 1);
        assert_eq!(table.last_sequence(), MAX_SEQUENCE);
    }

    #[test]
    fn test_delete_leaves_tombstone() {
        let mut table = MemTable::new();
        table.put(1, "k", "v").unwrap();
        table.delete(2, "k").unwrap();
        assert_eq!(table.get(b"k"), None);
        assert_eq!(table.len(), 1);

        let entry = table.lookup(b"k").unwrap();
        assert_eq!(entry.value_type(), ValueType::Deletion);
        assert_eq!(entry.seq(), 2);
        assert!(table.lookup(b"missing").is_none());

        assert!(table.purge(b"k"));
        assert!(table.lookup(b"k").is_none());
        assert!(!table.purge(b"k"));
        assert!(table.is_empty());
        assert_eq!(table.approximate_memory_usage(), 0);
    }

    #[test]
    fn test_usage_tracks_overwrites() {
        let mut table = MemTable::new();
        table.put(1, "key", "value").unwrap();
        assert_eq!(table.approximate_memory_usage(), 3 + 5 + ENTRY_OVERHEAD);
        table.put(2, "key", "v").unwrap();
        assert_eq!(table.approximate_memory_usage(), 3 + 1 + ENTRY_OVERHEAD);
        table.delete(3, "key").unwrap();
        assert_eq!(table.approximate_memory_usage(), 3 + ENTRY_OVERHEAD);
        assert!(table.allocated_bytes() > 0);
    }

    #[test]
    fn test_should_flush() {
        let mut table = MemTable::with_options(MemTableOptions {
            write_buffer_size: 4 * (4 + 4 + ENTRY_OVERHEAD),
            ..Default::default()
        });
        for i in 0..3_u32 {
            table.put(i as u64, i.to_be_bytes().to_vec(), i.to_le_bytes().to_vec()).unwrap();
            assert!(!table.should_flush());
        }
        table.put(3, 3_u32.to_be_bytes().to_vec(), vec![0; 4]).unwrap();
        assert!(table.should_flush());
        assert!(table.purge(&3_u32.to_be_bytes()));
        assert!(!table.should_flush());
    }

    #[test]
    fn test_iter_in_key_order() {
        let mut table = MemTable::new();
        for (seq, key) in ["d", "a", "c", "b"].iter().enumerate() {
            table.put(seq as u64, *key, *key).unwrap();
        }
        table.delete(9, "c").unwrap();
        let records: Vec<_> = table
            .iter()
            .map(|(k, e)| (k.to_vec(), e.value_type()))
            .collect();
        assert_eq!(
            records,
            vec![
                (b"a".to_vec(), ValueType::Value),
                (b"b".to_vec(), ValueType::Value),
                (b"c".to_vec(), ValueType::Deletion),
                (b"d".to_vec(), ValueType::Value),
            ]
        );
    }

    #[test]
    fn test_shared_across_threads() {
        let shared = SharedMemTable::new(MemTable::new());
        thread::scope(|s| {
            for t in 0..4_u64 {
                let shared = shared.clone();
                s.spawn(move || {
                    for i in 0..100_u64 {
                        let key = format!("{t}-{i:03}");
                        shared.put(t * 100 + i, key, i.to_string()).unwrap();
                    }
                });
            }
        });
        assert_eq!(shared.len(), 400);
        assert_eq!(shared.get(b"2-042").as_deref(), Some(b"42".as_slice()));

        shared.delete(1000, "2-042").unwrap();
        assert_eq!(shared.get(b"2-042"), None);
        assert!(!shared.is_empty());
        assert!(!shared.should_flush());
        let sorted = shared.read(|table| {
            let keys: Vec<_> = table.iter().map(|(k, _)| k.clone()).collect();
            keys.windows(2).all(|w| w[0] < w[1])
        });
        assert!(sorted);
    }
}
