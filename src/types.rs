use bytes::Bytes;

/// Largest sequence number that fits in a tag next to the value type.
pub const MAX_SEQUENCE: u64 = u64::MAX >> 8;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub enum ValueType {
    Deletion = 0,
    Value = 1,
}

/// Value half of a memtable record: a sequence-tagged value or tombstone.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MemEntry {
    tag: u64,
    value: Bytes,
}

impl MemEntry {
    pub(crate) fn new(seq: u64, value_type: ValueType, value: Bytes) -> Self {
        let tag = seq << 8 | value_type as u64;
        Self { tag, value }
    }

    pub fn value_type(&self) -> ValueType {
        match self.tag & 0xff {
            0 => ValueType::Deletion,
            _ => ValueType::Value,
        }
    }

    pub fn seq(&self) -> u64 {
        self.tag >> 8
    }

    pub fn is_deletion(&self) -> bool {
        self.value_type() == ValueType::Deletion
    }

    pub fn value(&self) -> &Bytes {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use crate::types::{MemEntry, ValueType, MAX_SEQUENCE};
    use bytes::Bytes;

    #[test]
    fn test_tag() {
        let entry = MemEntry::new(1, ValueType::Value, Bytes::from_static(&[8; 12]));
        assert_eq!(entry.seq(), 1);
        assert_eq!(entry.value_type(), ValueType::Value);
        assert_eq!(entry.value().len(), 12);

        let tombstone = MemEntry::new(MAX_SEQUENCE, ValueType::Deletion, Bytes::new());
        assert_eq!(tombstone.seq(), MAX_SEQUENCE);
        assert!(tombstone.is_deletion());
    }
}
