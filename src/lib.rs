use crate::error::Error;

mod arena;
pub mod btree;
pub mod cmp;
pub mod error;
pub mod iter;
pub mod memtable;
pub mod skiplist;
pub mod types;

pub use crate::btree::BPlusTree;
pub use crate::memtable::{MemTable, MemTableOptions, SharedMemTable};
pub use crate::skiplist::{SkipList, SkipListOptions};

pub type Result<T> = std::result::Result<T, Error>;

#[macro_export]
macro_rules! ensure {
    ($cond:expr,$err:expr $(,)?) => {
        if !$cond {
            return Err($err);
        }
    };
}
