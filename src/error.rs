use std::collections::TryReserveError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("skiplist error {0}")]
    SkipListError(#[from] crate::skiplist::SkipListError),
    #[error("allocation failed {0}")]
    AllocError(#[from] TryReserveError),
    #[error("sequence number {0} does not fit in an entry tag")]
    SequenceOverflow(u64),
    #[error("iterator is not positioned on an entry")]
    InvalidIterator,
}
