/// Positioned cursor over an ordered structure.
///
/// A fresh cursor is not positioned; call one of the `seek` methods first.
/// Stepping past either end leaves the cursor invalid.
pub trait Iter {
    type Key: ?Sized;
    type Item;
    fn valid(&self) -> bool;
    fn prev(&mut self) -> crate::Result<()>;
    fn next(&mut self) -> crate::Result<()>;
    fn current(&self) -> Option<Self::Item>;
    /// Positions at the first entry whose key is greater than or equal to `target`.
    fn seek(&mut self, target: &Self::Key);
    fn seek_to_first(&mut self);
    fn seek_to_last(&mut self);
}
