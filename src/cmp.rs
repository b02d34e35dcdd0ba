use std::cmp::Ordering;

/// Total order over keys.
///
/// A comparator used with borrowed lookups must order `Q` exactly as it
/// orders the owning key type, the same contract `Borrow` asks of `Ord`.
pub trait Comparator<T: ?Sized> {
    fn cmp(&self, a: &T, b: &T) -> Ordering;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultComparator;

impl<T: Ord + ?Sized> Comparator<T> for DefaultComparator {
    fn cmp(&self, a: &T, b: &T) -> Ordering {
        a.cmp(b)
    }
}

/// Orders keys from largest to smallest.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReverseComparator;

impl<T: Ord + ?Sized> Comparator<T> for ReverseComparator {
    fn cmp(&self, a: &T, b: &T) -> Ordering {
        b.cmp(a)
    }
}
