use std::collections::TryReserveError;
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;
use std::mem::size_of;
use std::ops::{Index, IndexMut};

/// Stable reference to a slot in an [`Arena`].
///
/// A handle stays valid until the slot is removed. Vacated slots are reused,
/// so a stale handle may alias a newer value; callers unlink a handle from
/// every structure before removing it.
pub(crate) struct Handle<T> {
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    fn new(index: usize) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Debug for Handle<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.index)
    }
}

enum Slot<T> {
    Occupied(T),
    Vacant(Option<usize>),
}

/// Slab of values addressed by [`Handle`]s, with a free list of vacated slots.
pub(crate) struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Option<usize>,
    len: usize,
}

impl<T> Arena<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: None,
            len: 0,
        }
    }

    /// Makes sure the next `additional` inserts do not allocate.
    pub(crate) fn try_reserve(&mut self, additional: usize) -> Result<(), TryReserveError> {
        let vacant = self.slots.len() - self.len;
        if additional > vacant {
            self.slots.try_reserve(additional - vacant)?;
        }
        Ok(())
    }

    pub(crate) fn insert(&mut self, value: T) -> Handle<T> {
        self.len += 1;
        match self.free {
            Some(index) => {
                if let Slot::Vacant(next) = self.slots[index] {
                    self.free = next;
                }
                self.slots[index] = Slot::Occupied(value);
                Handle::new(index)
            }
            None => {
                self.slots.push(Slot::Occupied(value));
                Handle::new(self.slots.len() - 1)
            }
        }
    }

    pub(crate) fn remove(&mut self, handle: Handle<T>) -> Option<T> {
        let slot = self.slots.get_mut(handle.index)?;
        if let Slot::Vacant(_) = slot {
            return None;
        }
        let removed = std::mem::replace(slot, Slot::Vacant(self.free));
        self.free = Some(handle.index);
        self.len -= 1;
        match removed {
            Slot::Occupied(value) => Some(value),
            Slot::Vacant(_) => None,
        }
    }

    pub(crate) fn get(&self, handle: Handle<T>) -> Option<&T> {
        match self.slots.get(handle.index) {
            Some(Slot::Occupied(value)) => Some(value),
            _ => None,
        }
    }

    pub(crate) fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        match self.slots.get_mut(handle.index) {
            Some(Slot::Occupied(value)) => Some(value),
            _ => None,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn allocated_bytes(&self) -> usize {
        self.slots.capacity() * size_of::<Slot<T>>()
    }
}

impl<T> Index<Handle<T>> for Arena<T> {
    type Output = T;

    fn index(&self, handle: Handle<T>) -> &T {
        match self.get(handle) {
            Some(value) => value,
            None => panic!("arena handle {:?} is vacant", handle),
        }
    }
}

impl<T> IndexMut<Handle<T>> for Arena<T> {
    fn index_mut(&mut self, handle: Handle<T>) -> &mut T {
        match self.get_mut(handle) {
            Some(value) => value,
            None => panic!("arena handle {:?} is vacant", handle),
        }
    }
}
