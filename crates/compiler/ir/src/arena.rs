//! Slot arenas with stable handles.
//!
//! Freeing a slot leaves a hole instead of shifting the remaining entries, so
//! handles held elsewhere stay valid for every live element.

use std::fmt;
use std::ops::{Index, IndexMut};

use index_vec::{Idx, IndexVec};

#[derive(Clone)]
pub struct Slots<I: Idx, T> {
    slots: IndexVec<I, Option<T>>,
    live: usize,
}

impl<I: Idx, T> Slots<I, T> {
    pub fn new() -> Self {
        Self {
            slots: IndexVec::new(),
            live: 0,
        }
    }

    /// Stores `value` in a fresh slot and returns its handle
    pub fn alloc(&mut self, value: T) -> I {
        self.live += 1;
        self.slots.push(Some(value))
    }

    pub fn get(&self, id: I) -> Option<&T> {
        self.slots.get(id).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: I) -> Option<&mut T> {
        self.slots.get_mut(id).and_then(Option::as_mut)
    }

    pub fn contains(&self, id: I) -> bool {
        self.get(id).is_some()
    }

    /// Empties the slot of `id`, returning what it held
    pub fn free(&mut self, id: I) -> Option<T> {
        let value = self.slots.get_mut(id)?.take();
        if value.is_some() {
            self.live -= 1;
        }
        value
    }

    /// Number of live elements
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Live elements in allocation order
    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> + '_ {
        self.slots
            .iter_enumerated()
            .filter_map(|(id, slot)| slot.as_ref().map(|value| (id, value)))
    }

    pub fn ids(&self) -> impl Iterator<Item = I> + '_ {
        self.iter().map(|(id, _)| id)
    }
}

impl<I: Idx, T> Default for Slots<I, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Idx, T: fmt::Debug> fmt::Debug for Slots<I, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<I: Idx, T> Index<I> for Slots<I, T> {
    type Output = T;

    fn index(&self, id: I) -> &T {
        self.get(id)
            .unwrap_or_else(|| panic!("use of freed or unknown handle {id:?}"))
    }
}

impl<I: Idx, T> IndexMut<I> for Slots<I, T> {
    fn index_mut(&mut self, id: I) -> &mut T {
        self.get_mut(id)
            .unwrap_or_else(|| panic!("use of freed or unknown handle {id:?}"))
    }
}
