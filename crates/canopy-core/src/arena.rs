use std::fmt;

///
/// Handle
///
/// Generation-checked handle to an arena slot. Two parents holding the same
/// handle share one entity; a handle to a removed slot resolves to `None`
/// instead of dangling.
///

#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}v{})", self.index, self.generation)
    }
}

///
/// Arena
///
/// Slot arena with generational indices. Freed slots are recycled with a
/// bumped generation so stale handles can never observe a new occupant.
///

#[derive(Clone, Debug)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

#[derive(Clone, Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

impl<T> Arena<T> {
    /// Create an empty arena.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Number of live entries.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the arena holds no live entries.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert a value and return its handle.
    pub fn insert(&mut self, value: T) -> Handle {
        self.len += 1;

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);

            return Handle {
                index,
                generation: slot.generation,
            };
        }

        let index = u32::try_from(self.slots.len()).expect("arena slot count exceeds u32");
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });

        Handle {
            index,
            generation: 0,
        }
    }

    /// Resolve a handle, returning `None` for stale or foreign handles.
    #[must_use]
    pub fn get(&self, handle: Handle) -> Option<&T> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }

        slot.value.as_ref()
    }

    /// Resolve a handle mutably.
    #[must_use]
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }

        slot.value.as_mut()
    }

    /// Remove a value, invalidating every copy of its handle.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }

        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.len -= 1;

        Some(value)
    }

    /// Returns `true` if the handle resolves to a live entry.
    #[must_use]
    pub fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    /// Iterate over live `(handle, value)` pairs in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let value = slot.value.as_ref()?;
            let handle = Handle {
                index: u32::try_from(index).expect("arena slot count exceeds u32"),
                generation: slot.generation,
            };

            Some((handle, value))
        })
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_get() {
        let mut arena = Arena::new();
        let a = arena.insert("alpha");
        let b = arena.insert("beta");

        assert_eq!(arena.get(a), Some(&"alpha"));
        assert_eq!(arena.get(b), Some(&"beta"));
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn stale_handles_resolve_to_none() {
        let mut arena = Arena::new();
        let a = arena.insert(1);

        assert_eq!(arena.remove(a), Some(1));
        assert_eq!(arena.get(a), None);

        // The recycled slot has a new generation.
        let b = arena.insert(2);
        assert_ne!(a, b);
        assert_eq!(arena.get(a), None);
        assert_eq!(arena.get(b), Some(&2));
    }

    #[test]
    fn shared_handles_point_at_one_slot() {
        let mut arena = Arena::new();
        let a = arena.insert(String::from("shared"));
        let alias = a;

        arena.get_mut(a).expect("live").push('!');
        assert_eq!(arena.get(alias).map(String::as_str), Some("shared!"));
    }
}
