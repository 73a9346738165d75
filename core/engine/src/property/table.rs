//! The ordered property table.
//!
//! Maps interned names to property descriptors while preserving insertion
//! order, which `for (k in o)` enumeration observes. Storage is a slab of
//! entries addressed by index: the insertion-order vector and the hash
//! buckets both refer to slab indices, so descriptors never move when the
//! table grows. Removal tombstones the insertion slot and recycles the slab
//! entry through a free list; a re-inserted name gets a fresh insertion
//! index, so enumeration reflects re-insertion time.

use super::PropertyDescriptor;
use crate::string::StringRef;

const INITIAL_BUCKETS: usize = 11;
const INITIAL_ENTRIES: usize = 4;

#[derive(Debug)]
struct Entry {
    name: StringRef,
    descriptor: PropertyDescriptor,
    /// Index into the insertion-order vector while live; meaningless on the
    /// free list.
    order_index: u32,
    /// Bucket chain link while live, free-list link while vacant.
    next: Option<u32>,
}

/// Insertion-ordered name → descriptor map.
#[derive(Debug)]
pub struct PropertyTable {
    slab: Vec<Entry>,
    free: Option<u32>,
    order: Vec<Option<u32>>,
    buckets: Vec<Option<u32>>,
    live: usize,
}

impl Default for PropertyTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertyTable {
    pub fn new() -> Self {
        Self {
            slab: Vec::with_capacity(INITIAL_ENTRIES),
            free: None,
            order: Vec::with_capacity(INITIAL_ENTRIES),
            buckets: Vec::new(),
            live: 0,
        }
    }

    /// Number of live (non-tombstoned) properties.
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    fn bucket_of(&self, name: StringRef) -> usize {
        name.get().hash_value() as usize % self.buckets.len()
    }

    fn find_index(&self, name: StringRef) -> Option<u32> {
        if self.buckets.is_empty() {
            return None;
        }
        let mut cursor = self.buckets[self.bucket_of(name)];
        while let Some(index) = cursor {
            let entry = &self.slab[index as usize];
            if entry.name.equals(name) {
                return Some(index);
            }
            cursor = entry.next;
        }
        None
    }

    /// Look a name up without allocating.
    pub fn find(&self, name: StringRef) -> Option<&PropertyDescriptor> {
        self.find_index(name)
            .map(|i| &self.slab[i as usize].descriptor)
    }

    pub fn find_mut(&mut self, name: StringRef) -> Option<&mut PropertyDescriptor> {
        self.find_index(name)
            .map(|i| &mut self.slab[i as usize].descriptor)
    }

    #[inline]
    pub fn contains(&self, name: StringRef) -> bool {
        self.find_index(name).is_some()
    }

    /// Return the descriptor for `name`, creating a generic one at the next
    /// insertion index if the name is absent. Idempotent for existing names.
    pub fn insert(&mut self, name: StringRef) -> &mut PropertyDescriptor {
        if let Some(index) = self.find_index(name) {
            return &mut self.slab[index as usize].descriptor;
        }

        let order_index = self.order.len() as u32;
        let index = match self.free {
            Some(index) => {
                self.free = self.slab[index as usize].next;
                let entry = &mut self.slab[index as usize];
                entry.name = name;
                entry.descriptor = PropertyDescriptor::generic();
                entry.order_index = order_index;
                entry.next = None;
                index
            }
            None => {
                let index = self.slab.len() as u32;
                self.slab.push(Entry {
                    name,
                    descriptor: PropertyDescriptor::generic(),
                    order_index,
                    next: None,
                });
                index
            }
        };
        self.order.push(Some(index));
        self.live += 1;

        // Load factor 2/3 over insertion indexes, as in the bucket rule
        // `3 * count >= 2 * buckets`; the first insertion allocates.
        if self.buckets.is_empty() || 3 * order_index as usize >= 2 * self.buckets.len() {
            self.rehash();
        } else {
            let bucket = self.bucket_of(name);
            self.slab[index as usize].next = self.buckets[bucket];
            self.buckets[bucket] = Some(index);
        }

        &mut self.slab[index as usize].descriptor
    }

    /// Remove a name, tombstoning its insertion slot.
    ///
    /// Always returns true, mirroring the semantics of JavaScript `delete`
    /// on an absent property.
    pub fn remove(&mut self, name: StringRef) -> bool {
        let Some(index) = self.find_index(name) else {
            return true;
        };

        let bucket = self.bucket_of(name);
        let mut cursor = self.buckets[bucket];
        if cursor == Some(index) {
            self.buckets[bucket] = self.slab[index as usize].next;
        } else {
            while let Some(current) = cursor {
                if self.slab[current as usize].next == Some(index) {
                    self.slab[current as usize].next = self.slab[index as usize].next;
                    break;
                }
                cursor = self.slab[current as usize].next;
            }
        }

        let order_index = self.slab[index as usize].order_index;
        self.order[order_index as usize] = None;
        self.slab[index as usize].next = self.free;
        self.free = Some(index);
        self.live -= 1;
        true
    }

    fn rehash(&mut self) {
        let count = if self.buckets.is_empty() {
            INITIAL_BUCKETS
        } else {
            self.buckets.len() * 2
        };
        self.buckets.clear();
        self.buckets.resize(count, None);
        for slot in &self.order {
            let Some(index) = *slot else { continue };
            let name = self.slab[index as usize].name;
            let bucket = name.get().hash_value() as usize % count;
            self.slab[index as usize].next = self.buckets[bucket];
            self.buckets[bucket] = Some(index);
        }
    }

    /// Iterate in insertion order, skipping tombstones.
    pub fn iter(&self) -> TableIter<'_> {
        TableIter {
            table: self,
            cursor: 0,
        }
    }

    /// Number of insertion slots, including tombstones. Used by iteration
    /// cursors that must survive concurrent removals.
    #[inline]
    pub fn order_len(&self) -> usize {
        self.order.len()
    }

    /// The entry at an insertion slot, if it is still live.
    pub fn entry_at(&self, order_index: usize) -> Option<(StringRef, &PropertyDescriptor)> {
        let index = (*self.order.get(order_index)?)?;
        let entry = &self.slab[index as usize];
        Some((entry.name, &entry.descriptor))
    }

    #[cfg(test)]
    pub(crate) fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

/// Insertion-order iterator over a [`PropertyTable`].
#[derive(Debug)]
pub struct TableIter<'a> {
    table: &'a PropertyTable,
    cursor: usize,
}

impl<'a> Iterator for TableIter<'a> {
    type Item = (StringRef, &'a PropertyDescriptor);

    fn next(&mut self) -> Option<Self::Item> {
        while self.cursor < self.table.order.len() {
            let slot = self.cursor;
            self.cursor += 1;
            if let Some(entry) = self.table.entry_at(slot) {
                return Some(entry);
            }
        }
        None
    }
}
