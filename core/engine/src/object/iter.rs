//! The `for (name in object)` iterator.

use super::ObjectRef;
use crate::string::StringRef;
use rustc_hash::FxHashSet;

/// Cursor state of a `for-in` enumeration.
///
/// Walks the prototype chain child-first, scanning each object's property
/// table in insertion order. Every name encountered is recorded, so a name
/// shadowed by a descendant — enumerable or not — is never yielded again
/// from an ancestor.
#[derive(Debug)]
pub struct ForEachIteratorData {
    /// The object enumeration started on.
    pub object: Option<ObjectRef>,
    /// The current link of the prototype chain.
    current: Option<ObjectRef>,
    /// Insertion-slot cursor into the current object's table.
    table_index: usize,
    seen: FxHashSet<StringRef>,
}

impl ForEachIteratorData {
    pub fn new(object: Option<ObjectRef>) -> Self {
        Self {
            object,
            current: object,
            table_index: 0,
            seen: FxHashSet::default(),
        }
    }

    /// The next enumerable, unshadowed property name, or `None` when the
    /// chain is exhausted.
    pub fn next_property_name(&mut self) -> Option<StringRef> {
        while let Some(current) = self.current {
            let object = unsafe { &*current.as_ptr() };
            if let Some(members) = object.members() {
                while self.table_index < members.order_len() {
                    let slot = self.table_index;
                    self.table_index += 1;
                    let Some((name, descriptor)) = members.entry_at(slot) else {
                        continue;
                    };
                    // Recording non-enumerable names too makes them shadow
                    // enumerable ancestors, per the enumeration contract.
                    let fresh = self.seen.insert(name);
                    if fresh && descriptor.is_enumerable() {
                        return Some(name);
                    }
                }
            }
            self.current = object.prototype;
            self.table_index = 0;
        }
        None
    }
}
