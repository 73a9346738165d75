//! Property descriptors and the ordered property table.
//!
//! A descriptor is one of three kinds — generic, data (carries a value) or
//! accessor (carries an optional getter/setter pair) — plus the three
//! attribute bits `writable`, `enumerable` and `configurable`. Each
//! attribute is three-state (absent, present-but-unset, set) so partial
//! descriptors can be expressed, as `Object.defineProperty` requires.

use crate::object::ObjectRef;
use crate::value::Value;
use bitflags::bitflags;

mod table;
#[cfg(test)]
mod tests;

pub use table::{PropertyTable, TableIter};

bitflags! {
    /// Property attribute bits.
    ///
    /// Every attribute is a presence/value pair: no `HAS_*` bit means the
    /// attribute is absent from the descriptor, `HAS_*` alone means it is
    /// present and false, both bits mean it is present and true.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Attribute: u8 {
        const WRITABLE = 0b0000_0001;
        const HAS_WRITABLE = 0b0000_0010;
        const ENUMERABLE = 0b0000_0100;
        const HAS_ENUMERABLE = 0b0000_1000;
        const CONFIGURABLE = 0b0001_0000;
        const HAS_CONFIGURABLE = 0b0010_0000;
    }
}

/// One attribute's position in the three-state lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeState {
    /// The attribute does not appear in the descriptor.
    Undefined,
    /// Present and false.
    Unset,
    /// Present and true.
    Set,
}

impl Attribute {
    /// All three attributes present and set.
    pub fn all_set() -> Self {
        Self::HAS_WRITABLE
            | Self::WRITABLE
            | Self::HAS_ENUMERABLE
            | Self::ENUMERABLE
            | Self::HAS_CONFIGURABLE
            | Self::CONFIGURABLE
    }

    fn state(self, has: Self, value: Self) -> AttributeState {
        if !self.contains(has) {
            AttributeState::Undefined
        } else if self.contains(value) {
            AttributeState::Set
        } else {
            AttributeState::Unset
        }
    }

    #[inline]
    pub fn writable(self) -> AttributeState {
        self.state(Self::HAS_WRITABLE, Self::WRITABLE)
    }

    #[inline]
    pub fn enumerable(self) -> AttributeState {
        self.state(Self::HAS_ENUMERABLE, Self::ENUMERABLE)
    }

    #[inline]
    pub fn configurable(self) -> AttributeState {
        self.state(Self::HAS_CONFIGURABLE, Self::CONFIGURABLE)
    }
}

/// The payload of a property descriptor.
#[derive(Debug, Clone, Copy)]
pub enum DescriptorKind {
    /// Neither a value nor an accessor pair (a partial descriptor).
    Generic,
    /// A plain stored value.
    Data(Value),
    /// A getter/setter pair; either side may be missing.
    Accessor {
        get: Option<ObjectRef>,
        set: Option<ObjectRef>,
    },
}

/// The metadata record for a single property.
#[derive(Debug, Clone, Copy)]
pub struct PropertyDescriptor {
    pub kind: DescriptorKind,
    pub attributes: Attribute,
}

impl PropertyDescriptor {
    /// A fully populated data descriptor (writable, enumerable,
    /// configurable — the shape ordinary assignment creates).
    pub fn from_value(value: Value) -> Self {
        Self {
            kind: DescriptorKind::Data(value),
            attributes: Attribute::all_set(),
        }
    }

    /// A data descriptor with explicit attributes.
    pub fn with_attributes(value: Value, attributes: Attribute) -> Self {
        Self {
            kind: DescriptorKind::Data(value),
            attributes,
        }
    }

    /// An accessor descriptor; enumerable and configurable, no writability.
    pub fn from_accessor(get: Option<ObjectRef>, set: Option<ObjectRef>) -> Self {
        Self {
            kind: DescriptorKind::Accessor { get, set },
            attributes: Attribute::HAS_ENUMERABLE
                | Attribute::ENUMERABLE
                | Attribute::HAS_CONFIGURABLE
                | Attribute::CONFIGURABLE,
        }
    }

    /// An empty generic descriptor.
    pub fn generic() -> Self {
        Self {
            kind: DescriptorKind::Generic,
            attributes: Attribute::empty(),
        }
    }

    #[inline]
    pub fn is_data(&self) -> bool {
        matches!(self.kind, DescriptorKind::Data(_))
    }

    #[inline]
    pub fn is_accessor(&self) -> bool {
        matches!(self.kind, DescriptorKind::Accessor { .. })
    }

    #[inline]
    pub fn is_generic(&self) -> bool {
        matches!(self.kind, DescriptorKind::Generic)
    }

    /// The stored value of a data descriptor, if any.
    #[inline]
    pub fn value(&self) -> Option<Value> {
        match self.kind {
            DescriptorKind::Data(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn getter(&self) -> Option<ObjectRef> {
        match self.kind {
            DescriptorKind::Accessor { get, .. } => get,
            _ => None,
        }
    }

    #[inline]
    pub fn setter(&self) -> Option<ObjectRef> {
        match self.kind {
            DescriptorKind::Accessor { set, .. } => set,
            _ => None,
        }
    }

    #[inline]
    pub fn is_writable(&self) -> bool {
        self.attributes.writable() == AttributeState::Set
    }

    #[inline]
    pub fn is_enumerable(&self) -> bool {
        self.attributes.enumerable() == AttributeState::Set
    }

    #[inline]
    pub fn is_configurable(&self) -> bool {
        self.attributes.configurable() == AttributeState::Set
    }
}
