//! Engine strings.
//!
//! A [`JsString`] is immutable UTF-16 text with a lazily computed, cached
//! hash. Strings are owned by the [`ExecutionEngine`](crate::ExecutionEngine)
//! in a slab of boxed allocations, so a [`StringRef`] stays valid (and
//! pointer-stable) for the engine's whole lifetime — which is what lets the
//! instruction selector embed interned identifier pointers directly into
//! machine code as immediates.

use rustc_hash::FxHasher;
use std::cell::Cell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ptr::NonNull;

/// Immutable UTF-16 string with a cached hash.
#[derive(Debug)]
pub struct JsString {
    units: Box<[u16]>,
    /// Zero means "not computed yet"; a computed hash of zero is remapped.
    hash: Cell<u32>,
}

impl JsString {
    pub fn new(text: &str) -> Self {
        Self {
            units: text.encode_utf16().collect(),
            hash: Cell::new(0),
        }
    }

    pub fn from_units(units: Box<[u16]>) -> Self {
        Self {
            units,
            hash: Cell::new(0),
        }
    }

    #[inline]
    pub fn units(&self) -> &[u16] {
        &self.units
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// The cached hash, computed on first use. Never zero.
    pub fn hash_value(&self) -> u32 {
        let cached = self.hash.get();
        if cached != 0 {
            return cached;
        }
        let mut hasher = FxHasher::default();
        self.units.hash(&mut hasher);
        let mut h = hasher.finish() as u32;
        if h == 0 {
            h = 0x8000_0001;
        }
        self.hash.set(h);
        h
    }

    /// Equality ladder: pointer, then hash, then text.
    pub fn equals(&self, other: &JsString) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        self.hash_value() == other.hash_value() && self.units == other.units
    }

    /// Lossy conversion for display and host interop.
    pub fn to_rust_string(&self) -> String {
        String::from_utf16_lossy(&self.units)
    }

    /// Parse as an array index (a canonical base-10 `u32`).
    pub fn as_array_index(&self) -> Option<u32> {
        if self.units.is_empty() || self.units.len() > 10 {
            return None;
        }
        if self.units[0] == b'0' as u16 && self.units.len() > 1 {
            return None;
        }
        let mut n: u64 = 0;
        for &unit in self.units.iter() {
            if !(b'0' as u16..=b'9' as u16).contains(&unit) {
                return None;
            }
            n = n * 10 + u64::from(unit - b'0' as u16);
        }
        u32::try_from(n).ok()
    }
}

impl fmt::Display for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rust_string())
    }
}

/// A non-owning handle to an engine-owned [`JsString`].
///
/// The engine keeps every string alive until it is dropped, so handles are
/// freely copyable. A handle must not outlive its engine.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StringRef(NonNull<JsString>);

impl StringRef {
    #[inline]
    pub fn from_non_null(ptr: NonNull<JsString>) -> Self {
        Self(ptr)
    }

    #[inline]
    pub fn as_ptr(self) -> *mut JsString {
        self.0.as_ptr()
    }

    /// Shared access to the string.
    ///
    /// Strings are immutable after construction (the hash cell is interior),
    /// so shared references never conflict with mutation.
    #[inline]
    pub fn get<'a>(self) -> &'a JsString {
        unsafe { self.0.as_ref() }
    }

    /// Content equality (pointer fast path first).
    #[inline]
    pub fn equals(self, other: StringRef) -> bool {
        self == other || self.get().equals(other.get())
    }
}

impl fmt::Debug for StringRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.get().to_rust_string())
    }
}

impl fmt::Display for StringRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.get().fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_cached_and_nonzero() {
        let s = JsString::new("hello");
        let h = s.hash_value();
        assert_ne!(h, 0);
        assert_eq!(s.hash_value(), h);
        assert_ne!(JsString::new("").hash_value(), 0);
    }

    #[test]
    fn equality_ladder() {
        let a = JsString::new("hello");
        let b = JsString::new("hello");
        let c = JsString::new("world");
        assert!(a.equals(&a));
        assert!(a.equals(&b));
        assert!(!a.equals(&c));
    }

    #[test]
    fn utf16_round_trip() {
        let s = JsString::new("héllo ☃");
        assert_eq!(s.to_rust_string(), "héllo ☃");
        assert_eq!(s.len(), 7);
    }

    #[test]
    fn array_index_parsing() {
        assert_eq!(JsString::new("0").as_array_index(), Some(0));
        assert_eq!(JsString::new("42").as_array_index(), Some(42));
        assert_eq!(JsString::new("007").as_array_index(), None);
        assert_eq!(JsString::new("-1").as_array_index(), None);
        assert_eq!(JsString::new("4.5").as_array_index(), None);
        assert_eq!(JsString::new("").as_array_index(), None);
        assert_eq!(JsString::new("4294967295").as_array_index(), Some(u32::MAX));
        assert_eq!(JsString::new("99999999999").as_array_index(), None);
    }
}
