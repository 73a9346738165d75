//! Dense array storage.
//!
//! The indexed elements of an array object live outside the property table
//! in a double-ended sequence; `length` is always derived from the storage
//! size. Holes created by writing past the end are filled with `undefined`.

use crate::value::Value;
use std::collections::VecDeque;

/// The backing store of an array object.
#[derive(Debug, Default, Clone)]
pub struct Array {
    values: VecDeque<Value>,
}

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> u32 {
        self.values.len() as u32
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Element read; out-of-range indices read as `undefined`.
    #[inline]
    pub fn at(&self, index: u32) -> Value {
        self.values
            .get(index as usize)
            .copied()
            .unwrap_or_else(Value::undefined)
    }

    /// Element write. Writing at `len` appends; writing past it extends the
    /// storage with `undefined` holes first.
    pub fn assign(&mut self, index: u32, value: Value) {
        let index = index as usize;
        if index == self.values.len() {
            self.values.push_back(value);
        } else {
            if index > self.values.len() {
                self.resize(index as u32 + 1);
            }
            self.values[index] = value;
        }
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn resize(&mut self, len: u32) {
        self.values.resize(len as usize, Value::undefined());
    }

    pub fn push(&mut self, value: Value) {
        self.values.push_back(value);
    }

    pub fn pop(&mut self) -> Value {
        self.values.pop_back().unwrap_or_else(Value::undefined)
    }

    pub fn take_first(&mut self) -> Value {
        self.values.pop_front().unwrap_or_else(Value::undefined)
    }

    /// Append every element of `other`.
    ///
    /// Standard ECMAScript concat: holes and `undefined` elements are
    /// copied like any other value.
    pub fn concat(&mut self, other: &Array) {
        self.values.extend(other.values.iter().copied());
    }

    /// Sort with a caller-provided less-than predicate.
    ///
    /// The predicate sees the comparator semantics of `Array.prototype.sort`
    /// (absent comparator: lexicographic ToString ordering), which the
    /// runtime layer supplies.
    pub fn sort_by(&mut self, mut less_than: impl FnMut(&Value, &Value) -> bool) {
        self.values
            .make_contiguous()
            .sort_by(|a, b| match (less_than(a, b), less_than(b, a)) {
                (true, _) => std::cmp::Ordering::Less,
                (_, true) => std::cmp::Ordering::Greater,
                _ => std::cmp::Ordering::Equal,
            });
    }

    /// `Array.prototype.splice` storage semantics.
    ///
    /// Negative `start` counts from the end; both `start` and
    /// `delete_count` clamp to the valid range. Removed elements are
    /// written into `removed` in order.
    pub fn splice(&mut self, start: f64, delete_count: f64, items: &[Value], removed: &mut Array) {
        let len = self.values.len() as f64;
        let start = if start < 0.0 {
            (len + start).max(0.0)
        } else {
            start.min(len)
        };
        let delete_count = delete_count.clamp(0.0, len - start);

        let start = start as usize;
        let delete_count = delete_count as usize;

        removed.clear();
        for i in 0..delete_count {
            removed.push(self.values[start + i]);
        }

        // VecDeque has no native splice; rebuild through a vector.
        let mut rebuilt: Vec<Value> = self.values.iter().copied().collect();
        rebuilt.splice(start..start + delete_count, items.iter().copied());
        self.values = rebuilt.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i32]) -> Array {
        Array::from_values(values.iter().map(|&i| Value::from_int32(i)))
    }

    fn as_ints(array: &Array) -> Vec<Option<i32>> {
        (0..array.len()).map(|i| array.at(i).as_int32()).collect()
    }

    #[test]
    fn assign_appends_and_fills_holes() {
        let mut a = Array::new();
        a.assign(0, Value::from_int32(1));
        assert_eq!(a.len(), 1);
        a.assign(1, Value::from_int32(2));
        assert_eq!(a.len(), 2);
        a.assign(4, Value::from_int32(5));
        assert_eq!(a.len(), 5);
        assert!(a.at(2).is_undefined());
        assert!(a.at(3).is_undefined());
        assert_eq!(a.at(4).as_int32(), Some(5));
        assert!(a.at(99).is_undefined());
    }

    #[test]
    fn concat_keeps_undefined_elements() {
        let mut a = ints(&[1, 2]);
        let b = Array::from_values([Value::undefined(), Value::from_int32(3)]);
        a.concat(&b);
        assert_eq!(a.len(), 4);
        assert!(a.at(2).is_undefined());
        assert_eq!(a.at(3).as_int32(), Some(3));
    }

    #[test]
    fn splice_negative_start_counts_from_end() {
        let mut a = ints(&[1, 2, 3, 4]);
        let mut removed = Array::new();
        a.splice(-1.0, 1.0, &[], &mut removed);
        assert_eq!(as_ints(&a), [Some(1), Some(2), Some(3)]);
        assert_eq!(as_ints(&removed), [Some(4)]);
    }

    #[test]
    fn splice_start_past_length_inserts_at_end() {
        let mut a = ints(&[1]);
        let mut removed = Array::new();
        a.splice(10.0, 5.0, &[Value::from_int32(2)], &mut removed);
        assert_eq!(as_ints(&a), [Some(1), Some(2)]);
        assert_eq!(removed.len(), 0);
    }

    #[test]
    fn splice_clamps_delete_count() {
        let mut a = ints(&[1, 2, 3]);
        let mut removed = Array::new();
        a.splice(1.0, 99.0, &[Value::from_int32(9)], &mut removed);
        assert_eq!(as_ints(&a), [Some(1), Some(9)]);
        assert_eq!(as_ints(&removed), [Some(2), Some(3)]);
    }

    #[test]
    fn push_pop_take_first() {
        let mut a = ints(&[1, 2, 3]);
        assert_eq!(a.pop().as_int32(), Some(3));
        assert_eq!(a.take_first().as_int32(), Some(1));
        a.push(Value::from_int32(7));
        assert_eq!(as_ints(&a), [Some(2), Some(7)]);
        let mut empty = Array::new();
        assert!(empty.pop().is_undefined());
        assert!(empty.take_first().is_undefined());
    }

    #[test]
    fn sort_with_less_than_predicate() {
        let mut a = ints(&[3, 1, 2]);
        a.sort_by(|x, y| x.as_int32() < y.as_int32());
        assert_eq!(as_ints(&a), [Some(1), Some(2), Some(3)]);
    }
}
