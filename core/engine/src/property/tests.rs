use super::*;
use crate::string::{JsString, StringRef};
use crate::value::Value;
use std::ptr::NonNull;

fn leaked(text: &str) -> StringRef {
    StringRef::from_non_null(NonNull::from(Box::leak(Box::new(JsString::new(text)))))
}

fn names(table: &PropertyTable) -> Vec<String> {
    table.iter().map(|(n, _)| n.get().to_rust_string()).collect()
}

#[test]
fn attribute_three_state_lattice() {
    let attrs = Attribute::all_set();
    assert_eq!(attrs.writable(), AttributeState::Set);
    assert_eq!(attrs.enumerable(), AttributeState::Set);
    assert_eq!(attrs.configurable(), AttributeState::Set);

    let partial = Attribute::HAS_WRITABLE | Attribute::HAS_ENUMERABLE | Attribute::ENUMERABLE;
    assert_eq!(partial.writable(), AttributeState::Unset);
    assert_eq!(partial.enumerable(), AttributeState::Set);
    assert_eq!(partial.configurable(), AttributeState::Undefined);
}

#[test]
fn descriptor_kinds() {
    let data = PropertyDescriptor::from_value(Value::from_int32(1));
    assert!(data.is_data() && !data.is_accessor());
    assert!(data.is_writable() && data.is_enumerable() && data.is_configurable());
    assert_eq!(data.value().unwrap().as_int32(), Some(1));

    let accessor = PropertyDescriptor::from_accessor(None, None);
    assert!(accessor.is_accessor());
    assert!(!accessor.is_writable());
    assert!(accessor.value().is_none());

    assert!(PropertyDescriptor::generic().is_generic());
}

#[test]
fn insert_preserves_order() {
    let mut table = PropertyTable::new();
    for name in ["c", "a", "b"] {
        *table.insert(leaked(name)) = PropertyDescriptor::from_value(Value::from_int32(0));
    }
    assert_eq!(names(&table), ["c", "a", "b"]);
    assert_eq!(table.len(), 3);
}

#[test]
fn insert_is_idempotent() {
    let mut table = PropertyTable::new();
    let name = leaked("x");
    *table.insert(name) = PropertyDescriptor::from_value(Value::from_int32(1));
    let existing = table.insert(name);
    assert_eq!(existing.value().unwrap().as_int32(), Some(1));
    assert_eq!(table.len(), 1);
}

#[test]
fn remove_tombstones_and_reinsert_moves_to_end() {
    let mut table = PropertyTable::new();
    let a = leaked("a");
    let b = leaked("b");
    *table.insert(a) = PropertyDescriptor::from_value(Value::from_int32(1));
    *table.insert(b) = PropertyDescriptor::from_value(Value::from_int32(2));

    assert!(table.remove(a));
    assert_eq!(names(&table), ["b"]);
    assert!(table.find(a).is_none());

    *table.insert(a) = PropertyDescriptor::from_value(Value::from_int32(3));
    assert_eq!(names(&table), ["b", "a"]);
    assert_eq!(table.find(a).unwrap().value().unwrap().as_int32(), Some(3));
}

#[test]
fn remove_missing_reports_true() {
    let mut table = PropertyTable::new();
    assert!(table.remove(leaked("ghost")));
}

#[test]
fn bucket_count_starts_at_eleven_and_doubles() {
    let mut table = PropertyTable::new();
    assert_eq!(table.bucket_count(), 0);

    let names: Vec<StringRef> = (0..9).map(|i| leaked(&format!("p{i}"))).collect();
    for (i, &name) in names.iter().enumerate() {
        *table.insert(name) = PropertyDescriptor::from_value(Value::from_int32(i as i32));
        if i < 8 {
            assert_eq!(table.bucket_count(), 11);
        }
    }
    assert_eq!(table.bucket_count(), 22);

    // No lookups fail across the rehash boundary.
    for (i, &name) in names.iter().enumerate() {
        assert_eq!(
            table.find(name).unwrap().value().unwrap().as_int32(),
            Some(i as i32)
        );
    }
}

#[test]
fn lookup_falls_back_to_text_comparison() {
    let mut table = PropertyTable::new();
    let original = leaked("shared");
    *table.insert(original) = PropertyDescriptor::from_value(Value::from_int32(9));

    // A different allocation with the same text must still be found.
    let alias = leaked("shared");
    assert_ne!(original.as_ptr(), alias.as_ptr());
    assert_eq!(table.find(alias).unwrap().value().unwrap().as_int32(), Some(9));
}

#[test]
fn iteration_survives_heavy_churn() {
    let mut table = PropertyTable::new();
    let keys: Vec<StringRef> = (0..32).map(|i| leaked(&format!("k{i}"))).collect();
    for &name in &keys {
        *table.insert(name) = PropertyDescriptor::from_value(Value::undefined());
    }
    for &name in keys.iter().step_by(2) {
        table.remove(name);
    }
    let survivors: Vec<String> = (0..32)
        .filter(|i| i % 2 == 1)
        .map(|i| format!("k{i}"))
        .collect();
    assert_eq!(names(&table), survivors);
    assert_eq!(table.len(), 16);
}
