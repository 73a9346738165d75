use super::*;
use crate::context::Context;
use crate::engine::ExecutionEngine;
use crate::property::{Attribute, PropertyDescriptor};
use crate::value::Value;

fn with_engine(f: impl FnOnce(&mut ExecutionEngine, &mut Context)) {
    let mut engine = ExecutionEngine::new();
    let root = unsafe { &mut *engine.root_context() };
    f(&mut engine, root);
}

#[test]
fn set_then_get_round_trips() {
    with_engine(|engine, ctx| {
        let object = engine.new_object();
        let key = engine.identifier("answer");
        object.set_property(ctx, key, Value::from_int32(42)).unwrap();
        assert_eq!(object.get_property(ctx, key).unwrap().as_int32(), Some(42));
    });
}

#[test]
fn prototype_chain_lookup_and_shadowing() {
    with_engine(|engine, ctx| {
        let proto = engine.new_object();
        let child = engine.new_object_with_prototype(Some(proto));
        let key = engine.identifier("x");

        proto.set_property(ctx, key, Value::from_int32(10)).unwrap();
        assert_eq!(child.get_property(ctx, key).unwrap().as_int32(), Some(10));
        assert!(child.has_property(ctx, key));
        assert!(child.get_own_property(ctx, key).is_none());

        child.set_property(ctx, key, Value::from_int32(20)).unwrap();
        assert_eq!(child.get_property(ctx, key).unwrap().as_int32(), Some(20));
        assert_eq!(proto.get_property(ctx, key).unwrap().as_int32(), Some(10));
    });
}

#[test]
fn has_property_matches_descriptor_lookup() {
    with_engine(|engine, ctx| {
        let proto = engine.new_object();
        let child = engine.new_object_with_prototype(Some(proto));
        let own = engine.identifier("own");
        let inherited = engine.identifier("inherited");
        let missing = engine.identifier("missing");

        child.set_property(ctx, own, Value::from_int32(1)).unwrap();
        proto
            .set_property(ctx, inherited, Value::from_int32(2))
            .unwrap();

        for key in [own, inherited, missing] {
            assert_eq!(
                child.has_property(ctx, key),
                child.get_property_descriptor(ctx, key).is_some()
            );
        }
    });
}

#[test]
fn non_writable_properties_ignore_assignment() {
    with_engine(|engine, ctx| {
        let object = engine.new_object();
        let key = engine.identifier("constant");
        object.get_mut().insert_property(
            key,
            PropertyDescriptor::with_attributes(
                Value::from_int32(1),
                Attribute::HAS_WRITABLE | Attribute::HAS_ENUMERABLE | Attribute::HAS_CONFIGURABLE,
            ),
        );
        object.set_property(ctx, key, Value::from_int32(2)).unwrap();
        assert_eq!(object.get_property(ctx, key).unwrap().as_int32(), Some(1));
    });
}

#[test]
fn inherited_non_writable_blocks_shadowing() {
    with_engine(|engine, ctx| {
        let proto = engine.new_object();
        let child = engine.new_object_with_prototype(Some(proto));
        let key = engine.identifier("frozen");
        proto.get_mut().insert_property(
            key,
            PropertyDescriptor::with_attributes(Value::from_int32(1), Attribute::empty()),
        );
        child.set_property(ctx, key, Value::from_int32(9)).unwrap();
        assert!(child.get_own_property(ctx, key).is_none());
        assert_eq!(child.get_property(ctx, key).unwrap().as_int32(), Some(1));
        assert!(!child.can_set_property(ctx, key));
    });
}

#[test]
fn non_extensible_objects_reject_new_properties() {
    with_engine(|engine, ctx| {
        let object = engine.new_object();
        let existing = engine.identifier("existing");
        let fresh = engine.identifier("fresh");
        object
            .set_property(ctx, existing, Value::from_int32(1))
            .unwrap();
        object.get_mut().extensible = false;

        object.set_property(ctx, fresh, Value::from_int32(2)).unwrap();
        assert!(!object.has_property(ctx, fresh));

        object
            .set_property(ctx, existing, Value::from_int32(3))
            .unwrap();
        assert_eq!(
            object.get_property(ctx, existing).unwrap().as_int32(),
            Some(3)
        );
    });
}

#[test]
fn delete_respects_configurability() {
    with_engine(|engine, ctx| {
        let object = engine.new_object();
        let stuck = engine.identifier("stuck");
        let loose = engine.identifier("loose");
        object.get_mut().insert_property(
            stuck,
            PropertyDescriptor::with_attributes(
                Value::from_int32(1),
                Attribute::HAS_WRITABLE | Attribute::WRITABLE | Attribute::HAS_CONFIGURABLE,
            ),
        );
        object.set_property(ctx, loose, Value::from_int32(2)).unwrap();

        assert!(!object.delete_property(ctx, stuck));
        assert!(object.has_property(ctx, stuck));
        assert!(object.delete_property(ctx, loose));
        assert!(!object.has_property(ctx, loose));
        let ghost = engine.identifier("ghost");
        assert!(object.delete_property(ctx, ghost));
    });
}

#[test]
fn accessor_properties_invoke_their_getter_and_setter() {
    fn getter(ctx: &mut Context) {
        ctx.result = Value::from_int32(99);
    }
    fn setter(ctx: &mut Context) {
        let value = ctx.argument(0);
        let this = ctx.this_object.as_object().expect("this is an object");
        let key = ctx.engine().identifier("backing");
        this.get_mut()
            .insert_property(key, PropertyDescriptor::from_value(value));
        ctx.result = Value::undefined();
    }

    with_engine(|engine, ctx| {
        let object = engine.new_object();
        let key = engine.identifier("computed");
        let get = engine.new_native_function("get", getter);
        let set = engine.new_native_function("set", setter);
        assert!(object.define_own_property(
            ctx,
            key,
            PropertyDescriptor::from_accessor(Some(get), Some(set)),
        ));

        assert_eq!(object.get_property(ctx, key).unwrap().as_int32(), Some(99));
        object.set_property(ctx, key, Value::from_int32(5)).unwrap();
        let backing = engine.identifier("backing");
        assert_eq!(
            object.get_property(ctx, backing).unwrap().as_int32(),
            Some(5)
        );
    });
}

#[test]
fn array_length_tracks_storage() {
    with_engine(|engine, ctx| {
        let object = engine.new_array_object(Array::new());
        let length = engine.names.length;
        assert_eq!(object.get_property(ctx, length).unwrap().as_int32(), Some(0));

        let index = engine.identifier("4");
        object.set_property(ctx, index, Value::from_int32(9)).unwrap();
        assert_eq!(object.get_property(ctx, length).unwrap().as_int32(), Some(5));
        assert_eq!(object.get().as_array().unwrap().len(), 5);

        object.set_property(ctx, length, Value::from_int32(2)).unwrap();
        assert_eq!(object.get().as_array().unwrap().len(), 2);
    });
}

#[test]
fn regexp_properties_are_synthetic() {
    with_engine(|engine, ctx| {
        let object = engine.new_regexp_object("a+b", RegExpFlags::GLOBAL | RegExpFlags::MULTILINE);
        let source = engine.names.source;
        let global = engine.names.global;
        let ignore_case = engine.names.ignore_case;
        let multiline = engine.names.multiline;
        let last_index = engine.names.last_index;

        let pattern = object.get_property(ctx, source).unwrap();
        assert_eq!(pattern.as_string().unwrap().get().to_rust_string(), "a+b");
        assert_eq!(object.get_property(ctx, global).unwrap().as_boolean(), Some(true));
        assert_eq!(
            object.get_property(ctx, ignore_case).unwrap().as_boolean(),
            Some(false)
        );
        assert_eq!(
            object.get_property(ctx, multiline).unwrap().as_boolean(),
            Some(true)
        );
        assert_eq!(object.get_property(ctx, last_index).unwrap().as_int32(), Some(0));

        object
            .set_property(ctx, last_index, Value::from_int32(3))
            .unwrap();
        assert_eq!(object.get_property(ctx, last_index).unwrap().as_int32(), Some(3));
    });
}

#[test]
fn foreach_iterator_visits_chain_child_first_without_repeats() {
    with_engine(|engine, ctx| {
        let proto = engine.new_object_with_prototype(None);
        let child = engine.new_object_with_prototype(Some(proto));
        let (a, b, c, hidden) = (
            engine.identifier("a"),
            engine.identifier("b"),
            engine.identifier("c"),
            engine.identifier("hidden"),
        );

        proto.set_property(ctx, b, Value::from_int32(1)).unwrap();
        proto.set_property(ctx, c, Value::from_int32(2)).unwrap();
        proto.set_property(ctx, hidden, Value::from_int32(3)).unwrap();
        child.set_property(ctx, a, Value::from_int32(4)).unwrap();
        // Shadows the prototype's `b`.
        child.set_property(ctx, b, Value::from_int32(5)).unwrap();
        // A non-enumerable own property shadows the prototype's entry
        // entirely.
        child.get_mut().insert_property(
            hidden,
            PropertyDescriptor::with_attributes(
                Value::from_int32(6),
                Attribute::HAS_WRITABLE | Attribute::WRITABLE | Attribute::HAS_ENUMERABLE,
            ),
        );

        let mut iterator = ForEachIteratorData::new(Some(child));
        let mut seen = Vec::new();
        while let Some(name) = iterator.next_property_name() {
            seen.push(name.get().to_rust_string());
        }
        assert_eq!(seen, ["a", "b", "c"]);
    });
}

#[test]
fn identifiers_are_pointer_stable() {
    let mut engine = ExecutionEngine::new();
    let first = engine.identifier("repeated");
    let second = engine.identifier("repeated");
    assert_eq!(first.as_ptr(), second.as_ptr());
    let other = engine.identifier("different");
    assert_ne!(first.as_ptr(), other.as_ptr());
}

#[test]
fn instanceof_walks_the_prototype_chain() {
    with_engine(|engine, ctx| {
        fn noop(ctx: &mut Context) {
            ctx.result = Value::undefined();
        }
        let constructor = engine.new_native_function("C", noop);
        let proto = engine.new_object();
        let prototype_name = engine.names.prototype;
        constructor
            .set_property(ctx, prototype_name, Value::from_object(proto))
            .unwrap();

        let instance = engine.new_object_with_prototype(Some(proto));
        let grandchild = engine.new_object_with_prototype(Some(instance));
        let unrelated = engine.new_object();

        assert!(constructor
            .has_instance(ctx, Value::from_object(instance))
            .unwrap());
        assert!(constructor
            .has_instance(ctx, Value::from_object(grandchild))
            .unwrap());
        assert!(!constructor
            .has_instance(ctx, Value::from_object(unrelated))
            .unwrap());
        assert!(!constructor
            .has_instance(ctx, Value::from_int32(3))
            .unwrap());
    });
}

#[test]
fn non_enumerable_shadow_suppresses_inherited_name() {
    with_engine(|engine, ctx| {
        let proto = engine.new_object_with_prototype(None);
        let child = engine.new_object_with_prototype(Some(proto));
        let key = engine.identifier("k");
        proto.set_property(ctx, key, Value::from_int32(1)).unwrap();
        child.get_mut().insert_property(
            key,
            PropertyDescriptor::with_attributes(Value::from_int32(2), Attribute::empty()),
        );
        let mut iterator = ForEachIteratorData::new(Some(child));
        assert!(iterator.next_property_name().is_none());
    });
}
