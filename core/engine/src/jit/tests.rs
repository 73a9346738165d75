//! End-to-end tests: build IR by hand, compile it to machine code, run it.

use crate::engine::ExecutionEngine;
use crate::ir::{self, binop, builtin_call, call, member, name, new_expr, number, string, subscript};
use crate::ir::{AluOp, Builtin, Const, Expr, FunctionBuilder, Module, UnOp};
use crate::value::Value;

/// Compile and run one function. The engine is returned alongside the
/// outcome because string and object results point into engine-owned
/// storage.
fn run_one(
    module: Module,
    id: ir::FnId,
    args: &[Value],
) -> (Box<ExecutionEngine>, Result<Value, Value>) {
    let mut engine = ExecutionEngine::new();
    let compiled = engine.compile_module(module).expect("compiles");
    let outcome = engine.run(compiled, id, Value::undefined(), args);
    (engine, outcome)
}

#[test]
fn integer_add_fast_path() {
    // function f(a, b) { return a + b; }
    let mut module = Module::new();
    let mut f = FunctionBuilder::new("f").formals(&["a", "b"]).temps(1);
    let t = f.temp(0);
    f.move_(t.clone(), binop(AluOp::Add, f.arg(0), f.arg(1)));
    f.ret(t);
    let id = module.add_function(f.finish());

    let (_engine, result) = run_one(module, id, &[Value::from_int32(1), Value::from_int32(2)]);
    let result = result.unwrap();
    assert!(result.is_integer());
    assert_eq!(result.as_int32(), Some(3));
}

#[test]
fn integer_add_overflow_falls_back_to_doubles() {
    let mut module = Module::new();
    let mut f = FunctionBuilder::new("f").formals(&["a", "b"]).temps(1);
    let t = f.temp(0);
    f.move_(t.clone(), binop(AluOp::Add, f.arg(0), f.arg(1)));
    f.ret(t);
    let id = module.add_function(f.finish());

    let (_engine, result) = run_one(
        module,
        id,
        &[Value::from_int32(0x7fff_ffff), Value::from_int32(1)],
    );
    let result = result.unwrap();
    assert!(result.is_double());
    assert_eq!(result.as_double(), Some(2147483648.0));
}

#[test]
fn slow_path_handles_untagged_numbers() {
    let mut module = Module::new();
    let mut f = FunctionBuilder::new("f").formals(&["a", "b"]).temps(1);
    let t = f.temp(0);
    f.move_(t.clone(), binop(AluOp::Add, f.arg(0), f.arg(1)));
    f.ret(t);
    let id = module.add_function(f.finish());

    let (_engine, result) = run_one(
        module,
        id,
        &[Value::from_double(1.5), Value::from_double(2.25)],
    );
    let result = result.unwrap();
    assert_eq!(result.as_double(), Some(3.75));
}

#[test]
fn inline_operators_match_the_helpers() {
    // One function per operator over two formals; run each against the
    // same inputs through both paths (tagged integers hit the fast path,
    // plain doubles force the helper).
    let cases = [
        (AluOp::Add, 7, 5, 12),
        (AluOp::Sub, 7, 5, 2),
        (AluOp::Mul, 7, 5, 35),
        (AluOp::BitAnd, 6, 3, 2),
        (AluOp::BitOr, 6, 3, 7),
        (AluOp::BitXor, 6, 3, 5),
        (AluOp::Shl, 3, 2, 12),
        (AluOp::Shr, -8, 1, -4),
        (AluOp::Shl, 1, 33, 2),
    ];
    for (op, lhs, rhs, expected) in cases {
        let mut module = Module::new();
        let mut f = FunctionBuilder::new("f").formals(&["a", "b"]).temps(1);
        let t = f.temp(0);
        f.move_(t.clone(), binop(op, f.arg(0), f.arg(1)));
        f.ret(t);
        let id = module.add_function(f.finish());

        let mut engine = ExecutionEngine::new();
        let compiled = engine.compile_module(module).expect("compiles");

        let fast = engine
            .run(
                compiled,
                id,
                Value::undefined(),
                &[Value::from_int32(lhs), Value::from_int32(rhs)],
            )
            .unwrap();
        assert_eq!(fast.as_int32(), Some(expected), "{op:?} fast path");

        let slow = engine
            .run(
                compiled,
                id,
                Value::undefined(),
                &[
                    Value::from_double(f64::from(lhs)),
                    Value::from_double(f64::from(rhs)),
                ],
            )
            .unwrap();
        assert_eq!(
            slow.number_value(),
            Some(f64::from(expected)),
            "{op:?} helper path"
        );
    }
}

#[test]
fn while_loop_with_integer_comparison() {
    // function f(n) { var i = 0, total = 0; while (i < n) { i += 1;
    // total += i; } return total; }
    let mut module = Module::new();
    let mut f = FunctionBuilder::new("f")
        .formals(&["n"])
        .locals(&["i", "total"]);
    let (i, total) = (f.local(0), f.local(1));
    let head = f.new_block();
    let body = f.new_block();
    let exit = f.new_block();

    f.move_(i.clone(), number(0.0));
    f.move_(total.clone(), number(0.0));
    f.jump(head);

    f.switch_to(head);
    f.cjump(binop(AluOp::Lt, i.clone(), f.arg(0)), body, exit);

    f.switch_to(body);
    f.compound(i.clone(), AluOp::Add, number(1.0));
    f.compound(total.clone(), AluOp::Add, i.clone());
    f.jump(head);

    f.switch_to(exit);
    f.ret(total);
    let id = module.add_function(f.finish());

    let (_engine, result) = run_one(module, id, &[Value::from_int32(5)]);
    let result = result.unwrap();
    assert_eq!(result.as_int32(), Some(15));
}

#[test]
fn double_comparison_fast_path() {
    // function f(a) { if (a < 2.5) return 1; return 2; }
    let mut module = Module::new();
    let mut f = FunctionBuilder::new("f").formals(&["a"]).temps(1);
    let t = f.temp(0);
    let less = f.new_block();
    let other = f.new_block();
    f.cjump(binop(AluOp::Lt, f.arg(0), number(2.5)), less, other);
    f.switch_to(less);
    f.move_(t.clone(), number(1.0));
    f.ret(t.clone());
    f.switch_to(other);
    f.move_(t.clone(), number(2.0));
    f.ret(t);
    let id = module.add_function(f.finish());

    let mut engine = ExecutionEngine::new();
    let compiled = engine.compile_module(module).expect("compiles");
    for (input, expected) in [
        (Value::from_double(2.0), 1),
        (Value::from_double(3.5), 2),
        (Value::from_double(f64::NAN), 2),
        (Value::from_int32(1), 1),
        (Value::from_int32(9), 2),
    ] {
        let result = engine
            .run(compiled, id, Value::undefined(), &[input])
            .unwrap();
        assert_eq!(result.as_int32(), Some(expected), "input {input:?}");
    }
}

#[test]
fn enumeration_order_after_delete_and_reinsert() {
    // function g() { var o = {}; o.a = 1; o.b = 2; delete o.a; o.a = 3;
    // var r = ""; for (var k in o) r += k; return r; }
    let mut module = Module::new();
    let mut f = FunctionBuilder::new("g").locals(&["o", "r", "k"]).temps(2);
    let (o, r, k) = (f.local(0), f.local(1), f.local(2));
    let (iter, next) = (f.temp(0), f.temp(1));
    let head = f.new_block();
    let body = f.new_block();
    let exit = f.new_block();

    f.move_(o.clone(), new_expr(name("Object"), vec![]));
    f.move_(member(o.clone(), "a"), number(1.0));
    f.move_(member(o.clone(), "b"), number(2.0));
    f.exp(builtin_call(Builtin::Delete, vec![member(o.clone(), "a")]));
    f.move_(member(o.clone(), "a"), number(3.0));
    f.move_(r.clone(), string(""));
    f.move_(
        iter.clone(),
        builtin_call(Builtin::ForeachIteratorObject, vec![o.clone()]),
    );
    f.jump(head);

    f.switch_to(head);
    f.move_(
        next.clone(),
        builtin_call(Builtin::ForeachNextPropertyName, vec![iter.clone()]),
    );
    f.cjump(
        binop(AluOp::StrictEq, next.clone(), Expr::Const(Const::Null)),
        exit,
        body,
    );

    f.switch_to(body);
    f.move_(k.clone(), next.clone());
    f.compound(r.clone(), AluOp::Add, k);
    f.jump(head);

    f.switch_to(exit);
    f.ret(r);
    let id = module.add_function(f.finish());

    let (_engine, result) = run_one(module, id, &[]);
    let result = result.unwrap();
    assert_eq!(result.as_string().unwrap().get().to_rust_string(), "ba");
}

#[test]
fn prototype_lookup_and_shadowing() {
    let mut module = Module::new();

    let mut ctor = FunctionBuilder::new("C").temps(1);
    let t = ctor.temp(0);
    ctor.move_(t.clone(), Expr::Const(Const::Undefined));
    ctor.ret(t);
    let ctor_id = module.add_function(ctor.finish());

    let mut f = FunctionBuilder::new("main").temps(4);
    let (c, proto, obj, x) = (f.temp(0), f.temp(1), f.temp(2), f.temp(3));
    f.move_(name("C"), ir::closure(ctor_id));
    f.move_(c.clone(), name("C"));
    f.move_(proto.clone(), new_expr(name("Object"), vec![]));
    f.move_(member(c.clone(), "prototype"), proto.clone());
    f.move_(member(proto.clone(), "x"), number(10.0));

    f.move_(obj.clone(), new_expr(name("C"), vec![]));
    f.move_(x.clone(), member(obj.clone(), "x"));
    f.move_(name("inherited"), x.clone());

    f.move_(member(obj.clone(), "x"), number(20.0));
    f.move_(x.clone(), member(obj.clone(), "x"));
    f.move_(name("shadowed"), x.clone());

    f.move_(x.clone(), member(proto.clone(), "x"));
    f.move_(name("protoX"), x.clone());
    f.ret(x);
    let id = module.add_function(f.finish());

    let mut engine = ExecutionEngine::new();
    let compiled = engine.compile_module(module).expect("compiles");
    engine
        .run(compiled, id, Value::undefined(), &[])
        .expect("main runs");

    assert_eq!(engine.global_get("inherited").unwrap().as_int32(), Some(10));
    assert_eq!(engine.global_get("shadowed").unwrap().as_int32(), Some(20));
    assert_eq!(engine.global_get("protoX").unwrap().as_int32(), Some(10));
}

#[test]
fn throw_lands_in_the_handler_block() {
    // function h() { try { throw 42; } catch (e) { return e; } }
    let mut module = Module::new();
    let mut f = FunctionBuilder::new("h").temps(3);
    let (flag, payload, caught) = (f.temp(0), f.temp(1), f.temp(2));
    let handler = f.new_block();
    let unreachable = f.new_block();
    f.handler_block(handler);

    f.move_(
        flag,
        builtin_call(Builtin::CreateExceptionHandler, vec![]),
    );
    f.move_(payload.clone(), number(42.0));
    f.exp(builtin_call(Builtin::Throw, vec![payload.clone()]));
    f.jump(unreachable);

    f.switch_to(handler);
    f.exp(builtin_call(Builtin::DeleteExceptionHandler, vec![]));
    f.move_(caught.clone(), builtin_call(Builtin::GetException, vec![]));
    f.ret(caught);

    f.switch_to(unreachable);
    f.move_(payload.clone(), Expr::Const(Const::Undefined));
    f.ret(payload);
    let id = module.add_function(f.finish());

    let mut engine = ExecutionEngine::new();
    let compiled = engine.compile_module(module).expect("compiles");
    let result = engine
        .run(compiled, id, Value::undefined(), &[])
        .expect("exception was caught");
    assert_eq!(result.as_int32(), Some(42));
    assert_eq!(engine.exception_handler_depth(), 0);
}

#[test]
fn uncaught_throw_reaches_the_host() {
    let mut module = Module::new();
    let mut f = FunctionBuilder::new("boom").temps(1);
    let t = f.temp(0);
    f.move_(t.clone(), number(13.0));
    f.exp(builtin_call(Builtin::Throw, vec![t.clone()]));
    f.ret(t);
    let id = module.add_function(f.finish());

    let (_engine, thrown) = run_one(module, id, &[]);
    let thrown = thrown.unwrap_err();
    assert_eq!(thrown.as_int32(), Some(13));
}

#[test]
fn closure_captures_lexical_scope() {
    // function mk() { var x = 0; return function() { return ++x; }; }
    let mut module = Module::new();

    let mut inner = FunctionBuilder::new("").temps(1);
    let t = inner.temp(0);
    inner.compound(name("x"), AluOp::Add, number(1.0));
    inner.move_(t.clone(), name("x"));
    inner.ret(t);
    let inner_id = module.add_function(inner.finish());

    let mut mk = FunctionBuilder::new("mk")
        .locals(&["x"])
        .needs_activation()
        .temps(1);
    let x = mk.local(0);
    let closure_temp = mk.temp(0);
    mk.move_(x, number(0.0));
    mk.move_(closure_temp.clone(), ir::closure(inner_id));
    mk.ret(closure_temp);
    let mk_id = module.add_function(mk.finish());

    let mut engine = ExecutionEngine::new();
    let compiled = engine.compile_module(module).expect("compiles");
    let counter = engine
        .run(compiled, mk_id, Value::undefined(), &[])
        .unwrap()
        .as_object()
        .expect("mk returns a function");

    for expected in [1, 2, 3] {
        let root = unsafe { &mut *engine.root_context() };
        let result = engine
            .invoke(counter, Value::undefined(), &[], root)
            .unwrap();
        assert_eq!(result.as_int32(), Some(expected));
    }
}

#[test]
fn arguments_object_aliases_formals() {
    // function a(x) { arguments[0] = 5; return x; }
    let mut module = Module::new();
    let mut f = FunctionBuilder::new("a").formals(&["x"]).temps(1);
    let args_temp = f.temp(0);
    f.move_(args_temp.clone(), name("arguments"));
    f.move_(subscript(args_temp, number(0.0)), number(5.0));
    f.ret(f.arg(0));
    let id = module.add_function(f.finish());

    let (_engine, result) = run_one(module, id, &[Value::from_int32(7)]);
    let result = result.unwrap();
    assert_eq!(result.as_int32(), Some(5));
}

#[test]
fn calls_between_compiled_functions() {
    // function add3(a, b, c) { return a + b + c; }
    // function main() { return add3(1, 2, 3); }
    let mut module = Module::new();

    let mut add3 = FunctionBuilder::new("add3").formals(&["a", "b", "c"]).temps(1);
    let t = add3.temp(0);
    add3.move_(t.clone(), binop(AluOp::Add, add3.arg(0), add3.arg(1)));
    add3.move_(t.clone(), binop(AluOp::Add, t.clone(), add3.arg(2)));
    add3.ret(t);
    let add3_id = module.add_function(add3.finish());

    let mut main = FunctionBuilder::new("main").temps(1);
    let r = main.temp(0);
    main.move_(name("add3"), ir::closure(add3_id));
    main.move_(
        r.clone(),
        call(name("add3"), vec![number(1.0), number(2.0), number(3.0)]),
    );
    main.ret(r);
    let main_id = module.add_function(main.finish());

    let (_engine, result) = run_one(module, main_id, &[]);
    let result = result.unwrap();
    assert_eq!(result.as_int32(), Some(6));
}

#[test]
fn method_calls_reach_native_builtins() {
    // function f() { return Math.max(1, 5, 3); }
    let mut module = Module::new();
    let mut f = FunctionBuilder::new("f").temps(2);
    let (math, r) = (f.temp(0), f.temp(1));
    f.move_(math.clone(), name("Math"));
    f.move_(
        r.clone(),
        call(
            member(math, "max"),
            vec![number(1.0), number(5.0), number(3.0)],
        ),
    );
    f.ret(r);
    let id = module.add_function(f.finish());

    let (_engine, result) = run_one(module, id, &[]);
    let result = result.unwrap();
    assert_eq!(result.as_int32(), Some(5));
}

#[test]
fn typeof_and_unary_operators() {
    let mut module = Module::new();
    let mut f = FunctionBuilder::new("f").temps(2);
    let (v, r) = (f.temp(0), f.temp(1));
    f.move_(v.clone(), number(42.0));
    f.move_(r.clone(), builtin_call(Builtin::Typeof, vec![v.clone()]));
    f.ret(r);
    let id = module.add_function(f.finish());
    let (_engine, result) = run_one(module, id, &[]);
    let result = result.unwrap();
    assert_eq!(result.as_string().unwrap().get().to_rust_string(), "number");

    let mut module = Module::new();
    let mut f = FunctionBuilder::new("f").formals(&["a"]).temps(1);
    let r = f.temp(0);
    f.move_(r.clone(), ir::unop(UnOp::UMinus, f.arg(0)));
    f.ret(r);
    let id = module.add_function(f.finish());
    let (_engine, result) = run_one(module, id, &[Value::from_int32(5)]);
    let result = result.unwrap();
    assert_eq!(result.as_int32(), Some(-5));
}

#[test]
fn instanceof_through_the_comparison_helper() {
    // function f() { var e = new Error("boom"); if (e instanceof Error)
    // return 1; return 0; }
    let mut module = Module::new();
    let mut f = FunctionBuilder::new("f").temps(3);
    let (e, ctor, r) = (f.temp(0), f.temp(1), f.temp(2));
    let yes = f.new_block();
    let no = f.new_block();
    f.move_(e.clone(), new_expr(name("Error"), vec![string("boom")]));
    f.move_(ctor.clone(), name("Error"));
    f.cjump(binop(AluOp::InstanceOf, e, ctor), yes, no);
    f.switch_to(yes);
    f.move_(r.clone(), number(1.0));
    f.ret(r.clone());
    f.switch_to(no);
    f.move_(r.clone(), number(0.0));
    f.ret(r);
    let id = module.add_function(f.finish());

    let (_engine, result) = run_one(module, id, &[]);
    let result = result.unwrap();
    assert_eq!(result.as_int32(), Some(1));
}

#[test]
fn enter_and_leave_are_compile_errors() {
    let mut module = Module::new();
    let mut f = FunctionBuilder::new("f").temps(1);
    let t = f.temp(0);
    f.move_(t.clone(), number(0.0));
    f.ret(t);
    let mut function = f.finish();
    function.blocks[0].stmts.insert(0, ir::Stmt::Enter);
    module.add_function(function);

    let mut engine = ExecutionEngine::new();
    assert!(engine.compile_module(module).is_err());
}
