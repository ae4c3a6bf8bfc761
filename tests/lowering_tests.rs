//! Expression lowering through the full semantic pipeline

mod common;

use common::*;
use ltc::ast::*;
use ltc::common::NumKind;
use ltc::ir::{ArithOp, Callee, Constant, Ins, InvokeKind};
use ltc::SemanticErrorKind;

#[test]
fn test_int_plus_boxed_long_is_long_addition() {
    let add = static_method(
        "add",
        vec![param("a", Some("int")), param("b", Some("Long"))],
        Some("long"),
        vec![ret(Some(binary(BinaryOp::Add, name("a"), name("b"))))],
    );
    let units = [unit(Some("demo"), vec![class("Calc", methods(vec![add]))])];

    let repo = analyze(&units).unwrap();
    let body = body(&repo, "demo.Calc", "add");
    let long_adds = count(body, |ins| {
        matches!(ins, Ins::TwoVarOp { op: ArithOp::Add, kind: NumKind::Long, .. })
    });
    assert_eq!(long_adds, 1);

    let classes = compile(&units).unwrap();
    let class = parse(&classes["demo.Calc"]);
    let code = code_of(&class, "add", "(ILjava/lang/Long;)J");
    // i2l and ladd
    assert!(code.code.contains(&0x85));
    assert!(code.code.contains(&0x61));
}

#[test]
fn test_literal_overflow_is_reported() {
    let m = static_method("m", vec![], None, vec![expr(var("b", Some("byte"), Some(num("128"))))]);
    let units = [unit(None, vec![class("Overflow", methods(vec![m]))])];
    let err = analyze(&units).unwrap_err();
    assert_eq!(err.semantic_kind(), Some(SemanticErrorKind::LiteralOverflow));
}

#[test]
fn test_ambiguous_overloads_are_rejected() {
    let f1 = static_method("f", vec![param("a", Some("Integer")), param("b", Some("Object"))], None, vec![]);
    let f2 = static_method("f", vec![param("a", Some("Object")), param("b", Some("Integer"))], None, vec![]);
    let g = static_method("g", vec![], None, vec![expr(call(name("f"), vec![num("1"), num("1")]))]);
    let units = [unit(None, vec![class("Pick", methods(vec![f1, f2, g]))])];
    let err = analyze(&units).unwrap_err();
    assert_eq!(err.semantic_kind(), Some(SemanticErrorKind::Ambiguous));
}

#[test]
fn test_ambiguity_names_the_conflicting_pair() {
    // (String, Object) and (Object, String) are each more specific than
    // (Object, Object) but not than each other
    let f1 = static_method("f", vec![param("a", Some("Object")), param("b", Some("Object"))], None, vec![]);
    let f2 = static_method("f", vec![param("a", Some("String")), param("b", Some("Object"))], None, vec![]);
    let f3 = static_method("f", vec![param("a", Some("Object")), param("b", Some("String"))], None, vec![]);
    let g = static_method("g", vec![], None, vec![expr(call(name("f"), vec![string("x"), string("y")]))]);
    let units = [unit(None, vec![class("Pick", methods(vec![f1, f2, f3, g]))])];

    let err = analyze(&units).unwrap_err();
    assert_eq!(err.semantic_kind(), Some(SemanticErrorKind::Ambiguous));
    let message = err.to_string();
    assert!(message.contains("(java.lang.String, java.lang.Object)"), "{}", message);
    assert!(message.contains("(java.lang.Object, java.lang.String)"), "{}", message);
    assert!(!message.contains("(java.lang.Object, java.lang.Object)"), "{}", message);
}

#[test]
fn test_most_specific_overload_wins() {
    let f1 = static_method("f", vec![param("a", Some("Object"))], Some("int"), vec![ret(Some(num("1")))]);
    let f2 = static_method("f", vec![param("a", Some("String"))], Some("int"), vec![ret(Some(num("2")))]);
    let g = static_method("g", vec![], Some("int"), vec![ret(Some(call(name("f"), vec![string("x")])))]);
    let units = [unit(None, vec![class("Pick", methods(vec![f1, f2, g]))])];

    let repo = analyze(&units).unwrap();
    let body = body(&repo, "Pick", "g");
    let string_overload = count(body, |ins| match ins {
        Ins::Invoke { callee: ltc::ir::Callee::Method(m), .. } => {
            let params = repo.method(*m).param_types();
            params.len() == 1 && repo.name(params[0]) == "java.lang.String"
        }
        _ => false,
    });
    assert_eq!(string_overload, 1);
}

#[test]
fn test_unknown_method_on_object_is_late_bound() {
    let m = static_method(
        "m",
        vec![param("o", None)],
        None,
        vec![expr(call(access(name("o"), "quack"), vec![num("3")]))],
    );
    let units = [unit(None, vec![class("Duck", methods(vec![m]))])];

    let repo = analyze(&units).unwrap();
    let body = body(&repo, "Duck", "m");
    let late = count(body, |ins| matches!(ins, Ins::InvokeDynamic { name, args, .. } if name == "quack" && args.len() == 2));
    assert_eq!(late, 1);
}

#[test]
fn test_default_parameters_generate_overloads() {
    let m = method(
        "greet",
        vec![param("who", Some("String")), param_default("times", Some("int"), num("1"))],
        None,
        vec![],
    );
    let units = [unit(None, vec![class("Greeter", methods(vec![m]))])];

    let repo = analyze(&units).unwrap();
    let overloads = find_methods(&repo, "Greeter", "greet");
    let mut arities: Vec<usize> = overloads.iter().map(|m| repo.method(*m).params.len()).collect();
    arities.sort();
    assert_eq!(arities, vec![1, 2]);

    let classes = compile(&units).unwrap();
    let class = parse(&classes["Greeter"]);
    let greets = method_names(&class).into_iter().filter(|n| n == "greet").count();
    assert_eq!(greets, 2);
    // the short overload forwards the default
    let short = code_of(&class, "greet", "(Ljava/lang/String;)Ljava/lang/Object;");
    assert!(short.code.contains(&0x04));
}

#[test]
fn test_default_constructor_parameter_forwards_to_full_constructor() {
    let TypeDecl::Class(mut point) = class("Point", vec![]) else { unreachable!() };
    point.params = vec![param("a", None), param_default("b", Some("int"), num("1"))];
    let units = [unit(None, vec![TypeDecl::Class(point)])];

    let repo = analyze(&units).unwrap();
    let ty = repo.lookup("Point").unwrap();
    let ctors = repo.constructors_of(ty);
    assert_eq!(ctors.len(), 2);
    let full = ctors.iter().copied().find(|c| repo.constructor(*c).params.len() == 2).unwrap();
    let short = ctors.iter().copied().find(|c| repo.constructor(*c).params.len() == 1).unwrap();

    let body = repo.constructor(short).body.as_ref().unwrap();
    let invokes: Vec<&Vec<ltc::ir::InsId>> = body
        .code
        .iter()
        .filter_map(|id| match body.get(*id) {
            Ins::Invoke { args, .. } => Some(args),
            _ => None,
        })
        .collect();
    assert_eq!(invokes.len(), 1);
    assert_eq!(count(body, |ins| matches!(ins, Ins::Invoke { .. })), 1);
    let forwards = count(body, |ins| {
        matches!(ins, Ins::Invoke { kind: InvokeKind::Special, callee: Callee::Constructor(c), .. } if *c == full)
    });
    assert_eq!(forwards, 1);

    let args = invokes[0];
    assert_eq!(args.len(), 2);
    assert!(matches!(body.get(args[0]), Ins::Load { slot: 1, .. }));
    assert!(matches!(body.get(args[1]), Ins::Const { value: Constant::Int(1), .. }));
}

#[test]
fn test_assignment_to_undeclared_name_declares_local() {
    let m = static_method(
        "m",
        vec![],
        Some("int"),
        vec![expr(assign(name("x"), num("5"))), ret(Some(name("x")))],
    );
    let units = [unit(None, vec![class("Locals", methods(vec![m]))])];

    let repo = analyze(&units).unwrap();
    let body = body(&repo, "Locals", "m");
    assert_eq!(count(body, |ins| matches!(ins, Ins::Store { .. })), 1);
}
