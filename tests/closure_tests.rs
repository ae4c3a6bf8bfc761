//! Function literals and inner methods

mod common;

use common::*;
use ltc::ast::*;
use ltc::ir::Ins;

fn attribute_names(class: &classfile_parser::ClassFile) -> Vec<String> {
    class.attributes.iter().map(|a| utf8(class, a.attribute_name_index).to_string()).collect()
}

#[test]
fn test_static_context_lambda_uses_metafactory() {
    let make = static_method(
        "make",
        vec![],
        Some("Runnable"),
        vec![ret(Some(lambda(&[], vec![expr(string("ran"))])))],
    );
    let units = [unit(Some("fn"), vec![class("Factory", methods(vec![make]))])];

    let repo = analyze(&units).unwrap();
    let body = body(&repo, "fn.Factory", "make");
    assert_eq!(count(body, |ins| matches!(ins, Ins::InvokeDynamic { name, .. } if name == "run")), 1);

    let classes = compile(&units).unwrap();
    assert_eq!(classes.len(), 1);
    let class = parse(&classes["fn.Factory"]);
    assert!(method_names(&class).iter().any(|n| n == "lambda$0"));
    assert!(attribute_names(&class).iter().any(|n| n == "BootstrapMethods"));
    // invokedynamic
    let code = code_of(&class, "make", "()Ljava/lang/Runnable;");
    assert!(code.code.contains(&0xba));
}

#[test]
fn test_instance_context_lambda_synthesizes_class() {
    let make = method(
        "make",
        vec![],
        Some("Runnable"),
        vec![ret(Some(lambda(&[], vec![expr(string("tick"))])))],
    );
    let units = [unit(None, vec![class("Counter", methods(vec![make]))])];

    let classes = compile(&units).unwrap();
    let names: Vec<&String> = classes.keys().collect();
    assert_eq!(names, vec!["Counter", "Counter$Lambda$0"]);

    let lambda_class = parse(&classes["Counter$Lambda$0"]);
    assert_eq!(class_name(&lambda_class, lambda_class.interfaces[0]), "java/lang/Runnable");
    assert!(method_names(&lambda_class).iter().any(|n| n == "run"));

    let owner = parse(&classes["Counter"]);
    let code = code_of(&owner, "make", "()Ljava/lang/Runnable;");
    // new, no invokedynamic
    assert!(code.code.contains(&0xbb));
    assert!(!code.code.contains(&0xba));
}

#[test]
fn test_lambda_captures_enclosing_local() {
    let make = static_method(
        "adder",
        vec![param("n", Some("int"))],
        None,
        vec![ret(Some(lambda(&["x"], vec![expr(name("n"))])))],
    );
    let units = [unit(None, vec![class("Adder", methods(vec![make]))])];

    let repo = analyze(&units).unwrap();
    let lambda_method = find_methods(&repo, "Adder", "lambda$0")[0];
    // captured n comes first, then the declared parameter
    assert_eq!(repo.method(lambda_method).params.len(), 2);
}

#[test]
fn test_inner_method_is_lifted() {
    let doubled = binary(BinaryOp::Mul, name("v"), num("2"));
    let inner = method("twice", vec![param("v", Some("int"))], Some("int"), vec![ret(Some(doubled))]);
    let outer = static_method(
        "run",
        vec![],
        Some("int"),
        vec![Stmt::MethodDef(inner), ret(Some(call(name("twice"), vec![num("21")])))],
    );
    let units = [unit(None, vec![class("Outer", methods(vec![outer]))])];

    let repo = analyze(&units).unwrap();
    let lifted = find_methods(&repo, "Outer", "inner$twice$0");
    assert_eq!(lifted.len(), 1);
    assert!(repo.method(lifted[0]).modifiers.is_static());

    let body = body(&repo, "Outer", "run");
    let calls = count(body, |ins| {
        matches!(ins, Ins::Invoke { callee: ltc::ir::Callee::Method(m), .. } if *m == lifted[0])
    });
    assert_eq!(calls, 1);
}
