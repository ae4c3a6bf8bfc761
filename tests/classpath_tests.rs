//! Types loaded from compiled classes on the class path

mod common;

use common::*;
use ltc::ast::*;
use ltc::common::ClassFileSource;
use ltc::ir::{Callee, Ins, InvokeKind};
use ltc::Config;

fn library() -> CompilationUnit {
    let twice = static_method(
        "twice",
        vec![param("x", Some("int"))],
        Some("int"),
        vec![ret(Some(binary(BinaryOp::Mul, name("x"), num("2"))))],
    );
    unit(Some("lib"), vec![class("Util", methods(vec![twice]))])
}

#[test]
fn test_compiled_classes_are_indexed() {
    let dir = tempfile::tempdir().unwrap();
    ltc::compile_to_dir(&[library()], &Config::default(), dir.path()).unwrap();

    let source = ClassFileSource::new(&[dir.path().to_path_buf()]).unwrap();
    assert_eq!(source.len(), 1);
    assert!(source.contains("lib.Util"));
    assert!(!source.contains("lib.Missing"));
}

#[test]
fn test_static_call_into_class_path_type() {
    let dir = tempfile::tempdir().unwrap();
    ltc::compile_to_dir(&[library()], &Config::default(), dir.path()).unwrap();

    let run = static_method(
        "run",
        vec![],
        Some("int"),
        vec![ret(Some(call(access(name("Util"), "twice"), vec![num("21")])))],
    );
    let mut app = unit(Some("app"), vec![class("Main", methods(vec![run]))]);
    app.imports.push(ImportDecl { name: "lib.Util".to_string(), is_static: false, is_wildcard: false, span: sp() });

    let config = Config::default().with_classpath_entry(dir.path());
    let mut repo = ltc::repository(&config).unwrap();
    ltc::analyze(std::slice::from_ref(&app), &mut repo, &config).unwrap();

    let body = body(&repo, "app.Main", "run");
    let static_calls = count(body, |ins| match ins {
        Ins::Invoke { kind: InvokeKind::Static, callee: Callee::Method(m), .. } => {
            let method = repo.method(*m);
            method.name == "twice" && repo.name(method.declaring) == "lib.Util"
        }
        _ => false,
    });
    assert_eq!(static_calls, 1);
    assert_eq!(count(body, |ins| matches!(ins, Ins::InvokeDynamic { .. })), 0);
}

#[test]
fn test_subclass_of_class_path_type() {
    let dir = tempfile::tempdir().unwrap();
    ltc::compile_to_dir(&[library()], &Config::default(), dir.path()).unwrap();

    let TypeDecl::Class(mut child) = class("Child", vec![]) else { unreachable!() };
    child.extends = Some(SuperCall { ty: ty("lib.Util"), args: vec![] });
    let units = [unit(Some("app"), vec![TypeDecl::Class(child)])];

    let config = Config::default().with_classpath_entry(dir.path());
    let classes = ltc::compile(&units, &config).unwrap();
    let class = parse(&classes["app.Child"]);
    assert_eq!(class_name(&class, class.super_class), "lib/Util");
}

#[test]
fn test_unknown_type_without_class_path() {
    let run = static_method("run", vec![], None, vec![ret(Some(new("lib.Util", vec![])))]);
    let units = [unit(Some("app"), vec![class("Main", methods(vec![run]))])];
    let err = analyze(&units).unwrap_err();
    assert_eq!(err.semantic_kind(), Some(ltc::SemanticErrorKind::NotFound));
}
