//! Class files read back with an independent parser

mod common;

use common::*;
use ltc::ast::*;
use ltc::Config;

fn field(n: &str, type_name: &str, modifiers: Vec<Modifier>) -> ClassMember {
    ClassMember::Field(FieldDecl {
        modifiers,
        annotations: vec![],
        name: n.to_string(),
        ty: Some(ty(type_name)),
        init: None,
        span: sp(),
    })
}

#[test]
fn test_class_header_and_members() {
    let getter = method("getCount", vec![], Some("int"), vec![ret(Some(name("count")))]);
    let mut members = vec![field("count", "int", vec![Modifier::Private])];
    members.extend(methods(vec![getter]));
    let units = [unit(Some("shop.model"), vec![class("Item", members)])];

    let classes = compile(&units).unwrap();
    let class = parse(&classes["shop.model.Item"]);

    assert_eq!(class.major_version, 52);
    assert_eq!(class_name(&class, class.this_class), "shop/model/Item");
    assert_eq!(class_name(&class, class.super_class), "java/lang/Object");
    assert_eq!(class.fields.len(), 1);
    assert_eq!(utf8(&class, class.fields[0].name_index), "count");
    assert_eq!(utf8(&class, class.fields[0].descriptor_index), "I");

    let names = method_names(&class);
    assert!(names.contains(&"<init>".to_string()));
    assert!(names.contains(&"getCount".to_string()));

    let code = code_of(&class, "getCount", "()I");
    // aload_0, getfield, ireturn
    assert_eq!(code.code[0], 0x2a);
    assert_eq!(code.code[1], 0xb4);
    assert_eq!(*code.code.last().unwrap(), 0xac);
}

#[test]
fn test_source_file_attribute_follows_config() {
    let units = [unit(None, vec![class("Plain", vec![])])];

    let with = ltc::compile(&units, &Config::default()).unwrap();
    let class = parse(&with["Plain"]);
    let has_source = |c: &classfile_parser::ClassFile| {
        c.attributes.iter().any(|a| utf8(c, a.attribute_name_index) == "SourceFile")
    };
    assert!(has_source(&class));

    let without = ltc::compile(&units, &Config::default().with_source_file(false)).unwrap();
    assert!(!has_source(&parse(&without["Plain"])));
}

#[test]
fn test_target_version_sets_major() {
    let units = [unit(None, vec![class("Old", vec![])])];
    let classes = ltc::compile(&units, &Config::default().with_target_version(7)).unwrap();
    assert_eq!(parse(&classes["Old"]).major_version, 51);
}

#[test]
fn test_static_initializer_is_emitted() {
    let members = vec![
        field("greeting", "String", vec![Modifier::Static]),
        ClassMember::StaticBlock(vec![expr(assign(name("greeting"), string("hi")))]),
    ];
    let units = [unit(None, vec![class("Statics", members)])];

    let classes = compile(&units).unwrap();
    let class = parse(&classes["Statics"]);
    let code = code_of(&class, "<clinit>", "()V");
    // putstatic
    assert!(code.code.contains(&0xb3));
}

#[test]
fn test_compile_to_dir_writes_package_directories() {
    let out = tempfile::tempdir().unwrap();
    let units = [unit(Some("a.b"), vec![class("C", vec![])])];
    let written = ltc::compile_to_dir(&units, &Config::default(), out.path()).unwrap();
    assert_eq!(written, vec![out.path().join("a/b/C.class")]);
    let bytes = std::fs::read(&written[0]).unwrap();
    assert_eq!(&bytes[..4], &[0xca, 0xfe, 0xba, 0xbe]);
}
