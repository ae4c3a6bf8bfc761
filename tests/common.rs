// Common test utilities: syntax-tree builders and class-file helpers

#![allow(dead_code)]

use std::collections::BTreeMap;

use classfile_parser::attribute_info::{code_attribute_parser, CodeAttribute};
use classfile_parser::class_parser;
use classfile_parser::constant_info::ConstantInfo;
use classfile_parser::ClassFile;

use ltc::ast::*;
use ltc::common::{MethodId, TypeRepository};
use ltc::ir::{Body, Ins};
use ltc::{Config, Result};

pub fn sp() -> Span {
    Span::default()
}

pub fn ty(name: &str) -> TypeRef {
    TypeRef { name: name.to_string(), array_dims: 0, span: sp() }
}

pub fn array_ty(name: &str, dims: usize) -> TypeRef {
    TypeRef { name: name.to_string(), array_dims: dims, span: sp() }
}

pub fn num(text: &str) -> Expr {
    Expr::Literal(LiteralExpr { value: Literal::Number(text.to_string()), span: sp() })
}

pub fn string(s: &str) -> Expr {
    Expr::Literal(LiteralExpr { value: Literal::String(s.to_string()), span: sp() })
}

pub fn boolean(b: bool) -> Expr {
    Expr::Literal(LiteralExpr { value: Literal::Bool(b), span: sp() })
}

pub fn name(n: &str) -> Expr {
    Expr::Name(NameExpr { name: n.to_string(), span: sp() })
}

pub fn this() -> Expr {
    Expr::This(sp())
}

pub fn access(target: Expr, member: &str) -> Expr {
    Expr::Access(AccessExpr { target: Some(Box::new(target)), name: member.to_string(), span: sp() })
}

pub fn call(callee: Expr, args: Vec<Expr>) -> Expr {
    Expr::Invocation(InvocationExpr { callee: Box::new(callee), args, span: sp() })
}

pub fn new(type_name: &str, args: Vec<Expr>) -> Expr {
    Expr::New(NewExpr { ty: ty(type_name), args, span: sp() })
}

pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary(BinaryExpr { op, left: Box::new(left), right: Box::new(right), span: sp() })
}

pub fn var(n: &str, type_name: Option<&str>, init: Option<Expr>) -> Expr {
    Expr::VarDef(VarDefExpr {
        name: n.to_string(),
        ty: type_name.map(ty),
        init: init.map(Box::new),
        modifiers: vec![],
        span: sp(),
    })
}

pub fn assign(target: Expr, value: Expr) -> Expr {
    Expr::Assign(AssignExpr { target: Box::new(target), op: AssignOp::Assign, value: Box::new(value), span: sp() })
}

pub fn lambda(params: &[&str], body: Vec<Stmt>) -> Expr {
    Expr::Lambda(LambdaExpr { params: params.iter().map(|p| param(p, None)).collect(), body, span: sp() })
}

pub fn expr(e: Expr) -> Stmt {
    Stmt::Expr(e)
}

pub fn ret(value: Option<Expr>) -> Stmt {
    Stmt::Return(ReturnStmt { value, span: sp() })
}

pub fn param(n: &str, type_name: Option<&str>) -> Param {
    Param { name: n.to_string(), ty: type_name.map(ty), default: None, modifiers: vec![], annotations: vec![], span: sp() }
}

pub fn param_default(n: &str, type_name: Option<&str>, default: Expr) -> Param {
    Param { default: Some(default), ..param(n, type_name) }
}

pub fn method(n: &str, params: Vec<Param>, return_type: Option<&str>, body: Vec<Stmt>) -> MethodDecl {
    MethodDecl {
        modifiers: vec![],
        annotations: vec![],
        name: n.to_string(),
        params,
        return_type: return_type.map(ty),
        body: Some(body),
        span: sp(),
    }
}

pub fn static_method(n: &str, params: Vec<Param>, return_type: Option<&str>, body: Vec<Stmt>) -> MethodDecl {
    MethodDecl { modifiers: vec![Modifier::Static], ..method(n, params, return_type, body) }
}

pub fn class(n: &str, members: Vec<ClassMember>) -> TypeDecl {
    TypeDecl::Class(ClassDecl {
        modifiers: vec![],
        annotations: vec![],
        name: n.to_string(),
        params: vec![],
        extends: None,
        implements: vec![],
        body: members,
        span: sp(),
    })
}

pub fn methods(decls: Vec<MethodDecl>) -> Vec<ClassMember> {
    decls.into_iter().map(ClassMember::Method).collect()
}

pub fn unit(package: Option<&str>, types: Vec<TypeDecl>) -> CompilationUnit {
    CompilationUnit {
        file: "Test.lt".to_string(),
        package: package.map(str::to_string),
        imports: vec![],
        types,
        span: sp(),
    }
}

/// Runs the semantic passes and returns the repository holding the bodies
pub fn analyze(units: &[CompilationUnit]) -> Result<TypeRepository> {
    let config = Config::default();
    let mut repo = ltc::repository(&config)?;
    ltc::analyze(units, &mut repo, &config)?;
    Ok(repo)
}

pub fn compile(units: &[CompilationUnit]) -> Result<BTreeMap<String, Vec<u8>>> {
    ltc::compile(units, &Config::default())
}

/// Methods of `type_name` called `method_name`
pub fn find_methods(repo: &TypeRepository, type_name: &str, method_name: &str) -> Vec<MethodId> {
    let ty = repo.lookup(type_name).expect("type is declared");
    repo.methods_of(ty).iter().copied().filter(|m| repo.method(*m).name == method_name).collect()
}

pub fn body<'r>(repo: &'r TypeRepository, type_name: &str, method_name: &str) -> &'r Body {
    let id = find_methods(repo, type_name, method_name)[0];
    repo.method(id).body.as_ref().expect("method has a body")
}

pub fn count(body: &Body, pred: impl Fn(&Ins) -> bool) -> usize {
    body.count_reachable(pred)
}

pub fn parse(bytes: &[u8]) -> ClassFile {
    class_parser(bytes).expect("well-formed class file").1
}

pub fn utf8(class: &ClassFile, index: u16) -> &str {
    match &class.const_pool[index as usize - 1] {
        ConstantInfo::Utf8(c) => &c.utf8_string,
        other => panic!("constant {} is {:?}", index, other),
    }
}

pub fn class_name(class: &ClassFile, index: u16) -> String {
    match &class.const_pool[index as usize - 1] {
        ConstantInfo::Class(c) => utf8(class, c.name_index).to_string(),
        other => panic!("constant {} is {:?}", index, other),
    }
}

pub fn method_names(class: &ClassFile) -> Vec<String> {
    class.methods.iter().map(|m| utf8(class, m.name_index).to_string()).collect()
}

/// Code attribute of the first method with the given name and descriptor
pub fn code_of(class: &ClassFile, method_name: &str, descriptor: &str) -> CodeAttribute {
    let method = class
        .methods
        .iter()
        .find(|m| utf8(class, m.name_index) == method_name && utf8(class, m.descriptor_index) == descriptor)
        .unwrap_or_else(|| panic!("no method {}{}", method_name, descriptor));
    let attribute = method
        .attributes
        .iter()
        .find(|a| utf8(class, a.attribute_name_index) == "Code")
        .expect("method has code");
    code_attribute_parser(&attribute.info).expect("well-formed code attribute").1
}

/// Offset and opcode of every instruction in `code`
pub fn instructions(code: &[u8]) -> Vec<(usize, u8)> {
    let mut out = Vec::new();
    let mut pc = 0;
    while pc < code.len() {
        let op = code[pc];
        let len = match op {
            0x10 | 0x12 | 0x15..=0x19 | 0x36..=0x3a | 0xa9 | 0xbc => 2,
            0x11 | 0x13 | 0x14 | 0x84 | 0x99..=0xa8 | 0xb2..=0xb8 | 0xbb | 0xbd | 0xc0 | 0xc1 | 0xc6 | 0xc7 => 3,
            0xc5 => 4,
            0xb9 | 0xba | 0xc8 | 0xc9 => 5,
            0xc4 if code.get(pc + 1) == Some(&0x84) => 6,
            0xc4 => 4,
            0xaa | 0xab => panic!("switch instructions are never emitted"),
            _ => 1,
        };
        out.push((pc, op));
        pc += len;
    }
    out
}

/// Offsets of the `ldc`/`ldc_w` instructions loading the string `text`
pub fn string_loads(class: &ClassFile, code: &CodeAttribute, text: &str) -> Vec<usize> {
    let index = class
        .const_pool
        .iter()
        .position(|c| matches!(c, ConstantInfo::String(s) if utf8(class, s.string_index) == text))
        .map(|i| i + 1)
        .unwrap_or_else(|| panic!("no string constant {:?}", text));
    instructions(&code.code)
        .into_iter()
        .filter(|&(pc, op)| match op {
            0x12 => code.code[pc + 1] as usize == index,
            0x13 => u16::from_be_bytes([code.code[pc + 1], code.code[pc + 2]]) as usize == index,
            _ => false,
        })
        .map(|(pc, _)| pc)
        .collect()
}

/// Offsets of every instruction with opcode `op`
pub fn offsets_of(code: &CodeAttribute, op: u8) -> Vec<usize> {
    instructions(&code.code).into_iter().filter(|&(_, o)| o == op).map(|(pc, _)| pc).collect()
}
