//! Structured statements lowered to jumps, protected ranges and cleanup copies

mod common;

use common::*;
use ltc::ast::*;
use ltc::ir::{Constant, Ins};

fn marker(s: &str) -> Stmt {
    expr(string(s))
}

fn copies(body: &ltc::ir::Body, s: &str) -> usize {
    count(body, |ins| matches!(ins, Ins::Const { value: Constant::String(v), .. } if v == s))
}

fn try_stmt(body: Vec<Stmt>, catch_var: Option<&str>, catch_body: Vec<Stmt>, finally: Vec<Stmt>) -> Stmt {
    Stmt::Try(TryStmt { body, catch_var: catch_var.map(str::to_string), catch_body, finally, span: sp() })
}

fn when(cond: Expr, body: Vec<Stmt>) -> Stmt {
    Stmt::If(IfStmt { branches: vec![IfBranch { cond: Some(cond), body }], span: sp() })
}

fn covers(entry: &classfile_parser::attribute_info::ExceptionEntry, pc: usize) -> bool {
    (entry.start_pc as usize..entry.end_pc as usize).contains(&pc)
}

/// Slot of the local loaded by a monitor instruction
fn monitor_slot(body: &ltc::ir::Body, ins: &Ins) -> Option<u16> {
    match ins {
        Ins::MonitorEnter { value } | Ins::MonitorExit { value } => match body.get(*value) {
            Ins::Load { slot, .. } => Some(*slot),
            _ => None,
        },
        _ => None,
    }
}

#[test]
fn test_finally_copied_for_return_and_both_paths() {
    let m = static_method(
        "m",
        vec![param("flag", Some("boolean"))],
        Some("int"),
        vec![
            try_stmt(
                vec![Stmt::If(IfStmt {
                    branches: vec![IfBranch { cond: Some(name("flag")), body: vec![ret(Some(num("1")))] }],
                    span: sp(),
                })],
                None,
                vec![],
                vec![marker("cleanup")],
            ),
            ret(Some(num("0"))),
        ],
    );
    let units = [unit(None, vec![class("Flow", methods(vec![m]))])];

    let repo = analyze(&units).unwrap();
    let body = body(&repo, "Flow", "m");
    // the early return, the normal path and the exceptional path
    assert_eq!(copies(body, "cleanup"), 3);
    assert!(!body.exception_table.is_empty());
    assert!(body.exception_table.iter().all(|e| e.catch_type.is_none()));

    let classes = compile(&units).unwrap();
    let class = parse(&classes["Flow"]);
    let code = code_of(&class, "m", "(Z)I");
    assert!(!code.exception_table.is_empty());
    for entry in &code.exception_table {
        assert!(entry.start_pc < entry.end_pc);
        assert_eq!(entry.catch_type, 0);
    }
}

#[test]
fn test_catch_binds_throwable() {
    let m = static_method(
        "m",
        vec![],
        None,
        vec![try_stmt(
            vec![Stmt::Throw(ThrowStmt { value: new("RuntimeException", vec![]), span: sp() })],
            Some("e"),
            vec![expr(call(access(name("e"), "getMessage"), vec![]))],
            vec![],
        )],
    );
    let units = [unit(None, vec![class("Catcher", methods(vec![m]))])];

    let classes = compile(&units).unwrap();
    let class = parse(&classes["Catcher"]);
    let code = code_of(&class, "m", "()Ljava/lang/Object;");
    assert_eq!(code.exception_table.len(), 1);
    assert_eq!(class_name(&class, code.exception_table[0].catch_type), "java/lang/Throwable");
}

#[test]
fn test_synchronized_releases_on_normal_and_exceptional_exit() {
    let m = method(
        "m",
        vec![],
        None,
        vec![Stmt::Synchronized(SyncStmt { locks: vec![this()], body: vec![marker("inside")], span: sp() })],
    );
    let units = [unit(None, vec![class("Locked", methods(vec![m]))])];

    let repo = analyze(&units).unwrap();
    let body = body(&repo, "Locked", "m");
    assert_eq!(count(body, |ins| matches!(ins, Ins::MonitorEnter { .. })), 1);
    assert_eq!(count(body, |ins| matches!(ins, Ins::MonitorExit { .. })), 2);

    let classes = compile(&units).unwrap();
    let class = parse(&classes["Locked"]);
    let code = code_of(&class, "m", "()Ljava/lang/Object;");
    // monitorenter
    assert!(code.code.contains(&0xc2));
    assert_eq!(code.exception_table.len(), 1);
}

#[test]
fn test_nested_catch_does_not_cover_outer_finally() {
    let inner = try_stmt(vec![ret(Some(num("1")))], Some("e"), vec![marker("caught")], vec![]);
    let m = static_method(
        "m",
        vec![],
        Some("int"),
        vec![try_stmt(vec![inner], None, vec![], vec![marker("FIN")]), ret(Some(num("0")))],
    );
    let units = [unit(None, vec![class("Nested", methods(vec![m]))])];

    let repo = analyze(&units).unwrap();
    let body = body(&repo, "Nested", "m");
    // the return, the normal path and the exceptional path
    assert_eq!(copies(body, "FIN"), 3);

    let classes = compile(&units).unwrap();
    let class = parse(&classes["Nested"]);
    let code = code_of(&class, "m", "()I");
    let finally_loads = string_loads(&class, &code, "FIN");
    assert_eq!(finally_loads.len(), 3);

    // the inner handler still protects the returned value and comes first
    assert_ne!(code.exception_table[0].catch_type, 0);
    let typed: Vec<_> = code.exception_table.iter().filter(|e| e.catch_type != 0).collect();
    assert!(!typed.is_empty());
    for entry in typed {
        assert!(entry.start_pc < entry.end_pc);
        for pc in &finally_loads {
            assert!(!covers(entry, *pc), "finally copy at {} inside catch range {}..{}", pc, entry.start_pc, entry.end_pc);
        }
    }
}

#[test]
fn test_nested_catch_does_not_cover_monitor_exit() {
    let inner = try_stmt(vec![ret(Some(num("1")))], Some("e"), vec![marker("caught")], vec![]);
    let m = method(
        "m",
        vec![],
        Some("int"),
        vec![
            Stmt::Synchronized(SyncStmt { locks: vec![this()], body: vec![inner], span: sp() }),
            ret(Some(num("0"))),
        ],
    );
    let units = [unit(None, vec![class("Guarded", methods(vec![m]))])];

    let classes = compile(&units).unwrap();
    let class = parse(&classes["Guarded"]);
    let code = code_of(&class, "m", "()I");
    // monitorexit on the return, the normal path and the exceptional path
    let exits = offsets_of(&code, 0xc3);
    assert_eq!(exits.len(), 3);
    for entry in code.exception_table.iter().filter(|e| e.catch_type != 0) {
        for pc in &exits {
            assert!(!covers(entry, *pc), "monitorexit at {} inside catch range {}..{}", pc, entry.start_pc, entry.end_pc);
        }
    }
}

#[test]
fn test_monitors_released_in_reverse_order_on_every_path() {
    let m = method(
        "m",
        vec![param("a", None), param("b", None), param("flag", Some("boolean"))],
        Some("int"),
        vec![
            Stmt::Synchronized(SyncStmt {
                locks: vec![name("a"), name("b")],
                body: vec![when(name("flag"), vec![ret(Some(num("1")))]), marker("inside")],
                span: sp(),
            }),
            ret(Some(num("0"))),
        ],
    );
    let units = [unit(None, vec![class("Pair", methods(vec![m]))])];

    let repo = analyze(&units).unwrap();
    let body = body(&repo, "Pair", "m");
    let slots = |exits: bool| -> Vec<u16> {
        body.code
            .iter()
            .map(|id| body.get(*id))
            .filter(|ins| matches!(ins, Ins::MonitorExit { .. }) == exits)
            .filter_map(|ins| monitor_slot(body, ins))
            .collect()
    };
    let enters = slots(false);
    assert_eq!(enters.len(), 2);
    let (a, b) = (enters[0], enters[1]);
    assert_ne!(a, b);
    // the return, the normal path and the exceptional path, each b then a
    assert_eq!(slots(true), vec![b, a, b, a, b, a]);

    let classes = compile(&units).unwrap();
    let class = parse(&classes["Pair"]);
    let code = code_of(&class, "m", "(Ljava/lang/Object;Ljava/lang/Object;Z)I");
    assert_eq!(offsets_of(&code, 0xc2).len(), 2);
    assert_eq!(offsets_of(&code, 0xc3).len(), 6);
}

#[test]
fn test_returns_in_try_and_catch_each_run_finally() {
    let m = static_method(
        "m",
        vec![param("flag", Some("boolean"))],
        Some("int"),
        vec![
            try_stmt(
                vec![when(name("flag"), vec![ret(Some(num("1")))]), marker("body")],
                Some("e"),
                vec![ret(Some(num("2")))],
                vec![marker("FIN")],
            ),
            ret(Some(num("0"))),
        ],
    );
    let units = [unit(None, vec![class("Both", methods(vec![m]))])];

    let repo = analyze(&units).unwrap();
    let body = body(&repo, "Both", "m");
    // two returns, the normal path and the exceptional path
    assert_eq!(copies(body, "FIN"), 4);
    let handler = body.exception_table.iter().find(|e| e.catch_type.is_some()).unwrap().handler;
    assert!(body.exception_table.iter().any(|e| e.catch_type.is_none() && e.start == handler));

    let classes = compile(&units).unwrap();
    let class = parse(&classes["Both"]);
    let code = code_of(&class, "m", "(Z)I");
    let finally_loads = string_loads(&class, &code, "FIN");
    assert_eq!(finally_loads.len(), 4);

    let (typed, untyped): (Vec<_>, Vec<_>) = code.exception_table.iter().partition(|e| e.catch_type != 0);
    assert!(!typed.is_empty());
    for t in &typed {
        // both the try segment and the catch body run under the finally
        assert!(untyped.iter().any(|u| covers(u, t.start_pc as usize)));
        assert!(untyped.iter().any(|u| covers(u, t.handler_pc as usize)));
    }
    for entry in &code.exception_table {
        assert!(entry.start_pc < entry.end_pc);
        for pc in &finally_loads {
            assert!(!covers(entry, *pc), "finally copy at {} inside range {}..{}", pc, entry.start_pc, entry.end_pc);
        }
    }
}

#[test]
fn test_for_each_loop_body_compiles() {
    let m = static_method(
        "count",
        vec![Param { ty: Some(array_ty("int", 1)), ..param("xs", None) }],
        Some("int"),
        vec![
            expr(var("total", Some("int"), Some(num("0")))),
            Stmt::For(ForStmt {
                name: "x".to_string(),
                iterable: name("xs"),
                body: vec![expr(Expr::Assign(AssignExpr {
                    target: Box::new(name("total")),
                    op: AssignOp::Add,
                    value: Box::new(num("1")),
                    span: sp(),
                }))],
                span: sp(),
            }),
            ret(Some(name("total"))),
        ],
    );
    let units = [unit(None, vec![class("Loops", methods(vec![m]))])];

    let repo = analyze(&units).unwrap();
    let body = body(&repo, "Loops", "count");
    let next_calls = count(body, |ins| match ins {
        Ins::Invoke { callee: ltc::ir::Callee::Method(m), .. } => repo.method(*m).name == "next",
        _ => false,
    });
    assert_eq!(next_calls, 1);

    let classes = compile(&units).unwrap();
    let class = parse(&classes["Loops"]);
    let code = code_of(&class, "count", "([I)I");
    // iadd
    assert!(code.code.contains(&0x60));
}

#[test]
fn test_for_each_over_object_uses_runtime_iterator() {
    let m = static_method(
        "walk",
        vec![param("items", None)],
        None,
        vec![Stmt::For(ForStmt { name: "x".to_string(), iterable: name("items"), body: vec![], span: sp() })],
    );
    let units = [unit(None, vec![class("Walker", methods(vec![m]))])];

    let repo = analyze(&units).unwrap();
    let body = body(&repo, "Walker", "walk");
    let iterator_calls = count(body, |ins| match ins {
        Ins::Invoke { callee: ltc::ir::Callee::Method(m), .. } => repo.method(*m).name == "iterator",
        _ => false,
    });
    assert_eq!(iterator_calls, 1);
    let has_next = count(body, |ins| match ins {
        Ins::Invoke { callee: ltc::ir::Callee::Method(m), .. } => repo.method(*m).name == "hasNext",
        _ => false,
    });
    assert_eq!(has_next, 1);
}

#[test]
fn test_while_loop_with_break_and_continue() {
    let m = static_method(
        "spin",
        vec![param("n", Some("int"))],
        None,
        vec![Stmt::While(WhileStmt {
            cond: boolean(true),
            body: vec![Stmt::If(IfStmt {
                branches: vec![
                    IfBranch {
                        cond: Some(binary(BinaryOp::Gt, name("n"), num("10"))),
                        body: vec![Stmt::Break(sp())],
                    },
                    IfBranch { cond: None, body: vec![Stmt::Continue(sp())] },
                ],
                span: sp(),
            })],
            do_while: false,
            span: sp(),
        })],
    );
    let units = [unit(None, vec![class("Spin", methods(vec![m]))])];

    let classes = compile(&units).unwrap();
    let class = parse(&classes["Spin"]);
    // goto
    let code = code_of(&class, "spin", "(I)Ljava/lang/Object;");
    assert!(code.code.contains(&0xa7));
}
