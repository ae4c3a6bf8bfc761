//! Statement lowering
//!
//! Control flow becomes `Nop` labels and conditional jumps in the statement
//! list. `finally` blocks and monitor exits are copied onto every path that
//! leaves the protected code: each return, each jump out of the region and
//! the exceptional path. The protected ranges in the exception table cover
//! only the code between those exits.

use std::collections::{HashMap, HashSet};

use crate::ast::{ForStmt, IfStmt, Stmt, SyncStmt, TryStmt, WhileStmt};
use crate::common::scope::Binding;
use crate::common::types::TypeId;
use crate::consts::{ITERATOR, OBJECT, THROWABLE};
use crate::error::{Error, LineCol, Result, SemanticErrorKind};
use crate::ir::{ExceptionEntry, Ins, InsId};

use super::lower::LoopLabels;
use super::Lowerer;

/// Code that must run whenever control leaves a protected region
pub(crate) enum Cleanup<'c> {
    Finally(&'c [Stmt]),
    /// Monitors entered in this order; released in reverse
    Monitors(Vec<Binding>),
}

/// First and last statement of a run of protected code
type Segment = (InsId, InsId);

impl Lowerer<'_, '_> {
    pub(crate) fn statements(&mut self, stmts: &[Stmt]) -> Result<()> {
        for stmt in stmts {
            self.statement(stmt)?;
        }
        Ok(())
    }

    pub(crate) fn statement(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Expr(e) => {
                let value = self.expr(e, None)?;
                self.place(value);
            }
            Stmt::If(s) => self.if_stmt(s)?,
            Stmt::While(s) => self.while_stmt(s)?,
            Stmt::For(s) => self.for_stmt(s)?,
            Stmt::Try(s) => self.try_stmt(s)?,
            Stmt::Synchronized(s) => self.sync_stmt(s)?,
            Stmt::Return(r) => {
                let pos = self.pos(r.span);
                let value = match (&r.value, self.return_type) {
                    (Some(_), TypeId::VOID) => {
                        return Err(Error::semantic(
                            SemanticErrorKind::TypeMismatch,
                            "cannot return a value from a void method",
                            &pos,
                        ))
                    }
                    (Some(v), ty) => Some(self.expr(v, Some(ty))?),
                    (None, TypeId::VOID) => None,
                    (None, ty) => {
                        let zero = self.default_value(ty, &pos);
                        Some(self.cast(zero, ty, &pos)?)
                    }
                };
                self.emit(Ins::Return { value }, &pos);
            }
            Stmt::Throw(t) => {
                let pos = self.pos(t.span);
                let throwable = self.well_known(THROWABLE)?;
                let value = self.expr(&t.value, Some(throwable))?;
                self.emit(Ins::Throw { value }, &pos);
            }
            Stmt::Break(span) | Stmt::Continue(span) => {
                let pos = self.pos(*span);
                let Some(labels) = self.loops.last().copied() else {
                    return Err(Error::unexpected("`break` or `continue` outside a loop", &pos));
                };
                let target = if matches!(stmt, Stmt::Break(_)) { labels.end } else { labels.cont };
                self.emit(Ins::Goto { target }, &pos);
            }
            Stmt::Pass(_) => {}
            Stmt::MethodDef(decl) => self.inner_method(decl)?,
        }
        Ok(())
    }

    /// Statements in a nested block scope
    fn block(&mut self, stmts: &[Stmt]) -> Result<()> {
        self.scope.push();
        let result = self.statements(stmts);
        self.scope.pop();
        result
    }

    fn label(&mut self, pos: &LineCol) -> InsId {
        self.add(Ins::Nop, pos)
    }

    fn if_stmt(&mut self, s: &IfStmt) -> Result<()> {
        let pos = self.pos(s.span);
        let end = self.label(&pos);
        for branch in &s.branches {
            let next = self.label(&pos);
            if let Some(cond) = &branch.cond {
                let cond = self.expr(cond, Some(TypeId::BOOLEAN))?;
                self.emit(Ins::IfEq { cond, target: next }, &pos);
            }
            self.block(&branch.body)?;
            self.emit(Ins::Goto { target: end }, &pos);
            self.place(next);
        }
        self.place(end);
        Ok(())
    }

    fn while_stmt(&mut self, s: &WhileStmt) -> Result<()> {
        let pos = self.pos(s.span);
        let head = self.label(&pos);
        let end = self.label(&pos);
        self.place(head);
        if s.do_while {
            let cont = self.label(&pos);
            self.loops.push(LoopLabels { cont, end });
            let body = self.block(&s.body);
            self.loops.pop();
            body?;
            self.place(cont);
            let cond = self.expr(&s.cond, Some(TypeId::BOOLEAN))?;
            self.emit(Ins::IfNe { cond, target: head }, &pos);
        } else {
            let cond = self.expr(&s.cond, Some(TypeId::BOOLEAN))?;
            self.emit(Ins::IfEq { cond, target: end }, &pos);
            self.loops.push(LoopLabels { cont: head, end });
            let body = self.block(&s.body);
            self.loops.pop();
            body?;
            self.emit(Ins::Goto { target: head }, &pos);
        }
        self.place(end);
        Ok(())
    }

    /// `for x in iterable`: arrays, iterables, maps and everything else are
    /// turned into an iterator by the runtime
    fn for_stmt(&mut self, s: &ForStmt) -> Result<()> {
        let pos = self.pos(s.span);
        let iterable = self.expr(&s.iterable, None)?;
        let iterator = self.runtime_call("iterator", vec![iterable], &pos)?;
        let (it, store) = self.store_temp(iterator, &pos)?;
        self.place(store);

        let has_next = self.library_method(ITERATOR, "hasNext", 0)?;
        let next = self.library_method(ITERATOR, "next", 0)?;
        let object = self.well_known(OBJECT)?;
        let head = self.label(&pos);
        let end = self.label(&pos);
        self.place(head);
        let receiver = self.load(&it, &pos);
        let cond = self.library_call(has_next, Some(receiver), Vec::new(), &pos);
        self.emit(Ins::IfEq { cond, target: end }, &pos);

        self.scope.push();
        let element = self.bind_local(&s.name, object);
        let receiver = self.load(&it, &pos);
        let value = self.library_call(next, Some(receiver), Vec::new(), &pos);
        self.emit(Ins::Store { slot: element.slot, value, ty: object }, &pos);
        self.loops.push(LoopLabels { cont: head, end });
        let body = self.statements(&s.body);
        self.loops.pop();
        self.scope.pop();
        body?;

        self.emit(Ins::Goto { target: head }, &pos);
        self.place(end);
        Ok(())
    }

    fn run_cleanup(&mut self, cleanup: &Cleanup<'_>, pos: &LineCol) -> Result<()> {
        match cleanup {
            Cleanup::Finally(stmts) => self.block(stmts),
            Cleanup::Monitors(locks) => {
                for lock in locks.iter().rev() {
                    let value = self.load(lock, pos);
                    self.emit(Ins::MonitorExit { value }, pos);
                }
                Ok(())
            }
        }
    }

    /// Rewrites the statements from index `from` so that every exit runs
    /// `cleanup` first, and returns the runs of code between the exits.
    ///
    /// `return v` stores `v` while still protected, then runs the cleanup
    /// and returns the stored value. Jumps to labels outside the region run
    /// the cleanup before jumping. Ranges of nested regions recorded before
    /// the rewrite are split so they never cover an inserted cleanup copy.
    fn split_exits(&mut self, from: usize, cleanup: &Cleanup<'_>) -> Result<Vec<Segment>> {
        let region = self.body.code.split_off(from);
        let inside: HashSet<InsId> = region.iter().copied().collect();
        let mut segments = Vec::new();
        let mut open: Option<Segment> = None;
        // first inserted label and the exit it leads to
        let mut cuts: Vec<(InsId, InsId)> = Vec::new();

        for id in region {
            let pos = self.body.pos(id).clone();
            match self.body.get(id).clone() {
                Ins::Return { value: Some(value) } => {
                    let (tmp, store) = self.store_temp(value, &pos)?;
                    self.place(store);
                    segments.push(open.take().map_or((store, store), |(first, _)| (first, store)));
                    let label = self.emit(Ins::Nop, &pos);
                    self.run_cleanup(cleanup, &pos)?;
                    let stored = self.load(&tmp, &pos);
                    self.body.replace(id, Ins::Return { value: Some(stored) });
                    self.place(id);
                    cuts.push((label, id));
                }
                Ins::Return { value: None } => {
                    segments.extend(open.take());
                    let label = self.emit(Ins::Nop, &pos);
                    self.run_cleanup(cleanup, &pos)?;
                    self.place(id);
                    cuts.push((label, id));
                }
                Ins::Goto { target } if !inside.contains(&target) => {
                    segments.extend(open.take());
                    let label = self.emit(Ins::Nop, &pos);
                    self.run_cleanup(cleanup, &pos)?;
                    self.place(id);
                    cuts.push((label, id));
                }
                _ => {
                    self.place(id);
                    open = Some(open.map_or((id, id), |(first, _)| (first, id)));
                }
            }
        }
        segments.extend(open);
        self.exclude_cuts(from, &cuts);
        Ok(segments)
    }

    /// Splits every exception entry starting at or after `from` around the
    /// statement runs in `cuts`. Entries keep their table order, so nested
    /// handlers still come before the enclosing ones.
    fn exclude_cuts(&mut self, from: usize, cuts: &[(InsId, InsId)]) {
        if cuts.is_empty() {
            return;
        }
        let code = &self.body.code;
        let index: HashMap<InsId, usize> = code[from..].iter().enumerate().map(|(i, id)| (*id, from + i)).collect();
        let cuts: Vec<(usize, usize)> =
            cuts.iter().filter_map(|(label, exit)| Some((*index.get(label)?, *index.get(exit)?))).collect();

        let mut table = Vec::with_capacity(self.body.exception_table.len());
        for entry in std::mem::take(&mut self.body.exception_table) {
            let (Some(&start), Some(&end)) = (index.get(&entry.start), index.get(&entry.end)) else {
                table.push(entry);
                continue;
            };
            let mut pieces = Vec::new();
            let mut lo = start;
            for &(cut_start, cut_end) in &cuts {
                if cut_end < lo || cut_start > end {
                    continue;
                }
                if cut_start > lo {
                    pieces.push((lo, cut_start - 1));
                }
                lo = cut_end + 1;
            }
            if lo <= end {
                pieces.push((lo, end));
            }
            table.extend(pieces.into_iter().map(|(a, b)| ExceptionEntry { start: code[a], end: code[b], ..entry.clone() }));
        }
        self.body.exception_table = table;
    }

    /// Lowers `stmts` as a protected region starting with a label. Without a
    /// cleanup the whole region is one segment.
    fn protected(&mut self, stmts: &[Stmt], cleanup: Option<&Cleanup<'_>>, pos: &LineCol) -> Result<Vec<Segment>> {
        let from = self.body.code.len();
        self.emit(Ins::Nop, pos);
        self.block(stmts)?;
        match cleanup {
            Some(cleanup) => self.split_exits(from, cleanup),
            None => {
                let first = self.body.code[from];
                let last = self.body.code.last().copied().unwrap_or(first);
                Ok(vec![(first, last)])
            }
        }
    }

    fn try_stmt(&mut self, s: &TryStmt) -> Result<()> {
        let pos = self.pos(s.span);
        let throwable = self.well_known(THROWABLE)?;
        let finally = (!s.finally.is_empty()).then(|| Cleanup::Finally(&s.finally));
        let has_catch = s.catch_var.is_some() || !s.catch_body.is_empty();
        let end = self.label(&pos);
        let normal = self.label(&pos);
        let after_body = if finally.is_some() { normal } else { end };

        let try_segments = self.protected(&s.body, finally.as_ref(), &pos)?;
        self.emit(Ins::Goto { target: after_body }, &pos);

        let mut covered = try_segments.clone();
        if has_catch {
            let from = self.body.code.len();
            self.scope.push();
            let handler = match &s.catch_var {
                Some(name) => {
                    let binding = self.bind_local(name, throwable);
                    self.emit(Ins::ExStore { slot: binding.slot }, &pos)
                }
                None => self.emit(Ins::Pop, &pos),
            };
            let catch_body = self.statements(&s.catch_body);
            self.scope.pop();
            catch_body?;
            for (start, last) in &try_segments {
                self.body.exception_table.push(ExceptionEntry {
                    start: *start,
                    end: *last,
                    handler,
                    catch_type: Some(throwable),
                });
            }
            if let Some(cleanup) = &finally {
                covered.extend(self.split_exits(from, cleanup)?);
            }
        }

        let Some(cleanup) = finally else {
            self.place(end);
            return Ok(());
        };
        self.place(normal);
        self.run_cleanup(&cleanup, &pos)?;
        self.emit(Ins::Goto { target: end }, &pos);

        let name = self.scope.fresh_temp();
        let pending = self.bind_local(&name, throwable);
        let handler = self.emit(Ins::ExStore { slot: pending.slot }, &pos);
        self.run_cleanup(&cleanup, &pos)?;
        let rethrown = self.load(&pending, &pos);
        self.emit(Ins::Throw { value: rethrown }, &pos);
        for (start, last) in covered {
            self.body.exception_table.push(ExceptionEntry { start, end: last, handler, catch_type: None });
        }
        self.place(end);
        log::trace!("{}: try with {} protected segments", pos, self.body.exception_table.len());
        Ok(())
    }

    fn sync_stmt(&mut self, s: &SyncStmt) -> Result<()> {
        let pos = self.pos(s.span);
        let mut locks = Vec::with_capacity(s.locks.len());
        for lock in &s.locks {
            let value = self.expr(lock, None)?;
            let value = self.to_reference(value, &pos)?;
            let (binding, store) = self.store_temp(value, &pos)?;
            self.place(store);
            let held = self.load(&binding, &pos);
            self.emit(Ins::MonitorEnter { value: held }, &pos);
            locks.push(binding);
        }
        let cleanup = Cleanup::Monitors(locks);
        let end = self.label(&pos);

        let segments = self.protected(&s.body, Some(&cleanup), &pos)?;
        self.emit(Ins::Nop, &pos);
        self.run_cleanup(&cleanup, &pos)?;
        self.emit(Ins::Goto { target: end }, &pos);

        let throwable = self.well_known(THROWABLE)?;
        let name = self.scope.fresh_temp();
        let pending = self.bind_local(&name, throwable);
        let handler = self.emit(Ins::ExStore { slot: pending.slot }, &pos);
        self.run_cleanup(&cleanup, &pos)?;
        let rethrown = self.load(&pending, &pos);
        self.emit(Ins::Throw { value: rethrown }, &pos);
        for (start, last) in segments {
            self.body.exception_table.push(ExceptionEntry { start, end: last, handler, catch_type: None });
        }
        self.place(end);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{Expr, Literal, LiteralExpr, ReturnStmt, Span};
    use crate::ir::Constant;
    use crate::wash::lower::tests::with_lowerer;

    use super::*;

    fn text(s: &str) -> Stmt {
        Stmt::Expr(Expr::Literal(LiteralExpr { value: Literal::String(s.to_string()), span: Span::default() }))
    }

    fn bare_return() -> Stmt {
        Stmt::Return(ReturnStmt { value: None, span: Span::default() })
    }

    fn copies(lw: &Lowerer<'_, '_>, marker: &str) -> usize {
        lw.body.count_reachable(|ins| matches!(ins, Ins::Const { value: Constant::String(s), .. } if s == marker))
    }

    #[test]
    fn test_finally_runs_on_every_exit() {
        with_lowerer(|lw| {
            let stmt = Stmt::Try(TryStmt {
                body: vec![text("body"), bare_return()],
                catch_var: None,
                catch_body: vec![],
                finally: vec![text("done")],
                span: Span::default(),
            });
            lw.statement(&stmt).unwrap();
            // the return, the normal path and the exceptional path
            assert_eq!(copies(lw, "done"), 3);
            assert_eq!(lw.body.exception_table.len(), 1);
            assert_eq!(lw.body.exception_table[0].catch_type, None);
        });
    }

    #[test]
    fn test_catch_is_covered_by_finally() {
        with_lowerer(|lw| {
            let stmt = Stmt::Try(TryStmt {
                body: vec![text("body")],
                catch_var: Some("e".into()),
                catch_body: vec![text("caught")],
                finally: vec![text("done")],
                span: Span::default(),
            });
            lw.statement(&stmt).unwrap();
            assert_eq!(copies(lw, "done"), 2);
            let table = &lw.body.exception_table;
            assert_eq!(table.len(), 3);
            assert!(table[0].catch_type.is_some());
            assert!(matches!(lw.body.get(table[0].handler), Ins::ExStore { .. }));
            assert!(table[1..].iter().all(|e| e.catch_type.is_none()));
        });
    }

    #[test]
    fn test_break_out_of_try_runs_finally() {
        with_lowerer(|lw| {
            let cond = Expr::Literal(LiteralExpr { value: Literal::Bool(true), span: Span::default() });
            let stmt = Stmt::While(WhileStmt {
                cond,
                body: vec![Stmt::Try(TryStmt {
                    body: vec![Stmt::Break(Span::default())],
                    catch_var: None,
                    catch_body: vec![],
                    finally: vec![text("done")],
                    span: Span::default(),
                })],
                do_while: false,
                span: Span::default(),
            });
            lw.statement(&stmt).unwrap();
            assert_eq!(copies(lw, "done"), 3);
        });
    }

    #[test]
    fn test_monitors_released_on_every_exit() {
        with_lowerer(|lw| {
            let lock = Expr::Literal(LiteralExpr { value: Literal::String("lock".into()), span: Span::default() });
            let stmt = Stmt::Synchronized(SyncStmt { locks: vec![lock], body: vec![bare_return()], span: Span::default() });
            lw.statement(&stmt).unwrap();
            assert_eq!(lw.body.count_reachable(|ins| matches!(ins, Ins::MonitorEnter { .. })), 1);
            assert_eq!(lw.body.count_reachable(|ins| matches!(ins, Ins::MonitorExit { .. })), 3);
        });
    }

    #[test]
    fn test_nested_ranges_skip_outer_cleanup() {
        with_lowerer(|lw| {
            let inner = Stmt::Try(TryStmt {
                body: vec![text("body"), bare_return(), text("after")],
                catch_var: Some("e".into()),
                catch_body: vec![text("caught")],
                finally: vec![],
                span: Span::default(),
            });
            let stmt = Stmt::Try(TryStmt {
                body: vec![inner],
                catch_var: None,
                catch_body: vec![],
                finally: vec![text("done")],
                span: Span::default(),
            });
            lw.statement(&stmt).unwrap();

            let code = &lw.body.code;
            let index = |id: InsId| code.iter().position(|c| *c == id).unwrap();
            let cleanup: Vec<usize> = (0..code.len())
                .filter(|i| matches!(lw.body.get(code[*i]), Ins::Const { value: Constant::String(s), .. } if s == "done"))
                .collect();
            assert_eq!(cleanup.len(), 3);
            // the inner range is split around the copy on the return path
            let typed: Vec<_> = lw.body.exception_table.iter().filter(|e| e.catch_type.is_some()).collect();
            assert_eq!(typed.len(), 2);
            for entry in lw.body.exception_table.iter() {
                let (start, end) = (index(entry.start), index(entry.end));
                assert!(start <= end);
                assert!(cleanup.iter().all(|i| *i < start || *i > end));
            }
        });
    }

    #[test]
    fn test_break_outside_loop() {
        with_lowerer(|lw| {
            let err = lw.statement(&Stmt::Break(Span::default())).unwrap_err();
            assert!(matches!(err, Error::UnexpectedConstruct { .. }));
        });
    }

    #[test]
    fn test_value_returned_from_void_method() {
        with_lowerer(|lw| {
            let stmt = Stmt::Return(ReturnStmt { value: Some(text_expr("x")), span: Span::default() });
            let err = lw.statement(&stmt).unwrap_err();
            assert_eq!(err.semantic_kind(), Some(SemanticErrorKind::TypeMismatch));
        });
    }

    fn text_expr(s: &str) -> Expr {
        Expr::Literal(LiteralExpr { value: Literal::String(s.to_string()), span: Span::default() })
    }
}
