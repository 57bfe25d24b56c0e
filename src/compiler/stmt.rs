//! Statements and control flow

use super::pattern::BindKind;
use super::{BlockEnv, Compiler, ScopeId};
use crate::ast::{
    BlockStatement, CatchClause, ExportKind, ForInLeft, ForInStatement, ForInit, ForOfStatement,
    ForStatement, LabeledStatement, Pattern, Span, Statement, SwitchStatement, TryStatement,
    VariableDeclaration, VariableKind,
};
use crate::atom::{atoms, Atom};
use crate::bytecode::{LabelId, Opcode, TempOpcode};
use crate::error::{Error, Result};
use crate::value::VarKind;

/// Where a `break` or `continue` goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Jump {
    Break,
    Continue,
}

impl Compiler<'_> {
    pub(crate) fn compile_statement(&mut self, stmt: &Statement) -> Result<()> {
        self.compile_labeled_statement(stmt, Vec::new())
    }

    fn compile_labeled_statement(&mut self, stmt: &Statement, labels: Vec<Atom>) -> Result<()> {
        self.set_location(stmt.span());
        match stmt {
            Statement::Empty(_) | Statement::Debugger(_) | Statement::FunctionDeclaration(_) => Ok(()),
            Statement::Expression(s) => {
                self.compile_expr(&s.expression)?;
                match self.fd().eval_ret {
                    Some(ret) => self.emit_op_u16(Opcode::PutLoc, ret as u16),
                    None => self.emit(Opcode::Drop),
                }
                Ok(())
            }
            Statement::Block(b) => self.compile_block(b),
            Statement::VariableDeclaration(d) => self.compile_var_decl(d),
            Statement::If(s) => {
                self.set_eval_ret_undefined();
                let else_label = self.new_label();
                self.compile_expr(&s.test)?;
                self.emit_goto(Opcode::IfFalse, else_label);
                self.compile_statement(&s.consequent)?;
                match &s.alternate {
                    Some(alt) => {
                        let end = self.new_label();
                        self.emit_goto(Opcode::Goto, end);
                        self.emit_label(else_label);
                        self.compile_statement(alt)?;
                        self.emit_label(end);
                    }
                    None => self.emit_label(else_label),
                }
                Ok(())
            }
            Statement::While(s) => {
                self.set_eval_ret_undefined();
                let (top, brk) = (self.new_label(), self.new_label());
                self.push_env(labels, Some(brk), Some(top), 0);
                self.emit_label(top);
                self.compile_expr(&s.test)?;
                self.emit_goto(Opcode::IfFalse, brk);
                self.compile_statement(&s.body)?;
                self.emit_goto(Opcode::Goto, top);
                self.emit_label(brk);
                self.pop_env();
                Ok(())
            }
            Statement::DoWhile(s) => {
                self.set_eval_ret_undefined();
                let (top, cont, brk) = (self.new_label(), self.new_label(), self.new_label());
                self.push_env(labels, Some(brk), Some(cont), 0);
                self.emit_label(top);
                self.compile_statement(&s.body)?;
                self.emit_label(cont);
                self.compile_expr(&s.test)?;
                self.emit_goto(Opcode::IfTrue, top);
                self.emit_label(brk);
                self.pop_env();
                Ok(())
            }
            Statement::For(s) => self.compile_for(s, labels),
            Statement::ForIn(s) => self.compile_for_in(s, labels),
            Statement::ForOf(s) => self.compile_for_of(s, labels),
            Statement::Switch(s) => self.compile_switch(s, labels),
            Statement::Break(s) => {
                let label = s.label.as_ref().map(|l| self.intern(&l.name));
                self.compile_jump(Jump::Break, label, s.span)
            }
            Statement::Continue(s) => {
                let label = s.label.as_ref().map(|l| self.intern(&l.name));
                self.compile_jump(Jump::Continue, label, s.span)
            }
            Statement::Return(s) => {
                if self.fd().is_top_level() {
                    return Err(Error::invalid_context("return outside of a function", Self::loc(s.span)));
                }
                match &s.argument {
                    Some(arg) => self.compile_expr(arg)?,
                    None => self.emit(Opcode::Undefined),
                }
                self.emit_return_cleanup();
                self.emit_return(true)
            }
            Statement::Throw(s) => {
                self.compile_expr(&s.argument)?;
                self.emit(Opcode::Throw);
                Ok(())
            }
            Statement::Try(s) => self.compile_try(s),
            Statement::Labeled(s) => self.compile_labeled(s, labels),
            Statement::With(s) => {
                if self.fd().strict {
                    return Err(Error::invalid_context("with statement in strict mode", Self::loc(s.span)));
                }
                self.set_eval_ret_undefined();
                self.compile_expr(&s.object)?;
                self.emit(Opcode::ToObject);
                let scope = self.push_block_scope();
                self.fd_mut().scopes.add_scope_var(atoms::_with_, VarKind::Normal, false, false);
                self.emit_scope_op(TempOpcode::ScopePutVarInit, atoms::_with_);
                self.compile_statement(&s.body)?;
                self.pop_block_scope(scope);
                Ok(())
            }
            Statement::ClassDeclaration(c) => {
                let Some(id) = &c.id else {
                    return Err(Error::invalid_context("class declaration without a name", Self::loc(c.span)));
                };
                let name = self.intern(&id.name);
                self.compile_class(c, name)?;
                self.emit_scope_op(TempOpcode::ScopePutVarInit, name);
                Ok(())
            }
            Statement::Import(d) => {
                if self.module.is_none() {
                    return Err(Error::invalid_context("import declaration outside of a module", Self::loc(d.span)));
                }
                Ok(())
            }
            Statement::Export(e) => {
                if self.module.is_none() || !self.fd().is_module {
                    return Err(Error::invalid_context("export declaration outside of a module", Self::loc(e.span)));
                }
                self.compile_export(&e.kind, e.span)
            }
        }
    }

    /// Completion value of loops and branches in scripts starts as undefined
    fn set_eval_ret_undefined(&mut self) {
        if let Some(ret) = self.fd().eval_ret {
            self.emit(Opcode::Undefined);
            self.emit_op_u16(Opcode::PutLoc, ret as u16);
        }
    }

    // ========== Scopes and jump targets ==========

    pub(crate) fn push_block_scope(&mut self) -> ScopeId {
        let scope = self.fd_mut().scopes.push_scope();
        self.emit_op_u16(TempOpcode::EnterScope, scope as u16);
        scope
    }

    pub(crate) fn pop_block_scope(&mut self, scope: ScopeId) {
        self.emit_op_u16(TempOpcode::LeaveScope, scope as u16);
        self.fd_mut().scopes.pop_scope();
    }

    pub(crate) fn compile_block(&mut self, block: &BlockStatement) -> Result<()> {
        let scope = self.push_block_scope();
        self.hoist_block(&block.body, false)?;
        for stmt in &block.body {
            self.compile_statement(stmt)?;
        }
        self.pop_block_scope(scope);
        Ok(())
    }

    fn push_env(&mut self, labels: Vec<Atom>, brk: Option<LabelId>, cont: Option<LabelId>, drop_count: u32) {
        let scope = self.fd().scopes.current();
        self.fd_mut().block_envs.push(BlockEnv {
            label_names: labels,
            break_label: brk,
            continue_label: cont,
            drop_count,
            scope,
            is_loop_or_switch: brk.is_some(),
            ..BlockEnv::default()
        });
    }

    pub(crate) fn push_block_env(&mut self, env: BlockEnv) {
        self.fd_mut().block_envs.push(env);
    }

    pub(crate) fn pop_env(&mut self) {
        self.fd_mut().block_envs.pop();
    }

    /// Close captured variables of the scopes between the current one and
    /// `target`
    fn emit_leave_scopes(&mut self, target: ScopeId) {
        let mut scope = self.fd().scopes.current();
        while scope != target {
            self.emit_op_u16(TempOpcode::LeaveScope, scope as u16);
            match self.fd().scopes.parent(scope) {
                Some(p) => scope = p,
                None => break,
            }
        }
    }

    /// Release what `env` holds on the stack when control leaves it
    fn emit_env_exit(&mut self, env: &BlockEnv) {
        if env.has_iterator {
            self.emit(Opcode::IteratorClose);
        } else {
            for _ in 0..env.drop_count {
                self.emit(Opcode::Drop);
            }
        }
        if let Some(finally) = env.finally_label {
            self.emit(Opcode::Undefined);
            self.emit_goto(Opcode::Gosub, finally);
            self.emit(Opcode::Drop);
        }
    }

    fn compile_jump(&mut self, kind: Jump, label: Option<Atom>, span: Span) -> Result<()> {
        let envs = self.fd().block_envs.clone();
        let target = envs.iter().rposition(|env| match (kind, label) {
            (Jump::Break, Some(l)) => env.label_names.contains(&l),
            (Jump::Break, None) => env.is_loop_or_switch,
            (Jump::Continue, Some(l)) => env.label_names.contains(&l) && env.continue_label.is_some(),
            (Jump::Continue, None) => env.continue_label.is_some(),
        });
        let Some(target) = target else {
            let what = match (kind, label) {
                (_, Some(l)) => format!("undefined label '{}'", self.atoms.display_name(l)),
                (Jump::Break, None) => "break outside of a loop or switch".to_string(),
                (Jump::Continue, None) => "continue outside of a loop".to_string(),
            };
            return Err(Error::invalid_context(what, Self::loc(span)));
        };
        for env in envs[target + 1..].iter().rev() {
            self.emit_env_exit(env);
        }
        let env = &envs[target];
        self.emit_leave_scopes(env.scope);
        let dest = match kind {
            Jump::Break => env.break_label,
            Jump::Continue => env.continue_label,
        };
        let dest = dest.ok_or_else(|| Error::internal("jump target without a label"))?;
        self.emit_goto(Opcode::Goto, dest);
        Ok(())
    }

    /// Unwind every construct with the return value on top of the stack
    pub(crate) fn emit_return_cleanup(&mut self) {
        let envs = self.fd().block_envs.clone();
        for env in envs.iter().rev() {
            if env.has_iterator {
                self.emit(Opcode::Insert4);
                self.emit(Opcode::Drop);
                self.emit(Opcode::IteratorClose);
            } else {
                for _ in 0..env.drop_count {
                    self.emit(Opcode::Nip);
                }
            }
            if let Some(finally) = env.finally_label {
                self.emit_goto(Opcode::Gosub, finally);
            }
        }
    }

    /// Return from the current function, the value on top of the stack
    /// when `has_value`
    pub(crate) fn emit_return(&mut self, has_value: bool) -> Result<()> {
        let (derived, kind) = (self.fd().is_derived_constructor, self.fd().kind);
        if derived {
            let done = self.new_label();
            if has_value {
                self.emit(Opcode::CheckCtorReturn);
                self.emit_goto(Opcode::IfFalse, done);
                self.emit(Opcode::Drop);
            }
            self.emit_scope_op(TempOpcode::ScopeGetVarCheckthis, atoms::this);
            self.emit_label(done);
            self.emit(Opcode::Return);
        } else if kind.is_async() || kind.is_generator() {
            if !has_value {
                self.emit(Opcode::Undefined);
            }
            self.emit(Opcode::ReturnAsync);
        } else if has_value {
            self.emit(Opcode::Return);
        } else {
            self.emit(Opcode::ReturnUndef);
        }
        Ok(())
    }

    // ========== Declarations ==========

    fn compile_var_decl(&mut self, decl: &VariableDeclaration) -> Result<()> {
        let kind = if decl.kind.is_lexical() {
            BindKind::Lexical
        } else {
            BindKind::Var
        };
        for d in &decl.declarations {
            self.set_location(d.span);
            match (&d.id, &d.init) {
                (Pattern::Identifier(id), Some(init)) => {
                    let name = self.intern(&id.name);
                    self.compile_expr_named(init, Some(name))?;
                    self.destructure(&d.id, kind)?;
                }
                (pattern, Some(init)) => {
                    self.compile_expr(init)?;
                    self.destructure(pattern, kind)?;
                }
                (Pattern::Identifier(id), None) => match decl.kind {
                    VariableKind::Var => {}
                    VariableKind::Let => {
                        let name = self.intern(&id.name);
                        self.emit(Opcode::Undefined);
                        self.emit_scope_op(TempOpcode::ScopePutVarInit, name);
                    }
                    VariableKind::Const => {
                        return Err(Error::invalid_context("missing initializer in const declaration", Self::loc(d.span)))
                    }
                },
                (pattern, None) => {
                    return Err(Error::invalid_context(
                        "missing initializer in destructuring declaration",
                        Self::loc(pattern.span()),
                    ))
                }
            }
        }
        Ok(())
    }

    /// Declare the lexical names of a loop head in the current scope
    fn declare_loop_head(&mut self, decl: &VariableDeclaration) {
        if !decl.kind.is_lexical() {
            return;
        }
        for d in &decl.declarations {
            for id in d.id.bound_names() {
                let name = self.intern(&id.name);
                self.fd_mut()
                    .scopes
                    .add_scope_var(name, VarKind::Normal, true, decl.kind == VariableKind::Const);
            }
        }
    }

    // ========== Loops ==========

    fn compile_for(&mut self, s: &ForStatement, labels: Vec<Atom>) -> Result<()> {
        self.set_eval_ret_undefined();
        let scope = self.push_block_scope();
        let mut per_iteration = false;
        match &s.init {
            Some(ForInit::Declaration(d)) => {
                self.declare_loop_head(d);
                per_iteration = d.kind.is_lexical();
                self.compile_var_decl(d)?;
            }
            Some(ForInit::Expression(e)) => {
                self.compile_expr(e)?;
                self.emit(Opcode::Drop);
            }
            None => {}
        }
        let (test, cont, brk) = (self.new_label(), self.new_label(), self.new_label());
        self.push_env(labels, Some(brk), Some(cont), 0);
        self.emit_label(test);
        if let Some(t) = &s.test {
            self.compile_expr(t)?;
            self.emit_goto(Opcode::IfFalse, brk);
        }
        self.compile_statement(&s.body)?;
        self.emit_label(cont);
        if per_iteration {
            // fresh bindings for closures created by the next iteration
            self.emit_op_u16(TempOpcode::LeaveScope, scope as u16);
        }
        if let Some(u) = &s.update {
            self.compile_expr(u)?;
            self.emit(Opcode::Drop);
        }
        self.emit_goto(Opcode::Goto, test);
        self.emit_label(brk);
        self.pop_env();
        self.pop_block_scope(scope);
        Ok(())
    }

    /// Store the loop value on top of the stack into the loop head
    fn bind_loop_head(&mut self, left: &ForInLeft) -> Result<()> {
        match left {
            ForInLeft::Declaration(d) => {
                let Some(first) = d.declarations.first() else {
                    return Err(Error::internal("empty loop head declaration"));
                };
                let kind = if d.kind.is_lexical() {
                    BindKind::Lexical
                } else {
                    BindKind::Var
                };
                self.destructure(&first.id, kind)
            }
            ForInLeft::Pattern(p) => self.destructure(p, BindKind::Assign),
        }
    }

    fn head_scope(&mut self, left: &ForInLeft) -> Option<ScopeId> {
        match left {
            ForInLeft::Declaration(d) if d.kind.is_lexical() => {
                let scope = self.push_block_scope();
                self.declare_loop_head(d);
                Some(scope)
            }
            _ => None,
        }
    }

    fn compile_for_in(&mut self, s: &ForInStatement, labels: Vec<Atom>) -> Result<()> {
        self.set_eval_ret_undefined();
        let scope = self.head_scope(&s.left);
        self.compile_expr(&s.right)?;
        self.emit(Opcode::ForInStart);
        let (body, next, brk) = (self.new_label(), self.new_label(), self.new_label());
        self.emit_goto(Opcode::Goto, next);
        self.push_env(labels, Some(brk), Some(next), 1);
        self.emit_label(body);
        self.bind_loop_head(&s.left)?;
        self.compile_statement(&s.body)?;
        self.emit_label(next);
        self.emit(Opcode::ForInNext);
        self.emit_goto(Opcode::IfFalse, body);
        self.emit(Opcode::Drop);
        self.emit_label(brk);
        self.emit(Opcode::Drop);
        self.pop_env();
        if let Some(scope) = scope {
            self.pop_block_scope(scope);
        }
        Ok(())
    }

    fn compile_for_of(&mut self, s: &ForOfStatement, labels: Vec<Atom>) -> Result<()> {
        if s.is_await && !self.fd().kind.is_async() {
            return Err(Error::invalid_context("for await outside of an async function", Self::loc(s.span)));
        }
        self.set_eval_ret_undefined();
        let scope = self.head_scope(&s.left);
        self.compile_expr(&s.right)?;
        self.emit(if s.is_await {
            Opcode::ForAwaitOfStart
        } else {
            Opcode::ForOfStart
        });
        let (body, next, brk) = (self.new_label(), self.new_label(), self.new_label());
        self.emit_goto(Opcode::Goto, next);
        let cur_scope = self.fd().scopes.current();
        self.push_block_env(BlockEnv {
            label_names: labels,
            break_label: Some(brk),
            continue_label: Some(next),
            drop_count: 3,
            has_iterator: true,
            scope: cur_scope,
            is_loop_or_switch: true,
            ..BlockEnv::default()
        });
        self.emit_label(body);
        self.bind_loop_head(&s.left)?;
        self.compile_statement(&s.body)?;
        self.emit_label(next);
        if s.is_await {
            self.emit_for_await_next();
        } else {
            self.emit(Opcode::ForOfNext);
            self.emit_u8(0);
        }
        self.emit_goto(Opcode::IfFalse, body);
        self.emit(Opcode::Drop);
        self.emit_label(brk);
        self.emit(Opcode::IteratorClose);
        self.pop_env();
        if let Some(scope) = scope {
            self.pop_block_scope(scope);
        }
        Ok(())
    }

    fn compile_switch(&mut self, s: &SwitchStatement, labels: Vec<Atom>) -> Result<()> {
        self.set_eval_ret_undefined();
        self.compile_expr(&s.discriminant)?;
        let scope = self.push_block_scope();
        for case in &s.cases {
            self.hoist_block(&case.consequent, false)?;
        }
        let brk = self.new_label();
        self.push_env(labels, Some(brk), None, 1);

        let case_labels: Vec<LabelId> = s.cases.iter().map(|_| self.new_label()).collect();
        let mut default = None;
        for (case, &label) in s.cases.iter().zip(&case_labels) {
            match &case.test {
                Some(test) => {
                    self.set_location(case.span);
                    self.emit(Opcode::Dup);
                    self.compile_expr(test)?;
                    self.emit(Opcode::StrictEq);
                    self.emit_goto(Opcode::IfTrue, label);
                }
                None => default = Some(label),
            }
        }
        self.emit_goto(Opcode::Goto, default.unwrap_or(brk));

        for (case, &label) in s.cases.iter().zip(&case_labels) {
            self.emit_label(label);
            for stmt in &case.consequent {
                self.compile_statement(stmt)?;
            }
        }
        self.emit_label(brk);
        self.emit(Opcode::Drop);
        self.pop_env();
        self.pop_block_scope(scope);
        Ok(())
    }

    fn compile_labeled(&mut self, s: &LabeledStatement, mut labels: Vec<Atom>) -> Result<()> {
        let name = self.intern(&s.label.name);
        if labels.contains(&name) || self.fd().block_envs.iter().any(|e| e.label_names.contains(&name)) {
            return Err(Error::invalid_context(
                format!("duplicate label '{}'", s.label.name),
                Self::loc(s.span),
            ));
        }
        labels.push(name);
        match &s.body {
            body @ (Statement::While(_)
            | Statement::DoWhile(_)
            | Statement::For(_)
            | Statement::ForIn(_)
            | Statement::ForOf(_)
            | Statement::Switch(_)
            | Statement::Labeled(_)) => self.compile_labeled_statement(body, labels),
            body => {
                let brk = self.new_label();
                self.push_env(labels, None, None, 0);
                if let Some(env) = self.fd_mut().block_envs.last_mut() {
                    env.break_label = Some(brk);
                }
                self.compile_statement(body)?;
                self.emit_label(brk);
                self.pop_env();
                Ok(())
            }
        }
    }

    // ========== Exceptions ==========

    fn compile_try(&mut self, s: &TryStatement) -> Result<()> {
        self.set_eval_ret_undefined();
        let (catch_label, end) = (self.new_label(), self.new_label());
        let finally = s.finalizer.as_ref().map(|_| self.new_label());
        let scope = self.fd().scopes.current();
        let protected = |finally| BlockEnv {
            drop_count: 1,
            finally_label: finally,
            scope,
            ..BlockEnv::default()
        };

        self.emit_goto(Opcode::Catch, catch_label);
        self.push_block_env(protected(finally));
        self.compile_block(&s.block)?;
        self.pop_env();
        self.emit(Opcode::Drop);
        self.emit_finally_call(finally);
        self.emit_goto(Opcode::Goto, end);

        self.emit_label(catch_label);
        match &s.handler {
            Some(handler) => {
                let rethrow = self.new_label();
                if finally.is_some() {
                    // the handler itself must run the finalizer when it throws
                    self.compile_catch_param(handler)?;
                    self.emit_goto(Opcode::Catch, rethrow);
                    self.push_block_env(protected(finally));
                    self.compile_block(&handler.body)?;
                    self.pop_env();
                    self.pop_catch_scope();
                    self.emit(Opcode::Drop);
                    self.emit_finally_call(finally);
                    self.emit_goto(Opcode::Goto, end);
                    self.emit_label(rethrow);
                    self.emit_finally_call(finally);
                    self.emit(Opcode::Throw);
                } else {
                    self.compile_catch_param(handler)?;
                    self.compile_block(&handler.body)?;
                    self.pop_catch_scope();
                    self.emit_goto(Opcode::Goto, end);
                }
            }
            None => {
                self.emit_finally_call(finally);
                self.emit(Opcode::Throw);
            }
        }

        if let (Some(label), Some(body)) = (finally, &s.finalizer) {
            self.emit_label(label);
            let saved_ret = self.fd().eval_ret;
            // a finalizer does not change the completion value
            self.fd_mut().eval_ret = None;
            self.push_block_env(BlockEnv {
                drop_count: 2,
                scope,
                ..BlockEnv::default()
            });
            let result = self.compile_block(body);
            self.pop_env();
            self.fd_mut().eval_ret = saved_ret;
            result?;
            self.emit(Opcode::Ret);
        }
        self.emit_label(end);
        Ok(())
    }

    /// Run the finalizer, if any, keeping the stack depth of the call site
    fn emit_finally_call(&mut self, finally: Option<LabelId>) {
        if let Some(label) = finally {
            self.emit(Opcode::Undefined);
            self.emit_goto(Opcode::Gosub, label);
            self.emit(Opcode::Drop);
        }
    }

    /// Bind the exception on top of the stack in a fresh scope
    fn compile_catch_param(&mut self, handler: &CatchClause) -> Result<()> {
        self.fd_mut().scopes.push_scope();
        let scope = self.fd().scopes.current();
        self.emit_op_u16(TempOpcode::EnterScope, scope as u16);
        match &handler.param {
            Some(param) => {
                for id in param.bound_names() {
                    let name = self.intern(&id.name);
                    self.fd_mut().scopes.add_scope_var(name, VarKind::Catch, true, false);
                }
                self.destructure(param, BindKind::Lexical)
            }
            None => {
                self.emit(Opcode::Drop);
                Ok(())
            }
        }
    }

    fn pop_catch_scope(&mut self) {
        let scope = self.fd().scopes.current();
        self.pop_block_scope(scope);
    }

    // ========== Modules ==========

    fn compile_export(&mut self, kind: &ExportKind, span: Span) -> Result<()> {
        let loc = Self::loc(span);
        match kind {
            ExportKind::Named { specifiers, source: None } => {
                for spec in specifiers {
                    let local = self.intern(&spec.local);
                    let exported = self.intern(&spec.exported);
                    self.add_local_export(local, exported, Self::loc(spec.span))?;
                }
            }
            ExportKind::Named {
                specifiers,
                source: Some(source),
            } => {
                for spec in specifiers {
                    let local = self.intern(&spec.local);
                    let exported = self.intern(&spec.exported);
                    self.add_indirect_export(source, local, exported)?;
                }
            }
            ExportKind::Default(expr) => {
                self.compile_expr_named(expr, Some(atoms::default))?;
                self.emit_scope_op(TempOpcode::ScopePutVarInit, atoms::_default_);
                self.add_local_export(atoms::_default_, atoms::default, loc)?;
            }
            ExportKind::DefaultDeclaration(decl) => match decl.as_ref() {
                Statement::FunctionDeclaration(f) => {
                    let binding = match &f.id {
                        Some(id) => self.intern(&id.name),
                        None => atoms::_default_,
                    };
                    self.add_local_export(binding, atoms::default, loc)?;
                }
                Statement::ClassDeclaration(c) => {
                    let (binding, name) = match &c.id {
                        Some(id) => {
                            let a = self.intern(&id.name);
                            (a, a)
                        }
                        None => (atoms::_default_, atoms::default),
                    };
                    self.compile_class(c, name)?;
                    self.emit_scope_op(TempOpcode::ScopePutVarInit, binding);
                    self.add_local_export(binding, atoms::default, loc)?;
                }
                other => return Err(Error::unsupported("default export declaration", Self::loc(other.span()))),
            },
            ExportKind::Declaration(decl) => {
                self.compile_statement(decl)?;
                for name in declared_names(decl) {
                    let atom = self.intern(&name);
                    self.add_local_export(atom, atom, loc)?;
                }
            }
            ExportKind::All { source } => self.add_star_export(source)?,
            ExportKind::AllAs { exported, source } => {
                let exported = self.intern(exported);
                self.add_indirect_export(source, atoms::_star_, exported)?;
            }
        }
        Ok(())
    }
}

/// Names bound by an exported declaration
fn declared_names(stmt: &Statement) -> Vec<String> {
    match stmt {
        Statement::VariableDeclaration(d) => d
            .declarations
            .iter()
            .flat_map(|decl| decl.id.bound_names().into_iter().map(|id| id.name.clone()))
            .collect(),
        Statement::FunctionDeclaration(f) => f.id.iter().map(|id| id.name.clone()).collect(),
        Statement::ClassDeclaration(c) => c.id.iter().map(|id| id.name.clone()).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expression, Identifier, Program, VariableDeclarator};

    fn let_decl(name: &str, init: Option<Expression>) -> Statement {
        Statement::VariableDeclaration(VariableDeclaration {
            kind: VariableKind::Let,
            declarations: vec![VariableDeclarator {
                id: Pattern::ident(name),
                init,
                span: Span::default(),
            }],
            span: Span::default(),
        })
    }

    #[test]
    fn test_declared_names_of_export() {
        let stmt = let_decl("a", Some(Expression::number(1.0)));
        assert_eq!(declared_names(&stmt), vec!["a".to_string()]);
    }

    #[test]
    fn test_unlabeled_break_outside_loop_fails() {
        let mut atoms = crate::atom::AtomTable::new();
        let program = Program::script(vec![Statement::Break(crate::ast::BreakStatement {
            label: None,
            span: Span::line(3),
        })]);
        let err = crate::compiler::compile(&program, &mut atoms, &Default::default()).unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::InvalidContext);
        assert_eq!(err.location().map(|l| l.line), Some(3));
    }

    #[test]
    fn test_undefined_continue_label_fails() {
        let mut atoms = crate::atom::AtomTable::new();
        let program = Program::script(vec![Statement::Continue(crate::ast::ContinueStatement {
            label: Some(Identifier::new("nowhere", Span::default())),
            span: Span::default(),
        })]);
        let err = crate::compiler::compile(&program, &mut atoms, &Default::default()).unwrap_err();
        assert!(err.to_string().contains("nowhere"));
    }
}
