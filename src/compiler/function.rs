//! Functions, parameters and declaration hoisting

use super::pattern::BindKind;
use super::{Compiler, GlobalVar};
use crate::ast::{
    has_use_strict, ExportKind, ForInLeft, ForInit, Function, FunctionBody, Pattern, Statement,
    VariableDeclaration, VariableKind,
};
use crate::atom::{atoms, Atom};
use crate::bytecode::{FuncId, Opcode, TempOpcode};
use crate::error::Result;
use crate::value::{FuncKind, VarKind};
use tracing::trace;

/// How a function is defined, beyond what its AST node says
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FunctionOptions {
    /// Object literal or class method, accessor or constructor
    pub is_method: bool,
    pub is_class_constructor: bool,
    pub is_derived: bool,
    /// Named function expression: its name is bound inside its body
    pub self_binding: bool,
    /// Class bodies are strict
    pub force_strict: bool,
    /// Constructor of a class with instance fields or private methods
    pub calls_field_initializer: bool,
}

impl Compiler<'_> {
    /// Top-level statements of a script or module
    pub(crate) fn compile_body(&mut self, body: &[Statement]) -> Result<()> {
        self.hoist_vars(body);
        let scope = self.fd_mut().scopes.push_scope();
        self.emit_op_u16(TempOpcode::EnterScope, scope as u16);
        self.hoist_block(body, true)?;
        for stmt in body {
            self.compile_statement(stmt)?;
        }
        Ok(())
    }

    /// Compile a nested function and return its arena index
    pub(crate) fn compile_function(&mut self, func: &Function, name: Atom, opts: FunctionOptions) -> Result<FuncId> {
        let id = self.new_function(name, func.span.start.line);
        {
            let fd = &mut self.funcs[id];
            fd.kind = FuncKind::from_flags(func.is_async, func.is_generator);
            fd.is_arrow = func.is_arrow;
            fd.is_method = opts.is_method || opts.is_class_constructor;
            fd.is_class_constructor = opts.is_class_constructor;
            fd.is_derived_constructor = opts.is_derived;
            fd.calls_field_initializer = opts.calls_field_initializer;
            fd.source = func.source.clone();
            if opts.self_binding {
                fd.func_name_binding = Some(name);
            }
            if opts.force_strict {
                fd.strict = true;
            }
            if let FunctionBody::Block(body) = &func.body {
                if has_use_strict(body) {
                    fd.strict = true;
                }
            }
        }
        let saved = self.cur;
        self.cur = id;
        let result = self.compile_function_body(func, opts);
        self.cur = saved;
        result?;
        trace!(
            name = %self.atoms.display_name(name),
            args = func.params.len(),
            "compiled function"
        );
        Ok(id)
    }

    fn compile_function_body(&mut self, func: &Function, opts: FunctionOptions) -> Result<()> {
        if opts.is_derived {
            let fd = self.fd_mut();
            let idx = fd.scopes.add_var(atoms::this);
            fd.scopes.var_mut(idx).is_lexical = true;
            fd.specials.this = Some(idx);
        }

        for param in &func.params {
            let name = match param {
                Pattern::Identifier(id) => self.intern(&id.name),
                Pattern::Assignment(a) => match &a.left {
                    Pattern::Identifier(id) => self.intern(&id.name),
                    _ => atoms::empty_string,
                },
                Pattern::Rest(r) => match &r.argument {
                    Pattern::Identifier(id) => self.intern(&id.name),
                    _ => atoms::empty_string,
                },
                _ => atoms::empty_string,
            };
            self.fd_mut().scopes.add_arg(name);
        }
        {
            let fd = self.fd_mut();
            fd.has_simple_params = func.has_simple_params();
            fd.defined_arg_count = func.defined_arg_count() as u16;
        }
        self.compile_params(&func.params)?;

        if self.fd().kind.is_generator() {
            self.emit(Opcode::InitialYield);
        }

        match &func.body {
            FunctionBody::Block(body) => {
                self.hoist_vars(body);
                let scope = self.fd_mut().scopes.push_scope();
                self.emit_op_u16(TempOpcode::EnterScope, scope as u16);
                self.hoist_block(body, true)?;
                if opts.calls_field_initializer && !opts.is_derived {
                    self.emit_field_initializer_call();
                }
                for stmt in body {
                    self.compile_statement(stmt)?;
                }
                if self.is_live_code() {
                    self.emit_return(false)?;
                }
            }
            FunctionBody::Expression(expr) => {
                let scope = self.fd_mut().scopes.push_scope();
                self.emit_op_u16(TempOpcode::EnterScope, scope as u16);
                self.compile_expr(expr)?;
                self.emit_return(true)?;
            }
        }
        Ok(())
    }

    /// Defaults, rest and destructuring of parameters
    fn compile_params(&mut self, params: &[Pattern]) -> Result<()> {
        let mut bound = Vec::new();
        for param in params {
            let pattern = match param {
                Pattern::Assignment(a) => &a.left,
                Pattern::Rest(r) => &r.argument,
                p => p,
            };
            if !matches!(pattern, Pattern::Identifier(_)) {
                bound.extend(pattern.bound_names().into_iter().map(|id| id.name.clone()));
            }
        }
        for name in bound {
            let atom = self.intern(&name);
            self.declare_var(atom);
        }

        for (i, param) in params.iter().enumerate() {
            let idx = i as u16;
            match param {
                Pattern::Identifier(_) => {}
                Pattern::Rest(r) => {
                    self.emit_op_u16(Opcode::Rest, idx);
                    self.store_param(&r.argument, idx)?;
                }
                Pattern::Assignment(a) => {
                    self.emit_op_u16(Opcode::GetArg, idx);
                    let hint = match &a.left {
                        Pattern::Identifier(id) => Some(self.intern(&id.name)),
                        _ => None,
                    };
                    self.emit_default_value(&a.right, hint)?;
                    self.store_param(&a.left, idx)?;
                }
                pattern => {
                    self.emit_op_u16(Opcode::GetArg, idx);
                    self.destructure(pattern, BindKind::Var)?;
                }
            }
        }
        Ok(())
    }

    fn store_param(&mut self, target: &Pattern, idx: u16) -> Result<()> {
        match target {
            Pattern::Identifier(_) => {
                self.emit_op_u16(Opcode::PutArg, idx);
                Ok(())
            }
            pattern => self.destructure(pattern, BindKind::Var),
        }
    }

    /// Closure for a function or arrow expression
    pub(crate) fn emit_function_expression(&mut self, func: &Function, name_hint: Option<Atom>) -> Result<()> {
        let (name, self_binding) = match &func.id {
            Some(id) => (self.intern(&id.name), !func.is_arrow),
            None => (name_hint.unwrap_or(atoms::empty_string), false),
        };
        let opts = FunctionOptions {
            self_binding,
            ..FunctionOptions::default()
        };
        let child = self.compile_function(func, name, opts)?;
        self.emit_fclosure(child);
        Ok(())
    }

    // ========== Hoisting ==========

    /// Declare every `var` of a function body, nested blocks included
    pub(crate) fn hoist_vars(&mut self, stmts: &[Statement]) {
        for stmt in stmts {
            self.hoist_var_stmt(stmt);
        }
    }

    fn hoist_var_decl(&mut self, decl: &VariableDeclaration) {
        if decl.kind != VariableKind::Var {
            return;
        }
        for d in &decl.declarations {
            for id in d.id.bound_names() {
                let name = self.intern(&id.name);
                self.declare_var(name);
            }
        }
    }

    fn hoist_var_stmt(&mut self, stmt: &Statement) {
        match stmt {
            Statement::VariableDeclaration(d) => self.hoist_var_decl(d),
            Statement::Block(b) => self.hoist_vars(&b.body),
            Statement::If(s) => {
                self.hoist_var_stmt(&s.consequent);
                if let Some(alt) = &s.alternate {
                    self.hoist_var_stmt(alt);
                }
            }
            Statement::While(s) => self.hoist_var_stmt(&s.body),
            Statement::DoWhile(s) => self.hoist_var_stmt(&s.body),
            Statement::For(s) => {
                if let Some(ForInit::Declaration(d)) = &s.init {
                    self.hoist_var_decl(d);
                }
                self.hoist_var_stmt(&s.body);
            }
            Statement::ForIn(s) => {
                if let ForInLeft::Declaration(d) = &s.left {
                    self.hoist_var_decl(d);
                }
                self.hoist_var_stmt(&s.body);
            }
            Statement::ForOf(s) => {
                if let ForInLeft::Declaration(d) = &s.left {
                    self.hoist_var_decl(d);
                }
                self.hoist_var_stmt(&s.body);
            }
            Statement::Switch(s) => {
                for case in &s.cases {
                    self.hoist_vars(&case.consequent);
                }
            }
            Statement::Try(s) => {
                self.hoist_vars(&s.block.body);
                if let Some(h) = &s.handler {
                    self.hoist_vars(&h.body.body);
                }
                if let Some(f) = &s.finalizer {
                    self.hoist_vars(&f.body);
                }
            }
            Statement::Labeled(s) => self.hoist_var_stmt(&s.body),
            Statement::With(s) => self.hoist_var_stmt(&s.body),
            Statement::Export(e) => {
                if let ExportKind::Declaration(inner) = &e.kind {
                    self.hoist_var_stmt(inner);
                }
            }
            _ => {}
        }
    }

    /// Declare a function-level variable
    pub(crate) fn declare_var(&mut self, name: Atom) {
        let fd = self.fd_mut();
        if fd.is_top_level() {
            if fd.find_global(name).is_none() {
                fd.global_vars.push(GlobalVar {
                    name,
                    is_lexical: false,
                    is_const: false,
                    func: None,
                });
            }
            return;
        }
        if fd.scopes.find_var(name).is_none() && fd.scopes.find_arg(name).is_none() {
            fd.scopes.add_var(name);
        }
    }

    /// Declare a `let`, `const` or class binding in the current scope
    pub(crate) fn declare_lexical(&mut self, name: Atom, is_const: bool, is_body: bool) {
        let fd = self.fd_mut();
        if is_body && fd.is_top_level() {
            match fd.find_global(name) {
                Some(i) => {
                    fd.global_vars[i].is_lexical = true;
                    fd.global_vars[i].is_const = is_const;
                }
                None => fd.global_vars.push(GlobalVar {
                    name,
                    is_lexical: true,
                    is_const,
                    func: None,
                }),
            }
        } else {
            fd.scopes.add_scope_var(name, VarKind::Normal, true, is_const);
        }
    }

    /// Declare the lexical bindings of a block and instantiate its
    /// function declarations
    pub(crate) fn hoist_block(&mut self, stmts: &[Statement], is_body: bool) -> Result<()> {
        let mut functions: Vec<(&Function, Atom)> = Vec::new();
        for stmt in stmts {
            let (stmt, is_default) = match stmt {
                Statement::Export(e) => match &e.kind {
                    ExportKind::Declaration(inner) => (inner.as_ref(), false),
                    ExportKind::DefaultDeclaration(inner) => (inner.as_ref(), true),
                    ExportKind::Default(_) => {
                        self.declare_lexical(atoms::_default_, false, is_body);
                        continue;
                    }
                    _ => continue,
                },
                s => (s, false),
            };
            match stmt {
                Statement::VariableDeclaration(d) if d.kind.is_lexical() => {
                    for decl in &d.declarations {
                        for id in decl.id.bound_names() {
                            let name = self.intern(&id.name);
                            self.declare_lexical(name, d.kind == VariableKind::Const, is_body);
                        }
                    }
                }
                Statement::ClassDeclaration(c) => {
                    let name = match &c.id {
                        Some(id) => self.intern(&id.name),
                        None if is_default => atoms::_default_,
                        None => continue,
                    };
                    self.declare_lexical(name, false, is_body);
                }
                Statement::FunctionDeclaration(f) => {
                    let binding = match &f.id {
                        Some(id) => self.intern(&id.name),
                        None if is_default => atoms::_default_,
                        None => continue,
                    };
                    functions.push((f, binding));
                }
                _ => {}
            }
        }
        for (f, binding) in functions {
            self.declare_function(f, binding, is_body)?;
        }
        Ok(())
    }

    fn declare_function(&mut self, func: &Function, binding: Atom, is_body: bool) -> Result<()> {
        let name = if binding == atoms::_default_ {
            atoms::default
        } else {
            binding
        };
        let child = self.compile_function(func, name, FunctionOptions::default())?;
        let fd = self.fd_mut();
        let cpool_idx = fd.cpool.add_function(child);
        if is_body && fd.is_top_level() {
            match fd.find_global(binding) {
                Some(i) => fd.global_vars[i].func = Some(cpool_idx),
                None => fd.global_vars.push(GlobalVar {
                    name: binding,
                    is_lexical: false,
                    is_const: false,
                    func: Some(cpool_idx),
                }),
            }
        } else if is_body {
            let idx = match fd.scopes.find_var(binding) {
                Some(idx) => idx,
                None => fd.scopes.add_var(binding),
            };
            fd.scopes.var_mut(idx).kind = VarKind::FunctionDecl;
            fd.scopes.set_func_init(idx, cpool_idx);
        } else {
            let idx = fd.scopes.add_scope_var(binding, VarKind::FunctionDecl, true, false);
            fd.scopes.set_func_init(idx, cpool_idx);
        }
        Ok(())
    }
}
