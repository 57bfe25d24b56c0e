//! Class definitions
//!
//! A class compiles to, in order:
//!
//! - private name slots in a class scope, filled with fresh symbols;
//! - the heritage and the constructor, joined by `define_class` into
//!   `[ctor, proto]`;
//! - methods, accessors and computed field keys, in source order;
//! - the instance field initializer, stored in `<class_fields_init>` and
//!   called by the constructor once `this` exists;
//! - the static initializer, called once on the class object.

use super::expr::{APPLY_CONSTRUCTOR, METHOD_KIND_GETTER, METHOD_KIND_METHOD, METHOD_KIND_SETTER};
use super::function::FunctionOptions;
use super::resolve::setter_atom;
use super::Compiler;
use crate::ast::{
    CallExpression, Class, ClassElement, Expression, Function, FunctionBody, Identifier, MethodDefinition,
    MethodKind, Pattern, PropertyKey, RestElement, Span, SpreadElement, Statement,
};
use crate::atom::{atoms, Atom};
use crate::bytecode::{FuncId, Opcode, TempOpcode};
use crate::error::{Error, Result};
use crate::value::VarKind;
use tracing::trace;

/// `define_class` flag: the class has an `extends` clause
const CLASS_HAS_HERITAGE: u8 = 1;

/// A field initialized by one of the synthesized initializers
enum FieldKey {
    Named(Atom),
    /// Key evaluated at class definition time into a hidden variable
    Computed(Atom),
    Private(Atom),
}

/// Which private brands a class installs
#[derive(Debug, Default, Clone, Copy)]
struct Brands {
    /// Instances, through the field initializer
    instance: bool,
    /// The class object, for static private methods
    statics: bool,
}

/// Work deferred to an initializer function
enum InitStep<'a> {
    Field(FieldKey, Option<&'a Expression>),
    Block(&'a [Statement]),
}

/// Synthesized constructor of a class without one
fn default_constructor(derived: bool, span: Span) -> Function {
    let (params, body) = if derived {
        let args = Identifier::new("args", span);
        let call = Expression::Call(Box::new(CallExpression {
            callee: Expression::Super(span),
            arguments: vec![Expression::Spread(Box::new(SpreadElement {
                argument: Expression::Identifier(args.clone()),
                span,
            }))],
            optional: false,
            span,
        }));
        (
            vec![Pattern::Rest(Box::new(RestElement {
                argument: Pattern::Identifier(args),
                span,
            }))],
            vec![Statement::expr(call)],
        )
    } else {
        (Vec::new(), Vec::new())
    };
    Function {
        id: None,
        params,
        body: FunctionBody::Block(body),
        is_async: false,
        is_generator: false,
        is_arrow: false,
        source: None,
        span,
    }
}

impl Compiler<'_> {
    /// Compile a class; leaves the constructor on the stack
    pub(crate) fn compile_class(&mut self, class: &Class, name: Atom) -> Result<()> {
        self.set_location(class.span);
        let outer_strict = self.fd().strict;
        self.fd_mut().strict = true;
        let result = self.compile_class_inner(class, name);
        self.fd_mut().strict = outer_strict;
        result
    }

    fn compile_class_inner(&mut self, class: &Class, name: Atom) -> Result<()> {
        let scope = self.push_block_scope();
        if let Some(id) = &class.id {
            let atom = self.intern(&id.name);
            self.fd_mut().scopes.add_scope_var(atom, VarKind::Normal, true, true);
        }
        let brands = self.declare_private_names(class)?;
        let has_instance_fields = class
            .body
            .iter()
            .any(|el| matches!(el, ClassElement::Property(p) if !p.is_static));
        let calls_field_initializer = has_instance_fields || brands.instance;
        if calls_field_initializer {
            self.fd_mut()
                .scopes
                .add_scope_var(atoms::class_fields_init, VarKind::Normal, false, false);
        }
        if brands.instance {
            self.fd_mut().scopes.add_scope_var(atoms::brand, VarKind::Normal, false, false);
        }

        for el in &class.body {
            if let ClassElement::Property(p) = el {
                if let PropertyKey::PrivateName(n) = &p.key {
                    let field = self.private_atom(n);
                    self.emit_op_atom(Opcode::PrivateSymbol, field);
                    self.emit_scope_op(TempOpcode::ScopePutVarInit, field);
                }
            }
        }

        // heritage and constructor
        match &class.super_class {
            Some(heritage) => self.compile_expr(heritage)?,
            None => self.emit(Opcode::Undefined),
        }
        let derived = class.super_class.is_some();
        let opts = FunctionOptions {
            is_method: true,
            is_class_constructor: true,
            is_derived: derived,
            force_strict: true,
            calls_field_initializer,
            ..FunctionOptions::default()
        };
        let explicit = class.body.iter().find_map(|el| match el {
            ClassElement::Method(m) if m.kind == MethodKind::Constructor => Some(&m.value),
            _ => None,
        });
        let ctor = match explicit {
            Some(f) => self.compile_function(f, name, opts)?,
            None => self.compile_function(&default_constructor(derived, class.span), name, opts)?,
        };
        let idx = self.fd_mut().cpool.add_function(ctor);
        self.emit(Opcode::PushConst);
        self.emit_u32(idx);
        self.emit_op_atom_u8(
            Opcode::DefineClass,
            name,
            if derived { CLASS_HAS_HERITAGE } else { 0 },
        );
        if brands.instance {
            self.emit(Opcode::Dup);
            self.emit_scope_op(TempOpcode::ScopePutVarInit, atoms::brand);
        }
        if brands.statics {
            // static private methods are branded on the class itself
            self.emit(Opcode::Swap);
            self.emit(Opcode::Dup);
            self.emit(Opcode::Dup);
            self.emit(Opcode::AddBrand);
            self.emit(Opcode::Swap);
        }

        // methods and computed field keys, in source order
        let mut instance: Vec<InitStep> = Vec::new();
        let mut statics: Vec<InitStep> = Vec::new();
        let mut computed_count = 0;
        for el in &class.body {
            match el {
                ClassElement::Method(m) if m.kind != MethodKind::Constructor => self.compile_class_method(m)?,
                ClassElement::Method(_) => {}
                ClassElement::Property(p) => {
                    let key = match &p.key {
                        PropertyKey::PrivateName(n) => FieldKey::Private(self.private_atom(n)),
                        PropertyKey::Computed(key) => {
                            let var = self.intern(&format!("<computed_field{}>", computed_count));
                            computed_count += 1;
                            self.fd_mut().scopes.add_scope_var(var, VarKind::Normal, false, false);
                            self.compile_expr(key)?;
                            self.emit(Opcode::ToPropkey);
                            self.emit_scope_op(TempOpcode::ScopePutVarInit, var);
                            FieldKey::Computed(var)
                        }
                        key => FieldKey::Named(self.property_key_atom(key).unwrap_or(atoms::empty_string)),
                    };
                    let steps = if p.is_static { &mut statics } else { &mut instance };
                    steps.push(InitStep::Field(key, p.value.as_ref()));
                }
                ClassElement::StaticBlock(b) => statics.push(InitStep::Block(&b.body)),
            }
        }

        if calls_field_initializer {
            let init = self.compile_initializer(&instance, brands.instance, class.span)?;
            self.emit_fclosure(init);
            self.emit(Opcode::SetHomeObject);
            self.emit_scope_op(TempOpcode::ScopePutVarInit, atoms::class_fields_init);
        }

        self.emit(Opcode::Drop);
        if let Some(id) = &class.id {
            let atom = self.intern(&id.name);
            self.emit(Opcode::Dup);
            self.emit_scope_op(TempOpcode::ScopePutVarInit, atom);
        }
        if !statics.is_empty() {
            let init = self.compile_initializer(&statics, false, class.span)?;
            self.emit(Opcode::Dup);
            self.emit_fclosure(init);
            self.emit(Opcode::SetHomeObject);
            self.emit_op_u16(Opcode::CallMethod, 0);
            self.emit(Opcode::Drop);
        }
        self.pop_block_scope(scope);
        trace!(class = %self.atoms.display_name(name), derived, "compiled class");
        Ok(())
    }

    /// Declare the private names of a class body
    fn declare_private_names(&mut self, class: &Class) -> Result<Brands> {
        let mut declared: Vec<(Atom, VarKind)> = Vec::new();
        let mut brands = Brands::default();
        for el in &class.body {
            let (name, kind, span) = match el {
                ClassElement::Property(p) => match &p.key {
                    PropertyKey::PrivateName(n) => (n, VarKind::PrivateField, p.span),
                    _ => continue,
                },
                ClassElement::Method(m) => match &m.key {
                    PropertyKey::PrivateName(n) => {
                        let kind = match m.kind {
                            MethodKind::Get => VarKind::PrivateGetter,
                            MethodKind::Set => VarKind::PrivateSetter,
                            _ => VarKind::PrivateMethod,
                        };
                        if m.is_static {
                            brands.statics = true;
                        } else {
                            brands.instance = true;
                        }
                        (n, kind, m.span)
                    }
                    _ => continue,
                },
                ClassElement::StaticBlock(_) => continue,
            };
            let atom = self.private_atom(name);
            if atom == atoms::hash_constructor {
                return Err(Error::invalid_context("private name '#constructor'", Self::loc(span)));
            }
            match declared.iter_mut().find(|(n, _)| *n == atom) {
                None => declared.push((atom, kind)),
                Some((_, prev)) => match (*prev, kind) {
                    (VarKind::PrivateGetter, VarKind::PrivateSetter)
                    | (VarKind::PrivateSetter, VarKind::PrivateGetter) => *prev = VarKind::PrivateGetterSetter,
                    _ => {
                        return Err(Error::invalid_context(
                            format!("duplicate private name '{}'", self.atoms.display_name(atom)),
                            Self::loc(span),
                        ))
                    }
                },
            }
        }
        for (atom, kind) in declared {
            self.fd_mut().scopes.add_scope_var(atom, kind, false, true);
            if kind == VarKind::PrivateGetterSetter {
                let setter = setter_atom(self, atom);
                self.fd_mut()
                    .scopes
                    .add_scope_var(setter, VarKind::PrivateSetter, false, true);
            }
        }
        Ok(brands)
    }

    /// Define one method on `[ctor, proto]`
    fn compile_class_method(&mut self, m: &MethodDefinition) -> Result<()> {
        self.set_location(m.span);
        let flags = match m.kind {
            MethodKind::Get => METHOD_KIND_GETTER,
            MethodKind::Set => METHOD_KIND_SETTER,
            _ => METHOD_KIND_METHOD,
        };
        let opts = FunctionOptions {
            is_method: true,
            force_strict: true,
            ..FunctionOptions::default()
        };
        if m.is_static {
            self.emit(Opcode::Swap);
        }
        match &m.key {
            PropertyKey::PrivateName(n) => {
                let atom = self.private_atom(n);
                let func = self.compile_function(&m.value, atom, opts)?;
                self.emit_fclosure(func);
                self.emit(Opcode::SetHomeObject);
                let slot = if m.kind == MethodKind::Set && self.has_private_getter(atom) {
                    setter_atom(self, atom)
                } else {
                    atom
                };
                self.emit_scope_op(TempOpcode::ScopePutVarInit, slot);
            }
            PropertyKey::Computed(key) => {
                self.compile_expr(key)?;
                self.emit(Opcode::ToPropkey);
                let func = self.compile_function(&m.value, atoms::empty_string, opts)?;
                self.emit_fclosure(func);
                self.emit(Opcode::DefineMethodComputed);
                self.emit_u8(flags);
            }
            key => {
                let atom = self.property_key_atom(key).unwrap_or(atoms::empty_string);
                let func = self.compile_function(&m.value, atom, opts)?;
                self.emit_fclosure(func);
                self.emit_op_atom_u8(Opcode::DefineMethod, atom, flags);
            }
        }
        if m.is_static {
            self.emit(Opcode::Swap);
        }
        Ok(())
    }

    fn has_private_getter(&self, name: Atom) -> bool {
        let fd = self.fd();
        fd.scopes
            .lookup(name, fd.scopes.current())
            .map(|idx| fd.scopes.var(idx).kind == VarKind::PrivateGetterSetter)
            .unwrap_or(false)
    }

    /// Build a field initializer function: `this` is the object being
    /// initialized and the home object is `[ctor, proto]`'s top
    fn compile_initializer(&mut self, steps: &[InitStep], add_brand: bool, span: Span) -> Result<FuncId> {
        let parent = self.cur;
        let id = self.new_function(atoms::class_fields_init, span.start.line);
        {
            let fd = &mut self.funcs[id];
            fd.is_method = true;
            fd.is_field_initializer = true;
            fd.strict = true;
        }
        self.cur = id;
        let result = self.emit_initializer_body(steps, add_brand);
        self.cur = parent;
        result?;
        Ok(id)
    }

    fn emit_initializer_body(&mut self, steps: &[InitStep], add_brand: bool) -> Result<()> {
        if add_brand {
            self.emit(Opcode::PushThis);
            self.emit_scope_op(TempOpcode::ScopeGetVar, atoms::home_object);
            self.emit(Opcode::AddBrand);
        }
        for step in steps {
            match step {
                InitStep::Field(key, value) => {
                    self.emit(Opcode::PushThis);
                    match key {
                        FieldKey::Named(atom) => {
                            self.emit_field_value(*value, Some(*atom))?;
                            self.emit_op_atom(Opcode::DefineField, *atom);
                        }
                        FieldKey::Computed(var) => {
                            self.emit_scope_op(TempOpcode::ScopeGetVar, *var);
                            self.emit_field_value(*value, None)?;
                            if value.is_some_and(|v| v.is_anonymous_function_definition()) {
                                self.emit(Opcode::SetNameComputed);
                            }
                            self.emit(Opcode::DefineArrayEl);
                            self.emit(Opcode::Drop);
                        }
                        FieldKey::Private(atom) => {
                            self.emit_scope_op(TempOpcode::ScopeGetVar, *atom);
                            self.emit_field_value(*value, Some(*atom))?;
                            self.emit(Opcode::DefinePrivateField);
                        }
                    }
                    self.emit(Opcode::Drop);
                }
                InitStep::Block(body) => {
                    self.hoist_vars(body);
                    let scope = self.push_block_scope();
                    self.hoist_block(body, false)?;
                    for stmt in body.iter() {
                        self.compile_statement(stmt)?;
                    }
                    self.pop_block_scope(scope);
                }
            }
        }
        self.emit(Opcode::ReturnUndef);
        Ok(())
    }

    fn emit_field_value(&mut self, value: Option<&Expression>, name: Option<Atom>) -> Result<()> {
        match value {
            Some(v) => self.compile_expr_named(v, name),
            None => {
                self.emit(Opcode::Undefined);
                Ok(())
            }
        }
    }

    /// Run the instance field initializer on `this`
    pub(crate) fn emit_field_initializer_call(&mut self) {
        self.emit_scope_op(TempOpcode::ScopeGetVar, atoms::class_fields_init);
        self.emit_this();
        self.emit(Opcode::Swap);
        self.emit_op_u16(Opcode::CallMethod, 0);
        self.emit(Opcode::Drop);
    }

    /// `super(...)` in a derived constructor: construct through the parent
    /// class, bind `this` and run the field initializer
    pub(crate) fn compile_super_call(&mut self, args: &[Expression], span: Span) -> Result<()> {
        let owner = self.non_arrow_ancestor(self.cur);
        if !self.funcs[owner].is_derived_constructor {
            return Err(Error::invalid_context(
                "super() outside of a derived class constructor",
                Self::loc(span),
            ));
        }
        self.emit_scope_op(TempOpcode::ScopeGetVar, atoms::this_active_func);
        self.emit(Opcode::GetSuper);
        self.emit_scope_op(TempOpcode::ScopeGetVar, atoms::new_target);
        if args.iter().any(|a| matches!(a, Expression::Spread(_))) {
            let elements: Vec<Option<&Expression>> = args.iter().map(Some).collect();
            self.emit_array(&elements)?;
            self.emit_op_u16(Opcode::Apply, APPLY_CONSTRUCTOR);
        } else {
            for arg in args {
                self.compile_expr(arg)?;
            }
            self.emit_op_u16(Opcode::CallConstructor, args.len() as u16);
        }
        self.emit(Opcode::Dup);
        self.emit_scope_op(TempOpcode::ScopePutVarInit, atoms::this);
        if self.funcs[owner].calls_field_initializer {
            self.emit_field_initializer_call();
        }
        Ok(())
    }
}
