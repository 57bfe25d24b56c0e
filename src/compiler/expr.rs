//! Expressions

use super::function::FunctionOptions;
use super::pattern::BindKind;
use super::Compiler;
use crate::ast::{
    AssignmentExpression, AssignmentOperator, BinaryOperator, CallExpression, Expression, LiteralValue,
    LogicalOperator, MemberExpression, MemberProperty, ObjectExpression, ObjectProperty, Pattern,
    PropertyKey, PropertyKind, Span, TemplateLiteral, UnaryOperator, UpdateOperator,
};
use crate::atom::{atoms, Atom};
use crate::bytecode::opcode::SpecialObject;
use crate::bytecode::label::LabelId;
use crate::bytecode::{Opcode, TempOpcode};
use crate::error::{Error, Result};
use crate::value::{JsValue, TemplateObject};
use num_bigint::BigInt;
use std::rc::Rc;

/// `define_method` operand
pub(crate) const METHOD_KIND_METHOD: u8 = 0;
pub(crate) const METHOD_KIND_GETTER: u8 = 1;
pub(crate) const METHOD_KIND_SETTER: u8 = 2;
pub(crate) const METHOD_ENUMERABLE: u8 = 4;

/// `copy_data_properties` operand for object spread: target at 2, source
/// at 1, excluded keys at 0
const COPY_SPREAD_MASK: u8 = 2 | (1 << 2);

/// `apply` operand
const APPLY_CALL: u16 = 0;
pub(crate) const APPLY_CONSTRUCTOR: u16 = 2;

/// What a callee leaves on the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallKind {
    /// `[func]`
    Plain,
    /// `[this, func]`
    Method,
}

/// Does the member/call spine of `e` contain an optional link?
fn chain_has_optional(e: &Expression) -> bool {
    match e {
        Expression::Member(m) => m.optional || chain_has_optional(&m.object),
        Expression::Call(c) => c.optional || chain_has_optional(&c.callee),
        _ => false,
    }
}

fn binary_opcode(op: BinaryOperator) -> Opcode {
    match op {
        BinaryOperator::Add => Opcode::Add,
        BinaryOperator::Sub => Opcode::Sub,
        BinaryOperator::Mul => Opcode::Mul,
        BinaryOperator::Div => Opcode::Div,
        BinaryOperator::Mod => Opcode::Mod,
        BinaryOperator::Exp => Opcode::Pow,
        BinaryOperator::Eq => Opcode::Eq,
        BinaryOperator::Ne => Opcode::Neq,
        BinaryOperator::StrictEq => Opcode::StrictEq,
        BinaryOperator::StrictNe => Opcode::StrictNeq,
        BinaryOperator::Lt => Opcode::Lt,
        BinaryOperator::Le => Opcode::Lte,
        BinaryOperator::Gt => Opcode::Gt,
        BinaryOperator::Ge => Opcode::Gte,
        BinaryOperator::Shl => Opcode::Shl,
        BinaryOperator::Shr => Opcode::Sar,
        BinaryOperator::UShr => Opcode::Shr,
        BinaryOperator::BitwiseAnd => Opcode::And,
        BinaryOperator::BitwiseOr => Opcode::Or,
        BinaryOperator::BitwiseXor => Opcode::Xor,
        BinaryOperator::In => Opcode::In,
        BinaryOperator::Instanceof => Opcode::InstanceOf,
    }
}

/// Parse the text of a BigInt literal
fn parse_bigint(text: &str) -> Option<BigInt> {
    let text = text.trim_end_matches('n').replace('_', "");
    let lower = text.to_ascii_lowercase();
    let (digits, radix) = match lower.get(..2) {
        Some("0x") => (&lower[2..], 16),
        Some("0o") => (&lower[2..], 8),
        Some("0b") => (&lower[2..], 2),
        _ => (lower.as_str(), 10),
    };
    BigInt::parse_bytes(digits.as_bytes(), radix)
}

impl Compiler<'_> {
    pub(crate) fn compile_expr(&mut self, e: &Expression) -> Result<()> {
        self.compile_expr_named(e, None)
    }

    /// Compile `e`, naming it `name` when it is an anonymous function or
    /// class definition
    pub(crate) fn compile_expr_named(&mut self, e: &Expression, name: Option<Atom>) -> Result<()> {
        // a nested expression never jumps to the end of an outer chain
        let saved = self.fd_mut().chain_end.take();
        let result = self.compile_expr_inner(e, name);
        self.fd_mut().chain_end = saved;
        result
    }

    /// Object or callee of a chain link: stays in the current chain
    fn compile_spine(&mut self, e: &Expression) -> Result<()> {
        self.compile_expr_inner(e, None)
    }

    fn compile_expr_inner(&mut self, e: &Expression, name: Option<Atom>) -> Result<()> {
        match e {
            Expression::Identifier(id) => {
                let atom = self.intern(&id.name);
                self.emit_scope_op(TempOpcode::ScopeGetVar, atom);
            }
            Expression::Literal(lit) => self.compile_literal(&lit.value, lit.span)?,
            Expression::TemplateLiteral(t) => self.compile_template(t)?,
            Expression::TaggedTemplate(t) => {
                let kind = self.compile_callee(&t.tag)?;
                self.emit_template_object(&t.quasi);
                for expr in &t.quasi.expressions {
                    self.compile_expr(expr)?;
                }
                let argc = t.quasi.expressions.len() as u16 + 1;
                match kind {
                    CallKind::Plain => self.emit_op_u16(Opcode::Call, argc),
                    CallKind::Method => self.emit_op_u16(Opcode::CallMethod, argc),
                }
            }
            Expression::Array(a) => {
                let elements: Vec<Option<&Expression>> = a.elements.iter().map(Option::as_ref).collect();
                self.emit_array(&elements)?;
            }
            Expression::Object(o) => self.compile_object(o)?,
            Expression::Function(f) | Expression::Arrow(f) => self.emit_function_expression(f, name)?,
            Expression::Class(c) => {
                let class_name = match &c.id {
                    Some(id) => self.intern(&id.name),
                    None => name.unwrap_or(atoms::empty_string),
                };
                self.compile_class(c, class_name)?;
            }
            Expression::This(_) => self.emit_this(),
            Expression::Super(span) => {
                return Err(Error::invalid_context("'super' keyword unexpected here", Self::loc(*span)))
            }
            Expression::Member(m) => {
                if self.fd().chain_end.is_none() && chain_has_optional(e) {
                    return self.compile_chain(e);
                }
                self.compile_member(m)?;
            }
            Expression::Call(c) => {
                if self.fd().chain_end.is_none() && chain_has_optional(e) {
                    return self.compile_chain(e);
                }
                self.compile_call(c)?;
            }
            Expression::Chain(c) => self.compile_chain(&c.expression)?,
            Expression::New(n) => {
                self.compile_expr(&n.callee)?;
                self.emit(Opcode::Dup);
                if n.arguments.iter().any(|a| matches!(a, Expression::Spread(_))) {
                    let args: Vec<Option<&Expression>> = n.arguments.iter().map(Some).collect();
                    self.emit_array(&args)?;
                    self.emit_op_u16(Opcode::Apply, APPLY_CONSTRUCTOR);
                } else {
                    for arg in &n.arguments {
                        self.compile_expr(arg)?;
                    }
                    self.emit_op_u16(Opcode::CallConstructor, n.arguments.len() as u16);
                }
            }
            Expression::Unary(u) => self.compile_unary(u.operator, &u.argument, u.span)?,
            Expression::Update(u) => {
                let r = self.emit_reference(&u.argument, true)?;
                let increment = u.operator == UpdateOperator::Increment;
                if u.prefix {
                    self.emit(if increment { Opcode::Inc } else { Opcode::Dec });
                    self.put_reference(r, true);
                } else {
                    self.emit(if increment { Opcode::PostInc } else { Opcode::PostDec });
                    self.sink_old_value(r);
                    self.put_reference(r, false);
                }
            }
            Expression::Binary(b) => {
                self.compile_expr(&b.left)?;
                self.compile_expr(&b.right)?;
                self.emit(binary_opcode(b.operator));
            }
            Expression::Logical(l) => {
                let end = self.new_label();
                self.compile_expr(&l.left)?;
                self.emit_short_circuit(l.operator, end);
                self.emit(Opcode::Drop);
                self.compile_expr(&l.right)?;
                self.emit_label(end);
            }
            Expression::Assignment(a) => self.compile_assignment(a)?,
            Expression::Conditional(c) => {
                let (alt, end) = (self.new_label(), self.new_label());
                self.compile_expr(&c.test)?;
                self.emit_goto(Opcode::IfFalse, alt);
                self.compile_expr_named(&c.consequent, name)?;
                self.emit_goto(Opcode::Goto, end);
                self.emit_label(alt);
                self.compile_expr_named(&c.alternate, name)?;
                self.emit_label(end);
            }
            Expression::Sequence(s) => {
                for (i, expr) in s.expressions.iter().enumerate() {
                    if i > 0 {
                        self.emit(Opcode::Drop);
                    }
                    self.compile_expr(expr)?;
                }
            }
            Expression::Spread(s) => {
                return Err(Error::invalid_context("spread element outside of a list", Self::loc(s.span)))
            }
            Expression::Yield(y) => self.compile_yield(y)?,
            Expression::Await(a) => self.compile_await(&a.argument, a.span)?,
            Expression::MetaProperty(m) => match (m.meta.as_str(), m.property.as_str()) {
                ("new", "target") => {
                    let owner = self.non_arrow_ancestor(self.cur);
                    if self.funcs[owner].is_top_level() {
                        return Err(Error::invalid_context("new.target outside of a function", Self::loc(m.span)));
                    }
                    self.emit_scope_op(TempOpcode::ScopeGetVar, atoms::new_target);
                }
                ("import", "meta") => {
                    if self.module.is_none() {
                        return Err(Error::invalid_context("import.meta outside of a module", Self::loc(m.span)));
                    }
                    self.emit(Opcode::SpecialObject);
                    self.emit_u8(SpecialObject::ImportMeta as u8);
                }
                _ => {
                    return Err(Error::unsupported(
                        format!("meta property {}.{}", m.meta, m.property),
                        Self::loc(m.span),
                    ))
                }
            },
            Expression::Import(i) => {
                self.compile_expr(&i.source)?;
                if let Some(options) = &i.options {
                    self.compile_expr(options)?;
                    self.emit(Opcode::Drop);
                }
                self.emit(Opcode::Import);
            }
            Expression::PrivateIn(p) => {
                let atom = self.private_atom(&p.name);
                self.compile_expr(&p.right)?;
                self.emit_scope_op(TempOpcode::ScopeInPrivateField, atom);
            }
        }
        Ok(())
    }

    fn compile_literal(&mut self, value: &LiteralValue, span: Span) -> Result<()> {
        match value {
            LiteralValue::Null => self.emit(Opcode::Null),
            LiteralValue::Undefined => self.emit(Opcode::Undefined),
            LiteralValue::Boolean(true) => self.emit(Opcode::PushTrue),
            LiteralValue::Boolean(false) => self.emit(Opcode::PushFalse),
            LiteralValue::Number(n) => match JsValue::number(*n) {
                JsValue::Int32(i) => self.emit_push_i32(i),
                v => self.emit_constant(v),
            },
            LiteralValue::BigInt(text) => {
                let value = parse_bigint(text)
                    .ok_or_else(|| Error::invalid_context(format!("invalid BigInt literal '{}'", text), Self::loc(span)))?;
                self.emit_constant(JsValue::BigInt(value));
            }
            LiteralValue::String(s) => self.emit_atom_value(s),
            LiteralValue::Regex { pattern, flags } => {
                self.emit_constant(JsValue::string(pattern.clone()));
                self.emit_constant(JsValue::string(flags.clone()));
                self.emit(Opcode::Regexp);
            }
        }
        Ok(())
    }

    /// `this` of the current function
    pub(crate) fn emit_this(&mut self) {
        let fd = self.fd();
        if fd.is_arrow || fd.is_derived_constructor {
            self.emit_scope_op(TempOpcode::ScopeGetVarCheckthis, atoms::this);
        } else {
            self.emit(Opcode::PushThis);
        }
    }

    /// Push `[this, home_object.__proto__]` for a `super` property access
    pub(crate) fn emit_super_base(&mut self, span: Span) -> Result<()> {
        let owner = self.non_arrow_ancestor(self.cur);
        if !self.funcs[owner].is_method {
            return Err(Error::invalid_context("'super' outside of a method", Self::loc(span)));
        }
        self.emit_this();
        self.emit_scope_op(TempOpcode::ScopeGetVar, atoms::home_object);
        self.emit(Opcode::GetSuper);
        Ok(())
    }

    fn emit_super_key(&mut self, property: &MemberProperty, span: Span) -> Result<()> {
        match property {
            MemberProperty::Identifier(name) => self.emit_atom_value(name),
            MemberProperty::Computed(key) => {
                self.compile_expr(key)?;
                self.emit(Opcode::ToPropkey);
            }
            MemberProperty::PrivateName(_) => {
                return Err(Error::invalid_context("private name on super", Self::loc(span)))
            }
        }
        Ok(())
    }

    // ========== Optional chains ==========

    fn compile_chain(&mut self, e: &Expression) -> Result<()> {
        let end = self.new_label();
        let saved = self.fd_mut().chain_end.replace(end);
        let result = self.compile_expr_inner(e, None);
        self.fd_mut().chain_end = saved;
        result?;
        self.emit_label(end);
        Ok(())
    }

    /// Leave the chain with `undefined` when the value on top is nullish.
    /// `below` values under it belong to the link and are dropped too.
    fn emit_optional_check(&mut self, below: u32) -> Result<()> {
        let end = self
            .fd()
            .chain_end
            .ok_or_else(|| Error::internal("optional link outside of a chain"))?;
        if below == 0 {
            self.emit(TempOpcode::OptionalChain);
            self.emit_label_ref(end);
            return Ok(());
        }
        let present = self.new_label();
        self.emit(Opcode::Dup);
        self.emit(Opcode::IsUndefinedOrNull);
        self.emit_goto(Opcode::IfFalse, present);
        for _ in 0..=below {
            self.emit(Opcode::Drop);
        }
        self.emit(Opcode::Undefined);
        self.emit_goto(Opcode::Goto, end);
        self.emit_label(present);
        Ok(())
    }

    fn compile_member(&mut self, m: &MemberExpression) -> Result<()> {
        if let Expression::Super(span) = &m.object {
            self.emit_super_base(*span)?;
            self.emit_super_key(&m.property, m.span)?;
            self.emit(Opcode::GetSuperValue);
            return Ok(());
        }
        self.compile_spine(&m.object)?;
        if m.optional {
            self.emit_optional_check(0)?;
        }
        let in_chain = self.fd().chain_end.is_some();
        match &m.property {
            MemberProperty::Identifier(name) => {
                let atom = self.intern(name);
                if in_chain {
                    self.emit_op_atom(TempOpcode::GetFieldOptChain, atom);
                } else {
                    self.emit_op_atom(Opcode::GetField, atom);
                }
            }
            MemberProperty::Computed(key) => {
                self.compile_expr(key)?;
                if in_chain {
                    self.emit(TempOpcode::GetArrayElOptChain);
                } else {
                    self.emit(Opcode::GetArrayEl);
                }
            }
            MemberProperty::PrivateName(name) => {
                let atom = self.private_atom(name);
                self.emit_scope_op(TempOpcode::ScopeGetPrivateField, atom);
            }
        }
        Ok(())
    }

    // ========== Calls ==========

    /// Push a callee, with its `this` for method calls
    fn compile_callee(&mut self, callee: &Expression) -> Result<CallKind> {
        match callee {
            Expression::Member(m) => {
                if let Expression::Super(span) = &m.object {
                    self.emit_this();
                    self.emit_super_base(*span)?;
                    self.emit_super_key(&m.property, m.span)?;
                    self.emit(Opcode::GetSuperValue);
                    return Ok(CallKind::Method);
                }
                self.compile_spine(&m.object)?;
                if m.optional {
                    self.emit_optional_check(0)?;
                }
                match &m.property {
                    MemberProperty::Identifier(name) => {
                        let atom = self.intern(name);
                        self.emit_op_atom(Opcode::GetField2, atom);
                    }
                    MemberProperty::Computed(key) => {
                        self.compile_expr(key)?;
                        self.emit(Opcode::GetArrayEl2);
                    }
                    MemberProperty::PrivateName(name) => {
                        let atom = self.private_atom(name);
                        self.emit_scope_op(TempOpcode::ScopeGetPrivateField2, atom);
                    }
                }
                Ok(CallKind::Method)
            }
            Expression::Identifier(id) if self.has_with_scope() => {
                let atom = self.intern(&id.name);
                self.emit_scope_op(TempOpcode::ScopeGetRef, atom);
                Ok(CallKind::Method)
            }
            other => {
                self.compile_spine(other)?;
                Ok(CallKind::Plain)
            }
        }
    }

    fn compile_call(&mut self, c: &CallExpression) -> Result<()> {
        if let Expression::Super(span) = &c.callee {
            return self.compile_super_call(&c.arguments, *span);
        }
        let kind = self.compile_callee(&c.callee)?;
        if c.optional {
            self.emit_optional_check(match kind {
                CallKind::Plain => 0,
                CallKind::Method => 1,
            })?;
        }
        self.emit_call_args(kind, &c.arguments)
    }

    /// Arguments and the call itself, the callee being on the stack
    pub(crate) fn emit_call_args(&mut self, kind: CallKind, args: &[Expression]) -> Result<()> {
        if args.iter().any(|a| matches!(a, Expression::Spread(_))) {
            match kind {
                CallKind::Plain => self.emit(Opcode::Undefined),
                CallKind::Method => self.emit(Opcode::Swap),
            }
            let elements: Vec<Option<&Expression>> = args.iter().map(Some).collect();
            self.emit_array(&elements)?;
            self.emit_op_u16(Opcode::Apply, APPLY_CALL);
            return Ok(());
        }
        for arg in args {
            self.compile_expr(arg)?;
        }
        let argc = args.len() as u16;
        match kind {
            CallKind::Plain => self.emit_op_u16(Opcode::Call, argc),
            CallKind::Method => self.emit_op_u16(Opcode::CallMethod, argc),
        }
        Ok(())
    }

    /// Array from a list that may contain spreads and holes
    pub(crate) fn emit_array(&mut self, elements: &[Option<&Expression>]) -> Result<()> {
        let prefix = elements
            .iter()
            .take_while(|e| matches!(e, Some(x) if !matches!(x, Expression::Spread(_))))
            .count();
        for element in elements[..prefix].iter().flatten() {
            self.compile_expr(element)?;
        }
        self.emit_op_u16(Opcode::ArrayFrom, prefix as u16);
        if prefix == elements.len() {
            return Ok(());
        }

        self.emit_push_i32(prefix as i32);
        for element in &elements[prefix..] {
            match element {
                Some(Expression::Spread(s)) => {
                    self.compile_expr(&s.argument)?;
                    self.emit(Opcode::Append);
                }
                Some(e) => {
                    self.compile_expr(e)?;
                    self.emit(Opcode::DefineArrayEl);
                    self.emit(Opcode::Inc);
                }
                None => self.emit(Opcode::Inc),
            }
        }
        if matches!(elements.last(), Some(None)) {
            // trailing holes still count in the length
            self.emit(Opcode::Dup1);
            self.emit_op_atom(Opcode::PutField, atoms::length);
        } else {
            self.emit(Opcode::Drop);
        }
        Ok(())
    }

    // ========== Operators ==========

    fn compile_unary(&mut self, op: UnaryOperator, argument: &Expression, span: Span) -> Result<()> {
        match op {
            UnaryOperator::Typeof => {
                if let Expression::Identifier(id) = argument {
                    let atom = self.intern(&id.name);
                    self.emit_scope_op(TempOpcode::ScopeGetVarUndef, atom);
                } else {
                    self.compile_expr(argument)?;
                }
                self.emit(Opcode::TypeOf);
            }
            UnaryOperator::Void => {
                self.compile_expr(argument)?;
                self.emit(Opcode::Drop);
                self.emit(Opcode::Undefined);
            }
            UnaryOperator::Delete => self.compile_delete(argument, span)?,
            op => {
                self.compile_expr(argument)?;
                self.emit(match op {
                    UnaryOperator::Minus => Opcode::Neg,
                    UnaryOperator::Plus => Opcode::Plus,
                    UnaryOperator::Not => Opcode::LNot,
                    _ => Opcode::Not,
                });
            }
        }
        Ok(())
    }

    fn compile_delete(&mut self, argument: &Expression, span: Span) -> Result<()> {
        match argument {
            Expression::Identifier(id) => {
                if self.fd().strict {
                    return Err(Error::invalid_context(
                        "delete of an unqualified identifier in strict mode",
                        Self::loc(span),
                    ));
                }
                let atom = self.intern(&id.name);
                self.emit_scope_op(TempOpcode::ScopeDeleteVar, atom);
            }
            Expression::Member(m) => {
                if matches!(m.object, Expression::Super(_)) {
                    return Err(Error::unsupported("delete of a super property", Self::loc(span)));
                }
                if self.fd().chain_end.is_none() && chain_has_optional(argument) {
                    let end = self.new_label();
                    let saved = self.fd_mut().chain_end.replace(end);
                    let result = self.emit_delete_member(m, span);
                    self.fd_mut().chain_end = saved;
                    result?;
                    self.emit_label(end);
                } else {
                    self.emit_delete_member(m, span)?;
                }
            }
            Expression::Chain(c) => {
                let Expression::Member(m) = &c.expression else {
                    self.compile_expr(argument)?;
                    self.emit(Opcode::Drop);
                    self.emit(Opcode::PushTrue);
                    return Ok(());
                };
                let end = self.new_label();
                let saved = self.fd_mut().chain_end.replace(end);
                let result = self.emit_delete_member(m, span);
                self.fd_mut().chain_end = saved;
                result?;
                self.emit_label(end);
            }
            other => {
                self.compile_expr(other)?;
                self.emit(Opcode::Drop);
                self.emit(Opcode::PushTrue);
            }
        }
        Ok(())
    }

    fn emit_delete_member(&mut self, m: &MemberExpression, span: Span) -> Result<()> {
        self.compile_spine(&m.object)?;
        if m.optional {
            self.emit_optional_check(0)?;
        }
        match &m.property {
            MemberProperty::Identifier(name) => self.emit_atom_value(name),
            MemberProperty::Computed(key) => self.compile_expr(key)?,
            MemberProperty::PrivateName(_) => {
                return Err(Error::invalid_context("delete of a private field", Self::loc(span)))
            }
        }
        self.emit(Opcode::Delete);
        Ok(())
    }

    /// Jump to `target` keeping the value on top when `op` short-circuits
    fn emit_short_circuit(&mut self, op: LogicalOperator, target: LabelId) {
        self.emit(Opcode::Dup);
        match op {
            LogicalOperator::And => {
                self.emit_goto(Opcode::IfFalse, target);
            }
            LogicalOperator::Or => {
                self.emit_goto(Opcode::IfTrue, target);
            }
            LogicalOperator::NullishCoalescing => {
                self.emit(Opcode::IsUndefinedOrNull);
                self.emit_goto(Opcode::IfFalse, target);
            }
        }
    }

    fn compile_assignment(&mut self, a: &AssignmentExpression) -> Result<()> {
        let (target, name_hint) = match &a.left {
            Pattern::Identifier(id) => (Expression::Identifier(id.clone()), Some(self.intern(&id.name))),
            Pattern::Member(m) => (Expression::Member(m.clone()), None),
            pattern => {
                if a.operator != AssignmentOperator::Assign {
                    return Err(Error::invalid_context(
                        "invalid compound assignment target",
                        Self::loc(a.span),
                    ));
                }
                self.compile_expr(&a.right)?;
                self.emit(Opcode::Dup);
                return self.destructure(pattern, BindKind::Assign);
            }
        };

        if a.operator == AssignmentOperator::Assign {
            let r = self.emit_reference(&target, false)?;
            self.compile_expr_named(&a.right, name_hint)?;
            self.put_reference(r, true);
            return Ok(());
        }

        let r = self.emit_reference(&target, true)?;
        if let Some(op) = a.operator.logical() {
            let (short, end) = (self.new_label(), self.new_label());
            self.emit_short_circuit(op, short);
            self.emit(Opcode::Drop);
            self.compile_expr_named(&a.right, name_hint)?;
            self.put_reference(r, true);
            self.emit_goto(Opcode::Goto, end);
            self.emit_label(short);
            self.drop_reference(r);
            self.emit_label(end);
        } else if let Some(op) = a.operator.binary() {
            self.compile_expr(&a.right)?;
            self.emit(binary_opcode(op));
            self.put_reference(r, true);
        }
        Ok(())
    }

    // ========== Literals ==========

    fn compile_template(&mut self, t: &TemplateLiteral) -> Result<()> {
        let mut cooked = Vec::with_capacity(t.quasis.len());
        for q in &t.quasis {
            let text = q.cooked.as_ref().ok_or_else(|| {
                Error::invalid_context("invalid escape sequence in template", Self::loc(q.span))
            })?;
            cooked.push(text.as_str());
        }
        let first = cooked.first().copied().unwrap_or("");
        self.emit_atom_value(first);
        if t.expressions.is_empty() {
            return Ok(());
        }
        self.emit_op_atom(Opcode::GetField2, atoms::concat);
        let mut argc = 0u16;
        for (i, expr) in t.expressions.iter().enumerate() {
            self.compile_expr(expr)?;
            argc += 1;
            if let Some(text) = cooked.get(i + 1).filter(|s| !s.is_empty()) {
                self.emit_atom_value(text);
                argc += 1;
            }
        }
        self.emit_op_u16(Opcode::CallMethod, argc);
        Ok(())
    }

    fn emit_template_object(&mut self, t: &TemplateLiteral) {
        let cooked = t
            .quasis
            .iter()
            .map(|q| match &q.cooked {
                Some(s) => JsValue::string(s.clone()),
                None => JsValue::Undefined,
            })
            .collect();
        let raw = t.quasis.iter().map(|q| JsValue::string(q.raw.clone())).collect();
        self.emit_constant(JsValue::TemplateObject(Rc::new(TemplateObject { cooked, raw })));
    }

    fn compile_object(&mut self, o: &ObjectExpression) -> Result<()> {
        self.emit(Opcode::Object);
        for prop in &o.properties {
            let p = match prop {
                ObjectProperty::Spread(s) => {
                    self.compile_expr(&s.argument)?;
                    self.emit(Opcode::Null);
                    self.emit(Opcode::CopyDataProperties);
                    self.emit_u8(COPY_SPREAD_MASK);
                    self.emit(Opcode::Drop);
                    self.emit(Opcode::Drop);
                    continue;
                }
                ObjectProperty::Property(p) => p,
            };
            self.set_location(p.span);
            let method_kind = match p.kind {
                PropertyKind::Get => Some(METHOD_KIND_GETTER),
                PropertyKind::Set => Some(METHOD_KIND_SETTER),
                PropertyKind::Init if p.method => Some(METHOD_KIND_METHOD),
                PropertyKind::Init => None,
            };

            if let Some(kind) = method_kind {
                let Expression::Function(f) = &p.value else {
                    return Err(Error::invalid_context("method without a function body", Self::loc(p.span)));
                };
                let opts = FunctionOptions {
                    is_method: true,
                    ..FunctionOptions::default()
                };
                match &p.key {
                    PropertyKey::Computed(key) => {
                        self.compile_expr(key)?;
                        self.emit(Opcode::ToPropkey);
                        let child = self.compile_function(f, atoms::empty_string, opts)?;
                        self.emit_fclosure(child);
                        self.emit(Opcode::DefineMethodComputed);
                        self.emit_u8(kind | METHOD_ENUMERABLE);
                    }
                    key => {
                        let atom = self.property_key_atom(key).unwrap_or(atoms::empty_string);
                        let child = self.compile_function(f, atom, opts)?;
                        self.emit_fclosure(child);
                        self.emit_op_atom_u8(Opcode::DefineMethod, atom, kind | METHOD_ENUMERABLE);
                    }
                }
                continue;
            }

            match &p.key {
                PropertyKey::Computed(key) => {
                    self.compile_expr(key)?;
                    self.emit(Opcode::ToPropkey);
                    self.compile_expr(&p.value)?;
                    if p.value.is_anonymous_function_definition() {
                        self.emit(Opcode::SetNameComputed);
                    }
                    self.emit(Opcode::DefineArrayEl);
                    self.emit(Opcode::Drop);
                }
                PropertyKey::PrivateName(_) => {
                    return Err(Error::invalid_context("private name in an object literal", Self::loc(p.span)))
                }
                key => {
                    let atom = self.property_key_atom(key).unwrap_or(atoms::empty_string);
                    if atom == atoms::__proto__ && !p.shorthand {
                        self.compile_expr(&p.value)?;
                        self.emit(Opcode::SetProto);
                    } else {
                        self.compile_expr_named(&p.value, Some(atom))?;
                        self.emit_op_atom(Opcode::DefineField, atom);
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::AtomTable;
    use crate::bytecode::{insn, Op};
    use crate::compiler::CompileOptions;
    use pretty_assertions::assert_eq;

    fn emitted(e: &Expression) -> Result<Vec<Op>> {
        let mut atoms = AtomTable::new();
        let name = atoms.intern("f");
        let mut c = Compiler::new(&mut atoms, CompileOptions::default());
        let f = c.new_function(name, 1);
        c.cur = f;
        c.compile_expr(e)?;
        Ok(insn::decode_raw(c.fd().buf.as_bytes())?.into_iter().map(|i| i.op).collect())
    }

    #[test]
    fn test_bigint_literal_parsing() {
        assert_eq!(parse_bigint("123n"), Some(BigInt::from(123)));
        assert_eq!(parse_bigint("0xffn"), Some(BigInt::from(255)));
        assert_eq!(parse_bigint("1_000n"), Some(BigInt::from(1000)));
        assert_eq!(parse_bigint("zz"), None);
    }

    #[test]
    fn test_chain_detection() {
        let plain = Expression::Member(Box::new(MemberExpression {
            object: Expression::ident("a"),
            property: MemberProperty::Identifier("b".into()),
            optional: false,
            span: Span::default(),
        }));
        assert!(!chain_has_optional(&plain));
        let outer = Expression::Member(Box::new(MemberExpression {
            object: Expression::Member(Box::new(MemberExpression {
                object: Expression::ident("a"),
                property: MemberProperty::Identifier("b".into()),
                optional: true,
                span: Span::default(),
            })),
            property: MemberProperty::Identifier("c".into()),
            optional: false,
            span: Span::default(),
        }));
        assert!(chain_has_optional(&outer));
    }

    #[test]
    fn test_optional_member_uses_chain_ops() {
        let e = Expression::Member(Box::new(MemberExpression {
            object: Expression::ident("a"),
            property: MemberProperty::Identifier("b".into()),
            optional: true,
            span: Span::default(),
        }));
        assert_eq!(
            emitted(&e).unwrap(),
            vec![
                Op::Temp(TempOpcode::ScopeGetVar),
                Op::Temp(TempOpcode::OptionalChain),
                Op::Temp(TempOpcode::GetFieldOptChain),
                Op::Temp(TempOpcode::Label),
            ]
        );
    }

    #[test]
    fn test_super_outside_method_fails() {
        let e = Expression::Member(Box::new(MemberExpression {
            object: Expression::Super(Span::line(2)),
            property: MemberProperty::Identifier("x".into()),
            optional: false,
            span: Span::line(2),
        }));
        let err = emitted(&e).unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::InvalidContext);
    }
}
