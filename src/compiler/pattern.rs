//! Destructuring and assignment targets
//!
//! An assignment target is first pushed as a [`Reference`]: the values the
//! final store needs (object, key, ...) and, for compound assignments, the
//! current value on top. The store then consumes the reference parts.

use super::Compiler;
use crate::ast::{
    ArrayPattern, Expression, MemberExpression, MemberProperty, ObjectPattern, ObjectPatternProperty,
    Pattern, PropertyKey,
};
use crate::atom::{atoms, Atom};
use crate::bytecode::{Opcode, TempOpcode};
use crate::error::{Error, Result};

/// How destructured names are bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BindKind {
    /// Assignment expression: any target, const checks apply
    Assign,
    /// `var` declarations and parameters
    Var,
    /// `let`, `const` and class bindings: initializes the binding
    Lexical,
}

/// `copy_data_properties` operand: target at 0, source at 1, excluded
/// keys at 2, counted from the top of the stack
const COPY_REST_MASK: u8 = (1 << 2) | (2 << 5);

/// A pushed assignment target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reference {
    /// Resolved binding, nothing on the stack
    Var(Atom),
    /// Binding that a `with` object may shadow: `[obj, prop]`
    Ref(Atom),
    /// `[obj]`
    Field(Atom),
    /// `[obj, key]`
    Computed,
    /// `[obj]`
    Private(Atom),
    /// `[this, home_proto, key]`
    Super,
}

impl Reference {
    /// Stack slots held below the value
    pub(crate) fn depth(self) -> u32 {
        match self {
            Reference::Var(_) => 0,
            Reference::Field(_) | Reference::Private(_) => 1,
            Reference::Ref(_) | Reference::Computed => 2,
            Reference::Super => 3,
        }
    }
}

impl Compiler<'_> {
    /// Atom of a non-computed property key
    pub(crate) fn property_key_atom(&mut self, key: &PropertyKey) -> Option<Atom> {
        match key {
            PropertyKey::PrivateName(name) => Some(self.private_atom(name)),
            key => key.static_name().map(|name| self.intern(&name)),
        }
    }

    /// Variable name of a private member: `#name`
    pub(crate) fn private_atom(&mut self, name: &str) -> Atom {
        if name.starts_with('#') {
            self.intern(name)
        } else {
            self.intern(&format!("#{}", name))
        }
    }

    /// Replace `undefined` on top of the stack with a default value
    pub(crate) fn emit_default_value(&mut self, default: &Expression, name: Option<Atom>) -> Result<()> {
        let present = self.new_label();
        self.emit(Opcode::Dup);
        self.emit(Opcode::Undefined);
        self.emit(Opcode::StrictEq);
        self.emit_goto(Opcode::IfFalse, present);
        self.emit(Opcode::Drop);
        self.compile_expr_named(default, name)?;
        self.emit_label(present);
        Ok(())
    }

    /// Bind the value on top of the stack to `pattern`, consuming it
    pub(crate) fn destructure(&mut self, pattern: &Pattern, kind: BindKind) -> Result<()> {
        match pattern {
            Pattern::Identifier(id) => {
                let name = self.intern(&id.name);
                self.store_binding(name, kind);
                Ok(())
            }
            Pattern::Assignment(a) => {
                let name = match &a.left {
                    Pattern::Identifier(id) => Some(self.intern(&id.name)),
                    _ => None,
                };
                self.emit_default_value(&a.right, name)?;
                self.destructure(&a.left, kind)
            }
            Pattern::Object(obj) => self.destructure_object(obj, kind),
            Pattern::Array(arr) => self.destructure_array(arr, kind),
            Pattern::Member(m) => {
                if kind != BindKind::Assign {
                    return Err(Error::invalid_context(
                        "member expression in a binding pattern",
                        Self::loc(m.span),
                    ));
                }
                let r = self.emit_member_reference(m, false)?;
                self.rotate_value_above(r);
                self.put_reference(r, false);
                Ok(())
            }
            Pattern::Rest(r) => Err(Error::invalid_context(
                "rest element outside of a pattern",
                Self::loc(r.span),
            )),
        }
    }

    fn store_binding(&mut self, name: Atom, kind: BindKind) {
        let op = match kind {
            BindKind::Lexical => TempOpcode::ScopePutVarInit,
            BindKind::Assign | BindKind::Var => TempOpcode::ScopePutVar,
        };
        self.emit_scope_op(op, name);
    }

    fn destructure_object(&mut self, pattern: &ObjectPattern, kind: BindKind) -> Result<()> {
        let has_rest = matches!(pattern.properties.last(), Some(ObjectPatternProperty::Rest { .. }));
        if has_rest {
            let computed = pattern.properties.iter().any(|p| {
                matches!(
                    p,
                    ObjectPatternProperty::Property {
                        key: PropertyKey::Computed(_),
                        ..
                    }
                )
            });
            if computed {
                return Err(Error::unsupported(
                    "computed key in an object pattern with a rest element",
                    Self::loc(pattern.span),
                ));
            }
            // excluded keys go below the source
            self.emit(Opcode::Object);
            self.emit(Opcode::Swap);
        }

        for prop in &pattern.properties {
            match prop {
                ObjectPatternProperty::Property { key, value, .. } => {
                    self.emit(Opcode::Dup);
                    let atom = match key {
                        PropertyKey::Computed(expr) => {
                            self.compile_expr(expr)?;
                            self.emit(Opcode::GetArrayEl);
                            None
                        }
                        key => {
                            let atom = self.property_key_atom(key).unwrap_or(atoms::empty_string);
                            self.emit_op_atom(Opcode::GetField, atom);
                            Some(atom)
                        }
                    };
                    self.destructure(value, kind)?;
                    if let (true, Some(atom)) = (has_rest, atom) {
                        self.emit(Opcode::Swap);
                        self.emit(Opcode::Null);
                        self.emit_op_atom(Opcode::DefineField, atom);
                        self.emit(Opcode::Swap);
                    }
                }
                ObjectPatternProperty::Rest { argument, .. } => {
                    self.emit(Opcode::Object);
                    self.emit(Opcode::CopyDataProperties);
                    self.emit_u8(COPY_REST_MASK);
                    self.destructure(argument, kind)?;
                    self.emit(Opcode::Drop);
                }
            }
        }
        self.emit(Opcode::Drop);
        Ok(())
    }

    fn destructure_array(&mut self, pattern: &ArrayPattern, kind: BindKind) -> Result<()> {
        self.emit(Opcode::ForOfStart);
        for element in &pattern.elements {
            match element {
                None => {
                    self.emit(Opcode::ForOfNext);
                    self.emit_u8(0);
                    self.emit(Opcode::Drop);
                    self.emit(Opcode::Drop);
                }
                Some(Pattern::Rest(rest)) => {
                    let (next, done) = (self.new_label(), self.new_label());
                    self.emit(Opcode::ArrayFrom);
                    self.emit_u16(0);
                    self.emit_push_i32(0);
                    self.emit_label(next);
                    self.emit(Opcode::ForOfNext);
                    self.emit_u8(2);
                    self.emit_goto(Opcode::IfTrue, done);
                    self.emit(Opcode::DefineArrayEl);
                    self.emit(Opcode::Inc);
                    self.emit_goto(Opcode::Goto, next);
                    self.emit_label(done);
                    self.emit(Opcode::Drop);
                    self.emit(Opcode::Drop);
                    self.destructure(&rest.argument, kind)?;
                }
                Some(element) => {
                    self.emit(Opcode::ForOfNext);
                    self.emit_u8(0);
                    self.emit(Opcode::Drop);
                    self.destructure(element, kind)?;
                }
            }
        }
        self.emit(Opcode::IteratorClose);
        Ok(())
    }

    // ========== References ==========

    /// Push the parts of an identifier target
    pub(crate) fn emit_identifier_reference(&mut self, name: Atom, read: bool) -> Reference {
        if self.has_with_scope() {
            let label = self.new_label();
            let scope = self.fd().scopes.current();
            self.emit_op_atom(TempOpcode::ScopeMakeRef, name);
            self.emit_label_ref(label);
            self.emit_u16(scope as u16);
            if read {
                self.emit(Opcode::GetRefValue);
            }
            Reference::Ref(name)
        } else {
            if read {
                self.emit_scope_op(TempOpcode::ScopeGetVar, name);
            }
            Reference::Var(name)
        }
    }

    /// Push the parts of a member target and, when `read`, its value
    pub(crate) fn emit_member_reference(&mut self, m: &MemberExpression, read: bool) -> Result<Reference> {
        if m.optional {
            return Err(Error::invalid_context(
                "optional chain as an assignment target",
                Self::loc(m.span),
            ));
        }
        if let Expression::Super(span) = &m.object {
            self.emit_super_base(*span)?;
            match &m.property {
                MemberProperty::Identifier(name) => self.emit_atom_value(name),
                MemberProperty::Computed(key) => {
                    self.compile_expr(key)?;
                    self.emit(Opcode::ToPropkey);
                }
                MemberProperty::PrivateName(_) => {
                    return Err(Error::invalid_context("private name on super", Self::loc(m.span)))
                }
            }
            if read {
                self.emit(Opcode::Dup3);
                self.emit(Opcode::GetSuperValue);
            }
            return Ok(Reference::Super);
        }

        self.compile_expr(&m.object)?;
        Ok(match &m.property {
            MemberProperty::Identifier(name) => {
                let atom = self.intern(name);
                if read {
                    self.emit_op_atom(Opcode::GetField2, atom);
                }
                Reference::Field(atom)
            }
            MemberProperty::Computed(key) => {
                self.compile_expr(key)?;
                if read {
                    self.emit(Opcode::ToPropkey2);
                    self.emit(Opcode::Dup2);
                    self.emit(Opcode::GetArrayEl);
                }
                Reference::Computed
            }
            MemberProperty::PrivateName(name) => {
                let atom = self.private_atom(name);
                if read {
                    self.emit_scope_op(TempOpcode::ScopeGetPrivateField2, atom);
                }
                Reference::Private(atom)
            }
        })
    }

    /// Push the parts of an assignment target expression
    pub(crate) fn emit_reference(&mut self, target: &Expression, read: bool) -> Result<Reference> {
        match target {
            Expression::Identifier(id) => {
                let name = self.intern(&id.name);
                self.check_assignable(name, id.span)?;
                Ok(self.emit_identifier_reference(name, read))
            }
            Expression::Member(m) => self.emit_member_reference(m, read),
            other => Err(Error::invalid_context(
                "invalid assignment target",
                Self::loc(other.span()),
            )),
        }
    }

    /// `eval` and `arguments` cannot be assigned in strict code
    pub(crate) fn check_assignable(&mut self, name: Atom, span: crate::ast::Span) -> Result<()> {
        if self.fd().strict && (name == atoms::eval || name == atoms::arguments) {
            return Err(Error::invalid_context(
                format!("invalid assignment to '{}' in strict mode", self.atoms.display_name(name)),
                Self::loc(span),
            ));
        }
        Ok(())
    }

    /// Store the value on top of the stack through `r`; with `keep` the
    /// value stays on the stack
    pub(crate) fn put_reference(&mut self, r: Reference, keep: bool) {
        let insert = match r.depth() {
            0 => Opcode::Dup,
            1 => Opcode::Insert2,
            2 => Opcode::Insert3,
            _ => Opcode::Insert4,
        };
        if keep {
            self.emit(insert);
        }
        match r {
            Reference::Var(name) => self.emit_scope_op(TempOpcode::ScopePutVar, name),
            Reference::Ref(_) => self.emit(Opcode::PutRefValue),
            Reference::Field(atom) => self.emit_op_atom(Opcode::PutField, atom),
            Reference::Computed => self.emit(Opcode::PutArrayEl),
            Reference::Private(atom) => self.emit_scope_op(TempOpcode::ScopePutPrivateField, atom),
            Reference::Super => self.emit(Opcode::PutSuperValue),
        }
    }

    /// Move a value pushed before the reference parts above them
    fn rotate_value_above(&mut self, r: Reference) {
        match r.depth() {
            0 => {}
            1 => self.emit(Opcode::Swap),
            2 => self.emit(Opcode::Rot3l),
            _ => self.emit(Opcode::Rot4l),
        }
    }

    /// Move the old value of a postfix update below the reference parts
    pub(crate) fn sink_old_value(&mut self, r: Reference) {
        match r.depth() {
            0 => {}
            1 => self.emit(Opcode::Perm3),
            2 => self.emit(Opcode::Perm4),
            _ => self.emit(Opcode::Perm5),
        }
    }

    /// Drop the reference parts below the value on top
    pub(crate) fn drop_reference(&mut self, r: Reference) {
        for _ in 0..r.depth() {
            self.emit(Opcode::Nip);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Identifier, Span};
    use crate::atom::AtomTable;
    use crate::bytecode::{insn, Op};
    use crate::compiler::CompileOptions;
    use pretty_assertions::assert_eq;

    fn emitted(build: impl FnOnce(&mut Compiler) -> Result<()>) -> Result<Vec<Op>> {
        let mut atoms = AtomTable::new();
        let name = atoms.intern("f");
        let mut c = Compiler::new(&mut atoms, CompileOptions::default());
        let f = c.new_function(name, 1);
        c.cur = f;
        build(&mut c)?;
        Ok(insn::decode_raw(c.fd().buf.as_bytes())?.into_iter().map(|i| i.op).collect())
    }

    fn prop(key: &str, value: Pattern) -> ObjectPatternProperty {
        ObjectPatternProperty::Property {
            key: PropertyKey::Identifier(key.to_string()),
            value,
            shorthand: false,
            span: Span::default(),
        }
    }

    #[test]
    fn test_object_pattern() {
        let pattern = Pattern::Object(ObjectPattern {
            properties: vec![prop("a", Pattern::ident("a"))],
            span: Span::default(),
        });
        let ops = emitted(|c| c.destructure(&pattern, BindKind::Lexical)).unwrap();
        assert_eq!(
            ops,
            vec![
                Op::Final(Opcode::Dup),
                Op::Final(Opcode::GetField),
                Op::Temp(TempOpcode::ScopePutVarInit),
                Op::Final(Opcode::Drop),
            ]
        );
    }

    #[test]
    fn test_object_rest_collects_excluded_keys() {
        let pattern = Pattern::Object(ObjectPattern {
            properties: vec![
                prop("a", Pattern::ident("a")),
                ObjectPatternProperty::Rest {
                    argument: Pattern::ident("rest"),
                    span: Span::default(),
                },
            ],
            span: Span::default(),
        });
        let ops = emitted(|c| c.destructure(&pattern, BindKind::Var)).unwrap();
        assert_eq!(ops[..2], [Op::Final(Opcode::Object), Op::Final(Opcode::Swap)]);
        assert!(ops.contains(&Op::Final(Opcode::DefineField)));
        assert!(ops.contains(&Op::Final(Opcode::CopyDataProperties)));
        assert_eq!(ops[ops.len() - 2..], [Op::Final(Opcode::Drop), Op::Final(Opcode::Drop)]);
    }

    #[test]
    fn test_array_pattern_with_hole() {
        let pattern = Pattern::Array(ArrayPattern {
            elements: vec![None, Some(Pattern::ident("b"))],
            span: Span::default(),
        });
        let ops = emitted(|c| c.destructure(&pattern, BindKind::Assign)).unwrap();
        assert_eq!(
            ops,
            vec![
                Op::Final(Opcode::ForOfStart),
                Op::Final(Opcode::ForOfNext),
                Op::Final(Opcode::Drop),
                Op::Final(Opcode::Drop),
                Op::Final(Opcode::ForOfNext),
                Op::Final(Opcode::Drop),
                Op::Temp(TempOpcode::ScopePutVar),
                Op::Final(Opcode::IteratorClose),
            ]
        );
    }

    #[test]
    fn test_member_in_declaration_is_rejected() {
        let pattern = Pattern::Member(Box::new(MemberExpression {
            object: Expression::Identifier(Identifier::new("o", Span::default())),
            property: MemberProperty::Identifier("x".to_string()),
            optional: false,
            span: Span::default(),
        }));
        let err = emitted(|c| c.destructure(&pattern, BindKind::Lexical)).unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::InvalidContext);
    }

    #[test]
    fn test_computed_key_with_rest_is_unsupported() {
        let pattern = Pattern::Object(ObjectPattern {
            properties: vec![
                ObjectPatternProperty::Property {
                    key: PropertyKey::Computed(Box::new(Expression::number(1.0))),
                    value: Pattern::ident("a"),
                    shorthand: false,
                    span: Span::default(),
                },
                ObjectPatternProperty::Rest {
                    argument: Pattern::ident("r"),
                    span: Span::default(),
                },
            ],
            span: Span::default(),
        });
        let err = emitted(|c| c.destructure(&pattern, BindKind::Var)).unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::UnsupportedConstruct);
    }
}
