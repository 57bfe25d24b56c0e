//! Variable resolution
//!
//! Rewrites the scope-relative placeholders of one function into concrete
//! accesses and prepends the function prologue. A name is looked up in the
//! lexical chain of the scope it was used in, then among function-level
//! variables and arguments, then among the implicit bindings the function
//! provides, then among the variables it already captured, and finally in
//! the enclosing function starting from the scope the function was defined
//! in. Whatever is not found anywhere is a global.
//!
//! `with` objects met on the way do not stop the lookup; each one becomes a
//! runtime `with` lookup emitted in front of the resolved access.

use super::{
    Compiler, DEFINE_GLOBAL_FUNC_VAR, DEFINE_GLOBAL_LEX_VAR, PROP_WRITABLE, THROW_VAR_RO,
};
use crate::atom::{atoms, Atom};
use crate::bytecode::opcode::SpecialObject;
use crate::bytecode::{insn, Arg, FuncId, Insn, LabelId, Op, Opcode, TempOpcode};
use crate::error::{Error, Result, SourceLocation};
use crate::value::{ClosureVar, VarKind};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VarLoc {
    Local(u32),
    Arg(u32),
    Closure(u32),
}

/// Facts about a resolved binding that decide the access opcode
#[derive(Debug, Clone, Copy)]
struct Binding {
    loc: VarLoc,
    kind: VarKind,
    is_const: bool,
    is_lexical: bool,
}

/// Rewrite the raw stream of function `id`
pub(crate) fn resolve_variables(c: &mut Compiler, id: FuncId) -> Result<()> {
    let insns = insn::decode_raw(c.funcs[id].buf.as_bytes())?;
    let mut out = Vec::with_capacity(insns.len() + 8);
    let mut line = c.funcs[id].line_num;
    for i in insns {
        match i.op {
            Op::Final(_) => out.push(i),
            Op::Temp(TempOpcode::LineNum) => {
                line = i.arg.int().unwrap_or(0) as u32;
                out.push(i);
            }
            Op::Temp(op) => lower(c, id, op, i.arg, line, &mut out)?,
        }
    }
    let mut code = prologue(c, id);
    code.extend(out);
    trace!(func = id, insns = code.len(), "resolved variables");
    c.funcs[id].buf.replace(insn::encode_raw(&code));
    Ok(())
}

fn lower(c: &mut Compiler, id: FuncId, op: TempOpcode, arg: Arg, line: u32, out: &mut Vec<Insn>) -> Result<()> {
    let loc = SourceLocation::new(line, 0);
    match (op, arg) {
        (TempOpcode::Label, _) => out.push(Insn::new(op, arg)),
        (TempOpcode::EnterScope, Arg::Int(scope)) => enter_scope(c, id, scope as u32, out),
        (TempOpcode::LeaveScope, Arg::Int(scope)) => {
            let fd = &c.funcs[id];
            for idx in fd.scopes.scope_vars(scope as u32) {
                if fd.scopes.var(idx).is_captured {
                    out.push(Insn::new(Opcode::CloseLoc, Arg::Int(idx as i32)));
                }
            }
        }
        (TempOpcode::ScopeMakeRef, Arg::AtomLabel(name, label, scope)) => {
            access(c, id, op, name, scope, Some(label), out)
        }
        (
            TempOpcode::ScopeGetPrivateField
            | TempOpcode::ScopeGetPrivateField2
            | TempOpcode::ScopePutPrivateField
            | TempOpcode::ScopeInPrivateField,
            Arg::AtomInt(name, scope),
        ) => private_field(c, id, op, name, scope, loc, out)?,
        (_, Arg::AtomInt(name, scope)) if op.format() == crate::bytecode::Format::AtomU16 => {
            access(c, id, op, name, scope, None, out)
        }
        (TempOpcode::GetFieldOptChain, Arg::Atom(name)) => {
            out.push(Insn::new(Opcode::GetField, Arg::Atom(name)))
        }
        (TempOpcode::GetArrayElOptChain, _) => out.push(Insn::simple(Opcode::GetArrayEl)),
        (TempOpcode::OptionalChain, Arg::Label(end)) => {
            let present = c.funcs[id].labels.new_label();
            out.extend([
                Insn::simple(Opcode::Dup),
                Insn::simple(Opcode::IsUndefinedOrNull),
                Insn::new(Opcode::IfFalse, Arg::Label(present)),
                Insn::simple(Opcode::Drop),
                Insn::simple(Opcode::Undefined),
                Insn::new(Opcode::Goto, Arg::Label(end)),
                Insn::label(present),
            ]);
        }
        _ => {
            return Err(Error::internal(format!(
                "malformed temporary instruction {} {:?}",
                op, arg
            )))
        }
    }
    Ok(())
}

/// Initialize the bindings of a scope on entry
fn enter_scope(c: &Compiler, id: FuncId, scope: u32, out: &mut Vec<Insn>) {
    let scopes = &c.funcs[id].scopes;
    for idx in scopes.scope_vars(scope) {
        if let Some(cpool_idx) = scopes.func_init(idx) {
            out.push(Insn::new(Opcode::FClosure, Arg::Int(cpool_idx as i32)));
            out.push(Insn::new(Opcode::PutLoc, Arg::Int(idx as i32)));
        } else if scopes.var(idx).is_lexical {
            out.push(Insn::new(Opcode::SetLocUninitialized, Arg::Int(idx as i32)));
        }
    }
}

// ========== Lookup ==========

/// Resolve `name` as seen from `scope` of function `f`. Returns the binding
/// (`None` for a global) and the `with` objects to search, innermost first.
fn lookup(c: &mut Compiler, f: FuncId, name: Atom, scope: u32) -> (Option<VarLoc>, Vec<VarLoc>) {
    let mut withs = Vec::new();
    {
        let scopes = &c.funcs[f].scopes;
        for idx in scopes.chain(scope) {
            let var = scopes.var(idx);
            if var.name == name {
                return (Some(VarLoc::Local(idx)), withs);
            }
            if var.name == atoms::_with_ {
                withs.push(VarLoc::Local(idx));
            }
        }
        if let Some(idx) = scopes.find_var(name) {
            return (Some(VarLoc::Local(idx)), withs);
        }
        if let Some(idx) = scopes.find_arg(name) {
            return (Some(VarLoc::Arg(idx)), withs);
        }
    }
    if let Some(idx) = special_var(c, f, name) {
        return (Some(VarLoc::Local(idx)), withs);
    }
    if let Some(idx) = c.funcs[f].find_closure_var(name) {
        return (Some(VarLoc::Closure(idx)), withs);
    }
    let Some(parent) = c.funcs[f].parent else {
        return (None, withs);
    };
    let parent_scope = c.funcs[f].parent_scope;
    let (found, outer_withs) = lookup(c, parent, name, parent_scope);
    for p in outer_withs {
        withs.push(VarLoc::Closure(capture(c, f, parent, p, atoms::_with_)));
    }
    (found.map(|l| VarLoc::Closure(capture(c, f, parent, l, name))), withs)
}

/// Implicit binding of `name` in function `f`, created on first use
fn special_var(c: &mut Compiler, f: FuncId, name: Atom) -> Option<u32> {
    let fd = &mut c.funcs[f];
    let plain = !fd.is_arrow && !fd.is_top_level();
    let slot = if name == atoms::this && !fd.is_arrow {
        &mut fd.specials.this
    } else if name == atoms::new_target && plain {
        &mut fd.specials.new_target
    } else if name == atoms::arguments && plain && !fd.is_field_initializer {
        &mut fd.specials.arguments
    } else if name == atoms::home_object && fd.is_method {
        &mut fd.specials.home_object
    } else if name == atoms::this_active_func && plain {
        &mut fd.specials.this_active_func
    } else if fd.func_name_binding == Some(name) {
        &mut fd.specials.func_name
    } else {
        return None;
    };
    if let Some(idx) = *slot {
        return Some(idx);
    }
    let idx = fd.scopes.add_var(name);
    *slot = Some(idx);
    if fd.func_name_binding == Some(name) && name != atoms::this {
        fd.scopes.var_mut(idx).kind = VarKind::FunctionName;
    }
    if name == atoms::this && fd.is_derived_constructor {
        fd.scopes.var_mut(idx).is_lexical = true;
    }
    Some(idx)
}

/// Make binding `loc` of `parent` available to its child `f`, returning
/// the closure variable index in `f`
fn capture(c: &mut Compiler, f: FuncId, parent: FuncId, loc: VarLoc, name: Atom) -> u32 {
    let (is_local, is_arg, var_idx, is_const, is_lexical, kind) = match loc {
        VarLoc::Local(idx) => {
            let var = c.funcs[parent].scopes.var_mut(idx);
            var.is_captured = true;
            (true, false, idx, var.is_const, var.is_lexical, var.kind)
        }
        VarLoc::Arg(idx) => (true, true, idx, false, false, VarKind::Normal),
        VarLoc::Closure(idx) => {
            let cv = &c.funcs[parent].closure_vars[idx as usize];
            (false, false, idx, cv.is_const, cv.is_lexical, cv.kind)
        }
    };
    let fd = &mut c.funcs[f];
    if let Some(k) = fd
        .closure_vars
        .iter()
        .position(|cv| cv.is_local == is_local && cv.is_arg == is_arg && cv.var_idx as u32 == var_idx)
    {
        return k as u32;
    }
    fd.closure_vars.push(ClosureVar {
        name,
        var_idx: var_idx as u16,
        is_local,
        is_arg,
        is_const,
        is_lexical,
        kind,
    });
    (fd.closure_vars.len() - 1) as u32
}

fn binding(c: &Compiler, f: FuncId, loc: VarLoc) -> Binding {
    let fd = &c.funcs[f];
    match loc {
        VarLoc::Local(idx) => {
            let var = fd.scopes.var(idx);
            Binding {
                loc,
                kind: var.kind,
                is_const: var.is_const,
                is_lexical: var.is_lexical,
            }
        }
        VarLoc::Arg(_) => Binding {
            loc,
            kind: VarKind::Normal,
            is_const: false,
            is_lexical: false,
        },
        VarLoc::Closure(idx) => {
            let cv = &fd.closure_vars[idx as usize];
            Binding {
                loc,
                kind: cv.kind,
                is_const: cv.is_const,
                is_lexical: cv.is_lexical,
            }
        }
    }
}

// ========== Lowering ==========

/// Read a binding, with a TDZ check when `checked` and the binding is lexical
fn get_insn(b: &Binding, checked: bool) -> Insn {
    let check = checked && b.is_lexical;
    match b.loc {
        VarLoc::Local(i) => Insn::new(
            if check { Opcode::GetLocCheck } else { Opcode::GetLoc },
            Arg::Int(i as i32),
        ),
        VarLoc::Arg(i) => Insn::new(Opcode::GetArg, Arg::Int(i as i32)),
        VarLoc::Closure(i) => Insn::new(
            if check { Opcode::GetVarRefCheck } else { Opcode::GetVarRef },
            Arg::Int(i as i32),
        ),
    }
}

fn put_insns(b: &Binding, name: Atom, strict: bool, out: &mut Vec<Insn>) {
    if b.kind == VarKind::FunctionName {
        if strict {
            out.push(Insn::new(Opcode::ThrowError, Arg::AtomInt(name, THROW_VAR_RO as u32)));
        } else {
            out.push(Insn::simple(Opcode::Drop));
        }
        return;
    }
    if b.is_const {
        out.push(Insn::new(Opcode::ThrowError, Arg::AtomInt(name, THROW_VAR_RO as u32)));
        return;
    }
    out.push(match b.loc {
        VarLoc::Local(i) => Insn::new(
            if b.is_lexical { Opcode::PutLocCheck } else { Opcode::PutLoc },
            Arg::Int(i as i32),
        ),
        VarLoc::Arg(i) => Insn::new(Opcode::PutArg, Arg::Int(i as i32)),
        VarLoc::Closure(i) => Insn::new(
            if b.is_lexical { Opcode::PutVarRefCheck } else { Opcode::PutVarRef },
            Arg::Int(i as i32),
        ),
    });
}

fn init_insn(b: &Binding, name: Atom) -> Insn {
    let this_check = name == atoms::this && b.is_lexical;
    match b.loc {
        VarLoc::Local(i) => Insn::new(
            if this_check { Opcode::PutLocCheckInit } else { Opcode::PutLoc },
            Arg::Int(i as i32),
        ),
        VarLoc::Arg(i) => Insn::new(Opcode::PutArg, Arg::Int(i as i32)),
        VarLoc::Closure(i) => Insn::new(
            if this_check { Opcode::PutVarRefCheckInit } else { Opcode::PutVarRef },
            Arg::Int(i as i32),
        ),
    }
}

fn with_opcode(op: TempOpcode) -> Opcode {
    match op {
        TempOpcode::ScopePutVar | TempOpcode::ScopePutVarInit => Opcode::WithPutVar,
        TempOpcode::ScopeDeleteVar => Opcode::WithDeleteVar,
        TempOpcode::ScopeMakeRef => Opcode::WithMakeRef,
        TempOpcode::ScopeGetRef => Opcode::WithGetRef,
        _ => Opcode::WithGetVar,
    }
}

/// Lower a plain variable access
fn access(
    c: &mut Compiler,
    id: FuncId,
    op: TempOpcode,
    name: Atom,
    scope: u32,
    ref_label: Option<LabelId>,
    out: &mut Vec<Insn>,
) {
    let (found, withs) = lookup(c, id, name, scope);
    let done = match ref_label {
        Some(label) => Some(label),
        None if !withs.is_empty() => Some(c.funcs[id].labels.new_label()),
        None => None,
    };
    for obj in &withs {
        let b = binding(c, id, *obj);
        out.push(get_insn(&b, false));
        let target = done.unwrap_or_default();
        out.push(Insn::new(with_opcode(op), Arg::AtomLabel(name, target, 1)));
    }

    let strict = c.funcs[id].strict;
    let b = found.map(|loc| binding(c, id, loc));
    match (op, b) {
        (TempOpcode::ScopeGetVar | TempOpcode::ScopeGetVarCheckthis | TempOpcode::ScopeGetVarUndef, Some(b)) => {
            out.push(get_insn(&b, true))
        }
        (TempOpcode::ScopeGetVarUndef, None) => out.push(Insn::new(Opcode::GetVarUndef, Arg::Atom(name))),
        (TempOpcode::ScopeGetVar | TempOpcode::ScopeGetVarCheckthis, None) => {
            out.push(Insn::new(Opcode::GetVar, Arg::Atom(name)))
        }
        (TempOpcode::ScopePutVar, Some(b)) => put_insns(&b, name, strict, out),
        (TempOpcode::ScopePutVar, None) => out.push(Insn::new(Opcode::PutVar, Arg::Atom(name))),
        (TempOpcode::ScopePutVarInit, Some(b)) => out.push(init_insn(&b, name)),
        (TempOpcode::ScopePutVarInit, None) => out.push(Insn::new(Opcode::PutVarInit, Arg::Atom(name))),
        (TempOpcode::ScopeDeleteVar, Some(_)) => out.push(Insn::simple(Opcode::PushFalse)),
        (TempOpcode::ScopeDeleteVar, None) => out.push(Insn::new(Opcode::DeleteVar, Arg::Atom(name))),
        (TempOpcode::ScopeGetRef, b) => {
            out.push(Insn::simple(Opcode::Undefined));
            out.push(match b {
                Some(b) => get_insn(&b, true),
                None => Insn::new(Opcode::GetVar, Arg::Atom(name)),
            });
        }
        (TempOpcode::ScopeMakeRef, b) => out.push(match b.map(|b| b.loc) {
            Some(VarLoc::Local(i)) => Insn::new(Opcode::MakeLocRef, Arg::AtomInt(name, i)),
            Some(VarLoc::Arg(i)) => Insn::new(Opcode::MakeArgRef, Arg::AtomInt(name, i)),
            Some(VarLoc::Closure(i)) => Insn::new(Opcode::MakeVarRefRef, Arg::AtomInt(name, i)),
            None => Insn::new(Opcode::MakeVarRef, Arg::Atom(name)),
        }),
        _ => {}
    }
    if let Some(label) = done {
        out.push(Insn::label(label));
    }
}

/// Lower an access to a private class member
fn private_field(
    c: &mut Compiler,
    id: FuncId,
    op: TempOpcode,
    name: Atom,
    scope: u32,
    loc: SourceLocation,
    out: &mut Vec<Insn>,
) -> Result<()> {
    let (found, _) = lookup(c, id, name, scope);
    let Some(found) = found else {
        return Err(Error::invalid_context(
            format!("undefined private field '{}'", c.atoms.display_name(name)),
            loc,
        ));
    };
    let b = binding(c, id, found);
    let get = get_insn(&b, false);
    let call = |n: i32| Insn::new(Opcode::CallMethod, Arg::Int(n));
    let not_allowed = |what: &str, c: &Compiler| {
        Error::invalid_context(format!("{} '{}'", what, c.atoms.display_name(name)), loc)
    };

    match op {
        TempOpcode::ScopeInPrivateField => {
            if b.kind == VarKind::PrivateField {
                out.push(get);
            } else {
                let (brand, _) = lookup(c, id, atoms::brand, scope);
                let brand = brand.ok_or_else(|| not_allowed("no brand for private name", c))?;
                out.push(get_insn(&binding(c, id, brand), false));
            }
            out.push(Insn::simple(Opcode::PrivateIn));
        }
        TempOpcode::ScopeGetPrivateField | TempOpcode::ScopeGetPrivateField2 => {
            let keep = op == TempOpcode::ScopeGetPrivateField2;
            match b.kind {
                VarKind::PrivateField => {
                    if keep {
                        out.push(Insn::simple(Opcode::Dup));
                    }
                    out.extend([get, Insn::simple(Opcode::GetPrivateField)]);
                }
                VarKind::PrivateMethod => {
                    out.extend([get, Insn::simple(Opcode::CheckBrand)]);
                    if !keep {
                        out.push(Insn::simple(Opcode::Nip));
                    }
                }
                VarKind::PrivateGetter | VarKind::PrivateGetterSetter => {
                    if keep {
                        out.push(Insn::simple(Opcode::Dup));
                    }
                    out.extend([get, Insn::simple(Opcode::CheckBrand), call(0)]);
                }
                _ => return Err(not_allowed("private name has no getter", c)),
            }
        }
        TempOpcode::ScopePutPrivateField => match b.kind {
            VarKind::PrivateField => out.extend([get, Insn::simple(Opcode::PutPrivateField)]),
            VarKind::PrivateSetter | VarKind::PrivateGetterSetter => {
                let setter = if b.kind == VarKind::PrivateSetter {
                    get
                } else {
                    let setter_name = setter_atom(c, name);
                    let (found, _) = lookup(c, id, setter_name, scope);
                    let found = found.ok_or_else(|| not_allowed("private name has no setter", c))?;
                    get_insn(&binding(c, id, found), false)
                };
                out.extend([
                    Insn::simple(Opcode::Swap),
                    setter,
                    Insn::simple(Opcode::CheckBrand),
                    Insn::simple(Opcode::Rot3l),
                    call(1),
                    Insn::simple(Opcode::Drop),
                ]);
            }
            _ => return Err(not_allowed("private name is not writable", c)),
        },
        _ => return Err(Error::internal(format!("{} is not a private field access", op))),
    }
    Ok(())
}

/// Name of the variable holding the setter of a private accessor pair
pub(crate) fn setter_atom(c: &mut Compiler, name: Atom) -> Atom {
    let text = format!("{}<set>", c.atoms.display_name(name));
    c.intern(&text)
}

// ========== Prologue ==========

fn special_object(kind: SpecialObject, idx: u32, out: &mut Vec<Insn>) {
    out.push(Insn::new(Opcode::SpecialObject, Arg::Int(kind as i32)));
    out.push(Insn::new(Opcode::PutLoc, Arg::Int(idx as i32)));
}

/// Initialization of implicit bindings and hoisted declarations
fn prologue(c: &Compiler, id: FuncId) -> Vec<Insn> {
    let fd = &c.funcs[id];
    let sp = fd.specials;
    let mut out = Vec::new();

    if let Some(idx) = sp.home_object {
        special_object(SpecialObject::HomeObject, idx, &mut out);
    }
    if let Some(idx) = sp.this_active_func {
        special_object(SpecialObject::ThisFunc, idx, &mut out);
    }
    if let Some(idx) = sp.new_target {
        special_object(SpecialObject::NewTarget, idx, &mut out);
    }
    if let Some(idx) = sp.this {
        if fd.is_derived_constructor {
            out.push(Insn::new(Opcode::SetLocUninitialized, Arg::Int(idx as i32)));
        } else {
            out.push(Insn::simple(Opcode::PushThis));
            out.push(Insn::new(Opcode::PutLoc, Arg::Int(idx as i32)));
        }
    }
    if let Some(idx) = sp.arguments {
        let kind = if fd.strict || !fd.has_simple_params {
            SpecialObject::Arguments
        } else {
            SpecialObject::MappedArguments
        };
        special_object(kind, idx, &mut out);
    }
    if let Some(idx) = sp.func_name {
        special_object(SpecialObject::ThisFunc, idx, &mut out);
    }

    if fd.is_global {
        for g in &fd.global_vars {
            let mut flags = 0;
            if g.is_lexical {
                flags |= DEFINE_GLOBAL_LEX_VAR;
            }
            if g.func.is_some() {
                flags |= DEFINE_GLOBAL_FUNC_VAR;
            }
            out.push(Insn::new(Opcode::CheckDefineVar, Arg::AtomInt(g.name, flags as u32)));
        }
        for g in &fd.global_vars {
            match g.func {
                Some(cpool_idx) => {
                    out.push(Insn::new(Opcode::FClosure, Arg::Int(cpool_idx as i32)));
                    out.push(Insn::new(Opcode::DefineFunc, Arg::AtomInt(g.name, 0)));
                }
                None => {
                    let mut flags = 0;
                    if g.is_lexical {
                        flags |= DEFINE_GLOBAL_LEX_VAR;
                        if !g.is_const {
                            flags |= PROP_WRITABLE;
                        }
                    }
                    out.push(Insn::new(Opcode::DefineVar, Arg::AtomInt(g.name, flags as u32)));
                }
            }
        }
    } else if fd.is_module {
        for g in &fd.global_vars {
            if let (Some(cpool_idx), Some(k)) = (g.func, fd.find_closure_var(g.name)) {
                out.push(Insn::new(Opcode::FClosure, Arg::Int(cpool_idx as i32)));
                out.push(Insn::new(Opcode::PutVarRef, Arg::Int(k as i32)));
            }
        }
    } else {
        for (idx, var) in fd.scopes.vars().iter().enumerate() {
            if var.scope_level != 0 {
                continue;
            }
            if let Some(cpool_idx) = fd.scopes.func_init(idx as u32) {
                out.push(Insn::new(Opcode::FClosure, Arg::Int(cpool_idx as i32)));
                out.push(Insn::new(Opcode::PutLoc, Arg::Int(idx as i32)));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::AtomTable;
    use crate::compiler::CompileOptions;

    fn ops(c: &Compiler, id: FuncId) -> Vec<Op> {
        insn::decode_raw(c.funcs[id].buf.as_bytes())
            .unwrap()
            .into_iter()
            .map(|i| i.op)
            .collect()
    }

    #[test]
    fn test_local_global_and_captured_access() {
        let mut atoms = AtomTable::new();
        let (x, y) = (atoms.intern("x"), atoms.intern("y"));
        let mut c = Compiler::new(&mut atoms, CompileOptions::default());
        let outer = c.new_function(x, 1);
        c.cur = outer;
        c.fd_mut().scopes.push_scope();
        let xv = c.fd_mut().scopes.add_scope_var(x, VarKind::Normal, true, false);
        let inner = c.new_function(y, 1);
        c.cur = inner;
        c.emit_scope_op(TempOpcode::ScopeGetVar, x);
        c.emit_scope_op(TempOpcode::ScopeGetVar, y);

        resolve_variables(&mut c, inner).unwrap();
        assert_eq!(
            ops(&c, inner),
            vec![Op::Final(Opcode::GetVarRefCheck), Op::Final(Opcode::GetVar)]
        );
        assert_eq!(c.funcs[inner].closure_vars.len(), 1);
        assert!(c.funcs[inner].closure_vars[0].is_local);
        assert_eq!(c.funcs[inner].closure_vars[0].var_idx as u32, xv);
        assert!(c.funcs[outer].scopes.var(xv).is_captured);
    }

    #[test]
    fn test_const_assignment_throws() {
        let mut atoms = AtomTable::new();
        let k = atoms.intern("k");
        let mut c = Compiler::new(&mut atoms, CompileOptions::default());
        let f = c.new_function(k, 1);
        c.cur = f;
        c.fd_mut().scopes.push_scope();
        c.fd_mut().scopes.add_scope_var(k, VarKind::Normal, true, true);
        c.emit(Opcode::PushTrue);
        c.emit_scope_op(TempOpcode::ScopePutVar, k);
        resolve_variables(&mut c, f).unwrap();
        assert_eq!(
            ops(&c, f),
            vec![Op::Final(Opcode::PushTrue), Op::Final(Opcode::ThrowError)]
        );
    }

    #[test]
    fn test_arguments_creates_prologue() {
        let mut atoms = AtomTable::new();
        let name = atoms.intern("f");
        let mut c = Compiler::new(&mut atoms, CompileOptions::default());
        let f = c.new_function(name, 1);
        c.cur = f;
        c.emit_scope_op(TempOpcode::ScopeGetVar, atoms::arguments);
        resolve_variables(&mut c, f).unwrap();
        assert_eq!(
            ops(&c, f),
            vec![
                Op::Final(Opcode::SpecialObject),
                Op::Final(Opcode::PutLoc),
                Op::Final(Opcode::GetLoc),
            ]
        );
    }

    #[test]
    fn test_unknown_private_name_is_invalid_context() {
        let mut atoms = AtomTable::new();
        let (name, field) = (atoms.intern("f"), atoms.intern("#missing"));
        let mut c = Compiler::new(&mut atoms, CompileOptions::default());
        let f = c.new_function(name, 1);
        c.cur = f;
        c.emit(Opcode::PushThis);
        c.emit_scope_op(TempOpcode::ScopeGetPrivateField, field);
        let err = resolve_variables(&mut c, f).unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::InvalidContext);
    }
}
