//! `yield`, `yield*` and `await`

use super::{Compiler, THROW_ERROR_ITERATOR_THROW};
use crate::ast::{Expression, Span, YieldExpression};
use crate::atom::{atoms, Atom};
use crate::bytecode::Opcode;
use crate::error::{Error, Result};

/// `iterator_call` operand
const ITERATOR_CALL_RETURN: u8 = 0;
const ITERATOR_CALL_THROW: u8 = 1;
const ITERATOR_CALL_CLOSE: u8 = 2;

/// Resume kind pushed by `yield_star` for a `throw()` on the generator
const RESUME_THROW: i32 = 2;

impl Compiler<'_> {
    pub(crate) fn compile_yield(&mut self, y: &YieldExpression) -> Result<()> {
        let kind = self.fd().kind;
        if !kind.is_generator() || self.fd().is_arrow {
            return Err(Error::invalid_context("yield outside of a generator", Self::loc(y.span)));
        }
        let is_async = kind.is_async();

        if y.delegate {
            let Some(argument) = &y.argument else {
                return Err(Error::invalid_context("yield* without an operand", Self::loc(y.span)));
            };
            return self.compile_yield_star(argument, is_async);
        }

        match &y.argument {
            Some(argument) => self.compile_expr(argument)?,
            None => self.emit(Opcode::Undefined),
        }
        if is_async {
            self.emit(Opcode::Await);
        }
        self.emit(Opcode::Yield);
        let next = self.new_label();
        self.emit_goto(Opcode::IfFalse, next);
        self.emit_return_cleanup();
        self.emit_return(true)?;
        self.emit_label(next);
        Ok(())
    }

    /// Stack while delegating: `[iter, next, catch_offset, value]`
    fn compile_yield_star(&mut self, argument: &Expression, is_async: bool) -> Result<()> {
        let [lp, yld, ret, ret1, throw, throw1, throw2, next] = [(); 8].map(|_| self.new_label());

        self.compile_expr(argument)?;
        self.emit(if is_async { Opcode::ForAwaitOfStart } else { Opcode::ForOfStart });
        self.emit(Opcode::Undefined);

        self.emit_label(lp);
        self.emit(Opcode::IteratorNext);
        self.emit_iterator_result(is_async);
        self.emit_goto(Opcode::IfTrue, next);

        self.emit_label(yld);
        if is_async {
            self.emit_op_atom(Opcode::GetField, atoms::value);
            self.emit(Opcode::AsyncYieldStar);
        } else {
            self.emit(Opcode::YieldStar);
        }
        self.emit(Opcode::Dup);
        self.emit_goto(Opcode::IfTrue, ret);
        self.emit(Opcode::Drop);
        self.emit_goto(Opcode::Goto, lp);

        // return() or throw() was called on the outer generator
        self.emit_label(ret);
        self.emit_push_i32(RESUME_THROW);
        self.emit(Opcode::StrictEq);
        self.emit_goto(Opcode::IfTrue, throw);

        if is_async {
            self.emit(Opcode::Await);
        }
        self.emit(Opcode::IteratorCall);
        self.emit_u8(ITERATOR_CALL_RETURN);
        self.emit_goto(Opcode::IfTrue, ret1);
        self.emit_iterator_result(is_async);
        self.emit_goto(Opcode::IfFalse, yld);
        self.emit_op_atom(Opcode::GetField, atoms::value);
        self.emit_label(ret1);
        for _ in 0..3 {
            self.emit(Opcode::Nip);
        }
        self.emit_return_cleanup();
        self.emit_return(true)?;

        self.emit_label(throw);
        self.emit(Opcode::IteratorCall);
        self.emit_u8(ITERATOR_CALL_THROW);
        self.emit_goto(Opcode::IfTrue, throw1);
        self.emit_iterator_result(is_async);
        self.emit_goto(Opcode::IfFalse, yld);
        self.emit_goto(Opcode::Goto, next);

        // the delegate has no throw(): close it and raise a TypeError
        self.emit_label(throw1);
        self.emit(Opcode::IteratorCall);
        self.emit_u8(ITERATOR_CALL_CLOSE);
        self.emit_goto(Opcode::IfTrue, throw2);
        if is_async {
            self.emit(Opcode::Await);
        }
        self.emit_label(throw2);
        self.emit_op_atom_u8(Opcode::ThrowError, Atom::NULL, THROW_ERROR_ITERATOR_THROW);

        self.emit_label(next);
        self.emit_op_atom(Opcode::GetField, atoms::value);
        for _ in 0..3 {
            self.emit(Opcode::Nip);
        }
        Ok(())
    }

    /// Check an iterator result object and push its `done` flag
    fn emit_iterator_result(&mut self, is_async: bool) {
        if is_async {
            self.emit(Opcode::Await);
        }
        self.emit(Opcode::IteratorCheckObject);
        self.emit_op_atom(Opcode::GetField2, atoms::done);
    }

    pub(crate) fn compile_await(&mut self, argument: &Expression, span: Span) -> Result<()> {
        let fd = self.fd();
        let allowed = fd.kind.is_async() || (fd.is_module && fd.is_top_level());
        if !allowed {
            return Err(Error::invalid_context("await outside of an async function", Self::loc(span)));
        }
        self.compile_expr(argument)?;
        self.emit(Opcode::Await);
        Ok(())
    }

    /// Step of a `for await` loop: `[iter, next, catch_offset]` gains
    /// `[value, done]`
    pub(crate) fn emit_for_await_next(&mut self) {
        self.emit(Opcode::Undefined);
        self.emit(Opcode::IteratorNext);
        self.emit(Opcode::Await);
        self.emit(Opcode::IteratorGetValueDone);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::AtomTable;
    use crate::bytecode::{insn, Op};
    use crate::compiler::CompileOptions;
    use crate::error::ErrorCategory;
    use crate::value::FuncKind;
    use pretty_assertions::assert_eq;

    fn compiler_for(atoms: &mut AtomTable, kind: FuncKind) -> Compiler<'_> {
        let name = atoms.intern("g");
        let mut c = Compiler::new(atoms, CompileOptions::default());
        let f = c.new_function(name, 1);
        c.cur = f;
        c.fd_mut().kind = kind;
        c
    }

    fn final_ops(c: &Compiler) -> Vec<Opcode> {
        insn::decode_raw(c.fd().buf.as_bytes())
            .unwrap()
            .into_iter()
            .filter_map(|i| match i.op {
                Op::Final(op) => Some(op),
                Op::Temp(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_yield_outside_generator_fails() {
        let mut atoms = AtomTable::new();
        let mut c = compiler_for(&mut atoms, FuncKind::Normal);
        let y = YieldExpression {
            argument: None,
            delegate: false,
            span: Span::line(4),
        };
        let err = c.compile_yield(&y).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::InvalidContext);
        assert_eq!(err.location().map(|l| l.line), Some(4));
    }

    #[test]
    fn test_plain_yield_returns_on_resume_with_return() {
        let mut atoms = AtomTable::new();
        let mut c = compiler_for(&mut atoms, FuncKind::Generator);
        let y = YieldExpression {
            argument: Some(Expression::number(1.0)),
            delegate: false,
            span: Span::default(),
        };
        c.compile_yield(&y).unwrap();
        assert_eq!(
            final_ops(&c),
            vec![Opcode::PushI32, Opcode::Yield, Opcode::IfFalse, Opcode::ReturnAsync]
        );
    }

    #[test]
    fn test_async_generator_awaits_before_yield() {
        let mut atoms = AtomTable::new();
        let mut c = compiler_for(&mut atoms, FuncKind::AsyncGenerator);
        let y = YieldExpression {
            argument: None,
            delegate: false,
            span: Span::default(),
        };
        c.compile_yield(&y).unwrap();
        assert_eq!(final_ops(&c)[..3], [Opcode::Undefined, Opcode::Await, Opcode::Yield]);
    }

    #[test]
    fn test_await_requires_async_function() {
        let mut atoms = AtomTable::new();
        let mut c = compiler_for(&mut atoms, FuncKind::Normal);
        let err = c.compile_await(&Expression::number(1.0), Span::line(2)).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::InvalidContext);

        let mut atoms = AtomTable::new();
        let mut c = compiler_for(&mut atoms, FuncKind::Async);
        c.compile_await(&Expression::number(1.0), Span::default()).unwrap();
        assert_eq!(final_ops(&c), vec![Opcode::PushI32, Opcode::Await]);
    }

    #[test]
    fn test_yield_star_layout() {
        let mut atoms = AtomTable::new();
        let mut c = compiler_for(&mut atoms, FuncKind::Generator);
        let y = YieldExpression {
            argument: Some(Expression::ident("it")),
            delegate: true,
            span: Span::default(),
        };
        c.compile_yield(&y).unwrap();
        let ops = final_ops(&c);
        assert_eq!(ops[..3], [Opcode::ForOfStart, Opcode::Undefined, Opcode::IteratorNext]);
        assert_eq!(ops.iter().filter(|op| **op == Opcode::IteratorCall).count(), 3);
        assert_eq!(ops[ops.len() - 4..], [Opcode::GetField, Opcode::Nip, Opcode::Nip, Opcode::Nip]);
    }
}
