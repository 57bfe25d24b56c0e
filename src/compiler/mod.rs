//! Bytecode compiler
//!
//! Compiles a [`Program`] into a tree of function records. Each function
//! goes through the same pipeline:
//!
//! 1. the emitters walk the AST and write a raw stream in which variable
//!    accesses are scope-relative placeholders and jumps target labels;
//! 2. [`resolve`] turns the placeholders into concrete local, argument,
//!    closure or global accesses (children before parents, so captures
//!    are known when the parent closes its scopes);
//! 3. [`labels`] lays the stream out with relative jump offsets;
//! 4. the optimizer rewrites the final bytecode;
//! 5. the stack size is computed and the debug tables are encoded.
//!
//! Functions live in an arena indexed by [`FuncId`]; a nested function
//! refers to its parent by index and records the parent scope it was
//! defined in.

mod class;
mod expr;
mod function;
mod generator;
mod labels;
mod module;
mod pattern;
mod resolve;
mod scope;
mod stmt;

pub use labels::compute_stack_size;
pub use scope::{ScopeId, ScopeTree, VAR_SCOPE};

use crate::ast::{Program, SourceType, Span};
use crate::atom::{atoms, Atom, AtomTable};
use crate::bytecode::{
    pc2line, BytecodeBuffer, Constant, ConstantPool, FuncId, InlineCacheTable, LabelId,
    LabelManager, Op, Opcode, Optimizer, OptimizerConfig, TempOpcode,
};
use crate::error::{Error, Result, SourceLocation};
use crate::value::{
    ClosureVar, DebugInfo, FuncKind, FunctionBytecode, FunctionFlags, JsValue, ModuleDef,
    JS_MODE_STRICT,
};
use module::ModuleEntries;
use std::rc::Rc;
use tracing::{debug, trace};

/// Options of one compilation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Compile as an ES module regardless of the program's source type
    pub module: bool,
    /// Omit filename, line table and source text
    pub strip_debug: bool,
    /// Omit source text only
    pub strip_source: bool,
    /// Name recorded in the debug information
    pub filename: String,
    pub optimize: OptimizerConfig,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            module: false,
            strip_debug: false,
            strip_source: false,
            filename: "<input>".to_string(),
            optimize: OptimizerConfig::default(),
        }
    }
}

/// Compile a program to a function record (scripts) or a module record
pub fn compile(program: &Program, atoms: &mut AtomTable, options: &CompileOptions) -> Result<JsValue> {
    Compiler::new(atoms, options.clone()).compile_program(program)
}

/// Slot indices are u16 operands in the instruction stream
fn check_slot_limits(fd: &FunctionDef) -> Result<()> {
    let limit = u16::MAX as usize;
    let location = SourceLocation::new(fd.line_num, 1);
    if fd.scopes.args().len() > limit {
        return Err(Error::unsupported("too many arguments", location));
    }
    if fd.scopes.vars().len() > limit {
        return Err(Error::unsupported("too many local variables", location));
    }
    if fd.closure_vars.len() > limit {
        return Err(Error::unsupported("too many closure variables", location));
    }
    Ok(())
}

/// `throw_error` kinds
pub(crate) const THROW_VAR_RO: u8 = 0;
pub(crate) const THROW_VAR_UNINITIALIZED: u8 = 2;
pub(crate) const THROW_ERROR_ITERATOR_THROW: u8 = 4;

/// `define_var` / `check_define_var` flags
pub(crate) const DEFINE_GLOBAL_LEX_VAR: u8 = 1 << 7;
pub(crate) const DEFINE_GLOBAL_FUNC_VAR: u8 = 1 << 6;
pub(crate) const PROP_WRITABLE: u8 = 1 << 1;

/// Target of `break` and `continue`, and the cleanup needed to leave it
#[derive(Debug, Clone, Default)]
pub(crate) struct BlockEnv {
    pub label_names: Vec<Atom>,
    pub break_label: Option<LabelId>,
    pub continue_label: Option<LabelId>,
    /// Stack values owned by the construct
    pub drop_count: u32,
    pub finally_label: Option<LabelId>,
    /// The owned values are an iterator record that must be closed
    pub has_iterator: bool,
    pub scope: ScopeId,
    /// Loops and switches answer an unlabeled `break`
    pub is_loop_or_switch: bool,
}

/// Implicit bindings a function creates on first use
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SpecialVars {
    pub this: Option<u32>,
    pub new_target: Option<u32>,
    pub arguments: Option<u32>,
    pub home_object: Option<u32>,
    pub this_active_func: Option<u32>,
    pub func_name: Option<u32>,
}

/// Top-level declaration of a script or module
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GlobalVar {
    pub name: Atom,
    pub is_lexical: bool,
    pub is_const: bool,
    /// Constant pool index of a hoisted function declaration
    pub func: Option<u32>,
}

/// A function being compiled
#[derive(Debug)]
pub(crate) struct FunctionDef {
    pub parent: Option<FuncId>,
    /// Scope of the parent the function was defined in
    pub parent_scope: ScopeId,
    pub name: Atom,
    pub kind: FuncKind,
    pub is_arrow: bool,
    /// Method-like functions have a home object
    pub is_method: bool,
    pub is_class_constructor: bool,
    pub is_derived_constructor: bool,
    pub is_field_initializer: bool,
    /// Script top level: declarations become global object properties
    pub is_global: bool,
    pub is_module: bool,
    pub strict: bool,
    pub has_simple_params: bool,
    pub defined_arg_count: u16,
    /// Name a function expression can refer to itself by
    pub func_name_binding: Option<Atom>,
    /// Class constructor that must run the instance field initializer
    pub calls_field_initializer: bool,
    pub scopes: ScopeTree,
    pub closure_vars: Vec<ClosureVar>,
    pub global_vars: Vec<GlobalVar>,
    pub specials: SpecialVars,
    /// Completion value of a script
    pub eval_ret: Option<u32>,
    pub buf: BytecodeBuffer,
    pub labels: LabelManager,
    pub cpool: ConstantPool,
    pub block_envs: Vec<BlockEnv>,
    /// End label of the optional chain being emitted
    pub chain_end: Option<LabelId>,
    pub last_line: u32,
    pub line_num: u32,
    pub source: Option<String>,
    pub children: Vec<FuncId>,
    pub compiled: Option<Rc<FunctionBytecode>>,
}

impl FunctionDef {
    fn new(parent: Option<FuncId>, parent_scope: ScopeId, name: Atom, line_num: u32) -> Self {
        Self {
            parent,
            parent_scope,
            name,
            kind: FuncKind::Normal,
            is_arrow: false,
            is_method: false,
            is_class_constructor: false,
            is_derived_constructor: false,
            is_field_initializer: false,
            is_global: false,
            is_module: false,
            strict: false,
            has_simple_params: true,
            defined_arg_count: 0,
            func_name_binding: None,
            calls_field_initializer: false,
            scopes: ScopeTree::new(),
            closure_vars: Vec::new(),
            global_vars: Vec::new(),
            specials: SpecialVars::default(),
            eval_ret: None,
            buf: BytecodeBuffer::new(),
            labels: LabelManager::new(),
            cpool: ConstantPool::new(),
            block_envs: Vec::new(),
            chain_end: None,
            last_line: 0,
            line_num,
            source: None,
            children: Vec::new(),
            compiled: None,
        }
    }

    /// Top-level code of a script or module
    pub fn is_top_level(&self) -> bool {
        self.is_global || self.is_module
    }

    pub fn find_closure_var(&self, name: Atom) -> Option<u32> {
        self.closure_vars.iter().position(|cv| cv.name == name).map(|i| i as u32)
    }

    pub fn find_global(&self, name: Atom) -> Option<usize> {
        self.global_vars.iter().position(|g| g.name == name)
    }
}

/// Compiler state shared by all functions of one program
pub struct Compiler<'a> {
    pub(crate) atoms: &'a mut AtomTable,
    pub(crate) options: CompileOptions,
    pub(crate) funcs: Vec<FunctionDef>,
    /// Function currently being emitted
    pub(crate) cur: FuncId,
    pub(crate) module: Option<ModuleEntries>,
    filename: Atom,
}

impl<'a> Compiler<'a> {
    pub fn new(atoms: &'a mut AtomTable, options: CompileOptions) -> Self {
        let filename = atoms.intern(&options.filename);
        Self {
            atoms,
            options,
            funcs: Vec::new(),
            cur: 0,
            module: None,
            filename,
        }
    }

    /// Compile a whole program
    pub fn compile_program(mut self, program: &Program) -> Result<JsValue> {
        let is_module = self.options.module || program.source_type == SourceType::Module;
        debug!(module = is_module, statements = program.body.len(), "compiling program");

        let name = if is_module { self.filename } else { atoms::_eval_ };
        let line = program.span.start.line.max(1);
        let main = self.new_function(name, line);
        {
            let fd = &mut self.funcs[main];
            fd.is_module = is_module;
            fd.is_global = !is_module;
            fd.strict = is_module || program.strict || program.has_use_strict();
            fd.source = program.source.clone();
            if !is_module {
                fd.eval_ret = Some(fd.scopes.add_var(atoms::_ret_));
            }
        }
        self.cur = main;

        if is_module {
            self.module = Some(ModuleEntries::default());
            self.declare_imports(&program.body)?;
        }
        self.compile_body(&program.body)?;

        if let Some(ret) = self.fd().eval_ret {
            self.emit_op_u16(Opcode::GetLoc, ret as u16);
            self.emit(Opcode::Return);
        } else {
            self.emit(Opcode::ReturnUndef);
        }

        if is_module {
            self.add_module_variables();
        }
        let func = self.finish()?;
        if is_module {
            let entries = self.module.take().unwrap_or_default();
            let def = entries.into_module_def(&self.funcs[main].closure_vars, name, func)?;
            Ok(JsValue::Module(Rc::new(def)))
        } else {
            Ok(JsValue::Function(func))
        }
    }

    // ========== Function arena ==========

    /// Allocate a function nested in the current one
    pub(crate) fn new_function(&mut self, name: Atom, line: u32) -> FuncId {
        let id = self.funcs.len();
        let (parent, parent_scope, strict, line) = if self.funcs.is_empty() {
            (None, VAR_SCOPE, false, line.max(1))
        } else {
            let fd = self.fd();
            let line = if line == 0 { fd.last_line.max(fd.line_num) } else { line };
            (Some(self.cur), fd.scopes.current(), fd.strict, line)
        };
        let mut fd = FunctionDef::new(parent, parent_scope, name, line);
        fd.strict = strict;
        self.funcs.push(fd);
        if let Some(p) = parent {
            self.funcs[p].children.push(id);
        }
        id
    }

    pub(crate) fn fd(&self) -> &FunctionDef {
        &self.funcs[self.cur]
    }

    pub(crate) fn fd_mut(&mut self) -> &mut FunctionDef {
        &mut self.funcs[self.cur]
    }

    /// Nearest enclosing function that is not an arrow function
    pub(crate) fn non_arrow_ancestor(&self, mut id: FuncId) -> FuncId {
        while self.funcs[id].is_arrow {
            match self.funcs[id].parent {
                Some(p) => id = p,
                None => break,
            }
        }
        id
    }

    /// Is a `with` object in scope anywhere up the function chain?
    pub(crate) fn has_with_scope(&self) -> bool {
        let mut id = self.cur;
        let mut scope = self.fd().scopes.current();
        loop {
            let fd = &self.funcs[id];
            if fd.scopes.chain(scope).any(|idx| fd.scopes.var(idx).name == atoms::_with_) {
                return true;
            }
            match fd.parent {
                Some(p) => {
                    scope = fd.parent_scope;
                    id = p;
                }
                None => return false,
            }
        }
    }

    // ========== Finalization ==========

    fn finish(&mut self) -> Result<Rc<FunctionBytecode>> {
        self.resolve_tree(0)?;
        self.build(0)
    }

    /// Resolve variables of a function tree, children first
    fn resolve_tree(&mut self, id: FuncId) -> Result<()> {
        let children = self.funcs[id].children.clone();
        for child in children {
            self.resolve_tree(child)?;
        }
        resolve::resolve_variables(self, id)
    }

    fn build(&mut self, id: FuncId) -> Result<Rc<FunctionBytecode>> {
        if let Some(done) = &self.funcs[id].compiled {
            return Ok(done.clone());
        }
        let children = self.funcs[id].children.clone();
        for child in children {
            self.build(child)?;
        }

        let fd = &self.funcs[id];
        check_slot_limits(fd)?;
        let mut assembled = labels::resolve_labels(fd)?;
        let config = &self.options.optimize;
        if *config != OptimizerConfig::disabled() {
            assembled = Optimizer::with_config(config.clone()).optimize(&assembled.code, &assembled.lines)?;
        }
        let stack_size = compute_stack_size(&assembled.code)?;

        let cpool = fd
            .cpool
            .entries()
            .iter()
            .map(|c| match c {
                Constant::Value(v) => Ok(v.clone()),
                Constant::Function(f) => self.funcs[*f]
                    .compiled
                    .clone()
                    .map(JsValue::Function)
                    .ok_or_else(|| Error::internal("nested function compiled out of order")),
            })
            .collect::<Result<Vec<_>>>()?;

        let debug_info = if self.options.strip_debug {
            None
        } else {
            Some(DebugInfo {
                filename: self.filename,
                line_num: fd.line_num,
                pc2line: pc2line::encode(fd.line_num, &assembled.lines),
                source: if self.options.strip_source {
                    None
                } else {
                    fd.source.clone()
                },
            })
        };

        let mut flags = self.function_flags(id);
        if debug_info.is_some() {
            flags |= FunctionFlags::HAS_DEBUG;
        }
        let mut vardefs = fd.scopes.args().to_vec();
        vardefs.extend_from_slice(fd.scopes.vars());

        let func = FunctionBytecode {
            name: fd.name,
            flags,
            kind: fd.kind,
            js_mode: if fd.strict { JS_MODE_STRICT } else { 0 },
            arg_count: fd.scopes.args().len() as u16,
            var_count: fd.scopes.vars().len() as u16,
            defined_arg_count: fd.defined_arg_count,
            stack_size,
            vardefs,
            closure_vars: fd.closure_vars.clone(),
            ic: InlineCacheTable::from_bytecode(&assembled.code)?,
            code: assembled.code,
            debug: debug_info,
            cpool,
        };
        trace!(
            name = %self.atoms.display_name(func.name),
            code = func.code.len(),
            stack_size,
            closures = func.closure_vars.len(),
            "built function"
        );
        let func = Rc::new(func);
        self.funcs[id].compiled = Some(func.clone());
        Ok(func)
    }

    /// Permission of a function, inherited by arrow functions
    fn inherited(&self, id: FuncId, own: impl Fn(&FunctionDef) -> bool) -> bool {
        own(&self.funcs[self.non_arrow_ancestor(id)])
    }

    fn function_flags(&self, id: FuncId) -> FunctionFlags {
        let fd = &self.funcs[id];
        let mut flags = FunctionFlags::empty();
        let plain = !fd.is_arrow && !fd.is_method && !fd.is_top_level();
        if fd.is_class_constructor || (plain && fd.kind != FuncKind::Async) {
            flags |= FunctionFlags::HAS_PROTOTYPE;
        }
        if fd.has_simple_params {
            flags |= FunctionFlags::HAS_SIMPLE_PARAMETER_LIST;
        }
        if fd.is_derived_constructor {
            flags |= FunctionFlags::IS_DERIVED_CLASS_CONSTRUCTOR;
        }
        if fd.specials.home_object.is_some() {
            flags |= FunctionFlags::NEED_HOME_OBJECT;
        }
        if self.inherited(id, |f| !f.is_top_level()) {
            flags |= FunctionFlags::NEW_TARGET_ALLOWED;
        }
        if self.inherited(id, |f| f.is_derived_constructor) {
            flags |= FunctionFlags::SUPER_CALL_ALLOWED;
        }
        if self.inherited(id, |f| f.is_method) {
            flags |= FunctionFlags::SUPER_ALLOWED;
        }
        if self.inherited(id, |f| !f.is_top_level() && !f.is_field_initializer) {
            flags |= FunctionFlags::ARGUMENTS_ALLOWED;
        }
        flags
    }

    // ========== Emission helpers ==========

    pub(crate) fn emit(&mut self, op: impl Into<Op>) {
        self.fd_mut().buf.emit_op(op);
    }

    pub(crate) fn emit_u8(&mut self, v: u8) {
        self.fd_mut().buf.emit_u8(v);
    }

    pub(crate) fn emit_u16(&mut self, v: u16) {
        self.fd_mut().buf.emit_u16(v);
    }

    pub(crate) fn emit_u32(&mut self, v: u32) {
        self.fd_mut().buf.emit_u32(v);
    }

    pub(crate) fn emit_op_u16(&mut self, op: impl Into<Op>, v: u16) {
        self.emit(op);
        self.emit_u16(v);
    }

    pub(crate) fn emit_op_atom(&mut self, op: impl Into<Op>, atom: Atom) {
        self.emit(op);
        self.fd_mut().buf.emit_atom(atom);
    }

    pub(crate) fn emit_op_atom_u8(&mut self, op: impl Into<Op>, atom: Atom, v: u8) {
        self.emit_op_atom(op, atom);
        self.emit_u8(v);
    }

    /// Scope-relative variable access, resolved later
    pub(crate) fn emit_scope_op(&mut self, op: TempOpcode, name: Atom) {
        let scope = self.fd().scopes.current();
        self.emit_op_atom(op, name);
        self.emit_u16(scope as u16);
    }

    pub(crate) fn emit_push_i32(&mut self, n: i32) {
        self.emit(Opcode::PushI32);
        self.fd_mut().buf.emit_i32(n);
    }

    /// Push a constant pool value
    pub(crate) fn emit_constant(&mut self, value: JsValue) {
        let idx = self.fd_mut().cpool.add(value);
        self.emit(Opcode::PushConst);
        self.emit_u32(idx);
    }

    /// Create a closure of a nested function
    pub(crate) fn emit_fclosure(&mut self, func: FuncId) -> u32 {
        let idx = self.fd_mut().cpool.add_function(func);
        self.emit(Opcode::FClosure);
        self.emit_u32(idx);
        idx
    }

    pub(crate) fn emit_atom_value(&mut self, s: &str) {
        let atom = self.atoms.intern(s);
        self.emit_op_atom(Opcode::PushAtomValue, atom);
    }

    pub(crate) fn new_label(&mut self) -> LabelId {
        self.fd_mut().labels.new_label()
    }

    pub(crate) fn emit_label(&mut self, label: LabelId) {
        self.emit(TempOpcode::Label);
        self.emit_u32(label);
        let fd = self.fd_mut();
        let pos = fd.buf.len();
        fd.labels.bind(label, pos);
    }

    /// Emit a jump to `label` and return it
    pub(crate) fn emit_goto(&mut self, op: Opcode, label: LabelId) -> LabelId {
        self.emit(op);
        self.emit_label_ref(label);
        label
    }

    /// Write a label operand
    pub(crate) fn emit_label_ref(&mut self, label: LabelId) {
        let fd = self.fd_mut();
        let site = fd.buf.len();
        fd.labels.add_ref(label, site);
        fd.buf.emit_u32(label);
    }

    /// Record the source line of the code that follows
    pub(crate) fn set_location(&mut self, span: Span) {
        let line = span.start.line;
        if line == 0 || line == self.fd().last_line {
            return;
        }
        self.fd_mut().last_line = line;
        self.emit(TempOpcode::LineNum);
        self.emit_u32(line);
    }

    /// Can control reach the next instruction?
    pub(crate) fn is_live_code(&self) -> bool {
        match self.fd().buf.last_op() {
            Some(Op::Final(op)) => !op.is_terminator(),
            _ => true,
        }
    }

    pub(crate) fn intern(&mut self, s: &str) -> Atom {
        self.atoms.intern(s)
    }

    pub(crate) fn loc(span: Span) -> SourceLocation {
        span.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expression, Statement};
    use crate::error::ErrorCategory;
    use crate::value::VarKind;

    fn compile_script(body: Vec<Statement>) -> Rc<FunctionBytecode> {
        let mut atoms = AtomTable::new();
        match compile(&Program::script(body), &mut atoms, &CompileOptions::default()).unwrap() {
            JsValue::Function(f) => f,
            other => panic!("expected a function, got {}", other.type_name()),
        }
    }

    #[test]
    fn test_empty_script_returns_completion_value() {
        let f = compile_script(vec![]);
        assert_eq!(f.name, atoms::_eval_);
        assert_eq!(f.var_count, 1);
        assert_eq!(f.vardefs[0].name, atoms::_ret_);
        assert_eq!(f.code, vec![Opcode::GetLoc0.to_byte(), Opcode::Return.to_byte()]);
        assert_eq!(f.stack_size, 1);
    }

    #[test]
    fn test_module_is_strict_and_returns_undefined() {
        let mut atoms = AtomTable::new();
        let program = Program::module(vec![Statement::expr(Expression::number(1.0))]);
        let value = compile(&program, &mut atoms, &CompileOptions::default()).unwrap();
        let JsValue::Module(m) = value else {
            panic!("expected a module");
        };
        assert_eq!(m.func.js_mode, JS_MODE_STRICT);
        assert_eq!(m.func.code.last().copied(), Some(Opcode::ReturnUndef.to_byte()));
    }

    #[test]
    fn test_strip_debug_drops_debug_block() {
        let mut atoms = AtomTable::new();
        let options = CompileOptions {
            strip_debug: true,
            ..CompileOptions::default()
        };
        let value = compile(&Program::script(vec![]), &mut atoms, &options).unwrap();
        let JsValue::Function(f) = value else {
            panic!("expected a function");
        };
        assert!(f.debug.is_none());
        assert!(!f.flags.contains(FunctionFlags::HAS_DEBUG));
    }

    fn limit_error(fd: &FunctionDef) -> (ErrorCategory, String, u32) {
        let err = check_slot_limits(fd).unwrap_err();
        let line = err.location().map_or(0, |l| l.line);
        (err.category(), err.to_string(), line)
    }

    #[test]
    fn test_local_slots_are_limited_to_u16() {
        let mut fd = FunctionDef::new(None, VAR_SCOPE, atoms::empty_string, 7);
        for _ in 0..u16::MAX {
            fd.scopes.add_var(atoms::empty_string);
        }
        assert!(check_slot_limits(&fd).is_ok());

        fd.scopes.add_var(atoms::empty_string);
        let (category, message, line) = limit_error(&fd);
        assert_eq!(category, ErrorCategory::UnsupportedConstruct);
        assert!(message.contains("too many local variables"));
        assert_eq!(line, 7);
    }

    #[test]
    fn test_argument_slots_are_limited_to_u16() {
        let mut fd = FunctionDef::new(None, VAR_SCOPE, atoms::empty_string, 1);
        for _ in 0..=u16::MAX as usize {
            fd.scopes.add_arg(atoms::empty_string);
        }
        let (category, message, _) = limit_error(&fd);
        assert_eq!(category, ErrorCategory::UnsupportedConstruct);
        assert!(message.contains("too many arguments"));
    }

    #[test]
    fn test_closure_slots_are_limited_to_u16() {
        let mut fd = FunctionDef::new(None, VAR_SCOPE, atoms::empty_string, 1);
        let captured = ClosureVar {
            name: atoms::empty_string,
            var_idx: 0,
            is_local: true,
            is_arg: false,
            is_const: false,
            is_lexical: false,
            kind: VarKind::Normal,
        };
        fd.closure_vars = vec![captured; u16::MAX as usize + 1];
        let (_, message, _) = limit_error(&fd);
        assert!(message.contains("too many closure variables"));
    }
}
