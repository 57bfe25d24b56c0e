//! In-memory value model
//!
//! These are the values the serializer writes and the reader rebuilds:
//! primitive constants, arrays and objects, template objects, compiled
//! function records and module records. Compound values are shared with
//! `Rc` so that back-references can be expressed by identity.

use crate::atom::{Atom, AtomTable};
use crate::error::Result;
use crate::bytecode::ic::InlineCacheTable;
use bitflags::bitflags;
use num_bigint::BigInt;
use std::rc::Rc;

/// A serializable value
#[derive(Debug, Clone)]
pub enum JsValue {
    Null,
    Undefined,
    Bool(bool),
    Int32(i32),
    Float64(f64),
    String(String),
    BigInt(BigInt),
    Array(Rc<Vec<JsValue>>),
    /// Plain object as an ordered list of (key, value) pairs
    Object(Rc<Vec<(Atom, JsValue)>>),
    TemplateObject(Rc<TemplateObject>),
    Function(Rc<FunctionBytecode>),
    Module(Rc<ModuleDef>),
}

impl JsValue {
    /// Build the most compact numeric value: int32 when the number is an
    /// integer in range and not negative zero, float64 otherwise.
    pub fn number(n: f64) -> Self {
        if n.fract() == 0.0
            && n >= i32::MIN as f64
            && n <= i32::MAX as f64
            && !(n == 0.0 && n.is_sign_negative())
        {
            JsValue::Int32(n as i32)
        } else {
            JsValue::Float64(n)
        }
    }

    pub fn string(s: impl Into<String>) -> Self {
        JsValue::String(s.into())
    }

    pub fn array(items: Vec<JsValue>) -> Self {
        JsValue::Array(Rc::new(items))
    }

    pub fn object(props: Vec<(Atom, JsValue)>) -> Self {
        JsValue::Object(Rc::new(props))
    }

    /// Is this a compound value that takes part in reference tracking?
    pub fn is_object_like(&self) -> bool {
        matches!(
            self,
            JsValue::Array(_) | JsValue::Object(_) | JsValue::TemplateObject(_)
        )
    }

    /// Identity of a compound value, used for back-references
    pub fn identity(&self) -> Option<*const ()> {
        match self {
            JsValue::Array(a) => Some(Rc::as_ptr(a) as *const ()),
            JsValue::Object(o) => Some(Rc::as_ptr(o) as *const ()),
            JsValue::TemplateObject(t) => Some(Rc::as_ptr(t) as *const ()),
            JsValue::Function(f) => Some(Rc::as_ptr(f) as *const ()),
            JsValue::Module(m) => Some(Rc::as_ptr(m) as *const ()),
            _ => None,
        }
    }

    /// Short type name for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            JsValue::Null => "null",
            JsValue::Undefined => "undefined",
            JsValue::Bool(_) => "boolean",
            JsValue::Int32(_) | JsValue::Float64(_) => "number",
            JsValue::String(_) => "string",
            JsValue::BigInt(_) => "bigint",
            JsValue::Array(_) => "array",
            JsValue::Object(_) => "object",
            JsValue::TemplateObject(_) => "template",
            JsValue::Function(_) => "function",
            JsValue::Module(_) => "module",
        }
    }
}

/// Deep equality. Floats compare by bit pattern so `NaN == NaN` and
/// `-0 != +0`, which is what a byte-exact round trip must preserve.
impl PartialEq for JsValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (JsValue::Null, JsValue::Null) | (JsValue::Undefined, JsValue::Undefined) => true,
            (JsValue::Bool(a), JsValue::Bool(b)) => a == b,
            (JsValue::Int32(a), JsValue::Int32(b)) => a == b,
            (JsValue::Float64(a), JsValue::Float64(b)) => a.to_bits() == b.to_bits(),
            (JsValue::String(a), JsValue::String(b)) => a == b,
            (JsValue::BigInt(a), JsValue::BigInt(b)) => a == b,
            (JsValue::Array(a), JsValue::Array(b)) => Rc::ptr_eq(a, b) || a == b,
            (JsValue::Object(a), JsValue::Object(b)) => Rc::ptr_eq(a, b) || a == b,
            (JsValue::TemplateObject(a), JsValue::TemplateObject(b)) => Rc::ptr_eq(a, b) || a == b,
            (JsValue::Function(a), JsValue::Function(b)) => Rc::ptr_eq(a, b) || a == b,
            (JsValue::Module(a), JsValue::Module(b)) => Rc::ptr_eq(a, b) || a == b,
            _ => false,
        }
    }
}

/// Template object of a tagged template: cooked strings plus the raw array
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateObject {
    pub cooked: Vec<JsValue>,
    pub raw: Vec<JsValue>,
}

/// Kind of function body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum FuncKind {
    #[default]
    Normal = 0,
    Generator = 1,
    Async = 2,
    AsyncGenerator = 3,
}

impl FuncKind {
    pub fn from_flags(is_async: bool, is_generator: bool) -> Self {
        match (is_async, is_generator) {
            (false, false) => FuncKind::Normal,
            (false, true) => FuncKind::Generator,
            (true, false) => FuncKind::Async,
            (true, true) => FuncKind::AsyncGenerator,
        }
    }

    pub fn from_bits(bits: u8) -> Self {
        match bits & 3 {
            0 => FuncKind::Normal,
            1 => FuncKind::Generator,
            2 => FuncKind::Async,
            _ => FuncKind::AsyncGenerator,
        }
    }

    pub fn is_generator(self) -> bool {
        matches!(self, FuncKind::Generator | FuncKind::AsyncGenerator)
    }

    pub fn is_async(self) -> bool {
        matches!(self, FuncKind::Async | FuncKind::AsyncGenerator)
    }
}

bitflags! {
    /// Boolean properties of a function record. The function kind occupies
    /// bits 4-5 of the packed word and is kept separately in [`FuncKind`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FunctionFlags: u16 {
        const HAS_PROTOTYPE = 1 << 0;
        const HAS_SIMPLE_PARAMETER_LIST = 1 << 1;
        const IS_DERIVED_CLASS_CONSTRUCTOR = 1 << 2;
        const NEED_HOME_OBJECT = 1 << 3;
        const NEW_TARGET_ALLOWED = 1 << 6;
        const SUPER_CALL_ALLOWED = 1 << 7;
        const SUPER_ALLOWED = 1 << 8;
        const ARGUMENTS_ALLOWED = 1 << 9;
        const HAS_DEBUG = 1 << 10;
        const IS_EVAL = 1 << 11;
    }
}

/// Bit offset of the function kind inside the packed flag word
pub const FUNC_KIND_SHIFT: u16 = 4;

impl FunctionFlags {
    /// Pack flags and kind into the on-disk u16
    pub fn pack(self, kind: FuncKind) -> u16 {
        self.bits() | ((kind as u16) << FUNC_KIND_SHIFT)
    }

    /// Split an on-disk u16 into flags and kind
    pub fn unpack(word: u16) -> (Self, FuncKind) {
        let kind = FuncKind::from_bits((word >> FUNC_KIND_SHIFT) as u8);
        (FunctionFlags::from_bits_truncate(word), kind)
    }
}

/// Strict mode bit of the `js_mode` byte
pub const JS_MODE_STRICT: u8 = 1 << 0;

/// Kind of a variable definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum VarKind {
    #[default]
    Normal = 0,
    FunctionDecl = 1,
    NewFunctionDecl = 2,
    Catch = 3,
    FunctionName = 4,
    PrivateField = 5,
    PrivateMethod = 6,
    PrivateGetter = 7,
    PrivateSetter = 8,
    PrivateGetterSetter = 9,
}

impl VarKind {
    pub fn from_bits(bits: u8) -> Option<Self> {
        Some(match bits {
            0 => VarKind::Normal,
            1 => VarKind::FunctionDecl,
            2 => VarKind::NewFunctionDecl,
            3 => VarKind::Catch,
            4 => VarKind::FunctionName,
            5 => VarKind::PrivateField,
            6 => VarKind::PrivateMethod,
            7 => VarKind::PrivateGetter,
            8 => VarKind::PrivateSetter,
            9 => VarKind::PrivateGetterSetter,
            _ => return None,
        })
    }

    pub fn is_private(self) -> bool {
        self as u8 >= VarKind::PrivateField as u8
    }
}

/// A local variable or argument definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarDef {
    pub name: Atom,
    /// Scope the variable belongs to; 0 is the function scope
    pub scope_level: u32,
    /// Next variable in the scope chain, `None` at the end
    pub scope_next: Option<u32>,
    pub kind: VarKind,
    pub is_const: bool,
    pub is_lexical: bool,
    pub is_captured: bool,
}

impl VarDef {
    pub fn new(name: Atom) -> Self {
        Self {
            name,
            scope_level: 0,
            scope_next: None,
            kind: VarKind::Normal,
            is_const: false,
            is_lexical: false,
            is_captured: false,
        }
    }
}

/// A variable captured from an enclosing function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosureVar {
    pub name: Atom,
    /// Index in the parent's locals (or arguments), or in the parent's
    /// closure variables when `is_local` is false
    pub var_idx: u16,
    pub is_local: bool,
    pub is_arg: bool,
    pub is_const: bool,
    pub is_lexical: bool,
    pub kind: VarKind,
}

/// Debug information attached to a function record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugInfo {
    pub filename: Atom,
    pub line_num: u32,
    /// Encoded pc-to-line table
    pub pc2line: Vec<u8>,
    /// Source text of the function, dropped by `strip_source`
    pub source: Option<String>,
}

/// A compiled function record
#[derive(Debug, Clone, Default)]
pub struct FunctionBytecode {
    pub name: Atom,
    pub flags: FunctionFlags,
    pub kind: FuncKind,
    pub js_mode: u8,
    pub arg_count: u16,
    pub var_count: u16,
    pub defined_arg_count: u16,
    pub stack_size: u16,
    /// Arguments first, then locals
    pub vardefs: Vec<VarDef>,
    pub closure_vars: Vec<ClosureVar>,
    pub code: Vec<u8>,
    pub debug: Option<DebugInfo>,
    pub cpool: Vec<JsValue>,
    /// Property-access cache slots; rebuilt at load time, never serialized
    pub ic: InlineCacheTable,
}

/// Equality over everything the object format carries
impl PartialEq for FunctionBytecode {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.flags == other.flags
            && self.kind == other.kind
            && self.js_mode == other.js_mode
            && self.arg_count == other.arg_count
            && self.var_count == other.var_count
            && self.defined_arg_count == other.defined_arg_count
            && self.stack_size == other.stack_size
            && self.vardefs == other.vardefs
            && self.closure_vars == other.closure_vars
            && self.code == other.code
            && self.debug == other.debug
            && self.cpool == other.cpool
    }
}

impl FunctionBytecode {
    /// Argument definitions
    pub fn args(&self) -> &[VarDef] {
        &self.vardefs[..(self.arg_count as usize).min(self.vardefs.len())]
    }

    /// Local variable definitions
    pub fn locals(&self) -> &[VarDef] {
        &self.vardefs[(self.arg_count as usize).min(self.vardefs.len())..]
    }

    /// Human-readable listing of this function and its nested functions
    pub fn disassemble(&self, atoms: &AtomTable) -> Result<String> {
        crate::bytecode::disassemble(self, atoms)
    }

    /// Nested function records in the constant pool
    pub fn children(&self) -> impl Iterator<Item = &Rc<FunctionBytecode>> {
        self.cpool.iter().filter_map(|v| match v {
            JsValue::Function(f) => Some(f),
            _ => None,
        })
    }
}

/// Export binding kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportEntryKind {
    /// Exported local variable of the module function
    Local { var_idx: u32 },
    /// Re-export of a binding of a required module
    Indirect { req_module_idx: u32, local_name: Atom },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportEntry {
    pub kind: ExportEntryKind,
    pub export_name: Atom,
}

/// On-disk tag of an export entry
pub const EXPORT_TYPE_LOCAL: u8 = 0;
pub const EXPORT_TYPE_INDIRECT: u8 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct ReqModuleEntry {
    pub module_name: Atom,
    /// Import attributes, `undefined` when absent
    pub attributes: JsValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEntry {
    pub var_idx: u32,
    pub is_star: bool,
    pub import_name: Atom,
    pub req_module_idx: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StarExportEntry {
    pub req_module_idx: u32,
}

/// A compiled module record
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleDef {
    pub name: Atom,
    pub req_modules: Vec<ReqModuleEntry>,
    pub exports: Vec<ExportEntry>,
    pub star_exports: Vec<StarExportEntry>,
    pub imports: Vec<ImportEntry>,
    pub func: Rc<FunctionBytecode>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_normalization() {
        assert_eq!(JsValue::number(1.0), JsValue::Int32(1));
        assert_eq!(JsValue::number(-7.0), JsValue::Int32(-7));
        assert_eq!(JsValue::number(1.5), JsValue::Float64(1.5));
        assert_eq!(JsValue::number(-0.0), JsValue::Float64(-0.0));
        assert_eq!(JsValue::number(4294967296.0), JsValue::Float64(4294967296.0));
    }

    #[test]
    fn test_float_bit_equality() {
        assert_eq!(JsValue::Float64(f64::NAN), JsValue::Float64(f64::NAN));
        assert_ne!(JsValue::Float64(0.0), JsValue::Float64(-0.0));
    }

    #[test]
    fn test_flags_pack_roundtrip() {
        let flags = FunctionFlags::HAS_PROTOTYPE | FunctionFlags::ARGUMENTS_ALLOWED;
        let word = flags.pack(FuncKind::AsyncGenerator);
        assert_eq!(word, 1 | (3 << 4) | (1 << 9));
        assert_eq!(FunctionFlags::unpack(word), (flags, FuncKind::AsyncGenerator));
    }

    #[test]
    fn test_var_kind_bits() {
        assert_eq!(VarKind::from_bits(6), Some(VarKind::PrivateMethod));
        assert_eq!(VarKind::from_bits(12), None);
        assert!(VarKind::PrivateGetter.is_private());
        assert!(!VarKind::Catch.is_private());
    }
}
