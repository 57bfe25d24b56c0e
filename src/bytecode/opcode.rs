//! Opcode table
//!
//! Two disjoint instruction sets share this module:
//!
//! - [`Opcode`]: every opcode that may appear in final bytecode, numbered
//!   exactly as the reference VM numbers them. Short opcodes follow `nop`.
//! - [`TempOpcode`]: pseudo-opcodes that only exist in the raw stream
//!   produced by the emitters (scoped variable accesses, label markers,
//!   line markers). They are rewritten away by the resolution passes.
//!
//! The byte values of temporary opcodes overlap with the short opcodes,
//! which is harmless because short opcodes are only introduced after every
//! temporary opcode has been removed. [`Op`] is the decoded, phase-aware
//! view used by the passes.

use std::fmt;

/// Operand layout of an opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    None,
    /// Implicit integer (push_0 .. push_7)
    NoneInt,
    /// Implicit local index (get_loc0 ..)
    NoneLoc,
    /// Implicit argument index
    NoneArg,
    /// Implicit closure variable index
    NoneVarRef,
    U8,
    I8,
    Loc8,
    Const8,
    Label8,
    U16,
    I16,
    Label16,
    /// Argument count as u16
    Npop,
    /// Implicit argument count (call0 ..)
    Npopx,
    NpopU16,
    Loc,
    Arg,
    VarRef,
    U32,
    I32,
    Const,
    Label,
    Atom,
    AtomU8,
    AtomU16,
    AtomLabelU8,
    AtomLabelU16,
    LabelU16,
}

impl Format {
    /// Number of operand bytes following the opcode byte
    pub fn operand_size(self) -> usize {
        match self {
            Format::None
            | Format::NoneInt
            | Format::NoneLoc
            | Format::NoneArg
            | Format::NoneVarRef
            | Format::Npopx => 0,
            Format::U8 | Format::I8 | Format::Loc8 | Format::Const8 | Format::Label8 => 1,
            Format::U16
            | Format::I16
            | Format::Label16
            | Format::Npop
            | Format::Loc
            | Format::Arg
            | Format::VarRef => 2,
            Format::NpopU16 => 4,
            Format::U32 | Format::I32 | Format::Const | Format::Label | Format::Atom => 4,
            Format::AtomU8 => 5,
            Format::AtomU16 | Format::LabelU16 => 6,
            Format::AtomLabelU8 => 9,
            Format::AtomLabelU16 => 10,
        }
    }

    /// Does this format carry a jump target?
    pub fn has_label(self) -> bool {
        matches!(
            self,
            Format::Label
                | Format::Label8
                | Format::Label16
                | Format::AtomLabelU8
                | Format::AtomLabelU16
                | Format::LabelU16
        )
    }

    /// Does this format embed an atom?
    pub fn has_atom(self) -> bool {
        matches!(
            self,
            Format::Atom
                | Format::AtomU8
                | Format::AtomU16
                | Format::AtomLabelU8
                | Format::AtomLabelU16
        )
    }
}

/// Static description of one opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeInfo {
    pub name: &'static str,
    /// Total encoded size including the opcode byte
    pub size: u8,
    pub n_pop: u8,
    pub n_push: u8,
    pub format: Format,
}

macro_rules! opcode_set {
    (
        $(#[$meta:meta])*
        $vis:vis enum $Enum:ident (base = $base:expr, table = $table:ident) {
            $( $variant:ident = $name:literal, $size:literal, $pop:literal, $push:literal, $fmt:ident; )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        $vis enum $Enum {
            $( $variant, )*
        }

        static $table: &[OpcodeInfo] = &[
            $( OpcodeInfo { name: $name, size: $size, n_pop: $pop, n_push: $push, format: Format::$fmt }, )*
        ];

        impl $Enum {
            /// Every opcode of this set, in encoding order
            pub const ALL: &'static [$Enum] = &[ $( $Enum::$variant, )* ];

            /// Byte value of the first opcode of this set
            pub const BASE: u8 = $base;

            /// Static description
            pub fn info(self) -> &'static OpcodeInfo {
                &$table[self as usize]
            }

            /// Encoded byte value
            pub fn to_byte(self) -> u8 {
                Self::BASE + self as u8
            }

            /// Decode a byte belonging to this set
            pub fn from_byte(byte: u8) -> Option<Self> {
                let index = byte.checked_sub(Self::BASE)?;
                Self::ALL.get(index as usize).copied()
            }

            /// Look an opcode up by its listing name
            pub fn from_name(name: &str) -> Option<Self> {
                Self::ALL.iter().copied().find(|op| op.info().name == name)
            }

            /// Listing name
            pub fn name(self) -> &'static str {
                self.info().name
            }

            /// Encoded size in bytes, operands included
            pub fn size(self) -> usize {
                self.info().size as usize
            }

            /// Operand layout
            pub fn format(self) -> Format {
                self.info().format
            }
        }

        impl fmt::Display for $Enum {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

opcode_set! {
    /// Opcodes of final bytecode, numbered as the reference VM numbers them
    pub enum Opcode (base = 0, table = OPCODE_INFO) {
        // ========== Constants and stack ==========
        Invalid = "invalid", 1, 0, 0, None;
        PushI32 = "push_i32", 5, 0, 1, I32;
        PushConst = "push_const", 5, 0, 1, Const;
        FClosure = "fclosure", 5, 0, 1, Const;
        PushAtomValue = "push_atom_value", 5, 0, 1, Atom;
        PrivateSymbol = "private_symbol", 5, 0, 1, Atom;
        Undefined = "undefined", 1, 0, 1, None;
        Null = "null", 1, 0, 1, None;
        PushThis = "push_this", 1, 0, 1, None;
        PushFalse = "push_false", 1, 0, 1, None;
        PushTrue = "push_true", 1, 0, 1, None;
        Object = "object", 1, 0, 1, None;
        SpecialObject = "special_object", 2, 0, 1, U8;
        Rest = "rest", 3, 0, 1, U16;
        Drop = "drop", 1, 1, 0, None;
        Nip = "nip", 1, 2, 1, None;
        Nip1 = "nip1", 1, 3, 2, None;
        Dup = "dup", 1, 1, 2, None;
        Dup1 = "dup1", 1, 2, 3, None;
        Dup2 = "dup2", 1, 2, 4, None;
        Dup3 = "dup3", 1, 3, 6, None;
        Insert2 = "insert2", 1, 2, 3, None;
        Insert3 = "insert3", 1, 3, 4, None;
        Insert4 = "insert4", 1, 4, 5, None;
        Perm3 = "perm3", 1, 3, 3, None;
        Perm4 = "perm4", 1, 4, 4, None;
        Perm5 = "perm5", 1, 5, 5, None;
        Swap = "swap", 1, 2, 2, None;
        Swap2 = "swap2", 1, 4, 4, None;
        Rot3l = "rot3l", 1, 3, 3, None;
        Rot3r = "rot3r", 1, 3, 3, None;
        Rot4l = "rot4l", 1, 4, 4, None;
        Rot5l = "rot5l", 1, 5, 5, None;

        // ========== Calls and returns ==========
        CallConstructor = "call_constructor", 3, 2, 1, Npop;
        Call = "call", 3, 1, 1, Npop;
        TailCall = "tail_call", 3, 1, 0, Npop;
        CallMethod = "call_method", 3, 2, 1, Npop;
        TailCallMethod = "tail_call_method", 3, 2, 0, Npop;
        ArrayFrom = "array_from", 3, 0, 1, Npop;
        Apply = "apply", 3, 3, 1, U16;
        Return = "return", 1, 1, 0, None;
        ReturnUndef = "return_undef", 1, 0, 0, None;
        CheckCtorReturn = "check_ctor_return", 1, 1, 2, None;
        CheckCtor = "check_ctor", 1, 0, 0, None;
        CheckBrand = "check_brand", 1, 2, 2, None;
        AddBrand = "add_brand", 1, 2, 0, None;
        ReturnAsync = "return_async", 1, 1, 0, None;
        Throw = "throw", 1, 1, 0, None;
        ThrowError = "throw_error", 6, 0, 0, AtomU8;
        Eval = "eval", 5, 1, 1, NpopU16;
        ApplyEval = "apply_eval", 3, 2, 1, U16;
        Regexp = "regexp", 1, 2, 1, None;
        GetSuper = "get_super", 1, 1, 1, None;
        Import = "import", 1, 1, 1, None;

        // ========== Global variables ==========
        CheckVar = "check_var", 5, 0, 1, Atom;
        GetVarUndef = "get_var_undef", 5, 0, 1, Atom;
        GetVar = "get_var", 5, 0, 1, Atom;
        PutVar = "put_var", 5, 1, 0, Atom;
        PutVarInit = "put_var_init", 5, 1, 0, Atom;
        PutVarStrict = "put_var_strict", 5, 2, 0, Atom;
        GetRefValue = "get_ref_value", 1, 2, 3, None;
        PutRefValue = "put_ref_value", 1, 3, 0, None;
        DefineVar = "define_var", 6, 0, 0, AtomU8;
        CheckDefineVar = "check_define_var", 6, 0, 0, AtomU8;
        DefineFunc = "define_func", 6, 1, 0, AtomU8;

        // ========== Properties ==========
        GetField = "get_field", 5, 1, 1, Atom;
        GetField2 = "get_field2", 5, 1, 2, Atom;
        PutField = "put_field", 5, 2, 0, Atom;
        GetPrivateField = "get_private_field", 1, 2, 1, None;
        PutPrivateField = "put_private_field", 1, 3, 0, None;
        DefinePrivateField = "define_private_field", 1, 3, 1, None;
        GetArrayEl = "get_array_el", 1, 2, 1, None;
        GetArrayEl2 = "get_array_el2", 1, 2, 2, None;
        PutArrayEl = "put_array_el", 1, 3, 0, None;
        GetSuperValue = "get_super_value", 1, 3, 1, None;
        PutSuperValue = "put_super_value", 1, 4, 0, None;
        DefineField = "define_field", 5, 2, 1, Atom;
        SetName = "set_name", 5, 1, 1, Atom;
        SetNameComputed = "set_name_computed", 1, 2, 2, None;
        SetProto = "set_proto", 1, 2, 1, None;
        SetHomeObject = "set_home_object", 1, 2, 2, None;
        DefineArrayEl = "define_array_el", 1, 3, 2, None;
        Append = "append", 1, 3, 2, None;
        CopyDataProperties = "copy_data_properties", 2, 3, 3, U8;
        DefineMethod = "define_method", 6, 2, 1, AtomU8;
        DefineMethodComputed = "define_method_computed", 2, 3, 1, U8;
        DefineClass = "define_class", 6, 2, 2, AtomU8;
        DefineClassComputed = "define_class_computed", 6, 3, 3, AtomU8;

        // ========== Locals, arguments and closure variables ==========
        GetLoc = "get_loc", 3, 0, 1, Loc;
        PutLoc = "put_loc", 3, 1, 0, Loc;
        SetLoc = "set_loc", 3, 1, 1, Loc;
        GetArg = "get_arg", 3, 0, 1, Arg;
        PutArg = "put_arg", 3, 1, 0, Arg;
        SetArg = "set_arg", 3, 1, 1, Arg;
        GetVarRef = "get_var_ref", 3, 0, 1, VarRef;
        PutVarRef = "put_var_ref", 3, 1, 0, VarRef;
        SetVarRef = "set_var_ref", 3, 1, 1, VarRef;
        SetLocUninitialized = "set_loc_uninitialized", 3, 0, 0, Loc;
        GetLocCheck = "get_loc_check", 3, 0, 1, Loc;
        PutLocCheck = "put_loc_check", 3, 1, 0, Loc;
        PutLocCheckInit = "put_loc_check_init", 3, 1, 0, Loc;
        GetVarRefCheck = "get_var_ref_check", 3, 0, 1, VarRef;
        PutVarRefCheck = "put_var_ref_check", 3, 1, 0, VarRef;
        PutVarRefCheckInit = "put_var_ref_check_init", 3, 1, 0, VarRef;
        CloseLoc = "close_loc", 3, 0, 0, Loc;

        // ========== Control flow ==========
        IfFalse = "if_false", 5, 1, 0, Label;
        IfTrue = "if_true", 5, 1, 0, Label;
        Goto = "goto", 5, 0, 0, Label;
        Catch = "catch", 5, 0, 1, Label;
        Gosub = "gosub", 5, 0, 0, Label;
        Ret = "ret", 1, 1, 0, None;
        NipCatch = "nip_catch", 1, 2, 1, None;
        ToObject = "to_object", 1, 1, 1, None;
        ToPropkey = "to_propkey", 1, 1, 1, None;
        ToPropkey2 = "to_propkey2", 1, 2, 2, None;

        // ========== with statement ==========
        WithGetVar = "with_get_var", 10, 1, 0, AtomLabelU8;
        WithPutVar = "with_put_var", 10, 2, 1, AtomLabelU8;
        WithDeleteVar = "with_delete_var", 10, 1, 0, AtomLabelU8;
        WithMakeRef = "with_make_ref", 10, 1, 0, AtomLabelU8;
        WithGetRef = "with_get_ref", 10, 1, 0, AtomLabelU8;
        WithGetRefUndef = "with_get_ref_undef", 10, 1, 0, AtomLabelU8;
        MakeLocRef = "make_loc_ref", 7, 0, 2, AtomU16;
        MakeArgRef = "make_arg_ref", 7, 0, 2, AtomU16;
        MakeVarRefRef = "make_var_ref_ref", 7, 0, 2, AtomU16;
        MakeVarRef = "make_var_ref", 5, 0, 2, Atom;

        // ========== Iteration ==========
        ForInStart = "for_in_start", 1, 1, 1, None;
        ForOfStart = "for_of_start", 1, 1, 3, None;
        ForAwaitOfStart = "for_await_of_start", 1, 1, 3, None;
        ForInNext = "for_in_next", 1, 1, 3, None;
        ForOfNext = "for_of_next", 2, 3, 5, U8;
        IteratorCheckObject = "iterator_check_object", 1, 1, 1, None;
        IteratorGetValueDone = "iterator_get_value_done", 1, 1, 2, None;
        IteratorClose = "iterator_close", 1, 3, 0, None;
        IteratorNext = "iterator_next", 1, 4, 4, None;
        IteratorCall = "iterator_call", 2, 4, 5, U8;
        InitialYield = "initial_yield", 1, 0, 0, None;
        Yield = "yield", 1, 1, 2, None;
        YieldStar = "yield_star", 1, 1, 2, None;
        AsyncYieldStar = "async_yield_star", 1, 1, 2, None;
        Await = "await", 1, 1, 1, None;

        // ========== Arithmetic and logic ==========
        Neg = "neg", 1, 1, 1, None;
        Plus = "plus", 1, 1, 1, None;
        Dec = "dec", 1, 1, 1, None;
        Inc = "inc", 1, 1, 1, None;
        PostDec = "post_dec", 1, 1, 2, None;
        PostInc = "post_inc", 1, 1, 2, None;
        DecLoc = "dec_loc", 2, 0, 0, Loc8;
        IncLoc = "inc_loc", 2, 0, 0, Loc8;
        AddLoc = "add_loc", 2, 1, 0, Loc8;
        Not = "not", 1, 1, 1, None;
        LNot = "lnot", 1, 1, 1, None;
        TypeOf = "typeof", 1, 1, 1, None;
        Delete = "delete", 1, 2, 1, None;
        DeleteVar = "delete_var", 5, 0, 1, Atom;
        Mul = "mul", 1, 2, 1, None;
        Div = "div", 1, 2, 1, None;
        Mod = "mod", 1, 2, 1, None;
        Add = "add", 1, 2, 1, None;
        Sub = "sub", 1, 2, 1, None;
        Pow = "pow", 1, 2, 1, None;
        Shl = "shl", 1, 2, 1, None;
        Sar = "sar", 1, 2, 1, None;
        Shr = "shr", 1, 2, 1, None;
        Lt = "lt", 1, 2, 1, None;
        Lte = "lte", 1, 2, 1, None;
        Gt = "gt", 1, 2, 1, None;
        Gte = "gte", 1, 2, 1, None;
        InstanceOf = "instanceof", 1, 2, 1, None;
        In = "in", 1, 2, 1, None;
        Eq = "eq", 1, 2, 1, None;
        Neq = "neq", 1, 2, 1, None;
        StrictEq = "strict_eq", 1, 2, 1, None;
        StrictNeq = "strict_neq", 1, 2, 1, None;
        And = "and", 1, 2, 1, None;
        Xor = "xor", 1, 2, 1, None;
        Or = "or", 1, 2, 1, None;
        IsUndefinedOrNull = "is_undefined_or_null", 1, 1, 1, None;
        PrivateIn = "private_in", 1, 2, 1, None;
        Nop = "nop", 1, 0, 0, None;

        // ========== Short opcodes ==========
        PushMinus1 = "push_minus1", 1, 0, 1, NoneInt;
        Push0 = "push_0", 1, 0, 1, NoneInt;
        Push1 = "push_1", 1, 0, 1, NoneInt;
        Push2 = "push_2", 1, 0, 1, NoneInt;
        Push3 = "push_3", 1, 0, 1, NoneInt;
        Push4 = "push_4", 1, 0, 1, NoneInt;
        Push5 = "push_5", 1, 0, 1, NoneInt;
        Push6 = "push_6", 1, 0, 1, NoneInt;
        Push7 = "push_7", 1, 0, 1, NoneInt;
        PushI8 = "push_i8", 2, 0, 1, I8;
        PushI16 = "push_i16", 3, 0, 1, I16;
        PushConst8 = "push_const8", 2, 0, 1, Const8;
        FClosure8 = "fclosure8", 2, 0, 1, Const8;
        PushEmptyString = "push_empty_string", 1, 0, 1, None;
        GetLoc8 = "get_loc8", 2, 0, 1, Loc8;
        PutLoc8 = "put_loc8", 2, 1, 0, Loc8;
        SetLoc8 = "set_loc8", 2, 1, 1, Loc8;
        GetLoc0 = "get_loc0", 1, 0, 1, NoneLoc;
        GetLoc1 = "get_loc1", 1, 0, 1, NoneLoc;
        GetLoc2 = "get_loc2", 1, 0, 1, NoneLoc;
        GetLoc3 = "get_loc3", 1, 0, 1, NoneLoc;
        PutLoc0 = "put_loc0", 1, 1, 0, NoneLoc;
        PutLoc1 = "put_loc1", 1, 1, 0, NoneLoc;
        PutLoc2 = "put_loc2", 1, 1, 0, NoneLoc;
        PutLoc3 = "put_loc3", 1, 1, 0, NoneLoc;
        SetLoc0 = "set_loc0", 1, 1, 1, NoneLoc;
        SetLoc1 = "set_loc1", 1, 1, 1, NoneLoc;
        SetLoc2 = "set_loc2", 1, 1, 1, NoneLoc;
        SetLoc3 = "set_loc3", 1, 1, 1, NoneLoc;
        GetArg0 = "get_arg0", 1, 0, 1, NoneArg;
        GetArg1 = "get_arg1", 1, 0, 1, NoneArg;
        GetArg2 = "get_arg2", 1, 0, 1, NoneArg;
        GetArg3 = "get_arg3", 1, 0, 1, NoneArg;
        PutArg0 = "put_arg0", 1, 1, 0, NoneArg;
        PutArg1 = "put_arg1", 1, 1, 0, NoneArg;
        PutArg2 = "put_arg2", 1, 1, 0, NoneArg;
        PutArg3 = "put_arg3", 1, 1, 0, NoneArg;
        SetArg0 = "set_arg0", 1, 1, 1, NoneArg;
        SetArg1 = "set_arg1", 1, 1, 1, NoneArg;
        SetArg2 = "set_arg2", 1, 1, 1, NoneArg;
        SetArg3 = "set_arg3", 1, 1, 1, NoneArg;
        GetVarRef0 = "get_var_ref0", 1, 0, 1, NoneVarRef;
        GetVarRef1 = "get_var_ref1", 1, 0, 1, NoneVarRef;
        GetVarRef2 = "get_var_ref2", 1, 0, 1, NoneVarRef;
        GetVarRef3 = "get_var_ref3", 1, 0, 1, NoneVarRef;
        PutVarRef0 = "put_var_ref0", 1, 1, 0, NoneVarRef;
        PutVarRef1 = "put_var_ref1", 1, 1, 0, NoneVarRef;
        PutVarRef2 = "put_var_ref2", 1, 1, 0, NoneVarRef;
        PutVarRef3 = "put_var_ref3", 1, 1, 0, NoneVarRef;
        SetVarRef0 = "set_var_ref0", 1, 1, 1, NoneVarRef;
        SetVarRef1 = "set_var_ref1", 1, 1, 1, NoneVarRef;
        SetVarRef2 = "set_var_ref2", 1, 1, 1, NoneVarRef;
        SetVarRef3 = "set_var_ref3", 1, 1, 1, NoneVarRef;
        GetLength = "get_length", 1, 1, 1, None;
        IfFalse8 = "if_false8", 2, 1, 0, Label8;
        IfTrue8 = "if_true8", 2, 1, 0, Label8;
        Goto8 = "goto8", 2, 0, 0, Label8;
        Goto16 = "goto16", 3, 0, 0, Label16;
        Call0 = "call0", 1, 1, 1, Npopx;
        Call1 = "call1", 1, 1, 1, Npopx;
        Call2 = "call2", 1, 1, 1, Npopx;
        Call3 = "call3", 1, 1, 1, Npopx;
        IsUndefined = "is_undefined", 1, 1, 1, None;
        IsNull = "is_null", 1, 1, 1, None;
        TypeofIsUndefined = "typeof_is_undefined", 1, 1, 1, None;
        TypeofIsFunction = "typeof_is_function", 1, 1, 1, None;
    }
}

opcode_set! {
    /// Pseudo-opcodes that only exist between emission and resolution
    pub enum TempOpcode (base = Opcode::Nop as u8 + 1, table = TEMP_OPCODE_INFO) {
        EnterScope = "enter_scope", 3, 0, 0, U16;
        LeaveScope = "leave_scope", 3, 0, 0, U16;
        Label = "label", 5, 0, 0, Label;
        ScopeGetVarUndef = "scope_get_var_undef", 7, 0, 1, AtomU16;
        ScopeGetVar = "scope_get_var", 7, 0, 1, AtomU16;
        ScopePutVar = "scope_put_var", 7, 1, 0, AtomU16;
        ScopeDeleteVar = "scope_delete_var", 7, 0, 1, AtomU16;
        ScopeMakeRef = "scope_make_ref", 11, 0, 2, AtomLabelU16;
        ScopeGetRef = "scope_get_ref", 7, 0, 2, AtomU16;
        ScopePutVarInit = "scope_put_var_init", 7, 1, 0, AtomU16;
        ScopeGetVarCheckthis = "scope_get_var_checkthis", 7, 0, 1, AtomU16;
        ScopeGetPrivateField = "scope_get_private_field", 7, 1, 1, AtomU16;
        ScopeGetPrivateField2 = "scope_get_private_field2", 7, 1, 2, AtomU16;
        ScopePutPrivateField = "scope_put_private_field", 7, 2, 0, AtomU16;
        ScopeInPrivateField = "scope_in_private_field", 7, 1, 1, AtomU16;
        GetFieldOptChain = "get_field_opt_chain", 5, 1, 1, Atom;
        GetArrayElOptChain = "get_array_el_opt_chain", 1, 2, 1, None;
        OptionalChain = "optional_chain", 5, 1, 1, Label;
        LineNum = "line_num", 5, 0, 0, U32;
    }
}

impl Opcode {
    /// Is this one of the narrow-operand variants?
    pub fn is_short(self) -> bool {
        self > Opcode::Nop
    }

    /// Is this a branch whose target is a label operand?
    pub fn is_jump(self) -> bool {
        self.format().has_label()
    }

    /// Does control never fall through to the next instruction?
    pub fn is_terminator(self) -> bool {
        matches!(
            self,
            Opcode::Goto
                | Opcode::Goto8
                | Opcode::Goto16
                | Opcode::Return
                | Opcode::ReturnUndef
                | Opcode::ReturnAsync
                | Opcode::Throw
                | Opcode::ThrowError
                | Opcode::Ret
                | Opcode::TailCall
                | Opcode::TailCallMethod
        )
    }

    /// Canonical long form of a short opcode together with its implicit
    /// operand, if the short form encodes one.
    pub fn long_form(self) -> (Opcode, Option<i32>) {
        use Opcode::*;
        let implicit = |base: Opcode, first: Opcode| (base, Some(self as i32 - first as i32));
        match self {
            PushMinus1 => (PushI32, Some(-1)),
            Push0 | Push1 | Push2 | Push3 | Push4 | Push5 | Push6 | Push7 => implicit(PushI32, Push0),
            PushI8 | PushI16 => (PushI32, None),
            PushConst8 => (PushConst, None),
            FClosure8 => (FClosure, None),
            PushEmptyString => (PushAtomValue, None),
            GetLoc8 => (GetLoc, None),
            PutLoc8 => (PutLoc, None),
            SetLoc8 => (SetLoc, None),
            GetLoc0 | GetLoc1 | GetLoc2 | GetLoc3 => implicit(GetLoc, GetLoc0),
            PutLoc0 | PutLoc1 | PutLoc2 | PutLoc3 => implicit(PutLoc, PutLoc0),
            SetLoc0 | SetLoc1 | SetLoc2 | SetLoc3 => implicit(SetLoc, SetLoc0),
            GetArg0 | GetArg1 | GetArg2 | GetArg3 => implicit(GetArg, GetArg0),
            PutArg0 | PutArg1 | PutArg2 | PutArg3 => implicit(PutArg, PutArg0),
            SetArg0 | SetArg1 | SetArg2 | SetArg3 => implicit(SetArg, SetArg0),
            GetVarRef0 | GetVarRef1 | GetVarRef2 | GetVarRef3 => implicit(GetVarRef, GetVarRef0),
            PutVarRef0 | PutVarRef1 | PutVarRef2 | PutVarRef3 => implicit(PutVarRef, PutVarRef0),
            SetVarRef0 | SetVarRef1 | SetVarRef2 | SetVarRef3 => implicit(SetVarRef, SetVarRef0),
            GetLength => (GetField, None),
            IfFalse8 => (IfFalse, None),
            IfTrue8 => (IfTrue, None),
            Goto8 | Goto16 => (Goto, None),
            Call0 | Call1 | Call2 | Call3 => implicit(Call, Call0),
            other => (other, None),
        }
    }
}

/// Special objects pushed by `special_object`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SpecialObject {
    Arguments = 0,
    MappedArguments = 1,
    ThisFunc = 2,
    NewTarget = 3,
    HomeObject = 4,
    VarObject = 5,
    ImportMeta = 6,
}

/// An opcode decoded in the context of a compilation phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Final(Opcode),
    Temp(TempOpcode),
}

impl Op {
    /// Decode a byte of the raw emitter stream, where every byte past
    /// `nop` is a temporary opcode.
    pub fn decode_raw(byte: u8) -> Option<Op> {
        if byte < TempOpcode::BASE {
            Opcode::from_byte(byte).map(Op::Final)
        } else {
            TempOpcode::from_byte(byte).map(Op::Temp)
        }
    }

    /// Decode a byte of final bytecode, short opcodes included
    pub fn decode_final(byte: u8) -> Option<Op> {
        Opcode::from_byte(byte).map(Op::Final)
    }

    pub fn info(self) -> &'static OpcodeInfo {
        match self {
            Op::Final(op) => op.info(),
            Op::Temp(op) => op.info(),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Op::Final(op) => op.to_byte(),
            Op::Temp(op) => op.to_byte(),
        }
    }

    pub fn format(self) -> Format {
        self.info().format
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }
}

impl From<Opcode> for Op {
    fn from(op: Opcode) -> Self {
        Op::Final(op)
    }
}

impl From<TempOpcode> for Op {
    fn from(op: TempOpcode) -> Self {
        Op::Temp(op)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
