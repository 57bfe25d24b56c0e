//! Bytecode object format
//!
//! An object file is a leading atom section followed by one tagged value.
//! Every atom the value graph mentions is listed once in the atom section
//! and referred to by a compact index: builtin atoms keep their id, every
//! other atom gets `ATOM_END + n` in first-encounter order. Atoms embedded
//! in bytecode are rewritten to the same index space.
//!
//! The body is produced first so that the atom section is complete by the
//! time it is emitted in front of it.

pub mod leb128;
mod reader;

pub use reader::{read_object, ReadOptions, Reader};

use crate::atom::{Atom, AtomTable, ATOM_END};
use crate::bytecode::insn::decode_final;
use crate::error::{Error, Result};
use crate::value::{
    ExportEntryKind, FunctionBytecode, FunctionFlags, JsValue, ModuleDef, TemplateObject,
    EXPORT_TYPE_INDIRECT, EXPORT_TYPE_LOCAL,
};
use num_bigint::BigInt;
use num_traits::Zero;
use rustc_hash::FxHashMap;
use tracing::debug;

/// Format version written as the first byte of every object
pub const BC_VERSION: u8 = 2;

/// Value tags of the object format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Tag {
    Null = 1,
    Undefined = 2,
    False = 3,
    True = 4,
    Int32 = 5,
    Float64 = 6,
    String = 7,
    Object = 8,
    Array = 9,
    BigInt = 10,
    BigFloat = 11,
    BigDecimal = 12,
    TemplateObject = 13,
    FunctionBytecode = 14,
    Module = 15,
    TypedArray = 16,
    ArrayBuffer = 17,
    SharedArrayBuffer = 18,
    Date = 19,
    ObjectValue = 20,
    ObjectReference = 21,
}

impl Tag {
    pub fn from_byte(byte: u8) -> Option<Self> {
        use Tag::*;
        Some(match byte {
            1 => Null,
            2 => Undefined,
            3 => False,
            4 => True,
            5 => Int32,
            6 => Float64,
            7 => String,
            8 => Object,
            9 => Array,
            10 => BigInt,
            11 => BigFloat,
            12 => BigDecimal,
            13 => TemplateObject,
            14 => FunctionBytecode,
            15 => Module,
            16 => TypedArray,
            17 => ArrayBuffer,
            18 => SharedArrayBuffer,
            19 => Date,
            20 => ObjectValue,
            21 => ObjectReference,
            _ => return None,
        })
    }
}

/// Serializer options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Emit back-references for compound values seen before
    pub allow_reference: bool,
    /// Omit the debug block of every function
    pub strip_debug: bool,
    /// Omit function source text from the debug block
    pub strip_source: bool,
}

/// Streaming writer for one object
pub struct Writer<'a> {
    atoms: &'a AtomTable,
    options: WriteOptions,
    body: Vec<u8>,
    atom_to_idx: FxHashMap<Atom, u32>,
    idx_to_atom: Vec<Atom>,
    objects: FxHashMap<*const (), u32>,
    object_count: u32,
}

impl<'a> Writer<'a> {
    pub fn new(atoms: &'a AtomTable, options: WriteOptions) -> Self {
        Self {
            atoms,
            options,
            body: Vec::new(),
            atom_to_idx: FxHashMap::default(),
            idx_to_atom: Vec::new(),
            objects: FxHashMap::default(),
            object_count: 0,
        }
    }

    /// Prepend the atom section and return the complete object
    pub fn finish(self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.body.len() + 16 * self.idx_to_atom.len());
        out.push(BC_VERSION);
        leb128::write_u32(&mut out, self.idx_to_atom.len() as u32);
        for &atom in &self.idx_to_atom {
            let name = self
                .atoms
                .name(atom)
                .ok_or_else(|| Error::Serialize(format!("{} is not in the atom table", atom)))?;
            write_string(&mut out, &name);
        }
        debug!(atoms = self.idx_to_atom.len(), bytes = out.len() + self.body.len(), "serialized object");
        out.extend_from_slice(&self.body);
        Ok(out)
    }

    fn put_u8(&mut self, v: u8) {
        self.body.push(v);
    }

    fn put_u16(&mut self, v: u16) {
        self.body.extend_from_slice(&v.to_le_bytes());
    }

    fn put_leb(&mut self, v: u32) {
        leb128::write_u32(&mut self.body, v);
    }

    fn put_count(&mut self, n: usize) -> Result<()> {
        let n = u32::try_from(n).map_err(|_| Error::Serialize(format!("count {} too large", n)))?;
        self.put_leb(n);
        Ok(())
    }

    /// Compact index of an atom, registering it on first use
    fn atom_to_idx(&mut self, atom: Atom) -> Result<u32> {
        if atom.is_tagged_int() || atom.id() < ATOM_END {
            return Ok(atom.id());
        }
        if let Some(&idx) = self.atom_to_idx.get(&atom) {
            return Ok(idx);
        }
        if !self.atoms.has(atom) {
            return Err(Error::Serialize(format!("{} is not in the atom table", atom)));
        }
        let idx = ATOM_END + self.idx_to_atom.len() as u32;
        self.idx_to_atom.push(atom);
        self.atom_to_idx.insert(atom, idx);
        Ok(idx)
    }

    fn put_atom(&mut self, atom: Atom) -> Result<()> {
        let v = match atom.as_index() {
            Some(n) => (n << 1) | 1,
            None => self.atom_to_idx(atom)? << 1,
        };
        self.put_leb(v);
        Ok(())
    }

    /// Assign the next object index to a compound value. Returns the
    /// index of an earlier occurrence when back-references are enabled.
    fn register_object(&mut self, identity: Option<*const ()>) -> Option<u32> {
        let index = self.object_count;
        self.object_count += 1;
        let id = identity?;
        if self.options.allow_reference {
            if let Some(&seen) = self.objects.get(&id) {
                self.object_count -= 1;
                return Some(seen);
            }
        }
        self.objects.insert(id, index);
        None
    }

    /// Write any value, tag included
    pub fn write_value(&mut self, value: &JsValue) -> Result<()> {
        if value.is_object_like() {
            if let Some(seen) = self.register_object(value.identity()) {
                self.put_u8(Tag::ObjectReference as u8);
                self.put_leb(seen);
                return Ok(());
            }
        }
        match value {
            JsValue::Null => self.put_u8(Tag::Null as u8),
            JsValue::Undefined => self.put_u8(Tag::Undefined as u8),
            JsValue::Bool(false) => self.put_u8(Tag::False as u8),
            JsValue::Bool(true) => self.put_u8(Tag::True as u8),
            JsValue::Int32(n) => {
                self.put_u8(Tag::Int32 as u8);
                leb128::write_i32(&mut self.body, *n);
            }
            JsValue::Float64(f) => {
                self.put_u8(Tag::Float64 as u8);
                self.body.extend_from_slice(&f.to_bits().to_le_bytes());
            }
            JsValue::String(s) => {
                self.put_u8(Tag::String as u8);
                write_string(&mut self.body, s);
            }
            JsValue::BigInt(b) => {
                self.put_u8(Tag::BigInt as u8);
                self.write_bigint(b)?;
            }
            JsValue::Array(items) => {
                self.put_u8(Tag::Array as u8);
                self.write_items(items)?;
            }
            JsValue::Object(props) => {
                self.put_u8(Tag::Object as u8);
                self.put_count(props.len())?;
                for (key, v) in props.iter() {
                    self.put_atom(*key)?;
                    self.write_value(v)?;
                }
            }
            JsValue::TemplateObject(t) => self.write_template(t)?,
            JsValue::Function(f) => self.write_function(f)?,
            JsValue::Module(m) => self.write_module(m)?,
        }
        Ok(())
    }

    fn write_items(&mut self, items: &[JsValue]) -> Result<()> {
        self.put_count(items.len())?;
        for item in items {
            self.write_value(item)?;
        }
        Ok(())
    }

    fn write_template(&mut self, template: &TemplateObject) -> Result<()> {
        self.put_u8(Tag::TemplateObject as u8);
        self.write_items(&template.cooked)?;
        // the raw strings array is a fresh object of its own
        self.register_object(None);
        self.put_u8(Tag::Array as u8);
        self.write_items(&template.raw)
    }

    fn write_bigint(&mut self, b: &BigInt) -> Result<()> {
        if b.is_zero() {
            self.put_leb(0);
            return Ok(());
        }
        let bytes = b.to_signed_bytes_le();
        self.put_count(bytes.len())?;
        self.body.extend_from_slice(&bytes);
        Ok(())
    }

    /// Write a function record, tag included
    pub fn write_function(&mut self, func: &FunctionBytecode) -> Result<()> {
        let local_count = func.arg_count as usize + func.var_count as usize;
        if func.vardefs.len() != local_count {
            return Err(Error::Serialize(format!(
                "function {} has {} variable definitions for {} slots",
                func.name,
                func.vardefs.len(),
                local_count
            )));
        }
        let debug = func.debug.as_ref().filter(|_| !self.options.strip_debug);
        let mut flags = func.flags;
        flags.set(FunctionFlags::HAS_DEBUG, debug.is_some());

        self.put_u8(Tag::FunctionBytecode as u8);
        self.put_u16(flags.pack(func.kind));
        self.put_u8(func.js_mode);
        self.put_atom(func.name)?;
        self.put_leb(func.arg_count as u32);
        self.put_leb(func.var_count as u32);
        self.put_leb(func.defined_arg_count as u32);
        self.put_leb(func.stack_size as u32);
        self.put_count(func.closure_vars.len())?;
        self.put_count(func.cpool.len())?;
        self.put_count(func.code.len())?;

        if local_count > 0 {
            self.put_count(local_count)?;
            for vd in &func.vardefs {
                self.put_atom(vd.name)?;
                self.put_leb(vd.scope_level);
                self.put_leb(vd.scope_next.map_or(0, |n| n + 1));
                let flags = (vd.kind as u8 & 0xf)
                    | (vd.is_const as u8) << 4
                    | (vd.is_lexical as u8) << 5
                    | (vd.is_captured as u8) << 6;
                self.put_u8(flags);
            }
        }

        for cv in &func.closure_vars {
            self.put_atom(cv.name)?;
            self.put_leb(cv.var_idx as u32);
            let flags = cv.is_local as u8
                | (cv.is_arg as u8) << 1
                | (cv.is_const as u8) << 2
                | (cv.is_lexical as u8) << 3
                | (cv.kind as u8 & 0xf) << 4;
            self.put_u8(flags);
        }

        self.write_code(&func.code)?;

        if let Some(debug) = debug {
            self.put_atom(debug.filename)?;
            self.put_leb(debug.line_num);
            self.put_count(debug.pc2line.len())?;
            self.body.extend_from_slice(&debug.pc2line);
            let source = debug
                .source
                .as_deref()
                .filter(|_| !self.options.strip_source)
                .unwrap_or("");
            self.put_count(source.len())?;
            self.body.extend_from_slice(source.as_bytes());
        }

        for value in &func.cpool {
            self.write_value(value)?;
        }
        Ok(())
    }

    /// Copy bytecode, rewriting embedded atoms to compact indices
    fn write_code(&mut self, code: &[u8]) -> Result<()> {
        let mut out = code.to_vec();
        for insn in decode_final(code)? {
            if !insn.op.format().has_atom() {
                continue;
            }
            if let Some(atom) = insn.arg.atom() {
                let idx = self.atom_to_idx(atom)?;
                out[insn.pos + 1..insn.pos + 5].copy_from_slice(&idx.to_le_bytes());
            }
        }
        self.body.extend_from_slice(&out);
        Ok(())
    }

    /// Write a module record, tag included
    pub fn write_module(&mut self, module: &ModuleDef) -> Result<()> {
        self.put_u8(Tag::Module as u8);
        self.put_atom(module.name)?;

        self.put_count(module.req_modules.len())?;
        for req in &module.req_modules {
            self.put_atom(req.module_name)?;
            self.write_value(&req.attributes)?;
        }

        self.put_count(module.exports.len())?;
        for export in &module.exports {
            match &export.kind {
                ExportEntryKind::Local { var_idx } => {
                    self.put_u8(EXPORT_TYPE_LOCAL);
                    self.put_leb(*var_idx);
                }
                ExportEntryKind::Indirect { req_module_idx, local_name } => {
                    self.put_u8(EXPORT_TYPE_INDIRECT);
                    self.put_leb(*req_module_idx);
                    self.put_atom(*local_name)?;
                }
            }
            self.put_atom(export.export_name)?;
        }

        self.put_count(module.star_exports.len())?;
        for star in &module.star_exports {
            self.put_leb(star.req_module_idx);
        }

        self.put_count(module.imports.len())?;
        for import in &module.imports {
            self.put_leb(import.var_idx);
            self.put_u8(import.is_star as u8);
            self.put_atom(import.import_name)?;
            self.put_leb(import.req_module_idx);
        }

        self.write_function(&module.func)
    }
}

/// Write a string as `leb(len << 1 | wide)` followed by Latin-1 bytes or
/// UTF-16LE code units.
pub fn write_string(out: &mut Vec<u8>, s: &str) {
    let wide = s.chars().any(|c| c as u32 > 0xff);
    if wide {
        let units: Vec<u16> = s.encode_utf16().collect();
        leb128::write_u32(out, (units.len() as u32) << 1 | 1);
        for unit in units {
            out.extend_from_slice(&unit.to_le_bytes());
        }
    } else {
        leb128::write_u32(out, (s.chars().count() as u32) << 1);
        out.extend(s.chars().map(|c| c as u8));
    }
}

/// Serialize a value graph
pub fn write_object(value: &JsValue, atoms: &AtomTable, options: &WriteOptions) -> Result<Vec<u8>> {
    let mut writer = Writer::new(atoms, options.clone());
    writer.write_value(value)?;
    writer.finish()
}
