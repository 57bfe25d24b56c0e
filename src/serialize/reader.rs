use super::{leb128, Tag, BC_VERSION};
use crate::atom::{Atom, AtomTable, ATOM_END};
use crate::bytecode::ic::InlineCacheTable;
use crate::bytecode::insn::decode_final;
use crate::error::{Error, Result};
use crate::value::{
    ClosureVar, DebugInfo, ExportEntry, ExportEntryKind, FunctionBytecode, FunctionFlags,
    ImportEntry, JsValue, ModuleDef, ReqModuleEntry, StarExportEntry, TemplateObject, VarDef,
    VarKind, EXPORT_TYPE_INDIRECT, EXPORT_TYPE_LOCAL,
};
use num_bigint::BigInt;
use std::rc::Rc;
use tracing::debug;

/// Deserializer options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Accept back-references to earlier compound values
    pub allow_reference: bool,
}

/// Cursor over one serialized object
pub struct Reader<'a, 'b> {
    buf: &'a [u8],
    pos: usize,
    atoms: &'b mut AtomTable,
    options: ReadOptions,
    idx_to_atom: Vec<Atom>,
    /// Compound values by object index; `None` while still being read
    objects: Vec<Option<JsValue>>,
}

impl<'a, 'b> Reader<'a, 'b> {
    pub fn new(buf: &'a [u8], atoms: &'b mut AtomTable, options: ReadOptions) -> Self {
        Self {
            buf,
            pos: 0,
            atoms,
            options,
            idx_to_atom: Vec::new(),
            objects: Vec::new(),
        }
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T> {
        Err(Error::deserialize(message, self.pos))
    }

    fn get_u8(&mut self) -> Result<u8> {
        match self.buf.get(self.pos) {
            Some(&b) => {
                self.pos += 1;
                Ok(b)
            }
            None => self.error("unexpected end of input"),
        }
    }

    fn get_u16(&mut self) -> Result<u16> {
        let bytes = self.get_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn get_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|&end| end <= self.buf.len());
        match end {
            Some(end) => {
                let slice = &self.buf[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => self.error(format!("expected {} more bytes", n)),
        }
    }

    fn get_leb(&mut self) -> Result<u32> {
        let (v, n) = leb128::read_u32(self.buf, self.pos)?;
        self.pos += n;
        Ok(v)
    }

    fn get_sleb(&mut self) -> Result<i32> {
        let (v, n) = leb128::read_i32(self.buf, self.pos)?;
        self.pos += n;
        Ok(v)
    }

    fn get_u16_leb(&mut self, what: &str) -> Result<u16> {
        let v = self.get_leb()?;
        match u16::try_from(v) {
            Ok(v) => Ok(v),
            Err(_) => self.error(format!("{} {} out of range", what, v)),
        }
    }

    fn get_string(&mut self) -> Result<String> {
        let header = self.get_leb()?;
        let len = (header >> 1) as usize;
        if header & 1 != 0 {
            let bytes = self.get_bytes(len * 2)?;
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect();
            String::from_utf16(&units).or_else(|_| self.error("invalid UTF-16 string"))
        } else {
            let bytes = self.get_bytes(len)?;
            Ok(bytes.iter().map(|&b| b as char).collect())
        }
    }

    /// Map a compact atom index back to an atom of the local table
    fn idx_to_atom(&self, idx: u32) -> Result<Atom> {
        let atom = Atom::from_id(idx);
        if atom.is_tagged_int() || idx < ATOM_END {
            return Ok(atom);
        }
        match self.idx_to_atom.get((idx - ATOM_END) as usize) {
            Some(&atom) => Ok(atom),
            None => self.error(format!("invalid atom index {}", idx)),
        }
    }

    fn get_atom(&mut self) -> Result<Atom> {
        let v = self.get_leb()?;
        if v & 1 != 0 {
            match Atom::from_index(v >> 1) {
                Some(atom) => Ok(atom),
                None => self.error("integer atom out of range"),
            }
        } else {
            self.idx_to_atom(v >> 1)
        }
    }

    fn read_atoms(&mut self) -> Result<()> {
        let version = self.get_u8()?;
        if version != BC_VERSION {
            return self.error(format!("invalid version {} (expected {})", version, BC_VERSION));
        }
        let count = self.get_leb()?;
        for _ in 0..count {
            let name = self.get_string()?;
            let atom = self.atoms.intern(&name);
            self.idx_to_atom.push(atom);
        }
        debug!(atoms = count, "read atom section");
        Ok(())
    }

    /// Read the atom section and the single value that follows it
    pub fn read(mut self) -> Result<JsValue> {
        self.read_atoms()?;
        let value = self.read_value()?;
        if self.pos != self.buf.len() {
            return self.error("trailing bytes after object");
        }
        Ok(value)
    }

    fn reserve_object(&mut self) -> usize {
        self.objects.push(None);
        self.objects.len() - 1
    }

    fn read_items(&mut self) -> Result<Vec<JsValue>> {
        let len = self.get_leb()?;
        let mut items = Vec::with_capacity((len as usize).min(self.buf.len()));
        for _ in 0..len {
            items.push(self.read_value()?);
        }
        Ok(items)
    }

    /// Read one tagged value
    pub fn read_value(&mut self) -> Result<JsValue> {
        let tag_pos = self.pos;
        let byte = self.get_u8()?;
        let Some(tag) = Tag::from_byte(byte) else {
            return Err(Error::deserialize(format!("invalid tag {}", byte), tag_pos));
        };
        let value = match tag {
            Tag::Null => JsValue::Null,
            Tag::Undefined => JsValue::Undefined,
            Tag::False => JsValue::Bool(false),
            Tag::True => JsValue::Bool(true),
            Tag::Int32 => JsValue::Int32(self.get_sleb()?),
            Tag::Float64 => {
                let bytes = self.get_bytes(8)?;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(bytes);
                JsValue::Float64(f64::from_bits(u64::from_le_bytes(raw)))
            }
            Tag::String => JsValue::String(self.get_string()?),
            Tag::BigInt => {
                let len = self.get_leb()? as usize;
                let bytes = self.get_bytes(len)?;
                JsValue::BigInt(if len == 0 {
                    BigInt::default()
                } else {
                    BigInt::from_signed_bytes_le(bytes)
                })
            }
            Tag::Array => {
                let slot = self.reserve_object();
                let value = JsValue::array(self.read_items()?);
                self.objects[slot] = Some(value.clone());
                value
            }
            Tag::Object => {
                let slot = self.reserve_object();
                let count = self.get_leb()?;
                let mut props = Vec::with_capacity((count as usize).min(self.buf.len()));
                for _ in 0..count {
                    let key = self.get_atom()?;
                    props.push((key, self.read_value()?));
                }
                let value = JsValue::object(props);
                self.objects[slot] = Some(value.clone());
                value
            }
            Tag::TemplateObject => {
                let slot = self.reserve_object();
                let cooked = self.read_items()?;
                let raw = match self.read_value()? {
                    JsValue::Array(items) => items.as_ref().clone(),
                    other => {
                        return self.error(format!("template raw strings must be an array, got {}", other.type_name()))
                    }
                };
                let value = JsValue::TemplateObject(Rc::new(TemplateObject { cooked, raw }));
                self.objects[slot] = Some(value.clone());
                value
            }
            Tag::FunctionBytecode => JsValue::Function(Rc::new(self.read_function_body()?)),
            Tag::Module => JsValue::Module(Rc::new(self.read_module_body()?)),
            Tag::ObjectReference => {
                if !self.options.allow_reference {
                    return Err(Error::deserialize("object references are not allowed", tag_pos));
                }
                let idx = self.get_leb()? as usize;
                match self.objects.get(idx) {
                    Some(Some(value)) => value.clone(),
                    Some(None) => return self.error(format!("reference to object {} under construction", idx)),
                    None => return self.error(format!("invalid object reference {}", idx)),
                }
            }
            Tag::BigFloat
            | Tag::BigDecimal
            | Tag::TypedArray
            | Tag::ArrayBuffer
            | Tag::SharedArrayBuffer
            | Tag::Date
            | Tag::ObjectValue => {
                return Err(Error::deserialize(format!("unsupported tag {:?}", tag), tag_pos));
            }
        };
        Ok(value)
    }

    /// Function record after its tag
    fn read_function_body(&mut self) -> Result<FunctionBytecode> {
        let (flags, kind) = FunctionFlags::unpack(self.get_u16()?);
        let js_mode = self.get_u8()?;
        let name = self.get_atom()?;
        let arg_count = self.get_u16_leb("argument count")?;
        let var_count = self.get_u16_leb("variable count")?;
        let defined_arg_count = self.get_u16_leb("defined argument count")?;
        let stack_size = self.get_u16_leb("stack size")?;
        let closure_var_count = self.get_leb()?;
        let cpool_count = self.get_leb()?;
        let code_len = self.get_leb()? as usize;

        let mut vardefs = Vec::new();
        let local_count = arg_count as u32 + var_count as u32;
        if local_count > 0 {
            let stored = self.get_leb()?;
            if stored != local_count {
                return self.error(format!("local count {} does not match {}", stored, local_count));
            }
            for _ in 0..local_count {
                let name = self.get_atom()?;
                let scope_level = self.get_leb()?;
                let scope_next = self.get_leb()?.checked_sub(1);
                let bits = self.get_u8()?;
                let Some(kind) = VarKind::from_bits(bits & 0xf) else {
                    return self.error(format!("invalid variable kind {}", bits & 0xf));
                };
                vardefs.push(VarDef {
                    name,
                    scope_level,
                    scope_next,
                    kind,
                    is_const: bits & (1 << 4) != 0,
                    is_lexical: bits & (1 << 5) != 0,
                    is_captured: bits & (1 << 6) != 0,
                });
            }
        }

        let mut closure_vars = Vec::new();
        for _ in 0..closure_var_count {
            let name = self.get_atom()?;
            let var_idx = self.get_u16_leb("closure variable index")?;
            let bits = self.get_u8()?;
            let Some(kind) = VarKind::from_bits(bits >> 4) else {
                return self.error(format!("invalid variable kind {}", bits >> 4));
            };
            closure_vars.push(ClosureVar {
                name,
                var_idx,
                is_local: bits & 1 != 0,
                is_arg: bits & (1 << 1) != 0,
                is_const: bits & (1 << 2) != 0,
                is_lexical: bits & (1 << 3) != 0,
                kind,
            });
        }

        let code_start = self.pos;
        let mut code = self.get_bytes(code_len)?.to_vec();
        for insn in decode_final(&code).map_err(|e| match e {
            Error::UnknownOpcode { byte, offset } => Error::UnknownOpcode {
                byte,
                offset: code_start + offset,
            },
            other => other,
        })? {
            if !insn.op.format().has_atom() {
                continue;
            }
            if let Some(idx) = insn.arg.atom() {
                let atom = self.idx_to_atom(idx.id())?;
                code[insn.pos + 1..insn.pos + 5].copy_from_slice(&atom.id().to_le_bytes());
            }
        }

        let debug = if flags.contains(FunctionFlags::HAS_DEBUG) {
            let filename = self.get_atom()?;
            let line_num = self.get_leb()?;
            let len = self.get_leb()? as usize;
            let pc2line = self.get_bytes(len)?.to_vec();
            let source_len = self.get_leb()? as usize;
            let source = self.get_bytes(source_len)?;
            let source = match std::str::from_utf8(source) {
                Ok(s) if !s.is_empty() => Some(s.to_string()),
                Ok(_) => None,
                Err(_) => return self.error("function source is not valid UTF-8"),
            };
            Some(DebugInfo {
                filename,
                line_num,
                pc2line,
                source,
            })
        } else {
            None
        };

        let mut cpool = Vec::with_capacity((cpool_count as usize).min(self.buf.len()));
        for _ in 0..cpool_count {
            cpool.push(self.read_value()?);
        }

        let ic = InlineCacheTable::from_bytecode(&code)?;
        Ok(FunctionBytecode {
            name,
            flags,
            kind,
            js_mode,
            arg_count,
            var_count,
            defined_arg_count,
            stack_size,
            vardefs,
            closure_vars,
            code,
            debug,
            cpool,
            ic,
        })
    }

    /// Module record after its tag
    fn read_module_body(&mut self) -> Result<ModuleDef> {
        let name = self.get_atom()?;

        let count = self.get_leb()?;
        let mut req_modules = Vec::new();
        for _ in 0..count {
            let module_name = self.get_atom()?;
            let attributes = self.read_value()?;
            req_modules.push(ReqModuleEntry {
                module_name,
                attributes,
            });
        }

        let count = self.get_leb()?;
        let mut exports = Vec::new();
        for _ in 0..count {
            let kind = match self.get_u8()? {
                EXPORT_TYPE_LOCAL => ExportEntryKind::Local {
                    var_idx: self.get_leb()?,
                },
                EXPORT_TYPE_INDIRECT => {
                    let req_module_idx = self.get_leb()?;
                    ExportEntryKind::Indirect {
                        req_module_idx,
                        local_name: self.get_atom()?,
                    }
                }
                other => return self.error(format!("invalid export type {}", other)),
            };
            let export_name = self.get_atom()?;
            exports.push(ExportEntry { kind, export_name });
        }

        let count = self.get_leb()?;
        let mut star_exports = Vec::new();
        for _ in 0..count {
            star_exports.push(StarExportEntry {
                req_module_idx: self.get_leb()?,
            });
        }

        let count = self.get_leb()?;
        let mut imports = Vec::new();
        for _ in 0..count {
            let var_idx = self.get_leb()?;
            let is_star = self.get_u8()? != 0;
            let import_name = self.get_atom()?;
            let req_module_idx = self.get_leb()?;
            imports.push(ImportEntry {
                var_idx,
                is_star,
                import_name,
                req_module_idx,
            });
        }

        let func = match self.read_value()? {
            JsValue::Function(f) => f,
            other => return self.error(format!("module body must be a function, got {}", other.type_name())),
        };
        Ok(ModuleDef {
            name,
            req_modules,
            exports,
            star_exports,
            imports,
            func,
        })
    }
}

/// Deserialize an object produced by [`super::write_object`], interning
/// its atoms into `atoms`.
pub fn read_object(buf: &[u8], atoms: &mut AtomTable, options: &ReadOptions) -> Result<JsValue> {
    Reader::new(buf, atoms, options.clone()).read()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialize::{write_object, WriteOptions};
    use pretty_assertions::assert_eq;

    fn roundtrip(value: &JsValue) -> JsValue {
        let mut atoms = AtomTable::new();
        let bytes = write_object(value, &atoms, &WriteOptions::default()).unwrap();
        read_object(&bytes, &mut atoms, &ReadOptions::default()).unwrap()
    }

    #[test]
    fn test_scalar_roundtrip() {
        for v in [
            JsValue::Null,
            JsValue::Undefined,
            JsValue::Bool(false),
            JsValue::Int32(i32::MIN),
            JsValue::Float64(f64::NAN),
            JsValue::Float64(-0.0),
            JsValue::string("caf\u{e9} \u{1F600}"),
            JsValue::BigInt(BigInt::from(-12345678901234567890i128)),
        ] {
            assert_eq!(roundtrip(&v), v);
        }
    }

    #[test]
    fn test_version_mismatch() {
        let mut atoms = AtomTable::new();
        let err = read_object(&[BC_VERSION + 1, 0, Tag::Null as u8], &mut atoms, &ReadOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Deserialize { offset: 1, .. }));
    }

    #[test]
    fn test_invalid_tag() {
        let mut atoms = AtomTable::new();
        let err = read_object(&[BC_VERSION, 0, 0xee], &mut atoms, &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Deserialize { offset: 2, .. }));
    }

    #[test]
    fn test_references_require_opt_in() {
        let bytes = [BC_VERSION, 0, Tag::Array as u8, 1, Tag::ObjectReference as u8, 0];
        let mut atoms = AtomTable::new();
        assert!(read_object(&bytes, &mut atoms, &ReadOptions::default()).is_err());
        // a self reference points at an object still being read
        let options = ReadOptions { allow_reference: true };
        assert!(read_object(&bytes, &mut atoms, &options).is_err());
    }

    #[test]
    fn test_shared_reference_roundtrip_preserves_identity() {
        let shared = JsValue::array(vec![JsValue::string("x")]);
        let outer = JsValue::array(vec![shared.clone(), shared]);
        let mut atoms = AtomTable::new();
        let bytes = write_object(
            &outer,
            &atoms,
            &WriteOptions {
                allow_reference: true,
                ..Default::default()
            },
        )
        .unwrap();
        let back = read_object(&bytes, &mut atoms, &ReadOptions { allow_reference: true }).unwrap();
        assert_eq!(back, outer);
        let JsValue::Array(items) = back else { panic!("expected array") };
        assert_eq!(items[0].identity(), items[1].identity());
    }
}
