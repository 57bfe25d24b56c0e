//! Constant pool
//!
//! Primitive literals are deduplicated by structural equality, with
//! numbers keyed by their bit pattern so `-0` and `NaN` stay distinct from
//! `0`. Compound values and nested function templates are deduplicated by
//! identity only.

use crate::value::JsValue;
use num_bigint::BigInt;
use rustc_hash::FxHashMap;

/// Index of a nested function in the compilation arena
pub type FuncId = usize;

/// A constant pool entry
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Value(JsValue),
    /// Nested function, replaced by its compiled record when finalized
    Function(FuncId),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstKey {
    Null,
    Undefined,
    Bool(bool),
    Int32(i32),
    Float64(u64),
    String(String),
    BigInt(BigInt),
}

impl ConstKey {
    fn of(value: &JsValue) -> Option<Self> {
        Some(match value {
            JsValue::Null => ConstKey::Null,
            JsValue::Undefined => ConstKey::Undefined,
            JsValue::Bool(b) => ConstKey::Bool(*b),
            JsValue::Int32(n) => ConstKey::Int32(*n),
            JsValue::Float64(f) => ConstKey::Float64(f.to_bits()),
            JsValue::String(s) => ConstKey::String(s.clone()),
            JsValue::BigInt(b) => ConstKey::BigInt(b.clone()),
            _ => return None,
        })
    }
}

/// Per-function constant pool
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    entries: Vec<Constant>,
    primitives: FxHashMap<ConstKey, u32>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value, returning the index of an equal primitive or of the
    /// identical compound value when one is already present.
    pub fn add(&mut self, value: JsValue) -> u32 {
        if let Some(key) = ConstKey::of(&value) {
            if let Some(&idx) = self.primitives.get(&key) {
                return idx;
            }
            let idx = self.push(Constant::Value(value));
            self.primitives.insert(key, idx);
            return idx;
        }
        if let Some(id) = value.identity() {
            let existing = self.entries.iter().position(|c| match c {
                Constant::Value(v) => v.identity() == Some(id),
                Constant::Function(_) => false,
            });
            if let Some(idx) = existing {
                return idx as u32;
            }
        }
        self.push(Constant::Value(value))
    }

    /// Add a nested function template
    pub fn add_function(&mut self, func: FuncId) -> u32 {
        let existing = self
            .entries
            .iter()
            .position(|c| matches!(c, Constant::Function(f) if *f == func));
        match existing {
            Some(idx) => idx as u32,
            None => self.push(Constant::Function(func)),
        }
    }

    fn push(&mut self, constant: Constant) -> u32 {
        self.entries.push(constant);
        (self.entries.len() - 1) as u32
    }

    pub fn get(&self, idx: u32) -> Option<&Constant> {
        self.entries.get(idx as usize)
    }

    pub fn entries(&self) -> &[Constant] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_primitive_dedup() {
        let mut pool = ConstantPool::new();
        let a = pool.add(JsValue::string("hello"));
        let b = pool.add(JsValue::Float64(1.5));
        assert_eq!(pool.add(JsValue::string("hello")), a);
        assert_eq!(pool.add(JsValue::Float64(1.5)), b);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_negative_zero_and_nan_are_distinct_keys() {
        let mut pool = ConstantPool::new();
        let zero = pool.add(JsValue::Float64(0.0));
        let neg_zero = pool.add(JsValue::Float64(-0.0));
        let nan = pool.add(JsValue::Float64(f64::NAN));
        assert_ne!(zero, neg_zero);
        assert_ne!(zero, nan);
        assert_eq!(pool.add(JsValue::Float64(f64::NAN)), nan);
    }

    #[test]
    fn test_compound_values_dedup_by_identity() {
        let mut pool = ConstantPool::new();
        let shared = Rc::new(vec![JsValue::Int32(1)]);
        let a = pool.add(JsValue::Array(shared.clone()));
        assert_eq!(pool.add(JsValue::Array(shared)), a);
        let b = pool.add(JsValue::array(vec![JsValue::Int32(1)]));
        assert_ne!(a, b);
    }

    #[test]
    fn test_functions_are_stable() {
        let mut pool = ConstantPool::new();
        let f = pool.add_function(3);
        pool.add(JsValue::Int32(7));
        assert_eq!(pool.add_function(3), f);
        assert_eq!(pool.get(f), Some(&Constant::Function(3)));
    }
}
