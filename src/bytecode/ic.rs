//! Inline-cache slot table
//!
//! Every named property access (`get_field`, `get_field2`, `put_field`)
//! gets a slot keyed by its atom so the runtime can memoize lookup shapes
//! between repeated accesses to the same name.

use super::insn::decode_final;
use super::opcode::Opcode;
use crate::atom::Atom;
use crate::error::Result;
use rustc_hash::FxHashMap;

/// One cache slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcSlot {
    pub atom: Atom,
    /// Number of access sites sharing this slot
    pub uses: u32,
}

/// Per-function table of inline-cache slots
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineCacheTable {
    slots: Vec<IcSlot>,
    by_atom: FxHashMap<Atom, u32>,
}

impl InlineCacheTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an access to `atom`, returning its slot index
    pub fn add(&mut self, atom: Atom) -> u32 {
        if let Some(&slot) = self.by_atom.get(&atom) {
            self.slots[slot as usize].uses += 1;
            return slot;
        }
        let slot = self.slots.len() as u32;
        self.slots.push(IcSlot { atom, uses: 1 });
        self.by_atom.insert(atom, slot);
        slot
    }

    pub fn slot_of(&self, atom: Atom) -> Option<u32> {
        self.by_atom.get(&atom).copied()
    }

    pub fn slots(&self) -> &[IcSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Rebuild the table from final bytecode, as a loader would
    pub fn from_bytecode(code: &[u8]) -> Result<Self> {
        let mut table = Self::new();
        for insn in decode_final(code)? {
            if let (Some(op), Some(atom)) = (insn.opcode(), insn.arg.atom()) {
                if matches!(op, Opcode::GetField | Opcode::GetField2 | Opcode::PutField) {
                    table.add(atom);
                }
            }
        }
        Ok(table)
    }
}
