//! Atom table
//!
//! Atoms are small integer handles for interned identifier, property and
//! string names. The table is seeded with a fixed range of builtin atoms
//! that are never freed; every other name is added on first use and
//! reference counted. Canonical array-index strings (`"0"`, `"42"`) are
//! represented as tagged integer atoms and never occupy a table slot.

mod builtin;

pub use builtin::{atoms, ATOM_END};

use rustc_hash::FxHashMap;
use std::borrow::Cow;
use std::fmt;

/// Tag bit marking an atom that encodes an integer directly
pub const ATOM_TAG_INT: u32 = 1 << 31;

/// Largest integer representable as a tagged atom
pub const ATOM_MAX_INT: u32 = ATOM_TAG_INT - 1;

/// An interned name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Atom(pub(crate) u32);

impl Atom {
    /// The null atom, used for "no name"
    pub const NULL: Atom = Atom(0);

    /// Raw id of this atom
    pub fn id(self) -> u32 {
        self.0
    }

    /// Rebuild an atom from a raw id
    pub fn from_id(id: u32) -> Self {
        Atom(id)
    }

    /// Create a tagged integer atom
    pub fn from_index(n: u32) -> Option<Self> {
        (n <= ATOM_MAX_INT).then_some(Atom(n | ATOM_TAG_INT))
    }

    /// Is this a tagged integer atom?
    pub fn is_tagged_int(self) -> bool {
        self.0 & ATOM_TAG_INT != 0
    }

    /// Integer value of a tagged atom
    pub fn as_index(self) -> Option<u32> {
        self.is_tagged_int().then_some(self.0 & !ATOM_TAG_INT)
    }

    /// Is this the null atom?
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Is this one of the builtin atoms?
    pub fn is_builtin(self) -> bool {
        !self.is_tagged_int() && self.0 < ATOM_END
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_index() {
            Some(n) => write!(f, "#{}", n),
            None => write!(f, "atom({})", self.0),
        }
    }
}

/// Kind of the value an atom names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomKind {
    /// Ordinary string atom, interned by name
    String,
    /// Well-known or user symbol
    Symbol,
    /// Private symbol (class brands)
    Private,
}

#[derive(Debug, Clone)]
struct AtomEntry {
    name: String,
    kind: AtomKind,
    ref_count: u32,
    is_static: bool,
}

/// Interning table for atoms
#[derive(Debug, Clone)]
pub struct AtomTable {
    entries: Vec<Option<AtomEntry>>,
    map: FxHashMap<String, u32>,
    free_ids: Vec<u32>,
}

impl AtomTable {
    /// Create a table seeded with the builtin atoms
    pub fn new() -> Self {
        let mut table = Self {
            entries: Vec::with_capacity(ATOM_END as usize + 64),
            map: FxHashMap::default(),
            free_ids: Vec::new(),
        };
        table.entries.push(None);
        for (name, kind) in builtin::BUILTIN_ATOMS {
            let id = table.entries.len() as u32;
            table.entries.push(Some(AtomEntry {
                name: (*name).to_string(),
                kind: *kind,
                ref_count: 1,
                is_static: true,
            }));
            if *kind == AtomKind::String {
                table.map.entry((*name).to_string()).or_insert(id);
            }
        }
        table
    }

    /// Intern `name`, returning the existing atom with its count bumped,
    /// or a new atom with a count of one.
    pub fn intern(&mut self, name: &str) -> Atom {
        if let Some(n) = parse_array_index(name) {
            if let Some(atom) = Atom::from_index(n) {
                return atom;
            }
        }
        if let Some(&id) = self.map.get(name) {
            if let Some(Some(entry)) = self.entries.get_mut(id as usize) {
                if !entry.is_static {
                    entry.ref_count += 1;
                }
            }
            return Atom(id);
        }
        let id = self.insert(name.to_string(), AtomKind::String);
        self.map.insert(name.to_string(), id);
        Atom(id)
    }

    /// Create a fresh symbol atom. Symbols are never shared by name.
    pub fn new_symbol(&mut self, description: &str, kind: AtomKind) -> Atom {
        Atom(self.insert(description.to_string(), kind))
    }

    fn insert(&mut self, name: String, kind: AtomKind) -> u32 {
        let entry = AtomEntry {
            name,
            kind,
            ref_count: 1,
            is_static: false,
        };
        match self.free_ids.pop() {
            Some(id) => {
                self.entries[id as usize] = Some(entry);
                id
            }
            None => {
                self.entries.push(Some(entry));
                (self.entries.len() - 1) as u32
            }
        }
    }

    /// Take another reference to an existing atom
    pub fn dup(&mut self, atom: Atom) -> Atom {
        if let Some(entry) = self.entry_mut(atom) {
            if !entry.is_static {
                entry.ref_count += 1;
            }
        }
        atom
    }

    /// Drop a reference. The entry is removed when its count reaches zero.
    /// Builtin atoms, tagged integers and unknown ids are left untouched.
    pub fn free(&mut self, atom: Atom) {
        let remove = match self.entry_mut(atom) {
            Some(entry) if !entry.is_static => {
                entry.ref_count = entry.ref_count.saturating_sub(1);
                entry.ref_count == 0
            }
            _ => false,
        };
        if remove {
            if let Some(entry) = self.entries[atom.0 as usize].take() {
                if entry.kind == AtomKind::String {
                    self.map.remove(&entry.name);
                }
            }
            self.free_ids.push(atom.0);
        }
    }

    /// Name of an atom, or `None` for unknown ids
    pub fn name(&self, atom: Atom) -> Option<Cow<'_, str>> {
        if let Some(n) = atom.as_index() {
            return Some(Cow::Owned(n.to_string()));
        }
        self.entry(atom).map(|e| Cow::Borrowed(e.name.as_str()))
    }

    /// Name of an atom for diagnostics; unknown ids render as `<atom N>`
    pub fn display_name(&self, atom: Atom) -> String {
        match self.name(atom) {
            Some(name) => name.into_owned(),
            None => format!("<atom {}>", atom.0),
        }
    }

    /// Does the atom exist in this table?
    pub fn has(&self, atom: Atom) -> bool {
        atom.is_tagged_int() || self.entry(atom).is_some()
    }

    /// Kind of an existing atom
    pub fn kind(&self, atom: Atom) -> Option<AtomKind> {
        if atom.is_tagged_int() {
            return Some(AtomKind::String);
        }
        self.entry(atom).map(|e| e.kind)
    }

    /// Reference count of a dynamic atom
    pub fn ref_count(&self, atom: Atom) -> Option<u32> {
        self.entry(atom).map(|e| e.ref_count)
    }

    /// Is this atom part of the static builtin range?
    pub fn is_static(&self, atom: Atom) -> bool {
        self.entry(atom).map(|e| e.is_static).unwrap_or(false)
    }

    /// Number of live entries, builtin atoms included
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    /// Is the table empty? Never true for a seeded table.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, atom: Atom) -> Option<&AtomEntry> {
        if atom.is_tagged_int() {
            return None;
        }
        self.entries.get(atom.0 as usize).and_then(|e| e.as_ref())
    }

    fn entry_mut(&mut self, atom: Atom) -> Option<&mut AtomEntry> {
        if atom.is_tagged_int() {
            return None;
        }
        self.entries.get_mut(atom.0 as usize).and_then(|e| e.as_mut())
    }
}

impl Default for AtomTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a canonical array index: no sign, no leading zeros, fits in 31 bits.
fn parse_array_index(s: &str) -> Option<u32> {
    let bytes = s.as_bytes();
    if bytes.is_empty() || bytes.len() > 10 || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    if bytes.len() > 1 && bytes[0] == b'0' {
        return None;
    }
    s.parse::<u32>().ok().filter(|n| *n <= ATOM_MAX_INT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_seeded() {
        let table = AtomTable::new();
        assert_eq!(table.name(atoms::null).as_deref(), Some("null"));
        assert_eq!(table.name(atoms::length).as_deref(), Some("length"));
        assert_eq!(table.name(atoms::empty_string).as_deref(), Some(""));
        assert!(table.is_static(atoms::prototype));
        assert_eq!(atoms::null.id(), 1);
    }

    #[test]
    fn test_intern_builtin_returns_builtin_id() {
        let mut table = AtomTable::new();
        assert_eq!(table.intern("length"), atoms::length);
        assert_eq!(table.intern("constructor"), atoms::constructor);
        // "<brand>" resolves to the string atom, not the private symbol
        assert_eq!(table.intern("<brand>"), atoms::brand);
    }

    #[test]
    fn test_intern_is_idempotent() {
        let mut table = AtomTable::new();
        let a = table.intern("myVariable");
        let b = table.intern("myVariable");
        assert_eq!(a, b);
        assert!(a.id() >= ATOM_END);
        assert_eq!(table.ref_count(a), Some(2));
        assert_eq!(table.name(a).as_deref(), Some("myVariable"));
    }

    #[test]
    fn test_free_reclaims_at_zero() {
        let mut table = AtomTable::new();
        let a = table.intern("temp");
        table.dup(a);
        table.free(a);
        assert!(table.has(a));
        table.free(a);
        assert!(!table.has(a));
        assert_eq!(table.name(a), None);
        // the freed id is recycled for the next new name
        let b = table.intern("other");
        assert_eq!(a, b);
    }

    #[test]
    fn test_free_static_and_unknown_are_noops() {
        let mut table = AtomTable::new();
        table.free(atoms::length);
        assert!(table.has(atoms::length));
        table.free(Atom::from_id(999_999));
        assert!(!table.has(Atom::from_id(999_999)));
    }

    #[test]
    fn test_array_index_atoms() {
        let mut table = AtomTable::new();
        let zero = table.intern("0");
        assert!(zero.is_tagged_int());
        assert_eq!(zero.as_index(), Some(0));
        let n = table.intern("42");
        assert_eq!(table.name(n).as_deref(), Some("42"));
        assert!(!table.intern("007").is_tagged_int());
        assert!(!table.intern("4294967295").is_tagged_int());
    }

    #[test]
    fn test_symbols_are_not_shared() {
        let mut table = AtomTable::new();
        let a = table.new_symbol("#x", AtomKind::Private);
        let b = table.new_symbol("#x", AtomKind::Private);
        assert_ne!(a, b);
        assert_eq!(table.kind(a), Some(AtomKind::Private));
        assert_ne!(table.intern("#x"), a);
    }
}
