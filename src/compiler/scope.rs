//! Scopes and variables of one function
//!
//! Every lexical scope records the most recently declared variable visible
//! from it; variables link to the next one through `scope_next`, and a new
//! scope starts from its parent's head. Walking the chain from a scope
//! therefore visits the innermost declarations first and ends with the
//! outermost lexical ones. Function-level `var` bindings and arguments are
//! not on any chain; they are found with [`ScopeTree::find_var`] and
//! [`ScopeTree::find_arg`].

use crate::atom::Atom;
use crate::value::{VarDef, VarKind};

/// Index of a scope within its function
pub type ScopeId = u32;

/// Scope of `var` declarations and arguments
pub const VAR_SCOPE: ScopeId = 0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Scope {
    parent: Option<ScopeId>,
    /// Head of the variable chain visible from this scope
    first: Option<u32>,
}

/// Variables, arguments and scopes of one function
#[derive(Debug, Clone)]
pub struct ScopeTree {
    vars: Vec<VarDef>,
    args: Vec<VarDef>,
    scopes: Vec<Scope>,
    current: ScopeId,
    /// Constant pool index of the closure a variable is initialized with
    func_inits: Vec<Option<u32>>,
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTree {
    pub fn new() -> Self {
        Self {
            vars: Vec::new(),
            args: Vec::new(),
            scopes: vec![Scope::default()],
            current: VAR_SCOPE,
            func_inits: Vec::new(),
        }
    }

    /// Innermost open scope
    pub fn current(&self) -> ScopeId {
        self.current
    }

    /// Open a child of the current scope and make it current
    pub fn push_scope(&mut self) -> ScopeId {
        let parent = self.current;
        let first = self.scopes[parent as usize].first;
        self.scopes.push(Scope {
            parent: Some(parent),
            first,
        });
        self.current = (self.scopes.len() - 1) as ScopeId;
        self.current
    }

    /// Close the current scope, returning its id. The function scope is
    /// never closed.
    pub fn pop_scope(&mut self) -> ScopeId {
        let closed = self.current;
        if let Some(parent) = self.scopes[closed as usize].parent {
            self.current = parent;
        }
        closed
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes.get(scope as usize).and_then(|s| s.parent)
    }

    /// Declare a function-level variable
    pub fn add_var(&mut self, name: Atom) -> u32 {
        self.vars.push(VarDef::new(name));
        self.func_inits.push(None);
        (self.vars.len() - 1) as u32
    }

    /// Declare a variable in the current scope and link it into the chain
    pub fn add_scope_var(&mut self, name: Atom, kind: VarKind, is_lexical: bool, is_const: bool) -> u32 {
        let scope = self.current;
        let idx = self.vars.len() as u32;
        let mut var = VarDef::new(name);
        var.scope_level = scope;
        var.scope_next = self.scopes[scope as usize].first;
        var.kind = kind;
        var.is_lexical = is_lexical;
        var.is_const = is_const;
        self.vars.push(var);
        self.func_inits.push(None);
        self.scopes[scope as usize].first = Some(idx);
        idx
    }

    pub fn add_arg(&mut self, name: Atom) -> u32 {
        self.args.push(VarDef::new(name));
        (self.args.len() - 1) as u32
    }

    /// Variable declared directly in `scope`
    pub fn find_var_in_scope(&self, name: Atom, scope: ScopeId) -> Option<u32> {
        self.chain(scope)
            .take_while(|&idx| self.vars[idx as usize].scope_level == scope)
            .find(|&idx| self.vars[idx as usize].name == name)
    }

    /// Function-level variable
    pub fn find_var(&self, name: Atom) -> Option<u32> {
        self.vars
            .iter()
            .rposition(|v| v.name == name && v.scope_level == VAR_SCOPE)
            .map(|i| i as u32)
    }

    pub fn find_arg(&self, name: Atom) -> Option<u32> {
        self.args.iter().rposition(|v| v.name == name).map(|i| i as u32)
    }

    /// Innermost lexical binding of `name` visible from `scope`
    pub fn lookup(&self, name: Atom, scope: ScopeId) -> Option<u32> {
        self.chain(scope).find(|&idx| self.vars[idx as usize].name == name)
    }

    /// Variable indices on the chain starting at `scope`, innermost first
    pub fn chain(&self, scope: ScopeId) -> impl Iterator<Item = u32> + '_ {
        let mut next = self.scopes.get(scope as usize).and_then(|s| s.first);
        std::iter::from_fn(move || {
            let idx = next?;
            next = self.vars[idx as usize].scope_next;
            Some(idx)
        })
    }

    /// Variables declared directly in `scope`
    pub fn scope_vars(&self, scope: ScopeId) -> Vec<u32> {
        self.chain(scope)
            .take_while(|&idx| self.vars[idx as usize].scope_level == scope)
            .collect()
    }

    /// Is `scope` nested in `parent` (or equal to it)?
    pub fn is_child_scope(&self, scope: ScopeId, parent: ScopeId) -> bool {
        let mut s = Some(scope);
        while let Some(id) = s {
            if id == parent {
                return true;
            }
            s = self.parent(id);
        }
        false
    }

    pub fn var(&self, idx: u32) -> &VarDef {
        &self.vars[idx as usize]
    }

    pub fn var_mut(&mut self, idx: u32) -> &mut VarDef {
        &mut self.vars[idx as usize]
    }

    pub fn vars(&self) -> &[VarDef] {
        &self.vars
    }

    pub fn args(&self) -> &[VarDef] {
        &self.args
    }

    pub fn set_func_init(&mut self, idx: u32, cpool_idx: u32) {
        if let Some(slot) = self.func_inits.get_mut(idx as usize) {
            *slot = Some(cpool_idx);
        }
    }

    pub fn func_init(&self, idx: u32) -> Option<u32> {
        self.func_inits.get(idx as usize).copied().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::AtomTable;

    #[test]
    fn test_inner_binding_shadows_outer() {
        let mut atoms = AtomTable::new();
        let x = atoms.intern("x");
        let mut tree = ScopeTree::new();
        let body = tree.push_scope();
        let outer = tree.add_scope_var(x, VarKind::Normal, true, false);
        let inner_scope = tree.push_scope();
        let inner = tree.add_scope_var(x, VarKind::Normal, true, true);

        assert_eq!(tree.find_var_in_scope(x, inner_scope), Some(inner));
        assert_eq!(tree.lookup(x, inner_scope), Some(inner));

        assert_eq!(tree.pop_scope(), inner_scope);
        assert_eq!(tree.current(), body);
        assert_eq!(tree.lookup(x, body), Some(outer));
        assert_eq!(tree.find_var_in_scope(x, body), Some(outer));
        assert!(tree.var(inner).is_const);
    }

    #[test]
    fn test_chain_is_innermost_first() {
        let mut atoms = AtomTable::new();
        let (a, b) = (atoms.intern("a"), atoms.intern("b"));
        let mut tree = ScopeTree::new();
        let outer = tree.push_scope();
        let va = tree.add_scope_var(a, VarKind::Normal, true, false);
        let inner = tree.push_scope();
        let vb = tree.add_scope_var(b, VarKind::Normal, true, false);

        assert_eq!(tree.chain(inner).collect::<Vec<_>>(), vec![vb, va]);
        assert_eq!(tree.scope_vars(inner), vec![vb]);
        assert_eq!(tree.scope_vars(outer), vec![va]);
        assert_eq!(tree.find_var_in_scope(a, inner), None);
        assert_eq!(tree.var(vb).scope_next, Some(va));
    }

    #[test]
    fn test_function_level_vars_are_off_chain() {
        let mut atoms = AtomTable::new();
        let (v, p) = (atoms.intern("v"), atoms.intern("p"));
        let mut tree = ScopeTree::new();
        let arg = tree.add_arg(p);
        let var = tree.add_var(v);
        let body = tree.push_scope();

        assert_eq!(tree.lookup(v, body), None);
        assert_eq!(tree.find_var(v), Some(var));
        assert_eq!(tree.find_arg(p), Some(arg));
        assert_eq!(tree.find_var(p), None);
    }

    #[test]
    fn test_child_scope_relation() {
        let mut tree = ScopeTree::new();
        let a = tree.push_scope();
        let b = tree.push_scope();
        tree.pop_scope();
        let c = tree.push_scope();
        assert!(tree.is_child_scope(b, a));
        assert!(tree.is_child_scope(b, VAR_SCOPE));
        assert!(!tree.is_child_scope(c, b));
        assert!(tree.is_child_scope(a, a));
        assert_eq!(tree.scope_count(), 4);
    }
}
