//! Module entry tables
//!
//! Imports become closure variables of the module function before anything
//! else is declared, so that the resolver finds them like any captured
//! binding. Top-level declarations follow as closure variables of their
//! own. Local exports are matched against those closure variables once the
//! whole body has been compiled.

use super::{Compiler, GlobalVar};
use crate::ast::{ImportAttribute, ImportSpecifier, Statement};
use crate::atom::{atoms, Atom};
use crate::error::{Error, Result, SourceLocation};
use crate::value::{
    ClosureVar, ExportEntry, ExportEntryKind, FunctionBytecode, ImportEntry, JsValue, ModuleDef,
    ReqModuleEntry, StarExportEntry, VarKind,
};
use std::rc::Rc;
use tracing::debug;

/// Export of a module-level binding, resolved at the end
#[derive(Debug, Clone)]
struct LocalExport {
    local: Atom,
    exported: Atom,
    location: SourceLocation,
}

/// Module tables collected while compiling a module body
#[derive(Debug, Default)]
pub(crate) struct ModuleEntries {
    req_modules: Vec<ReqModuleEntry>,
    imports: Vec<ImportEntry>,
    local_exports: Vec<LocalExport>,
    indirect_exports: Vec<ExportEntry>,
    star_exports: Vec<StarExportEntry>,
}

impl ModuleEntries {
    fn add_req_module(&mut self, name: Atom, attributes: JsValue) -> u32 {
        if let Some(idx) = self
            .req_modules
            .iter()
            .position(|r| r.module_name == name && r.attributes == attributes)
        {
            return idx as u32;
        }
        self.req_modules.push(ReqModuleEntry {
            module_name: name,
            attributes,
        });
        (self.req_modules.len() - 1) as u32
    }

    /// Build the module record around the compiled module function
    pub(crate) fn into_module_def(
        self,
        closure_vars: &[ClosureVar],
        name: Atom,
        func: Rc<FunctionBytecode>,
    ) -> Result<ModuleDef> {
        let mut exports = Vec::with_capacity(self.local_exports.len() + self.indirect_exports.len());
        for e in &self.local_exports {
            let k = closure_vars
                .iter()
                .position(|cv| cv.name == e.local)
                .ok_or_else(|| Error::invalid_context("export of an undeclared binding", e.location))?;
            let kind = if closure_vars[k].is_local {
                ExportEntryKind::Local { var_idx: k as u32 }
            } else {
                match self.imports.iter().find(|i| i.var_idx == k as u32) {
                    Some(import) if !import.is_star => ExportEntryKind::Indirect {
                        req_module_idx: import.req_module_idx,
                        local_name: import.import_name,
                    },
                    _ => ExportEntryKind::Local { var_idx: k as u32 },
                }
            };
            exports.push(ExportEntry {
                kind,
                export_name: e.exported,
            });
        }
        exports.extend(self.indirect_exports);
        debug!(
            requires = self.req_modules.len(),
            imports = self.imports.len(),
            exports = exports.len(),
            "built module record"
        );
        Ok(ModuleDef {
            name,
            req_modules: self.req_modules,
            exports,
            star_exports: self.star_exports,
            imports: self.imports,
            func,
        })
    }
}

impl Compiler<'_> {
    fn entries(&mut self) -> Result<&mut ModuleEntries> {
        self.module
            .as_mut()
            .ok_or_else(|| Error::internal("module entry outside of a module"))
    }

    fn attributes_value(&mut self, attributes: &[ImportAttribute]) -> JsValue {
        if attributes.is_empty() {
            return JsValue::Undefined;
        }
        let props = attributes
            .iter()
            .map(|a| (self.atoms.intern(&a.key), JsValue::string(a.value.clone())))
            .collect();
        JsValue::object(props)
    }

    /// Declare every import of a module body as a closure variable
    pub(crate) fn declare_imports(&mut self, body: &[Statement]) -> Result<()> {
        for stmt in body {
            let Statement::Import(decl) = stmt else { continue };
            let source = self.atoms.intern(&decl.source);
            let attributes = self.attributes_value(&decl.attributes);
            let req = self.entries()?.add_req_module(source, attributes);
            for spec in &decl.specifiers {
                let local = self.intern(&spec.local().name);
                let (import_name, is_star) = match spec {
                    ImportSpecifier::Named { imported, .. } => (self.intern(imported), false),
                    ImportSpecifier::Default { .. } => (atoms::default, false),
                    ImportSpecifier::Namespace { .. } => (atoms::_star_, true),
                };
                if self.fd().find_closure_var(local).is_some() {
                    return Err(Error::invalid_context(
                        format!("duplicate import binding '{}'", spec.local().name),
                        spec.local().span.start,
                    ));
                }
                let entries = self.entries()?;
                let import_idx = entries.imports.len() as u32;
                let fd = &mut self.funcs[self.cur];
                let var_idx = fd.closure_vars.len() as u32;
                fd.closure_vars.push(ClosureVar {
                    name: local,
                    var_idx: import_idx as u16,
                    is_local: false,
                    is_arg: false,
                    is_const: true,
                    is_lexical: true,
                    kind: VarKind::Normal,
                });
                self.entries()?.imports.push(ImportEntry {
                    var_idx,
                    is_star,
                    import_name,
                    req_module_idx: req,
                });
            }
        }
        Ok(())
    }

    /// Turn the top-level declarations of the module into closure variables
    pub(crate) fn add_module_variables(&mut self) {
        let fd = &mut self.funcs[self.cur];
        let globals: Vec<GlobalVar> = fd.global_vars.clone();
        for (i, g) in globals.iter().enumerate() {
            fd.closure_vars.push(ClosureVar {
                name: g.name,
                var_idx: i as u16,
                is_local: true,
                is_arg: false,
                is_const: g.is_const,
                is_lexical: g.is_lexical,
                kind: VarKind::Normal,
            });
        }
    }

    pub(crate) fn add_local_export(&mut self, local: Atom, exported: Atom, location: SourceLocation) -> Result<()> {
        self.entries()?.local_exports.push(LocalExport {
            local,
            exported,
            location,
        });
        Ok(())
    }

    /// `export { a as b } from "m"` and `export * as ns from "m"`
    pub(crate) fn add_indirect_export(&mut self, source: &str, local: Atom, exported: Atom) -> Result<()> {
        let source = self.atoms.intern(source);
        let entries = self.entries()?;
        let req = entries.add_req_module(source, JsValue::Undefined);
        entries.indirect_exports.push(ExportEntry {
            kind: ExportEntryKind::Indirect {
                req_module_idx: req,
                local_name: local,
            },
            export_name: exported,
        });
        Ok(())
    }

    /// `export * from "m"`
    pub(crate) fn add_star_export(&mut self, source: &str) -> Result<()> {
        let source = self.atoms.intern(source);
        let entries = self.entries()?;
        let req = entries.add_req_module(source, JsValue::Undefined);
        entries.star_exports.push(StarExportEntry { req_module_idx: req });
        Ok(())
    }
}
