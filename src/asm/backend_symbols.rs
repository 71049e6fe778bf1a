//! The backend symbol table: a second, assembly-level view of every name
//! from `symbols::SymbolTable`, built once at the start of `lower` and
//! consulted by `allocate` (pseudo vs. static data) and `emit` (whether a
//! called function needs a PLT suffix).

use crate::asm::AssemblyType;
use crate::symbols::{IdentifierAttr, SymbolTable};
use crate::types::Type;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjEntry {
    pub ty: AssemblyType,
    pub is_static: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunEntry {
    pub defined: bool,
}

#[derive(Debug, Clone, Default)]
pub struct BackendSymbolTable {
    objects: HashMap<String, ObjEntry>,
    functions: HashMap<String, FunEntry>,
}

impl From<Type> for AssemblyType {
    fn from(ty: Type) -> AssemblyType {
        match ty {
            Type::Int | Type::UInt => AssemblyType::Longword,
            Type::Long | Type::ULong => AssemblyType::Quadword,
            Type::Fun(_) => unreachable!("a function has no assembly-level storage type"),
        }
    }
}

impl BackendSymbolTable {
    /// Derives the backend table from the frontend symbol table that the
    /// type checker (and `ir_emitter`'s fresh temporaries) populated.
    pub fn from_frontend(symbols: &SymbolTable) -> BackendSymbolTable {
        let mut table = BackendSymbolTable::default();
        for (name, entry) in symbols.iter() {
            match &entry.attrs {
                IdentifierAttr::Fun { defined, .. } => {
                    table.functions.insert(name.clone(), FunEntry { defined: *defined });
                }
                IdentifierAttr::Static { .. } => {
                    table.objects.insert(name.clone(), ObjEntry { ty: entry.ty.clone().into(), is_static: true });
                }
                IdentifierAttr::Local => {
                    table.objects.insert(name.clone(), ObjEntry { ty: entry.ty.clone().into(), is_static: false });
                }
            }
        }
        table
    }

    pub fn add_object(&mut self, name: String, ty: AssemblyType, is_static: bool) {
        self.objects.insert(name, ObjEntry { ty, is_static });
    }

    pub fn object(&self, name: &str) -> ObjEntry {
        *self
            .objects
            .get(name)
            .unwrap_or_else(|| panic!("internal error: '{name}' missing from the backend symbol table"))
    }

    pub fn is_static(&self, name: &str) -> bool {
        self.objects.get(name).map(|o| o.is_static).unwrap_or(false)
    }

    pub fn function_is_defined(&self, name: &str) -> bool {
        self.functions.get(name).map(|f| f.defined).unwrap_or(false)
    }
}
