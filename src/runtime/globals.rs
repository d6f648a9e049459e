//! Global store
//!
//! Globals live for the lifetime of an instance and are shared by every
//! activation. They are addressed by definition order or by `$name`.

use super::{RuntimeError, Value};
use crate::parser::instruction::Index;
use crate::parser::module::{GlobalDef, ValueType};
use std::collections::HashMap;

/// A live global: its declared shape and current value
#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    pub name: Option<String>,
    pub ty: ValueType,
    pub mutable: bool,
    pub value: Value,
}

#[derive(Debug, Clone, Default)]
pub struct GlobalStore {
    globals: Vec<Global>,
    names: HashMap<String, usize>,
}

impl GlobalStore {
    pub fn new() -> Self {
        GlobalStore::default()
    }

    /// Seed a store from a module's global definitions
    pub fn from_defs(defs: &[GlobalDef]) -> Self {
        let mut store = GlobalStore::new();
        for def in defs {
            store.define(def.name.clone(), def.ty, def.mutable, def.init);
        }
        store
    }

    /// Add a global, returning its index
    pub fn define(&mut self, name: Option<String>, ty: ValueType, mutable: bool, value: Value) -> u32 {
        let index = self.globals.len();
        if let Some(name) = &name {
            self.names.insert(name.clone(), index);
        }
        self.globals.push(Global {
            name,
            ty,
            mutable,
            value,
        });
        index as u32
    }

    fn position(&self, index: &Index) -> Option<usize> {
        match index {
            Index::Num(idx) => Some(*idx as usize).filter(|idx| *idx < self.globals.len()),
            Index::Id(name) => self.names.get(name).copied(),
        }
    }

    pub fn global(&self, index: &Index) -> Option<&Global> {
        self.position(index).map(|idx| &self.globals[idx])
    }

    /// Current value of a global
    pub fn get(&self, index: &Index) -> Option<Value> {
        self.global(index).map(|global| global.value)
    }

    /// Host-facing update: refuses immutable globals and values of the wrong type
    pub fn set(&mut self, index: &Index, value: Value) -> Result<(), RuntimeError> {
        let idx = self
            .position(index)
            .ok_or_else(|| RuntimeError::UnknownGlobal(index.to_string()))?;
        let global = &mut self.globals[idx];
        if !global.mutable {
            return Err(RuntimeError::ImmutableGlobal(index.to_string()));
        }
        if value.typ() != global.ty {
            return Err(RuntimeError::TypeMismatch {
                expected: global.ty.to_string(),
                actual: value.typ().to_string(),
            });
        }
        global.value = value;
        Ok(())
    }

    /// Overwrite a global regardless of its mutability, as `global.set` does.
    /// Returns false if the global does not exist.
    pub(crate) fn overwrite(&mut self, index: &Index, value: Value) -> bool {
        match self.position(index) {
            Some(idx) => {
                self.globals[idx].value = value;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Global> {
        self.globals.iter()
    }

    pub fn len(&self) -> usize {
        self.globals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.globals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> GlobalStore {
        GlobalStore::from_defs(&[
            GlobalDef {
                name: Some("$counter".into()),
                ty: ValueType::I32,
                mutable: true,
                init: Value::I32(7),
            },
            GlobalDef {
                name: None,
                ty: ValueType::F64,
                mutable: false,
                init: Value::F64(1.5),
            },
        ])
    }

    #[test]
    fn test_lookup_by_name_and_index() {
        let store = store();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&Index::Id("$counter".into())), Some(Value::I32(7)));
        assert_eq!(store.get(&Index::Num(0)), Some(Value::I32(7)));
        assert_eq!(store.get(&Index::Num(1)), Some(Value::F64(1.5)));
        assert_eq!(store.get(&Index::Num(2)), None);
        assert_eq!(store.get(&Index::Id("$nope".into())), None);
    }

    #[test]
    fn test_set_respects_mutability() {
        let mut store = store();
        store.set(&Index::Id("$counter".into()), Value::I32(8)).unwrap();
        assert_eq!(store.get(&Index::Num(0)), Some(Value::I32(8)));

        assert_eq!(
            store.set(&Index::Num(1), Value::F64(2.0)),
            Err(RuntimeError::ImmutableGlobal("1".into()))
        );
        assert_eq!(
            store.set(&Index::Num(0), Value::I64(1)),
            Err(RuntimeError::TypeMismatch {
                expected: "i32".into(),
                actual: "i64".into()
            })
        );
        assert_eq!(
            store.set(&Index::Id("$nope".into()), Value::I32(1)),
            Err(RuntimeError::UnknownGlobal("$nope".into()))
        );
    }

    #[test]
    fn test_overwrite_ignores_mutability() {
        let mut store = store();
        assert!(store.overwrite(&Index::Num(1), Value::F64(3.0)));
        assert_eq!(store.get(&Index::Num(1)), Some(Value::F64(3.0)));
        assert!(!store.overwrite(&Index::Num(5), Value::I32(0)));
    }
}
