use std::rc::Rc;

use crate::ty::{RecordSchema, TypeNode};

/// A `(type predicate, constructor factory)` pair. When the predicate
/// matches a descriptor the resolver could not otherwise decompose, the
/// factory rewrites it to a record schema describing the registered
/// constructor's signature, and field extraction proceeds from there.
#[derive(Clone)]
pub struct RegistryEntry {
    pub matches: Rc<dyn Fn(&TypeNode) -> bool>,
    pub rewrite: Rc<dyn Fn(&TypeNode) -> Rc<RecordSchema>>,
}

/// Extension point for making additional types decomposable.
///
/// Entries are consulted in registration order; the first matching predicate
/// wins.
#[derive(Clone, Default)]
pub struct ConstructorRegistry {
    entries: Vec<RegistryEntry>,
}

impl ConstructorRegistry {
    pub fn new() -> Self {
        ConstructorRegistry::default()
    }

    pub fn register<M, R>(&mut self, matches: M, rewrite: R)
    where
        M: Fn(&TypeNode) -> bool + 'static,
        R: Fn(&TypeNode) -> Rc<RecordSchema> + 'static,
    {
        self.entries.push(RegistryEntry {
            matches: Rc::new(matches),
            rewrite: Rc::new(rewrite),
        });
    }

    /// Rewrite `ty` via the first matching entry, if any.
    pub fn lookup(&self, ty: &TypeNode) -> Option<Rc<RecordSchema>> {
        for entry in &self.entries {
            if (entry.matches)(ty) {
                return Some((entry.rewrite)(ty));
            }
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
