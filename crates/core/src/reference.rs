//! Component references
//!
//! Components point at each other by identifier until they are loaded; on
//! load the identifier is swapped for the shared object. Resolution is
//! one-way: a resolved reference never goes back to an identifier.

use crate::error::{ConfluxError, Result};
use std::fmt;
use std::sync::Arc;

/// Anything addressable by a stable identifier.
pub trait Identified {
    /// The component identifier
    fn identifier(&self) -> &str;
}

/// A reference to `T` that is either still an identifier or the loaded object.
pub enum Ref<T: ?Sized> {
    /// Identifier only; must be resolved before use
    Unresolved(String),
    /// Loaded object
    Resolved(Arc<T>),
}

impl<T: ?Sized + Identified> Ref<T> {
    /// Identifier of the referenced object, resolved or not
    pub fn identifier(&self) -> &str {
        match self {
            Ref::Unresolved(id) => id,
            Ref::Resolved(obj) => obj.identifier(),
        }
    }
}

impl<T: ?Sized> Ref<T> {
    /// Unresolved reference by identifier
    pub fn by_id(identifier: impl Into<String>) -> Self {
        Ref::Unresolved(identifier.into())
    }

    /// True once the object has been loaded
    pub fn is_resolved(&self) -> bool {
        matches!(self, Ref::Resolved(_))
    }

    /// The loaded object, or `UnresolvedReference` naming the identifier
    pub fn resolved(&self) -> Result<&Arc<T>> {
        match self {
            Ref::Resolved(obj) => Ok(obj),
            Ref::Unresolved(id) => Err(ConfluxError::UnresolvedReference(id.clone())),
        }
    }

    /// Resolve in place with `load`. Already resolved references are left alone.
    pub fn resolve_with<F>(&mut self, load: F) -> Result<()>
    where
        F: FnOnce(&str) -> Result<Arc<T>>,
    {
        if let Ref::Unresolved(id) = self {
            let obj = load(id.as_str())?;
            *self = Ref::Resolved(obj);
        }
        Ok(())
    }
}

impl<T: ?Sized> Clone for Ref<T> {
    fn clone(&self) -> Self {
        match self {
            Ref::Unresolved(id) => Ref::Unresolved(id.clone()),
            Ref::Resolved(obj) => Ref::Resolved(Arc::clone(obj)),
        }
    }
}

impl<T: ?Sized> From<Arc<T>> for Ref<T> {
    fn from(obj: Arc<T>) -> Self {
        Ref::Resolved(obj)
    }
}

impl<T: ?Sized + Identified> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ref::Unresolved(id) => f.debug_tuple("Unresolved").field(id).finish(),
            Ref::Resolved(obj) => f.debug_tuple("Resolved").field(&obj.identifier()).finish(),
        }
    }
}
