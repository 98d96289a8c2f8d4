//! Components applied to the data layer.

use conflux_core::{Bindings, Leaf};
use conflux_vector::{Listener, Model, VectorIndex, LISTENER_TYPE_ID, VECTOR_INDEX_TYPE_ID};
use std::fmt;
use std::sync::Arc;

/// Component type id of models.
pub const MODEL_TYPE_ID: &str = "model";

/// Anything that can be applied with [`Datalayer::apply`](crate::Datalayer::apply).
#[derive(Clone)]
pub enum Component {
    /// A model, registered by identifier
    Model(Arc<dyn Model>),
    /// A listener computing model outputs over a table
    Listener(Listener),
    /// A vector index over a listener's outputs
    VectorIndex(VectorIndex),
}

impl Component {
    /// Component type id
    pub fn type_id(&self) -> &'static str {
        match self {
            Component::Model(_) => MODEL_TYPE_ID,
            Component::Listener(_) => LISTENER_TYPE_ID,
            Component::VectorIndex(_) => VECTOR_INDEX_TYPE_ID,
        }
    }

    /// Component identifier
    pub fn identifier(&self) -> &str {
        match self {
            Component::Model(m) => m.identifier(),
            Component::Listener(l) => &l.identifier,
            Component::VectorIndex(v) => &v.identifier,
        }
    }

    /// Variables still to be bound. Models are opaque and carry none.
    pub fn variables(&self) -> Vec<String> {
        match self {
            Component::Model(_) => Vec::new(),
            Component::Listener(l) => l.variables(),
            Component::VectorIndex(v) => v.variables(),
        }
    }

    /// Copy with `bindings` substituted
    pub fn set_variables(&self, bindings: &Bindings) -> Component {
        match self {
            Component::Model(m) => Component::Model(Arc::clone(m)),
            Component::Listener(l) => Component::Listener(l.set_variables(bindings)),
            Component::VectorIndex(v) => Component::VectorIndex(v.set_variables(bindings)),
        }
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("type_id", &self.type_id())
            .field("identifier", &self.identifier())
            .finish()
    }
}

impl From<Arc<dyn Model>> for Component {
    fn from(model: Arc<dyn Model>) -> Self {
        Component::Model(model)
    }
}

impl From<Listener> for Component {
    fn from(listener: Listener) -> Self {
        Component::Listener(listener)
    }
}

impl From<VectorIndex> for Component {
    fn from(index: VectorIndex) -> Self {
        Component::VectorIndex(index)
    }
}
