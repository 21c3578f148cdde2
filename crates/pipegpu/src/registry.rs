//! Id-keyed registries of live resources

use crate::{ResourceError, ResourceId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// A store of live objects of one kind, keyed by [`ResourceId`]
///
/// Objects are never evicted. Looking up the same id twice returns the same
/// `Rc`, and inserting under an id that is already present keeps the first
/// object.
pub struct Registry<T> {
    kind: &'static str,
    entries: RefCell<HashMap<ResourceId, Rc<T>>>,
}

impl<T> Registry<T> {
    /// Creates an empty registry; `kind` names the objects in errors
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: RefCell::new(HashMap::new()),
        }
    }

    /// Kind of object stored here, e.g. `"texture"`
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Looks up a live object
    ///
    /// # Returns
    /// The object, or [`ResourceError::UnknownResource`] if the id was never registered
    pub fn get(&self, id: ResourceId) -> Result<Rc<T>, ResourceError> {
        self.try_get(id).ok_or(ResourceError::UnknownResource { kind: self.kind, id })
    }

    /// Looks up a live object, returning `None` if it is absent
    pub fn try_get(&self, id: ResourceId) -> Option<Rc<T>> {
        self.entries.borrow().get(&id).cloned()
    }

    pub fn contains(&self, id: ResourceId) -> bool {
        self.entries.borrow().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Returns the object registered under `id`, creating it with `make` if absent
    ///
    /// `make` runs at most once per id and never while the registry is borrowed.
    ///
    /// # Arguments
    /// * `id` - Identity of the object
    /// * `make` - Constructor invoked with `id` when nothing is registered yet
    pub fn get_or_try_insert_with<E>(&self, id: ResourceId, make: impl FnOnce(ResourceId) -> Result<T, E>) -> Result<Rc<T>, E> {
        if let Some(existing) = self.try_get(id) {
            return Ok(existing);
        }
        let value = Rc::new(make(id)?);
        Ok(self.entries.borrow_mut().entry(id).or_insert(value).clone())
    }

    /// Registers an object under a freshly minted id
    pub fn insert(&self, make: impl FnOnce(ResourceId) -> T) -> (ResourceId, Rc<T>) {
        let id = ResourceId::mint();
        let value = Rc::new(make(id));
        self.entries.borrow_mut().insert(id, value.clone());
        (id, value)
    }
}

impl<T> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").field("kind", &self.kind).field("len", &self.len()).finish()
    }
}
