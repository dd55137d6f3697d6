//! Handle tables
//!
//! The guest only deals in integers, so every host object it creates is
//! parked in a table and the guest gets a `Handle` back. There is one table
//! per resource class; a handle means nothing outside its own table.
//!
//! Handles come from a per-table counter that starts at 1 and only moves
//! forward. 0 is the null object in every class and is never allocated, and
//! a released handle is never handed out again, so a stale handle held by
//! the guest can only fail to resolve, never alias a newer object.

use super::error::{BridgeError, BridgeResult};
use std::collections::HashMap;
use std::fmt;

/// Guest-visible integer naming a host object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(pub u32);

impl Handle {
    /// The null object
    pub const NULL: Handle = Handle(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bidirectional map between handles and live host objects of one class
#[derive(Debug)]
pub struct HandleTable<T> {
    class: &'static str,
    objects: HashMap<Handle, T>,
    next: u32,
}

impl<T> HandleTable<T> {
    /// Empty table for the named resource class
    pub fn new(class: &'static str) -> Self {
        Self {
            class,
            objects: HashMap::new(),
            next: 1,
        }
    }

    /// Resource class name, used in diagnostics
    pub fn class(&self) -> &'static str {
        self.class
    }

    /// Store `object` under the next handle
    ///
    /// Once every value up to `u32::MAX` has been handed out the table is
    /// exhausted: the object is dropped and `Handle::NULL` comes back, as
    /// if the context had refused to create it.
    pub fn allocate(&mut self, object: T) -> Handle {
        // `next == 0` marks exhaustion; 0 is never a live handle
        if self.next == 0 {
            crate::console_error!("[handles] {} handles exhausted", self.class);
            return Handle::NULL;
        }
        let handle = Handle(self.next);
        self.next = self.next.checked_add(1).unwrap_or(0);
        self.objects.insert(handle, object);
        handle
    }

    /// Remove and return the object. The caller destroys the host side.
    pub fn release(&mut self, handle: Handle) -> BridgeResult<T> {
        self.objects.remove(&handle).ok_or_else(|| {
            crate::console_error!("[handles] release of unknown {} handle {}", self.class, handle);
            BridgeError::UnknownHandle {
                class: self.class,
                handle: handle.0,
            }
        })
    }

    /// Look up a live handle
    pub fn resolve(&self, handle: Handle) -> BridgeResult<&T> {
        self.objects.get(&handle).ok_or(BridgeError::UnknownHandle {
            class: self.class,
            handle: handle.0,
        })
    }

    /// Look up a handle where 0 means "no object"
    pub fn resolve_optional(&self, handle: Handle) -> BridgeResult<Option<&T>> {
        if handle.is_null() {
            return Ok(None);
        }
        self.resolve(handle).map(Some)
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.objects.contains_key(&handle)
    }

    /// Number of live handles
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// First handle whose object satisfies `pred`
    pub fn find(&self, mut pred: impl FnMut(&T) -> bool) -> Option<Handle> {
        self.objects
            .iter()
            .filter(|(_, obj)| pred(obj))
            .map(|(h, _)| *h)
            .min()
    }

    /// Remove every entry for which `remove` returns true, returning them
    pub fn drain_where(&mut self, mut remove: impl FnMut(&T) -> bool) -> Vec<(Handle, T)> {
        let doomed: Vec<Handle> = self
            .objects
            .iter()
            .filter(|(_, obj)| remove(obj))
            .map(|(h, _)| *h)
            .collect();

        doomed
            .into_iter()
            .filter_map(|h| self.objects.remove(&h).map(|obj| (h, obj)))
            .collect()
    }
}

impl<T: PartialEq> HandleTable<T> {
    /// Reverse lookup: the handle under which `object` is stored
    pub fn handle_of(&self, object: &T) -> Option<Handle> {
        self.objects
            .iter()
            .find(|(_, obj)| *obj == object)
            .map(|(h, _)| *h)
    }
}
