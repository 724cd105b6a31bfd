//! Per-run ownership of everything a program can point back at.
//!
//! Arrays, objects and closure environments are the only values that hold
//! other values, so they are the only way to build `Rc` cycles. The heap keeps
//! a strong handle on each of them until the run ends and then empties them,
//! which breaks every cycle and keeps teardown from recursing through long
//! chains. The same ledger meters bytes against the run's allocation budget.

use std::collections::HashMap;
use std::mem;
use std::rc::Rc;

use crate::error::ExecutionError;
use crate::value::{ArrayRef, ObjectRef, Value};

use super::scope::ScopeRef;

/// Approximate cost of one array slot or object property.
pub(crate) const SLOT_BYTES: usize = mem::size_of::<Value>();
/// Approximate cost of one heap-allocated string beyond its text.
pub(crate) const STRING_HEADER_BYTES: usize = 16;
const CONTAINER_HEADER_BYTES: usize = 32;
/// Approximate cost of a scope kept alive by a closure.
pub(crate) const SCOPE_BYTES: usize = 256;

#[derive(Default)]
pub(crate) struct Heap {
    scopes: HashMap<usize, ScopeRef>,
    arrays: HashMap<usize, ArrayRef>,
    objects: HashMap<usize, ObjectRef>,
    allocated: usize,
    limit: usize,
}

impl Heap {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            scopes: HashMap::new(),
            arrays: HashMap::new(),
            objects: HashMap::new(),
            allocated: 0,
            limit,
        }
    }

    /// Count `bytes` against the budget.
    pub(crate) fn charge(&mut self, bytes: usize) -> Result<(), ExecutionError> {
        self.allocated = self.allocated.saturating_add(bytes);
        if self.allocated > self.limit {
            return Err(ExecutionError::MemoryLimit {
                limit_bytes: self.limit,
            });
        }
        Ok(())
    }

    /// Charge for a container of `slots` entries that is about to be built.
    pub(crate) fn charge_slots(&mut self, slots: usize) -> Result<(), ExecutionError> {
        self.charge(
            slots
                .saturating_mul(SLOT_BYTES)
                .saturating_add(CONTAINER_HEADER_BYTES),
        )
    }

    /// Keep `value` alive until the run ends if it can hold other values.
    pub(crate) fn adopt(&mut self, value: &Value) {
        match value {
            Value::Array(items) => self.adopt_array(items),
            Value::Object(object) => self.adopt_object(object),
            _ => {}
        }
    }

    pub(crate) fn adopt_array(&mut self, items: &ArrayRef) {
        self.arrays
            .entry(Rc::as_ptr(items) as usize)
            .or_insert_with(|| Rc::clone(items));
    }

    pub(crate) fn adopt_object(&mut self, object: &ObjectRef) {
        self.objects
            .entry(Rc::as_ptr(object) as usize)
            .or_insert_with(|| Rc::clone(object));
    }

    /// Keep a scope a closure captured alive until the run ends. Returns
    /// whether the scope was new to the heap.
    pub(crate) fn adopt_scope(&mut self, scope: &ScopeRef) -> bool {
        let key = Rc::as_ptr(scope) as usize;
        if self.scopes.contains_key(&key) {
            return false;
        }
        self.scopes.insert(key, Rc::clone(scope));
        true
    }

    /// Empty every retained scope and container, then let go of them.
    ///
    /// Contents are taken out while the heap still holds every container, so
    /// dropping them only decrements counts and never recurses.
    pub(crate) fn release(&mut self) {
        for scope in self.scopes.values() {
            let taken = mem::take(&mut *scope.borrow_mut());
            drop(taken);
        }
        for items in self.arrays.values() {
            let taken = mem::take(&mut *items.borrow_mut());
            drop(taken);
        }
        for object in self.objects.values() {
            let taken = mem::take(&mut object.borrow_mut().props);
            drop(taken);
        }
        self.scopes.clear();
        self.arrays.clear();
        self.objects.clear();
    }

    #[cfg(test)]
    pub(crate) fn handles(&self) -> Vec<std::rc::Weak<dyn std::any::Any>> {
        let mut handles: Vec<std::rc::Weak<dyn std::any::Any>> = Vec::new();
        for scope in self.scopes.values() {
            handles.push(Rc::downgrade(scope) as std::rc::Weak<dyn std::any::Any>);
        }
        for items in self.arrays.values() {
            handles.push(Rc::downgrade(items) as std::rc::Weak<dyn std::any::Any>);
        }
        for object in self.objects.values() {
            handles.push(Rc::downgrade(object) as std::rc::Weak<dyn std::any::Any>);
        }
        handles
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::value::JsObject;

    #[test]
    fn charges_past_the_limit_halt() {
        let mut heap = Heap::new(100);
        assert!(heap.charge(60).is_ok());
        assert_eq!(
            heap.charge(60),
            Err(ExecutionError::MemoryLimit { limit_bytes: 100 })
        );
    }

    #[test]
    fn release_breaks_self_references() {
        let mut heap = Heap::new(usize::MAX);
        let handle: ObjectRef = Rc::new(RefCell::new(JsObject::default()));
        let object = Value::Object(Rc::clone(&handle));
        handle.borrow_mut().set("me", object.clone());
        heap.adopt(&object);
        let weak = Rc::downgrade(&handle);
        drop(object);
        drop(handle);

        assert!(weak.upgrade().is_some());
        heap.release();
        assert!(weak.upgrade().is_none());
    }
}
