//! Typed resource handles.
//!
//! A [`Handle`] owns exactly one increment of its entity's intrusive count.
//! Cloning increments, dropping decrements. When a drop takes the count to
//! zero the entity's release hook queues a release request; the entity stays
//! indexed until the next flush confirms nobody picked it up again.

use std::fmt;
use std::rc::{Rc, Weak};

use crate::id::ResourceId;
use crate::resource::{Entry, ErasedResource, Resource, ResourceState};

/// Counted reference to a cached asset of type `T`.
pub struct Handle<T: Resource> {
    entry: Rc<Entry<T>>,
}

impl<T: Resource> Handle<T> {
    pub(crate) fn acquire(entry: Rc<Entry<T>>) -> Self {
        entry.header.ref_count.increment();
        Self { entry }
    }

    /// The asset, once its payload has been applied.
    pub fn get(&self) -> Option<&T> {
        self.entry.asset()
    }

    pub fn id(&self) -> ResourceId {
        self.entry.header.id()
    }

    pub fn serial(&self) -> u64 {
        self.entry.header.serial()
    }

    pub fn state(&self) -> ResourceState {
        self.entry.header.state()
    }

    pub fn is_pending(&self) -> bool {
        self.state().is_pending()
    }

    pub fn is_loaded(&self) -> bool {
        self.state().is_loaded()
    }

    pub fn is_valid(&self) -> bool {
        self.state().is_valid()
    }

    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    /// Outstanding references, this one included.
    pub fn ref_count(&self) -> usize {
        self.entry.header.ref_count()
    }

    pub fn name(&self) -> Option<&str> {
        self.entry.header.debug_name()
    }

    /// Whether both handles point at the same instance.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.entry, &b.entry)
    }
}

impl<T: Resource> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self::acquire(self.entry.clone())
    }
}

impl<T: Resource> Drop for Handle<T> {
    fn drop(&mut self) {
        if self.entry.header.ref_count.decrement() {
            let weak = Rc::downgrade(&self.entry);
            let target: Weak<dyn ErasedResource> = weak;
            self.entry.header.release(target);
        }
    }
}

impl<T: Resource> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl<T: Resource> Eq for Handle<T> {}

impl<T: Resource> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("kind", &T::KIND)
            .field("id", &self.id())
            .field("state", &self.state())
            .field("ref_count", &self.ref_count())
            .finish()
    }
}
