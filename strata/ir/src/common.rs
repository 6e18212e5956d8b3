use crate::Variant;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Untyped index of a value in a module's arena.
///
/// Every index carries the stamp of the module that allocated it; using it
/// with any other module is a programming error and panics.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueIdx {
    slot: u32,
    owner: u32,
}

impl ValueIdx {
    pub(crate) fn new(slot: usize, owner: u32) -> Self {
        Self {
            slot: u32::try_from(slot).unwrap_or_else(|_| {
                panic!("module arena exceeded {} values", u32::MAX)
            }),
            owner,
        }
    }

    /// Position of the value in its module's arena.
    pub fn index(&self) -> usize {
        self.slot as usize
    }

    pub(crate) fn owner(&self) -> u32 {
        self.owner
    }
}

impl fmt::Debug for ValueIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}@{}", self.slot, self.owner)
    }
}

/// A class of values in the IR taxonomy.
///
/// `admits` is the "is this value a K or one of K's descendants" predicate.
/// Abstract kinds compose the predicates of their children so that, for
/// example, [crate::kind::Block] admits every scope and every statement.
pub trait Kind: 'static {
    /// Human readable name used in diagnostics.
    const NAME: &'static str;

    fn admits(variant: Variant) -> bool;
}

/// `Self` is a descendant of `P` in the taxonomy. Enables [Handle::upcast].
pub trait SubKind<P: Kind>: Kind {}

/// A typed index into a module's arena.
///
/// A `Handle<K>` is only ever created for values admitted by `K`, either by
/// the builder or by [crate::Module::downcast].
pub struct Handle<K> {
    raw: ValueIdx,
    _kind: PhantomData<fn() -> K>,
}

impl<K: Kind> Handle<K> {
    pub(crate) fn new_unchecked(raw: ValueIdx) -> Self {
        Self {
            raw,
            _kind: PhantomData,
        }
    }

    /// The untyped index.
    pub fn value(self) -> ValueIdx {
        self.raw
    }

    /// Widen the handle to an ancestor kind.
    pub fn upcast<P: Kind>(self) -> Handle<P>
    where
        K: SubKind<P>,
    {
        Handle::new_unchecked(self.raw)
    }
}

impl<K> Clone for Handle<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for Handle<K> {}

impl<K> PartialEq for Handle<K> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<K> Eq for Handle<K> {}

impl<K> Hash for Handle<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state)
    }
}

impl<K: Kind> fmt::Debug for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", K::NAME, self.raw)
    }
}

impl<K: Kind> From<Handle<K>> for ValueIdx {
    fn from(h: Handle<K>) -> Self {
        h.raw
    }
}

impl<K: Kind> From<&Handle<K>> for ValueIdx {
    fn from(h: &Handle<K>) -> Self {
        h.raw
    }
}
