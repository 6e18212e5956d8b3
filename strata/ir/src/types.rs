//! Canonical, hash-consed types.
//!
//! A [Type] is either a bit-vector of a fixed width, a structure with an
//! ordered list of subtypes, or a callable with parameter and result types.
//! Types are interned by a [Context](crate::Context): two structurally equal
//! descriptions always produce the same shared instance, and the structural
//! hash, and therefore the label, is identical across builds.
use crate::Context;
use itertools::Itertools;
use rustc_hash::{FxHashMap, FxHasher};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, PoisonError, RwLock};
use strata_utils::{Error, Id, StrataResult};

/// The widest bit-vector any context accepts.
pub const SIZE_MAX: u64 = 256;

/// Widths interned when a context is created.
pub(crate) const PREDEFINED_WIDTHS: [u64; 5] = [1, 8, 16, 32, 64];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeKind {
    /// Fixed-width bit-vector.
    Bit,
    /// Ordered aggregate of subtypes.
    Structure,
    /// Signature of a function or intrinsic.
    Callable,
}

struct TypeData {
    kind: TypeKind,
    width: u64,
    params: Vec<Type>,
    subtypes: Vec<Type>,
    hash: u64,
    label: Id,
}

/// Interned type handle. Cloning is cheap.
#[derive(Clone)]
pub struct Type(Arc<TypeData>);

impl Type {
    pub fn kind(&self) -> TypeKind {
        self.0.kind
    }

    /// Width of a bit-vector. `None` for every other kind.
    pub fn bit_width(&self) -> Option<u64> {
        match self.0.kind {
            TypeKind::Bit => Some(self.0.width),
            TypeKind::Structure | TypeKind::Callable => None,
        }
    }

    pub fn is_bit(&self) -> bool {
        self.0.kind == TypeKind::Bit
    }

    /// True for 1-bit vectors.
    pub fn is_bool(&self) -> bool {
        self.bit_width() == Some(1)
    }

    pub fn is_structure(&self) -> bool {
        self.0.kind == TypeKind::Structure
    }

    pub fn is_callable(&self) -> bool {
        self.0.kind == TypeKind::Callable
    }

    /// Parameter types of a callable type.
    pub fn params(&self) -> &[Type] {
        &self.0.params
    }

    /// Element types of a structure, or result types of a callable.
    pub fn subtypes(&self) -> &[Type] {
        &self.0.subtypes
    }

    /// Deterministic structural hash.
    pub fn structural_hash(&self) -> u64 {
        self.0.hash
    }

    /// Deterministic name used by emitters.
    pub fn label(&self) -> Id {
        self.0.label
    }

    /// True if both handles point to the same interned instance.
    pub fn ptr_eq(&self, other: &Type) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
            || (self.0.hash == other.0.hash
                && self.0.kind == other.0.kind
                && self.0.width == other.0.width
                && self.0.params == other.0.params
                && self.0.subtypes == other.0.subtypes)
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.hash)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.kind {
            TypeKind::Bit => write!(f, "b{}", self.0.width),
            TypeKind::Structure => {
                write!(f, "{{{}}}", self.0.subtypes.iter().join(", "))
            }
            TypeKind::Callable => write!(
                f,
                "({}) -> ({})",
                self.0.params.iter().join(", "),
                self.0.subtypes.iter().join(", ")
            ),
        }
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.0.label, self)
    }
}

fn structural_hash(
    kind: TypeKind,
    width: u64,
    params: &[Type],
    subtypes: &[Type],
) -> u64 {
    let mut hasher = FxHasher::default();
    (kind as u8).hash(&mut hasher);
    width.hash(&mut hasher);
    params.len().hash(&mut hasher);
    params.iter().for_each(|p| p.0.hash.hash(&mut hasher));
    subtypes.len().hash(&mut hasher);
    subtypes.iter().for_each(|s| s.0.hash.hash(&mut hasher));
    hasher.finish()
}

/// Mutable description of a type that has not been interned yet.
///
/// Parameters and subtypes may be appended until [TypeSketch::lock] is
/// called. Locking interns the description and freezes the sketch: further
/// appends fail with [Error::TypeLocked] and locking again returns the same
/// [Type].
#[derive(Debug, Clone)]
pub struct TypeSketch {
    kind: TypeKind,
    width: u64,
    params: Vec<Type>,
    subtypes: Vec<Type>,
    locked: Option<Type>,
}

impl TypeSketch {
    pub fn bit(width: u64) -> Self {
        Self::new(TypeKind::Bit, width)
    }

    pub fn structure() -> Self {
        Self::new(TypeKind::Structure, 0)
    }

    pub fn callable() -> Self {
        Self::new(TypeKind::Callable, 0)
    }

    fn new(kind: TypeKind, width: u64) -> Self {
        Self {
            kind,
            width,
            params: vec![],
            subtypes: vec![],
            locked: None,
        }
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn is_locked(&self) -> bool {
        self.locked.is_some()
    }

    fn check_unlocked(&self, what: &str) -> StrataResult<()> {
        match &self.locked {
            Some(ty) => Err(Error::type_locked(format!(
                "cannot add a {what} to locked type {ty}"
            ))),
            None => Ok(()),
        }
    }

    /// Append a parameter type. Only callable types have parameters.
    pub fn push_param(&mut self, ty: Type) -> StrataResult<&mut Self> {
        self.check_unlocked("parameter")?;
        if self.kind != TypeKind::Callable {
            return Err(Error::malformed(format!(
                "{:?} types do not take parameters",
                self.kind
            )));
        }
        self.params.push(ty);
        Ok(self)
    }

    /// Append an element type (structures) or a result type (callables).
    pub fn push_subtype(&mut self, ty: Type) -> StrataResult<&mut Self> {
        self.check_unlocked("subtype")?;
        if self.kind == TypeKind::Bit {
            return Err(Error::malformed("bit-vector types have no subtypes"));
        }
        self.subtypes.push(ty);
        Ok(self)
    }

    /// Structural hash of the description as it currently stands.
    pub fn structural_hash(&self) -> u64 {
        match &self.locked {
            Some(ty) => ty.structural_hash(),
            None => structural_hash(
                self.kind,
                self.width,
                &self.params,
                &self.subtypes,
            ),
        }
    }

    /// Intern the description and freeze the sketch.
    pub fn lock(&mut self, ctx: &Context) -> StrataResult<Type> {
        if let Some(ty) = &self.locked {
            return Ok(ty.clone());
        }
        let ty = ctx.types().intern(
            self.kind,
            self.width,
            self.params.clone(),
            self.subtypes.clone(),
        )?;
        self.locked = Some(ty.clone());
        Ok(ty)
    }
}

#[derive(PartialEq, Eq, Hash)]
struct TypeKey {
    kind: TypeKind,
    width: u64,
    params: Vec<Type>,
    subtypes: Vec<Type>,
}

/// The interning table owned by a [Context].
pub(crate) struct TypeTable {
    max_width: u64,
    table: RwLock<FxHashMap<TypeKey, Type>>,
}

impl TypeTable {
    pub(crate) fn new(max_width: u64) -> Self {
        let table = Self {
            max_width,
            table: RwLock::default(),
        };
        for width in PREDEFINED_WIDTHS.iter().filter(|&&w| w <= max_width) {
            // Cannot fail: the width was checked against the ceiling.
            let _ = table.intern(TypeKind::Bit, *width, vec![], vec![]);
        }
        table
    }

    pub(crate) fn len(&self) -> usize {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub(crate) fn intern(
        &self,
        kind: TypeKind,
        width: u64,
        params: Vec<Type>,
        subtypes: Vec<Type>,
    ) -> StrataResult<Type> {
        let width = match kind {
            TypeKind::Bit => {
                if width == 0 || width > self.max_width {
                    return Err(Error::InvalidWidth {
                        width,
                        max: self.max_width,
                    });
                }
                width
            }
            TypeKind::Structure if subtypes.is_empty() => {
                return Err(Error::malformed(
                    "structure types must have at least one element",
                ));
            }
            TypeKind::Structure | TypeKind::Callable => 0,
        };
        let key = TypeKey {
            kind,
            width,
            params,
            subtypes,
        };

        if let Some(ty) = self
            .table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(ty.clone());
        }

        let mut table =
            self.table.write().unwrap_or_else(PoisonError::into_inner);
        // Another builder may have interned the same key in the meantime.
        if let Some(ty) = table.get(&key) {
            return Ok(ty.clone());
        }
        let hash = structural_hash(kind, width, &key.params, &key.subtypes);
        let label = match kind {
            TypeKind::Bit => Id::from(format!("b{width}")),
            TypeKind::Structure => Id::from(format!("s{hash:016x}")),
            TypeKind::Callable => Id::from(format!("f{hash:016x}")),
        };
        let ty = Type(Arc::new(TypeData {
            kind,
            width,
            params: key.params.clone(),
            subtypes: key.subtypes.clone(),
            hash,
            label,
        }));
        log::debug!("Interned type {ty:?}");
        table.insert(key, ty.clone());
        Ok(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sketch_lock() {
        let ctx = Context::new();
        let b8 = ctx.bit(8).unwrap();
        let b16 = ctx.bit(16).unwrap();

        let mut sketch = TypeSketch::callable();
        sketch.push_param(b8.clone()).unwrap();
        sketch.push_subtype(b16.clone()).unwrap();
        let before = sketch.structural_hash();
        let ty = sketch.lock(&ctx).unwrap();
        assert_eq!(ty.structural_hash(), before);
        assert!(sketch.is_locked());
        assert!(ty.ptr_eq(&sketch.lock(&ctx).unwrap()));
        assert!(ty.ptr_eq(&ctx.callable_type([b8.clone()], [b16]).unwrap()));

        assert!(matches!(sketch.push_param(b8.clone()), Err(Error::TypeLocked(_))));
        assert!(matches!(sketch.push_subtype(b8), Err(Error::TypeLocked(_))));
        assert_eq!(sketch.structural_hash(), before);
    }

    #[test]
    fn structures_differ_by_order() {
        let ctx = Context::new();
        let b1 = ctx.bool();
        let b8 = ctx.bit(8).unwrap();
        let s1 = ctx.structure_type([b1.clone(), b8.clone()]).unwrap();
        let s2 = ctx.structure_type([b8.clone(), b1.clone()]).unwrap();
        let s3 = ctx.structure_type([b1, b8]).unwrap();
        assert_ne!(s1, s2);
        assert!(s1.ptr_eq(&s3));
        assert_eq!(s1.to_string(), "{b1, b8}");
        assert_eq!(s1.bit_width(), None);
    }

    #[test]
    fn empty_structure_type_rejected() {
        let ctx = Context::new();
        let mut sketch = TypeSketch::structure();
        assert!(matches!(sketch.lock(&ctx), Err(Error::Malformed(_))));
    }

    #[test]
    fn bits_take_no_params() {
        let ctx = Context::new();
        let mut sketch = TypeSketch::bit(4);
        assert!(sketch.push_param(ctx.bool()).is_err());
        assert!(sketch.push_subtype(ctx.bool()).is_err());
        assert_eq!(sketch.lock(&ctx).unwrap().bit_width(), Some(4));
    }

    #[test]
    fn labels_are_stable() {
        let a = Context::new();
        let b = Context::new();
        let ta = a
            .structure_type([a.bit(3).unwrap(), a.bit(5).unwrap()])
            .unwrap();
        let tb = b
            .structure_type([b.bit(3).unwrap(), b.bit(5).unwrap()])
            .unwrap();
        assert_eq!(ta.label(), tb.label());
        assert_eq!(a.bit(12).unwrap().label(), "b12");
    }
}
