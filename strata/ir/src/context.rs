//! An IR context. Owns the interning tables that every module built from it
//! shares and hands out modules.
use crate::types::{TypeKind, TypeTable, SIZE_MAX};
use crate::{Ident, Module, Type};
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use strata_utils::{Id, NameGenerator, StrataResult};

/// Configuration of a [Context].
#[derive(Debug, Clone)]
pub struct IrConf {
    /// Widest bit-vector accepted. Clamped to [SIZE_MAX].
    pub max_width: u64,
    /// Check during traversal that branch and loop statements end with a
    /// 1-bit instruction.
    pub check_conditions: bool,
    /// Longest accepted string constant, in bytes.
    pub max_string_len: usize,
}

impl Default for IrConf {
    fn default() -> Self {
        Self {
            max_width: SIZE_MAX,
            check_conditions: true,
            max_string_len: 4096,
        }
    }
}

type IdentKey = (Id, Id, Type);

/// Stamps are unique across every context in the process so that a handle
/// can never be resolved by a module it was not built in.
static NEXT_MODULE: AtomicU32 = AtomicU32::new(0);

/// Owns the type and identifier interning tables and the label generator.
///
/// Every [Module] borrows the context it was created from, so no handle built
/// from a context can outlive it. Independent contexts do not share any state
/// and can be used on different threads at the same time. A single context
/// may also be shared between threads: its tables are internally locked.
pub struct Context {
    conf: IrConf,
    types: TypeTable,
    bool_ty: Type,
    identifiers: RwLock<FxHashMap<IdentKey, Ident>>,
    namegen: Mutex<NameGenerator>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Self::with_conf(IrConf::default())
    }

    pub fn with_conf(mut conf: IrConf) -> Self {
        conf.max_width = conf.max_width.clamp(1, SIZE_MAX);
        let types = TypeTable::new(conf.max_width);
        let bool_ty = types
            .intern(TypeKind::Bit, 1, vec![], vec![])
            .unwrap_or_else(|e| unreachable!("1-bit type is always valid: {e}"));
        Self {
            conf,
            types,
            bool_ty,
            identifiers: RwLock::default(),
            namegen: Mutex::default(),
        }
    }

    pub fn conf(&self) -> &IrConf {
        &self.conf
    }

    pub(crate) fn types(&self) -> &TypeTable {
        &self.types
    }

    /// Number of distinct types interned so far.
    pub fn interned_types(&self) -> usize {
        self.types.len()
    }

    /// The canonical bit-vector type of `width`.
    pub fn bit(&self, width: u64) -> StrataResult<Type> {
        self.types.intern(TypeKind::Bit, width, vec![], vec![])
    }

    /// The 1-bit type produced by logical instructions.
    pub fn bool(&self) -> Type {
        self.bool_ty.clone()
    }

    /// The canonical structure type with the given element types.
    pub fn structure_type<I>(&self, elements: I) -> StrataResult<Type>
    where
        I: IntoIterator<Item = Type>,
    {
        self.types.intern(
            TypeKind::Structure,
            0,
            vec![],
            elements.into_iter().collect(),
        )
    }

    /// The canonical callable type taking `params` and producing `results`.
    pub fn callable_type<P, R>(&self, params: P, results: R) -> StrataResult<Type>
    where
        P: IntoIterator<Item = Type>,
        R: IntoIterator<Item = Type>,
    {
        self.types.intern(
            TypeKind::Callable,
            0,
            params.into_iter().collect(),
            results.into_iter().collect(),
        )
    }

    /// The interned identifier for `(name, scope, ty)`, if there is one.
    pub(crate) fn find_identifier(&self, name: Id, scope: Id, ty: &Type) -> Option<Ident> {
        self.identifiers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(name, scope, ty.clone()))
            .cloned()
    }

    /// Intern the identifier `(name, scope, ty)`. Requesting the same triple
    /// again returns the same [Ident].
    pub fn identifier<N, S>(&self, name: N, scope: S, ty: Type) -> Ident
    where
        N: Into<Id>,
        S: Into<Id>,
    {
        let key = (name.into(), scope.into(), ty);
        if let Some(ident) = self
            .identifiers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return ident.clone();
        }
        let mut table = self
            .identifiers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        table
            .entry(key)
            .or_insert_with_key(|(name, scope, ty)| {
                log::debug!("Interned identifier {scope}::{name}: {ty}");
                Ident::new(*name, *scope, ty.clone())
            })
            .clone()
    }

    /// Generate a context-unique label starting with `prefix`.
    pub(crate) fn label(&self, prefix: &str) -> Id {
        self.namegen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_name(prefix)
    }

    /// Create an empty module.
    pub fn module<S: Into<Id>>(&self, name: S) -> Module<'_> {
        let stamp = NEXT_MODULE.fetch_add(1, Ordering::Relaxed);
        Module::new(self, name.into(), stamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_utils::Error;

    #[test]
    fn predefined_types() {
        let ctx = Context::new();
        assert_eq!(ctx.interned_types(), 5);
        assert!(ctx.bool().is_bool());
        assert!(ctx.bit(32).unwrap().ptr_eq(&ctx.bit(32).unwrap()));
        assert_eq!(ctx.interned_types(), 5);
        ctx.bit(7).unwrap();
        assert_eq!(ctx.interned_types(), 6);
    }

    #[test]
    fn conf_clamps_width() {
        let ctx = Context::with_conf(IrConf {
            max_width: 1024,
            ..IrConf::default()
        });
        assert_eq!(ctx.conf().max_width, SIZE_MAX);

        let narrow = Context::with_conf(IrConf {
            max_width: 16,
            ..IrConf::default()
        });
        assert_eq!(narrow.interned_types(), 3);
        assert_eq!(
            narrow.bit(17).unwrap_err(),
            Error::InvalidWidth { width: 17, max: 16 }
        );
    }

    #[test]
    fn identifiers_are_interned() {
        let ctx = Context::new();
        let b8 = ctx.bit(8).unwrap();
        let a = ctx.identifier("x", "main", b8.clone());
        let b = ctx.identifier("x", "main", b8);
        let c = ctx.identifier("x", "main", ctx.bit(16).unwrap());
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn labels_are_unique() {
        let ctx = Context::new();
        assert_eq!(ctx.label("add"), "add0");
        assert_eq!(ctx.label("add"), "add1");
        assert_eq!(ctx.label("seq"), "seq0");
    }
}
