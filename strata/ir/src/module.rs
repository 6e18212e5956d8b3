use crate::{
    BinaryOp, BlockIdx, BlockParent, Callable, CallableIdx, CallableState, Constant,
    ConstantIdx, Context, FunctionIdx, Handle, Ident, Instruction,
    InstructionIdx, IntrinsicIdx, Kind, Memory, MemoryIdx, ModuleIdx, Opcode,
    Reference, ReferenceIdx, Scope, ScopeIdx, Statement, StatementIdx,
    Structure, StructureIdx, Type, UnaryOp, Value, ValueIdx,
    ValueKind, Variable, VariableIdx, Variant,
};
use linked_hash_map::LinkedHashMap;
use std::collections::HashMap;
use std::ops::Index;
use std::sync::atomic::{AtomicBool, Ordering};
use strata_utils::{Error, Id, StrataResult};

/// Top-level container of a program.
///
/// A module owns every value built into it in a single arena; handles are
/// indices into that arena and carry the module's stamp. The module borrows
/// the [Context] it was created from, which owns the type and identifier
/// tables shared by all its modules.
///
/// Construction goes through a [Builder](crate::Builder) and requires
/// exclusive access. The first [traversal](crate::traversal) finalizes the
/// module: from then on it is a read-only snapshot that any number of
/// threads may walk at the same time.
pub struct Module<'ctx> {
    ctx: &'ctx Context,
    stamp: u32,
    pub(crate) values: Vec<Value>,

    pub(crate) structures: LinkedHashMap<Id, StructureIdx>,
    pub(crate) constants: Vec<ConstantIdx>,
    pub(crate) variables: LinkedHashMap<Id, VariableIdx>,
    pub(crate) memories: LinkedHashMap<Id, MemoryIdx>,
    pub(crate) intrinsics: LinkedHashMap<Id, IntrinsicIdx>,
    pub(crate) functions: LinkedHashMap<Id, FunctionIdx>,

    /// Identifier constants built in this module, by interned identity.
    pub(crate) identifiers: HashMap<Ident, ConstantIdx>,
    finalized: AtomicBool,
}

impl<'ctx> Module<'ctx> {
    pub(crate) fn new(ctx: &'ctx Context, name: Id, stamp: u32) -> Self {
        let root = Value::new(name, ctx.label("module"), None, ValueKind::Module);
        Self {
            ctx,
            stamp,
            values: vec![root],
            structures: LinkedHashMap::new(),
            constants: vec![],
            variables: LinkedHashMap::new(),
            memories: LinkedHashMap::new(),
            intrinsics: LinkedHashMap::new(),
            functions: LinkedHashMap::new(),
            identifiers: HashMap::new(),
            finalized: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> Id {
        self.values[0].name
    }

    pub fn context(&self) -> &'ctx Context {
        self.ctx
    }

    /// Handle to the module's own value.
    pub fn root(&self) -> ModuleIdx {
        Handle::new_unchecked(ValueIdx::new(0, self.stamp))
    }

    /// Number of values in the arena, including the module itself.
    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    fn slot(&self, v: ValueIdx) -> usize {
        assert!(
            v.owner() == self.stamp,
            "value {v:?} does not belong to module `{}' (stamp {})",
            self.name(),
            self.stamp
        );
        v.index()
    }

    pub(crate) fn alloc(
        &mut self,
        name: Id,
        ty: Option<Type>,
        kind: ValueKind,
    ) -> ValueIdx {
        let idx = ValueIdx::new(self.values.len(), self.stamp);
        let mut value = Value::new(name, Id::default(), ty, kind);
        value.label = self.ctx.label(value.variant().prefix());
        self.values.push(value);
        idx
    }

    pub fn value<V: Into<ValueIdx>>(&self, v: V) -> &Value {
        &self.values[self.slot(v.into())]
    }

    pub(crate) fn value_mut<V: Into<ValueIdx>>(&mut self, v: V) -> &mut Value {
        let slot = self.slot(v.into());
        &mut self.values[slot]
    }

    pub fn variant<V: Into<ValueIdx>>(&self, v: V) -> Variant {
        self.value(v).variant()
    }

    pub fn type_of<V: Into<ValueIdx>>(&self, v: V) -> Option<&Type> {
        self.value(v).ty()
    }

    /// True if `v` is a `K` or one of its descendants.
    pub fn is<K: Kind, V: Into<ValueIdx>>(&self, v: V) -> bool {
        K::admits(self.variant(v))
    }

    /// Checked downcast. Returns `None` if `v` is not admitted by `K`.
    pub fn downcast<K: Kind, V: Into<ValueIdx>>(&self, v: V) -> Option<Handle<K>> {
        let v = v.into();
        self.is::<K, _>(v).then(|| Handle::new_unchecked(v))
    }

    /// Like [Module::downcast] but reports the mismatch as an error.
    pub fn require<K: Kind, V: Into<ValueIdx>>(&self, v: V) -> StrataResult<Handle<K>> {
        let v = v.into();
        self.downcast::<K, _>(v).ok_or_else(|| {
            let value = self.value(v);
            Error::invalid_operand(format!(
                "`{}' is a {}, expected a {}",
                value.name(),
                value.variant(),
                K::NAME
            ))
        })
    }

    pub fn next_sibling<V: Into<ValueIdx>>(&self, v: V) -> Option<ValueIdx> {
        self.value(v).next
    }
}

fn wrong_kind(value: &Value, expected: &str) -> ! {
    unreachable!(
        "handle to `{}' ({}) used as {expected}",
        value.name(),
        value.variant()
    )
}

/// Payload accessors. The handle types guarantee the variant, so a mismatch
/// can only come from a bug in this crate.
impl Module<'_> {
    pub fn callable<C: Into<ValueIdx>>(&self, c: C) -> &Callable {
        let value = self.value(c);
        match &value.kind {
            ValueKind::Function(c) | ValueKind::Intrinsic(c) => c,
            _ => wrong_kind(value, "callable"),
        }
    }

    pub(crate) fn callable_mut(&mut self, c: CallableIdx) -> &mut Callable {
        let value = self.value_mut(c);
        match &mut value.kind {
            ValueKind::Function(c) | ValueKind::Intrinsic(c) => c,
            _ => unreachable!("handle used as callable"),
        }
    }

    pub fn reference(&self, r: ReferenceIdx) -> &Reference {
        let value = self.value(r);
        match &value.kind {
            ValueKind::Reference(r) => r,
            _ => wrong_kind(value, "reference"),
        }
    }

    pub fn variable(&self, v: VariableIdx) -> &Variable {
        let value = self.value(v);
        match &value.kind {
            ValueKind::Variable(v) => v,
            _ => wrong_kind(value, "variable"),
        }
    }

    pub fn memory(&self, m: MemoryIdx) -> &Memory {
        let value = self.value(m);
        match &value.kind {
            ValueKind::Memory(m) => m,
            _ => wrong_kind(value, "memory"),
        }
    }

    pub fn structure(&self, s: StructureIdx) -> &Structure {
        let value = self.value(s);
        match &value.kind {
            ValueKind::Structure(s) => s,
            _ => wrong_kind(value, "structure"),
        }
    }

    pub(crate) fn structure_mut(&mut self, s: StructureIdx) -> &mut Structure {
        match &mut self.value_mut(s).kind {
            ValueKind::Structure(s) => s,
            _ => unreachable!("handle used as structure"),
        }
    }

    pub fn constant(&self, c: ConstantIdx) -> &Constant {
        let value = self.value(c);
        match &value.kind {
            ValueKind::Constant(c) => c,
            _ => wrong_kind(value, "constant"),
        }
    }

    pub(crate) fn constant_mut(&mut self, c: ConstantIdx) -> &mut Constant {
        match &mut self.value_mut(c).kind {
            ValueKind::Constant(c) => c,
            _ => unreachable!("handle used as constant"),
        }
    }

    pub fn scope(&self, s: ScopeIdx) -> &Scope {
        let value = self.value(s);
        match &value.kind {
            ValueKind::Scope(s) => s,
            _ => wrong_kind(value, "scope"),
        }
    }

    pub(crate) fn scope_mut(&mut self, s: ScopeIdx) -> &mut Scope {
        match &mut self.value_mut(s).kind {
            ValueKind::Scope(s) => s,
            _ => unreachable!("handle used as scope"),
        }
    }

    pub fn statement(&self, s: StatementIdx) -> &Statement {
        let value = self.value(s);
        match &value.kind {
            ValueKind::Statement(s) => s,
            _ => wrong_kind(value, "statement"),
        }
    }

    pub(crate) fn statement_mut(&mut self, s: StatementIdx) -> &mut Statement {
        match &mut self.value_mut(s).kind {
            ValueKind::Statement(s) => s,
            _ => unreachable!("handle used as statement"),
        }
    }

    pub fn instruction(&self, i: InstructionIdx) -> &Instruction {
        let value = self.value(i);
        match &value.kind {
            ValueKind::Instruction(i) => i,
            _ => wrong_kind(value, "instruction"),
        }
    }

    pub(crate) fn instruction_mut(&mut self, i: InstructionIdx) -> &mut Instruction {
        match &mut self.value_mut(i).kind {
            ValueKind::Instruction(i) => i,
            _ => unreachable!("handle used as instruction"),
        }
    }

    /// The owner of a block.
    pub fn block_parent(&self, b: BlockIdx) -> BlockParent {
        let value = self.value(b);
        match &value.kind {
            ValueKind::Scope(s) => s.parent,
            ValueKind::Statement(s) => BlockParent::Scope(s.parent),
            _ => wrong_kind(value, "block"),
        }
    }
}

/// Declarations, in the order they were added.
impl Module<'_> {
    pub fn structures(&self) -> impl Iterator<Item = StructureIdx> + '_ {
        self.structures.values().copied()
    }

    /// Top-level constants. Fields of structure constants are not included.
    pub fn constants(&self) -> impl Iterator<Item = ConstantIdx> + '_ {
        self.constants.iter().copied()
    }

    pub fn variables(&self) -> impl Iterator<Item = VariableIdx> + '_ {
        self.variables.values().copied()
    }

    pub fn memories(&self) -> impl Iterator<Item = MemoryIdx> + '_ {
        self.memories.values().copied()
    }

    pub fn intrinsics(&self) -> impl Iterator<Item = IntrinsicIdx> + '_ {
        self.intrinsics.values().copied()
    }

    pub fn functions(&self) -> impl Iterator<Item = FunctionIdx> + '_ {
        self.functions.values().copied()
    }

    pub fn find_structure<S: Into<Id>>(&self, name: S) -> Option<StructureIdx> {
        self.structures.get(&name.into()).copied()
    }

    pub fn find_variable<S: Into<Id>>(&self, name: S) -> Option<VariableIdx> {
        self.variables.get(&name.into()).copied()
    }

    pub fn find_memory<S: Into<Id>>(&self, name: S) -> Option<MemoryIdx> {
        self.memories.get(&name.into()).copied()
    }

    pub fn find_intrinsic<S: Into<Id>>(&self, name: S) -> Option<IntrinsicIdx> {
        self.intrinsics.get(&name.into()).copied()
    }

    pub fn find_function<S: Into<Id>>(&self, name: S) -> Option<FunctionIdx> {
        self.functions.get(&name.into()).copied()
    }

    /// The aggregate declaration describing `v`, if `v` is structure typed.
    ///
    /// Storage reports the structure it was declared with. An `extract`
    /// reports the field it selects, and `load`/`id` forward their operand.
    pub fn aggregate_of<V: Into<ValueIdx>>(&self, v: V) -> Option<StructureIdx> {
        let v = v.into();
        match &self.value(v).kind {
            ValueKind::Reference(r) => r.structure,
            ValueKind::Variable(var) => var.structure,
            ValueKind::Memory(m) => m.structure,
            ValueKind::Structure(_) => self.downcast(v),
            ValueKind::Instruction(instr) => match instr.op {
                Opcode::Binary(BinaryOp::Extract) => {
                    self.downcast(instr.operands[1])
                }
                Opcode::Unary(UnaryOp::Load | UnaryOp::Id) => {
                    self.aggregate_of(instr.operands[0])
                }
                _ => None,
            },
            _ => None,
        }
    }
}

/// Callable bodies and the finalization state.
impl Module<'_> {
    /// Intern the type of a callable: inputs as parameters, outputs as
    /// results.
    pub fn signature<C: Into<ValueIdx>>(&self, c: C) -> StrataResult<Type> {
        let callable = self.callable(c);
        let types = |refs: &[ReferenceIdx]| -> Vec<Type> {
            refs.iter()
                .filter_map(|r| self.type_of(*r).cloned())
                .collect()
        };
        self.ctx
            .callable_type(types(&callable.inputs), types(&callable.outputs))
    }

    pub fn state<C: Into<ValueIdx>>(&self, c: C) -> CallableState {
        match self.callable(c).context {
            None => CallableState::Unbound,
            Some(_) if self.is_finalized() => CallableState::Finalized,
            Some(_) => CallableState::Bound,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::Acquire)
    }

    /// Freeze the module. Called when a traversal begins.
    pub(crate) fn finalize(&self) {
        if !self.finalized.swap(true, Ordering::AcqRel) {
            log::debug!(
                "Finalized module `{}' with {} values",
                self.name(),
                self.values.len()
            );
        }
    }

    /// Fail with [Error::InvalidMutation] once the module is finalized.
    pub(crate) fn check_mutable(&self, what: &str) -> StrataResult<()> {
        if self.is_finalized() {
            Err(Error::invalid_mutation(format!(
                "cannot {what} in module `{}' after it was traversed",
                self.name()
            )))
        } else {
            Ok(())
        }
    }
}

impl Index<ValueIdx> for Module<'_> {
    type Output = Value;

    fn index(&self, v: ValueIdx) -> &Value {
        self.value(v)
    }
}

impl<K: Kind> Index<Handle<K>> for Module<'_> {
    type Output = Value;

    fn index(&self, v: Handle<K>) -> &Value {
        self.value(v)
    }
}

#[cfg(test)]
mod tests {
    use crate::{kind, Context};

    #[test]
    #[should_panic(expected = "does not belong to module")]
    fn foreign_handle() {
        let ctx = Context::new();
        let a = ctx.module("a");
        let b = ctx.module("b");
        let _ = b.value(a.root());
    }

    #[test]
    #[should_panic(expected = "does not belong to module")]
    fn handle_from_other_context() {
        let (c1, c2) = (Context::new(), Context::new());
        let a = c1.module("a");
        let b = c2.module("b");
        let _ = b.value(a.root());
    }

    #[test]
    fn root() {
        let ctx = Context::new();
        let m = ctx.module("top");
        assert_eq!(m.name(), "top");
        assert!(m.is::<kind::Module, _>(m.root()));
        assert!(m.downcast::<kind::Block, _>(m.root()).is_none());
        assert_eq!(m.value_count(), 1);
        assert!(!m.is_finalized());
    }
}
