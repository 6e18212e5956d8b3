//! IR Builder. Provides the only way to construct and link values into a
//! [Module]. Every method checks its contract and reports violations as an
//! [Error] instead of producing an ill-formed graph.
use crate::{
    kind, BinaryOp, BitValue, BlockIdx, BlockParent, Callable, CallableIdx,
    Channel, Constant, ConstantIdx, Context, FunctionIdx, Handle,
    Instruction, InstructionIdx, IntrinsicIdx, Literal, Memory, MemoryIdx,
    Module, Opcode, RefKind, Reference, ReferenceIdx, Scope, ScopeIdx,
    ScopeKind, Statement, StatementIdx, StatementKind, Structure,
    StructureIdx, StructureLiteral, Type, UnaryOp, ValueIdx, ValueKind,
    Variable, VariableIdx, Variant,
};
use itertools::Itertools;
use linked_hash_map::LinkedHashMap;
use smallvec::SmallVec;
use strata_utils::{Error, Id, StrataResult};

/// IR builder.
/// Holds exclusive access to the module while it is being constructed.
/// All methods fail with [Error::InvalidMutation] once the module has been
/// traversed.
pub struct Builder<'a, 'ctx> {
    /// Module for which this builder is constructing.
    pub module: &'a mut Module<'ctx>,
}

/// The most recently declared entry of `table`.
fn last_entry<H: Copy + Into<ValueIdx>>(table: &LinkedHashMap<Id, H>) -> Option<ValueIdx> {
    table.back().map(|(_, h)| (*h).into())
}

fn check_unique<H>(
    table: &LinkedHashMap<Id, H>,
    what: &str,
    name: Id,
) -> StrataResult<()> {
    if table.contains_key(&name) {
        Err(Error::malformed(format!("{what} `{name}' is already defined")))
    } else {
        Ok(())
    }
}

impl<'a, 'ctx> Builder<'a, 'ctx> {
    pub fn new(module: &'a mut Module<'ctx>) -> Self {
        Self { module }
    }

    fn ctx(&self) -> &'ctx Context {
        self.module.context()
    }

    /// Make `next` the sibling following `prev`.
    fn link(&mut self, prev: Option<ValueIdx>, next: ValueIdx) {
        if let Some(prev) = prev {
            self.module.value_mut(prev).next = Some(next);
        }
    }

    /// Chain `values` in order and end the chain at the last one.
    fn relink(&mut self, values: &[ValueIdx]) {
        for (prev, next) in values.iter().tuple_windows() {
            self.link(Some(*prev), *next);
        }
        if let Some(last) = values.last() {
            self.module.value_mut(*last).next = None;
        }
    }

    /// A value's type, or a [Error::TypeMismatch] naming the value.
    fn typed(&self, v: ValueIdx, role: &str) -> StrataResult<Type> {
        self.module.type_of(v).cloned().ok_or_else(|| {
            Error::type_mismatch(format!(
                "{role} `{}' has no type",
                self.module[v].name()
            ))
        })
    }
}

/// Declarations.
impl Builder<'_, '_> {
    /// Declare a root structure. Fields are added with [Builder::add_field].
    pub fn add_structure<S: Into<Id>>(&mut self, name: S) -> StrataResult<StructureIdx> {
        self.module.check_mutable("add a structure")?;
        let name = name.into();
        check_unique(&self.module.structures, "structure", name)?;
        let idx = self.module.alloc(
            name,
            None,
            ValueKind::Structure(Structure::default()),
        );
        let s = Handle::new_unchecked(idx);
        let prev = last_entry(&self.module.structures);
        self.module.structures.insert(name, s);
        self.link(prev, idx);
        Ok(s)
    }

    /// Add a field to `parent`. A field with a type is a leaf and must be a
    /// bit-vector; a field without one is an aggregate that takes fields of
    /// its own.
    pub fn add_field<S: Into<Id>>(
        &mut self,
        parent: StructureIdx,
        name: S,
        ty: Option<Type>,
    ) -> StrataResult<StructureIdx> {
        self.module.check_mutable("add a field")?;
        let name = name.into();
        if let Some(locked) = self.module.type_of(parent) {
            return Err(Error::type_locked(format!(
                "cannot add field `{name}' to `{}' of type {locked}",
                self.module[parent].name()
            )));
        }
        if let Some(ty) = &ty {
            if !ty.is_bit() {
                return Err(Error::type_mismatch(format!(
                    "leaf field `{name}' must be a bit-vector, got {ty}"
                )));
            }
        }
        let idx = self.module.alloc(
            name,
            ty,
            ValueKind::Structure(Structure {
                parent: Some(parent),
                fields: vec![],
            }),
        );
        let field = Handle::new_unchecked(idx);
        let prev = self.module.structure(parent).fields.last().copied();
        self.module.structure_mut(parent).fields.push(field);
        self.link(prev.map(ValueIdx::from), idx);
        Ok(field)
    }

    /// Compute, intern and assign the type of `s` and of all its nested
    /// fields. Locking an already locked structure returns its type.
    pub fn lock_structure(&mut self, s: StructureIdx) -> StrataResult<Type> {
        if let Some(ty) = self.module.type_of(s) {
            return Ok(ty.clone());
        }
        self.check_lockable(s)?;
        self.module.check_mutable("lock a structure")?;
        self.assign_types(s)
    }

    /// Every untyped aggregate below `s` needs at least one field.
    fn check_lockable(&self, s: StructureIdx) -> StrataResult<()> {
        if self.module.type_of(s).is_some() {
            return Ok(());
        }
        let fields = self.module.structure(s).fields();
        if fields.is_empty() {
            return Err(Error::malformed(format!(
                "structure `{}' has no fields",
                self.module[s].name()
            )));
        }
        fields.iter().try_for_each(|f| self.check_lockable(*f))
    }

    fn assign_types(&mut self, s: StructureIdx) -> StrataResult<Type> {
        if let Some(ty) = self.module.type_of(s) {
            return Ok(ty.clone());
        }
        let types = self
            .module
            .structure(s)
            .fields
            .clone()
            .into_iter()
            .map(|f| self.assign_types(f))
            .collect::<StrataResult<Vec<_>>>()?;
        let ty = self.ctx().structure_type(types)?;
        self.module.value_mut(s).set_type(ty.clone())?;
        Ok(ty)
    }

    pub fn add_variable<S: Into<Id>>(&mut self, name: S, ty: Type) -> StrataResult<VariableIdx> {
        self.declare_variable(name.into(), ty, None)
    }

    /// Declare a variable typed by the aggregate `structure`.
    pub fn add_aggregate_variable<S: Into<Id>>(
        &mut self,
        name: S,
        structure: StructureIdx,
    ) -> StrataResult<VariableIdx> {
        let ty = self.lock_structure(structure)?;
        self.declare_variable(name.into(), ty, Some(structure))
    }

    fn declare_variable(
        &mut self,
        name: Id,
        ty: Type,
        structure: Option<StructureIdx>,
    ) -> StrataResult<VariableIdx> {
        self.module.check_mutable("add a variable")?;
        check_unique(&self.module.variables, "variable", name)?;
        let idx = self.module.alloc(
            name,
            Some(ty),
            ValueKind::Variable(Variable { structure }),
        );
        let v = Handle::new_unchecked(idx);
        let prev = last_entry(&self.module.variables);
        self.module.variables.insert(name, v);
        self.link(prev, idx);
        Ok(v)
    }

    /// Declare a memory of `depth` elements of type `ty`.
    pub fn add_memory<S: Into<Id>>(
        &mut self,
        name: S,
        ty: Type,
        depth: u64,
    ) -> StrataResult<MemoryIdx> {
        self.module.check_mutable("add a memory")?;
        let name = name.into();
        check_unique(&self.module.memories, "memory", name)?;
        if depth == 0 {
            return Err(Error::malformed(format!("memory `{name}' has no elements")));
        }
        // Only the aggregate's declaration knows its field names.
        if ty.is_structure() {
            return Err(Error::type_mismatch(format!(
                "memory `{name}' must use add_aggregate_memory for {ty}"
            )));
        }
        self.declare_memory(name, ty, depth, None)
    }

    /// Declare a memory of `depth` elements of the aggregate `structure`.
    pub fn add_aggregate_memory<S: Into<Id>>(
        &mut self,
        name: S,
        structure: StructureIdx,
        depth: u64,
    ) -> StrataResult<MemoryIdx> {
        self.module.check_mutable("add a memory")?;
        let name = name.into();
        check_unique(&self.module.memories, "memory", name)?;
        if depth == 0 {
            return Err(Error::malformed(format!("memory `{name}' has no elements")));
        }
        let ty = self.lock_structure(structure)?;
        self.declare_memory(name, ty, depth, Some(structure))
    }

    fn declare_memory(
        &mut self,
        name: Id,
        ty: Type,
        depth: u64,
        structure: Option<StructureIdx>,
    ) -> StrataResult<MemoryIdx> {
        let idx = self.module.alloc(
            name,
            Some(ty),
            ValueKind::Memory(Memory { depth, structure }),
        );
        let m = Handle::new_unchecked(idx);
        let prev = last_entry(&self.module.memories);
        self.module.memories.insert(name, m);
        self.link(prev, idx);
        Ok(m)
    }

    pub fn add_function<S: Into<Id>>(&mut self, name: S) -> StrataResult<FunctionIdx> {
        self.module.check_mutable("add a function")?;
        let name = name.into();
        check_unique(&self.module.functions, "function", name)?;
        let idx = self.module.alloc(
            name,
            None,
            ValueKind::Function(Callable::default()),
        );
        let f = Handle::new_unchecked(idx);
        let prev = last_entry(&self.module.functions);
        self.module.functions.insert(name, f);
        self.link(prev, idx);
        Ok(f)
    }

    pub fn add_intrinsic<S: Into<Id>>(&mut self, name: S) -> StrataResult<IntrinsicIdx> {
        self.module.check_mutable("add an intrinsic")?;
        let name = name.into();
        check_unique(&self.module.intrinsics, "intrinsic", name)?;
        let idx = self.module.alloc(
            name,
            None,
            ValueKind::Intrinsic(Callable::default()),
        );
        let i = Handle::new_unchecked(idx);
        let prev = last_entry(&self.module.intrinsics);
        self.module.intrinsics.insert(name, i);
        self.link(prev, idx);
        Ok(i)
    }
}

/// Parameters and linkages of callables.
impl Builder<'_, '_> {
    pub fn add_input<C, S>(&mut self, callable: C, name: S, ty: Type) -> StrataResult<ReferenceIdx>
    where
        C: Into<CallableIdx>,
        S: Into<Id>,
    {
        self.add_reference(callable, name, RefKind::Input, ty)
    }

    pub fn add_output<C, S>(&mut self, callable: C, name: S, ty: Type) -> StrataResult<ReferenceIdx>
    where
        C: Into<CallableIdx>,
        S: Into<Id>,
    {
        self.add_reference(callable, name, RefKind::Output, ty)
    }

    /// Register an input or output parameter of type `ty`.
    pub fn add_reference<C, S>(
        &mut self,
        callable: C,
        name: S,
        kind: RefKind,
        ty: Type,
    ) -> StrataResult<ReferenceIdx>
    where
        C: Into<CallableIdx>,
        S: Into<Id>,
    {
        if ty.is_structure() {
            return Err(Error::type_mismatch(format!(
                "parameter `{}' must use add_aggregate_reference for {ty}",
                name.into()
            )));
        }
        self.register(callable.into(), name.into(), kind, ty, None, None)
    }

    /// Register an input or output parameter typed by `structure`.
    pub fn add_aggregate_reference<C, S>(
        &mut self,
        callable: C,
        name: S,
        kind: RefKind,
        structure: StructureIdx,
    ) -> StrataResult<ReferenceIdx>
    where
        C: Into<CallableIdx>,
        S: Into<Id>,
    {
        let ty = self.lock_structure(structure)?;
        self.register(callable.into(), name.into(), kind, ty, Some(structure), None)
    }

    /// Register a linkage slot aliasing the module variable or memory
    /// `target`. The slot takes the target's type.
    pub fn add_linkage<C, S, T>(
        &mut self,
        callable: C,
        name: S,
        target: T,
    ) -> StrataResult<ReferenceIdx>
    where
        C: Into<CallableIdx>,
        S: Into<Id>,
        T: Into<ValueIdx>,
    {
        let target = target.into();
        let structure = match &self.module[target].kind {
            ValueKind::Variable(v) => v.structure,
            ValueKind::Memory(m) => m.structure,
            _ => {
                return Err(Error::invalid_operand(format!(
                    "linkage target `{}' is a {}, expected a variable or memory",
                    self.module[target].name(),
                    self.module.variant(target)
                )));
            }
        };
        let ty = self.typed(target, "linkage target")?;
        self.register(
            callable.into(),
            name.into(),
            RefKind::Linkage,
            ty,
            structure,
            Some(target),
        )
    }

    fn register(
        &mut self,
        owner: CallableIdx,
        name: Id,
        kind: RefKind,
        ty: Type,
        structure: Option<StructureIdx>,
        target: Option<ValueIdx>,
    ) -> StrataResult<ReferenceIdx> {
        self.module.check_mutable("add a parameter")?;
        if (kind == RefKind::Linkage) != target.is_some() {
            return Err(Error::malformed(format!(
                "`{name}': linkage slots are created with add_linkage"
            )));
        }
        let callable = self.module.callable(owner);
        if callable
            .references()
            .any(|r| self.module[r].name() == name)
        {
            return Err(Error::malformed(format!(
                "`{}' already has a parameter named `{name}'",
                self.module[owner].name()
            )));
        }
        let idx = self.module.alloc(
            name,
            Some(ty),
            ValueKind::Reference(Reference {
                kind,
                owner,
                structure,
                target,
            }),
        );
        let r = Handle::new_unchecked(idx);
        let slot = self.module.callable_mut(owner).slot_mut(kind);
        let prev = slot.last().copied();
        slot.push(r);
        self.link(prev.map(ValueIdx::from), idx);
        Ok(r)
    }
}

/// Callable bodies.
impl Builder<'_, '_> {
    /// Create the root scope of `callable`'s body.
    pub fn bind_context<C: Into<CallableIdx>>(
        &mut self,
        callable: C,
        kind: ScopeKind,
    ) -> StrataResult<ScopeIdx> {
        let callable = callable.into();
        self.module.check_mutable("bind a context")?;
        if self.module.callable(callable).context.is_some() {
            return Err(Error::malformed(format!(
                "`{}' already has a context",
                self.module[callable].name()
            )));
        }
        let idx = self.module.alloc(
            Id::from(kind.prefix()),
            None,
            ValueKind::Scope(Scope::new(kind, BlockParent::Callable(callable))),
        );
        let scope = Handle::new_unchecked(idx);
        self.module.callable_mut(callable).context = Some(scope);
        Ok(scope)
    }

    /// Append a nested scope to `parent`. Its execution order is independent
    /// of the parent's: a parallel scope inside a sequential one is a single
    /// sequential step whose children run concurrently.
    pub fn add_scope(&mut self, parent: ScopeIdx, kind: ScopeKind) -> StrataResult<ScopeIdx> {
        self.module.check_mutable("add a scope")?;
        let idx = self.module.alloc(
            Id::from(kind.prefix()),
            None,
            ValueKind::Scope(Scope::new(kind, BlockParent::Scope(parent))),
        );
        let scope = Handle::new_unchecked(idx);
        self.push_block(parent, scope.upcast());
        Ok(scope)
    }

    /// Append a statement to `parent`.
    pub fn add_statement<S: Into<Id>>(
        &mut self,
        parent: ScopeIdx,
        name: S,
        kind: StatementKind,
    ) -> StrataResult<StatementIdx> {
        self.module.check_mutable("add a statement")?;
        let idx = self.module.alloc(
            name.into(),
            None,
            ValueKind::Statement(Statement::new(kind, parent)),
        );
        let stmt = Handle::new_unchecked(idx);
        self.push_block(parent, stmt.upcast());
        Ok(stmt)
    }

    fn push_block(&mut self, parent: ScopeIdx, block: BlockIdx) {
        let prev = self.module.scope(parent).children.last().copied();
        self.module.scope_mut(parent).children.push(block);
        self.link(prev.map(ValueIdx::from), block.value());
    }

    /// Add a nested scope to a branch (then, else) or loop (body) statement.
    pub fn add_arm(&mut self, stmt: StatementIdx, kind: ScopeKind) -> StrataResult<ScopeIdx> {
        self.module.check_mutable("add a nested scope")?;
        let statement = self.module.statement(stmt);
        let max = statement.kind.max_scopes();
        if statement.scopes.len() >= max {
            return Err(Error::arity(
                self.module[stmt].name(),
                format!("at most {max} nested scopes"),
                statement.scopes.len() + 1,
            ));
        }
        let prev = statement.scopes.last().copied();
        let idx = self.module.alloc(
            Id::from(kind.prefix()),
            None,
            ValueKind::Scope(Scope::new(kind, BlockParent::Statement(stmt))),
        );
        let scope = Handle::new_unchecked(idx);
        self.module.statement_mut(stmt).scopes.push(scope);
        self.link(prev.map(ValueIdx::from), idx);
        Ok(scope)
    }

    /// Append `instr` to `stmt`.
    ///
    /// The instruction and every instruction in its operand tree become owned
    /// by `stmt`. Fails with [Error::CrossStatementReference] if any of them
    /// is already owned by another statement; nothing is claimed in that
    /// case. Appending an instruction already listed in `stmt` does nothing.
    pub fn append(&mut self, stmt: StatementIdx, instr: InstructionIdx) -> StrataResult<()> {
        self.module.check_mutable("append an instruction")?;
        if self.module.statement(stmt).instructions.contains(&instr) {
            log::debug!(
                "`{}' is already in `{}'",
                self.module[instr].label(),
                self.module[stmt].label()
            );
            return Ok(());
        }

        let mut tree = vec![];
        let mut stack = vec![instr];
        while let Some(cur) = stack.pop() {
            let instruction = self.module.instruction(cur);
            match instruction.parent {
                Some(owner) if owner != stmt => {
                    return Err(Error::CrossStatementReference {
                        instruction: self.module[cur].label(),
                        owner: self.module[owner].label(),
                        target: self.module[stmt].label(),
                    });
                }
                Some(_) if cur != instr => continue,
                _ => {}
            }
            stack.extend(
                instruction
                    .operands
                    .iter()
                    .filter_map(|op| self.module.downcast::<kind::Instruction, _>(*op)),
            );
            tree.push(cur);
        }

        for cur in tree {
            self.module.instruction_mut(cur).parent = Some(stmt);
        }
        let prev = self.module.statement(stmt).instructions.last().copied();
        self.module.statement_mut(stmt).instructions.push(instr);
        self.link(prev.map(ValueIdx::from), instr.value());
        Ok(())
    }
}

/// Constants.
impl Builder<'_, '_> {
    fn push_constant(&mut self, name: Id, ty: Option<Type>, literal: Literal) -> ConstantIdx {
        let idx = self
            .module
            .alloc(name, ty, ValueKind::Constant(Constant::new(literal)));
        let c = Handle::new_unchecked(idx);
        let prev = self.module.constants.last().copied();
        self.module.constants.push(c);
        self.link(prev.map(ValueIdx::from), idx);
        c
    }

    /// A `width`-bit constant holding the low `width` bits of `value`.
    pub fn bit_constant(&mut self, width: u64, value: u64) -> StrataResult<ConstantIdx> {
        self.module.check_mutable("add a constant")?;
        let ty = self.ctx().bit(width)?;
        Ok(self.push_bits(ty, BitValue::new(width, value)))
    }

    /// A `width`-bit constant from little-endian 64-bit words.
    pub fn wide_constant(&mut self, width: u64, words: &[u64]) -> StrataResult<ConstantIdx> {
        self.module.check_mutable("add a constant")?;
        let ty = self.ctx().bit(width)?;
        Ok(self.push_bits(ty, BitValue::from_words(width, words)))
    }

    fn push_bits(&mut self, ty: Type, bits: BitValue) -> ConstantIdx {
        self.push_constant(Id::from(bits.to_string()), Some(ty), Literal::Bit(bits))
    }

    pub fn string_constant<S: AsRef<str>>(&mut self, text: S) -> StrataResult<ConstantIdx> {
        self.module.check_mutable("add a constant")?;
        let text = text.as_ref();
        let max = self.ctx().conf().max_string_len;
        if text.len() > max {
            return Err(Error::malformed(format!(
                "string constant of {} bytes exceeds the limit of {max}",
                text.len()
            )));
        }
        Ok(self.push_constant(Id::from("str"), None, Literal::String(text.into())))
    }

    /// The identifier constant for `(name, scope, ty)`. Requesting the same
    /// triple again returns the same constant.
    pub fn identifier<N, S>(&mut self, name: N, scope: S, ty: Type) -> StrataResult<ConstantIdx>
    where
        N: Into<Id>,
        S: Into<Id>,
    {
        let (name, scope) = (name.into(), scope.into());
        let known = self
            .ctx()
            .find_identifier(name, scope, &ty)
            .and_then(|ident| self.module.identifiers.get(&ident).copied());
        if let Some(c) = known {
            return Ok(c);
        }
        self.module.check_mutable("add an identifier")?;
        let ident = self.ctx().identifier(name, scope, ty);
        let c = self.push_constant(
            ident.name(),
            Some(ident.ty().clone()),
            Literal::Identifier(ident.clone()),
        );
        self.module.identifiers.insert(ident, c);
        Ok(c)
    }

    /// A literal of the aggregate `structure`.
    ///
    /// `fields` must match the structure's fields one to one, in number and
    /// type. An empty list builds zero-valued fields. The field constants
    /// become owned by the new constant and are no longer top-level.
    pub fn structure_constant(
        &mut self,
        structure: StructureIdx,
        fields: Vec<ConstantIdx>,
    ) -> StrataResult<ConstantIdx> {
        self.module.check_mutable("add a constant")?;
        let ty = self.lock_structure(structure)?;
        let decls = self.module.structure(structure).fields.clone();

        let fields = if fields.is_empty() {
            decls
                .iter()
                .map(|decl| self.zero_constant(*decl))
                .collect::<StrataResult<Vec<_>>>()?
        } else {
            if fields.len() != decls.len() {
                return Err(Error::arity(
                    self.module[structure].name(),
                    format!("{} fields", decls.len()),
                    fields.len(),
                ));
            }
            for (field, decl) in fields.iter().zip(&decls) {
                if self.module.type_of(*field) != self.module.type_of(*decl) {
                    return Err(Error::type_mismatch(format!(
                        "field `{}' of `{}' expects {}, got `{}'",
                        self.module[*decl].name(),
                        self.module[structure].name(),
                        self.module
                            .type_of(*decl)
                            .map_or("nothing".to_string(), Type::to_string),
                        self.module[*field].name()
                    )));
                }
                if let Some(owner) = self.module.constant(*field).parent {
                    return Err(Error::malformed(format!(
                        "constant `{}' is already a field of `{}'",
                        self.module[*field].label(),
                        self.module[owner].label()
                    )));
                }
            }
            if !fields.iter().all_unique() {
                return Err(Error::malformed(format!(
                    "a constant appears twice in a literal of `{}'",
                    self.module[structure].name()
                )));
            }
            fields
        };

        let name = self.module[structure].name();
        let c = self.push_constant(
            name,
            Some(ty),
            Literal::Structure(StructureLiteral {
                structure,
                fields: fields.clone(),
            }),
        );
        for field in &fields {
            self.module.constant_mut(*field).parent = Some(c);
        }
        self.relink(&fields.iter().map(|f| f.value()).collect_vec());
        self.module.constants.retain(|c| !fields.contains(c));
        let top = self.module.constants.iter().map(|c| c.value()).collect_vec();
        self.relink(&top);
        Ok(c)
    }

    fn zero_constant(&mut self, decl: StructureIdx) -> StrataResult<ConstantIdx> {
        if self.module.structure(decl).is_empty() {
            let width = self
                .module
                .type_of(decl)
                .and_then(Type::bit_width)
                .ok_or_else(|| {
                    Error::malformed(format!(
                        "field `{}' has neither a type nor fields",
                        self.module[decl].name()
                    ))
                })?;
            self.bit_constant(width, 0)
        } else {
            self.structure_constant(decl, vec![])
        }
    }
}

/// Instructions.
impl Builder<'_, '_> {
    /// Build an instruction from an opcode and its operands, checking the
    /// operand count and types. Cast, zero-extend and truncate need a target
    /// type; use [Builder::cast], [Builder::zext] and [Builder::trunc].
    pub fn instruction<I>(&mut self, op: Opcode, operands: I) -> StrataResult<InstructionIdx>
    where
        I: IntoIterator<Item = ValueIdx>,
    {
        self.build_instruction(op, operands.into_iter().collect(), None)
    }

    fn build_instruction(
        &mut self,
        op: Opcode,
        operands: SmallVec<[ValueIdx; 2]>,
        target: Option<Type>,
    ) -> StrataResult<InstructionIdx> {
        self.module.check_mutable("add an instruction")?;
        if !op.arity().admits(operands.len()) {
            return Err(Error::arity(op, op.arity(), operands.len()));
        }
        for operand in &operands {
            match self.module.variant(*operand) {
                Variant::Module | Variant::Scope(_) | Variant::Statement(_) => {
                    return Err(Error::invalid_operand(format!(
                        "`{}' ({}) cannot be an operand of `{op}'",
                        self.module[*operand].name(),
                        self.module.variant(*operand)
                    )));
                }
                _ => {}
            }
        }
        let ty = match (op.takes_target_type(), target) {
            (true, None) => {
                return Err(Error::malformed(format!(
                    "`{op}' needs an explicit target type"
                )));
            }
            (false, Some(_)) => {
                return Err(Error::malformed(format!(
                    "`{op}' does not take a target type"
                )));
            }
            (_, target) => self.infer(op, &operands, target)?,
        };
        let idx = self.module.alloc(
            Id::from(op.mnemonic()),
            ty,
            ValueKind::Instruction(Instruction {
                op,
                operands,
                parent: None,
            }),
        );
        Ok(Handle::new_unchecked(idx))
    }

    /// Operand loaded from, stored to, or allocated: storage or a field.
    fn check_storage(&self, op: Opcode, v: ValueIdx) -> StrataResult<()> {
        let is_field = matches!(
            self.module.variant(v),
            Variant::Instruction(Opcode::Binary(BinaryOp::Extract))
        );
        if self.module.is::<kind::Storage, _>(v) || is_field {
            Ok(())
        } else {
            Err(Error::invalid_operand(format!(
                "`{op}' expects storage or a field, got `{}' ({})",
                self.module[v].name(),
                self.module.variant(v)
            )))
        }
    }

    /// Validate operands and compute the result type.
    fn infer(
        &self,
        op: Opcode,
        operands: &[ValueIdx],
        target: Option<Type>,
    ) -> StrataResult<Option<Type>> {
        match op {
            Opcode::Nop | Opcode::Stream(_) => Ok(None),
            Opcode::Alloc => {
                self.check_storage(op, operands[0])?;
                self.typed(operands[0], "allocated value").map(Some)
            }
            Opcode::Call => {
                let callee = operands[0];
                if self.module.is::<kind::Callable, _>(callee) {
                    return self.module.signature(callee).map(Some);
                }
                let is_cast = matches!(
                    self.module.variant(callee),
                    Variant::Instruction(Opcode::Unary(UnaryOp::Cast))
                );
                match self.module.type_of(callee) {
                    Some(ty) if is_cast && ty.is_callable() => Ok(Some(ty.clone())),
                    _ => Err(Error::invalid_operand(format!(
                        "`{}' is not callable",
                        self.module[callee].name()
                    ))),
                }
            }
            Opcode::Unary(UnaryOp::Id) => self.typed(operands[0], "operand").map(Some),
            Opcode::Unary(UnaryOp::Load) => {
                self.check_storage(op, operands[0])?;
                self.typed(operands[0], "loaded value").map(Some)
            }
            Opcode::Unary(UnaryOp::Cast) => {
                let src = operands[0];
                let aggregate = self
                    .module
                    .type_of(src)
                    .is_some_and(Type::is_structure);
                if !(aggregate || self.module.is::<kind::Callable, _>(src)) {
                    return Err(Error::invalid_operand(format!(
                        "cannot cast `{}': only callables and aggregates can be cast",
                        self.module[src].name()
                    )));
                }
                Ok(target)
            }
            Opcode::Unary(UnaryOp::ZeroExtend | UnaryOp::Truncate) => {
                let src = self.typed(operands[0], "operand")?;
                let to = target.unwrap_or_else(|| unreachable!("checked by caller"));
                let (Some(from_w), Some(to_w)) = (src.bit_width(), to.bit_width()) else {
                    return Err(Error::type_mismatch(format!(
                        "`{op}' converts between bit-vectors, got {src} to {to}"
                    )));
                };
                let widening = op == Opcode::Unary(UnaryOp::ZeroExtend);
                if (widening && to_w < from_w) || (!widening && to_w > from_w) {
                    return Err(Error::type_mismatch(format!(
                        "`{op}' cannot convert {src} to {to}"
                    )));
                }
                Ok(Some(to))
            }
            Opcode::Binary(BinaryOp::Store) => {
                let (dest, src) = (operands[0], operands[1]);
                self.check_storage(op, dest)?;
                let dest_ty = self.typed(dest, "store destination")?;
                let src_ty = self.typed(src, "stored value")?;
                if dest_ty != src_ty {
                    return Err(Error::type_mismatch(format!(
                        "cannot store {src_ty} into `{}' of type {dest_ty}",
                        self.module[dest].name()
                    )));
                }
                Ok(None)
            }
            Opcode::Binary(BinaryOp::Extract) => {
                let (aggregate, field) = (operands[0], operands[1]);
                self.typed(aggregate, "aggregate")?;
                let field_ty = self.typed(field, "field")?;
                let decl = self.module.downcast::<kind::Structure, _>(field).ok_or_else(|| {
                    Error::invalid_operand(format!(
                        "`{}' is not a structure field",
                        self.module[field].name()
                    ))
                })?;
                let owner = self.module.aggregate_of(aggregate);
                if owner.is_none() || self.module.structure(decl).parent != owner {
                    return Err(Error::invalid_operand(format!(
                        "`{}' is not a field of `{}'",
                        self.module[field].name(),
                        self.module[aggregate].name()
                    )));
                }
                Ok(Some(field_ty))
            }
            Opcode::Binary(bin) => {
                let (lhs, rhs) = (operands[0], operands[1]);
                let lty = self.typed(lhs, "left operand")?;
                let rty = self.typed(rhs, "right operand")?;
                if !lty.is_bit() || lty != rty {
                    return Err(Error::type_mismatch(format!(
                        "`{op}' needs two bit-vectors of the same width, got {lty} and {rty}"
                    )));
                }
                if bin.is_logical() {
                    Ok(Some(self.ctx().bool()))
                } else {
                    Ok(Some(lty))
                }
            }
        }
    }

    pub fn nop(&mut self) -> StrataResult<InstructionIdx> {
        self.instruction(Opcode::Nop, [])
    }

    pub fn alloc<V: Into<ValueIdx>>(&mut self, target: V) -> StrataResult<InstructionIdx> {
        self.instruction(Opcode::Alloc, [target.into()])
    }

    pub fn call<V: Into<ValueIdx>>(&mut self, callee: V) -> StrataResult<InstructionIdx> {
        self.instruction(Opcode::Call, [callee.into()])
    }

    /// Emit `payload` on `channel`.
    pub fn stream<I>(&mut self, channel: Channel, payload: I) -> StrataResult<InstructionIdx>
    where
        I: IntoIterator<Item = ValueIdx>,
    {
        self.instruction(Opcode::Stream(channel), payload)
    }

    pub fn unary<V: Into<ValueIdx>>(&mut self, op: UnaryOp, operand: V) -> StrataResult<InstructionIdx> {
        self.instruction(Opcode::Unary(op), [operand.into()])
    }

    pub fn binary<L, R>(&mut self, op: BinaryOp, lhs: L, rhs: R) -> StrataResult<InstructionIdx>
    where
        L: Into<ValueIdx>,
        R: Into<ValueIdx>,
    {
        self.instruction(Opcode::Binary(op), [lhs.into(), rhs.into()])
    }

    pub fn load<V: Into<ValueIdx>>(&mut self, src: V) -> StrataResult<InstructionIdx> {
        self.unary(UnaryOp::Load, src)
    }

    pub fn store<D, S>(&mut self, dest: D, src: S) -> StrataResult<InstructionIdx>
    where
        D: Into<ValueIdx>,
        S: Into<ValueIdx>,
    {
        self.binary(BinaryOp::Store, dest, src)
    }

    /// Select `field` out of `aggregate`.
    pub fn extract<A: Into<ValueIdx>>(
        &mut self,
        aggregate: A,
        field: StructureIdx,
    ) -> StrataResult<InstructionIdx> {
        self.binary(BinaryOp::Extract, aggregate, field)
    }

    pub fn cast<V: Into<ValueIdx>>(&mut self, src: V, to: Type) -> StrataResult<InstructionIdx> {
        self.convert(UnaryOp::Cast, src.into(), to)
    }

    pub fn zext<V: Into<ValueIdx>>(&mut self, src: V, to: Type) -> StrataResult<InstructionIdx> {
        self.convert(UnaryOp::ZeroExtend, src.into(), to)
    }

    pub fn trunc<V: Into<ValueIdx>>(&mut self, src: V, to: Type) -> StrataResult<InstructionIdx> {
        self.convert(UnaryOp::Truncate, src.into(), to)
    }

    fn convert(&mut self, op: UnaryOp, src: ValueIdx, to: Type) -> StrataResult<InstructionIdx> {
        let mut operands = SmallVec::new();
        operands.push(src);
        self.build_instruction(Opcode::Unary(op), operands, Some(to))
    }
}
