use crate::{
    Callable, Constant, ConstantKind, Instruction, Memory, Opcode, Reference,
    Scope, ScopeKind, Statement, StatementKind, Structure, Type, ValueIdx,
    Variable,
};
use std::fmt;
use strata_utils::{Error, GetName, Id, StrataResult};

/// The discriminant identifying the concrete kind of a [Value].
///
/// Fixed at construction. Dispatch sites match on it exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    Module,
    Function,
    Intrinsic,
    Reference,
    Variable,
    Memory,
    Structure,
    Constant(ConstantKind),
    Scope(ScopeKind),
    Statement(StatementKind),
    Instruction(Opcode),
}

impl Variant {
    /// Prefix used when generating labels for values of this kind.
    pub fn prefix(&self) -> &'static str {
        match self {
            Variant::Module => "module",
            Variant::Function => "fn",
            Variant::Intrinsic => "intr",
            Variant::Reference => "ref",
            Variant::Variable => "var",
            Variant::Memory => "mem",
            Variant::Structure => "struct",
            Variant::Constant(kind) => kind.prefix(),
            Variant::Scope(kind) => kind.prefix(),
            Variant::Statement(kind) => kind.prefix(),
            Variant::Instruction(op) => op.mnemonic(),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Kind-specific payload of a [Value].
#[derive(Debug)]
pub enum ValueKind {
    Module,
    Function(Callable),
    Intrinsic(Callable),
    Reference(Reference),
    Variable(Variable),
    Memory(Memory),
    Structure(Structure),
    Constant(Constant),
    Scope(Scope),
    Statement(Statement),
    Instruction(Instruction),
}

/// A node of the IR.
#[derive(Debug)]
pub struct Value {
    pub(crate) name: Id,
    pub(crate) label: Id,
    pub(crate) ty: Option<Type>,
    /// The next sibling in the ordered container this value was added to.
    pub(crate) next: Option<ValueIdx>,
    pub(crate) kind: ValueKind,
}

impl Value {
    pub(crate) fn new(name: Id, label: Id, ty: Option<Type>, kind: ValueKind) -> Self {
        Self {
            name,
            label,
            ty,
            next: None,
            kind,
        }
    }

    pub fn name(&self) -> Id {
        self.name
    }

    /// Unique label generated by the context. Only meant for emission.
    pub fn label(&self) -> Id {
        self.label
    }

    pub fn ty(&self) -> Option<&Type> {
        self.ty.as_ref()
    }

    pub fn next(&self) -> Option<ValueIdx> {
        self.next
    }

    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    pub fn variant(&self) -> Variant {
        match &self.kind {
            ValueKind::Module => Variant::Module,
            ValueKind::Function(_) => Variant::Function,
            ValueKind::Intrinsic(_) => Variant::Intrinsic,
            ValueKind::Reference(_) => Variant::Reference,
            ValueKind::Variable(_) => Variant::Variable,
            ValueKind::Memory(_) => Variant::Memory,
            ValueKind::Structure(_) => Variant::Structure,
            ValueKind::Constant(c) => Variant::Constant(c.kind()),
            ValueKind::Scope(s) => Variant::Scope(s.kind),
            ValueKind::Statement(s) => Variant::Statement(s.kind),
            ValueKind::Instruction(i) => Variant::Instruction(i.op),
        }
    }

    /// Assign the value's type. A type can only be assigned once.
    pub(crate) fn set_type(&mut self, ty: Type) -> StrataResult<()> {
        if let Some(prev) = &self.ty {
            return Err(Error::type_locked(format!(
                "`{}' already has type {prev}",
                self.name
            )));
        }
        self.ty = Some(ty);
        Ok(())
    }
}

impl GetName for Value {
    fn name(&self) -> Id {
        self.name()
    }
}
