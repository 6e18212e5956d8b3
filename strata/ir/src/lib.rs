//! Structural intermediate representation for the Strata code generator.
//!
//! A program is a [Module] built through a [Builder]: declarations
//! (structures, constants, variables, memories) and callable units whose
//! bodies are trees of scopes and statements holding instructions. Scopes are
//! either sequential or parallel, so the same tree can be lowered to
//! imperative code or to concurrent hardware.
//!
//! Backends walk a module with [traversal::traverse] and a
//! [traversal::Visitor].

// Modules defining internal structures.
mod builder;
mod callable;
mod common;
mod constant;
mod context;
mod control;
mod instruction;
mod module;
mod structure;
mod types;
mod value;

/// Marker kinds used to parameterize [Handle].
pub mod kind;
/// Depth-first walks over a module.
pub mod traversal;

pub use builder::Builder;
pub use callable::{Callable, CallableState, Memory, RefKind, Reference, Variable};
pub use common::{Handle, Kind, SubKind, ValueIdx};
pub use constant::{
    BitValue, Constant, ConstantKind, Ident, Literal, StructureLiteral,
};
pub use context::{Context, IrConf};
pub use control::{BlockParent, Scope, ScopeKind, Statement, StatementKind};
pub use instruction::{Arity, BinaryOp, Channel, Instruction, Opcode, UnaryOp};
pub use module::Module;
pub use structure::Structure;
pub use types::{Type, TypeKind, TypeSketch, SIZE_MAX};
pub use value::{Value, ValueKind, Variant};

pub use strata_utils::{Error, GetName, Id, StrataResult};

pub type ModuleIdx = Handle<kind::Module>;
pub type CallableIdx = Handle<kind::Callable>;
pub type FunctionIdx = Handle<kind::Function>;
pub type IntrinsicIdx = Handle<kind::Intrinsic>;
pub type ReferenceIdx = Handle<kind::Reference>;
pub type VariableIdx = Handle<kind::Variable>;
pub type MemoryIdx = Handle<kind::Memory>;
pub type StorageIdx = Handle<kind::Storage>;
pub type StructureIdx = Handle<kind::Structure>;
pub type ConstantIdx = Handle<kind::Constant>;
pub type BlockIdx = Handle<kind::Block>;
pub type ScopeIdx = Handle<kind::Scope>;
pub type StatementIdx = Handle<kind::Statement>;
pub type InstructionIdx = Handle<kind::Instruction>;
