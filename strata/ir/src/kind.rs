//! Marker kinds of the value taxonomy.
//!
//! Each marker is an uninhabited type used as the parameter of a
//! [Handle](crate::Handle). Concrete kinds match a single [Variant]; abstract
//! kinds are the union of their children.
use crate::{
    BinaryOp, ConstantKind, Handle, Kind, Opcode, ScopeKind, StatementKind,
    SubKind, Variant,
};

macro_rules! kinds {
    ($($(#[$doc:meta])* $name:ident => |$v:ident| $body:expr;)*) => {
        $(
            $(#[$doc])*
            pub enum $name {}

            impl Kind for $name {
                const NAME: &'static str = stringify!($name);

                #[inline]
                fn admits($v: Variant) -> bool {
                    $body
                }
            }
        )*
    };
}

macro_rules! descends {
    ($($child:ident: $($parent:ident),+;)*) => {
        $($(
            impl SubKind<$parent> for $child {}

            impl From<Handle<$child>> for Handle<$parent> {
                fn from(h: Handle<$child>) -> Self {
                    h.upcast()
                }
            }
        )+)*
    };
}

kinds! {
    /// The module itself.
    Module => |v| matches!(v, Variant::Module);

    Function => |v| matches!(v, Variant::Function);
    Intrinsic => |v| matches!(v, Variant::Intrinsic);
    /// Functions and intrinsics.
    Callable => |v| Function::admits(v) || Intrinsic::admits(v);

    Reference => |v| matches!(v, Variant::Reference);
    Variable => |v| matches!(v, Variant::Variable);
    Memory => |v| matches!(v, Variant::Memory);
    /// Anything that can be loaded from or stored to.
    Storage => |v| Reference::admits(v) || Variable::admits(v) || Memory::admits(v);

    Structure => |v| matches!(v, Variant::Structure);

    BitConstant => |v| matches!(v, Variant::Constant(ConstantKind::Bit));
    StructureConstant => |v| matches!(v, Variant::Constant(ConstantKind::Structure));
    StringConstant => |v| matches!(v, Variant::Constant(ConstantKind::String));
    Identifier => |v| matches!(v, Variant::Constant(ConstantKind::Identifier));
    /// Every literal.
    Constant => |v| {
        BitConstant::admits(v)
            || StructureConstant::admits(v)
            || StringConstant::admits(v)
            || Identifier::admits(v)
    };

    SequentialScope => |v| matches!(v, Variant::Scope(ScopeKind::Sequential));
    ParallelScope => |v| matches!(v, Variant::Scope(ScopeKind::Parallel));
    Scope => |v| SequentialScope::admits(v) || ParallelScope::admits(v);

    TrivialStatement => |v| matches!(v, Variant::Statement(StatementKind::Trivial));
    BranchStatement => |v| matches!(v, Variant::Statement(StatementKind::Branch));
    LoopStatement => |v| matches!(v, Variant::Statement(StatementKind::Loop));
    Statement => |v| {
        TrivialStatement::admits(v)
            || BranchStatement::admits(v)
            || LoopStatement::admits(v)
    };

    /// Everything nested inside a callable's body.
    Block => |v| Scope::admits(v) || Statement::admits(v);

    Unary => |v| matches!(v, Variant::Instruction(Opcode::Unary(_)));
    Arithmetic => |v| matches!(v, Variant::Instruction(Opcode::Binary(op)) if op.is_arithmetic());
    Logical => |v| matches!(v, Variant::Instruction(Opcode::Binary(op)) if op.is_logical());
    Binary => |v| {
        Arithmetic::admits(v)
            || Logical::admits(v)
            || matches!(
                v,
                Variant::Instruction(Opcode::Binary(BinaryOp::Store | BinaryOp::Extract))
            )
    };
    Instruction => |v| matches!(v, Variant::Instruction(_));
}

descends! {
    Function: Callable;
    Intrinsic: Callable;
    Reference: Storage;
    Variable: Storage;
    Memory: Storage;
    BitConstant: Constant;
    StructureConstant: Constant;
    StringConstant: Constant;
    Identifier: Constant;
    SequentialScope: Scope, Block;
    ParallelScope: Scope, Block;
    Scope: Block;
    TrivialStatement: Statement, Block;
    BranchStatement: Statement, Block;
    LoopStatement: Statement, Block;
    Statement: Block;
    Unary: Instruction;
    Arithmetic: Binary, Instruction;
    Logical: Binary, Instruction;
    Binary: Instruction;
}
