//! Instructions live inside statements.
use crate::{StatementIdx, ValueIdx};
use smallvec::SmallVec;
use std::fmt;

/// Output channel of a `stream` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Input,
    Output,
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Forward the operand unchanged.
    Id,
    Load,
    /// Reinterpret a callable or an aggregate as the instruction's type.
    Cast,
    ZeroExtend,
    Truncate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `store dest, src`
    Store,
    /// `extract aggregate, field`
    Extract,

    AddSigned,
    AddUnsigned,
    SubSigned,
    SubUnsigned,
    MulSigned,
    MulUnsigned,
    DivSigned,
    DivUnsigned,
    RemSigned,
    RemUnsigned,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    AShr,

    Eq,
    Ne,
    LtSigned,
    LtUnsigned,
    LeSigned,
    LeUnsigned,
    GtSigned,
    GtUnsigned,
    GeSigned,
    GeUnsigned,
    LogicalAnd,
    LogicalOr,
}

impl BinaryOp {
    /// Operators whose result has the type of the left operand.
    pub fn is_arithmetic(&self) -> bool {
        use BinaryOp::*;
        matches!(
            self,
            AddSigned
                | AddUnsigned
                | SubSigned
                | SubUnsigned
                | MulSigned
                | MulUnsigned
                | DivSigned
                | DivUnsigned
                | RemSigned
                | RemUnsigned
                | And
                | Or
                | Xor
                | Shl
                | Shr
                | AShr
        )
    }

    /// Operators producing a 1-bit result.
    pub fn is_logical(&self) -> bool {
        use BinaryOp::*;
        matches!(
            self,
            Eq | Ne
                | LtSigned
                | LtUnsigned
                | LeSigned
                | LeUnsigned
                | GtSigned
                | GtUnsigned
                | GeSigned
                | GeUnsigned
                | LogicalAnd
                | LogicalOr
        )
    }

    pub fn is_signed(&self) -> bool {
        use BinaryOp::*;
        matches!(
            self,
            AddSigned
                | SubSigned
                | MulSigned
                | DivSigned
                | RemSigned
                | AShr
                | LtSigned
                | LeSigned
                | GtSigned
                | GeSigned
        )
    }
}

/// Operation performed by an [Instruction].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Nop,
    /// Reserve storage for the operand.
    Alloc,
    /// Invoke the operand.
    Call,
    /// Formatted emission of the operands on a channel.
    Stream(Channel),
    Unary(UnaryOp),
    Binary(BinaryOp),
}

/// Number of operands an [Opcode] takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    Variadic,
}

impl Arity {
    pub fn admits(&self, count: usize) -> bool {
        match self {
            Arity::Exactly(n) => *n == count,
            Arity::Variadic => true,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(1) => write!(f, "1 operand"),
            Arity::Exactly(n) => write!(f, "{n} operands"),
            Arity::Variadic => write!(f, "any number of operands"),
        }
    }
}

impl Opcode {
    pub fn arity(&self) -> Arity {
        match self {
            Opcode::Nop => Arity::Exactly(0),
            Opcode::Alloc | Opcode::Call | Opcode::Unary(_) => Arity::Exactly(1),
            Opcode::Binary(_) => Arity::Exactly(2),
            Opcode::Stream(_) => Arity::Variadic,
        }
    }

    /// Cast, zero-extend and truncate name their result type explicitly.
    pub fn takes_target_type(&self) -> bool {
        matches!(
            self,
            Opcode::Unary(UnaryOp::Cast | UnaryOp::ZeroExtend | UnaryOp::Truncate)
        )
    }

    pub fn mnemonic(&self) -> &'static str {
        use BinaryOp::*;
        match self {
            Opcode::Nop => "nop",
            Opcode::Alloc => "alloc",
            Opcode::Call => "call",
            Opcode::Stream(Channel::Input) => "stdin",
            Opcode::Stream(Channel::Output) => "stdout",
            Opcode::Stream(Channel::Error) => "stderr",
            Opcode::Stream(Channel::Warning) => "stdwarn",
            Opcode::Unary(op) => match op {
                UnaryOp::Id => "id",
                UnaryOp::Load => "load",
                UnaryOp::Cast => "cast",
                UnaryOp::ZeroExtend => "zext",
                UnaryOp::Truncate => "trunc",
            },
            Opcode::Binary(op) => match op {
                Store => "store",
                Extract => "extract",
                AddSigned => "adds",
                AddUnsigned => "addu",
                SubSigned => "subs",
                SubUnsigned => "subu",
                MulSigned => "muls",
                MulUnsigned => "mulu",
                DivSigned => "divs",
                DivUnsigned => "divu",
                RemSigned => "rems",
                RemUnsigned => "remu",
                And => "and",
                Or => "or",
                Xor => "xor",
                Shl => "shl",
                Shr => "shr",
                AShr => "ashr",
                Eq => "eq",
                Ne => "ne",
                LtSigned => "lts",
                LtUnsigned => "ltu",
                LeSigned => "les",
                LeUnsigned => "leu",
                GtSigned => "gts",
                GtUnsigned => "gtu",
                GeSigned => "ges",
                GeUnsigned => "geu",
                LogicalAnd => "land",
                LogicalOr => "lor",
            },
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// An operation and its operands.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub(crate) op: Opcode,
    pub(crate) operands: SmallVec<[ValueIdx; 2]>,
    /// Statement this instruction was appended to, directly or as part of
    /// another instruction's operand tree.
    pub(crate) parent: Option<StatementIdx>,
}

impl Instruction {
    pub fn op(&self) -> Opcode {
        self.op
    }

    pub fn operands(&self) -> &[ValueIdx] {
        &self.operands
    }

    pub fn parent(&self) -> Option<StatementIdx> {
        self.parent
    }

    /// Channel of a stream instruction.
    pub fn channel(&self) -> Option<Channel> {
        match self.op {
            Opcode::Stream(ch) => Some(ch),
            _ => None,
        }
    }
}
