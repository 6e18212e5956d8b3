//! Blocks nested inside a callable's body.
use crate::{CallableIdx, InstructionIdx, ScopeIdx, StatementIdx};
use smallvec::SmallVec;

/// Execution order of a scope's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// Children run one after the other, in order.
    Sequential,
    /// Children run concurrently with each other.
    Parallel,
}

impl ScopeKind {
    pub(crate) fn prefix(&self) -> &'static str {
        match self {
            ScopeKind::Sequential => "seq",
            ScopeKind::Parallel => "par",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    /// Straight-line instructions.
    Trivial,
    /// Two nested scopes; the last instruction selects one.
    Branch,
    /// One nested scope; the last instruction decides whether to continue.
    Loop,
}

impl StatementKind {
    pub(crate) fn prefix(&self) -> &'static str {
        match self {
            StatementKind::Trivial => "stmt",
            StatementKind::Branch => "branch",
            StatementKind::Loop => "loop",
        }
    }

    /// Number of nested scopes a statement of this kind may own.
    pub fn max_scopes(&self) -> usize {
        match self {
            StatementKind::Trivial => 0,
            StatementKind::Branch => 2,
            StatementKind::Loop => 1,
        }
    }
}

/// The owner of a block. Fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockParent {
    /// The block is the body of this callable.
    Callable(CallableIdx),
    Scope(ScopeIdx),
    Statement(StatementIdx),
}

/// An ordered group of blocks.
#[derive(Debug, Clone)]
pub struct Scope {
    pub(crate) kind: ScopeKind,
    pub(crate) parent: BlockParent,
    pub(crate) children: Vec<crate::BlockIdx>,
}

impl Scope {
    pub(crate) fn new(kind: ScopeKind, parent: BlockParent) -> Self {
        Self {
            kind,
            parent,
            children: vec![],
        }
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    /// True if the children of this scope execute concurrently.
    pub fn is_parallel(&self) -> bool {
        self.kind == ScopeKind::Parallel
    }

    pub fn parent(&self) -> BlockParent {
        self.parent
    }

    pub fn children(&self) -> &[crate::BlockIdx] {
        &self.children
    }
}

/// A leaf execution unit: instructions, optionally followed by nested scopes.
#[derive(Debug, Clone)]
pub struct Statement {
    pub(crate) kind: StatementKind,
    pub(crate) parent: ScopeIdx,
    pub(crate) instructions: Vec<InstructionIdx>,
    pub(crate) scopes: SmallVec<[ScopeIdx; 2]>,
}

impl Statement {
    pub(crate) fn new(kind: StatementKind, parent: ScopeIdx) -> Self {
        Self {
            kind,
            parent,
            instructions: vec![],
            scopes: SmallVec::new(),
        }
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn parent(&self) -> ScopeIdx {
        self.parent
    }

    pub fn instructions(&self) -> &[InstructionIdx] {
        &self.instructions
    }

    /// Nested scopes: `[then, else]` for a branch, `[body]` for a loop.
    pub fn scopes(&self) -> &[ScopeIdx] {
        &self.scopes
    }

    /// The condition of a branch or loop.
    pub fn condition(&self) -> Option<InstructionIdx> {
        match self.kind {
            StatementKind::Trivial => None,
            StatementKind::Branch | StatementKind::Loop => {
                self.instructions.last().copied()
            }
        }
    }
}
