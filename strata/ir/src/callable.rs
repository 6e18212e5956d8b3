//! Callable units and the storage they reference.
use crate::{CallableIdx, ReferenceIdx, ScopeIdx, StructureIdx, ValueIdx};

/// Role of a [Reference] in its callable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    Input,
    Output,
    /// Alias bound to a module variable or memory when the callable runs.
    Linkage,
}

/// Lifecycle of a callable's body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallableState {
    /// No context block yet.
    Unbound,
    /// Context set; the body may still grow.
    Bound,
    /// The module has been traversed; the body is frozen.
    Finalized,
}

/// Payload shared by functions and intrinsics.
#[derive(Debug, Clone, Default)]
pub struct Callable {
    pub(crate) inputs: Vec<ReferenceIdx>,
    pub(crate) outputs: Vec<ReferenceIdx>,
    pub(crate) linkages: Vec<ReferenceIdx>,
    pub(crate) context: Option<ScopeIdx>,
}

impl Callable {
    pub fn inputs(&self) -> &[ReferenceIdx] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[ReferenceIdx] {
        &self.outputs
    }

    pub fn linkages(&self) -> &[ReferenceIdx] {
        &self.linkages
    }

    /// The body, if one was bound.
    pub fn context(&self) -> Option<ScopeIdx> {
        self.context
    }

    /// Inputs, outputs and linkages in descent order.
    pub fn references(&self) -> impl Iterator<Item = ReferenceIdx> + '_ {
        self.inputs
            .iter()
            .chain(self.outputs.iter())
            .chain(self.linkages.iter())
            .copied()
    }

    pub(crate) fn slot_mut(&mut self, kind: RefKind) -> &mut Vec<ReferenceIdx> {
        match kind {
            RefKind::Input => &mut self.inputs,
            RefKind::Output => &mut self.outputs,
            RefKind::Linkage => &mut self.linkages,
        }
    }
}

/// A formal parameter or linkage slot of a callable.
#[derive(Debug, Clone)]
pub struct Reference {
    pub(crate) kind: RefKind,
    pub(crate) owner: CallableIdx,
    /// Aggregate declaration when the reference is structure typed.
    pub(crate) structure: Option<StructureIdx>,
    /// Variable or memory a linkage aliases.
    pub(crate) target: Option<ValueIdx>,
}

impl Reference {
    pub fn kind(&self) -> RefKind {
        self.kind
    }

    pub fn owner(&self) -> CallableIdx {
        self.owner
    }

    pub fn structure(&self) -> Option<StructureIdx> {
        self.structure
    }

    pub fn target(&self) -> Option<ValueIdx> {
        self.target
    }
}

/// A module-level variable.
#[derive(Debug, Clone, Default)]
pub struct Variable {
    pub(crate) structure: Option<StructureIdx>,
}

impl Variable {
    pub fn structure(&self) -> Option<StructureIdx> {
        self.structure
    }
}

/// A module-level memory of `depth` elements of the value's type.
#[derive(Debug, Clone)]
pub struct Memory {
    pub(crate) depth: u64,
    pub(crate) structure: Option<StructureIdx>,
}

impl Memory {
    pub fn depth(&self) -> u64 {
        self.depth
    }

    pub fn structure(&self) -> Option<StructureIdx> {
        self.structure
    }
}
