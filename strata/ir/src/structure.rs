use crate::StructureIdx;

/// A named, possibly nested aggregate declaration.
///
/// A structure is either a leaf field carrying a bit-vector type or an
/// aggregate whose type is derived from its fields when it is locked.
#[derive(Debug, Clone, Default)]
pub struct Structure {
    /// Enclosing structure. `None` for the root of a declaration.
    pub(crate) parent: Option<StructureIdx>,
    /// Fields, in declaration order.
    pub(crate) fields: Vec<StructureIdx>,
}

impl Structure {
    pub fn parent(&self) -> Option<StructureIdx> {
        self.parent
    }

    pub fn fields(&self) -> &[StructureIdx] {
        &self.fields
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
