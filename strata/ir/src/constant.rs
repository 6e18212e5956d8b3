//! Literal values.
use crate::{ConstantIdx, StructureIdx, Type};
use itertools::Itertools;
use smallvec::SmallVec;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use strata_utils::Id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstantKind {
    Bit,
    Structure,
    String,
    Identifier,
}

impl ConstantKind {
    pub(crate) fn prefix(&self) -> &'static str {
        match self {
            ConstantKind::Bit => "const",
            ConstantKind::Structure => "sconst",
            ConstantKind::String => "str",
            ConstantKind::Identifier => "ident",
        }
    }
}

/// An unsigned bit-vector payload, masked to its width.
///
/// Stored as little-endian 64-bit words: word 0 holds bits `0..64`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BitValue {
    width: u64,
    words: SmallVec<[u64; 4]>,
}

impl BitValue {
    /// Build a value of `width` bits from `value`, keeping only the low
    /// `width` bits.
    pub(crate) fn new(width: u64, value: u64) -> Self {
        Self::from_words(width, &[value])
    }

    /// Build a value from little-endian words. Missing words are zero and
    /// bits above `width` are discarded.
    pub(crate) fn from_words(width: u64, words: &[u64]) -> Self {
        let len = width.div_ceil(64) as usize;
        let mut words: SmallVec<[u64; 4]> = words
            .iter()
            .copied()
            .chain(std::iter::repeat(0))
            .take(len)
            .collect();
        let rem = width % 64;
        if rem != 0 {
            if let Some(last) = words.last_mut() {
                *last &= (1u64 << rem) - 1;
            }
        }
        Self { width, words }
    }

    pub fn width(&self) -> u64 {
        self.width
    }

    /// The low 64 bits of the value.
    pub fn as_u64(&self) -> u64 {
        self.words.first().copied().unwrap_or(0)
    }

    /// The value if it fits in 64 bits.
    pub fn to_u64(&self) -> Option<u64> {
        if self.words.iter().skip(1).all(|w| *w == 0) {
            Some(self.as_u64())
        } else {
            None
        }
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    pub fn is_zero(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }
}

impl fmt::Display for BitValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_u64() {
            Some(v) => write!(f, "{}'d{}", self.width, v),
            None => write!(
                f,
                "{}'h{}",
                self.width,
                self.words.iter().rev().map(|w| format!("{w:016x}")).join("")
            ),
        }
    }
}

impl fmt::Debug for BitValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

struct IdentData {
    name: Id,
    scope: Id,
    ty: Type,
}

/// An interned `(name, scope, type)` triple. Two identifiers are equal only
/// if they are the same interned instance.
#[derive(Clone)]
pub struct Ident(Arc<IdentData>);

impl Ident {
    pub(crate) fn new(name: Id, scope: Id, ty: Type) -> Self {
        Self(Arc::new(IdentData { name, scope, ty }))
    }

    pub fn name(&self) -> Id {
        self.0.name
    }

    pub fn scope(&self) -> Id {
        self.0.scope
    }

    pub fn ty(&self) -> &Type {
        &self.0.ty
    }
}

impl PartialEq for Ident {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Ident {}

impl Hash for Ident {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Arc::as_ptr(&self.0), state)
    }
}

impl fmt::Debug for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}: {}", self.0.scope, self.0.name, self.0.ty)
    }
}

/// Fields of a structure literal, one per field of its [Structure](crate::Structure).
#[derive(Debug, Clone)]
pub struct StructureLiteral {
    pub(crate) structure: StructureIdx,
    pub(crate) fields: Vec<ConstantIdx>,
}

impl StructureLiteral {
    pub fn structure(&self) -> StructureIdx {
        self.structure
    }

    pub fn fields(&self) -> &[ConstantIdx] {
        &self.fields
    }
}

#[derive(Debug, Clone)]
pub enum Literal {
    Bit(BitValue),
    Structure(StructureLiteral),
    String(Box<str>),
    Identifier(Ident),
}

/// Payload of a constant value.
#[derive(Debug, Clone)]
pub struct Constant {
    pub(crate) literal: Literal,
    /// Structure constant this constant is a field of.
    pub(crate) parent: Option<ConstantIdx>,
}

impl Constant {
    pub(crate) fn new(literal: Literal) -> Self {
        Self {
            literal,
            parent: None,
        }
    }

    pub fn kind(&self) -> ConstantKind {
        match &self.literal {
            Literal::Bit(_) => ConstantKind::Bit,
            Literal::Structure(_) => ConstantKind::Structure,
            Literal::String(_) => ConstantKind::String,
            Literal::Identifier(_) => ConstantKind::Identifier,
        }
    }

    pub fn literal(&self) -> &Literal {
        &self.literal
    }

    pub fn parent(&self) -> Option<ConstantIdx> {
        self.parent
    }

    pub fn as_bits(&self) -> Option<&BitValue> {
        match &self.literal {
            Literal::Bit(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_structure(&self) -> Option<&StructureLiteral> {
        match &self.literal {
            Literal::Structure(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.literal {
            Literal::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_ident(&self) -> Option<&Ident> {
        match &self.literal {
            Literal::Identifier(i) => Some(i),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masking() {
        assert_eq!(BitValue::new(8, 200).as_u64(), 200);
        assert_eq!(BitValue::new(8, 300).as_u64(), 44);
        assert_eq!(BitValue::new(64, u64::MAX).as_u64(), u64::MAX);
        assert_eq!(BitValue::new(1, 2).as_u64(), 0);
        assert!(BitValue::new(4, 16).is_zero());
    }

    #[test]
    fn wide_values() {
        let v = BitValue::from_words(72, &[1, u64::MAX, 7]);
        assert_eq!(v.words(), &[1, 0xff]);
        assert_eq!(v.to_u64(), None);
        assert_eq!(v.to_string(), "72'h00000000000000ff0000000000000001");

        let short = BitValue::from_words(130, &[5]);
        assert_eq!(short.words(), &[5, 0, 0]);
        assert_eq!(short.to_u64(), Some(5));
        assert_eq!(short.to_string(), "130'd5");
    }
}
