use crate::*;

use std::{
    collections::{BTreeSet, HashMap},
};

/// Where a signature sits in a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureOffset {
    /// This many bytes after the start of the stream.
    Start(u64),
    /// This many bytes before the end of the stream. The pattern must fit,
    /// so the distance is at least the pattern length.
    End(u64),
}

impl SignatureOffset {
    /// Absolute position of a pattern in a stream of the given size, or
    /// `None` if a pattern of `pattern_len` bytes cannot fit there.
    pub fn resolve(&self, stream_size: u64, pattern_len: usize)
        -> Option<u64> {
        let pattern_len = pattern_len as u64;
        let position = match *self {
            SignatureOffset::Start(x) => x,
            SignatureOffset::End(x) => stream_size.checked_sub(x)?,
        };
        if position.checked_add(pattern_len)? > stream_size { None }
        else { Some(position) }
    }
}

/// A fixed byte pattern expected at a fixed offset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    pattern: Vec<u8>,
    offset: SignatureOffset,
}

impl Signature {
    pub fn new(pattern: impl Into<Vec<u8>>, offset: SignatureOffset)
        -> Result<Signature> {
        let pattern = pattern.into();
        if pattern.is_empty() {
            return Err(Error::InvalidArgument("empty signature pattern"
                                              .to_string()))
        }
        if let SignatureOffset::End(x) = offset {
            if x < pattern.len() as u64 {
                return Err(Error::InvalidArgument(format!(
                    "signature of {} bytes cannot start {} bytes before the \
                     end", pattern.len(), x)))
            }
        }
        Ok(Signature { pattern, offset })
    }
    pub fn pattern(&self) -> &[u8] { &self.pattern }
    pub fn offset(&self) -> SignatureOffset { self.offset }
}

/// Declares how one type indicator is recognised: zero or more signatures,
/// and the categories the type belongs to.
///
/// A specification with no signatures can only be found heuristically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSpecification {
    type_indicator: TypeIndicator,
    signatures: Vec<Signature>,
    categories: BTreeSet<FormatCategory>,
}

impl FormatSpecification {
    pub fn new(type_indicator: TypeIndicator,
               categories: impl IntoIterator<Item=FormatCategory>)
        -> FormatSpecification {
        FormatSpecification {
            type_indicator,
            signatures: vec![],
            categories: categories.into_iter().collect(),
        }
    }
    /// Appends a signature. Order is kept.
    pub fn add_signature(&mut self, pattern: impl Into<Vec<u8>>,
                         offset: SignatureOffset) -> Result<&mut Self> {
        self.signatures.push(Signature::new(pattern, offset)?);
        Ok(self)
    }
    /// Builder-style [`add_signature`](#method.add_signature).
    pub fn with_signature(mut self, pattern: impl Into<Vec<u8>>,
                          offset: SignatureOffset)
        -> Result<FormatSpecification> {
        self.add_signature(pattern, offset)?;
        Ok(self)
    }
    pub fn type_indicator(&self) -> &TypeIndicator { &self.type_indicator }
    pub fn signatures(&self) -> &[Signature] { &self.signatures }
    pub fn categories(&self) -> &BTreeSet<FormatCategory> { &self.categories }
    pub fn is_signature_detectable(&self) -> bool {
        !self.signatures.is_empty()
    }
}

/// A set of format specifications keyed by type indicator. Iteration order
/// is insertion order.
#[derive(Debug, Clone, Default)]
pub struct FormatSpecificationStore {
    specifications: Vec<FormatSpecification>,
    index: HashMap<TypeIndicator, usize>,
}

impl FormatSpecificationStore {
    pub fn new() -> FormatSpecificationStore {
        FormatSpecificationStore::default()
    }
    pub fn add_specification(&mut self, specification: FormatSpecification)
        -> Result<()> {
        if self.index.contains_key(specification.type_indicator()) {
            return Err(Error::DuplicateEntry(format!(
                "format specification for {} already in store",
                specification.type_indicator())))
        }
        self.index.insert(specification.type_indicator().clone(),
                          self.specifications.len());
        self.specifications.push(specification);
        Ok(())
    }
    /// Fails with `NotFound` if nothing is stored for `type_indicator`.
    pub fn lookup(&self, type_indicator: &TypeIndicator)
        -> Result<&FormatSpecification> {
        self.index.get(type_indicator)
            .map(|&i| &self.specifications[i])
            .ok_or_else(|| Error::NotFound(format!(
                "no format specification for {}", type_indicator)))
    }
    pub fn iter(&self) -> std::slice::Iter<'_, FormatSpecification> {
        self.specifications.iter()
    }
    pub fn len(&self) -> usize { self.specifications.len() }
    pub fn is_empty(&self) -> bool { self.specifications.is_empty() }
    /// Position of `type_indicator` in insertion order.
    pub fn position(&self, type_indicator: &TypeIndicator) -> Option<usize> {
        self.index.get(type_indicator).copied()
    }
}
