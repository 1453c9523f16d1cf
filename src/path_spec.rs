use crate::*;

use std::{
    fmt::{Display, Formatter},
    sync::Arc,
};
use once_cell::sync::Lazy;
use regex::Regex;

static PARTITION_LOCATION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^/p([1-9][0-9]*)$"#)
        .unwrap()
});
static VSS_STORE_LOCATION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^/vss([1-9][0-9]*)$"#)
        .unwrap()
});

/// The format-specific attributes of one layer. Which of these mean
/// anything depends entirely on the driver that consumes the layer; the
/// core only stores, compares and prints them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PathSpecAttributes {
    pub location: Option<String>,
    pub identifier: Option<String>,
    pub start_offset: Option<u64>,
    pub range_offset: Option<u64>,
    pub range_size: Option<u64>,
    pub part_index: Option<u64>,
    pub store_index: Option<u64>,
    pub inode: Option<u64>,
    pub data_stream: Option<String>,
}

impl PathSpecAttributes {
    pub fn with_location(location: impl Into<String>) -> PathSpecAttributes {
        PathSpecAttributes {
            location: Some(location.into()),
            ..Default::default()
        }
    }
    pub fn with_range(range_offset: u64, range_size: u64)
        -> PathSpecAttributes {
        PathSpecAttributes {
            range_offset: Some(range_offset),
            range_size: Some(range_size),
            ..Default::default()
        }
    }
    /// Calls `f` with the name and printed value of every attribute that is
    /// set, in a fixed order.
    fn for_each_set(&self, mut f: impl FnMut(&str, &dyn Display)) {
        macro_rules! visit {
            ($($field:ident),*) => {
                $(if let Some(value) = &self.$field {
                    f(stringify!($field), value)
                })*
            };
        }
        visit!(location, identifier, start_offset, range_offset, range_size,
               part_index, store_index, inode, data_stream);
    }
}

/// One layer of a layered address: "this segment, inside that container,
/// inside that other container, ...".
///
/// Every `PathSpec` names a type indicator, carries attributes, and (unless
/// its type is [parentless](struct.TypeIndicator.html#method.is_parentless))
/// points at the layer it lives inside. Chains are built outside-in, are
/// immutable once built, and compare structurally, so two chains built
/// separately from equal layers are equal and hash equal.
///
/// ```rust
/// # use layered_vfs::*;
/// let image = PathSpec::os("/cases/disk.qcow2").unwrap();
/// let qcow = PathSpec::new(TypeIndicator::QCOW, Default::default(),
///                          Some(image)).unwrap();
/// let partition = PathSpec::new(TypeIndicator::TSK_PARTITION,
///                               PathSpecAttributes::with_location("/p1"),
///                               Some(qcow)).unwrap();
/// assert_eq!(partition.partition_index(), Some(0));
/// assert_eq!(partition.root().type_indicator(), &TypeIndicator::OS);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathSpec {
    type_indicator: TypeIndicator,
    attributes: PathSpecAttributes,
    parent: Option<Arc<PathSpec>>,
}

impl PathSpec {
    /// Makes a new layer. Fails with `InvalidArgument` if a parentless type
    /// is given a parent, or any other type is given none.
    pub fn new(type_indicator: TypeIndicator, attributes: PathSpecAttributes,
               parent: Option<PathSpec>) -> Result<PathSpec> {
        match (type_indicator.is_parentless(), &parent) {
            (true, Some(_)) => {
                return Err(Error::InvalidArgument(format!(
                    "{} path specification cannot have a parent",
                    type_indicator)))
            },
            (false, None) => {
                return Err(Error::InvalidArgument(format!(
                    "{} path specification requires a parent",
                    type_indicator)))
            },
            _ => (),
        }
        Ok(PathSpec {
            type_indicator,
            attributes,
            parent: parent.map(Arc::new),
        })
    }
    /// Shorthand for a parentless OS layer with a location.
    pub fn os(location: impl Into<String>) -> Result<PathSpec> {
        PathSpec::new(TypeIndicator::OS,
                      PathSpecAttributes::with_location(location), None)
    }
    /// Shorthand for a parentless fake file system layer with a location.
    pub fn fake(location: impl Into<String>) -> Result<PathSpec> {
        PathSpec::new(TypeIndicator::FAKE,
                      PathSpecAttributes::with_location(location), None)
    }
    /// Makes a new layer with `self` as its parent.
    pub fn push(&self, type_indicator: TypeIndicator,
                attributes: PathSpecAttributes) -> Result<PathSpec> {
        PathSpec::new(type_indicator, attributes, Some(self.clone()))
    }
    pub fn type_indicator(&self) -> &TypeIndicator { &self.type_indicator }
    pub fn attributes(&self) -> &PathSpecAttributes { &self.attributes }
    pub fn location(&self) -> Option<&str> {
        self.attributes.location.as_deref()
    }
    pub fn parent(&self) -> Option<&PathSpec> { self.parent.as_deref() }
    pub fn has_parent(&self) -> bool { self.parent.is_some() }
    /// Iterates from this layer outward, ending with the root.
    pub fn ancestors(&self) -> Ancestors<'_> {
        Ancestors { next: Some(self) }
    }
    /// The outermost (parentless) layer.
    pub fn root(&self) -> &PathSpec {
        let mut ret = self;
        while let Some(parent) = ret.parent() { ret = parent }
        ret
    }
    /// Zero-based partition index, from `part_index` if set, otherwise from
    /// a `/pN` location.
    pub fn partition_index(&self) -> Option<u64> {
        if self.attributes.part_index.is_some() {
            return self.attributes.part_index
        }
        numbered_location(&PARTITION_LOCATION_PATTERN, self.location())
    }
    /// Zero-based volume shadow store index, from `store_index` if set,
    /// otherwise from a `/vssN` location.
    pub fn vss_store_index(&self) -> Option<u64> {
        if self.attributes.store_index.is_some() {
            return self.attributes.store_index
        }
        numbered_location(&VSS_STORE_LOCATION_PATTERN, self.location())
    }
    /// A one-line name for this layer, for messages.
    pub fn short_name(&self) -> String {
        match self.location() {
            Some(location) => format!("{}:{}", self.type_indicator, location),
            None => self.type_indicator.to_string(),
        }
    }
}

fn numbered_location(pattern: &Regex, location: Option<&str>) -> Option<u64> {
    let captures = pattern.captures(location?)?;
    captures[1].parse::<u64>().ok().map(|x| x - 1)
}

/// Prints the comparable form: one line per layer, root first.
impl Display for PathSpec {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(parent) = self.parent() {
            Display::fmt(parent, fmt)?;
        }
        write!(fmt, "type: {}", self.type_indicator)?;
        let mut result = Ok(());
        self.attributes.for_each_set(|name, value| {
            if result.is_ok() {
                result = write!(fmt, ", {}: {}", name, value);
            }
        });
        result?;
        writeln!(fmt)
    }
}

/// Iterator over a chain, innermost layer first.
pub struct Ancestors<'a> {
    next: Option<&'a PathSpec>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a PathSpec;
    fn next(&mut self) -> Option<&'a PathSpec> {
        let ret = self.next?;
        self.next = ret.parent();
        Some(ret)
    }
}
