use std::{
    borrow::{Borrow, Cow},
    fmt::{Debug, Display, Formatter},
};

/// A string tag naming one concrete format or driver, e.g. `"GZIP"` or
/// `"TSK_PARTITION"`.
///
/// The well-known indicators are associated constants. Anything else can be
/// made at runtime with [`TypeIndicator::new`](#method.new); the core never
/// interprets the text, it only compares it.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "config", derive(serde::Deserialize))]
#[cfg_attr(feature = "config", serde(transparent))]
pub struct TypeIndicator(Cow<'static, str>);

macro_rules! type_indicators {
    ($($name:ident),* $(,)?) => {
        impl TypeIndicator {
            $(pub const $name: TypeIndicator =
                TypeIndicator(Cow::Borrowed(stringify!($name)));)*
        }
    };
}

type_indicators! {
    APFS, APFS_CONTAINER, BDE, BZIP2, CPIO, DATA_RANGE, EWF, EXT, FAKE, FAT,
    FVDE, GPT, GZIP, HFS, LUKSDE, MOUNT, NTFS, OS, QCOW, TAR, TSK,
    TSK_PARTITION, VHDI, VMDK, VSHADOW, XZ, ZIP,
}

impl TypeIndicator {
    pub fn new(s: impl Into<Cow<'static, str>>) -> TypeIndicator {
        TypeIndicator(s.into())
    }
    pub fn as_str(&self) -> &str { &self.0 }
    /// True for the indicators whose path specifications stand alone: a
    /// plain OS file, the in-memory fake file system, and mount points.
    /// Every other layer needs a parent.
    pub fn is_parentless(&self) -> bool {
        PARENTLESS_TYPE_INDICATORS.contains(self)
    }
}

pub static PARENTLESS_TYPE_INDICATORS: [TypeIndicator; 3] = [
    TypeIndicator::FAKE,
    TypeIndicator::MOUNT,
    TypeIndicator::OS,
];

impl Display for TypeIndicator {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, fmt)
    }
}

impl Debug for TypeIndicator {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.0, fmt)
    }
}

impl Borrow<str> for TypeIndicator {
    fn borrow(&self) -> &str { &self.0 }
}

impl From<&'static str> for TypeIndicator {
    fn from(s: &'static str) -> TypeIndicator { TypeIndicator::new(s) }
}

impl PartialEq<str> for TypeIndicator {
    fn eq(&self, other: &str) -> bool { &*self.0 == other }
}

/// A class of formats. Detection is always scoped to one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "config", derive(serde::Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
pub enum FormatCategory {
    Archive,
    CompressedStream,
    EncryptedVolume,
    FileSystem,
    StorageMediaImage,
    VolumeSystem,
}

impl FormatCategory {
    pub const ALL: &'static [FormatCategory] = &[
        FormatCategory::Archive,
        FormatCategory::CompressedStream,
        FormatCategory::EncryptedVolume,
        FormatCategory::FileSystem,
        FormatCategory::StorageMediaImage,
        FormatCategory::VolumeSystem,
    ];
    pub fn name(&self) -> &'static str {
        match self {
            FormatCategory::Archive => "archive",
            FormatCategory::CompressedStream => "compressed stream",
            FormatCategory::EncryptedVolume => "encrypted volume",
            FormatCategory::FileSystem => "file system",
            FormatCategory::StorageMediaImage => "storage media image",
            FormatCategory::VolumeSystem => "volume system",
        }
    }
}

impl Display for FormatCategory {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> std::fmt::Result {
        fmt.write_str(self.name())
    }
}

/// The kind of a file entry, as used by find specifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FileEntryType {
    Device,
    Directory,
    File,
    Link,
    Pipe,
    Socket,
}
