//! This is the core of a read-only, layered virtual filesystem. It lets you
//! address data nested arbitrarily deep inside containers (a file, inside a
//! tarball, inside a gzip stream, inside a partition, inside a disk image...)
//! with one composable address, find out which container formats a stream
//! holds without knowing beforehand, and search the file systems you reach
//! that way.
//!
//! It does not read any particular on-disk format itself. Concrete readers
//! plug in behind two narrow traits,
//! [`StreamBackend`](trait.StreamBackend.html) and
//! [`FileSystem`](trait.FileSystem.html).
//!
//! # Overview
//!
//! ## Path specifications
//!
//! A [`PathSpec`](struct.PathSpec.html) is one layer of an address: a type
//! indicator (`"OS"`, `"GZIP"`, `"TSK_PARTITION"`...), some attributes (a
//! location, a byte range, a partition index...) and the layer it sits
//! inside. Only a few types (plain OS files, the in-memory fake file
//! system, mount points) stand alone; every other layer must have a parent,
//! and construction enforces that.
//!
//! Path specifications are immutable and compare structurally. Equal chains
//! are equal, hash equally, and print the same comparable form.
//!
//! ## Detection
//!
//! An [`Analyzer`](struct.Analyzer.html) holds a registry of
//! [`AnalyzerHelper`](struct.AnalyzerHelper.html)s, one per format. A helper
//! offers fixed signatures, a heuristic, or both. Asking the analyzer what a
//! stream is, for one [`FormatCategory`](enum.FormatCategory.html), runs
//! every signature of the category in a single pass and every heuristic of
//! the category, and reports the union in registration order. When several
//! equivalent drivers match, the configured
//! [`BackEndPreference`](struct.BackEndPreference.html)s pick one.
//!
//! Signature stores and scanners are built per category on first use and
//! cached until registration changes.
//!
//! ## Searching
//!
//! A [`FileSystemSearcher`](struct.FileSystemSearcher.html) walks a file
//! system depth first and yields the path specification of every entry that
//! satisfies a [`FindSpec`](struct.FindSpec.html): a location (literal or
//! per-segment regex), a set of entry kinds, and an allocation state.
//! Subtrees that cannot be on a find spec's location are never entered, and
//! subtrees whose enumeration is refused are skipped.
//!
//! A [`WindowsPathResolver`](struct.WindowsPathResolver.html) turns
//! `C:\Windows\System32`-style paths into path specifications on a file
//! system and back, and a [`VolumeScanner`](struct.VolumeScanner.html) walks
//! a whole source down through images, partitions, shadow copies and
//! encrypted volumes to the file systems inside.
//!
//! # Example
//!
//! ```rust
//! # use layered_vfs::*;
//! # use std::sync::Arc;
//! let fs = FakeFileSystem::from_listing(&[
//!     ("/logs/", b""),
//!     ("/logs/syslog.gz", b"\x1f\x8b\x08\x00 and so on"),
//!     ("/logs/syslog", b"plain text"),
//! ]).unwrap();
//! let resolver = Resolver::new();
//! resolver.register_backend(TypeIndicator::FAKE, Arc::new(fs.clone()))
//!     .unwrap();
//! let analyzer = Analyzer::with_default_helpers().unwrap();
//!
//! let searcher = FileSystemSearcher::new(&fs, PathSpec::fake("/").unwrap())
//!     .unwrap();
//! let files = FindSpec::new(FindSpecOptions {
//!     file_entry_types: Some([FileEntryType::File].into()),
//!     ..Default::default()
//! }).unwrap();
//! let mut compressed = vec![];
//! for path_spec in searcher.find(vec![files]).unwrap() {
//!     let path_spec = path_spec.unwrap();
//!     let found = analyzer
//!         .get_compressed_stream_type_indicators(&resolver, &path_spec)
//!         .unwrap();
//!     if found == [TypeIndicator::GZIP] {
//!         compressed.push(path_spec.location().unwrap().to_string());
//!     }
//! }
//! assert_eq!(compressed, ["/logs/syslog.gz"]);
//! ```

mod error;
pub use error::*;

mod definitions;
pub use definitions::*;

mod path_spec;
pub use path_spec::*;

mod specification;
pub use specification::*;

mod scanner;
pub use scanner::*;

mod resolver;
pub use resolver::*;

mod analyzer;
pub use analyzer::*;

mod file_system;
pub use file_system::*;

mod find_spec;
pub use find_spec::*;

mod searcher;
pub use searcher::*;

mod windows_path_resolver;
pub use windows_path_resolver::*;

mod volume_scanner;
pub use volume_scanner::*;

mod encryption;
pub use encryption::*;

#[cfg(feature = "fake")]
mod fake;
#[cfg(feature = "fake")]
pub use fake::*;
