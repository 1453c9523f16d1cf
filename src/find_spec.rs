use crate::*;

use std::collections::BTreeSet;
use once_cell::unsync::OnceCell;
use regex::{Regex, RegexBuilder};
use unicode_normalization::UnicodeNormalization;

/// A location constraint, either as one path (split on
/// [`initialize`](struct.FindSpec.html#method.initialize) with the file
/// system's own separator) or as ready-made segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Path(String),
    Segments(Vec<String>),
}

impl From<&str> for Location {
    fn from(path: &str) -> Location { Location::Path(path.to_string()) }
}

impl From<String> for Location {
    fn from(path: String) -> Location { Location::Path(path) }
}

impl From<Vec<String>> for Location {
    fn from(segments: Vec<String>) -> Location { Location::Segments(segments) }
}

impl From<&[&str]> for Location {
    fn from(segments: &[&str]) -> Location {
        Location::Segments(segments.iter().map(|x| x.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Location {
    fn from(segments: [&str; N]) -> Location {
        Location::from(&segments[..])
    }
}

/// What a find specification wants of an entry's allocation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Allocation {
    #[default]
    Any,
    Allocated,
    Unallocated,
}

/// Construction options for a [`FindSpec`](struct.FindSpec.html).
///
/// `location` and `location_regex` are mutually exclusive.
#[derive(Debug, Clone)]
pub struct FindSpecOptions {
    pub location: Option<Location>,
    pub location_regex: Option<Location>,
    /// `None` means any kind of entry.
    pub file_entry_types: Option<BTreeSet<FileEntryType>>,
    pub allocation: Allocation,
    pub case_sensitive: bool,
}

impl Default for FindSpecOptions {
    fn default() -> FindSpecOptions {
        FindSpecOptions {
            location: None,
            location_regex: None,
            file_entry_types: None,
            allocation: Allocation::Any,
            case_sensitive: true,
        }
    }
}

struct Segment {
    text: String,
    /// Literal text, NFD normalised and (if case-insensitive) lower-cased.
    folded: OnceCell<String>,
    /// `None` if the text is not a valid regex.
    regex: OnceCell<Option<Regex>>,
}

impl Segment {
    fn new(text: String) -> Segment {
        Segment { text, folded: OnceCell::new(), regex: OnceCell::new() }
    }
}

/// Canonical form of a name for comparison.
pub(crate) fn fold(name: &str, case_sensitive: bool) -> String {
    if case_sensitive { name.nfd().collect() }
    else { name.nfd().collect::<String>().to_lowercase() }
}

/// A query describing which entries of a file system tree are of interest:
/// by path (literal or per-segment regex), by kind, and by allocation.
///
/// ```rust
/// # use layered_vfs::*;
/// let find_spec = FindSpec::new(FindSpecOptions {
///     location: Some(["Windows", "System32"].into()),
///     case_sensitive: false,
///     ..Default::default()
/// }).unwrap();
/// assert!(find_spec.at_maximum_depth(2));
/// ```
pub struct FindSpec {
    location: Option<Location>,
    is_regex: bool,
    file_entry_types: Option<BTreeSet<FileEntryType>>,
    allocation: Allocation,
    case_sensitive: bool,
    segments: Option<Vec<Segment>>,
}

impl Default for FindSpec {
    /// Matches every entry.
    fn default() -> FindSpec {
        FindSpec {
            location: None,
            is_regex: false,
            file_entry_types: None,
            allocation: Allocation::Any,
            case_sensitive: true,
            segments: None,
        }
    }
}

impl FindSpec {
    /// Fails with `InvalidArgument` if both `location` and `location_regex`
    /// are given.
    pub fn new(options: FindSpecOptions) -> Result<FindSpec> {
        let (location, is_regex) = match (options.location,
                                          options.location_regex) {
            (Some(_), Some(_)) => {
                return Err(Error::InvalidArgument(
                    "location and location_regex cannot be used at the same \
                     time".to_string()))
            },
            (Some(x), None) => (Some(x), false),
            (None, Some(x)) => (Some(x), true),
            (None, None) => (None, false),
        };
        let mut ret = FindSpec {
            location,
            is_regex,
            file_entry_types: options.file_entry_types,
            allocation: options.allocation,
            case_sensitive: options.case_sensitive,
            segments: None,
        };
        // Usable before `initialize`, with `/` as the separator.
        ret.segments = ret.location.as_ref().map(|location| match location {
            Location::Path(path) => path.split('/').filter(|x| !x.is_empty())
                .map(str::to_string).collect(),
            Location::Segments(x) => x.clone(),
        }).map(|x: Vec<String>| x.into_iter().map(Segment::new).collect());
        Ok(ret)
    }
    /// Splits the location into segments with the file system's own rules.
    /// The segment count is fixed from here on.
    pub fn initialize(&mut self, file_system: &dyn FileSystem) {
        if let Some(Location::Path(path)) = &self.location {
            self.segments = Some(file_system.split_path(path).into_iter()
                                 .map(Segment::new).collect());
        }
    }
    pub fn has_location(&self) -> bool { self.segments.is_some() }
    pub fn number_of_segments(&self) -> usize {
        self.segments.as_ref().map(Vec::len).unwrap_or(0)
    }
    /// True iff this find spec has a location and `depth` is its segment count,
    /// i.e. nothing deeper can match.
    pub fn at_maximum_depth(&self, depth: usize) -> bool {
        match &self.segments {
            Some(segments) => depth == segments.len(),
            None => false,
        }
    }
    /// Does `entry`, found at `depth` (0 being the search root), satisfy
    /// every constraint of this find spec?
    pub fn matches(&self, entry: &dyn FileEntry, depth: usize) -> bool {
        self.matches_with_location(entry, depth).0
    }
    /// Like [`matches`](#method.matches), and also whether `entry` lies on
    /// the location's path, i.e. whether anything below it can still match.
    /// The second value is `None` if this find spec has no location.
    pub fn matches_with_location(&self, entry: &dyn FileEntry, depth: usize)
        -> (bool, Option<bool>) {
        let mut location_match = None;
        if let Some(segments) = &self.segments {
            if depth > segments.len() { return (false, Some(false)) }
            // The root has no segment and no name to check.
            if depth > 0 && !self.segment_matches(&segments[depth - 1],
                                                  entry.name()) {
                return (false, Some(false))
            }
            location_match = Some(true);
            // Ancestors of the target match by name but are not the target.
            if depth != segments.len() { return (false, location_match) }
        }
        if let Some(types) = &self.file_entry_types {
            if !types.contains(&entry.entry_type()) {
                return (false, location_match)
            }
        }
        let allocation_match = match self.allocation {
            Allocation::Any => true,
            Allocation::Allocated => entry.is_allocated(),
            Allocation::Unallocated => !entry.is_allocated(),
        };
        (allocation_match, location_match)
    }
    fn segment_matches(&self, segment: &Segment, name: &str) -> bool {
        if self.is_regex {
            let regex = segment.regex.get_or_init(|| {
                let pattern = format!(r"\A(?:{})\z", segment.text);
                match RegexBuilder::new(&pattern)
                    .case_insensitive(!self.case_sensitive)
                    .dot_matches_new_line(true)
                    .unicode(true)
                    .build() {
                        Ok(x) => Some(x),
                        Err(x) => {
                            log::warn!("find spec segment {:?} never \
                                        matches: {}", segment.text, x);
                            None
                        },
                }
            });
            match regex {
                Some(regex) => regex.is_match(name),
                None => false,
            }
        }
        else {
            let folded = segment.folded.get_or_init(|| {
                fold(&segment.text, self.case_sensitive)
            });
            *folded == fold(name, self.case_sensitive)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    /// A detached entry for exercising matchers.
    struct Entry {
        name: &'static str,
        entry_type: FileEntryType,
        allocated: bool,
        path_spec: PathSpec,
    }
    impl Entry {
        fn new(name: &'static str, entry_type: FileEntryType) -> Entry {
            Entry {
                name,
                entry_type,
                allocated: true,
                path_spec: PathSpec::fake(format!("/{}", name)).unwrap(),
            }
        }
    }
    impl FileEntry for Entry {
        fn name(&self) -> &str { self.name }
        fn path_spec(&self) -> &PathSpec { &self.path_spec }
        fn entry_type(&self) -> FileEntryType { self.entry_type }
        fn is_allocated(&self) -> bool { self.allocated }
        fn sub_file_entries(&self) -> Result<SubFileEntries> {
            Ok(Box::new(std::iter::empty()))
        }
    }
    fn dir(name: &'static str) -> Entry {
        Entry::new(name, FileEntryType::Directory)
    }
    fn file(name: &'static str) -> Entry {
        Entry::new(name, FileEntryType::File)
    }
    #[test] fn exclusive_locations() {
        let result = FindSpec::new(FindSpecOptions {
            location: Some("/a".into()),
            location_regex: Some("/a.*".into()),
            ..Default::default()
        });
        assert!(matches!(result, Err(Error::InvalidArgument(..))));
    }
    #[test] fn case_insensitive_literal() {
        let find_spec = FindSpec::new(FindSpecOptions {
            location: Some(["a", "b"].into()),
            case_sensitive: false,
            ..Default::default()
        }).unwrap();
        assert!(!find_spec.matches(&dir(""), 0));
        assert!(!find_spec.matches(&dir("A"), 1));
        assert!(find_spec.matches(&file("B"), 2));
        assert!(!find_spec.matches(&file("C"), 2));
        assert!(!find_spec.matches(&file("B"), 3));
        assert_eq!(find_spec.matches_with_location(&dir("a"), 1),
                   (false, Some(true)));
        assert_eq!(find_spec.matches_with_location(&dir("c"), 1),
                   (false, Some(false)));
        const DEPTHS_TO_CHECK: &[(usize, bool)] = &[
            (0, false), (1, false), (2, true), (3, false),
        ];
        for &(depth, at_max) in DEPTHS_TO_CHECK {
            assert_eq!(find_spec.at_maximum_depth(depth), at_max, "{}", depth);
        }
    }
    #[test] fn case_sensitive_literal() {
        let find_spec = FindSpec::new(FindSpecOptions {
            location: Some("/a/b".into()),
            ..Default::default()
        }).unwrap();
        assert!(find_spec.matches(&file("b"), 2));
        assert!(!find_spec.matches(&file("B"), 2));
    }
    #[test] fn canonically_equivalent_names() {
        let find_spec = FindSpec::new(FindSpecOptions {
            location: Some(["resum\u{00e9}"].into()),
            ..Default::default()
        }).unwrap();
        assert!(find_spec.matches(&file("resume\u{0301}"), 1));
    }
    #[test] fn root_only() {
        let find_spec = FindSpec::new(FindSpecOptions {
            location: Some("/".into()),
            ..Default::default()
        }).unwrap();
        assert!(find_spec.at_maximum_depth(0));
        assert!(find_spec.matches(&dir(""), 0));
        assert!(!find_spec.matches(&dir("x"), 1));
    }
    #[test] fn regex_segments() {
        let find_spec = FindSpec::new(FindSpecOptions {
            location_regex: Some(["Users", "[^/]+", r"NTUSER\.DAT"].into()),
            case_sensitive: false,
            ..Default::default()
        }).unwrap();
        assert!(find_spec.matches(&file("ntuser.dat"), 3));
        assert!(!find_spec.matches(&file("ntuser.dat.LOG1"), 3));
        assert!(!find_spec.matches(&file("xntuser.dat"), 3));
        // matched again through the memoised regex
        assert!(find_spec.matches(&file("NTUSER.DAT"), 3));
        let dotted = FindSpec::new(FindSpecOptions {
            location_regex: Some(["a.b"].into()),
            ..Default::default()
        }).unwrap();
        assert!(dotted.matches(&file("a\nb"), 1));
        assert!(!dotted.matches(&file("A\nB"), 1));
    }
    #[test] fn malformed_regex_fails_closed() {
        let find_spec = FindSpec::new(FindSpecOptions {
            location_regex: Some(["(unclosed"].into()),
            ..Default::default()
        }).unwrap();
        assert!(!find_spec.matches(&file("(unclosed"), 1));
        assert!(!find_spec.matches(&file("unclosed"), 1));
    }
    #[test] fn entry_types() {
        let find_spec = FindSpec::new(FindSpecOptions {
            file_entry_types: Some([FileEntryType::File,
                                    FileEntryType::Link].into()),
            ..Default::default()
        }).unwrap();
        assert!(find_spec.matches(&file("x"), 5));
        assert!(find_spec.matches(&Entry::new("l", FileEntryType::Link), 1));
        assert!(!find_spec.matches(&dir("d"), 1));
        assert!(!find_spec.matches(&Entry::new("p", FileEntryType::Pipe), 1));
        assert!(!find_spec.has_location());
        assert_eq!(find_spec.matches_with_location(&dir("d"), 1),
                   (false, None));
        assert!(!find_spec.at_maximum_depth(0));
    }
    #[test] fn allocation() {
        let mut deleted = file("gone");
        deleted.allocated = false;
        let live = file("here");
        const ALLOCATIONS_TO_CHECK: &[(Allocation, bool, bool)] = &[
            (Allocation::Any, true, true),
            (Allocation::Allocated, true, false),
            (Allocation::Unallocated, false, true),
        ];
        for &(allocation, live_matches, deleted_matches)
            in ALLOCATIONS_TO_CHECK {
            let find_spec = FindSpec::new(FindSpecOptions {
                allocation,
                ..Default::default()
            }).unwrap();
            assert_eq!(find_spec.matches(&live, 1), live_matches);
            assert_eq!(find_spec.matches(&deleted, 1), deleted_matches);
        }
    }
    #[test] fn initialize_resplits() {
        static NTFS: TypeIndicator = TypeIndicator::NTFS;
        struct Backslashed;
        impl FileSystem for Backslashed {
            fn type_indicator(&self) -> &TypeIndicator { &NTFS }
            fn path_separator(&self) -> char { '\\' }
            fn root_file_entry(&self) -> Result<Box<dyn FileEntry>> {
                Err(Error::NotFound("root".into()))
            }
            fn file_entry_by_path_spec(&self, _: &PathSpec)
                -> Result<Option<Box<dyn FileEntry>>> {
                Ok(None)
            }
        }
        let mut find_spec = FindSpec::new(FindSpecOptions {
            location: Some("\\Windows\\System32".into()),
            ..Default::default()
        }).unwrap();
        assert_eq!(find_spec.number_of_segments(), 1);
        find_spec.initialize(&Backslashed);
        assert_eq!(find_spec.number_of_segments(), 2);
        assert!(find_spec.matches(&dir("System32"), 2));
    }
}
