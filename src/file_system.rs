use crate::*;

/// Lazily produced children of a file entry.
pub type SubFileEntries = Box<dyn Iterator<Item=Result<Box<dyn FileEntry>>>>;

/// A file system reachable through some path specification, as the searcher
/// sees it.
pub trait FileSystem {
    /// The type indicator of the layer this file system was opened from.
    /// Parentless types resolve searches from the mount point instead of the
    /// root.
    fn type_indicator(&self) -> &TypeIndicator;
    /// The path segment separator.
    fn path_separator(&self) -> char { '/' }
    /// Splits a path into segments, without the (empty) root segment.
    fn split_path(&self, path: &str) -> Vec<String> {
        path.split(self.path_separator())
            .filter(|x| !x.is_empty())
            .map(str::to_string)
            .collect()
    }
    /// Joins segments into an absolute path.
    fn join_path(&self, segments: &[&str]) -> String {
        let separator = self.path_separator();
        let mut ret = String::new();
        for segment in segments {
            ret.push(separator);
            ret.push_str(segment);
        }
        if ret.is_empty() { ret.push(separator) }
        ret
    }
    fn root_file_entry(&self) -> Result<Box<dyn FileEntry>>;
    /// Returns `Ok(None)` if nothing exists at `path_spec`.
    fn file_entry_by_path_spec(&self, path_spec: &PathSpec)
        -> Result<Option<Box<dyn FileEntry>>>;
}

/// One named, typed node of a file system tree.
pub trait FileEntry {
    /// The entry's own name. The root's name is empty.
    fn name(&self) -> &str;
    fn path_spec(&self) -> &PathSpec;
    fn entry_type(&self) -> FileEntryType;
    fn is_allocated(&self) -> bool;
    /// Enumerates children. May fail with `Error::AccessDenied`, either up
    /// front or part way through.
    fn sub_file_entries(&self) -> Result<SubFileEntries>;
    fn is_device(&self) -> bool {
        self.entry_type() == FileEntryType::Device
    }
    fn is_directory(&self) -> bool {
        self.entry_type() == FileEntryType::Directory
    }
    fn is_file(&self) -> bool {
        self.entry_type() == FileEntryType::File
    }
    fn is_link(&self) -> bool {
        self.entry_type() == FileEntryType::Link
    }
    fn is_pipe(&self) -> bool {
        self.entry_type() == FileEntryType::Pipe
    }
    fn is_socket(&self) -> bool {
        self.entry_type() == FileEntryType::Socket
    }
}

/// Fails with `InvalidArgument` if `file_system` is parentless-typed and
/// `mount_point` has no location to start from.
pub(crate) fn check_mount_point(file_system: &dyn FileSystem,
                                mount_point: &PathSpec) -> Result<()> {
    if file_system.type_indicator().is_parentless()
        && mount_point.location().is_none() {
        return Err(Error::InvalidArgument(format!(
            "mount point {} has no location", mount_point.short_name())))
    }
    Ok(())
}

/// The entry paths are resolved from: the mount point itself for
/// parentless file system types, otherwise the root.
pub(crate) fn mount_point_entry(file_system: &dyn FileSystem,
                                mount_point: &PathSpec)
    -> Result<Box<dyn FileEntry>> {
    if !file_system.type_indicator().is_parentless() {
        return file_system.root_file_entry()
    }
    match file_system.file_entry_by_path_spec(mount_point)? {
        Some(x) => Ok(x),
        None => Err(Error::NotFound(format!(
            "mount point {} does not exist", mount_point.short_name()))),
    }
}
