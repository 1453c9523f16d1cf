use crate::*;
use crate::file_system::{check_mount_point, mount_point_entry};

use std::collections::VecDeque;

/// Searches one file system for entries matching a set of
/// [`FindSpec`](struct.FindSpec.html)s.
pub struct FileSystemSearcher<'a> {
    file_system: &'a dyn FileSystem,
    mount_point: PathSpec,
}

impl<'a> FileSystemSearcher<'a> {
    /// Binds a searcher to `file_system`. For parentless file system types
    /// the search starts from `mount_point`, which must therefore carry a
    /// location; otherwise it starts from the file system's root.
    pub fn new(file_system: &'a dyn FileSystem, mount_point: PathSpec)
        -> Result<FileSystemSearcher<'a>> {
        check_mount_point(file_system, &mount_point)?;
        Ok(FileSystemSearcher { file_system, mount_point })
    }
    pub fn file_system(&self) -> &'a dyn FileSystem { self.file_system }
    pub fn mount_point(&self) -> &PathSpec { &self.mount_point }
    pub fn file_entry_by_path_spec(&self, path_spec: &PathSpec)
        -> Result<Option<Box<dyn FileEntry>>> {
        self.file_system.file_entry_by_path_spec(path_spec)
    }
    pub fn split_path(&self, path: &str) -> Vec<String> {
        self.file_system.split_path(path)
    }
    /// Starts a search. With no find specifications, every entry matches.
    ///
    /// The result yields path specifications depth first, parent before
    /// children, once per matching find specification in the order given.
    /// Subtrees whose enumeration is refused are skipped; any other
    /// enumeration failure comes out as an `Err` item and abandons that
    /// subtree.
    pub fn find(&self, find_specs: Vec<FindSpec>) -> Result<Find> {
        let mut find_specs = if find_specs.is_empty() {
            vec![FindSpec::default()]
        } else { find_specs };
        for find_spec in find_specs.iter_mut() {
            find_spec.initialize(self.file_system);
        }
        let start = mount_point_entry(self.file_system, &self.mount_point)?;
        let active: Vec<usize> = (0 .. find_specs.len()).collect();
        let mut ret = Find {
            find_specs,
            pending: VecDeque::new(),
            stack: vec![],
        };
        ret.visit(start, &active, 0);
        Ok(ret)
    }
}

struct Frame {
    children: SubFileEntries,
    /// Indices of the find specs that can still match below this point.
    find_specs: Vec<usize>,
    depth: usize,
}

/// A search in progress. See
/// [`FileSystemSearcher::find`](struct.FileSystemSearcher.html#method.find).
pub struct Find {
    find_specs: Vec<FindSpec>,
    pending: VecDeque<Result<PathSpec>>,
    stack: Vec<Frame>,
}

impl Find {
    fn visit(&mut self, entry: Box<dyn FileEntry>, active: &[usize],
             depth: usize) {
        let mut still_active = Vec::with_capacity(active.len());
        for &index in active {
            let find_spec = &self.find_specs[index];
            let (matched, location_match)
                = find_spec.matches_with_location(&*entry, depth);
            if matched {
                self.pending.push_back(Ok(entry.path_spec().clone()));
            }
            if location_match != Some(false)
                && !find_spec.at_maximum_depth(depth) {
                still_active.push(index);
            }
        }
        if still_active.is_empty() { return }
        match entry.sub_file_entries() {
            Ok(children) => self.stack.push(Frame {
                children,
                find_specs: still_active,
                depth: depth + 1,
            }),
            Err(x) if x.is_access_denied() => {
                log::debug!("skipping {}: {}",
                            entry.path_spec().short_name(), x);
            },
            Err(x) => self.pending.push_back(Err(x)),
        }
    }
}

impl Iterator for Find {
    type Item = Result<PathSpec>;
    fn next(&mut self) -> Option<Result<PathSpec>> {
        loop {
            if let Some(x) = self.pending.pop_front() { return Some(x) }
            let frame = self.stack.last_mut()?;
            match frame.children.next() {
                None => { self.stack.pop(); },
                Some(Ok(entry)) => {
                    let find_specs = frame.find_specs.clone();
                    let depth = frame.depth;
                    self.visit(entry, &find_specs, depth);
                },
                Some(Err(x)) => {
                    self.stack.pop();
                    if x.is_access_denied() {
                        log::debug!("stopped enumerating part way: {}", x);
                    }
                    else { return Some(Err(x)) }
                },
            }
        }
    }
}
