use crate::*;

use std::{
    fmt,
    io, io::{Cursor, ErrorKind},
    sync::Arc,
};

#[derive(Clone)]
struct Node {
    entry_type: FileEntryType,
    allocated: bool,
    denied: bool,
    data: Arc<[u8]>,
    children: Vec<(String, Node)>,
}

impl Node {
    fn new(entry_type: FileEntryType, data: &[u8]) -> Node {
        Node {
            entry_type,
            allocated: true,
            denied: false,
            data: data.into(),
            children: vec![],
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self.entry_type {
            FileEntryType::Directory => write!(fmt, "Node::Dir({} entries)",
                                               self.children.len()),
            x => write!(fmt, "Node::{:?}({} bytes)", x, self.data.len()),
        }
    }
}

fn components(location: &str) -> impl Iterator<Item=&str> {
    location.split('/').filter(|x| !x.is_empty())
}

/// An in-memory file system of type FAKE, for tests and for synthetic
/// roots.
///
/// It is both a [`FileSystem`](trait.FileSystem.html) the searcher can walk
/// and a [`StreamBackend`](trait.StreamBackend.html) that opens the data of
/// its files. Cloning is cheap; edits after a clone do not affect the
/// clone.
#[derive(Clone, Debug)]
pub struct FakeFileSystem {
    root: Arc<Node>,
}

static FAKE: TypeIndicator = TypeIndicator::FAKE;

impl Default for FakeFileSystem {
    fn default() -> FakeFileSystem { FakeFileSystem::new() }
}

impl FakeFileSystem {
    /// Makes a file system with nothing but a root directory.
    pub fn new() -> FakeFileSystem {
        FakeFileSystem { root: Arc::new(Node::new(FileEntryType::Directory,
                                                  b"")) }
    }
    /// Builds a tree from `(location, data)` pairs. Locations are absolute;
    /// a location ending in `/` is a directory and must have no data.
    /// Missing intermediate directories are implied.
    pub fn from_listing(listing: &[(&str, &[u8])]) -> Result<FakeFileSystem> {
        let mut ret = FakeFileSystem::new();
        for (location, data) in listing {
            if location.ends_with('/') {
                if !data.is_empty() {
                    return Err(Error::InvalidArgument(format!(
                        "fake file system listing contained a directory \
                         with data: {:?}", location)))
                }
                ret.add_file_entry(location, FileEntryType::Directory, b"")?;
            }
            else {
                ret.add_file_entry(location, FileEntryType::File, data)?;
            }
        }
        Ok(ret)
    }
    /// Adds one entry, implying any missing parent directories.
    pub fn add_file_entry(&mut self, location: &str,
                          entry_type: FileEntryType, data: &[u8])
        -> Result<()> {
        if !location.starts_with('/') {
            return Err(Error::InvalidArgument(format!(
                "fake file system location is relative: {:?}", location)))
        }
        let mut components = components(location);
        let mut cur_component = match components.next() {
            Some(x) => x,
            None => {
                return Err(Error::InvalidArgument(
                    "fake file system listing contained an explicit root"
                        .to_string()))
            },
        };
        let mut this_node = Arc::make_mut(&mut self.root);
        for next_component in components {
            if this_node.entry_type != FileEntryType::Directory {
                return Err(Error::InvalidArgument(format!(
                    "fake file system entry is \"under\" a non-directory: \
                     {:?}", location)))
            }
            let subnodes = &mut this_node.children;
            let i = match subnodes.binary_search_by(
                |(x, _)| x.as_str().cmp(cur_component)) {
                Ok(i) => i,
                Err(i) => {
                    // Implied directory.
                    subnodes.insert(i, (cur_component.to_string(),
                                        Node::new(FileEntryType::Directory,
                                                  b"")));
                    i
                },
            };
            this_node = &mut subnodes[i].1;
            cur_component = next_component;
        }
        if this_node.entry_type != FileEntryType::Directory {
            return Err(Error::InvalidArgument(format!(
                "fake file system entry is \"under\" a non-directory: {:?}",
                location)))
        }
        let subnodes = &mut this_node.children;
        match subnodes.binary_search_by(
            |(x, _)| x.as_str().cmp(cur_component)) {
            // a directory named after it was implied
            Ok(i) if entry_type == FileEntryType::Directory
                && subnodes[i].1.entry_type == FileEntryType::Directory
                => Ok(()),
            Ok(_) => Err(Error::DuplicateEntry(format!(
                "fake file system already has {:?}", location))),
            Err(i) => {
                subnodes.insert(i, (cur_component.to_string(),
                                    Node::new(entry_type, data)));
                Ok(())
            },
        }
    }
    /// Marks an entry as allocated or not.
    pub fn set_allocated(&mut self, location: &str, allocated: bool)
        -> Result<()> {
        self.resolve_mut(location)?.allocated = allocated;
        Ok(())
    }
    /// Makes enumerating (or opening) an entry fail with access denied.
    pub fn deny_access(&mut self, location: &str) -> Result<()> {
        self.resolve_mut(location)?.denied = true;
        Ok(())
    }
    fn resolve_mut(&mut self, location: &str) -> Result<&mut Node> {
        let mut this_node = Arc::make_mut(&mut self.root);
        for component in components(location) {
            let found = this_node.children.iter_mut()
                .find(|(name, _)| name == component);
            this_node = match found {
                Some((_, x)) => x,
                None => {
                    return Err(Error::NotFound(format!(
                        "fake file system has no {:?}", location)))
                },
            };
        }
        Ok(this_node)
    }
    fn entry(&self, location: &str) -> Option<FakeFileEntry> {
        let node = resolve(&self.root, location)?;
        let name = components(location).last().unwrap_or("").to_string();
        Some(FakeFileEntry {
            root: self.root.clone(),
            path_spec: PathSpec::fake(normalized(location)).ok()?,
            name,
            entry_type: node.entry_type,
            allocated: node.allocated,
        })
    }
}

fn resolve<'a>(root: &'a Node, location: &str) -> Option<&'a Node> {
    let mut this_node = root;
    'outer: for component in components(location) {
        for (name, subnode) in this_node.children.iter() {
            if name != component { continue }
            this_node = subnode;
            continue 'outer
        }
        return None
    }
    Some(this_node)
}

fn normalized(location: &str) -> String {
    let mut ret = String::with_capacity(location.len());
    for component in components(location) {
        ret.push('/');
        ret.push_str(component);
    }
    if ret.is_empty() { ret.push('/') }
    ret
}

impl FileSystem for FakeFileSystem {
    fn type_indicator(&self) -> &TypeIndicator { &FAKE }
    fn root_file_entry(&self) -> Result<Box<dyn FileEntry>> {
        match self.entry("/") {
            Some(x) => Ok(Box::new(x)),
            None => Err(Error::NotFound("fake file system root".to_string())),
        }
    }
    fn file_entry_by_path_spec(&self, path_spec: &PathSpec)
        -> Result<Option<Box<dyn FileEntry>>> {
        let location = match path_spec.location() {
            Some(x) => x,
            None => {
                return Err(Error::InvalidArgument(
                    "fake path specification missing location".to_string()))
            },
        };
        Ok(self.entry(location).map(|x| -> Box<dyn FileEntry> { Box::new(x) }))
    }
}

impl StreamBackend for FakeFileSystem {
    fn open(&self, path_spec: &PathSpec, _: &Resolver)
        -> io::Result<Box<dyn DataFile>> {
        let location = path_spec.location().ok_or_else(|| {
            io::Error::new(ErrorKind::InvalidInput,
                           "fake path specification missing location")
        })?;
        match resolve(&self.root, location) {
            Some(node) if node.denied
                => Err(io::Error::from(ErrorKind::PermissionDenied)),
            Some(node) if node.entry_type == FileEntryType::Directory
                => Err(io::Error::new(ErrorKind::InvalidInput,
                                      format!("{:?} is a directory",
                                              location))),
            Some(node) => Ok(Box::new(Cursor::new(node.data.clone()))),
            None => Err(io::Error::from(ErrorKind::NotFound)),
        }
    }
}

/// An entry of a [`FakeFileSystem`](struct.FakeFileSystem.html).
pub struct FakeFileEntry {
    root: Arc<Node>,
    path_spec: PathSpec,
    name: String,
    entry_type: FileEntryType,
    allocated: bool,
}

impl FileEntry for FakeFileEntry {
    fn name(&self) -> &str { &self.name }
    fn path_spec(&self) -> &PathSpec { &self.path_spec }
    fn entry_type(&self) -> FileEntryType { self.entry_type }
    fn is_allocated(&self) -> bool { self.allocated }
    fn sub_file_entries(&self) -> Result<SubFileEntries> {
        let location = self.path_spec.location().unwrap_or("/");
        let node = match resolve(&self.root, location) {
            Some(x) => x,
            None => return Ok(Box::new(std::iter::empty())),
        };
        if node.denied {
            return Err(Error::AccessDenied(location.to_string()))
        }
        let root = self.root.clone();
        let parent = if location == "/" { String::new() }
        else { location.to_string() };
        let names: Vec<String> = node.children.iter()
            .map(|(name, _)| name.clone()).collect();
        Ok(Box::new(names.into_iter().filter_map(move |name| {
            let location = format!("{}/{}", parent, name);
            let node = resolve(&root, &location)?;
            let path_spec = match PathSpec::fake(location) {
                Ok(x) => x,
                Err(x) => return Some(Err(x)),
            };
            let entry: Box<dyn FileEntry> = Box::new(FakeFileEntry {
                root: root.clone(),
                path_spec,
                name,
                entry_type: node.entry_type,
                allocated: node.allocated,
            });
            Some(Ok(entry))
        })))
    }
}
