use crate::*;

use std::{
    collections::HashMap,
    io, io::{Cursor, ErrorKind, Read, Seek, SeekFrom},
    sync::{Arc, PoisonError, RwLock},
};

/// A readable, seekable stream of the data addressed by a path
/// specification.
pub trait DataFile : Read + Seek {}
impl<T: AsRef<[u8]>> DataFile for Cursor<T> {}
impl DataFile for std::fs::File {}
impl<T: DataFile + ?Sized> DataFile for Box<T> {}

/// Something that can open streams for one type indicator.
///
/// The core never creates or closes the medium behind a stream; it only
/// reads what a back end hands it. Back ends for inner layers open their
/// parent through the `resolver` they are given.
pub trait StreamBackend : Send + Sync {
    /// Opens the data addressed by `path_spec`.
    ///
    /// Takes: a path specification whose type indicator is the one this
    /// back end was registered for.
    fn open(&self, path_spec: &PathSpec, resolver: &Resolver)
        -> io::Result<Box<dyn DataFile>>;
}

struct ResolverInner {
    backends: HashMap<TypeIndicator, Arc<dyn StreamBackend>>,
}

/// The caller's table binding type indicators to stream back ends.
///
/// Cloning a `Resolver` gives another handle to the same table.
#[derive(Clone)]
pub struct Resolver {
    inner: Arc<RwLock<ResolverInner>>,
}

impl Default for Resolver {
    fn default() -> Resolver { Resolver::new() }
}

impl Resolver {
    /// Makes a table that knows only the DATA_RANGE layer.
    pub fn new() -> Resolver {
        let mut backends: HashMap<TypeIndicator, Arc<dyn StreamBackend>>
            = HashMap::new();
        backends.insert(TypeIndicator::DATA_RANGE, Arc::new(DataRangeBackend));
        Resolver { inner: Arc::new(RwLock::new(ResolverInner { backends })) }
    }
    pub fn register_backend(&self, type_indicator: TypeIndicator,
                            backend: Arc<dyn StreamBackend>) -> Result<()> {
        let mut this = self.inner.write()
            .unwrap_or_else(PoisonError::into_inner);
        if this.backends.contains_key(&type_indicator) {
            return Err(Error::DuplicateEntry(format!(
                "back end for {} already registered", type_indicator)))
        }
        log::debug!("registered stream back end for {}", type_indicator);
        this.backends.insert(type_indicator, backend);
        Ok(())
    }
    pub fn deregister_backend(&self, type_indicator: &TypeIndicator)
        -> Result<()> {
        let mut this = self.inner.write()
            .unwrap_or_else(PoisonError::into_inner);
        match this.backends.remove(type_indicator) {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(format!(
                "no back end registered for {}", type_indicator))),
        }
    }
    pub fn has_backend(&self, type_indicator: &TypeIndicator) -> bool {
        let this = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        this.backends.contains_key(type_indicator)
    }
    /// Opens a stream for `path_spec` with the back end bound to its type
    /// indicator. A DATA_RANGE layer without both range attributes is an
    /// `Error::InvalidArgument`; other failures come back as
    /// `Error::Backend`. Nothing is retried.
    pub fn open_file_object(&self, path_spec: &PathSpec)
        -> Result<Box<dyn DataFile>> {
        if *path_spec.type_indicator() == TypeIndicator::DATA_RANGE {
            let attributes = path_spec.attributes();
            if attributes.range_offset.is_none()
                || attributes.range_size.is_none() {
                return Err(Error::InvalidArgument(format!(
                    "{} is missing range_offset or range_size",
                    path_spec.short_name())))
            }
        }
        let backend = {
            let this = self.inner.read()
                .unwrap_or_else(PoisonError::into_inner);
            this.backends.get(path_spec.type_indicator()).cloned()
        };
        // the lock is released here so nested layers can take it again
        match backend {
            Some(backend) => backend.open(path_spec, self)
                .map_err(|x| Error::backend(path_spec, x)),
            None => {
                let err = format!("no back end for {}",
                                  path_spec.type_indicator());
                Err(Error::backend(path_spec,
                                   io::Error::new(ErrorKind::Unsupported, err)))
            },
        }
    }
}

/// Opens the parent of a layer, as an `io::Result` for use inside back ends.
pub fn open_parent(path_spec: &PathSpec, resolver: &Resolver)
    -> io::Result<Box<dyn DataFile>> {
    let parent = match path_spec.parent() {
        Some(x) => x,
        None => {
            let err = format!("{} layer has no parent",
                              path_spec.type_indicator());
            return Err(io::Error::new(ErrorKind::InvalidInput, err))
        },
    };
    resolver.open_file_object(parent).map_err(|x| match x {
        Error::Backend { source, .. } => source,
        x => io::Error::new(ErrorKind::Other, x.to_string()),
    })
}

/// A window of a parent stream.
pub struct DataRange<F: DataFile> {
    inner: F,
    range_offset: u64,
    range_size: u64,
    position: u64,
}

impl<F: DataFile> DataRange<F> {
    pub fn new(inner: F, range_offset: u64, range_size: u64) -> DataRange<F> {
        DataRange { inner, range_offset, range_size, position: 0 }
    }
    pub fn range_size(&self) -> u64 { self.range_size }
}

impl<F: DataFile> Read for DataRange<F> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.position >= self.range_size { return Ok(0) }
        let remaining = self.range_size - self.position;
        let wanted = (buf.len() as u64).min(remaining) as usize;
        self.inner.seek(SeekFrom::Start(self.range_offset + self.position))?;
        let amount = self.inner.read(&mut buf[..wanted])?;
        self.position += amount as u64;
        Ok(amount)
    }
}

impl<F: DataFile> Seek for DataRange<F> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_position = match pos {
            SeekFrom::Start(x) => Some(x),
            SeekFrom::End(x) => self.range_size.checked_add_signed(x),
            SeekFrom::Current(x) => self.position.checked_add_signed(x),
        };
        match new_position {
            Some(x) => {
                self.position = x;
                Ok(x)
            },
            None => Err(io::Error::new(ErrorKind::InvalidInput,
                                       "seek before start of data range")),
        }
    }
}

impl<F: DataFile> DataFile for DataRange<F> {}

/// Back end for DATA_RANGE layers: `range_size` bytes of the parent starting
/// at `range_offset`.
struct DataRangeBackend;

impl StreamBackend for DataRangeBackend {
    fn open(&self, path_spec: &PathSpec, resolver: &Resolver)
        -> io::Result<Box<dyn DataFile>> {
        let attributes = path_spec.attributes();
        let (range_offset, range_size) = match (attributes.range_offset,
                                                attributes.range_size) {
            (Some(offset), Some(size)) => (offset, size),
            _ => {
                return Err(io::Error::new(ErrorKind::InvalidInput,
                                          "data range missing range_offset \
                                           or range_size"))
            },
        };
        let mut parent = open_parent(path_spec, resolver)?;
        let parent_size = parent.seek(SeekFrom::End(0))?;
        // clamp to what the parent actually has
        let range_size = range_size
            .min(parent_size.saturating_sub(range_offset));
        Ok(Box::new(DataRange::new(parent, range_offset, range_size)))
    }
}
