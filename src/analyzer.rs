use crate::*;

use std::{
    collections::HashMap,
    io::{Seek, SeekFrom},
    sync::{Arc, PoisonError, RwLock},
};

mod config;
pub use config::*;
mod helper;
pub use helper::*;
mod helpers;
pub use helpers::default_helpers;

/// What detection needs for one category, built together so a lookup never
/// sees a store without its scanner.
struct CategoryCache {
    /// The category's helpers, in registration order.
    helpers: Vec<Arc<AnalyzerHelper>>,
    store: Arc<FormatSpecificationStore>,
    scanner: Arc<SignatureScanner>,
}

struct AnalyzerInner {
    helpers: Vec<Arc<AnalyzerHelper>>,
    config: AnalyzerConfig,
    caches: HashMap<FormatCategory, Arc<CategoryCache>>,
}

impl AnalyzerInner {
    fn flush(&mut self, categories: impl IntoIterator<Item=FormatCategory>) {
        for category in categories {
            if self.caches.remove(&category).is_some() {
                log::debug!("flushed {} detection cache", category);
            }
        }
    }
}

/// Answers "what could this stream be?" for one format category at a time.
///
/// An `Analyzer` owns the helper registry and, per category, a lazily built
/// specification store and signature scanner. The caches are dropped
/// whenever registration touches their category, or on an explicit
/// [`flush_cache`](#method.flush_cache), so a stale scanner is never used.
///
/// Cloning an `Analyzer` gives another handle to the same registry. Make a
/// fresh one (with [`new`](#method.new)) when you want isolation, e.g. in
/// tests.
#[derive(Clone)]
pub struct Analyzer {
    inner: Arc<RwLock<AnalyzerInner>>,
}

impl Default for Analyzer {
    fn default() -> Analyzer { Analyzer::new() }
}

impl Analyzer {
    /// An analyzer with no helpers and the stock tie-break table.
    pub fn new() -> Analyzer {
        Analyzer::with_config(AnalyzerConfig::default())
    }
    pub fn with_config(config: AnalyzerConfig) -> Analyzer {
        Analyzer {
            inner: Arc::new(RwLock::new(AnalyzerInner {
                helpers: vec![],
                config,
                caches: HashMap::new(),
            })),
        }
    }
    /// An analyzer with every built-in helper registered (see
    /// [`default_helpers`](fn.default_helpers.html)).
    pub fn with_default_helpers() -> Result<Analyzer> {
        let ret = Analyzer::new();
        for helper in default_helpers()? {
            ret.register_helper(helper)?;
        }
        Ok(ret)
    }
    pub fn config(&self) -> AnalyzerConfig {
        let this = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        this.config.clone()
    }
    pub fn set_config(&self, config: AnalyzerConfig) {
        let mut this = self.inner.write()
            .unwrap_or_else(PoisonError::into_inner);
        this.config = config;
    }
    /// Registers a helper. Fails with `DuplicateEntry` if its type indicator
    /// is taken. The caches of the helper's categories are flushed.
    pub fn register_helper(&self, helper: AnalyzerHelper) -> Result<()> {
        let mut this = self.inner.write()
            .unwrap_or_else(PoisonError::into_inner);
        if this.helpers.iter()
            .any(|x| x.type_indicator() == helper.type_indicator()) {
            return Err(Error::DuplicateEntry(format!(
                "analyzer helper for {} already registered",
                helper.type_indicator())))
        }
        log::debug!("registered analyzer helper for {}",
                    helper.type_indicator());
        this.flush(helper.categories().iter().copied());
        this.helpers.push(Arc::new(helper));
        Ok(())
    }
    /// Removes the helper for `type_indicator`. Fails with `NotFound` if
    /// there is none. The caches of its categories are flushed.
    pub fn deregister_helper(&self, type_indicator: &TypeIndicator)
        -> Result<()> {
        let mut this = self.inner.write()
            .unwrap_or_else(PoisonError::into_inner);
        let index = match this.helpers.iter()
            .position(|x| x.type_indicator() == type_indicator) {
                Some(x) => x,
                None => {
                    return Err(Error::NotFound(format!(
                        "no analyzer helper registered for {}",
                        type_indicator)))
                },
        };
        let helper = this.helpers.remove(index);
        log::debug!("deregistered analyzer helper for {}", type_indicator);
        this.flush(helper.categories().iter().copied());
        Ok(())
    }
    pub fn number_of_helpers(&self) -> usize {
        let this = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        this.helpers.len()
    }
    /// The registered helpers in `category`, in registration order.
    pub fn helpers(&self, category: FormatCategory)
        -> Vec<Arc<AnalyzerHelper>> {
        let this = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        this.helpers.iter().filter(|x| x.in_category(category))
            .cloned().collect()
    }
    /// Drops the cached store and scanner of each of `categories`. The next
    /// detection in that category rebuilds them from the current registry.
    pub fn flush_cache(&self, categories: &[FormatCategory]) {
        let mut this = self.inner.write()
            .unwrap_or_else(PoisonError::into_inner);
        this.flush(categories.iter().copied());
    }
    /// The specification store of `category`, built if needed.
    pub fn specification_store(&self, category: FormatCategory)
        -> Result<Arc<FormatSpecificationStore>> {
        Ok(self.category_cache(category)?.store.clone())
    }
    /// The signature scanner of `category`, built if needed.
    pub fn signature_scanner(&self, category: FormatCategory)
        -> Result<Arc<SignatureScanner>> {
        Ok(self.category_cache(category)?.scanner.clone())
    }
    fn category_cache(&self, category: FormatCategory)
        -> Result<Arc<CategoryCache>> {
        {
            let this = self.inner.read()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(x) = this.caches.get(&category) {
                return Ok(x.clone())
            }
        }
        let mut this = self.inner.write()
            .unwrap_or_else(PoisonError::into_inner);
        // somebody may have built it while we waited
        if let Some(x) = this.caches.get(&category) {
            return Ok(x.clone())
        }
        let helpers: Vec<Arc<AnalyzerHelper>> = this.helpers.iter()
            .filter(|x| x.in_category(category)).cloned().collect();
        let mut store = FormatSpecificationStore::new();
        for helper in helpers.iter() {
            if let Some(specification) = helper.specification() {
                store.add_specification(specification.clone())?;
            }
        }
        let scanner = SignatureScanner::new(&store);
        log::debug!("built {} detection cache: {} helpers, {} signatures",
                    category, helpers.len(), scanner.number_of_signatures());
        let ret = Arc::new(CategoryCache {
            helpers,
            store: Arc::new(store),
            scanner: Arc::new(scanner),
        });
        this.caches.insert(category, ret.clone());
        Ok(ret)
    }
    /// Every type indicator in `category` that the stream at `path_spec`
    /// matches, by signature or by heuristic.
    ///
    /// The result is in helper registration order, without duplicates, and
    /// with the configured tie-breaks applied. An empty result means nothing
    /// recognised the stream; it is not an error. Failure to open or read
    /// the stream is `Error::Backend` and is not retried.
    pub fn get_type_indicators(&self, resolver: &Resolver,
                               path_spec: &PathSpec,
                               category: FormatCategory)
        -> Result<Vec<TypeIndicator>> {
        let cache = self.category_cache(category)?;
        let mut file = resolver.open_file_object(path_spec)?;
        let rank = |type_indicator: &TypeIndicator, fallback: usize| {
            cache.helpers.iter()
                .position(|x| x.type_indicator() == type_indicator)
                .unwrap_or(fallback)
        };
        let mut matched: Vec<(usize, TypeIndicator)> = vec![];
        let scanned = cache.scanner.scan(&mut *file)
            .map_err(|x| Error::backend(path_spec, x))?;
        for result in scanned {
            let position = rank(&result.type_indicator, usize::MAX);
            matched.push((position, result.type_indicator));
        }
        for (index, helper) in cache.helpers.iter().enumerate() {
            if !helper.has_heuristic() { continue }
            file.seek(SeekFrom::Start(0))
                .map_err(|x| Error::backend(path_spec, x))?;
            let found = helper.analyze(&mut *file)
                .map_err(|x| Error::backend(path_spec, x))?;
            if let Some(type_indicator) = found {
                let position = rank(&type_indicator, index);
                matched.push((position, type_indicator));
            }
        }
        matched.sort_by_key(|(position, _)| *position);
        let mut ret: Vec<TypeIndicator> = Vec::with_capacity(matched.len());
        for (_, type_indicator) in matched {
            if !ret.contains(&type_indicator) { ret.push(type_indicator) }
        }
        let this = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(this.config.collapse(category, ret))
    }
    pub fn get_archive_type_indicators(&self, resolver: &Resolver,
                                       path_spec: &PathSpec)
        -> Result<Vec<TypeIndicator>> {
        self.get_type_indicators(resolver, path_spec, FormatCategory::Archive)
    }
    pub fn get_compressed_stream_type_indicators(&self, resolver: &Resolver,
                                                 path_spec: &PathSpec)
        -> Result<Vec<TypeIndicator>> {
        self.get_type_indicators(resolver, path_spec,
                                 FormatCategory::CompressedStream)
    }
    pub fn get_encrypted_volume_type_indicators(&self, resolver: &Resolver,
                                                path_spec: &PathSpec)
        -> Result<Vec<TypeIndicator>> {
        self.get_type_indicators(resolver, path_spec,
                                 FormatCategory::EncryptedVolume)
    }
    pub fn get_file_system_type_indicators(&self, resolver: &Resolver,
                                           path_spec: &PathSpec)
        -> Result<Vec<TypeIndicator>> {
        self.get_type_indicators(resolver, path_spec,
                                 FormatCategory::FileSystem)
    }
    pub fn get_storage_media_image_type_indicators(&self,
                                                   resolver: &Resolver,
                                                   path_spec: &PathSpec)
        -> Result<Vec<TypeIndicator>> {
        self.get_type_indicators(resolver, path_spec,
                                 FormatCategory::StorageMediaImage)
    }
    pub fn get_volume_system_type_indicators(&self, resolver: &Resolver,
                                             path_spec: &PathSpec)
        -> Result<Vec<TypeIndicator>> {
        self.get_type_indicators(resolver, path_spec,
                                 FormatCategory::VolumeSystem)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::{self, Cursor};
    /// OS back end over a fixed set of named blobs.
    struct Blobs(HashMap<&'static str, Vec<u8>>);
    impl StreamBackend for Blobs {
        fn open(&self, path_spec: &PathSpec, _: &Resolver)
            -> io::Result<Box<dyn DataFile>> {
            match path_spec.location().and_then(|x| self.0.get(x)) {
                Some(x) => Ok(Box::new(Cursor::new(x.clone()))),
                None => Err(io::Error::from(io::ErrorKind::NotFound)),
            }
        }
    }
    fn resolver(blobs: &[(&'static str, Vec<u8>)]) -> Resolver {
        let ret = Resolver::new();
        ret.register_backend(TypeIndicator::OS,
                             Arc::new(Blobs(blobs.iter().cloned().collect())))
            .unwrap();
        ret
    }
    fn signature_helper(type_indicator: &'static str,
                        category: FormatCategory,
                        pattern: &[u8]) -> AnalyzerHelper {
        AnalyzerHelper::with_specification(
            FormatSpecification::new(TypeIndicator::new(type_indicator),
                                     [category])
                .with_signature(pattern, SignatureOffset::Start(0))
                .unwrap())
    }
    fn names(type_indicators: Vec<TypeIndicator>) -> Vec<String> {
        type_indicators.into_iter().map(|x| x.to_string()).collect()
    }
    #[test] fn registration() {
        let analyzer = Analyzer::new();
        let before = analyzer.number_of_helpers();
        analyzer.register_helper(signature_helper(
            "TEST", FormatCategory::VolumeSystem, b"T")).unwrap();
        assert_eq!(analyzer.number_of_helpers(), before + 1);
        assert!(matches!(analyzer.register_helper(signature_helper(
            "TEST", FormatCategory::VolumeSystem, b"T")),
                         Err(Error::DuplicateEntry(..))));
        analyzer.deregister_helper(&TypeIndicator::new("TEST")).unwrap();
        assert_eq!(analyzer.number_of_helpers(), before);
        let gone = analyzer.deregister_helper(&TypeIndicator::new("TEST"));
        assert!(matches!(gone, Err(Error::NotFound(..))));
    }
    #[test] fn signature_detection() {
        let analyzer = Analyzer::new();
        analyzer.register_helper(signature_helper(
            "GZIP", FormatCategory::CompressedStream, b"\x1f\x8b")).unwrap();
        let resolver = resolver(&[
            ("/syslog.gz", b"\x1f\x8b\x08\x00rest".to_vec()),
            ("/syslog", b"\x1e\x8b\x08\x00rest".to_vec()),
        ]);
        let gz = PathSpec::os("/syslog.gz").unwrap();
        assert_eq!(names(analyzer.get_compressed_stream_type_indicators(
            &resolver, &gz).unwrap()), &["GZIP"]);
        let plain = PathSpec::os("/syslog").unwrap();
        assert!(analyzer.get_compressed_stream_type_indicators(&resolver,
                                                               &plain)
                .unwrap().is_empty());
        // wrong category
        assert!(analyzer.get_archive_type_indicators(&resolver, &gz).unwrap()
                .is_empty());
    }
    #[test] fn open_failures_propagate() {
        let analyzer = Analyzer::new();
        let resolver = resolver(&[]);
        let missing = PathSpec::os("/missing").unwrap();
        assert!(matches!(analyzer.get_archive_type_indicators(&resolver,
                                                              &missing),
                         Err(Error::Backend { .. })));
    }
    #[test] fn caches_follow_registration() {
        let analyzer = Analyzer::new();
        let resolver = resolver(&[("/x", b"XYZ".to_vec())]);
        let x = PathSpec::os("/x").unwrap();
        assert!(analyzer.get_archive_type_indicators(&resolver, &x).unwrap()
                .is_empty());
        let store = analyzer.specification_store(FormatCategory::Archive)
            .unwrap();
        assert!(store.is_empty());
        // cached until something changes
        assert!(Arc::ptr_eq(&store, &analyzer.specification_store(
            FormatCategory::Archive).unwrap()));
        analyzer.register_helper(signature_helper(
            "X", FormatCategory::Archive, b"XY")).unwrap();
        assert_eq!(names(analyzer.get_archive_type_indicators(&resolver, &x)
                         .unwrap()), &["X"]);
        let store = analyzer.specification_store(FormatCategory::Archive)
            .unwrap();
        assert_eq!(store.len(), 1);
        // other categories keep their caches
        let scanner = analyzer.signature_scanner(FormatCategory::FileSystem)
            .unwrap();
        analyzer.flush_cache(&[FormatCategory::Archive]);
        assert!(!Arc::ptr_eq(&store, &analyzer.specification_store(
            FormatCategory::Archive).unwrap()));
        assert!(Arc::ptr_eq(&scanner, &analyzer.signature_scanner(
            FormatCategory::FileSystem).unwrap()));
        analyzer.deregister_helper(&TypeIndicator::new("X")).unwrap();
        assert!(analyzer.get_archive_type_indicators(&resolver, &x).unwrap()
                .is_empty());
    }
    #[test] fn heuristics_are_unioned() {
        let analyzer = Analyzer::new();
        analyzer.register_helper(AnalyzerHelper::with_heuristic(
            TypeIndicator::new("EVEN"), [FormatCategory::VolumeSystem],
            |file: &mut dyn DataFile| -> io::Result<Option<TypeIndicator>> {
                let mut buf = vec![];
                file.read_to_end(&mut buf)?;
                Ok(if buf.len() % 2 == 0 { Some(TypeIndicator::new("EVEN")) }
                   else { None })
            })).unwrap();
        analyzer.register_helper(signature_helper(
            "SIG", FormatCategory::VolumeSystem, b"SIG")).unwrap();
        let resolver = resolver(&[
            ("/both", b"SIG!".to_vec()),
            ("/sig", b"SIG".to_vec()),
            ("/even", b"ab".to_vec()),
            ("/neither", b"abc".to_vec()),
        ]);
        const STREAMS_TO_CHECK: &[(&str, &[&str])] = &[
            ("/both", &["EVEN", "SIG"]),
            ("/sig", &["SIG"]),
            ("/even", &["EVEN"]),
            ("/neither", &[]),
        ];
        for (location, expected) in STREAMS_TO_CHECK {
            let path_spec = PathSpec::os(*location).unwrap();
            assert_eq!(names(analyzer.get_volume_system_type_indicators(
                &resolver, &path_spec).unwrap()), *expected, "{}", location);
        }
    }
    #[test] fn tie_break() {
        let mut ntfs = b"\xeb\x52\x90NTFS    ".to_vec();
        ntfs.resize(4096, 0);
        let resolver = resolver(&[("/ntfs.raw", ntfs)]);
        let path_spec = PathSpec::os("/ntfs.raw").unwrap();
        let analyzer = Analyzer::with_default_helpers().unwrap();
        assert_eq!(names(analyzer.get_file_system_type_indicators(
            &resolver, &path_spec).unwrap()), &["NTFS"]);
        analyzer.set_config(AnalyzerConfig::without_preferences());
        assert_eq!(names(analyzer.get_file_system_type_indicators(
            &resolver, &path_spec).unwrap()), &["NTFS", "TSK"]);
    }
    #[test] fn protective_mbr() {
        let mut gpt = vec![0u8; 4096];
        gpt[446 + 4] = 0xee;
        gpt[446 + 12 .. 446 + 16].copy_from_slice(&7u32.to_le_bytes());
        gpt[510] = 0x55;
        gpt[511] = 0xaa;
        gpt[512 .. 520].copy_from_slice(b"EFI PART");
        let mut mbr = gpt.clone();
        mbr[512 .. 520].copy_from_slice(&[0; 8]);
        let resolver = resolver(&[("/gpt.raw", gpt), ("/mbr.raw", mbr)]);
        let analyzer = Analyzer::with_default_helpers().unwrap();
        assert_eq!(names(analyzer.get_volume_system_type_indicators(
            &resolver, &PathSpec::os("/gpt.raw").unwrap()).unwrap()),
                   &["GPT"]);
        assert_eq!(names(analyzer.get_volume_system_type_indicators(
            &resolver, &PathSpec::os("/mbr.raw").unwrap()).unwrap()),
                   &["TSK_PARTITION"]);
    }
}
