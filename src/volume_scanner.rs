use crate::*;

use std::{
    cmp::Reverse,
    collections::HashMap,
    io,
    sync::Arc,
};

/// Lists the volumes inside a volume system layer.
///
/// Volume systems are on-disk formats, so the scanner never reads one
/// itself. Partitions are expected to carry `/pN` locations and a
/// `start_offset`; volume shadow stores carry `/vssN` locations.
pub trait VolumeSystem : Send + Sync {
    /// Takes: the volume system's own layer, located at `/`. Returns the
    /// volumes in on-disk order.
    fn volumes(&self, volume_system: &PathSpec, resolver: &Resolver)
        -> Result<Vec<PathSpec>>;
}

/// The choices a volume scanner cannot make by itself, typically put to
/// whoever is running it.
pub trait VolumeScannerMediator {
    /// Picks partitions by zero-based index. Only asked when there is more
    /// than one and the options did not decide.
    fn partition_indices(&mut self, partitions: &[PathSpec])
        -> Result<Vec<u64>>;
    /// Picks volume shadow stores by zero-based index. Picks none unless
    /// overridden.
    fn vss_store_indices(&mut self, _stores: &[PathSpec])
        -> Result<Vec<u64>> {
        Ok(vec![])
    }
    /// Gets a chance to unlock an encrypted volume, usually by registering a
    /// back end that decrypts it. Returns true if the scan should go on
    /// inside. Leaves everything locked unless overridden.
    fn unlock_encrypted_volume(&mut self, _encrypted_volume: &PathSpec)
        -> Result<bool> {
        Ok(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeSelection {
    All,
    /// Zero-based indices.
    Only(Vec<u64>),
}

/// Preferences that settle volume choices without asking the mediator.
#[derive(Debug, Clone, Default)]
pub struct VolumeScannerOptions {
    /// Used if every listed partition exists.
    pub partitions: Option<VolumeSelection>,
    /// Byte offset of the one partition to use, tried after `partitions`.
    pub partition_offset: Option<u64>,
    /// `None` asks the mediator.
    pub vss_stores: Option<VolumeSelection>,
}

/// Walks a source down through storage media image, volume system and
/// encrypted volume layers to the file systems it holds.
///
/// Every layer is identified with an [`Analyzer`](struct.Analyzer.html) and
/// opened through a [`Resolver`](struct.Resolver.html). Volume systems are
/// listed by the [`VolumeSystem`](trait.VolumeSystem.html) registered for
/// their type. Choices the options leave open go to the mediator; without
/// one, every partition and no shadow store is used.
pub struct VolumeScanner {
    analyzer: Analyzer,
    resolver: Resolver,
    volume_systems: HashMap<TypeIndicator, Arc<dyn VolumeSystem>>,
    mediator: Option<Box<dyn VolumeScannerMediator>>,
}

impl VolumeScanner {
    pub fn new(analyzer: Analyzer, resolver: Resolver) -> VolumeScanner {
        VolumeScanner {
            analyzer,
            resolver,
            volume_systems: HashMap::new(),
            mediator: None,
        }
    }
    pub fn set_mediator(&mut self, mediator: Box<dyn VolumeScannerMediator>) {
        self.mediator = Some(mediator);
    }
    pub fn register_volume_system(&mut self, type_indicator: TypeIndicator,
                                  volume_system: Arc<dyn VolumeSystem>)
        -> Result<()> {
        if self.volume_systems.contains_key(&type_indicator) {
            return Err(Error::DuplicateEntry(format!(
                "volume system for {} already registered", type_indicator)))
        }
        log::debug!("registered volume system for {}", type_indicator);
        self.volume_systems.insert(type_indicator, volume_system);
        Ok(())
    }
    /// Returns the root of every file system found inside `source`, each
    /// located at `/`.
    ///
    /// A source that holds no image, volume or file system format at all is
    /// taken to be a plain file and comes back as is. A source that holds
    /// containers but no file system is `Error::NotFound`.
    pub fn base_path_specs(&mut self, source: &PathSpec,
                           options: &VolumeScannerOptions)
        -> Result<Vec<PathSpec>> {
        let mut layer = source.clone();
        let images = self.analyzer
            .get_storage_media_image_type_indicators(&self.resolver, &layer)?;
        let found_image = match only_one(&layer, images)? {
            Some(type_indicator) => {
                layer = layer.push(type_indicator, Default::default())?;
                true
            },
            None => false,
        };
        let mut ret = vec![];
        let found_volume = self.scan_volume(&layer, options, &mut ret)?;
        if ret.is_empty() {
            if !found_image && !found_volume {
                return Ok(vec![source.clone()])
            }
            return Err(Error::NotFound(format!(
                "no supported file system found in {}", source.short_name())))
        }
        Ok(ret)
    }
    /// Scans one volume. Returns true if it held a volume system or an
    /// encrypted volume.
    fn scan_volume(&mut self, layer: &PathSpec,
                   options: &VolumeScannerOptions,
                   out: &mut Vec<PathSpec>) -> Result<bool> {
        // encrypted volumes are also volume systems, so they go first
        let encrypted = self.analyzer
            .get_encrypted_volume_type_indicators(&self.resolver, layer)?;
        match only_one(layer, encrypted)? {
            Some(x) if x != *layer.type_indicator() => {
                let volume = layer.push(x, Default::default())?;
                let unlocked = match self.mediator.as_mut() {
                    Some(mediator) => {
                        mediator.unlock_encrypted_volume(&volume)?
                    },
                    None => false,
                };
                if unlocked {
                    self.scan_volume(&volume, options, out)?;
                }
                else {
                    log::info!("leaving {} locked", volume.short_name());
                }
                return Ok(true)
            },
            _ => (),
        }
        let volume_systems = self.analyzer
            .get_volume_system_type_indicators(&self.resolver, layer)?;
        match only_one(layer, volume_systems)? {
            Some(x) if x != *layer.type_indicator() => {
                self.scan_volume_system(layer, x, options, out)?;
                Ok(true)
            },
            _ => {
                self.scan_file_system(layer, out)?;
                Ok(false)
            },
        }
    }
    fn scan_volume_system(&mut self, layer: &PathSpec,
                          type_indicator: TypeIndicator,
                          options: &VolumeScannerOptions,
                          out: &mut Vec<PathSpec>) -> Result<()> {
        let volume_system = match self.volume_systems.get(&type_indicator) {
            Some(x) => x.clone(),
            None => {
                return Err(Error::NotFound(format!(
                    "no volume system registered for {}", type_indicator)))
            },
        };
        let vs_path_spec = layer.push(type_indicator.clone(),
                                      PathSpecAttributes::with_location("/"))?;
        let volumes = volume_system.volumes(&vs_path_spec, &self.resolver)?;
        if type_indicator == TypeIndicator::VSHADOW {
            // the current volume is still a file system of its own
            self.scan_file_system(layer, out)?;
            for store in self.select_vss_stores(volumes, options)? {
                self.scan_file_system(&store, out)?;
            }
        }
        else {
            for volume in self.select_partitions(volumes, options)? {
                self.scan_volume(&volume, options, out)?;
            }
        }
        Ok(())
    }
    fn scan_file_system(&self, layer: &PathSpec, out: &mut Vec<PathSpec>)
        -> Result<()> {
        let found = self.analyzer
            .get_file_system_type_indicators(&self.resolver, layer)?;
        if let Some(type_indicator) = only_one(layer, found)? {
            out.push(layer.push(type_indicator,
                                PathSpecAttributes::with_location("/"))?);
        }
        Ok(())
    }
    fn select_partitions(&mut self, partitions: Vec<PathSpec>,
                         options: &VolumeScannerOptions)
        -> Result<Vec<PathSpec>> {
        if partitions.is_empty() {
            log::warn!("no partitions found");
            return Ok(partitions)
        }
        match &options.partitions {
            Some(VolumeSelection::All) => return Ok(partitions),
            Some(VolumeSelection::Only(indices)) => {
                match pick(&partitions, indices, PathSpec::partition_index) {
                    Some(x) => return Ok(x),
                    None => {
                        log::warn!("ignoring partitions {:?}: not all exist",
                                   indices);
                    },
                }
            },
            None => (),
        }
        if let Some(offset) = options.partition_offset {
            match partitions.iter()
                .find(|x| x.attributes().start_offset == Some(offset)) {
                Some(x) => return Ok(vec![x.clone()]),
                None => {
                    log::warn!("no partition at offset {} (0x{:08x})",
                               offset, offset);
                },
            }
        }
        if partitions.len() == 1 { return Ok(partitions) }
        let mediator = match self.mediator.as_mut() {
            Some(x) => x,
            None => return Ok(partitions),
        };
        let indices = mediator.partition_indices(&partitions)?;
        pick(&partitions, &indices, PathSpec::partition_index)
            .ok_or_else(|| Error::NotFound(format!(
                "no such partitions: {:?}", indices)))
    }
    /// Selected stores, most recent first.
    fn select_vss_stores(&mut self, stores: Vec<PathSpec>,
                         options: &VolumeScannerOptions)
        -> Result<Vec<PathSpec>> {
        if stores.is_empty() { return Ok(stores) }
        let indices = match &options.vss_stores {
            Some(VolumeSelection::All) => None,
            Some(VolumeSelection::Only(x)) => Some(x.clone()),
            None => match self.mediator.as_mut() {
                Some(mediator) => Some(mediator.vss_store_indices(&stores)?),
                None => Some(vec![]),
            },
        };
        let mut ret = match indices {
            None => stores,
            Some(indices) => {
                pick(&stores, &indices, PathSpec::vss_store_index)
                    .ok_or_else(|| Error::NotFound(format!(
                        "no such volume shadow stores: {:?}", indices)))?
            },
        };
        ret.sort_by_key(|x| Reverse(x.vss_store_index()));
        Ok(ret)
    }
}

/// The volumes with the given indices, in the order given, or `None` if any
/// of them is missing.
fn pick(volumes: &[PathSpec], indices: &[u64],
        index_of: fn(&PathSpec) -> Option<u64>) -> Option<Vec<PathSpec>> {
    indices.iter().map(|&index| {
        volumes.iter().find(|x| index_of(x) == Some(index)).cloned()
    }).collect()
}

/// The one format found in `layer`. More than one is a back end failure;
/// the tie-break configuration is where equivalent drivers get collapsed.
fn only_one(layer: &PathSpec, found: Vec<TypeIndicator>)
    -> Result<Option<TypeIndicator>> {
    if found.len() > 1 {
        let err = format!("more than one format found: {:?}", found);
        return Err(Error::backend(layer,
                                  io::Error::new(io::ErrorKind::Unsupported,
                                                 err)))
    }
    Ok(found.into_iter().next())
}
