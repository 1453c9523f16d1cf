#![cfg(feature = "fake")]

use layered_vfs::*;
use std::{
    cell::RefCell,
    io::{self, Cursor, SeekFrom},
    rc::Rc,
    sync::Arc,
};

const SECTOR: usize = 512;

/// `(byte offset, byte size)` of every partition in use.
fn mbr_entries(file: &mut dyn DataFile) -> io::Result<Vec<(u64, u64)>> {
    let mut mbr = [0u8; SECTOR];
    file.seek(SeekFrom::Start(0))?;
    file.read_exact(&mut mbr)?;
    Ok(mbr[446..510].chunks_exact(16).filter_map(|entry| {
        let lba = u32::from_le_bytes([entry[8], entry[9],
                                      entry[10], entry[11]]);
        let sectors = u32::from_le_bytes([entry[12], entry[13],
                                          entry[14], entry[15]]);
        if entry[4] == 0 || sectors == 0 { return None }
        Some((lba as u64 * SECTOR as u64, sectors as u64 * SECTOR as u64))
    }).collect())
}

/// A DOS partition table reader, both as the stream back end for `/pN`
/// layers and as the lister of partitions.
struct Mbr;

impl StreamBackend for Mbr {
    fn open(&self, path_spec: &PathSpec, resolver: &Resolver)
        -> io::Result<Box<dyn DataFile>> {
        let index = path_spec.partition_index()
            .ok_or_else(|| io::Error::from(io::ErrorKind::InvalidInput))?;
        let mut parent = open_parent(path_spec, resolver)?;
        let (offset, size) = *mbr_entries(&mut *parent)?
            .get(index as usize)
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))?;
        Ok(Box::new(DataRange::new(parent, offset, size)))
    }
}

impl VolumeSystem for Mbr {
    fn volumes(&self, volume_system: &PathSpec, resolver: &Resolver)
        -> Result<Vec<PathSpec>> {
        let disk = volume_system.parent()
            .ok_or_else(|| Error::InvalidArgument("no disk".into()))?;
        let mut file = resolver.open_file_object(disk)?;
        let entries = mbr_entries(&mut *file)
            .map_err(|x| Error::backend(disk, x))?;
        entries.into_iter().enumerate().map(|(n, (offset, _))| {
            disk.push(TypeIndicator::TSK_PARTITION, PathSpecAttributes {
                location: Some(format!("/p{}", n + 1)),
                start_offset: Some(offset),
                ..Default::default()
            })
        }).collect()
    }
}

/// Volume shadow stores that all read the same as the volume they are on.
struct Shadows(u64);

impl StreamBackend for Shadows {
    fn open(&self, path_spec: &PathSpec, resolver: &Resolver)
        -> io::Result<Box<dyn DataFile>> {
        open_parent(path_spec, resolver)
    }
}

impl VolumeSystem for Shadows {
    fn volumes(&self, volume_system: &PathSpec, _: &Resolver)
        -> Result<Vec<PathSpec>> {
        let volume = volume_system.parent()
            .ok_or_else(|| Error::InvalidArgument("no volume".into()))?;
        (1 ..= self.0).map(|n| {
            volume.push(TypeIndicator::VSHADOW,
                        PathSpecAttributes::with_location(format!("/vss{}",
                                                                  n)))
        }).collect()
    }
}

/// What an unlocked encrypted volume decrypts to.
struct Decrypted(Vec<u8>);

impl StreamBackend for Decrypted {
    fn open(&self, _: &PathSpec, _: &Resolver)
        -> io::Result<Box<dyn DataFile>> {
        Ok(Box::new(Cursor::new(self.0.clone())))
    }
}

#[derive(Default)]
struct Recorder {
    asked: Rc<RefCell<Vec<String>>>,
    partitions: Vec<u64>,
    stores: Vec<u64>,
    unlock_with: Option<(Resolver, Vec<u8>)>,
}

impl VolumeScannerMediator for Recorder {
    fn partition_indices(&mut self, partitions: &[PathSpec])
        -> Result<Vec<u64>> {
        self.asked.borrow_mut().extend(partitions.iter()
                                       .map(|x| x.short_name()));
        Ok(self.partitions.clone())
    }
    fn vss_store_indices(&mut self, stores: &[PathSpec]) -> Result<Vec<u64>> {
        self.asked.borrow_mut().extend(stores.iter().map(|x| x.short_name()));
        Ok(self.stores.clone())
    }
    fn unlock_encrypted_volume(&mut self, encrypted_volume: &PathSpec)
        -> Result<bool> {
        self.asked.borrow_mut().push(encrypted_volume.short_name());
        match self.unlock_with.take() {
            Some((resolver, plaintext)) => {
                resolver.register_backend(
                    encrypted_volume.type_indicator().clone(),
                    Arc::new(Decrypted(plaintext)))?;
                Ok(true)
            },
            None => Ok(false),
        }
    }
}

fn ntfs(size: usize) -> Vec<u8> {
    let mut ret = b"\xeb\x52\x90NTFS    ".to_vec();
    ret.resize(size, 0);
    ret
}

fn ext(size: usize) -> Vec<u8> {
    let mut ret = vec![0u8; size];
    ret[1080..1082].copy_from_slice(b"\x53\xef");
    ret
}

fn bde(size: usize) -> Vec<u8> {
    let mut ret = b"\xeb\x58\x90-FVE-FS-".to_vec();
    ret.resize(size, 0);
    ret
}

/// An MBR followed by each partition, back to back from sector 1.
fn disk(partitions: &[Vec<u8>]) -> Vec<u8> {
    let mut ret = vec![0u8; SECTOR];
    ret[510] = 0x55;
    ret[511] = 0xaa;
    for (n, partition) in partitions.iter().enumerate() {
        let entry = 446 + n * 16;
        let lba = (ret.len() / SECTOR) as u32;
        let sectors = (partition.len() / SECTOR) as u32;
        ret[entry + 4] = 0x07;
        ret[entry + 8 .. entry + 12].copy_from_slice(&lba.to_le_bytes());
        ret[entry + 12 .. entry + 16].copy_from_slice(&sectors.to_le_bytes());
        ret.extend_from_slice(partition);
    }
    ret
}

fn setup(image: Vec<u8>) -> (VolumeScanner, Resolver, PathSpec) {
    let fs = FakeFileSystem::from_listing(&[
        ("/disk.raw", &image[..]),
        ("/notes.txt", b"just some text"),
    ]).unwrap();
    let resolver = Resolver::new();
    resolver.register_backend(TypeIndicator::FAKE, Arc::new(fs)).unwrap();
    resolver.register_backend(TypeIndicator::TSK_PARTITION, Arc::new(Mbr))
        .unwrap();
    resolver.register_backend(TypeIndicator::VSHADOW, Arc::new(Shadows(2)))
        .unwrap();
    let analyzer = Analyzer::with_default_helpers().unwrap();
    let mut scanner = VolumeScanner::new(analyzer, resolver.clone());
    scanner.register_volume_system(TypeIndicator::TSK_PARTITION,
                                   Arc::new(Mbr)).unwrap();
    scanner.register_volume_system(TypeIndicator::VSHADOW,
                                   Arc::new(Shadows(2))).unwrap();
    (scanner, resolver, PathSpec::fake("/disk.raw").unwrap())
}

fn chains(found: Vec<PathSpec>) -> Vec<Vec<String>> {
    found.iter()
        .map(|x| x.ancestors().map(|x| x.short_name()).collect())
        .collect()
}

fn two_partitions() -> Vec<u8> { disk(&[ntfs(2048), ext(2048)]) }

#[test] fn every_partition_without_mediator() {
    let (mut scanner, _, source) = setup(two_partitions());
    let found = scanner.base_path_specs(&source, &Default::default())
        .unwrap();
    assert_eq!(chains(found), [
        ["NTFS:/", "TSK_PARTITION:/p1", "FAKE:/disk.raw"],
        ["EXT:/", "TSK_PARTITION:/p2", "FAKE:/disk.raw"],
    ]);
    assert!(matches!(scanner.register_volume_system(
        TypeIndicator::VSHADOW, Arc::new(Shadows(1))),
                     Err(Error::DuplicateEntry(..))));
}

#[test] fn mediator_picks_partitions() {
    let (mut scanner, _, source) = setup(two_partitions());
    let asked = Rc::new(RefCell::new(vec![]));
    scanner.set_mediator(Box::new(Recorder {
        asked: asked.clone(),
        partitions: vec![1],
        ..Default::default()
    }));
    let found = scanner.base_path_specs(&source, &Default::default())
        .unwrap();
    assert_eq!(chains(found), [
        ["EXT:/", "TSK_PARTITION:/p2", "FAKE:/disk.raw"],
    ]);
    assert_eq!(*asked.borrow(), ["TSK_PARTITION:/p1", "TSK_PARTITION:/p2"]);
    // picking a partition that is not there
    scanner.set_mediator(Box::new(Recorder {
        partitions: vec![7],
        ..Default::default()
    }));
    assert!(matches!(scanner.base_path_specs(&source, &Default::default()),
                     Err(Error::NotFound(..))));
}

#[test] fn options_before_mediator() {
    let (mut scanner, _, source) = setup(two_partitions());
    let asked = Rc::new(RefCell::new(vec![]));
    scanner.set_mediator(Box::new(Recorder {
        asked: asked.clone(),
        ..Default::default()
    }));
    let first_only = VolumeScannerOptions {
        partitions: Some(VolumeSelection::Only(vec![0])),
        ..Default::default()
    };
    assert_eq!(chains(scanner.base_path_specs(&source, &first_only)
                      .unwrap()),
               [["NTFS:/", "TSK_PARTITION:/p1", "FAKE:/disk.raw"]]);
    // a selection naming a missing partition falls back to the offset
    let by_offset = VolumeScannerOptions {
        partitions: Some(VolumeSelection::Only(vec![0, 5])),
        partition_offset: Some(512 + 2048),
        ..Default::default()
    };
    assert_eq!(chains(scanner.base_path_specs(&source, &by_offset)
                      .unwrap()),
               [["EXT:/", "TSK_PARTITION:/p2", "FAKE:/disk.raw"]]);
    assert!(asked.borrow().is_empty());
}

#[test] fn shadow_stores() {
    let mut volume = ntfs(8192);
    volume[0x1e00 .. 0x1e10].copy_from_slice(
        b"\x6b\x87\x08\x38\x76\xc1\x48\x4e\xb7\xae\x04\x04\x6e\x6c\xc7\x52");
    let (mut scanner, _, source) = setup(disk(&[volume]));
    // nobody to ask, so just the current volume
    assert_eq!(chains(scanner.base_path_specs(&source, &Default::default())
                      .unwrap()),
               [["NTFS:/", "TSK_PARTITION:/p1", "FAKE:/disk.raw"]]);
    let asked = Rc::new(RefCell::new(vec![]));
    scanner.set_mediator(Box::new(Recorder {
        asked: asked.clone(),
        stores: vec![0, 1],
        ..Default::default()
    }));
    assert_eq!(chains(scanner.base_path_specs(&source, &Default::default())
                      .unwrap()), [
        vec!["NTFS:/", "TSK_PARTITION:/p1", "FAKE:/disk.raw"],
        vec!["NTFS:/", "VSHADOW:/vss2", "TSK_PARTITION:/p1", "FAKE:/disk.raw"],
        vec!["NTFS:/", "VSHADOW:/vss1", "TSK_PARTITION:/p1", "FAKE:/disk.raw"],
    ]);
    assert_eq!(*asked.borrow(), ["VSHADOW:/vss1", "VSHADOW:/vss2"]);
    let second_only = VolumeScannerOptions {
        vss_stores: Some(VolumeSelection::Only(vec![1])),
        ..Default::default()
    };
    assert_eq!(chains(scanner.base_path_specs(&source, &second_only)
                      .unwrap()).len(), 2);
}

#[test] fn encrypted_volumes() {
    let (mut scanner, resolver, source) = setup(disk(&[bde(2048),
                                                       ext(2048)]));
    let asked = Rc::new(RefCell::new(vec![]));
    scanner.set_mediator(Box::new(Recorder {
        asked: asked.clone(),
        ..Default::default()
    }));
    let all = VolumeScannerOptions {
        partitions: Some(VolumeSelection::All),
        ..Default::default()
    };
    assert_eq!(chains(scanner.base_path_specs(&source, &all).unwrap()),
               [["EXT:/", "TSK_PARTITION:/p2", "FAKE:/disk.raw"]]);
    assert_eq!(*asked.borrow(), ["BDE"]);
    scanner.set_mediator(Box::new(Recorder {
        unlock_with: Some((resolver, ntfs(2048))),
        ..Default::default()
    }));
    assert_eq!(chains(scanner.base_path_specs(&source, &all).unwrap()), [
        vec!["NTFS:/", "BDE", "TSK_PARTITION:/p1", "FAKE:/disk.raw"],
        vec!["EXT:/", "TSK_PARTITION:/p2", "FAKE:/disk.raw"],
    ]);
}

#[test] fn sources_without_file_systems() {
    let (mut scanner, _, _) = setup(disk(&[vec![0xa5; 2048]]));
    let notes = PathSpec::fake("/notes.txt").unwrap();
    assert_eq!(scanner.base_path_specs(&notes, &Default::default()).unwrap(),
               [notes]);
    let disk = PathSpec::fake("/disk.raw").unwrap();
    assert!(matches!(scanner.base_path_specs(&disk, &Default::default()),
                     Err(Error::NotFound(..))));
    let mut bare = VolumeScanner::new(Analyzer::with_default_helpers()
                                      .unwrap(), Resolver::new());
    assert!(matches!(bare.base_path_specs(&disk, &Default::default()),
                     Err(Error::Backend { .. })));
}
