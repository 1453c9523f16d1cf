use crate::*;

use std::io::{self, SeekFrom};

use FormatCategory::{
    Archive, CompressedStream, EncryptedVolume, StorageMediaImage, VolumeSystem,
};
use SignatureOffset::{End, Start};

/// Signature tables for the formats the analyzer knows out of the box:
/// `(type indicator, categories, [(pattern, offset)])`.
static SIGNATURES: &[(TypeIndicator, &[FormatCategory],
                     &[(&[u8], SignatureOffset)])] = &[
    (TypeIndicator::BZIP2, &[CompressedStream], &[
        (b"BZh", Start(0)),
    ]),
    (TypeIndicator::GZIP, &[CompressedStream], &[
        (b"\x1f\x8b", Start(0)),
    ]),
    (TypeIndicator::XZ, &[CompressedStream], &[
        (b"\xfd7zXZ\x00", Start(0)),
    ]),
    (TypeIndicator::CPIO, &[Archive], &[
        (b"070701", Start(0)),
        (b"070702", Start(0)),
        (b"070707", Start(0)),
    ]),
    (TypeIndicator::TAR, &[Archive], &[
        (b"ustar\x00", Start(257)),
        (b"ustar  \x00", Start(257)),
    ]),
    (TypeIndicator::ZIP, &[Archive], &[
        (b"PK\x03\x04", Start(0)),
        // end of central directory record, without a comment
        (b"PK\x05\x06", End(22)),
    ]),
    (TypeIndicator::EWF, &[StorageMediaImage], &[
        (b"EVF\x09\x0d\x0a\xff\x00", Start(0)),
        (b"LVF\x09\x0d\x0a\xff\x00", Start(0)),
    ]),
    (TypeIndicator::QCOW, &[StorageMediaImage], &[
        (b"QFI\xfb", Start(0)),
    ]),
    (TypeIndicator::VHDI, &[StorageMediaImage], &[
        (b"conectix", End(512)),
    ]),
    (TypeIndicator::VMDK, &[StorageMediaImage], &[
        (b"KDMV", Start(0)),
        (b"COWD", Start(0)),
        (b"# Disk DescriptorFile", Start(0)),
    ]),
    (TypeIndicator::APFS_CONTAINER, &[VolumeSystem], &[
        (b"NXSB", Start(32)),
    ]),
    (TypeIndicator::BDE, &[EncryptedVolume, VolumeSystem], &[
        (b"-FVE-FS-", Start(3)),
    ]),
    (TypeIndicator::FVDE, &[EncryptedVolume, VolumeSystem], &[
        (b"CS", Start(88)),
    ]),
    (TypeIndicator::GPT, &[VolumeSystem], &[
        (b"EFI PART", Start(512)),
    ]),
    (TypeIndicator::LUKSDE, &[EncryptedVolume, VolumeSystem], &[
        (b"LUKS\xba\xbe", Start(0)),
    ]),
    (TypeIndicator::VSHADOW, &[VolumeSystem], &[
        (b"\x6b\x87\x08\x38\x76\xc1\x48\x4e\xb7\xae\x04\x04\x6e\x6c\xc7\x52",
         Start(0x1e00)),
    ]),
    (TypeIndicator::APFS, &[FormatCategory::FileSystem], &[
        (b"NXSB", Start(32)),
    ]),
    (TypeIndicator::EXT, &[FormatCategory::FileSystem], EXT_SIGNATURES),
    (TypeIndicator::FAT, &[FormatCategory::FileSystem], FAT_SIGNATURES),
    (TypeIndicator::HFS, &[FormatCategory::FileSystem], HFS_SIGNATURES),
    (TypeIndicator::NTFS, &[FormatCategory::FileSystem], NTFS_SIGNATURES),
];

const EXT_SIGNATURES: &[(&[u8], SignatureOffset)] = &[
    (b"\x53\xef", Start(1080)),
];
const FAT_SIGNATURES: &[(&[u8], SignatureOffset)] = &[
    (b"FAT12   ", Start(54)),
    (b"FAT16   ", Start(54)),
    (b"FAT32   ", Start(82)),
];
const HFS_SIGNATURES: &[(&[u8], SignatureOffset)] = &[
    (b"H+\x00\x04", Start(1024)),
    (b"HX\x00\x05", Start(1024)),
];
const NTFS_SIGNATURES: &[(&[u8], SignatureOffset)] = &[
    (b"\xeb\x52\x90NTFS    ", Start(0)),
];

/// The Sleuthkit driver reads every one of these.
const TSK_SIGNATURES: &[&[(&[u8], SignatureOffset)]] = &[
    EXT_SIGNATURES, FAT_SIGNATURES, HFS_SIGNATURES, NTFS_SIGNATURES,
];

fn specification(type_indicator: TypeIndicator,
                 categories: &[FormatCategory],
                 signatures: &[(&[u8], SignatureOffset)])
    -> Result<FormatSpecification> {
    let mut ret = FormatSpecification::new(type_indicator,
                                           categories.iter().copied());
    for &(pattern, offset) in signatures {
        ret.add_signature(pattern, offset)?;
    }
    Ok(ret)
}

/// Every built-in helper, in registration order.
pub fn default_helpers() -> Result<Vec<AnalyzerHelper>> {
    let mut ret = Vec::with_capacity(SIGNATURES.len() + 2);
    for (type_indicator, categories, signatures) in SIGNATURES {
        ret.push(AnalyzerHelper::with_specification(
            specification(type_indicator.clone(), categories, signatures)?));
    }
    let mut tsk = FormatSpecification::new(TypeIndicator::TSK,
                                           [FormatCategory::FileSystem]);
    for signatures in TSK_SIGNATURES {
        for &(pattern, offset) in *signatures {
            tsk.add_signature(pattern, offset)?;
        }
    }
    ret.push(AnalyzerHelper::with_specification(tsk));
    ret.push(AnalyzerHelper::with_heuristic(TypeIndicator::TSK_PARTITION,
                                            [VolumeSystem],
                                            analyze_mbr));
    Ok(ret)
}

const MBR_SIZE: usize = 512;
const PARTITION_TABLE_OFFSET: usize = 446;
const PARTITION_ENTRY_SIZE: usize = 16;

/// Looks for a DOS partition table: the boot signature, four entries that
/// are each empty or well formed, and at least one that is in use.
fn analyze_mbr(file: &mut dyn DataFile) -> io::Result<Option<TypeIndicator>> {
    let mut mbr = [0u8; MBR_SIZE];
    file.seek(SeekFrom::Start(0))?;
    match file.read_exact(&mut mbr) {
        Ok(()) => (),
        Err(x) if x.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(x) => return Err(x),
    }
    if mbr[510] != 0x55 || mbr[511] != 0xaa { return Ok(None) }
    let mut in_use = 0;
    for entry in mbr[PARTITION_TABLE_OFFSET .. 510]
        .chunks_exact(PARTITION_ENTRY_SIZE) {
        let status = entry[0];
        let partition_type = entry[4];
        let sectors = u32::from_le_bytes([entry[12], entry[13],
                                          entry[14], entry[15]]);
        if status != 0x00 && status != 0x80 { return Ok(None) }
        if partition_type != 0 && sectors != 0 { in_use += 1 }
    }
    if in_use == 0 { Ok(None) }
    else { Ok(Some(TypeIndicator::TSK_PARTITION)) }
}
