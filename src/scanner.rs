use crate::*;

use std::{
    io, io::{Read, SeekFrom},
};

/// One signature that matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    /// The type whose specification owns the signature.
    pub type_indicator: TypeIndicator,
    /// Index of the signature within that specification.
    pub signature_index: usize,
    /// Absolute stream offset at which the pattern was found.
    pub offset: u64,
}

struct Pattern {
    type_indicator: TypeIndicator,
    signature_index: usize,
    signature: Signature,
}

/// Signatures closer together than this are read with one request.
const MERGE_GAP: u64 = 512;

/// Matches every signature of a specification store against a stream in
/// one pass.
///
/// Only the bytes under some pattern are read. Patterns that sit close
/// together share one read, so a store full of start-relative magic numbers
/// costs a single short read at the head of the stream.
pub struct SignatureScanner {
    patterns: Vec<Pattern>,
}

impl SignatureScanner {
    pub fn new(store: &FormatSpecificationStore) -> SignatureScanner {
        let mut patterns = Vec::new();
        for specification in store.iter() {
            for (signature_index, signature) in specification.signatures()
                .iter().enumerate() {
                patterns.push(Pattern {
                    type_indicator: specification.type_indicator().clone(),
                    signature_index,
                    signature: signature.clone(),
                });
            }
        }
        SignatureScanner { patterns }
    }
    pub fn number_of_signatures(&self) -> usize { self.patterns.len() }
    /// Scans `file` and returns every signature that matched at its exact
    /// offset, in store order.
    ///
    /// The stream position is restored before returning, so the caller can
    /// go on using the stream as if the scan never happened.
    pub fn scan(&self, file: &mut dyn DataFile) -> io::Result<Vec<ScanResult>> {
        if self.patterns.is_empty() { return Ok(vec![]) }
        let saved = file.stream_position()?;
        let result = self.scan_windows(file);
        let restored = file.seek(SeekFrom::Start(saved));
        let result = result?;
        restored?;
        Ok(result)
    }
    fn scan_windows(&self, file: &mut dyn DataFile)
        -> io::Result<Vec<ScanResult>> {
        let size = file.seek(SeekFrom::End(0))?;
        // (pattern, absolute position) for every pattern that fits
        let located: Vec<(&Pattern, u64)> = self.patterns.iter()
            .filter_map(|pattern| {
                let position = pattern.signature.offset()
                    .resolve(size, pattern.signature.pattern().len())?;
                Some((pattern, position))
            }).collect();
        let mut spans: Vec<(u64, u64)> = located.iter()
            .map(|&(pattern, position)| {
                (position, position + pattern.signature.pattern().len() as u64)
            }).collect();
        spans.sort_unstable();
        let mut merged: Vec<(u64, u64)> = Vec::with_capacity(spans.len());
        for (start, end) in spans {
            match merged.last_mut() {
                Some(last) if start <= last.1.saturating_add(MERGE_GAP) => {
                    last.1 = last.1.max(end);
                },
                _ => merged.push((start, end)),
            }
        }
        let mut windows = Vec::with_capacity(merged.len());
        for (start, end) in merged {
            windows.push((start, read_window(file, start, end - start)?));
        }
        let mut results = vec![];
        for (pattern, position) in located {
            let bytes = pattern.signature.pattern();
            let index = windows.partition_point(|x| x.0 <= position);
            let (window_start, window) = match index.checked_sub(1) {
                Some(x) => &windows[x],
                None => continue,
            };
            let start = (position - window_start) as usize;
            if window.get(start .. start + bytes.len()) == Some(bytes) {
                results.push(ScanResult {
                    type_indicator: pattern.type_indicator.clone(),
                    signature_index: pattern.signature_index,
                    offset: position,
                });
            }
        }
        Ok(results)
    }
}

fn read_window(file: &mut dyn DataFile, start: u64, len: u64)
    -> io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(start))?;
    let mut buf = Vec::new();
    file.take(len).read_to_end(&mut buf)?;
    Ok(buf)
}
