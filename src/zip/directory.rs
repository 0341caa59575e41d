//! In-memory ZIP central directory reader and entry materializer.
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the buffer's tail
//! 2. Read the Central Directory to index every entry by name
//! 3. For one entry, read its Local File Header and slice out the payload
//!
//! Nothing is decompressed while the index is built; the payload of an entry
//! is only touched when it is materialized. Materializing copies the
//! compressed bytes out of the archive buffer, so the caller can drop the
//! (much larger) buffer while holding on to a single entry.

use byteorder::{LittleEndian, ReadBytesExt};
use flate2::read::DeflateDecoder;
use std::collections::HashMap;
use std::io::{Cursor, Read};

use crate::error::{ExtractError, Result};

use super::structures::{
    ArchiveEntry, CDFH_SIGNATURE, CompressionMethod, EndOfCentralDirectory, LFH_SIGNATURE,
    LFH_SIZE,
};

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This bounds the backward search for the EOCD signature.
const MAX_COMMENT_SIZE: usize = 65535;

/// Name-indexed view of an archive's central directory.
///
/// Built once per archive with [`ArchiveDirectory::parse`]; lookups are
/// exact-match on entry name. The directory does not borrow the archive
/// buffer, so the same buffer is passed back in when an entry is read.
#[derive(Debug)]
pub struct ArchiveDirectory {
    entries: HashMap<String, ArchiveEntry>,
}

/// An owned copy of one entry's compressed payload.
///
/// Holds exactly `compressed_size` bytes sliced out of the archive, plus the
/// metadata needed to inflate them later. Independent of the source buffer.
#[derive(Debug, Clone)]
pub struct EntryData {
    pub name: String,
    pub method: CompressionMethod,
    pub uncompressed_size: u64,
    pub bytes: Vec<u8>,
}

impl EntryData {
    /// Inflate the payload in one shot, consuming the compressed copy.
    ///
    /// Suitable for the small metadata documents and the shared-string table;
    /// the worksheet stream goes through the chunked scanner instead.
    pub fn inflate(self) -> Result<Vec<u8>> {
        match self.method {
            CompressionMethod::Stored => Ok(self.bytes),
            CompressionMethod::Deflate => {
                let mut decoder = DeflateDecoder::new(&self.bytes[..]);
                let mut inflated = Vec::with_capacity(self.uncompressed_size as usize);
                decoder.read_to_end(&mut inflated).map_err(|e| {
                    ExtractError::MalformedArchive(format!(
                        "entry '{}' failed to inflate: {e}",
                        self.name
                    ))
                })?;
                Ok(inflated)
            }
            CompressionMethod::Unknown(method) => Err(ExtractError::MalformedArchive(format!(
                "entry '{}' uses unsupported compression method {method}",
                self.name
            ))),
        }
    }
}

impl ArchiveDirectory {
    /// Parse the central directory of a complete in-memory archive.
    ///
    /// No entry payload is read in this pass.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let eocd = find_eocd(data)?;

        let cd_start = eocd.cd_offset as usize;
        let cd_end = cd_start + eocd.cd_size as usize;
        if cd_end > data.len() {
            return Err(ExtractError::MalformedArchive(format!(
                "central directory extends past the end of the archive ({cd_end} > {})",
                data.len()
            )));
        }

        let mut cursor = Cursor::new(&data[cd_start..cd_end]);
        let mut entries = HashMap::with_capacity(eocd.total_entries as usize);

        for _ in 0..eocd.total_entries {
            let entry = parse_cdfh(&mut cursor)?;
            entries.insert(entry.name.clone(), entry);
        }

        Ok(Self { entries })
    }

    /// Look up an entry by exact name.
    pub fn get(&self, name: &str) -> Result<&ArchiveEntry> {
        self.entries
            .get(name)
            .ok_or_else(|| ExtractError::EntryMissing(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all indexed entries, in no particular order.
    pub fn entries(&self) -> impl Iterator<Item = &ArchiveEntry> {
        self.entries.values()
    }

    /// Copy one entry's compressed payload out of the archive buffer.
    ///
    /// The Local File Header's own name and extra-field lengths are read
    /// fresh: they may differ from the central directory's copies.
    pub fn materialize(&self, data: &[u8], name: &str) -> Result<EntryData> {
        let entry = self.get(name)?;
        let lfh_offset = entry.lfh_offset as usize;

        if lfh_offset + LFH_SIZE > data.len() {
            return Err(ExtractError::MalformedArchive(format!(
                "local header of entry '{name}' lies past the end of the archive"
            )));
        }
        if &data[lfh_offset..lfh_offset + 4] != LFH_SIGNATURE {
            return Err(ExtractError::MalformedArchive(format!(
                "local header signature missing for entry '{name}'"
            )));
        }

        // Variable field lengths sit at fixed offsets 26 and 28 within the LFH
        let mut cursor = Cursor::new(&data[lfh_offset + 26..lfh_offset + LFH_SIZE]);
        let name_len = cursor.read_u16::<LittleEndian>()? as usize;
        let extra_len = cursor.read_u16::<LittleEndian>()? as usize;

        let payload_start = lfh_offset + LFH_SIZE + name_len + extra_len;
        let payload_end = payload_start + entry.compressed_size as usize;
        if payload_end > data.len() {
            return Err(ExtractError::MalformedArchive(format!(
                "payload of entry '{name}' is truncated"
            )));
        }

        Ok(EntryData {
            name: entry.name.clone(),
            method: entry.compression_method,
            uncompressed_size: entry.uncompressed_size,
            bytes: data[payload_start..payload_end].to_vec(),
        })
    }

    /// Materialize and inflate one entry in a single call.
    pub fn inflate(&self, data: &[u8], name: &str) -> Result<Vec<u8>> {
        self.materialize(data, name)?.inflate()
    }
}

/// Find and parse the End of Central Directory record.
///
/// Fast path first: an archive without a trailing comment has the EOCD in the
/// final 22 bytes. Otherwise scan backward over at most the last 65,557 bytes
/// (maximum comment plus record size), validating each candidate signature
/// against its comment-length field.
fn find_eocd(data: &[u8]) -> Result<EndOfCentralDirectory> {
    if data.len() >= EndOfCentralDirectory::SIZE {
        let offset = data.len() - EndOfCentralDirectory::SIZE;
        let tail = &data[offset..];
        if &tail[0..4] == EndOfCentralDirectory::SIGNATURE && &tail[20..22] == b"\x00\x00" {
            return EndOfCentralDirectory::from_bytes(tail);
        }
    }

    let search_size = (MAX_COMMENT_SIZE + EndOfCentralDirectory::SIZE).min(data.len());
    let search_start = data.len() - search_size;
    let window = &data[search_start..];

    // Search backwards for the EOCD signature (PK\x05\x06)
    for i in (0..window.len().saturating_sub(EndOfCentralDirectory::SIZE - 1)).rev() {
        if &window[i..i + 4] == EndOfCentralDirectory::SIGNATURE {
            // A real EOCD's comment length matches the bytes remaining after it
            let comment_len = u16::from_le_bytes([window[i + 20], window[i + 21]]) as usize;
            if comment_len == window.len() - i - EndOfCentralDirectory::SIZE {
                return EndOfCentralDirectory::from_bytes(
                    &window[i..i + EndOfCentralDirectory::SIZE],
                );
            }
        }
    }

    Err(ExtractError::MalformedArchive(
        "End of Central Directory signature not found".to_string(),
    ))
}

/// Parse one Central Directory File Header at the cursor's position.
fn parse_cdfh(cursor: &mut Cursor<&[u8]>) -> Result<ArchiveEntry> {
    // Read and verify the signature (PK\x01\x02)
    let mut sig = [0u8; 4];
    cursor.read_exact(&mut sig)?;
    if sig != CDFH_SIGNATURE {
        return Err(ExtractError::MalformedArchive(
            "central directory record signature mismatch".to_string(),
        ));
    }

    let _version_made_by = cursor.read_u16::<LittleEndian>()?;
    let _version_needed = cursor.read_u16::<LittleEndian>()?;
    let _flags = cursor.read_u16::<LittleEndian>()?;
    let compression_method = cursor.read_u16::<LittleEndian>()?;
    let _last_mod_time = cursor.read_u16::<LittleEndian>()?;
    let _last_mod_date = cursor.read_u16::<LittleEndian>()?;
    let _crc32 = cursor.read_u32::<LittleEndian>()?;
    let compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let file_name_length = cursor.read_u16::<LittleEndian>()?;
    let extra_field_length = cursor.read_u16::<LittleEndian>()?;
    let file_comment_length = cursor.read_u16::<LittleEndian>()?;
    let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
    let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
    let _external_attrs = cursor.read_u32::<LittleEndian>()?;
    let lfh_offset = cursor.read_u32::<LittleEndian>()? as u64;

    // Entry names in this format are ASCII/UTF-8; decode lossily to stay
    // total on odd producers
    let mut name_bytes = vec![0u8; file_name_length as usize];
    cursor.read_exact(&mut name_bytes)?;
    let name = String::from_utf8_lossy(&name_bytes).to_string();

    // Extra field and comment are not used for anything here
    let skip = extra_field_length as u64 + file_comment_length as u64;
    cursor.set_position(cursor.position() + skip);

    Ok(ArchiveEntry {
        name,
        compression_method: CompressionMethod::from_u16(compression_method),
        compressed_size,
        uncompressed_size,
        lfh_offset,
    })
}
