//! TFRecord container framing.
//!
//! Each record is stored as:
//!
//! ```text
//! u64  length              (little endian)
//! u32  masked_crc32c(length bytes)
//! [u8] payload
//! u32  masked_crc32c(payload)
//! ```

use crate::error::{ConvertError, Result};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

const CRC32C_POLY: u32 = 0x82F6_3B78;
const MASK_DELTA: u32 = 0xa282_ead8;

const CRC32C_TABLE: [u32; 256] = build_crc32c_table();

const fn build_crc32c_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ CRC32C_POLY
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// CRC-32C (Castagnoli).
pub fn crc32c(data: &[u8]) -> u32 {
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc = CRC32C_TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize] ^ (crc >> 8);
    }
    !crc
}

/// CRC-32C rotated and offset as stored in TFRecord frames.
pub fn masked_crc32c(data: &[u8]) -> u32 {
    let crc = crc32c(data);
    ((crc >> 15) | (crc << 17)).wrapping_add(MASK_DELTA)
}

// ============================================================================
// Writer
// ============================================================================

/// Writes framed records to any [`Write`] sink.
pub struct RecordWriter<W: Write> {
    inner: W,
    records_written: usize,
}

impl RecordWriter<BufWriter<File>> {
    /// Create (or truncate) a record file.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> RecordWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            records_written: 0,
        }
    }

    /// Append one framed record.
    pub fn write_record(&mut self, payload: &[u8]) -> Result<()> {
        let len = (payload.len() as u64).to_le_bytes();
        self.inner.write_all(&len)?;
        self.inner.write_all(&masked_crc32c(&len).to_le_bytes())?;
        self.inner.write_all(payload)?;
        self.inner.write_all(&masked_crc32c(payload).to_le_bytes())?;
        self.records_written += 1;
        Ok(())
    }

    pub fn records_written(&self) -> usize {
        self.records_written
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    /// Flush and return the underlying sink.
    pub fn into_inner(mut self) -> Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

// ============================================================================
// Reader
// ============================================================================

/// Iterates framed records, verifying both checksums.
pub struct RecordReader<R: Read> {
    inner: R,
    done: bool,
}

impl RecordReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: Read> RecordReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, done: false }
    }

    /// Read the next payload, `Ok(None)` at a clean end of input.
    pub fn read_record(&mut self) -> Result<Option<Vec<u8>>> {
        let mut len_bytes = [0u8; 8];
        match read_full(&mut self.inner, &mut len_bytes)? {
            0 => return Ok(None),
            8 => {}
            n => {
                return Err(ConvertError::CorruptRecord(format!(
                    "truncated length header ({n} of 8 bytes)"
                )))
            }
        }
        let len_crc = self.read_u32()?;
        if len_crc != masked_crc32c(&len_bytes) {
            return Err(ConvertError::CorruptRecord(
                "length checksum mismatch".to_string(),
            ));
        }

        let len = u64::from_le_bytes(len_bytes);
        let len = usize::try_from(len).map_err(|_| {
            ConvertError::CorruptRecord(format!("record length {len} does not fit in memory"))
        })?;
        let mut payload = vec![0u8; len];
        self.inner.read_exact(&mut payload).map_err(eof_as_corrupt)?;

        let data_crc = self.read_u32()?;
        if data_crc != masked_crc32c(&payload) {
            return Err(ConvertError::CorruptRecord(
                "payload checksum mismatch".to_string(),
            ));
        }
        Ok(Some(payload))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.inner.read_exact(&mut buf).map_err(eof_as_corrupt)?;
        Ok(u32::from_le_bytes(buf))
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_record() {
            Ok(Some(payload)) => Some(Ok(payload)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

fn eof_as_corrupt(e: io::Error) -> ConvertError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        ConvertError::CorruptRecord("truncated record".to_string())
    } else {
        ConvertError::Io(e)
    }
}

/// Read until `buf` is full or the input ends; returns bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
