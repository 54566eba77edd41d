//! The on-disk record format shared by [`crate::datastore::DataStore`]
//! (append-only writer) and [`crate::builder`]/[`crate::reader`] (compacted
//! index reader). A record is:
//!
//! ```text
//! id_len: u32 LE
//! id: [u8; id_len]
//! vector: [f32; dims] LE
//! ```
//!
//! Raw data files and built index files use the same record layout; the
//! built index file additionally carries a fixed [`Header`] up front so a
//! reader never has to guess the dimensionality of what it is scanning.

use std::io::{self, Read, Write};

pub const MAGIC: [u8; 4] = *b"VDB1";

#[derive(Debug, Clone, Copy)]
pub struct Header {
  pub dims: u32,
  pub count: u64,
}

impl Header {
  pub const LEN: usize = 4 + 4 + 8;

  pub fn write(&self, w: &mut impl Write) -> io::Result<()> {
    w.write_all(&MAGIC)?;
    w.write_all(&self.dims.to_le_bytes())?;
    w.write_all(&self.count.to_le_bytes())?;
    Ok(())
  }

  pub fn read(r: &mut impl Read) -> io::Result<Self> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if magic != MAGIC {
      return Err(io::Error::new(io::ErrorKind::InvalidData, "bad index file magic"));
    }
    let mut dims_buf = [0u8; 4];
    r.read_exact(&mut dims_buf)?;
    let mut count_buf = [0u8; 8];
    r.read_exact(&mut count_buf)?;
    Ok(Self {
      dims: u32::from_le_bytes(dims_buf),
      count: u64::from_le_bytes(count_buf),
    })
  }
}

pub fn write_record(w: &mut impl Write, id: &[u8], vector: &[f32]) -> io::Result<()> {
  w.write_all(&(id.len() as u32).to_le_bytes())?;
  w.write_all(id)?;
  for component in vector {
    w.write_all(&component.to_le_bytes())?;
  }
  Ok(())
}

/// One decoded `(id, vector)` record, borrowed from an in-memory buffer.
pub struct RecordRef<'a> {
  pub id: &'a [u8],
  pub vector: &'a [f32],
}

/// Iterates records out of a byte buffer that holds only records (no
/// header) — used both for the raw data file and, after skipping
/// [`Header::LEN`] bytes, for a built index file.
///
/// `vector` is backed by a small scratch buffer reused across calls rather
/// than allocated per-record, since readers scan every record per query.
pub struct RecordReader<'a> {
  buf: &'a [u8],
  pos: usize,
  dims: usize,
  scratch: Vec<f32>,
}

impl<'a> RecordReader<'a> {
  pub fn new(buf: &'a [u8], dims: usize) -> Self {
    Self {
      buf,
      pos: 0,
      dims,
      scratch: vec![0.0; dims],
    }
  }

  /// Advance to the next record, decoding the vector into the internal
  /// scratch buffer. Returns `None` at end of buffer or on truncation.
  pub fn next(&mut self) -> Option<RecordRef<'_>> {
    if self.pos + 4 > self.buf.len() {
      return None;
    }
    let id_len = u32::from_le_bytes(self.buf[self.pos..self.pos + 4].try_into().unwrap()) as usize;
    self.pos += 4;
    if self.pos + id_len > self.buf.len() {
      return None;
    }
    let id = &self.buf[self.pos..self.pos + id_len];
    self.pos += id_len;

    let vec_bytes = self.dims * 4;
    if self.pos + vec_bytes > self.buf.len() {
      return None;
    }
    for i in 0..self.dims {
      let start = self.pos + i * 4;
      self.scratch[i] = f32::from_le_bytes(self.buf[start..start + 4].try_into().unwrap());
    }
    self.pos += vec_bytes;

    Some(RecordRef {
      id,
      vector: &self.scratch,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn round_trips_records() {
    let mut buf = Vec::new();
    write_record(&mut buf, b"\x01", &[1.0, 2.0, 3.0]).unwrap();
    write_record(&mut buf, b"\x02", &[4.0, 5.0, 6.0]).unwrap();

    let mut reader = RecordReader::new(&buf, 3);
    let r1 = reader.next().unwrap();
    assert_eq!(r1.id, b"\x01");
    assert_eq!(r1.vector, &[1.0, 2.0, 3.0]);
    let r2 = reader.next().unwrap();
    assert_eq!(r2.id, b"\x02");
    assert_eq!(r2.vector, &[4.0, 5.0, 6.0]);
    assert!(reader.next().is_none());
  }

  #[test]
  fn header_round_trips() {
    let header = Header { dims: 128, count: 42 };
    let mut buf = Vec::new();
    header.write(&mut buf).unwrap();
    let parsed = Header::read(&mut &buf[..]).unwrap();
    assert_eq!(parsed.dims, 128);
    assert_eq!(parsed.count, 42);
  }

  #[test]
  fn rejects_bad_magic() {
    let buf = [0u8; Header::LEN];
    assert!(Header::read(&mut &buf[..]).is_err());
  }
}
