//! Reader/writer for the NanoVM container format (spec.md §6): a 24-byte
//! header followed by the raw assembled payload, little-endian throughout.
//!
//! ```text
//! offset  size  field
//! 0       4     magic        (0x6302_6302)
//! 4       4     crc32        (of payload; 0 means unchecked)
//! 8       8     load_offset
//! 16      8     entry_point
//! 24      ..    payload
//! ```

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::prelude::*;
use std::io::{BufReader, BufWriter};
use std::path::Path;

pub const MAGIC: u32 = 0x6302_6302;

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Container {
    payload: Vec<u8>,
    load_offset: u64,
    entry_point: u64,
}

impl Container {
    pub fn new(payload: Vec<u8>, load_offset: u64, entry_point: u64) -> Container {
        Container {
            payload,
            load_offset,
            entry_point,
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn load_offset(&self) -> u64 {
        self.load_offset
    }

    pub fn entry_point(&self) -> u64 {
        self.entry_point
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("bad magic number 0x{0:08x}, expected 0x{:08x}", MAGIC)]
    BadMagic(u32),
    #[error("crc32 mismatch: header says 0x{expected:08x}, payload hashes to 0x{actual:08x}")]
    CrcMismatch { expected: u32, actual: u32 },
}

/// The checksum covers everything after the magic: `load_offset`,
/// `entry_point`, and the payload (spec.md §6), not the payload alone.
fn checksum(load_offset: u64, entry_point: u64, payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&load_offset.to_le_bytes());
    hasher.update(&entry_point.to_le_bytes());
    hasher.update(payload);
    hasher.finalize()
}

/// Reads a container from `reader`. A stored crc32 of 0 skips verification
/// (the container is "unchecked"); any other value must match the computed
/// checksum of `load_offset` + `entry_point` + payload.
pub fn read<R: Read>(reader: &mut R) -> Result<Container, Error> {
    let magic = reader.read_u32::<LittleEndian>()?;
    if magic != MAGIC {
        return Err(Error::BadMagic(magic));
    }
    let crc32 = reader.read_u32::<LittleEndian>()?;
    let load_offset = reader.read_u64::<LittleEndian>()?;
    let entry_point = reader.read_u64::<LittleEndian>()?;

    let mut payload = Vec::new();
    reader.read_to_end(&mut payload)?;

    if crc32 != 0 {
        let actual = checksum(load_offset, entry_point, &payload);
        if actual != crc32 {
            return Err(Error::CrcMismatch { expected: crc32, actual });
        }
    }

    Ok(Container {
        payload,
        load_offset,
        entry_point,
    })
}

/// Writes `container` to `writer`, stamping a freshly computed checksum of
/// `load_offset` + `entry_point` + payload into the header.
pub fn write<W: Write>(writer: &mut W, container: &Container) -> Result<(), Error> {
    let crc32 = checksum(container.load_offset, container.entry_point, &container.payload);

    writer.write_u32::<LittleEndian>(MAGIC)?;
    writer.write_u32::<LittleEndian>(crc32)?;
    writer.write_u64::<LittleEndian>(container.load_offset)?;
    writer.write_u64::<LittleEndian>(container.entry_point)?;
    writer.write_all(&container.payload)?;
    Ok(())
}

pub trait ReadContainerExt: Read + Sized {
    fn read_container(&mut self) -> Result<Container, Error> {
        read(self)
    }
}

impl<R: Read + Sized> ReadContainerExt for R {}

pub trait WriteContainerExt: Write + Sized {
    fn write_container(&mut self, container: &Container) -> Result<(), Error> {
        write(self, container)
    }
}

impl<W: Write + Sized> WriteContainerExt for W {}

pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Container, Error> {
    BufReader::new(File::open(path)?).read_container()
}

pub fn write_file<P: AsRef<Path>>(path: P, container: &Container) -> Result<(), Error> {
    BufWriter::new(File::create(path)?).write_container(container)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let container = Container::new(vec![1, 2, 3, 4, 5, 6, 7, 8], 0x1000, 0x1000);
        let mut bytes = Vec::new();
        write(&mut bytes, &container).unwrap();
        let read_back = read(&mut bytes.as_slice()).unwrap();
        assert_eq!(read_back, container);
    }

    #[test]
    fn header_layout_matches_spec() {
        let container = Container::new(vec![0xAB, 0xCD], 0, 0x40);
        let mut bytes = Vec::new();
        write(&mut bytes, &container).unwrap();
        assert_eq!(bytes.len(), 24 + 2);
        assert_eq!(u32::from_le_bytes(bytes[0..4].try_into().unwrap()), MAGIC);
        assert_eq!(u64::from_le_bytes(bytes[16..24].try_into().unwrap()), 0x40);
        assert_eq!(&bytes[24..], &[0xAB, 0xCD]);
    }

    #[test]
    fn tampered_payload_is_rejected_when_crc_is_nonzero() {
        let container = Container::new(vec![1, 2, 3], 0, 0);
        let mut bytes = Vec::new();
        write(&mut bytes, &container).unwrap();
        *bytes.last_mut().unwrap() ^= 0xFF;
        let err = read(&mut bytes.as_slice()).unwrap_err();
        assert!(matches!(err, Error::CrcMismatch { .. }));
    }

    #[test]
    fn tampered_load_offset_is_rejected_even_with_untouched_payload() {
        let container = Container::new(vec![1, 2, 3], 0x10, 0x20);
        let mut bytes = Vec::new();
        write(&mut bytes, &container).unwrap();
        bytes[8] ^= 0xFF; // first byte of load_offset, payload left alone
        let err = read(&mut bytes.as_slice()).unwrap_err();
        assert!(matches!(err, Error::CrcMismatch { .. }));
    }

    #[test]
    fn zero_crc_skips_verification() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&MAGIC.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes());
        bytes.extend_from_slice(&[9, 9, 9]);
        let container = read(&mut bytes.as_slice()).unwrap();
        assert_eq!(container.payload(), &[9, 9, 9]);
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let mut bytes = vec![0u8; 24];
        bytes[0..4].copy_from_slice(&0u32.to_le_bytes());
        let err = read(&mut bytes.as_slice()).unwrap_err();
        assert!(matches!(err, Error::BadMagic(0)));
    }

    #[test]
    fn round_trip_through_a_file() {
        let path = std::env::temp_dir().join("nanovm_container_test.nvm");
        let container = Container::new(vec![10, 20, 30], 0, 0);
        write_file(&path, &container).unwrap();
        let read_back = read_file(&path).unwrap();
        assert_eq!(read_back, container);
        std::fs::remove_file(&path).unwrap();
    }
}
