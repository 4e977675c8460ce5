// Canonical byte encoding for blocks and transactions
//
// Integers are little-endian with fixed width; sequences and byte strings
// carry a VarInt length prefix.

use crate::error::{LedgerError, Result};
use std::io::{self, Read, Write};

/// Trait for types stored in the block database
pub trait Serializable {
    fn serialize(&self) -> Vec<u8>;
    fn deserialize(data: &[u8]) -> Result<Self> where Self: Sized;
}

/// Write a variable-length integer (VarInt)
pub fn write_varint<W: Write>(writer: &mut W, value: u64) -> io::Result<()> {
    match value {
        0..=0xfc => {
            writer.write_all(&[value as u8])?;
        }
        0xfd..=0xffff => {
            writer.write_all(&[0xfd])?;
            writer.write_all(&(value as u16).to_le_bytes())?;
        }
        0x10000..=0xffffffff => {
            writer.write_all(&[0xfe])?;
            writer.write_all(&(value as u32).to_le_bytes())?;
        }
        _ => {
            writer.write_all(&[0xff])?;
            writer.write_all(&value.to_le_bytes())?;
        }
    }
    Ok(())
}

/// Read a variable-length integer (VarInt)
pub fn read_varint<R: Read + ?Sized>(reader: &mut R) -> io::Result<u64> {
    let mut first_byte = [0u8; 1];
    reader.read_exact(&mut first_byte)?;

    match first_byte[0] {
        0..=0xfc => Ok(first_byte[0] as u64),
        0xfd => {
            let mut bytes = [0u8; 2];
            reader.read_exact(&mut bytes)?;
            Ok(u16::from_le_bytes(bytes) as u64)
        }
        0xfe => {
            let mut bytes = [0u8; 4];
            reader.read_exact(&mut bytes)?;
            Ok(u32::from_le_bytes(bytes) as u64)
        }
        0xff => {
            let mut bytes = [0u8; 8];
            reader.read_exact(&mut bytes)?;
            Ok(u64::from_le_bytes(bytes))
        }
    }
}

/// Write bytes with length prefix (VarInt length + data)
pub fn write_var_bytes<W: Write>(writer: &mut W, data: &[u8]) -> io::Result<()> {
    write_varint(writer, data.len() as u64)?;
    writer.write_all(data)?;
    Ok(())
}

/// Read bytes with length prefix
pub fn read_var_bytes<R: Read + ?Sized>(reader: &mut R) -> io::Result<Vec<u8>> {
    let len = read_varint(reader)? as usize;
    let mut data = Vec::new();
    // Bounded by what the reader actually holds, not by the untrusted prefix
    (&mut *reader).take(len as u64).read_to_end(&mut data)?;
    if data.len() != len {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated byte string"));
    }
    Ok(data)
}

/// Read a fixed-size array
pub fn read_array<const N: usize, R: Read + ?Sized>(reader: &mut R) -> io::Result<[u8; N]> {
    let mut bytes = [0u8; N];
    reader.read_exact(&mut bytes)?;
    Ok(bytes)
}

/// Read a collection length and reject counts larger than the bytes left
pub fn read_count<R: Read + ?Sized>(reader: &mut R, remaining: usize) -> Result<usize> {
    let count = read_varint(reader)? as usize;
    if count > remaining {
        return Err(LedgerError::Decode(format!(
            "Element count {} exceeds remaining {} bytes",
            count, remaining
        )));
    }
    Ok(count)
}
