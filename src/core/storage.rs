//! Save/restore of aggregate result tables.
//!
//! The engine itself has no persistence format; what the measurement side
//! needs is an opaque dump of a serializable parameter→result mapping
//! (e.g. beta → per-round support curve). Payloads are serde_json encoded
//! and stored as one LZ4 block behind a magic/version header.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

pub const MAGIC: &[u8; 8] = b"NEMORA01";
pub const VERSION_V1: u32 = 1;

/// Write `value` as a compressed result table.
pub fn sim_save_to<W: Write, T: Serialize>(w: &mut W, value: &T) -> io::Result<()> {
    let payload = serde_json::to_vec(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let compressed = lz4_flex::compress(&payload);
    w.write_all(MAGIC)?;
    write_u32_le(w, VERSION_V1)?;
    let uncompressed_len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "result table too large"))?;
    write_u32_le(w, uncompressed_len)?;
    w.write_all(&compressed)
}

/// Read back a result table written by [`sim_save_to`].
pub fn sim_load_from<R: Read, T: DeserializeOwned>(r: &mut R) -> io::Result<T> {
    let magic = read_exact::<8, _>(r)?;
    if &magic != MAGIC {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "bad result table magic",
        ));
    }
    let version = read_u32_le(r)?;
    if version != VERSION_V1 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "unsupported result table version",
        ));
    }
    let uncompressed_len = read_u32_le(r)? as usize;
    let mut compressed = Vec::new();
    r.read_to_end(&mut compressed)?;
    let payload = lz4_flex::decompress(&compressed, uncompressed_len)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "lz4 decompression failed"))?;
    serde_json::from_slice(&payload).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Save a result table to a file.
pub fn sim_save<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    sim_save_to(&mut w, value)?;
    w.flush()
}

/// Load a result table from a file.
pub fn sim_load<P: AsRef<Path>, T: DeserializeOwned>(path: P) -> io::Result<T> {
    let mut r = BufReader::new(File::open(path)?);
    sim_load_from(&mut r)
}

fn write_u32_le<W: Write>(w: &mut W, v: u32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn read_u32_le<R: Read>(r: &mut R) -> io::Result<u32> {
    Ok(u32::from_le_bytes(read_exact::<4, _>(r)?))
}

fn read_exact<const N: usize, R: Read>(r: &mut R) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::io::Cursor;

    #[test]
    fn roundtrip_parameter_table() {
        let mut table: BTreeMap<String, Vec<u32>> = BTreeMap::new();
        table.insert("0.05".to_string(), vec![100, 180, 240, 260]);
        table.insert("0.10".to_string(), vec![100, 150, 170, 175]);

        let mut buf = Vec::new();
        sim_save_to(&mut buf, &table).unwrap();

        let mut cursor = Cursor::new(&buf);
        let loaded: BTreeMap<String, Vec<u32>> = sim_load_from(&mut cursor).unwrap();
        assert_eq!(loaded, table);
    }

    #[test]
    fn roundtrip_tuple_rows() {
        let rows: Vec<(f64, Vec<usize>)> = vec![(0.01, vec![1, 2, 3]), (0.05, vec![4, 5])];
        let mut buf = Vec::new();
        sim_save_to(&mut buf, &rows).unwrap();
        let loaded: Vec<(f64, Vec<usize>)> = sim_load_from(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(loaded, rows);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut buf = Vec::new();
        sim_save_to(&mut buf, &vec![1u32, 2, 3]).unwrap();
        buf[0] = b'X';
        let err = sim_load_from::<_, Vec<u32>>(&mut Cursor::new(&buf)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn rejects_unknown_version() {
        let mut buf = Vec::new();
        sim_save_to(&mut buf, &vec![1u32]).unwrap();
        buf[8] = 0xFF;
        let err = sim_load_from::<_, Vec<u32>>(&mut Cursor::new(&buf)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn rejects_truncated_payload() {
        let mut buf = Vec::new();
        sim_save_to(&mut buf, &vec![1u32; 1000]).unwrap();
        buf.truncate(buf.len() - 4);
        assert!(sim_load_from::<_, Vec<u32>>(&mut Cursor::new(&buf)).is_err());
    }
}
