//! Bytecode file reader.
//!
//! File layout (little-endian): `u32` string count; per string a `u32`
//! length and that many UTF-8 bytes; `u32` code size; the code bytes.

use crate::bytecode::BytecodeImage;
use byteorder::{LittleEndian, ReadBytesExt};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use thiserror::Error;

/// Upper bound on a single declared length. Anything larger is a
/// corrupt header rather than a real payload.
const MAX_SEGMENT_LEN: u32 = 0x0FFF_FFFF;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid bytecode format: {0}")]
    InvalidFormat(String),
}

pub fn read_image<R: Read>(reader: &mut R) -> Result<BytecodeImage, LoadError> {
    let string_count = reader.read_u32::<LittleEndian>()?;
    if string_count > MAX_SEGMENT_LEN {
        return Err(LoadError::InvalidFormat(format!(
            "string count out of range: {}",
            string_count
        )));
    }

    let mut strings = Vec::with_capacity(string_count.min(1024) as usize);
    for _ in 0..string_count {
        let len = reader.read_u32::<LittleEndian>()?;
        if len > MAX_SEGMENT_LEN {
            return Err(LoadError::InvalidFormat(format!(
                "string length out of range: {}",
                len
            )));
        }
        let mut bytes = vec![0u8; len as usize];
        reader.read_exact(&mut bytes)?;
        strings.push(String::from_utf8_lossy(&bytes).into_owned());
    }

    let code_size = reader.read_u32::<LittleEndian>()?;
    if code_size > MAX_SEGMENT_LEN {
        return Err(LoadError::InvalidFormat(format!(
            "code size out of range: {}",
            code_size
        )));
    }
    let mut code = vec![0u8; code_size as usize];
    reader.read_exact(&mut code)?;

    Ok(BytecodeImage { strings, code })
}

pub fn load_file<P: AsRef<Path>>(path: P) -> Result<BytecodeImage, LoadError> {
    let mut reader = BufReader::new(File::open(path)?);
    read_image(&mut reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::write_image;
    use byteorder::WriteBytesExt;
    use std::io::Cursor;

    fn sample_image() -> BytecodeImage {
        BytecodeImage {
            strings: vec!["hello".to_string(), "\n".to_string()],
            code: vec![0x01, 0x2A, 0x00, 0x00, 0x00, 0xFF],
        }
    }

    #[test]
    fn test_read_back_written_image() {
        let image = sample_image();
        let mut buf = Vec::new();
        write_image(&image, &mut buf).unwrap();

        let mut cursor = Cursor::new(buf);
        let loaded = read_image(&mut cursor).unwrap();
        assert_eq!(loaded, image);
    }

    #[test]
    fn test_empty_image() {
        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(0).unwrap(); // no strings
        buf.write_u32::<LittleEndian>(0).unwrap(); // no code

        let loaded = read_image(&mut Cursor::new(buf)).unwrap();
        assert!(loaded.strings.is_empty());
        assert!(loaded.code.is_empty());
    }

    #[test]
    fn test_truncated_file_is_io_error() {
        let image = sample_image();
        let mut buf = Vec::new();
        write_image(&image, &mut buf).unwrap();

        for truncate_at in [0, 3, 5, 9, buf.len() - 1] {
            let mut truncated = buf.clone();
            truncated.truncate(truncate_at);
            let result = read_image(&mut Cursor::new(truncated));
            assert!(matches!(result, Err(LoadError::Io(_))), "at {}", truncate_at);
        }
    }

    #[test]
    fn test_absurd_string_count_rejected() {
        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(u32::MAX).unwrap();
        let result = read_image(&mut Cursor::new(buf));
        assert!(matches!(result, Err(LoadError::InvalidFormat(_))));
    }

    #[test]
    fn test_absurd_code_size_rejected() {
        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(0).unwrap();
        buf.write_u32::<LittleEndian>(u32::MAX).unwrap();
        let result = read_image(&mut Cursor::new(buf));
        assert!(matches!(result, Err(LoadError::InvalidFormat(_))));
    }

    #[test]
    fn test_unicode_strings_survive() {
        let image = BytecodeImage {
            strings: vec!["héllo wörld ✓".to_string()],
            code: vec![0xFF],
        };
        let mut buf = Vec::new();
        write_image(&image, &mut buf).unwrap();
        let loaded = read_image(&mut Cursor::new(buf)).unwrap();
        assert_eq!(loaded.strings[0], "héllo wörld ✓");
    }

    #[test]
    fn test_load_file() {
        let image = sample_image();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.ash");
        crate::bytecode::write_file(&image, &path).unwrap();

        let loaded = load_file(&path).unwrap();
        assert_eq!(loaded, image);
    }

    #[test]
    fn test_missing_file() {
        let result = load_file("/no/such/path.ash");
        assert!(matches!(result, Err(LoadError::Io(_))));
    }
}
