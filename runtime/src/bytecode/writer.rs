//! Bytecode file writer, the exact mirror of the loader.

use crate::bytecode::BytecodeImage;
use byteorder::{LittleEndian, WriteBytesExt};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

pub fn write_image<W: Write>(image: &BytecodeImage, writer: &mut W) -> io::Result<()> {
    writer.write_u32::<LittleEndian>(image.strings.len() as u32)?;
    for s in &image.strings {
        writer.write_u32::<LittleEndian>(s.len() as u32)?;
        writer.write_all(s.as_bytes())?;
    }
    writer.write_u32::<LittleEndian>(image.code.len() as u32)?;
    writer.write_all(&image.code)?;
    Ok(())
}

pub fn write_file<P: AsRef<Path>>(image: &BytecodeImage, path: P) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_image(image, &mut writer)
}
