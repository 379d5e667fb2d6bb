//! This example decodes a raw ProRes elementary stream (concatenated
//! `icpf` atoms, each prefixed with its 32-bit big-endian size) and
//! dumps the planes as little-endian 16-bit planar YUV(A).

// prores crate
extern crate prores;

// CLI crates
extern crate clap;

// Byteorder crate
extern crate byteorder;

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use clap::{App, Arg};

use prores::decoder::{Decoder, DecoderOptions};
use prores::frame::Frame;

// Writes a u16 buffer as little endian on a file.
#[inline(always)]
fn write_u16_le<W: Write>(
    file: &mut BufWriter<W>,
    buf16: &[u16],
) -> std::io::Result<()> {
    for &v in buf16 {
        file.write_u16::<LittleEndian>(v)?
    }
    Ok(())
}

// Writes the visible region of every plane of a frame.
fn write_frame<W: Write>(
    file: &mut BufWriter<W>,
    frame: &Frame,
) -> std::io::Result<()> {
    for plane in &frame.planes {
        for y in 0..plane.height {
            let row = &plane.data[y * plane.stride..];
            write_u16_le(file, &row[..plane.width])?;
        }
    }
    Ok(())
}

// Reads the next size-prefixed frame atom, size and magic included.
fn read_frame_atom<R: Read>(
    reader: &mut BufReader<R>,
) -> std::io::Result<Option<Vec<u8>>> {
    let size = match reader.read_u32::<BigEndian>() {
        Ok(size) => size as usize,
        Err(ref e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Ok(None)
        }
        Err(e) => return Err(e),
    };
    if size < 8 {
        return Ok(None);
    }

    let mut atom = vec![0u8; size];
    atom[0..4].copy_from_slice(&(size as u32).to_be_bytes());
    reader.read_exact(&mut atom[4..])?;
    Ok(Some(atom))
}

fn main() {
    let matches = App::new("prores-decoder")
        .about("Decodes a raw prores stream to planar 16-bit yuv")
        .arg(
            Arg::with_name("input")
                .short("i")
                .long("input")
                .takes_value(true)
                .required(true)
                .help("Raw prores input file"),
        )
        .arg(
            Arg::with_name("output")
                .short("o")
                .long("output")
                .takes_value(true)
                .required(true)
                .help("Planar yuv output file"),
        )
        .arg(
            Arg::with_name("tag")
                .short("t")
                .long("tag")
                .takes_value(true)
                .default_value("apch")
                .help("Codec four-cc of the stream"),
        )
        .get_matches();

    let input = matches.value_of("input").unwrap();
    let output = matches.value_of("output").unwrap();
    let tag = matches.value_of("tag").unwrap().as_bytes();
    if tag.len() != 4 {
        eprintln!("The codec tag must be exactly four characters");
        std::process::exit(1);
    }
    let mut codec_tag = [0u8; 4];
    codec_tag.copy_from_slice(tag);

    let mut reader =
        BufReader::new(File::open(Path::new(input)).unwrap());
    let mut writer =
        BufWriter::new(File::create(Path::new(output)).unwrap());

    let mut decoder =
        Decoder::new(codec_tag, DecoderOptions::default());
    println!("profile = {:?}", decoder.profile());

    let mut count = 0usize;
    while let Some(atom) = read_frame_atom(&mut reader).unwrap() {
        match decoder.decode_frame(&atom) {
            Ok(frame) => {
                println!(
                    "frame {} decoded at {}x{} ({:?}){}",
                    count,
                    frame.width,
                    frame.height,
                    frame.pix_fmt,
                    if frame.damaged { " [damaged]" } else { "" }
                );
                write_frame(&mut writer, &frame).unwrap();
            }
            Err(err) => {
                eprintln!("frame {} failed: {}", count, err);
                std::process::exit(1);
            }
        }
        count += 1;
    }

    println!("{} frames decoded.", count);
}
