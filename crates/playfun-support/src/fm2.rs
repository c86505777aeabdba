//! Simplified FM2 movie reader and writer.
//!
//! Only a single gamepad on port 0 is supported and the movie is assumed to
//! start from hard power-on. Header metadata beyond what the writer emits is
//! ignored on read.

use crate::error::SupportError;
use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

/// Button letters in file order, first column = bit 7 (Right).
const BUTTON_LETTERS: [char; 8] = ['R', 'L', 'D', 'U', 'T', 'S', 'B', 'A'];

/// Reads the port-0 input byte of every record line in an FM2 movie.
///
/// Header key/value lines are skipped; each `|commands|PORT0|...|` record
/// contributes one byte. A character that is neither `.` nor a space presses
/// the button in that column.
pub fn read_inputs(path: impl AsRef<Path>) -> Result<Vec<u8>, SupportError> {
    let file = File::open(path.as_ref())?;
    let mut inputs = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let line = line.trim_start();
        if !line.starts_with('|') {
            continue;
        }
        let mut fields = line.split('|');
        fields.next(); // leading empty field
        let _commands = fields.next().ok_or_else(|| {
            SupportError::InvalidMovie(format!("record line has no command field: {line}"))
        })?;
        let port0 = fields.next().ok_or_else(|| {
            SupportError::InvalidMovie(format!("record line has no port-0 field: {line}"))
        })?;
        inputs.push(parse_joy(port0));
    }
    Ok(inputs)
}

fn parse_joy(field: &str) -> u8 {
    let mut mask = 0u8;
    for c in field.chars() {
        mask <<= 1;
        if c != '.' && c != ' ' {
            mask |= 1;
        }
    }
    mask
}

/// Writes a version-3 FM2 movie with one record per input byte.
pub fn write_inputs(
    path: impl AsRef<Path>,
    rom_filename: &str,
    rom_checksum: &str,
    inputs: &[u8],
) -> Result<(), SupportError> {
    write_inputs_with_subtitles(path, rom_filename, rom_checksum, inputs, &[])
}

/// Like [`write_inputs`], with `(frame, text)` subtitle lines in the header.
pub fn write_inputs_with_subtitles(
    path: impl AsRef<Path>,
    rom_filename: &str,
    rom_checksum: &str,
    inputs: &[u8],
    subtitles: &[(usize, String)],
) -> Result<(), SupportError> {
    let file = File::create(path.as_ref())?;
    let mut w = BufWriter::new(file);
    writeln!(w, "version 3")?;
    writeln!(w, "emuVersion 22020")?;
    writeln!(w, "rerecordCount 1")?;
    writeln!(w, "palFlag 0")?;
    writeln!(w, "romFilename {rom_filename}")?;
    writeln!(w, "romChecksum {rom_checksum}")?;
    writeln!(w, "guid 00000000-0000-0000-0000-000000000000")?;
    writeln!(w, "fourscore 0")?;
    writeln!(w, "microphone 0")?;
    writeln!(w, "port0 1")?;
    writeln!(w, "port1 0")?;
    writeln!(w, "port2 0")?;
    writeln!(w, "FDS 0")?;
    writeln!(w, "NewPPU 0")?;
    for (frame, text) in subtitles {
        writeln!(w, "subtitle {frame} {text}")?;
    }
    for &input in inputs {
        writeln!(w, "|0|{}||", input_to_string(input))?;
    }
    w.flush()?;
    Ok(())
}

/// 8-character `RLDUTSBA` rendering of an input byte, `.` for released.
pub fn input_to_string(input: u8) -> String {
    BUTTON_LETTERS
        .iter()
        .enumerate()
        .map(|(i, &letter)| {
            if input & (0x80 >> i) != 0 {
                letter
            } else {
                '.'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn input_rendering_follows_the_bit_layout() {
        assert_eq!(input_to_string(0), "........");
        assert_eq!(input_to_string(0x01), ".......A");
        assert_eq!(input_to_string(0x80), "R.......");
        assert_eq!(input_to_string(0x80 | 0x08 | 0x01), "R...T..A");
        assert_eq!(input_to_string(0xFF), "RLDUTSBA");
    }

    #[test]
    fn parse_joy_inverts_the_rendering() {
        for input in [0u8, 0x01, 0x42, 0x80, 0x99, 0xFF] {
            assert_eq!(parse_joy(&input_to_string(input)), input);
        }
    }

    #[test]
    fn write_then_read_preserves_inputs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("walk.fm2");
        let inputs = vec![0u8, 0, 0x80, 0x80, 0x81, 0x02, 0xFF, 0];
        write_inputs(&path, "smb.nes", "base64:Ww5XFVjIx5aTe5avRpVhxg==", &inputs).unwrap();
        assert_eq!(read_inputs(&path).unwrap(), inputs);
    }

    #[test]
    fn reader_skips_headers_and_blank_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("movie.fm2");
        std::fs::write(
            &path,
            "version 3\nromFilename x.nes\ncomment a | b\n\n|0|R.......||\n|0|.......A||\n",
        )
        .unwrap();
        assert_eq!(read_inputs(&path).unwrap(), vec![0x80, 0x01]);
    }

    #[test]
    fn subtitles_land_in_the_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sub.fm2");
        write_inputs_with_subtitles(
            &path,
            "smb.nes",
            "base64:Ww5XFVjIx5aTe5avRpVhxg==",
            &[0x10],
            &[(0, "hello".to_string())],
        )
        .unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("subtitle 0 hello"));
        assert_eq!(read_inputs(&path).unwrap(), vec![0x10]);
    }
}
