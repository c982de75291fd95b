use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::Result;

const CR: u8 = 0x0D;
const LF: u8 = 0x0A;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    Cr,
    CrLf,
}

impl LineEnding {
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            LineEnding::Lf => b"\n",
            LineEnding::Cr => b"\r",
            LineEnding::CrLf => b"\r\n",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LineEnding::Lf => "LF",
            LineEnding::Cr => "CR",
            LineEnding::CrLf => "CRLF",
        }
    }
}

/// Detects a file's newline convention by scanning byte pairs; the first
/// match wins. `Ok(None)` means undetectable (empty file); callers assume LF
/// and warn. A newline-less file classifies as LF, or CR if its last byte is
/// a CR.
pub fn detect(path: &Path) -> Result<Option<LineEnding>> {
    detect_from(BufReader::new(File::open(path)?))
}

fn detect_from<R: Read>(mut reader: R) -> Result<Option<LineEnding>> {
    let mut prev: Option<u8> = None;
    let mut buf = [0u8; 8192];

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        for &b in &buf[..n] {
            match (prev, b) {
                (Some(CR), LF) => return Ok(Some(LineEnding::CrLf)),
                (Some(CR), _) => return Ok(Some(LineEnding::Cr)),
                (_, LF) => return Ok(Some(LineEnding::Lf)),
                _ => {}
            }
            prev = Some(b);
        }
    }

    Ok(match prev {
        None => None,
        Some(CR) => Some(LineEnding::Cr),
        Some(_) => Some(LineEnding::Lf),
    })
}

/// Converts `input` from one newline convention to another, byte exact.
///
/// In a CRLF source only the exact two-byte pair is a line break; a lone CR
/// or a lone LF is a literal data byte and is copied unchanged. Single-byte
/// conventions treat every occurrence of their byte as a break. Never fails
/// on merely unusual content; errors are reserved for stream failures.
pub fn convert(input: &Path, from: LineEnding, output: &Path, to: LineEnding) -> Result<()> {
    let reader = BufReader::new(File::open(input)?);
    let mut writer = BufWriter::new(File::create(output)?);
    convert_stream(reader, from, &mut writer, to)?;
    writer.flush()?;
    Ok(())
}

pub(crate) fn convert_stream<R: Read, W: Write + ?Sized>(
    mut reader: R,
    from: LineEnding,
    writer: &mut W,
    to: LineEnding,
) -> Result<()> {
    let mut buf = [0u8; 8192];
    let mut pending_cr = false;

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        for &b in &buf[..n] {
            match from {
                LineEnding::CrLf => {
                    if pending_cr {
                        pending_cr = false;
                        if b == LF {
                            writer.write_all(to.as_bytes())?;
                            continue;
                        }
                        writer.write_all(&[CR])?;
                    }
                    if b == CR {
                        pending_cr = true;
                    } else {
                        writer.write_all(&[b])?;
                    }
                }
                LineEnding::Lf => {
                    if b == LF {
                        writer.write_all(to.as_bytes())?;
                    } else {
                        writer.write_all(&[b])?;
                    }
                }
                LineEnding::Cr => {
                    if b == CR {
                        writer.write_all(to.as_bytes())?;
                    } else {
                        writer.write_all(&[b])?;
                    }
                }
            }
        }
    }

    if pending_cr {
        writer.write_all(&[CR])?;
    }

    Ok(())
}
