//! Content sniffing and text decoding
//!
//! [`ContentSniffer`] is the default MIME and encoding sniffing service. It answers in the
//! `type; charset=VALUE` form that [`TypeClassifier`](crate::classify::TypeClassifier) parses.
//! [`Lines`] decodes a byte stream line by line once the codec is known.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufRead, Read};
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{CODEC_BINARY, SNIFF_SAMPLE_SIZE};

/// A MIME type and encoding sniffing service
///
/// Implementations return a single string such as `text/plain; charset=us-ascii` or
/// `application/zip; charset=binary`.
pub trait Sniffer: Send + Sync {
    /// Sniff the entry at `path`
    ///
    /// # Errors
    /// Returns error if the entry cannot be inspected.
    fn sniff(&self, path: &Path) -> Result<String>;
}

/// Character set of sniffed text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    /// Seven-bit ASCII
    UsAscii,
    /// Valid UTF-8 with at least one multi-byte sequence
    Utf8,
    /// Eight-bit text that is not UTF-8
    Latin1,
    /// Not text
    Binary,
}

impl Charset {
    /// The codec name reported for this charset
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UsAscii => "us-ascii",
            Self::Utf8 => "utf-8",
            Self::Latin1 => "iso-8859-1",
            Self::Binary => CODEC_BINARY,
        }
    }
}

/// Result of sniffing a byte sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sniff {
    /// Detected MIME type
    pub mime:    &'static str,
    /// Detected charset
    pub charset: Charset,
}

impl Sniff {
    const fn binary(mime: &'static str) -> Self {
        Self { mime, charset: Charset::Binary }
    }

    /// Returns true if the sample looks like text
    #[must_use]
    pub const fn is_text(&self) -> bool {
        !matches!(self.charset, Charset::Binary)
    }
}

impl fmt::Display for Sniff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}; charset={}", self.mime, self.charset.as_str())
    }
}

/// Statistical metrics gathered over a sample
#[derive(Debug, Default)]
struct TextStats {
    /// Number of null bytes found
    null_bytes:    usize,
    /// Number of control characters found
    control_chars: usize,
    /// Number of bytes with the high bit set
    high_bytes:    usize,
}

impl TextStats {
    fn collect(sample: &[u8]) -> Self {
        let mut stats = Self::default();
        for &byte in sample {
            if byte == 0 {
                stats.null_bytes += 1;
            }
            // Tab, line feed, vertical tab, form feed, carriage return, escape
            if byte < 32 && !matches!(byte, 9..=13 | 27) {
                stats.control_chars += 1;
            }
            if byte >= 128 {
                stats.high_bytes += 1;
            }
        }
        stats
    }
}

/// Default sniffer that inspects the leading bytes of a file
///
/// Symlinks are followed. Non-regular entries are reported as `inode/*` types.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContentSniffer;

impl ContentSniffer {
    /// Create a new sniffer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Sniff an in-memory sample
    ///
    /// `truncated` tells whether the sample was cut from a longer file, in which case a
    /// multi-byte sequence split at the end does not disqualify UTF-8.
    #[must_use]
    pub fn detect(sample: &[u8], truncated: bool) -> Sniff {
        if sample.is_empty() {
            return Sniff::binary("inode/x-empty");
        }
        if let Some(mime) = Self::binary_header(sample) {
            return Sniff::binary(mime);
        }

        let stats = TextStats::collect(sample);
        if stats.null_bytes > 0 || stats.control_chars * 10 > sample.len() {
            return Sniff::binary("application/octet-stream");
        }

        let charset = if stats.high_bytes == 0 {
            Charset::UsAscii
        } else {
            match std::str::from_utf8(sample) {
                Ok(_) => Charset::Utf8,
                Err(e) if truncated && e.error_len().is_none() => Charset::Utf8,
                Err(_) => Charset::Latin1,
            }
        };

        Sniff { mime: Self::text_mime(sample), charset }
    }

    /// Checks for common binary file headers
    fn binary_header(sample: &[u8]) -> Option<&'static str> {
        const HEADERS: [(&[u8], &str); 7] = [
            (b"PK\x03\x04", "application/zip"),
            (b"\x7FELF", "application/x-executable"),
            (b"\x89PNG", "image/png"),
            (b"GIF87a", "image/gif"),
            (b"GIF89a", "image/gif"),
            (b"\xFF\xD8\xFF", "image/jpeg"),
            (b"%PDF-", "application/pdf"),
        ];
        HEADERS.iter().find(|(magic, _)| sample.starts_with(magic)).map(|&(_, mime)| mime)
    }

    /// Picks a text subtype from the first bytes
    fn text_mime(sample: &[u8]) -> &'static str {
        let start = sample.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(sample);
        let start = &start[start.iter().take_while(|b| b.is_ascii_whitespace()).count()..];
        let head: Vec<u8> = start.iter().take(16).map(u8::to_ascii_lowercase).collect();

        if start.starts_with(b"#!") {
            "text/x-shellscript"
        } else if head.starts_with(b"<?xml") {
            "text/xml"
        } else if head.starts_with(b"<!doctype html") || head.starts_with(b"<html") {
            "text/html"
        } else if Self::looks_like_markdown(start) {
            "text/markdown"
        } else {
            "text/plain"
        }
    }

    fn looks_like_markdown(sample: &[u8]) -> bool {
        let is_heading = |line: &[u8]| {
            let hashes = line.iter().take_while(|&&b| b == b'#').count();
            (1..=6).contains(&hashes) && line.get(hashes) == Some(&b' ')
        };
        let is_list = |line: &[u8]| {
            line.starts_with(b"- ") || line.starts_with(b"* ") || line.starts_with(b"```")
        };

        let mut lines = sample.split(|&b| b == b'\n');
        if lines.next().is_some_and(is_heading) {
            return true;
        }
        let mut headings = 0;
        let mut lists = 0;
        for line in lines {
            if is_heading(line) {
                headings += 1;
            } else if is_list(line) {
                lists += 1;
            }
        }
        headings > 0 && lists > 0
    }
}

impl Sniffer for ContentSniffer {
    fn sniff(&self, path: &Path) -> Result<String> {
        let meta = fs::metadata(path)?;
        let file_type = meta.file_type();
        if file_type.is_dir() {
            return Ok(Sniff::binary("inode/directory").to_string());
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileTypeExt;
            let special = if file_type.is_fifo() {
                Some("inode/fifo")
            } else if file_type.is_socket() {
                Some("inode/socket")
            } else if file_type.is_char_device() {
                Some("inode/chardevice")
            } else if file_type.is_block_device() {
                Some("inode/blockdevice")
            } else {
                None
            };
            if let Some(mime) = special {
                return Ok(Sniff::binary(mime).to_string());
            }
        }

        let mut file = File::open(path)?;
        let mut sample = [0u8; SNIFF_SAMPLE_SIZE];
        let mut len = 0;
        while len < SNIFF_SAMPLE_SIZE {
            let n = file.read(&mut sample[len..])?;
            if n == 0 {
                break;
            }
            len += n;
        }
        let truncated = meta.len() > len as u64;

        Ok(Self::detect(&sample[..len], truncated).to_string())
    }
}

/// Decode one line of bytes with the given codec
///
/// # Errors
/// Returns [`Error::Undecodable`] if the bytes are not valid in `codec` or the codec is not a
/// text codec.
pub fn decode(bytes: Vec<u8>, codec: &str, name: &str) -> Result<String> {
    let undecodable = || Error::Undecodable { name: name.to_owned(), codec: codec.to_owned() };
    match codec.to_ascii_lowercase().as_str() {
        "us-ascii" | "ascii" | "utf-8" | "utf8" => {
            String::from_utf8(bytes).map_err(|_| undecodable())
        },
        "iso-8859-1" | "latin1" | "latin-1" => Ok(bytes.into_iter().map(char::from).collect()),
        _ => Err(undecodable()),
    }
}

/// Line iterator decoding each line with a fixed codec
///
/// Line terminators (`\n`, `\r\n`) are stripped. Decoding happens per line, so a malformed
/// line only fails once it is reached.
#[derive(Debug)]
pub struct Lines<R> {
    reader: R,
    codec:  String,
    name:   String,
}

impl<R: BufRead> Lines<R> {
    /// Create a line iterator over `reader`
    pub fn new(reader: R, codec: impl Into<String>, name: impl Into<String>) -> Self {
        Self { reader, codec: codec.into(), name: name.into() }
    }
}

impl<R: BufRead> Iterator for Lines<R> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut buf = Vec::new();
        match self.reader.read_until(b'\n', &mut buf) {
            Ok(0) => None,
            Ok(_) => {
                if buf.last() == Some(&b'\n') {
                    buf.pop();
                    if buf.last() == Some(&b'\r') {
                        buf.pop();
                    }
                }
                Some(decode(buf, &self.codec, &self.name))
            },
            Err(e) => Some(Err(e.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_empty_content() {
        let sniff = ContentSniffer::detect(&[], false);
        assert!(!sniff.is_text());
        assert_eq!(sniff.to_string(), "inode/x-empty; charset=binary");
    }

    #[test]
    fn test_plain_text() {
        let sniff = ContentSniffer::detect(b"Hello, world!\nThis is a test.\n", false);
        assert!(sniff.is_text());
        assert_eq!(sniff.to_string(), "text/plain; charset=us-ascii");
    }

    #[test]
    fn test_markdown_text() {
        let sniff = ContentSniffer::detect(b"# Heading\n\n* List item\n* Another item\n", false);
        assert_eq!(sniff.mime, "text/markdown");
        assert_eq!(sniff.charset, Charset::UsAscii);
    }

    #[test]
    fn test_shell_script() {
        let sniff = ContentSniffer::detect(b"#!/bin/sh\necho hi\n", false);
        assert_eq!(sniff.mime, "text/x-shellscript");
    }

    #[test]
    fn test_xml_and_html() {
        assert_eq!(ContentSniffer::detect(b"<?xml version=\"1.0\"?>\n<a/>", false).mime, "text/xml");
        assert_eq!(
            ContentSniffer::detect(b"  <!DOCTYPE HTML>\n<html></html>", false).mime,
            "text/html"
        );
    }

    #[test]
    fn test_binary_content() {
        let sniff = ContentSniffer::detect(b"PK\x03\x04\x00\x00\x00\x00", false);
        assert!(!sniff.is_text());
        assert_eq!(sniff.to_string(), "application/zip; charset=binary");

        let sniff = ContentSniffer::detect(b"abc\x00def", false);
        assert_eq!(sniff.to_string(), "application/octet-stream; charset=binary");
    }

    #[test]
    fn test_control_heavy_content_is_binary() {
        let content: Vec<u8> = (0..100u8).map(|i| (i % 8) + 1).collect();
        assert!(!ContentSniffer::detect(&content, false).is_text());
    }

    #[test]
    fn test_utf8_and_latin1() {
        let sniff = ContentSniffer::detect("caf\u{e9} cr\u{e8}me\n".as_bytes(), false);
        assert_eq!(sniff.charset, Charset::Utf8);

        let sniff = ContentSniffer::detect(b"caf\xe9 cr\xe8me\n", false);
        assert_eq!(sniff.charset, Charset::Latin1);
    }

    #[test]
    fn test_utf8_split_at_sample_boundary() {
        let bytes = "ab\u{e9}".as_bytes();
        let cut = &bytes[..bytes.len() - 1];
        assert_eq!(ContentSniffer::detect(cut, true).charset, Charset::Utf8);
        assert_eq!(ContentSniffer::detect(cut, false).charset, Charset::Latin1);
    }

    #[test]
    fn test_sniff_file_and_directory() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("notes.txt");
        fs::write(&file, "plain notes\n").unwrap();

        let sniffer = ContentSniffer::new();
        assert_eq!(sniffer.sniff(&file).unwrap(), "text/plain; charset=us-ascii");
        assert_eq!(sniffer.sniff(temp_dir.path()).unwrap(), "inode/directory; charset=binary");
        assert!(sniffer.sniff(&temp_dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_decode_codecs() {
        assert_eq!(decode(b"abc".to_vec(), "us-ascii", "x").unwrap(), "abc");
        assert_eq!(decode(vec![0x63, 0xe9], "iso-8859-1", "x").unwrap(), "c\u{e9}");
        assert!(matches!(decode(vec![0xff], "utf-8", "x"), Err(Error::Undecodable { .. })));
        assert!(matches!(decode(b"abc".to_vec(), "binary", "x"), Err(Error::Undecodable { .. })));
    }

    #[test]
    fn test_lines_strip_terminators() {
        let lines: Vec<String> = Lines::new(Cursor::new("one\r\ntwo\nthree"), "utf-8", "mem")
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(lines, ["one", "two", "three"]);
    }

    #[test]
    fn test_lines_fail_only_on_bad_line() {
        let mut lines = Lines::new(Cursor::new(b"good\n\xff\xfe\n".to_vec()), "utf-8", "mem");
        assert_eq!(lines.next().unwrap().unwrap(), "good");
        assert!(lines.next().unwrap().is_err());
        assert!(lines.next().is_none());
    }
}
