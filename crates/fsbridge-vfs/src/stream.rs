//! Whole-file read and write streams.

use std::fmt;
use std::io::{self, Read, Write};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{FileSystemError, FsResult};

/// Character sets understood when turning file content into text.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum Charset {
    #[default]
    #[strum(to_string = "UTF-8", serialize = "UTF8")]
    #[serde(rename = "UTF-8", alias = "utf-8")]
    Utf8,
    #[strum(to_string = "US-ASCII", serialize = "ASCII")]
    #[serde(rename = "US-ASCII", alias = "us-ascii")]
    UsAscii,
    #[strum(to_string = "ISO-8859-1", serialize = "LATIN1")]
    #[serde(rename = "ISO-8859-1", alias = "iso-8859-1")]
    Iso8859_1,
}

impl Charset {
    /// Parse a charset label, mapping unknown labels to a filesystem error.
    pub fn parse(label: &str) -> FsResult<Self> {
        Charset::from_str(label.trim())
            .map_err(|_| FileSystemError::charset(format!("unsupported charset [{label}]")))
    }

    pub fn decode(self, bytes: Vec<u8>) -> FsResult<String> {
        match self {
            Charset::Utf8 => String::from_utf8(bytes)
                .map_err(|e| FileSystemError::charset(format!("content is not valid UTF-8: {e}"))),
            Charset::UsAscii => {
                if let Some(pos) = bytes.iter().position(|b| !b.is_ascii()) {
                    return Err(FileSystemError::charset(format!(
                        "content is not US-ASCII at byte {pos}"
                    )));
                }
                Ok(bytes.into_iter().map(char::from).collect())
            }
            Charset::Iso8859_1 => Ok(bytes.into_iter().map(char::from).collect()),
        }
    }

    pub fn encode(self, text: &str) -> FsResult<Vec<u8>> {
        match self {
            Charset::Utf8 => Ok(text.as_bytes().to_vec()),
            Charset::UsAscii => narrow(text, 0x7f, self),
            Charset::Iso8859_1 => narrow(text, 0xff, self),
        }
    }
}

fn narrow(text: &str, max: u32, charset: Charset) -> FsResult<Vec<u8>> {
    text.chars()
        .map(|c| {
            u8::try_from(c as u32)
                .ok()
                .filter(|b| u32::from(*b) <= max)
                .ok_or_else(|| {
                    FileSystemError::charset(format!("character {c:?} cannot be encoded as {charset}"))
                })
        })
        .collect()
}

// ============================================================================
// Writing
// ============================================================================

/// Write side of `create_file` / `append_file`.
///
/// Content is guaranteed visible only after [`WriteStream::close`]
/// returns. Dropping an unclosed stream commits best-effort and logs
/// failures, so callers that care about the outcome close explicitly.
pub trait WriteStream: Write + Send {
    /// Flush and commit, reporting the backend's verdict.
    fn close(self: Box<Self>) -> FsResult<()>;
}

// ============================================================================
// Reading
// ============================================================================

/// Read side of `read_file` / `read_attachment`.
pub struct FileStream {
    reader: Box<dyn Read + Send>,
    charset: Option<Charset>,
}

impl FileStream {
    pub fn new(reader: impl Read + Send + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            charset: None,
        }
    }

    /// Stream over an owned buffer.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::new(io::Cursor::new(bytes))
    }

    pub fn with_charset(mut self, charset: Option<Charset>) -> Self {
        self.charset = charset;
        self
    }

    pub fn charset(&self) -> Option<Charset> {
        self.charset
    }

    /// Drain the stream.
    pub fn into_bytes(mut self) -> FsResult<Vec<u8>> {
        let mut buf = Vec::new();
        self.reader
            .read_to_end(&mut buf)
            .map_err(|e| FileSystemError::io("cannot read stream", e))?;
        Ok(buf)
    }

    /// Drain and decode with the stream's charset (UTF-8 when unset).
    pub fn into_string(self) -> FsResult<String> {
        let charset = self.charset.unwrap_or_default();
        charset.decode(self.into_bytes()?)
    }
}

impl Read for FileStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl fmt::Debug for FileStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStream")
            .field("charset", &self.charset)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charset_labels() {
        assert_eq!(Charset::parse("utf-8").unwrap(), Charset::Utf8);
        assert_eq!(Charset::parse("ISO-8859-1").unwrap(), Charset::Iso8859_1);
        assert_eq!(Charset::parse("us-ascii").unwrap(), Charset::UsAscii);
        assert_eq!(Charset::Iso8859_1.to_string(), "ISO-8859-1");
        assert!(Charset::parse("EBCDIC").is_err());
    }

    #[test]
    fn test_latin1_decode() {
        let text = Charset::Iso8859_1.decode(vec![0x63, 0x61, 0x66, 0xe9]).unwrap();
        assert_eq!(text, "café");
        assert_eq!(Charset::Iso8859_1.encode("café").unwrap(), vec![0x63, 0x61, 0x66, 0xe9]);
    }

    #[test]
    fn test_ascii_rejects_high_bytes() {
        assert!(Charset::UsAscii.decode(vec![0xe9]).is_err());
        assert!(Charset::UsAscii.encode("é").is_err());
        assert!(Charset::Iso8859_1.encode("€").is_err());
    }

    #[test]
    fn test_stream_into_string() {
        let stream = FileStream::from_bytes(b"hello".to_vec());
        assert_eq!(stream.into_string().unwrap(), "hello");

        let stream = FileStream::from_bytes(vec![0xe9]).with_charset(Some(Charset::Iso8859_1));
        assert_eq!(stream.charset(), Some(Charset::Iso8859_1));
        assert_eq!(stream.into_string().unwrap(), "é");
    }

    #[test]
    fn test_invalid_utf8() {
        let stream = FileStream::from_bytes(vec![0xff, 0xfe]);
        assert!(stream.into_string().is_err());
    }
}
