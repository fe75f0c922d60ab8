//! Local content sources for file uploads.
//!
//! A file's content may be a plain buffer or anything that reads like a
//! stream: an open file, a temporary file, or an arbitrary seekable reader.
//! [`ContentSource`] gives them one shape with a measurable length and a way
//! to drain them into a request body.

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use bytes::Bytes;
use tempfile::NamedTempFile;

/// A readable, rewindable stream that can move between threads.
pub trait ReadSeek: Read + Seek + Send + Sync {}

impl<T: Read + Seek + Send + Sync> ReadSeek for T {}

pub enum ContentSource {
    /// Content already in memory.
    Bytes(Bytes),
    /// Any seekable reader.
    Stream(Box<dyn ReadSeek>),
    /// An open file on disk.
    File(std::fs::File),
    /// A temporary file, removed when the source is dropped.
    TempFile(NamedTempFile),
}

impl ContentSource {
    pub fn from_reader(reader: impl ReadSeek + 'static) -> Self {
        Self::Stream(Box::new(reader))
    }

    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::File(std::fs::File::open(path)?))
    }

    /// Whether the source has read/rewind/close semantics rather than being
    /// a plain value.
    pub fn behaves_like_io(&self) -> bool {
        !matches!(self, Self::Bytes(_))
    }

    /// Total length in bytes.
    ///
    /// Streams are measured by seeking to the end and back, so the read
    /// position is unchanged afterwards.
    pub fn len(&mut self) -> io::Result<u64> {
        if let Self::Bytes(bytes) = self {
            return Ok(bytes.len() as u64);
        }
        let Some(reader) = self.reader() else {
            return Ok(0);
        };
        let pos = reader.stream_position()?;
        let end = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(pos))?;
        Ok(end)
    }

    pub fn is_empty(&mut self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    /// The whole content as a buffer.
    ///
    /// Streams are rewound before and after reading so the same source can
    /// be uploaded again.
    pub fn read_to_bytes(&mut self) -> io::Result<Bytes> {
        if let Self::Bytes(bytes) = self {
            return Ok(bytes.clone());
        }
        let Some(reader) = self.reader() else {
            return Ok(Bytes::new());
        };
        reader.rewind()?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        reader.rewind()?;
        Ok(Bytes::from(buf))
    }

    fn reader(&mut self) -> Option<&mut dyn ReadSeek> {
        match self {
            Self::Bytes(_) => None,
            Self::Stream(reader) => Some(reader.as_mut()),
            Self::File(file) => Some(file),
            Self::TempFile(file) => Some(file),
        }
    }
}

impl From<Bytes> for ContentSource {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for ContentSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

impl From<&[u8]> for ContentSource {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(Bytes::copy_from_slice(bytes))
    }
}

impl From<String> for ContentSource {
    fn from(s: String) -> Self {
        Self::Bytes(Bytes::from(s))
    }
}

impl From<&str> for ContentSource {
    fn from(s: &str) -> Self {
        Self::Bytes(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<std::fs::File> for ContentSource {
    fn from(file: std::fs::File) -> Self {
        Self::File(file)
    }
}

impl From<NamedTempFile> for ContentSource {
    fn from(file: NamedTempFile) -> Self {
        Self::TempFile(file)
    }
}

impl fmt::Debug for ContentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(bytes) => write!(f, "ContentSource::Bytes({} bytes)", bytes.len()),
            Self::Stream(_) => f.write_str("ContentSource::Stream"),
            Self::File(_) => f.write_str("ContentSource::File"),
            Self::TempFile(file) => write!(f, "ContentSource::TempFile({})", file.path().display()),
        }
    }
}
