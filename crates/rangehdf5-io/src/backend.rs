//! Positioned-read back-ends: local file, S3 object, in-memory buffer.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use crate::error::IoError;
use crate::url::{parse_url, BackendKind};

/// Positioned byte-range reads against an opened resource.
///
/// Implementations never cache and never interpret bytes. A read may
/// return fewer bytes than requested near the end of the resource; the
/// caller decides whether that is fatal.
pub trait RangeIo: Send {
    /// Read up to `dst.len()` bytes at absolute offset `pos`, returning
    /// the number of bytes read.
    fn read_at(&mut self, dst: &mut [u8], pos: u64) -> Result<usize, IoError>;
}

/// Open the back-end selected by `url`.
pub fn open_url(url: &str) -> Result<Box<dyn RangeIo>, IoError> {
    let (kind, resource) = parse_url(url)?;
    open_resource(kind, resource)
}

/// Open the back-end for an already-parsed URL.
pub fn open_resource(kind: BackendKind, resource: &str) -> Result<Box<dyn RangeIo>, IoError> {
    match kind {
        BackendKind::File => Ok(Box::new(FileBackend::open(resource)?)),
        BackendKind::S3 => Ok(Box::new(S3Backend::open(resource)?)),
    }
}

// ---------------------------------------------------------------------------
// FileBackend
// ---------------------------------------------------------------------------

/// Local-file back-end using seek + read.
#[derive(Debug)]
pub struct FileBackend {
    file: File,
}

impl FileBackend {
    /// Open the file at `path` for reading.
    pub fn open(path: &str) -> Result<FileBackend, IoError> {
        let file = File::open(path).map_err(|e| IoError::OpenFailed(format!("{path}: {e}")))?;
        Ok(FileBackend { file })
    }
}

impl RangeIo for FileBackend {
    fn read_at(&mut self, dst: &mut [u8], pos: u64) -> Result<usize, IoError> {
        self.file
            .seek(SeekFrom::Start(pos))
            .map_err(|e| IoError::Backend(format!("seek to 0x{pos:x}: {e}")))?;
        let mut total = 0;
        while total < dst.len() {
            match self.file.read(&mut dst[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(IoError::Backend(e.to_string())),
            }
        }
        Ok(total)
    }
}

// ---------------------------------------------------------------------------
// S3Backend
// ---------------------------------------------------------------------------

/// S3-style back-end issuing one blocking ranged GET per read.
///
/// The resource is `<bucket>/<key>`. The object URL is built from
/// `RANGEHDF5_S3_ENDPOINT` when set (path-style, for S3-compatible
/// stores), otherwise virtual-hosted-style AWS addressing with the
/// region from `AWS_REGION`. Credentials are not handled here; public
/// buckets and pre-signed or proxied endpoints work as-is.
#[derive(Debug)]
pub struct S3Backend {
    client: reqwest::blocking::Client,
    object_url: String,
}

impl S3Backend {
    /// Split `<bucket>/<key>` and prepare the HTTP client.
    pub fn open(resource: &str) -> Result<S3Backend, IoError> {
        let (bucket, key) = resource
            .split_once('/')
            .ok_or_else(|| IoError::InvalidUrl(format!("s3://{resource}")))?;
        if bucket.is_empty() || key.is_empty() {
            return Err(IoError::InvalidUrl(format!("s3://{resource}")));
        }
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| IoError::OpenFailed(e.to_string()))?;
        Ok(S3Backend {
            client,
            object_url: object_url(bucket, key),
        })
    }

    /// The HTTPS URL requests are issued against.
    pub fn object_url(&self) -> &str {
        &self.object_url
    }
}

fn object_url(bucket: &str, key: &str) -> String {
    if let Ok(endpoint) = std::env::var("RANGEHDF5_S3_ENDPOINT") {
        format!("{}/{bucket}/{key}", endpoint.trim_end_matches('/'))
    } else if let Ok(region) = std::env::var("AWS_REGION") {
        format!("https://{bucket}.s3.{region}.amazonaws.com/{key}")
    } else {
        format!("https://{bucket}.s3.amazonaws.com/{key}")
    }
}

impl RangeIo for S3Backend {
    fn read_at(&mut self, dst: &mut [u8], pos: u64) -> Result<usize, IoError> {
        if dst.is_empty() {
            return Ok(0);
        }
        let end = pos + dst.len() as u64 - 1;
        tracing::trace!(url = %self.object_url, pos, len = dst.len(), "s3 range get");
        let response = self
            .client
            .get(&self.object_url)
            .header(reqwest::header::RANGE, format!("bytes={pos}-{end}"))
            .send()
            .map_err(|e| IoError::Backend(e.to_string()))?;
        if !response.status().is_success() {
            return Err(IoError::Backend(format!(
                "{}: HTTP {}",
                self.object_url,
                response.status()
            )));
        }
        let body = response
            .bytes()
            .map_err(|e| IoError::Backend(e.to_string()))?;
        let n = body.len().min(dst.len());
        dst[..n].copy_from_slice(&body[..n]);
        Ok(n)
    }
}

// ---------------------------------------------------------------------------
// MemBackend
// ---------------------------------------------------------------------------

/// In-memory back-end used by tests and benchmarks.
#[derive(Debug, Clone, Default)]
pub struct MemBackend {
    data: Vec<u8>,
}

impl MemBackend {
    /// Wrap an owned byte vector.
    pub fn new(data: Vec<u8>) -> MemBackend {
        MemBackend { data }
    }

    /// Length of the backing buffer.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the backing buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl RangeIo for MemBackend {
    fn read_at(&mut self, dst: &mut [u8], pos: u64) -> Result<usize, IoError> {
        let pos = pos as usize;
        if pos >= self.data.len() {
            return Ok(0);
        }
        let n = dst.len().min(self.data.len() - pos);
        dst[..n].copy_from_slice(&self.data[pos..pos + n]);
        Ok(n)
    }
}
