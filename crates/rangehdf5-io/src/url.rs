//! URL recognition for read back-ends.

use crate::error::IoError;

/// Which back-end a URL selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Local filesystem, `file://<absolute-path>`.
    File,
    /// S3-style object store, `s3://<bucket>/<key>`.
    S3,
}

/// Split a URL into its back-end kind and the resource after `"//"`.
///
/// The resource is the filesystem path for `file://` and
/// `<bucket>/<key>` for `s3://`. Any other scheme fails.
pub fn parse_url(url: &str) -> Result<(BackendKind, &str), IoError> {
    if let Some(resource) = url.strip_prefix("file://") {
        Ok((BackendKind::File, resource))
    } else if let Some(resource) = url.strip_prefix("s3://") {
        Ok((BackendKind::S3, resource))
    } else {
        Err(IoError::InvalidUrl(url.to_string()))
    }
}
