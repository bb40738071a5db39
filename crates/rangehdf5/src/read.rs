//! The public entry point.

use std::sync::Arc;

use tracing::{debug, debug_span};

use rangehdf5_format::{data_read, meta_url, FileSession, MetaMemo};
use rangehdf5_io::backend::open_resource;
use rangehdf5_io::cache::IoCache;
use rangehdf5_io::url::parse_url;

use crate::error::{Error, ErrorKind};
use crate::slab::{build_slab, Slab, ValType};

/// Pass as `numrows` to read from `startrow` to the end of the first
/// dimension.
pub const ALL_ROWS: i64 = i64::MAX;

/// Read rows `[startrow, startrow + numrows)` of `dataset` from the
/// HDF5 file at `url`, returning one contiguous [`Slab`].
///
/// `url` is `file://<path>` or `s3://<bucket>/<key>`. When the dataset
/// has more than one column per row, the single column `col` is
/// extracted. `valtype` requests coercion of every element to 32-bit
/// signed integers ([`ValType::Integer`]) or 64-bit floats
/// ([`ValType::Real`]); [`ValType::Dynamic`] returns the stored bytes.
/// Passing a shared `cache` lets concurrent reads of the same file
/// reuse each other's I/O; otherwise the call owns a private cache.
///
/// Metadata parsed for a `(url, dataset)` pair is memoised
/// process-wide: repeat reads skip the parser phase and only fetch
/// data.
pub fn read(
    url: &str,
    dataset: &str,
    valtype: ValType,
    col: i64,
    startrow: i64,
    numrows: i64,
    cache: Option<Arc<IoCache>>,
) -> Result<Slab, Error> {
    read_inner(url, dataset, valtype, col, startrow, numrows, cache)
        .map_err(|e| e.for_dataset(dataset))
}

fn read_inner(
    url: &str,
    dataset: &str,
    valtype: ValType,
    col: i64,
    startrow: i64,
    numrows: i64,
    cache: Option<Arc<IoCache>>,
) -> Result<Slab, Error> {
    let span = debug_span!("read", url, dataset);
    let _entered = span.enter();

    if startrow < 0 {
        return Err(Error::new(
            ErrorKind::Bounds,
            format!("invalid start row: {startrow}"),
        ));
    }
    if numrows < 0 {
        return Err(Error::new(
            ErrorKind::Bounds,
            format!("invalid number of rows: {numrows}"),
        ));
    }

    let (kind, resource) = parse_url(url)?;
    let backend = open_resource(kind, resource)?;
    let memo_url = meta_url(resource, dataset)?;
    let memo_key = MetaMemo::key(&memo_url);

    let cache = cache.unwrap_or_else(|| Arc::new(IoCache::new()));
    let num_rows = if numrows == ALL_ROWS {
        data_read::ALL_ROWS
    } else {
        numrows as u64
    };

    let mut session = FileSession::new(
        backend,
        cache,
        dataset,
        memo_url.clone(),
        startrow as u64,
        num_rows,
    )?;

    match MetaMemo::global().find(memo_key, &memo_url) {
        Some(meta) => {
            debug!("metadata memo hit");
            session.set_meta(meta);
        }
        None => {
            let root = session.read_superblock()?;
            session.read_object_header(root, 0)?;
        }
    }

    let raw = session.read_dataset()?;
    MetaMemo::global().insert(memo_key, session.meta().clone());

    let slab = build_slab(raw, valtype, col)?;
    debug!(
        elements = slab.elements,
        bytes = slab.byte_size,
        "read complete"
    );
    Ok(slab)
}
