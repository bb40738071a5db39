//! Row-range reads of HDF5 datasets over range I/O.
//!
//! `rangehdf5` pulls a row-range of one dataset out of an HDF5 file
//! stored locally (`file://`) or in an S3-style object store
//! (`s3://`), reading only the byte ranges the request needs — no HDF5
//! library, no whole-file download. Parsed dataset metadata is
//! memoised process-wide, and an [`IoCache`] can be shared across
//! concurrent reads of the same file.
//!
//! # Example
//!
//! ```no_run
//! use rangehdf5::{read, ValType};
//!
//! let slab = read(
//!     "file:///data/granule.h5",
//!     "/gt1r/heights",
//!     ValType::Real,
//!     0,
//!     1000,
//!     500,
//!     None,
//! )
//! .unwrap();
//! println!("{} elements, {} bytes", slab.elements, slab.byte_size);
//! ```

pub mod error;
mod read;
pub mod slab;

pub use error::{Error, ErrorKind};
pub use read::{read, ALL_ROWS};
pub use slab::{Slab, ValType};

pub use rangehdf5_io::cache::{CacheStats, IoCache};
