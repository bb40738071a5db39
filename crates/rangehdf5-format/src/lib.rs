//! HDF5 binary format walking over range I/O.
//!
//! This crate parses the on-disk structures of the supported HDF5
//! subset — superblock, object headers and their messages, symbol
//! tables, fractal heaps, chunk B-trees — through a cursor that pulls
//! bytes via the shared I/O cache, and materialises row-range reads of
//! datasets. It holds the process-wide metadata memo.

pub mod btree_v1;
pub mod data_read;
pub mod error;
pub mod fractal_heap;
pub mod group;
pub mod message_type;
pub mod messages;
pub mod meta;
pub mod meta_memo;
pub mod object_header;
pub mod session;
pub mod superblock;

pub use data_read::{DatasetRead, ALL_ROWS};
pub use error::FormatError;
pub use meta::{meta_url, DataTypeClass, DatasetMeta, LayoutClass, MAX_NDIMS};
pub use meta_memo::MetaMemo;
pub use session::FileSession;
