//! Synthetic HDF5 file builder for the integration suites.
#![allow(dead_code)] // each suite uses its own subset of the builders
//!
//! Builds byte-exact files covering the subset the reader supports:
//! superblock v0/v2, object headers v1/v2, legacy symbol-table groups,
//! new-style link-info groups over a fractal heap, and contiguous /
//! compact / chunked datasets with optional DEFLATE and SHUFFLE.

use std::io::Write;
use std::path::PathBuf;

pub const SIGNATURE: [u8; 8] = [0x89, b'H', b'D', b'F', b'\r', b'\n', 0x1A, b'\n'];

/// A file image under construction. The first 72 bytes are reserved
/// for the superblock; everything else is appended 8-byte aligned.
pub struct FileImage {
    data: Vec<u8>,
}

impl FileImage {
    pub fn new() -> FileImage {
        FileImage {
            data: vec![0u8; 72],
        }
    }

    /// Append `bytes` at the next 8-byte boundary, returning their
    /// file offset.
    pub fn alloc(&mut self, bytes: &[u8]) -> u64 {
        while self.data.len() % 8 != 0 {
            self.data.push(0);
        }
        let offset = self.data.len() as u64;
        self.data.extend_from_slice(bytes);
        offset
    }

    /// Write a v0 superblock pointing at `root` and return the image.
    pub fn finish_v0(mut self, root: u64) -> Vec<u8> {
        self.data[..8].copy_from_slice(&SIGNATURE);
        // bytes 8..13: version fields, all zero
        self.data[13] = 8; // offset size
        self.data[14] = 8; // length size
        self.data[15..17].copy_from_slice(&4u16.to_le_bytes()); // leaf k
        self.data[17..19].copy_from_slice(&16u16.to_le_bytes()); // internal k
        self.data[64..72].copy_from_slice(&root.to_le_bytes());
        self.data
    }

    /// Write a v2 superblock pointing at `root` and return the image.
    pub fn finish_v2(mut self, root: u64) -> Vec<u8> {
        let eof = self.data.len() as u64;
        self.data[..8].copy_from_slice(&SIGNATURE);
        self.data[8] = 2; // version
        self.data[9] = 8; // offset size
        self.data[10] = 8; // length size
        self.data[11] = 0; // consistency flags
        self.data[12..20].copy_from_slice(&0u64.to_le_bytes()); // base
        self.data[20..28].copy_from_slice(&u64::MAX.to_le_bytes()); // extension
        self.data[28..36].copy_from_slice(&eof.to_le_bytes());
        self.data[36..44].copy_from_slice(&root.to_le_bytes());
        self.data[44..48].copy_from_slice(&0u32.to_le_bytes()); // checksum
        self.data
    }
}

/// Write an image to a unique temp file and return its path and
/// `file://` URL.
pub fn write_temp(data: &[u8], tag: &str) -> (PathBuf, String) {
    let path = std::env::temp_dir().join(format!(
        "rangehdf5_test_{}_{}.h5",
        tag,
        std::process::id()
    ));
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(data).unwrap();
    let url = format!("file://{}", path.display());
    (path, url)
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Datatype class ids used by the fixtures.
pub const CLASS_FIXED_POINT: u8 = 0;
pub const CLASS_FLOATING_POINT: u8 = 1;

pub fn dataspace_msg(dims: &[u64]) -> Vec<u8> {
    let mut msg = vec![1u8, dims.len() as u8, 0, 0, 0, 0, 0, 0];
    for &d in dims {
        msg.extend_from_slice(&d.to_le_bytes());
    }
    msg
}

pub fn datatype_msg(class: u8, type_size: u32) -> Vec<u8> {
    let version_class = 0x10u32 | class as u32;
    let mut msg = Vec::new();
    msg.extend_from_slice(&version_class.to_le_bytes());
    msg.extend_from_slice(&type_size.to_le_bytes());
    // Property bytes: 4 for fixed point, 12 for floating point.
    let props = if class == CLASS_FLOATING_POINT { 12 } else { 4 };
    msg.extend_from_slice(&vec![0u8; props]);
    msg
}

pub fn fill_value_msg(fill: Option<(u32, u64)>) -> Vec<u8> {
    let mut msg = vec![2u8, 0, 0];
    match fill {
        Some((size, value)) => {
            msg.push(1);
            msg.extend_from_slice(&size.to_le_bytes());
            msg.extend_from_slice(&value.to_le_bytes()[..size as usize]);
        }
        None => msg.push(0),
    }
    msg
}

pub fn layout_contiguous_msg(address: u64, size: u64) -> Vec<u8> {
    let mut msg = vec![3u8, 1];
    msg.extend_from_slice(&address.to_le_bytes());
    msg.extend_from_slice(&size.to_le_bytes());
    msg
}

pub fn layout_compact_msg(data: &[u8]) -> Vec<u8> {
    let mut msg = vec![3u8, 0];
    msg.extend_from_slice(&(data.len() as u16).to_le_bytes());
    msg.extend_from_slice(data);
    msg
}

pub fn layout_chunked_msg(btree_addr: u64, chunk_dims: &[u32], element_size: u32) -> Vec<u8> {
    let mut msg = vec![3u8, 2, chunk_dims.len() as u8 + 1];
    msg.extend_from_slice(&btree_addr.to_le_bytes());
    for &d in chunk_dims {
        msg.extend_from_slice(&d.to_le_bytes());
    }
    msg.extend_from_slice(&element_size.to_le_bytes());
    msg
}

/// Filter pipeline v1; each entry is (filter id, client data).
pub fn filter_msg(filters: &[(u16, &[u32])]) -> Vec<u8> {
    let mut msg = vec![1u8, filters.len() as u8, 0, 0, 0, 0, 0, 0];
    for (id, client) in filters {
        msg.extend_from_slice(&id.to_le_bytes());
        msg.extend_from_slice(&0u16.to_le_bytes()); // name length
        msg.extend_from_slice(&0u16.to_le_bytes()); // flags
        msg.extend_from_slice(&(client.len() as u16).to_le_bytes());
        for v in *client {
            msg.extend_from_slice(&v.to_le_bytes());
        }
        if client.len() % 2 == 1 {
            msg.extend_from_slice(&[0u8; 4]);
        }
    }
    msg
}

pub fn symbol_table_msg(btree_addr: u64, heap_addr: u64) -> Vec<u8> {
    let mut msg = Vec::new();
    msg.extend_from_slice(&btree_addr.to_le_bytes());
    msg.extend_from_slice(&heap_addr.to_le_bytes());
    msg
}

pub fn link_info_msg(heap_addr: u64) -> Vec<u8> {
    let mut msg = vec![0u8, 0];
    msg.extend_from_slice(&heap_addr.to_le_bytes());
    msg.extend_from_slice(&u64::MAX.to_le_bytes()); // name index
    msg
}

pub fn hard_link_msg(name: &str, target: u64) -> Vec<u8> {
    let mut msg = vec![1u8, 0, name.len() as u8];
    msg.extend_from_slice(name.as_bytes());
    msg.extend_from_slice(&target.to_le_bytes());
    msg
}

// ---------------------------------------------------------------------------
// Object headers
// ---------------------------------------------------------------------------

/// V1 object header; each message payload is padded to 8 bytes.
pub fn v1_object_header(messages: &[(u16, Vec<u8>)]) -> Vec<u8> {
    let mut msg_bytes = Vec::new();
    for (mtype, payload) in messages {
        let padded = (payload.len() + 7) & !7;
        msg_bytes.extend_from_slice(&mtype.to_le_bytes());
        msg_bytes.extend_from_slice(&(padded as u16).to_le_bytes());
        msg_bytes.push(0); // flags
        msg_bytes.extend_from_slice(&[0u8; 3]); // reserved
        msg_bytes.extend_from_slice(payload);
        msg_bytes.extend_from_slice(&vec![0u8; padded - payload.len()]);
    }

    let mut hdr = Vec::new();
    hdr.push(1); // version
    hdr.push(0); // reserved
    hdr.extend_from_slice(&(messages.len() as u16).to_le_bytes());
    hdr.extend_from_slice(&1u32.to_le_bytes()); // reference count
    hdr.extend_from_slice(&(msg_bytes.len() as u64).to_le_bytes());
    hdr.extend_from_slice(&msg_bytes);
    hdr
}

/// V2 object header, no timestamps, 2-byte chunk-0 size.
pub fn v2_object_header(messages: &[(u8, Vec<u8>)]) -> Vec<u8> {
    let mut msg_bytes = Vec::new();
    for (mtype, payload) in messages {
        msg_bytes.push(*mtype);
        msg_bytes.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        msg_bytes.push(0); // flags
        msg_bytes.extend_from_slice(payload);
    }

    let mut hdr = Vec::new();
    hdr.extend_from_slice(b"OHDR");
    hdr.push(2); // version
    hdr.push(0x01); // flags: 2-byte chunk-0 size
    hdr.extend_from_slice(&(msg_bytes.len() as u16).to_le_bytes());
    hdr.extend_from_slice(&msg_bytes);
    hdr.extend_from_slice(&0u32.to_le_bytes()); // checksum (unverified)
    hdr
}

// ---------------------------------------------------------------------------
// Datasets
// ---------------------------------------------------------------------------

/// Add a contiguous dataset; returns its object header address.
pub fn contiguous_dataset(
    image: &mut FileImage,
    class: u8,
    type_size: u32,
    dims: &[u64],
    payload: &[u8],
) -> u64 {
    let data_addr = image.alloc(payload);
    let messages = vec![
        (0x0001, dataspace_msg(dims)),
        (0x0003, datatype_msg(class, type_size)),
        (0x0005, fill_value_msg(None)),
        (0x0008, layout_contiguous_msg(data_addr, payload.len() as u64)),
    ];
    image.alloc(&v1_object_header(&messages))
}

/// Add a compact dataset (data inline in the header).
pub fn compact_dataset(
    image: &mut FileImage,
    class: u8,
    type_size: u32,
    dims: &[u64],
    payload: &[u8],
) -> u64 {
    let messages = vec![
        (0x0001, dataspace_msg(dims)),
        (0x0003, datatype_msg(class, type_size)),
        (0x0005, fill_value_msg(None)),
        (0x0008, layout_compact_msg(payload)),
    ];
    image.alloc(&v1_object_header(&messages))
}

/// Chunking parameters for [`chunked_dataset`].
pub struct ChunkSpec {
    pub rows_per_chunk: u64,
    pub deflate: bool,
    pub shuffle: bool,
}

/// Forward shuffle (the write direction of the SHUFFLE filter).
pub fn shuffle(data: &[u8], type_size: usize) -> Vec<u8> {
    let num_elements = data.len() / type_size;
    let mut out = vec![0u8; data.len()];
    for i in 0..num_elements {
        for j in 0..type_size {
            out[j * num_elements + i] = data[i * type_size + j];
        }
    }
    out
}

/// zlib-compress (the write direction of the DEFLATE filter).
pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::new(6));
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Add a chunked dataset with chunks along the first dimension;
/// returns its object header address.
pub fn chunked_dataset(
    image: &mut FileImage,
    class: u8,
    type_size: u32,
    dims: &[u64],
    payload: &[u8],
    spec: &ChunkSpec,
) -> u64 {
    let rank = dims.len();
    let row_elems: u64 = dims[1..].iter().product::<u64>().max(1);
    let row_bytes = row_elems * type_size as u64;
    let chunk_bytes = spec.rows_per_chunk * row_bytes;

    // Write the chunk blobs, padding the final partial chunk.
    let mut entries = Vec::new(); // (row_key, stored size, address)
    let mut row = 0u64;
    while row < dims[0] {
        let start = (row * row_bytes) as usize;
        let end = (start + chunk_bytes as usize).min(payload.len());
        let mut chunk = payload[start..end].to_vec();
        chunk.resize(chunk_bytes as usize, 0);
        if spec.shuffle {
            chunk = shuffle(&chunk, type_size as usize);
        }
        if spec.deflate {
            chunk = deflate(&chunk);
        }
        let addr = image.alloc(&chunk);
        entries.push((row, chunk.len() as u32, addr));
        row += spec.rows_per_chunk;
    }

    // Chunk B-tree: a single leaf indexing every chunk.
    let mut leaf = Vec::new();
    leaf.extend_from_slice(b"TREE");
    leaf.push(1); // node type: raw data chunks
    leaf.push(0); // level
    leaf.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    leaf.extend_from_slice(&u64::MAX.to_le_bytes()); // left sibling
    leaf.extend_from_slice(&u64::MAX.to_le_bytes()); // right sibling
    let key = |leaf: &mut Vec<u8>, size: u32, row: u64| {
        leaf.extend_from_slice(&size.to_le_bytes());
        leaf.extend_from_slice(&0u32.to_le_bytes()); // filter mask
        leaf.extend_from_slice(&row.to_le_bytes());
        for _ in 1..rank {
            leaf.extend_from_slice(&0u64.to_le_bytes());
        }
        leaf.extend_from_slice(&0u64.to_le_bytes()); // element offset
    };
    for &(row, size, addr) in &entries {
        key(&mut leaf, size, row);
        leaf.extend_from_slice(&addr.to_le_bytes());
    }
    key(&mut leaf, 0, dims[0]); // closing key
    let btree_addr = image.alloc(&leaf);

    let mut chunk_dims = vec![spec.rows_per_chunk as u32];
    chunk_dims.extend(dims[1..].iter().map(|&d| d as u32));

    let mut messages = vec![
        (0x0001, dataspace_msg(dims)),
        (0x0003, datatype_msg(class, type_size)),
        (0x0005, fill_value_msg(None)),
        (
            0x0008,
            layout_chunked_msg(btree_addr, &chunk_dims, type_size),
        ),
    ];
    if spec.deflate || spec.shuffle {
        let mut filters: Vec<(u16, &[u32])> = Vec::new();
        let shuffle_client = [type_size];
        if spec.shuffle {
            filters.push((2, &shuffle_client));
        }
        let deflate_client = [6u32];
        if spec.deflate {
            filters.push((1, &deflate_client));
        }
        messages.push((0x000B, filter_msg(&filters)));
    }

    image.alloc(&v1_object_header(&messages))
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

/// Add a legacy (symbol-table) group; returns its object header
/// address.
pub fn v1_group(image: &mut FileImage, children: &[(&str, u64)]) -> u64 {
    // Local heap data segment: the child names as C-strings.
    let mut segment = Vec::new();
    let mut name_offsets = Vec::new();
    for (name, _) in children {
        name_offsets.push(segment.len() as u64);
        segment.extend_from_slice(name.as_bytes());
        segment.push(0);
    }
    let segment_addr = image.alloc(&segment);

    let mut heap = Vec::new();
    heap.extend_from_slice(b"HEAP");
    heap.push(0); // version
    heap.extend_from_slice(&[0u8; 3]); // reserved
    heap.extend_from_slice(&(segment.len() as u64).to_le_bytes());
    heap.extend_from_slice(&u64::MAX.to_le_bytes()); // free list head
    heap.extend_from_slice(&segment_addr.to_le_bytes());
    let heap_addr = image.alloc(&heap);

    let mut snod = Vec::new();
    snod.extend_from_slice(b"SNOD");
    snod.push(1); // version
    snod.push(0); // reserved
    snod.extend_from_slice(&(children.len() as u16).to_le_bytes());
    for (i, (_, target)) in children.iter().enumerate() {
        snod.extend_from_slice(&name_offsets[i].to_le_bytes());
        snod.extend_from_slice(&target.to_le_bytes());
        snod.extend_from_slice(&0u32.to_le_bytes()); // cache type
        snod.extend_from_slice(&0u32.to_le_bytes()); // reserved
        snod.extend_from_slice(&[0u8; 16]); // scratch pad
    }
    let snod_addr = image.alloc(&snod);

    let mut btree = Vec::new();
    btree.extend_from_slice(b"TREE");
    btree.push(0); // node type: group
    btree.push(0); // level: leaf
    btree.extend_from_slice(&1u16.to_le_bytes()); // entries used
    btree.extend_from_slice(&u64::MAX.to_le_bytes()); // left sibling
    btree.extend_from_slice(&u64::MAX.to_le_bytes()); // right sibling
    btree.extend_from_slice(&0u64.to_le_bytes()); // first key
    btree.extend_from_slice(&snod_addr.to_le_bytes()); // child
    btree.extend_from_slice(&(segment.len() as u64).to_le_bytes()); // next key
    let btree_addr = image.alloc(&btree);

    let header = v1_object_header(&[(0x0011, symbol_table_msg(btree_addr, heap_addr))]);
    image.alloc(&header)
}

/// Add a new-style (link-info + fractal heap) group; returns its
/// object header address.
pub fn v2_group(image: &mut FileImage, children: &[(&str, u64)]) -> u64 {
    let block_size = 512usize;
    let max_heap_size = 16u16; // bits; 2-byte block offsets

    let mut dblock = Vec::new();
    dblock.extend_from_slice(b"FHDB");
    dblock.push(0); // version
    dblock.extend_from_slice(&0u64.to_le_bytes()); // heap header address
    dblock.extend_from_slice(&[0u8; 2]); // block offset
    for (name, target) in children {
        dblock.extend_from_slice(&hard_link_msg(name, *target));
    }
    assert!(dblock.len() <= block_size, "direct block overflow");
    dblock.resize(block_size, 0);
    let dblock_addr = image.alloc(&dblock);

    let mut heap = Vec::new();
    heap.extend_from_slice(b"FRHP");
    heap.push(0); // version
    heap.extend_from_slice(&7u16.to_le_bytes()); // heap id length
    heap.extend_from_slice(&0u16.to_le_bytes()); // io filter length
    heap.push(0); // flags
    heap.extend_from_slice(&0u32.to_le_bytes()); // max managed object size
    heap.extend_from_slice(&0u64.to_le_bytes()); // next huge id
    heap.extend_from_slice(&u64::MAX.to_le_bytes()); // huge btree
    heap.extend_from_slice(&0u64.to_le_bytes()); // free space
    heap.extend_from_slice(&u64::MAX.to_le_bytes()); // free space manager
    heap.extend_from_slice(&0u64.to_le_bytes()); // managed space
    heap.extend_from_slice(&0u64.to_le_bytes()); // allocated space
    heap.extend_from_slice(&0u64.to_le_bytes()); // dblk alloc iterator
    heap.extend_from_slice(&(children.len() as u64).to_le_bytes()); // managed objects
    heap.extend_from_slice(&0u64.to_le_bytes()); // huge size
    heap.extend_from_slice(&0u64.to_le_bytes()); // huge count
    heap.extend_from_slice(&0u64.to_le_bytes()); // tiny size
    heap.extend_from_slice(&0u64.to_le_bytes()); // tiny count
    heap.extend_from_slice(&4u16.to_le_bytes()); // table width
    heap.extend_from_slice(&(block_size as u64).to_le_bytes()); // starting block size
    heap.extend_from_slice(&1024u64.to_le_bytes()); // max direct block size
    heap.extend_from_slice(&max_heap_size.to_le_bytes());
    heap.extend_from_slice(&0u16.to_le_bytes()); // starting rows
    heap.extend_from_slice(&dblock_addr.to_le_bytes()); // root block
    heap.extend_from_slice(&0u16.to_le_bytes()); // current rows: direct root
    heap.extend_from_slice(&0u32.to_le_bytes()); // checksum
    let heap_addr = image.alloc(&heap);

    let header = v2_object_header(&[(0x02, link_info_msg(heap_addr))]);
    image.alloc(&header)
}

// ---------------------------------------------------------------------------
// Value helpers
// ---------------------------------------------------------------------------

pub fn u32_bytes(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn i32_bytes(values: &[i32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn f64_bytes(values: &[f64]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Delete a temp file, ignoring failure.
pub fn cleanup(path: &std::path::Path) {
    std::fs::remove_file(path).ok();
}
