pub mod codecs;
pub mod error;
pub mod metadata;
pub mod npy;
pub mod npz;
pub mod store;
pub mod types;

// Re-export key types at crate root for convenience.
pub use error::{NpyError, NpyResult};
pub use metadata::Header;
pub use npy::{read_array, read_header, read_npy, write_array, write_npy};
pub use npz::{
    NpzCompression, NpzTensors, NpzWriteOptions, read_npz, read_npz_by_name, write_npz,
    write_npz_to, write_npz_with_options,
};
pub use store::{ArchiveSource, LocalArchive, MemoryArchive};
pub use types::{Array, ArrayData, Element, ElementType, Shape};
