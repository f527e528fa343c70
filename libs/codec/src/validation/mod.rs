//! Frame integrity and payload sanity checks

pub mod bounds;
pub mod checksum;

pub use bounds::{align_offset, PlausibleRange};
pub use checksum::{
    compute_checksum, embed_checksum, frame_checksum, verify_checksum, xor_fold,
    StreamingChecksum,
};
