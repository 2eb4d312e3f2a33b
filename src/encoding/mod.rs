//! Encoding utilities shared by the on-disk cell codec.

pub mod varint;

pub use varint::{read_varint32, write_varint32, VARINT32_SIZE};
