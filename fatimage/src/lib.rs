#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod bpb;
pub mod cluster;
pub mod dir;
pub mod disk;
pub mod error;
pub mod field;
pub mod geometry;
pub mod image;
pub mod table;

pub use error::{ImageError, ImageResult};
pub use geometry::{Geometry, VolumeParams};
pub use image::{build_image, FileRecord, ImageBuilder};
