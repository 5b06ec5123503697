//! Device access for Vigil: geometry discovery through the kernel and a
//! shared, offset-addressed read handle implementing `BlockSource`.

mod device;
mod geometry;

pub use device::{DeviceHandle, IoMode};
pub use geometry::{FilesystemCapacity, GeometrySource, Probe, filesystem_capacity, probe};
