//! Shared primitives: frame identity and ranges, pixel buffers, errors, matrix math.

/// Frame indices, ranges, frame rates and geometry aliases.
pub mod core;
/// Non-fatal conditions collected by stages.
pub mod diagnostic;
/// Crate error type.
pub mod error;
/// Pixel buffers.
pub mod frame;
/// 3x3 homogeneous transforms.
pub mod math;
