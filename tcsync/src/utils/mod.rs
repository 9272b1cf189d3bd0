//! Utility functions and supporting infrastructure.
//!
//! Provides unit bit packing, checksum computation, power spectra, colour
//! segmentation, search budgets and error types.

pub mod bitstream_io;
pub mod blob;
pub mod budget;
pub mod checksum;
pub mod errors;
pub mod spectrum;
