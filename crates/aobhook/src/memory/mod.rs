//! Read access to image memory.
//!
//! [`ReadMemory`] is the seam every other component reads through. The live
//! in-process implementation lives in [`local`]; [`MappedImage`] holds an image
//! laid out at its virtual addresses in an owned buffer.

pub mod image;
#[cfg(target_os = "windows")]
pub mod local;
#[cfg(test)]
pub mod mock;
mod reader;

pub use image::MappedImage;
#[cfg(target_os = "windows")]
pub use local::LocalProcess;
pub use reader::ReadMemory;

#[cfg(test)]
pub use mock::MockImageBuilder;
