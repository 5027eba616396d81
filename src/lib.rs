//! Flat-namespace inode file system over a fixed-size block device.
//!
//! Block 0 holds the superblock, the following blocks hold the inode table,
//! and every other block is a data or indirect-pointer block reachable from
//! some live inode. Free space is never persisted; it is rebuilt on mount.

pub mod disk;
pub mod fs;

pub use fs::{
    error::{FileSystemError, Result},
    FileSystem, VolumeStats,
};
