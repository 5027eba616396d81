pub mod block_device;
pub mod file_disk;
pub mod memory_disk;
pub mod types;

pub use block_device::BlockDevice;
pub use file_disk::FileDisk;
pub use memory_disk::MemoryDisk;
pub use types::{Block, BLOCK_SIZE};
