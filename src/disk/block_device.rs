use std::io::{Error, ErrorKind, Result};

use crate::disk::types::Block;

/// 块设备抽象：按块号读写整块数据
/// 读写都是同步的，返回时数据已经落盘。
pub trait BlockDevice: Send + Sync {
    fn read_block(&self, block_id: u64, buf: &mut Block) -> Result<()>;
    fn write_block(&self, block_id: u64, buf: &Block) -> Result<()>;
    fn block_count(&self) -> u64; // 设备总块数
}

pub(crate) fn out_of_bounds(block_id: u64, block_count: u64) -> Error {
    Error::new(
        ErrorKind::InvalidInput,
        format!("block {block_id} out of bounds (device has {block_count} blocks)"),
    )
}

pub(crate) fn poisoned() -> Error {
    Error::new(ErrorKind::Other, "disk lock poisoned")
}
