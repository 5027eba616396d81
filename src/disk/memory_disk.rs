use std::{io::Result, sync::Mutex};

use crate::disk::{
    block_device::{out_of_bounds, poisoned, BlockDevice},
    types::{Block, BLOCK_SIZE},
};

/// 内存中的磁盘，内容随进程结束而丢失
#[derive(Debug)]
pub struct MemoryDisk {
    blocks: Mutex<Vec<Block>>,
    block_count: u64,
}

impl MemoryDisk {
    pub fn new(block_count: u64) -> Self {
        Self {
            blocks: Mutex::new(vec![[0u8; BLOCK_SIZE]; block_count as usize]),
            block_count,
        }
    }
}

impl BlockDevice for MemoryDisk {
    fn read_block(&self, block_id: u64, buf: &mut Block) -> Result<()> {
        let blocks = self.blocks.lock().map_err(|_| poisoned())?;
        let block = blocks
            .get(block_id as usize)
            .ok_or_else(|| out_of_bounds(block_id, self.block_count))?;
        buf.copy_from_slice(block);
        Ok(())
    }

    fn write_block(&self, block_id: u64, buf: &Block) -> Result<()> {
        let mut blocks = self.blocks.lock().map_err(|_| poisoned())?;
        let block = blocks
            .get_mut(block_id as usize)
            .ok_or_else(|| out_of_bounds(block_id, self.block_count))?;
        block.copy_from_slice(buf);
        Ok(())
    }

    fn block_count(&self) -> u64 {
        self.block_count
    }
}
