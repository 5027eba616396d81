use crate::disk::BLOCK_SIZE;

/// 超级块魔数，用于识别由 format 生成的卷
pub const FS_MAGIC: u32 = 0xF0F0_3410;

pub const SUPER_BLOCK_BLOCK_ID: u32 = 0;
pub const INODE_TABLE_START_BLOCK_ID: u32 = 1;

// 每个 inode 32 字节：valid + size + 5 个直接指针 + 1 个间接指针
pub const INODE_SIZE: usize = 32;
pub const INODES_PER_BLOCK: u32 = (BLOCK_SIZE / INODE_SIZE) as u32;

pub const DIRECT_PTRS: usize = 5;
pub const PTRS_PER_BLOCK: usize = BLOCK_SIZE / 4; // 每个间接块可以容纳的块指针数

/// 单个文件最多可寻址的逻辑块数
pub const MAX_FILE_BLOCKS: u32 = (DIRECT_PTRS + PTRS_PER_BLOCK) as u32;

pub const MAX_FILE_SIZE: u64 = MAX_FILE_BLOCKS as u64 * BLOCK_SIZE as u64;

/// 约 10% 的块留给 inode 表
pub const INODE_TABLE_FRACTION: u32 = 10;

/// 按块大小向上取整
pub fn blocks_for(size: u64) -> u64 {
    size.div_ceil(BLOCK_SIZE as u64)
}
