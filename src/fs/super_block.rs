use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    disk::{Block, BlockDevice, BLOCK_SIZE},
    fs::{
        config::{
            FS_MAGIC, INODES_PER_BLOCK, INODE_TABLE_FRACTION, INODE_TABLE_START_BLOCK_ID,
            SUPER_BLOCK_BLOCK_ID,
        },
        error::{FileSystemError, Result},
    },
};

/// 超级块：位于 0 号块开头的 16 字节，描述卷的几何信息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperBlock {
    pub magic: u32,              // 魔数，用于识别文件系统
    pub total_blocks: u32,       // 文件系统总块数
    pub inode_table_blocks: u32, // inode 表占用的块数
    pub inode_capacity: u32,     // 总 inode 数
}

impl SuperBlock {
    /// 为 `total_blocks` 块的设备计算布局，约 10% 的块留给 inode 表
    pub fn for_device(total_blocks: u32) -> Self {
        let inode_table_blocks = (total_blocks / INODE_TABLE_FRACTION).max(1);
        Self {
            magic: FS_MAGIC,
            total_blocks,
            inode_table_blocks,
            inode_capacity: inode_table_blocks.saturating_mul(INODES_PER_BLOCK),
        }
    }

    pub fn decode(block: &Block) -> Result<Self> {
        Ok(bincode::deserialize(&block[..])?)
    }

    pub fn encode(&self) -> Result<Block> {
        let bytes = bincode::serialize(self)?;
        let mut block = [0u8; BLOCK_SIZE];
        block[..bytes.len()].copy_from_slice(&bytes);
        Ok(block)
    }

    /// 读取 0 号块并校验魔数和几何信息
    pub fn load(disk: &dyn BlockDevice) -> Result<Self> {
        let mut block = [0u8; BLOCK_SIZE];
        disk.read_block(SUPER_BLOCK_BLOCK_ID as u64, &mut block)?;
        let sb = Self::decode(&block)?;
        if sb.magic != FS_MAGIC {
            return Err(FileSystemError::BadMagic { found: sb.magic });
        }
        sb.validate(disk.block_count())?;
        Ok(sb)
    }

    pub fn store(&self, disk: &dyn BlockDevice) -> Result<()> {
        disk.write_block(SUPER_BLOCK_BLOCK_ID as u64, &self.encode()?)?;
        Ok(())
    }

    fn validate(&self, device_blocks: u64) -> Result<()> {
        if self.inode_table_blocks == 0 || self.inode_table_blocks >= self.total_blocks {
            return Err(FileSystemError::Corrupted(format!(
                "inode table of {} blocks does not fit a {}-block volume",
                self.inode_table_blocks, self.total_blocks
            )));
        }
        if self.inode_table_blocks.checked_mul(INODES_PER_BLOCK) != Some(self.inode_capacity) {
            return Err(FileSystemError::Corrupted(format!(
                "inode capacity {} does not match {} inode blocks",
                self.inode_capacity, self.inode_table_blocks
            )));
        }
        if self.total_blocks as u64 > device_blocks {
            return Err(FileSystemError::Corrupted(format!(
                "volume claims {} blocks but the device has {}",
                self.total_blocks, device_blocks
            )));
        }
        Ok(())
    }

    /// 第一个数据块的块号
    pub fn data_start(&self) -> u32 {
        INODE_TABLE_START_BLOCK_ID + self.inode_table_blocks
    }

    /// 判断块号是否落在数据区内
    pub fn is_data_block(&self, block_id: u32) -> bool {
        block_id >= self.data_start() && block_id < self.total_blocks
    }
}

impl fmt::Display for SuperBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "    {} blocks", self.total_blocks)?;
        writeln!(f, "    {} inode blocks", self.inode_table_blocks)?;
        write!(f, "    {} inodes", self.inode_capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::MemoryDisk;

    #[test]
    fn layout_reserves_a_tenth_for_inodes() {
        let sb = SuperBlock::for_device(200);
        assert_eq!(sb.inode_table_blocks, 20);
        assert_eq!(sb.inode_capacity, 20 * 128);
        assert_eq!(sb.data_start(), 21);
    }

    #[test]
    fn small_volume_keeps_one_inode_block() {
        let sb = SuperBlock::for_device(5);
        assert_eq!(sb.inode_table_blocks, 1);
        assert_eq!(sb.inode_capacity, 128);
    }

    #[test]
    fn encoding_is_little_endian_and_packed() {
        let block = SuperBlock::for_device(20).encode().unwrap();
        assert_eq!(&block[0..4], &FS_MAGIC.to_le_bytes());
        assert_eq!(&block[4..8], &20u32.to_le_bytes());
        assert_eq!(&block[8..12], &2u32.to_le_bytes());
        assert_eq!(&block[12..16], &256u32.to_le_bytes());
        assert!(block[16..].iter().all(|&b| b == 0));
    }

    #[test]
    fn load_rejects_bad_magic() {
        let disk = MemoryDisk::new(20);
        let err = SuperBlock::load(&disk).unwrap_err();
        assert!(matches!(err, FileSystemError::BadMagic { found: 0 }));
    }

    #[test]
    fn load_rejects_inconsistent_geometry() {
        let disk = MemoryDisk::new(20);
        let mut sb = SuperBlock::for_device(20);
        sb.inode_capacity += 1;
        sb.store(&disk).unwrap();
        assert!(matches!(
            SuperBlock::load(&disk),
            Err(FileSystemError::Corrupted(_))
        ));

        let sb = SuperBlock::for_device(40);
        sb.store(&disk).unwrap();
        assert!(matches!(
            SuperBlock::load(&disk),
            Err(FileSystemError::Corrupted(_))
        ));
    }

    #[test]
    fn store_then_load() {
        let disk = MemoryDisk::new(20);
        let sb = SuperBlock::for_device(20);
        sb.store(&disk).unwrap();
        assert_eq!(SuperBlock::load(&disk).unwrap(), sb);
    }
}
