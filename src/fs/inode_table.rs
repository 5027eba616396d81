use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    disk::{Block, BlockDevice, BLOCK_SIZE},
    fs::{
        config::{
            blocks_for, DIRECT_PTRS, INODES_PER_BLOCK, INODE_SIZE, INODE_TABLE_START_BLOCK_ID,
            MAX_FILE_BLOCKS,
        },
        error::{FileSystemError, Result},
        super_block::SuperBlock,
    },
};

/// inode 描述符，磁盘上固定 32 字节
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inode {
    #[serde(with = "valid_flag")]
    pub valid: bool, // 是否在用（磁盘上为 u32）
    pub size: u32, // 文件大小（字节）

    // 块索引区，0 表示未分配
    pub direct: [u32; DIRECT_PTRS], // 直接块指针
    pub indirect: u32,              // 一级间接块
}

impl Inode {
    /// 新分配的空文件
    pub fn new() -> Self {
        Self {
            valid: true,
            ..Self::default()
        }
    }

    /// 按 size 计算文件实际占用的数据块数，不超过可寻址上限
    pub fn blocks_used(&self) -> u32 {
        blocks_for(self.size as u64).min(MAX_FILE_BLOCKS as u64) as u32
    }
}

// 磁盘上 valid 以 u32 存储，任何非零值都视为有效
mod valid_flag {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(valid: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(u32::from(*valid))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(u32::deserialize(deserializer)? != 0)
    }
}

pub fn decode_inode_block(block: &Block) -> Result<Vec<Inode>> {
    block
        .chunks_exact(INODE_SIZE)
        .map(|raw| -> Result<Inode> { Ok(bincode::deserialize(raw)?) })
        .collect()
}

pub fn encode_inode_block(inodes: &[Inode]) -> Result<Block> {
    let mut block = [0u8; BLOCK_SIZE];
    for (raw, inode) in block.chunks_exact_mut(INODE_SIZE).zip(inodes) {
        bincode::serialize_into(raw, inode)?;
    }
    Ok(block)
}

/// inode 表：超级块之后连续的若干块
#[derive(Debug, Clone, Copy)]
pub struct InodeTable {
    pub start_block: u32,
    pub table_blocks: u32,
    pub capacity: u32,
}

impl InodeTable {
    pub fn new(sb: &SuperBlock) -> Self {
        Self {
            start_block: INODE_TABLE_START_BLOCK_ID,
            table_blocks: sb.inode_table_blocks,
            capacity: sb.inode_capacity,
        }
    }

    /// inumber -> (所在块号, 块内槽位)
    fn locate(&self, inumber: u32) -> Result<(u32, usize)> {
        if inumber < 1 || inumber >= self.capacity {
            return Err(FileSystemError::InvalidInode(inumber));
        }
        Ok((
            self.start_block + inumber / INODES_PER_BLOCK,
            (inumber % INODES_PER_BLOCK) as usize,
        ))
    }

    /// 读取 inode 表中第 `index` 块（从 0 开始）的全部描述符
    pub fn load_block(&self, disk: &dyn BlockDevice, index: u32) -> Result<Vec<Inode>> {
        let mut block = [0u8; BLOCK_SIZE];
        disk.read_block((self.start_block + index) as u64, &mut block)?;
        decode_inode_block(&block)
    }

    pub fn store_block(&self, disk: &dyn BlockDevice, index: u32, inodes: &[Inode]) -> Result<()> {
        disk.write_block((self.start_block + index) as u64, &encode_inode_block(inodes)?)?;
        Ok(())
    }

    pub fn read(&self, disk: &dyn BlockDevice, inumber: u32) -> Result<Inode> {
        let (block_id, slot) = self.locate(inumber)?;
        let inodes = self.load_block(disk, block_id - self.start_block)?;
        Ok(inodes[slot])
    }

    /// 读-改-写所在块，同块中的其他 inode 保持不变
    pub fn write(&self, disk: &dyn BlockDevice, inumber: u32, inode: &Inode) -> Result<()> {
        let (block_id, slot) = self.locate(inumber)?;
        let index = block_id - self.start_block;
        let mut inodes = self.load_block(disk, index)?;
        inodes[slot] = *inode;
        self.store_block(disk, index, &inodes)
    }

    /// 按块号、槽位顺序找到第一个空闲 inode；0 号保留不分配
    pub fn allocate(&self, disk: &dyn BlockDevice) -> Result<u32> {
        for index in 0..self.table_blocks {
            let mut inodes = self.load_block(disk, index)?;
            let free_slot = inodes.iter().enumerate().position(|(slot, inode)| {
                let inumber = index * INODES_PER_BLOCK + slot as u32;
                inumber != 0 && inumber < self.capacity && !inode.valid
            });

            if let Some(slot) = free_slot {
                inodes[slot] = Inode::new();
                self.store_block(disk, index, &inodes)?;
                let inumber = index * INODES_PER_BLOCK + slot as u32;
                debug!("allocated inode {}", inumber);
                return Ok(inumber);
            }
        }
        Err(FileSystemError::NoFreeInode)
    }

    /// 释放 inode；已经无效时返回 `None` 且不做任何修改。
    /// 返回旧的描述符，由调用方回收其数据块。
    pub fn free(&self, disk: &dyn BlockDevice, inumber: u32) -> Result<Option<Inode>> {
        let old = self.read(disk, inumber)?;
        if !old.valid {
            return Ok(None);
        }
        self.write(disk, inumber, &Inode::default())?;
        debug!("freed inode {}", inumber);
        Ok(Some(old))
    }

    /// 所有有效 inode 及其编号
    pub fn live_inodes(&self, disk: &dyn BlockDevice) -> Result<Vec<(u32, Inode)>> {
        let mut live = Vec::new();
        for index in 0..self.table_blocks {
            let inodes = self.load_block(disk, index)?;
            live.extend(
                inodes
                    .into_iter()
                    .enumerate()
                    .map(|(slot, inode)| (index * INODES_PER_BLOCK + slot as u32, inode))
                    .filter(|&(inumber, inode)| inumber != 0 && inode.valid),
            );
        }
        Ok(live)
    }
}
