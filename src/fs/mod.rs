use log::{info, warn};

use crate::{
    disk::{BlockDevice, BLOCK_SIZE},
    fs::{
        block_map::{claim_blocks, owned_blocks, read_pointer_block},
        config::{DIRECT_PTRS, FS_MAGIC, INODES_PER_BLOCK, MAX_FILE_SIZE, SUPER_BLOCK_BLOCK_ID},
        error::{FileSystemError, Result},
        free_bitmap::FreeBitmap,
        inode_table::InodeTable,
        super_block::SuperBlock,
    },
};

pub mod block_map;
pub mod config;
pub mod error;
pub mod file_io;
pub mod free_bitmap;
pub mod inode_table;
pub mod super_block;

/// 挂载后才存在的会话状态
#[derive(Debug)]
struct Mount {
    super_block: SuperBlock,  // 文件系统总体信息
    inode_table: InodeTable,  // inode 表位置
    bitmap: FreeBitmap,       // 块占用信息，只在内存中
}

/// 卷的使用情况
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeStats {
    pub total_blocks: u32,
    pub free_blocks: u32,
    pub inode_capacity: u32,
    pub live_inodes: u32,
}

/// 一个卷会话：底层磁盘加上挂载状态
#[derive(Debug)]
pub struct FileSystem<D: BlockDevice> {
    disk: D,              // 底层磁盘抽象层
    mount: Option<Mount>, // None 表示未挂载
}

impl<D: BlockDevice> FileSystem<D> {
    pub fn new(disk: D) -> Self {
        Self { disk, mount: None }
    }

    pub fn disk(&self) -> &D {
        &self.disk
    }

    pub fn into_disk(self) -> D {
        self.disk
    }

    pub fn is_mounted(&self) -> bool {
        self.mount.is_some()
    }

    fn session(&mut self) -> Result<(&D, &mut Mount)> {
        match self.mount.as_mut() {
            Some(mount) => Ok((&self.disk, mount)),
            None => Err(FileSystemError::NotMounted),
        }
    }

    /// 已挂载时用会话里的 inode 表，否则从超级块现算
    fn inode_table(&self) -> Result<InodeTable> {
        match &self.mount {
            Some(mount) => Ok(mount.inode_table),
            None => Ok(InodeTable::new(&SuperBlock::load(&self.disk)?)),
        }
    }

    /// 写入超级块和全部无效的 inode 块；挂载中的卷不能格式化
    pub fn format(&mut self) -> Result<SuperBlock> {
        if self.is_mounted() {
            return Err(FileSystemError::AlreadyMounted);
        }

        let device_blocks = self.disk.block_count();
        let total_blocks = u32::try_from(device_blocks).map_err(|_| {
            FileSystemError::Corrupted(format!("device of {device_blocks} blocks is too large"))
        })?;
        let sb = SuperBlock::for_device(total_blocks);
        // 至少要放下超级块、inode 表和一个数据块
        if sb.data_start() >= total_blocks {
            return Err(FileSystemError::Corrupted(format!(
                "device of {total_blocks} blocks is too small"
            )));
        }

        sb.store(&self.disk)?;
        let empty = [0u8; BLOCK_SIZE]; // 全 0 即所有 inode 无效
        for block_id in 1..sb.data_start() {
            self.disk.write_block(block_id as u64, &empty)?;
        }

        info!(
            "formatted {} blocks, {} inode blocks, {} inodes",
            sb.total_blocks, sb.inode_table_blocks, sb.inode_capacity
        );
        Ok(sb)
    }

    /// 校验超级块并从 inode 表重建空闲块位图
    pub fn mount(&mut self) -> Result<()> {
        if self.is_mounted() {
            return Err(FileSystemError::AlreadyMounted);
        }

        let sb = SuperBlock::load(&self.disk)?;
        let table = InodeTable::new(&sb);
        let mut bitmap = FreeBitmap::new(sb.total_blocks);

        // 超级块和 inode 表永久占用
        for block_id in 0..sb.data_start() {
            bitmap.mark_used(block_id);
        }

        for index in 0..table.table_blocks {
            let mut inodes = table.load_block(&self.disk, index)?;
            let mut dirty = false;

            for (slot, inode) in inodes.iter_mut().enumerate() {
                let inumber = index * INODES_PER_BLOCK + slot as u32;
                if !inode.valid {
                    continue;
                }
                if inumber == 0 {
                    warn!("reserved inode 0 is marked valid, ignoring it");
                    continue;
                }
                if inode.size as u64 > MAX_FILE_SIZE {
                    warn!("inode {} size {} exceeds the maximum", inumber, inode.size);
                    inode.size = MAX_FILE_SIZE as u32;
                    dirty = true;
                }
                if claim_blocks(&self.disk, &sb, &mut bitmap, inode)? {
                    warn!("inode {}: cleared pointers inconsistent with its size", inumber);
                    dirty = true;
                }
            }

            if dirty {
                table.store_block(&self.disk, index, &inodes)?;
            }
        }

        info!(
            "mounted volume: {} of {} blocks free",
            bitmap.free_blocks(),
            sb.total_blocks
        );
        self.mount = Some(Mount {
            super_block: sb,
            inode_table: table,
            bitmap,
        });
        Ok(())
    }

    /// 丢弃内存中的位图，回到未挂载状态
    pub fn unmount(&mut self) -> Result<()> {
        self.mount.take().ok_or(FileSystemError::NotMounted)?;
        info!("unmounted volume");
        Ok(())
    }

    /// 分配一个新的空文件，返回其 inumber（不会是 0）
    pub fn create(&mut self) -> Result<u32> {
        let (disk, mount) = self.session()?;
        mount.inode_table.allocate(disk)
    }

    /// 删除文件并立即把它占用的块还给位图。
    /// inode 本来就无效时返回 `false`，不做任何修改。
    pub fn delete(&mut self, inumber: u32) -> Result<bool> {
        let (disk, mount) = self.session()?;
        let Some(old) = mount.inode_table.free(disk, inumber)? else {
            return Ok(false);
        };

        let blocks = owned_blocks(disk, &mount.super_block, &old)?;
        for &block_id in &blocks {
            mount.bitmap.release(block_id);
        }
        info!("deleted inode {}, released {} blocks", inumber, blocks.len());
        Ok(true)
    }

    pub fn getsize(&self, inumber: u32) -> Result<u32> {
        if inumber < 1 {
            return Err(FileSystemError::InvalidInode(inumber));
        }
        let inode = self.inode_table()?.read(&self.disk, inumber)?;
        if !inode.valid {
            return Err(FileSystemError::InvalidInode(inumber));
        }
        Ok(inode.size)
    }

    pub fn stat(&self) -> Result<VolumeStats> {
        let mount = self.mount.as_ref().ok_or(FileSystemError::NotMounted)?;
        let live = mount.inode_table.live_inodes(&self.disk)?;
        Ok(VolumeStats {
            total_blocks: mount.super_block.total_blocks,
            free_blocks: mount.bitmap.free_blocks(),
            inode_capacity: mount.super_block.inode_capacity,
            live_inodes: live.len() as u32,
        })
    }

    /// 超级块和所有有效 inode 的可读转储，仅用于诊断
    pub fn debug(&self) -> Result<String> {
        let mut block = [0u8; BLOCK_SIZE];
        self.disk
            .read_block(SUPER_BLOCK_BLOCK_ID as u64, &mut block)?;
        let raw = SuperBlock::decode(&block)?;

        let mut lines = vec!["superblock:".to_string()];
        if raw.magic != FS_MAGIC {
            lines.push("    magic number is not valid".to_string());
            return Ok(lines.join("\n"));
        }
        lines.push("    magic number is valid".to_string());
        lines.push(raw.to_string());

        let sb = match SuperBlock::load(&self.disk) {
            Ok(sb) => sb,
            Err(e) => {
                lines.push(format!("    {e}"));
                return Ok(lines.join("\n"));
            }
        };

        for (inumber, inode) in InodeTable::new(&sb).live_inodes(&self.disk)? {
            lines.push(format!("inode {inumber}:"));
            lines.push(format!("    size: {} bytes", inode.size));

            let used = inode.blocks_used() as usize;
            let direct = join_blocks(inode.direct.iter().take(used).copied());
            lines.push(format!("    direct blocks: {direct}"));

            if used > DIRECT_PTRS && sb.is_data_block(inode.indirect) {
                lines.push(format!("    indirect block: {}", inode.indirect));
                let pointers = read_pointer_block(&self.disk, inode.indirect)?;
                let indirect = join_blocks(pointers.into_iter().take(used - DIRECT_PTRS));
                lines.push(format!("    indirect data blocks: {indirect}"));
            }
        }
        Ok(lines.join("\n"))
    }
}

fn join_blocks(blocks: impl Iterator<Item = u32>) -> String {
    blocks
        .filter(|&ptr| ptr != 0)
        .map(|ptr| ptr.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}
