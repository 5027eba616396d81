use log::{debug, warn};

use crate::{
    disk::{BlockDevice, BLOCK_SIZE},
    fs::{
        block_map::{self, map_for_write},
        error::{FileSystemError, Result},
        FileSystem,
    },
};

impl<D: BlockDevice> FileSystem<D> {
    /// 从 `offset` 开始读取至多 `buf.len()` 字节，返回实际读取的字节数。
    /// 超过文件大小的部分不读；遇到未分配的块（空洞）提前结束。
    pub fn read(&self, inumber: u32, buf: &mut [u8], offset: u32) -> Result<usize> {
        if inumber < 1 {
            return Err(FileSystemError::InvalidInode(inumber));
        }
        let mount = self.mount.as_ref().ok_or(FileSystemError::NotMounted)?;
        let inode = mount.inode_table.read(&self.disk, inumber)?;
        if !inode.valid {
            return Err(FileSystemError::InvalidInode(inumber));
        }

        let size = inode.size as u64;
        let offset = offset as u64;
        if offset >= size {
            return Ok(0);
        }
        let length = (buf.len() as u64).min(size - offset) as usize;

        let mut block = [0u8; BLOCK_SIZE];
        let mut copied = 0;
        while copied < length {
            let pos = offset + copied as u64;
            let n = (pos / BLOCK_SIZE as u64) as u32;
            let within = (pos % BLOCK_SIZE as u64) as usize;

            let Some(block_id) = block_map::lookup(&self.disk, &inode, n)? else {
                debug!("inode {} has no block at logical {}", inumber, n);
                break;
            };
            self.disk.read_block(block_id as u64, &mut block)?;

            let chunk = (BLOCK_SIZE - within).min(length - copied);
            buf[copied..copied + chunk].copy_from_slice(&block[within..within + chunk]);
            copied += chunk;
        }
        Ok(copied)
    }

    /// 把 `data` 写到 `offset` 处，按需分配块，返回实际写入的字节数。
    ///
    /// 每写完一块就把 size 更新为 `max(size, offset + written)` 并落盘。
    /// 中途空间不足时返回已写入的字节数；一个字节都没写成时返回错误。
    pub fn write(&mut self, inumber: u32, data: &[u8], offset: u32) -> Result<usize> {
        if inumber < 1 {
            return Err(FileSystemError::InvalidInode(inumber));
        }
        let (disk, mount) = self.session()?;
        let table = mount.inode_table;
        let mut inode = table.read(disk, inumber)?;
        if !inode.valid {
            return Err(FileSystemError::InvalidInode(inumber));
        }

        let offset = offset as u64;
        let mut block = [0u8; BLOCK_SIZE];
        let mut written = 0;
        while written < data.len() {
            let pos = offset + written as u64;
            let n = (pos / BLOCK_SIZE as u64) as u32;
            let within = (pos % BLOCK_SIZE as u64) as usize;
            let chunk = (BLOCK_SIZE - within).min(data.len() - written);

            let mapped =
                match map_for_write(disk, &table, &mut mount.bitmap, inumber, &mut inode, n) {
                    Ok(mapped) => mapped,
                    Err(e @ (FileSystemError::DeviceFull | FileSystemError::OutOfRange(_)))
                        if written > 0 =>
                    {
                        warn!(
                            "inode {}: wrote {} of {} bytes ({})",
                            inumber,
                            written,
                            data.len(),
                            e
                        );
                        break;
                    }
                    Err(e) => return Err(e),
                };

            if mapped.fresh {
                block.fill(0);
            } else if chunk < BLOCK_SIZE {
                disk.read_block(mapped.block_id as u64, &mut block)?;
            }
            block[within..within + chunk].copy_from_slice(&data[written..written + chunk]);
            disk.write_block(mapped.block_id as u64, &block)?;
            written += chunk;

            let end = offset + written as u64;
            if end > inode.size as u64 {
                inode.size = end as u32;
                table.write(disk, inumber, &inode)?;
            }
        }
        Ok(written)
    }
}
