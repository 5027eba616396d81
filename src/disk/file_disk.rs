use std::{
    fs::{File, OpenOptions},
    io::{Error, ErrorKind, Read, Result, Seek, SeekFrom, Write},
    path::Path,
    sync::Mutex,
};

use log::info;

use crate::disk::{
    block_device::{out_of_bounds, poisoned, BlockDevice},
    types::{image_len, Block, BLOCK_SIZE},
};

/// 以普通文件模拟的磁盘镜像
#[derive(Debug)]
pub struct FileDisk {
    file: Mutex<File>,
    block_count: u64,
}

impl FileDisk {
    /// 打开磁盘镜像；文件不足 `block_count` 块时自动扩展。
    /// `block_count` 为 `None` 时按现有文件长度推算块数。
    pub fn open(path: impl AsRef<Path>, block_count: Option<u64>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let current_len = file.metadata()?.len();
        let block_count = match block_count {
            Some(count) => {
                if current_len < image_len(count) {
                    info!(
                        "allocating disk image {} ({} blocks)",
                        path.display(),
                        count
                    );
                    file.set_len(image_len(count))?;
                }
                count
            }
            None => current_len / BLOCK_SIZE as u64,
        };

        if block_count == 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("disk image {} has no blocks", path.display()),
            ));
        }

        Ok(Self {
            file: Mutex::new(file),
            block_count,
        })
    }
}

impl BlockDevice for FileDisk {
    fn read_block(&self, block_id: u64, buf: &mut Block) -> Result<()> {
        if block_id >= self.block_count {
            return Err(out_of_bounds(block_id, self.block_count));
        }
        let mut file = self.file.lock().map_err(|_| poisoned())?;
        file.seek(SeekFrom::Start(block_id * BLOCK_SIZE as u64))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn write_block(&self, block_id: u64, buf: &Block) -> Result<()> {
        if block_id >= self.block_count {
            return Err(out_of_bounds(block_id, self.block_count));
        }
        let mut file = self.file.lock().map_err(|_| poisoned())?;
        file.seek(SeekFrom::Start(block_id * BLOCK_SIZE as u64))?;
        file.write_all(buf)?;
        Ok(())
    }

    fn block_count(&self) -> u64 {
        self.block_count
    }
}
