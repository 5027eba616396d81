//! 逻辑块号到物理块号的映射。
//!
//! 前 5 个逻辑块走 inode 中的直接指针，之后的 1024 个逻辑块走一级间接块。
//! 写入时按需分配，读取时遇到 0 指针即视为数据结束。

use log::{debug, warn};

use crate::{
    disk::{Block, BlockDevice, BLOCK_SIZE},
    fs::{
        config::{DIRECT_PTRS, PTRS_PER_BLOCK},
        error::{FileSystemError, Result},
        free_bitmap::FreeBitmap,
        inode_table::{Inode, InodeTable},
        super_block::SuperBlock,
    },
};

pub fn decode_pointer_block(block: &Block) -> Vec<u32> {
    block
        .chunks_exact(4)
        .map(|raw| u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
        .collect()
}

pub fn encode_pointer_block(pointers: &[u32]) -> Block {
    let mut block = [0u8; BLOCK_SIZE];
    for (raw, ptr) in block.chunks_exact_mut(4).zip(pointers) {
        raw.copy_from_slice(&ptr.to_le_bytes());
    }
    block
}

pub fn read_pointer_block(disk: &dyn BlockDevice, block_id: u32) -> Result<Vec<u32>> {
    let mut block = [0u8; BLOCK_SIZE];
    disk.read_block(block_id as u64, &mut block)?;
    Ok(decode_pointer_block(&block))
}

pub fn write_pointer_block(disk: &dyn BlockDevice, block_id: u32, pointers: &[u32]) -> Result<()> {
    disk.write_block(block_id as u64, &encode_pointer_block(pointers))?;
    Ok(())
}

/// 间接块中的槽位；超出一级间接范围时报 OutOfRange
fn indirect_slot(n: u32) -> Result<usize> {
    let slot = (n as usize) - DIRECT_PTRS;
    if slot >= PTRS_PER_BLOCK {
        return Err(FileSystemError::OutOfRange(n));
    }
    Ok(slot)
}

/// 只读查找：返回第 `n` 个逻辑块的物理块号，未分配时返回 `None`
pub fn lookup(disk: &dyn BlockDevice, inode: &Inode, n: u32) -> Result<Option<u32>> {
    let ptr = if (n as usize) < DIRECT_PTRS {
        inode.direct[n as usize]
    } else {
        let slot = indirect_slot(n)?;
        if inode.indirect == 0 {
            return Ok(None);
        }
        read_pointer_block(disk, inode.indirect)?[slot]
    };
    Ok((ptr != 0).then_some(ptr))
}

/// 写入时映射得到的物理块
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapped {
    pub block_id: u32,
    pub fresh: bool, // 本次新分配，内容需视为全 0
}

/// 写入映射：第 `n` 个逻辑块没有物理块时从位图分配，并把指针持久化
pub fn map_for_write(
    disk: &dyn BlockDevice,
    table: &InodeTable,
    bitmap: &mut FreeBitmap,
    inumber: u32,
    inode: &mut Inode,
    n: u32,
) -> Result<Mapped> {
    if (n as usize) < DIRECT_PTRS {
        let ptr = &mut inode.direct[n as usize];
        if *ptr != 0 {
            return Ok(Mapped {
                block_id: *ptr,
                fresh: false,
            });
        }
        let block_id = bitmap.allocate().ok_or(FileSystemError::DeviceFull)?;
        *ptr = block_id;
        table.write(disk, inumber, inode)?;
        debug!("inode {} logical block {} -> {}", inumber, n, block_id);
        return Ok(Mapped {
            block_id,
            fresh: true,
        });
    }

    let slot = indirect_slot(n)?;
    let new_indirect = inode.indirect == 0;
    let mut pointers = if new_indirect {
        inode.indirect = bitmap.allocate().ok_or(FileSystemError::DeviceFull)?;
        debug!("inode {} indirect block -> {}", inumber, inode.indirect);
        vec![0; PTRS_PER_BLOCK]
    } else {
        read_pointer_block(disk, inode.indirect)?
    };

    if pointers[slot] != 0 {
        return Ok(Mapped {
            block_id: pointers[slot],
            fresh: false,
        });
    }

    let Some(block_id) = bitmap.allocate() else {
        // 间接块没有用上，交还给位图
        if new_indirect {
            bitmap.release(inode.indirect);
            inode.indirect = 0;
        }
        return Err(FileSystemError::DeviceFull);
    };
    pointers[slot] = block_id;
    write_pointer_block(disk, inode.indirect, &pointers)?;
    if new_indirect {
        table.write(disk, inumber, inode)?;
    }
    debug!("inode {} logical block {} -> {}", inumber, n, block_id);
    Ok(Mapped {
        block_id,
        fresh: true,
    })
}

/// 把 inode 引用的块标记为占用（mount 时的可达性扫描）。
///
/// 超出 size 范围、落在数据区之外或已被其他 inode 占用的指针会被清零，
/// 间接块的修正直接写回磁盘；描述符本身有修正时返回 `true`，由调用方写回。
pub fn claim_blocks(
    disk: &dyn BlockDevice,
    sb: &SuperBlock,
    bitmap: &mut FreeBitmap,
    inode: &mut Inode,
) -> Result<bool> {
    let used = inode.blocks_used() as usize;
    let mut claim = |k: usize, limit: usize, ptr: &mut u32| -> bool {
        if *ptr == 0 {
            return false;
        }
        if k < limit && sb.is_data_block(*ptr) && bitmap.mark_used(*ptr) {
            return false;
        }
        *ptr = 0;
        true
    };

    let mut repaired = false;
    for (k, ptr) in inode.direct.iter_mut().enumerate() {
        repaired |= claim(k, used, ptr);
    }

    if inode.indirect == 0 {
        return Ok(repaired);
    }
    if used <= DIRECT_PTRS || claim(0, 1, &mut inode.indirect) {
        inode.indirect = 0;
        return Ok(true);
    }

    let mut pointers = read_pointer_block(disk, inode.indirect)?;
    let mut dirty = false;
    for (k, ptr) in pointers.iter_mut().enumerate() {
        dirty |= claim(k, used - DIRECT_PTRS, ptr);
    }
    if dirty {
        warn!("cleared stale pointers in indirect block {}", inode.indirect);
        write_pointer_block(disk, inode.indirect, &pointers)?;
    }
    Ok(repaired)
}

/// inode 当前持有的全部块：直接块、间接块以及间接块指向的数据块
pub fn owned_blocks(disk: &dyn BlockDevice, sb: &SuperBlock, inode: &Inode) -> Result<Vec<u32>> {
    let used = inode.blocks_used() as usize;
    let mut blocks: Vec<u32> = inode
        .direct
        .iter()
        .take(used)
        .copied()
        .filter(|&ptr| sb.is_data_block(ptr))
        .collect();

    if used > DIRECT_PTRS && sb.is_data_block(inode.indirect) {
        blocks.push(inode.indirect);
        blocks.extend(
            read_pointer_block(disk, inode.indirect)?
                .into_iter()
                .take(used - DIRECT_PTRS)
                .filter(|&ptr| sb.is_data_block(ptr)),
        );
    }
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        disk::MemoryDisk,
        fs::{config::INODES_PER_BLOCK, free_bitmap::FreeBitmap},
    };

    struct Fixture {
        disk: MemoryDisk,
        sb: SuperBlock,
        table: InodeTable,
        bitmap: FreeBitmap,
    }

    fn fixture(blocks: u32) -> Fixture {
        let sb = SuperBlock::for_device(blocks);
        let mut bitmap = FreeBitmap::new(blocks);
        for block_id in 0..sb.data_start() {
            bitmap.mark_used(block_id);
        }
        Fixture {
            disk: MemoryDisk::new(blocks as u64),
            table: InodeTable::new(&sb),
            sb,
            bitmap,
        }
    }

    #[test]
    fn pointer_block_layout_is_little_endian() {
        let mut pointers = vec![0u32; PTRS_PER_BLOCK];
        pointers[0] = 0x0102_0304;
        pointers[PTRS_PER_BLOCK - 1] = 7;
        let block = encode_pointer_block(&pointers);
        assert_eq!(&block[0..4], &[4, 3, 2, 1]);
        assert_eq!(&block[BLOCK_SIZE - 4..], &[7, 0, 0, 0]);
        assert_eq!(decode_pointer_block(&block), pointers);
    }

    #[test]
    fn direct_blocks_are_allocated_on_demand() {
        let mut fx = fixture(20);
        let mut inode = Inode::new();
        let first = map_for_write(&fx.disk, &fx.table, &mut fx.bitmap, 1, &mut inode, 0).unwrap();
        assert_eq!(
            first,
            Mapped {
                block_id: 3,
                fresh: true
            }
        );
        let again = map_for_write(&fx.disk, &fx.table, &mut fx.bitmap, 1, &mut inode, 0).unwrap();
        assert!(!again.fresh);
        assert_eq!(again.block_id, 3);
        assert_eq!(fx.table.read(&fx.disk, 1).unwrap().direct[0], 3);
        assert_eq!(lookup(&fx.disk, &inode, 0).unwrap(), Some(3));
        assert_eq!(lookup(&fx.disk, &inode, 1).unwrap(), None);
    }

    #[test]
    fn sixth_block_goes_through_indirect_block() {
        let mut fx = fixture(20);
        let mut inode = Inode::new();
        for n in 0..=5 {
            map_for_write(&fx.disk, &fx.table, &mut fx.bitmap, 1, &mut inode, n).unwrap();
        }
        // 直接块 3..=7，间接块 8，第 6 个数据块 9
        assert_eq!(inode.direct, [3, 4, 5, 6, 7]);
        assert_eq!(inode.indirect, 8);
        assert_eq!(lookup(&fx.disk, &inode, 5).unwrap(), Some(9));
        assert_eq!(read_pointer_block(&fx.disk, 8).unwrap()[0], 9);
        assert_eq!(fx.table.read(&fx.disk, 1).unwrap().indirect, 8);
    }

    #[test]
    fn indirect_block_is_returned_when_data_block_cannot_be_allocated() {
        let mut fx = fixture(20);
        while fx.bitmap.free_blocks() > 1 {
            fx.bitmap.allocate();
        }
        let mut inode = Inode::new();
        let err = map_for_write(&fx.disk, &fx.table, &mut fx.bitmap, 1, &mut inode, 5).unwrap_err();
        assert!(matches!(err, FileSystemError::DeviceFull));
        assert_eq!(inode.indirect, 0);
        assert_eq!(fx.bitmap.free_blocks(), 1);
    }

    #[test]
    fn logical_block_past_indirect_span_is_out_of_range() {
        let mut fx = fixture(20);
        let mut inode = Inode::new();
        let n = (DIRECT_PTRS + PTRS_PER_BLOCK) as u32;
        assert!(matches!(
            map_for_write(&fx.disk, &fx.table, &mut fx.bitmap, 1, &mut inode, n),
            Err(FileSystemError::OutOfRange(_))
        ));
        assert!(matches!(
            lookup(&fx.disk, &inode, n),
            Err(FileSystemError::OutOfRange(_))
        ));
    }

    #[test]
    fn claim_clears_pointers_beyond_size() {
        let mut fx = fixture(20);
        let mut inode = Inode {
            valid: true,
            size: BLOCK_SIZE as u32,
            direct: [3, 4, 0, 0, 0],
            indirect: 9,
        };
        let repaired = claim_blocks(&fx.disk, &fx.sb, &mut fx.bitmap, &mut inode).unwrap();
        assert!(repaired);
        assert_eq!(inode.direct, [3, 0, 0, 0, 0]);
        assert_eq!(inode.indirect, 0);
        assert!(fx.bitmap.is_used(3));
        assert!(!fx.bitmap.is_used(4));
        assert!(!fx.bitmap.is_used(9));
    }

    #[test]
    fn claim_rejects_metadata_and_out_of_range_pointers() {
        let mut fx = fixture(20);
        let mut inode = Inode {
            valid: true,
            size: 3 * BLOCK_SIZE as u32,
            direct: [1, 500, 5, 0, 0],
            indirect: 0,
        };
        assert!(claim_blocks(&fx.disk, &fx.sb, &mut fx.bitmap, &mut inode).unwrap());
        assert_eq!(inode.direct, [0, 0, 5, 0, 0]);
    }

    #[test]
    fn claim_drops_cross_linked_blocks() {
        let mut fx = fixture(20);
        let mut first = Inode {
            valid: true,
            size: 10,
            direct: [6, 0, 0, 0, 0],
            indirect: 0,
        };
        let mut second = first;
        assert!(!claim_blocks(&fx.disk, &fx.sb, &mut fx.bitmap, &mut first).unwrap());
        assert!(claim_blocks(&fx.disk, &fx.sb, &mut fx.bitmap, &mut second).unwrap());
        assert_eq!(second.direct[0], 0);
    }

    #[test]
    fn claim_trims_indirect_entries_past_size() {
        let mut fx = fixture(20);
        let mut pointers = vec![0u32; PTRS_PER_BLOCK];
        pointers[0] = 9;
        pointers[1] = 10;
        write_pointer_block(&fx.disk, 8, &pointers).unwrap();
        let mut inode = Inode {
            valid: true,
            size: 6 * BLOCK_SIZE as u32,
            direct: [3, 4, 5, 6, 7],
            indirect: 8,
        };
        assert!(!claim_blocks(&fx.disk, &fx.sb, &mut fx.bitmap, &mut inode).unwrap());
        assert!(fx.bitmap.is_used(8));
        assert!(fx.bitmap.is_used(9));
        assert!(!fx.bitmap.is_used(10));
        assert_eq!(read_pointer_block(&fx.disk, 8).unwrap()[1], 0);

        let owned = owned_blocks(&fx.disk, &fx.sb, &inode).unwrap();
        assert_eq!(owned, vec![3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn inode_numbers_map_into_table_blocks() {
        let fx = fixture(20);
        let inumber = INODES_PER_BLOCK + 1;
        let mut inode = Inode::new();
        inode.size = 5;
        fx.table.write(&fx.disk, inumber, &inode).unwrap();
        let raw = fx.table.load_block(&fx.disk, 1).unwrap();
        assert_eq!(raw[1].size, 5);
    }
}
