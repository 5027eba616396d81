use log::debug;

/// 空闲块位图：每个 bit 表示一个块是否被占用
/// 只存在于内存中，每次 mount 时根据 inode 重新构建。
#[derive(Debug, Clone)]
pub struct FreeBitmap {
    bits: Vec<u8>,
    total_blocks: u32,
    free_blocks: u32,
}

impl FreeBitmap {
    /// 所有块初始均为空闲
    pub fn new(total_blocks: u32) -> Self {
        let byte_len = total_blocks.div_ceil(8) as usize;
        Self {
            bits: vec![0; byte_len],
            total_blocks,
            free_blocks: total_blocks,
        }
    }

    pub fn total_blocks(&self) -> u32 {
        self.total_blocks
    }

    pub fn free_blocks(&self) -> u32 {
        self.free_blocks
    }

    pub fn is_used(&self, block_id: u32) -> bool {
        if block_id >= self.total_blocks {
            return false;
        }
        let byte_index = (block_id / 8) as usize;
        let bit_index = block_id % 8;
        self.bits[byte_index] & (1 << bit_index) != 0
    }

    /// 标记为占用；返回该块之前是否空闲
    pub fn mark_used(&mut self, block_id: u32) -> bool {
        if block_id >= self.total_blocks || self.is_used(block_id) {
            return false;
        }
        self.bits[(block_id / 8) as usize] |= 1 << (block_id % 8);
        self.free_blocks -= 1;
        true
    }

    /// 释放一个块
    pub fn release(&mut self, block_id: u32) {
        if !self.is_used(block_id) {
            return; // 防止越界或重复释放
        }
        self.bits[(block_id / 8) as usize] &= !(1 << (block_id % 8));
        self.free_blocks += 1;
        debug!("released block {}", block_id);
    }

    /// 按块号升序分配第一个空闲块
    pub fn allocate(&mut self) -> Option<u32> {
        if self.free_blocks == 0 {
            return None;
        }
        let (byte_index, byte) = self
            .bits
            .iter()
            .copied()
            .enumerate()
            .find(|&(_, byte)| byte != 0xFF)?;
        // 末尾多出的 bit 永远为 0，超出总块数说明已无空闲块
        let block_id = byte_index as u32 * 8 + byte.trailing_ones();
        if block_id >= self.total_blocks {
            return None;
        }
        self.mark_used(block_id);
        debug!("allocated block {}", block_id);
        Some(block_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_lowest_free_block_first() {
        let mut bitmap = FreeBitmap::new(10);
        bitmap.mark_used(0);
        bitmap.mark_used(1);
        bitmap.mark_used(3);
        assert_eq!(bitmap.allocate(), Some(2));
        assert_eq!(bitmap.allocate(), Some(4));
        assert_eq!(bitmap.free_blocks(), 5);
    }

    #[test]
    fn released_block_is_handed_out_again() {
        let mut bitmap = FreeBitmap::new(16);
        for expected in 0..16 {
            assert_eq!(bitmap.allocate(), Some(expected));
        }
        assert_eq!(bitmap.allocate(), None);
        bitmap.release(9);
        assert!(!bitmap.is_used(9));
        assert_eq!(bitmap.allocate(), Some(9));
    }

    #[test]
    fn never_allocates_past_total_blocks() {
        let mut bitmap = FreeBitmap::new(3);
        assert_eq!(bitmap.allocate(), Some(0));
        assert_eq!(bitmap.allocate(), Some(1));
        assert_eq!(bitmap.allocate(), Some(2));
        assert_eq!(bitmap.allocate(), None);
        assert_eq!(bitmap.free_blocks(), 0);
    }

    #[test]
    fn mark_and_release_are_idempotent() {
        let mut bitmap = FreeBitmap::new(8);
        assert!(bitmap.mark_used(5));
        assert!(!bitmap.mark_used(5));
        assert_eq!(bitmap.free_blocks(), 7);
        bitmap.release(5);
        bitmap.release(5);
        assert_eq!(bitmap.free_blocks(), 8);
        assert!(!bitmap.mark_used(8));
        bitmap.release(100);
        assert_eq!(bitmap.free_blocks(), 8);
    }
}
