//! This module contains functions to calculate the size of different fs components

use crate::fs::{BLOCK_SIZE, BYTES_PER_INODE, INODE_SIZE};

/// calculate how many bytes a bitmap tracking `element_count` units needs
/// # Example
/// ```
/// use myfs::utils::fs_size_calculator::bitmap_size;
/// assert_eq!(bitmap_size(100), 13);
/// ```
pub const fn bitmap_size(element_count: u32) -> u32 {
    element_count.div_ceil(8)
}

/// calculate how many whole blocks `bytes` bytes occupy
/// # Example
/// ```
/// use myfs::utils::fs_size_calculator::blocks_for;
/// assert_eq!(blocks_for(1, 4096), 1);
/// assert_eq!(blocks_for(4097, 4096), 2);
/// ```
pub const fn blocks_for(bytes: u32, block_size: u32) -> u32 {
    bytes.div_ceil(block_size)
}

/// calculate how many blocks a bitmap tracking `element_count` units occupies
pub const fn bitmap_blocks(element_count: u32, block_size: u32) -> u32 {
    blocks_for(bitmap_size(element_count), block_size)
}

/// calculate needed Inode Table size in blocks
pub const fn inode_table_blocks(inode_count: u32, block_size: u32) -> u32 {
    (inode_count as u64 * INODE_SIZE as u64).div_ceil(block_size as u64) as u32
}

/// the largest volume whose block count still fits in the superblock
pub const MAX_SIZE_MB: u32 = (u32::MAX as u64 * BLOCK_SIZE as u64 / (1024 * 1024)) as u32;

/// region geometry of a volume, in blocks
///
/// regions follow each other in a fixed order:
/// superblock, inode bitmap, data bitmap, inode table, data blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub total_bytes: u64,
    pub total_blocks: u32,
    pub total_inodes: u32,
    pub inode_bitmap_blocks: u32,
    pub data_bitmap_blocks: u32,
    pub inode_table_blocks: u32,
    pub data_blocks: u32,
    pub inode_bitmap_start: u32,
    pub data_bitmap_start: u32,
    pub inode_table_start: u32,
    pub data_blocks_start: u32,
}

impl Layout {
    /// compute the layout of a `size_mb` MiB volume
    ///
    /// The data bitmap is sized from a provisional data block count
    /// (everything left after the superblock, inode bitmap and inode table),
    /// then the real data block count is whatever remains once the data bitmap is placed too.
    ///
    /// # Return
    /// [None] if the volume is too small to hold the metadata regions,
    /// or larger than [MAX_SIZE_MB]
    /// # Example
    /// ```
    /// use myfs::utils::fs_size_calculator::Layout;
    /// let layout = Layout::compute(16).unwrap();
    /// assert_eq!(layout.total_blocks, 4096);
    /// assert_eq!(layout.total_inodes, 1024);
    /// assert_eq!(layout.data_blocks_start, 67);
    /// assert_eq!(layout.data_blocks, 4029);
    /// ```
    pub fn compute(size_mb: u32) -> Option<Self> {
        let total_bytes = size_mb as u64 * 1024 * 1024;
        let total_blocks = u32::try_from(total_bytes / BLOCK_SIZE as u64).ok()?;
        let total_inodes = u32::try_from(total_bytes / BYTES_PER_INODE as u64).ok()?;

        let inode_bitmap_blocks = bitmap_blocks(total_inodes, BLOCK_SIZE);
        let inode_table_blocks = inode_table_blocks(total_inodes, BLOCK_SIZE);

        let provisional_data_blocks =
            total_blocks.checked_sub(1 + inode_bitmap_blocks + inode_table_blocks)?;
        let data_bitmap_blocks = bitmap_blocks(provisional_data_blocks, BLOCK_SIZE);

        let data_blocks = total_blocks
            .checked_sub(1 + inode_bitmap_blocks + data_bitmap_blocks + inode_table_blocks)?;

        let inode_bitmap_start = 1;
        let data_bitmap_start = inode_bitmap_start + inode_bitmap_blocks;
        let inode_table_start = data_bitmap_start + data_bitmap_blocks;
        let data_blocks_start = inode_table_start + inode_table_blocks;

        Some(Layout {
            total_bytes,
            total_blocks,
            total_inodes,
            inode_bitmap_blocks,
            data_bitmap_blocks,
            inode_table_blocks,
            data_blocks,
            inode_bitmap_start,
            data_bitmap_start,
            inode_table_start,
            data_blocks_start,
        })
    }
}
