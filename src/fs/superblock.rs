use bincode::{Decode, Encode};

use crate::{
    error::{FsError, Result},
    utils::{
        fixed_str,
        fs_size_calculator::{self, Layout},
        time_util,
        traits::FixedSizeRecord,
    },
};

use super::{AllocationStrategy, BLOCK_SIZE, FS_MAGIC, FS_NAME, FS_VERSION, ROOT_INODE};

/// The superblock of this filesystem, stored in block 0
#[derive(Encode, Decode, Debug, Clone, PartialEq, Eq)]
pub struct SuperBlock {
    /// magic number
    pub magic: u32,
    fs_name: [u8; 32],
    pub version: u32,
    /// data block size
    pub block_size: u32,
    pub total_blocks: u32,
    pub total_inodes: u32,
    pub free_blocks: u32,
    pub free_inodes: u32,
    pub root_inode: u32,
    pub allocation_strategy: AllocationStrategy,
    pub inode_bitmap_start: u32,
    pub data_bitmap_start: u32,
    pub inode_table_start: u32,
    pub data_blocks_start: u32,
    /// milliseconds since the unix epoch
    pub created_at: u64,
    /// milliseconds since the unix epoch, 0 until the first mount
    pub last_mounted_at: u64,
}

impl FixedSizeRecord for SuperBlock {
    const SIZE: usize = BLOCK_SIZE as usize;
}

impl SuperBlock {
    /// a fresh superblock for `layout`, every data block and inode still free
    pub fn new(layout: &Layout, allocation_strategy: AllocationStrategy) -> Self {
        SuperBlock {
            magic: FS_MAGIC,
            fs_name: fixed_str::encode(FS_NAME),
            version: FS_VERSION,
            block_size: BLOCK_SIZE,
            total_blocks: layout.total_blocks,
            total_inodes: layout.total_inodes,
            free_blocks: layout.data_blocks,
            free_inodes: layout.total_inodes,
            root_inode: ROOT_INODE,
            allocation_strategy,
            inode_bitmap_start: layout.inode_bitmap_start,
            data_bitmap_start: layout.data_bitmap_start,
            inode_table_start: layout.inode_table_start,
            data_blocks_start: layout.data_blocks_start,
            created_at: time_util::now(),
            last_mounted_at: 0,
        }
    }

    pub fn fs_name(&self) -> String {
        fixed_str::decode(&self.fs_name)
    }

    pub fn set_fs_name(&mut self, name: &str) {
        self.fs_name = fixed_str::encode(name);
    }

    /// check the magic number
    pub fn is_valid(&self) -> bool {
        self.magic == FS_MAGIC
    }

    /// number of units tracked by the data bitmap
    pub fn data_blocks(&self) -> u32 {
        self.total_blocks.saturating_sub(self.data_blocks_start)
    }

    /// make sure the regions describe a volume we can operate on
    /// # Params
    /// - `image_len`: length of the backing image in bytes
    pub fn check_geometry(&self, image_len: u64) -> Result<()> {
        if self.block_size != BLOCK_SIZE {
            return Err(FsError::Integrity(format!(
                "unsupported block size {}",
                self.block_size
            )));
        }
        let ordered = 0 < self.inode_bitmap_start
            && self.inode_bitmap_start < self.data_bitmap_start
            && self.data_bitmap_start < self.inode_table_start
            && self.inode_table_start < self.data_blocks_start
            && self.data_blocks_start < self.total_blocks;
        if !ordered {
            return Err(FsError::Integrity(
                "region offsets are not strictly increasing".to_string(),
            ));
        }
        let inode_bitmap_blocks = fs_size_calculator::bitmap_blocks(self.total_inodes, BLOCK_SIZE);
        let data_bitmap_blocks = fs_size_calculator::bitmap_blocks(self.data_blocks(), BLOCK_SIZE);
        let inode_table_blocks =
            fs_size_calculator::inode_table_blocks(self.total_inodes, BLOCK_SIZE);
        if self.data_bitmap_start - self.inode_bitmap_start < inode_bitmap_blocks {
            return Err(FsError::Integrity(format!(
                "inode bitmap of {} blocks cannot track {} inodes",
                self.data_bitmap_start - self.inode_bitmap_start,
                self.total_inodes
            )));
        }
        if self.inode_table_start - self.data_bitmap_start < data_bitmap_blocks {
            return Err(FsError::Integrity(format!(
                "data bitmap of {} blocks cannot track {} data blocks",
                self.inode_table_start - self.data_bitmap_start,
                self.data_blocks()
            )));
        }
        if self.data_blocks_start - self.inode_table_start < inode_table_blocks {
            return Err(FsError::Integrity(format!(
                "inode table of {} blocks cannot hold {} inodes",
                self.data_blocks_start - self.inode_table_start,
                self.total_inodes
            )));
        }
        let needed = self.total_blocks as u64 * self.block_size as u64;
        if image_len < needed {
            return Err(FsError::Integrity(format!(
                "image holds {image_len} bytes but the superblock describes {needed}"
            )));
        }
        Ok(())
    }

    pub fn update_last_mounted_at(&mut self) {
        self.last_mounted_at = time_util::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SuperBlock {
        let mut sb = SuperBlock::new(&Layout::compute(16).unwrap(), AllocationStrategy::Contiguous);
        sb.set_fs_name("TestFS");
        sb.version = 3;
        sb.free_blocks = 4500;
        sb.free_inodes = 800;
        sb.created_at = 1_234_567_890;
        sb.last_mounted_at = 9_876_543_210;
        sb
    }

    #[test]
    fn test_superblock_serialization_and_deserialization() -> anyhow::Result<()> {
        let original = sample();
        let bytes = original.to_bytes()?;
        assert_eq!(bytes.len(), BLOCK_SIZE as usize);
        let restored = SuperBlock::from_bytes(&bytes)?;
        assert_eq!(restored, original);
        assert_eq!(restored.fs_name(), "TestFS");
        assert!(restored.is_valid());
        Ok(())
    }

    #[test]
    fn test_magic_is_first_and_big_endian() -> anyhow::Result<()> {
        let bytes = sample().to_bytes()?;
        assert_eq!(&bytes[..4], b"MYFS");
        Ok(())
    }

    #[test]
    fn test_corrupted_magic_fails_validity_check() -> anyhow::Result<()> {
        let mut bytes = sample().to_bytes()?;
        bytes[..4].copy_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        let restored = SuperBlock::from_bytes(&bytes)?;
        assert!(!restored.is_valid());
        Ok(())
    }

    #[test]
    fn test_short_buffer_is_a_codec_error() {
        let err = SuperBlock::from_bytes(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, FsError::Codec(_)));
    }

    #[test]
    fn test_check_geometry() {
        let sb = sample();
        let len = sb.total_blocks as u64 * BLOCK_SIZE as u64;
        assert!(sb.check_geometry(len).is_ok());
        assert!(sb.check_geometry(len - 1).is_err());

        let mut bad = sb.clone();
        bad.inode_table_start = bad.data_bitmap_start;
        assert!(matches!(bad.check_geometry(len), Err(FsError::Integrity(_))));
    }

    #[test]
    fn test_regions_must_fit_their_counts() {
        let sb = sample();
        let len = sb.total_blocks as u64 * BLOCK_SIZE as u64;

        // the inode table of 16 MiB has room for 1024 inodes and no more
        let mut bad = sb.clone();
        bad.total_inodes = 1025;
        assert!(matches!(bad.check_geometry(len), Err(FsError::Integrity(_))));

        // a million inodes overflow the single inode bitmap block too
        bad.total_inodes = 1_000_000;
        assert!(matches!(bad.check_geometry(len), Err(FsError::Integrity(_))));

        // one data bitmap block tracks 32768 blocks
        let mut bad = sb.clone();
        bad.total_blocks = bad.data_blocks_start + 32769;
        let len = bad.total_blocks as u64 * BLOCK_SIZE as u64;
        assert!(matches!(bad.check_geometry(len), Err(FsError::Integrity(_))));
    }
}
