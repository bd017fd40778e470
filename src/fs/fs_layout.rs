//! what does our filesystem look like in the memory
//!
//! [FileSystem] is the handle of a mounted volume. It is created by
//! [FileSystem::format] or [FileSystem::mount] and consumed by [FileSystem::unmount];
//! while it lives it is the only reader and writer of the image.
//!
//! Every allocation or release rewrites the superblock and the affected bitmap
//! region immediately. There is no journal: a crash between those two writes can
//! leave the free counters and the bitmap disagreeing on the next mount.

use std::{
    fs::File,
    ops::Range,
    path::{Path, PathBuf},
};

use log::debug;
use memmap2::MmapMut;

use crate::{
    error::{FsError, Result},
    utils::{fs_size_calculator, traits::FixedSizeRecord},
};

use super::{
    AllocationStrategy, Bitmap, DirectoryEntry, Group, Inode, Registry, SuperBlock, User,
    BLOCK_SIZE, DIR_ENTRY_SIZE, ENTRIES_PER_BLOCK, GROUP_TABLE_BLOCK, INODE_SIZE,
    USER_TABLE_BLOCK,
};

const BLOCK_BYTES: usize = BLOCK_SIZE as usize;

/// it has the following layout:
/// - superblock (block 0)
/// - inode bitmap
/// - data bitmap
/// - inode table
/// - data blocks
#[derive(Debug)]
pub struct FileSystem {
    pub(crate) image_path: PathBuf,
    /// kept open for as long as the mapping lives
    pub(crate) image_file: File,
    pub(crate) image_mmap: MmapMut,
    pub(crate) superblock: SuperBlock,
    pub(crate) inode_bitmap: Bitmap,
    pub(crate) data_bitmap: Bitmap,
    pub(crate) users: Registry<User>,
    pub(crate) groups: Registry<Group>,
}

/// space accounting of a mounted volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsStats {
    pub fs_name: String,
    pub version: u32,
    pub block_size: u32,
    pub total_blocks: u32,
    pub free_blocks: u32,
    pub used_blocks: u32,
    pub total_inodes: u32,
    pub free_inodes: u32,
    pub used_inodes: u32,
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub used_bytes: u64,
    pub allocation_strategy: AllocationStrategy,
    pub users: usize,
    pub groups: usize,
    pub created_at: u64,
    pub last_mounted_at: u64,
}

/// get [SuperBlock], bitmaps and credential tables of this filesystem
impl FileSystem {
    #[inline]
    pub fn superblock(&self) -> &SuperBlock {
        &self.superblock
    }

    #[inline]
    pub fn inode_bitmap(&self) -> &Bitmap {
        &self.inode_bitmap
    }

    #[inline]
    pub fn data_bitmap(&self) -> &Bitmap {
        &self.data_bitmap
    }

    #[inline]
    pub fn users(&self) -> &Registry<User> {
        &self.users
    }

    /// changes reach the image on [FileSystem::sync] or [FileSystem::unmount]
    #[inline]
    pub fn users_mut(&mut self) -> &mut Registry<User> {
        &mut self.users
    }

    #[inline]
    pub fn groups(&self) -> &Registry<Group> {
        &self.groups
    }

    #[inline]
    pub fn groups_mut(&mut self) -> &mut Registry<Group> {
        &mut self.groups
    }

    #[inline]
    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    #[inline]
    pub const fn entries_per_block(&self) -> usize {
        ENTRIES_PER_BLOCK
    }

    pub(crate) fn user_table_block(&self) -> u32 {
        self.superblock.data_blocks_start + USER_TABLE_BLOCK
    }

    pub(crate) fn group_table_block(&self) -> u32 {
        self.superblock.data_blocks_start + GROUP_TABLE_BLOCK
    }

    pub fn stats(&self) -> FsStats {
        let sb = &self.superblock;
        let block_size = sb.block_size as u64;
        let used_blocks = sb.total_blocks.saturating_sub(sb.free_blocks);
        FsStats {
            fs_name: sb.fs_name(),
            version: sb.version,
            block_size: sb.block_size,
            total_blocks: sb.total_blocks,
            free_blocks: sb.free_blocks,
            used_blocks,
            total_inodes: sb.total_inodes,
            free_inodes: sb.free_inodes,
            used_inodes: sb.total_inodes.saturating_sub(sb.free_inodes),
            total_bytes: sb.total_blocks as u64 * block_size,
            free_bytes: sb.free_blocks as u64 * block_size,
            used_bytes: used_blocks as u64 * block_size,
            allocation_strategy: sb.allocation_strategy,
            users: self.users.len(),
            groups: self.groups.len(),
            created_at: sb.created_at,
            last_mounted_at: sb.last_mounted_at,
        }
    }
}

/// raw block I/O
impl FileSystem {
    fn block_range(&self, block: u32) -> Result<Range<usize>> {
        if block >= self.superblock.total_blocks {
            return Err(FsError::Validation(format!(
                "block {block} is outside a volume of {} blocks",
                self.superblock.total_blocks
            )));
        }
        let start = block as usize * BLOCK_BYTES;
        let range = start..start + BLOCK_BYTES;
        if range.end > self.image_mmap.len() {
            return Err(FsError::Integrity(format!(
                "block {block} lies past the end of the image"
            )));
        }
        Ok(range)
    }

    pub(crate) fn read_block(&self, block: u32) -> Result<Vec<u8>> {
        let range = self.block_range(block)?;
        Ok(self.image_mmap[range].to_vec())
    }

    pub(crate) fn write_block(&mut self, block: u32, data: &[u8]) -> Result<()> {
        if data.len() != BLOCK_BYTES {
            return Err(FsError::Validation(format!(
                "a block holds {BLOCK_BYTES} bytes, got {}",
                data.len()
            )));
        }
        let range = self.block_range(block)?;
        self.image_mmap[range].copy_from_slice(data);
        Ok(())
    }

    pub(crate) fn write_superblock(&mut self) -> Result<()> {
        let bytes = self.superblock.to_bytes()?;
        self.write_block(0, &bytes)
    }

    // lay serialized bitmap bytes over consecutive blocks from `start`, zero padding the last one
    fn write_bitmap_region(&mut self, start: u32, bytes: &[u8]) -> Result<()> {
        for (i, chunk) in bytes.chunks(BLOCK_BYTES).enumerate() {
            let mut block = vec![0u8; BLOCK_BYTES];
            block[..chunk.len()].copy_from_slice(chunk);
            self.write_block(start + i as u32, &block)?;
        }
        Ok(())
    }

    pub(crate) fn write_inode_bitmap(&mut self) -> Result<()> {
        let bytes = self.inode_bitmap.to_bytes();
        self.write_bitmap_region(self.superblock.inode_bitmap_start, &bytes)
    }

    pub(crate) fn write_data_bitmap(&mut self) -> Result<()> {
        let bytes = self.data_bitmap.to_bytes();
        self.write_bitmap_region(self.superblock.data_bitmap_start, &bytes)
    }

    /// rebuild a bitmap of `units` bits stored from block `start`
    pub(crate) fn read_bitmap_region(&self, start: u32, units: u32) -> Result<Bitmap> {
        let byte_len = fs_size_calculator::bitmap_size(units) as usize;
        let blocks = fs_size_calculator::bitmap_blocks(units, BLOCK_SIZE);
        let mut bytes = Vec::with_capacity(blocks as usize * BLOCK_BYTES);
        for i in 0..blocks {
            bytes.extend_from_slice(&self.read_block(start + i)?);
        }
        bytes.truncate(byte_len);
        Ok(Bitmap::from_bytes(&bytes, units as usize))
    }
}

/// [Inode] operations
impl FileSystem {
    fn inode_range(&self, inode_number: u32) -> Result<Range<usize>> {
        if inode_number >= self.superblock.total_inodes {
            return Err(FsError::Validation(format!(
                "invalid inode number {inode_number}"
            )));
        }
        let start = self.superblock.inode_table_start as usize * BLOCK_BYTES
            + inode_number as usize * INODE_SIZE as usize;
        let range = start..start + INODE_SIZE as usize;
        if range.end > self.image_mmap.len() {
            return Err(FsError::Integrity(format!(
                "inode {inode_number} lies past the end of the image"
            )));
        }
        Ok(range)
    }

    pub fn read_inode(&self, inode_number: u32) -> Result<Inode> {
        let range = self.inode_range(inode_number)?;
        Inode::from_bytes(&self.image_mmap[range])
    }

    pub fn write_inode(&mut self, inode: &Inode) -> Result<()> {
        let range = self.inode_range(inode.inode_number)?;
        let bytes = inode.to_bytes()?;
        self.image_mmap[range].copy_from_slice(&bytes);
        Ok(())
    }

    /// take the lowest free inode
    pub fn allocate_inode(&mut self) -> Result<u32> {
        let index = self
            .inode_bitmap
            .find_first_free()
            .ok_or_else(|| FsError::Capacity("no free inodes".to_string()))?;
        self.inode_bitmap.allocate(index);
        self.superblock.free_inodes = self.superblock.free_inodes.saturating_sub(1);
        self.write_superblock()?;
        self.write_inode_bitmap()?;
        debug!("allocated inode {index}");
        Ok(index as u32)
    }

    pub fn free_inode(&mut self, inode_number: u32) -> Result<()> {
        if inode_number >= self.superblock.total_inodes {
            return Err(FsError::Validation(format!(
                "invalid inode number {inode_number}"
            )));
        }
        if !self.inode_bitmap.is_allocated(inode_number as usize) {
            return Err(FsError::Validation(format!(
                "inode {inode_number} is already free"
            )));
        }
        self.inode_bitmap.free(inode_number as usize);
        self.superblock.free_inodes += 1;
        self.write_superblock()?;
        self.write_inode_bitmap()?;
        debug!("freed inode {inode_number}");
        Ok(())
    }
}

/// data block operations
impl FileSystem {
    /// index in the data bitmap of an absolute block number
    pub fn relative_data_block(&self, block: u32) -> Option<usize> {
        block
            .checked_sub(self.superblock.data_blocks_start)
            .map(|rel| rel as usize)
            .filter(|rel| *rel < self.data_bitmap.size())
    }

    /// take the lowest free data block
    /// # Return
    /// the absolute block number
    pub fn allocate_data_block(&mut self) -> Result<u32> {
        let index = self
            .data_bitmap
            .find_first_free()
            .ok_or_else(|| FsError::Capacity("no free data blocks".to_string()))?;
        self.data_bitmap.allocate(index);
        self.superblock.free_blocks = self.superblock.free_blocks.saturating_sub(1);
        self.write_superblock()?;
        self.write_data_bitmap()?;
        let block = self.superblock.data_blocks_start + index as u32;
        debug!("allocated data block {block}");
        Ok(block)
    }

    /// release a block returned by [FileSystem::allocate_data_block]
    pub fn free_data_block(&mut self, block: u32) -> Result<()> {
        let index = self.relative_data_block(block).ok_or_else(|| {
            FsError::Validation(format!("block {block} is not a data block"))
        })?;
        if !self.data_bitmap.is_allocated(index) {
            return Err(FsError::Validation(format!(
                "data block {block} is already free"
            )));
        }
        self.data_bitmap.free(index);
        self.superblock.free_blocks += 1;
        self.write_superblock()?;
        self.write_data_bitmap()?;
        debug!("freed data block {block}");
        Ok(())
    }
}

/// directory content, always the first direct block of a directory inode
impl FileSystem {
    fn check_directory(&self, dir: &Inode) -> Result<()> {
        if !dir.is_dir() {
            return Err(FsError::Validation(format!(
                "inode {} is not a directory",
                dir.inode_number
            )));
        }
        match dir.first_block() {
            Some(block) if self.relative_data_block(block).is_none() => {
                Err(FsError::Integrity(format!(
                    "directory inode {} points at block {block} outside the data region",
                    dir.inode_number
                )))
            }
            _ => Ok(()),
        }
    }

    /// every slot of the directory block, free ones included;
    /// a directory that never got a block is empty
    pub fn read_directory_entries(&self, dir: &Inode) -> Result<Vec<DirectoryEntry>> {
        self.check_directory(dir)?;
        let Some(block) = dir.first_block() else {
            return Ok(Vec::new());
        };
        self.read_block(block)?
            .chunks_exact(DIR_ENTRY_SIZE as usize)
            .take(ENTRIES_PER_BLOCK)
            .map(DirectoryEntry::from_bytes)
            .collect()
    }

    /// replace the directory block with `entries`, unused trailing slots are written free
    ///
    /// The first write to a directory without a block allocates one and records it in `dir`.
    /// More than [ENTRIES_PER_BLOCK] entries fail before anything is written.
    pub fn write_directory_entries(
        &mut self,
        dir: &mut Inode,
        entries: &[DirectoryEntry],
    ) -> Result<()> {
        self.check_directory(dir)?;
        if entries.len() > ENTRIES_PER_BLOCK {
            return Err(FsError::Capacity(format!(
                "{} entries do not fit in a directory block of {ENTRIES_PER_BLOCK}",
                entries.len()
            )));
        }

        let mut data = vec![0u8; BLOCK_BYTES];
        let padded = entries
            .iter()
            .cloned()
            .chain(std::iter::repeat_with(DirectoryEntry::free));
        for (slot, entry) in data.chunks_exact_mut(DIR_ENTRY_SIZE as usize).zip(padded) {
            entry.encode_into(slot)?;
        }

        let block = match dir.first_block() {
            Some(block) => block,
            None => {
                let block = self.allocate_data_block()?;
                dir.set_direct_block(0, block)?;
                dir.file_size = BLOCK_SIZE as u64;
                dir.update_modified_at();
                self.write_inode(dir)?;
                block
            }
        };
        self.write_block(block, &data)
    }
}
