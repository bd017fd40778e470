//! open an existing image, keep its credential tables on disk, and release it
use log::{debug, info, warn};
use memmap2::MmapMut;
use std::{fs::OpenOptions, path::Path};

use crate::{
    error::{FsError, Result},
    fs::*,
    utils::{time_util, traits::FixedSizeRecord},
};

impl FileSystem {
    /// mount the volume stored in `image_file_path`
    /// # Return
    /// the mounted [FileSystem], or an integrity error if the image is not ours;
    /// nothing besides block 0 is read before the superblock is validated
    pub fn mount<P>(image_file_path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let image_file_path = image_file_path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(image_file_path)?;
        let image_len = file.metadata()?.len();
        if image_len < BLOCK_SIZE as u64 {
            return Err(FsError::Integrity(format!(
                "{} is too short to hold a superblock",
                image_file_path.display()
            )));
        }
        // Safety
        // the image is private to this handle for as long as it is mounted,
        // nothing else truncates it under the mapping
        let image_mmap = unsafe { MmapMut::map_mut(&file)? };

        let mut superblock = SuperBlock::from_bytes(&image_mmap[..BLOCK_SIZE as usize])
            .map_err(|e| FsError::Integrity(format!("unreadable superblock: {e}")))?;
        if !superblock.is_valid() {
            return Err(FsError::Integrity(format!(
                "bad magic number {:#010x} in {}",
                superblock.magic,
                image_file_path.display()
            )));
        }
        superblock.check_geometry(image_len)?;
        superblock.update_last_mounted_at();

        let mut fs = FileSystem {
            image_path: image_file_path.to_path_buf(),
            image_file: file,
            image_mmap,
            inode_bitmap: Bitmap::new(superblock.total_inodes as usize),
            data_bitmap: Bitmap::new(superblock.data_blocks() as usize),
            superblock,
            users: Registry::new(),
            groups: Registry::new(),
        };
        fs.write_superblock()?;

        fs.inode_bitmap =
            fs.read_bitmap_region(fs.superblock.inode_bitmap_start, fs.superblock.total_inodes)?;
        fs.data_bitmap =
            fs.read_bitmap_region(fs.superblock.data_bitmap_start, fs.superblock.data_blocks())?;
        fs.check_free_counters();
        fs.load_credentials()?;

        info!(
            "mounted {} ({}, {} users, {} groups, last mounted {})",
            image_file_path.display(),
            fs.superblock.fs_name(),
            fs.users.len(),
            fs.groups.len(),
            time_util::display(fs.superblock.last_mounted_at)
        );
        Ok(fs)
    }

    /// persist the credential tables and flush everything to the image
    pub fn sync(&mut self) -> Result<()> {
        self.save_credentials()?;
        self.image_mmap.flush()?;
        self.image_file.sync_all()?;
        debug!("synced {}", self.image_path.display());
        Ok(())
    }

    /// persist the credential tables, flush, and release the image
    ///
    /// the image is closed even if persisting or flushing fails
    pub fn unmount(mut self) -> Result<()> {
        let result = self.sync();
        let image_path = std::mem::take(&mut self.image_path);
        drop(self);
        match &result {
            Ok(()) => info!("unmounted {}", image_path.display()),
            Err(e) => warn!("unmounting {} failed: {e}", image_path.display()),
        }
        result
    }

    /// write both tables to their reserved data blocks
    pub(crate) fn save_credentials(&mut self) -> Result<()> {
        self.reserve_credential_blocks()?;
        let users = self.users.to_block()?;
        let groups = self.groups.to_block()?;
        self.write_block(self.user_table_block(), &users)?;
        self.write_block(self.group_table_block(), &groups)?;
        debug!(
            "saved {} users and {} groups",
            self.users.len(),
            self.groups.len()
        );
        Ok(())
    }

    // the table blocks are allocated once; later saves find them taken already
    fn reserve_credential_blocks(&mut self) -> Result<()> {
        let mut changed = false;
        for relative in [USER_TABLE_BLOCK, GROUP_TABLE_BLOCK] {
            let index = relative as usize;
            if index >= self.data_bitmap.size() {
                return Err(FsError::Capacity(
                    "the data region cannot hold the credential tables".to_string(),
                ));
            }
            if !self.data_bitmap.is_allocated(index) {
                self.data_bitmap.allocate(index);
                self.superblock.free_blocks = self.superblock.free_blocks.saturating_sub(1);
                changed = true;
            }
        }
        if changed {
            self.write_superblock()?;
            self.write_data_bitmap()?;
        }
        Ok(())
    }

    fn load_credentials(&mut self) -> Result<()> {
        self.users = Registry::from_block(&self.read_block(self.user_table_block())?)?;
        self.groups = Registry::from_block(&self.read_block(self.group_table_block())?)?;
        if self.users.is_empty() {
            warn!("{} has no users", self.image_path.display());
        }
        Ok(())
    }

    // a crash between a bitmap write and a superblock write leaves these apart;
    // report it, the bitmap is what allocation trusts
    fn check_free_counters(&self) {
        let free_inodes = self.inode_bitmap.count_free();
        if free_inodes != self.superblock.free_inodes as usize {
            warn!(
                "superblock counts {} free inodes, the bitmap {free_inodes}",
                self.superblock.free_inodes
            );
        }
        let free_blocks = self.data_bitmap.count_free();
        if free_blocks != self.superblock.free_blocks as usize {
            warn!(
                "superblock counts {} free blocks, the bitmap {free_blocks}",
                self.superblock.free_blocks
            );
        }
    }
}
