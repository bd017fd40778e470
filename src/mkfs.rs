//! create our filesystem
use crate::{
    error::{FsError, Result},
    fs::*,
    utils::fs_size_calculator::{Layout, MAX_SIZE_MB},
};
use byte_unit::Byte;
use log::{info, warn};
use memmap2::MmapMut;
use std::{fs::OpenOptions, path::Path};

/// the root directory, its home directory and the two credential tables
const RESERVED_DATA_BLOCKS: u32 = 4;

impl FileSystem {
    /// create a new filesystem and return it mounted
    /// # Params
    /// - `image_file_path`: the path of the image file, replaced if it exists
    /// - `size_mb`: the size of the volume in MiB
    /// - `allocation_strategy`: tag recorded in the superblock
    /// - `root_password`: password of the initial `root` user
    ///
    /// # Return
    /// a [FileSystem] holding `/` (inode 0), `/root` (inode 1),
    /// the `root` user and the `root` group
    pub fn format<P>(
        image_file_path: P,
        size_mb: u32,
        allocation_strategy: AllocationStrategy,
        root_password: &str,
    ) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        if root_password.trim().is_empty() {
            return Err(FsError::Validation(
                "root password must not be empty".to_string(),
            ));
        }
        if size_mb > MAX_SIZE_MB {
            return Err(FsError::Validation(format!(
                "{size_mb} MiB is too large, a volume holds at most {MAX_SIZE_MB} MiB"
            )));
        }
        let layout = Layout::compute(size_mb)
            .filter(|l| l.data_blocks >= RESERVED_DATA_BLOCKS && l.total_inodes >= 2)
            .ok_or_else(|| {
                FsError::Validation(format!("{size_mb} MiB is too small for a volume"))
            })?;

        info!(
            "formatting {} ({}, {allocation_strategy})",
            image_file_path.as_ref().display(),
            Byte::from_bytes(layout.total_bytes as _).get_appropriate_unit(true)
        );
        info!(
            "{} blocks, {} inodes, inode bitmap {} blocks, data bitmap {} blocks, inode table {} blocks, {} data blocks",
            layout.total_blocks,
            layout.total_inodes,
            layout.inode_bitmap_blocks,
            layout.data_bitmap_blocks,
            layout.inode_table_blocks,
            layout.data_blocks
        );

        let image_file_path = image_file_path.as_ref();
        if image_file_path.exists() {
            warn!("{} already exists and will be overwritten", image_file_path.display());
        }
        // open image file and prepare to write fs components
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(image_file_path)?;
        // every region starts zeroed
        file.set_len(layout.total_bytes)?;
        // Safety
        // the image is private to this handle for as long as it is mounted,
        // nothing else truncates it under the mapping
        let image_mmap = unsafe { MmapMut::map_mut(&file)? };

        let mut superblock = SuperBlock::new(&layout, allocation_strategy);
        superblock.free_blocks = layout.data_blocks - 2;
        superblock.free_inodes = layout.total_inodes - 2;

        let mut fs = FileSystem {
            image_path: image_file_path.to_path_buf(),
            image_file: file,
            image_mmap,
            superblock,
            inode_bitmap: Bitmap::all_free(layout.total_inodes as usize),
            data_bitmap: Bitmap::all_free(layout.data_blocks as usize),
            users: Registry::new(),
            groups: Registry::new(),
        };
        fs.write_superblock()?;

        fs.inode_bitmap.allocate(ROOT_INODE as usize);
        fs.inode_bitmap.allocate(ROOT_HOME_INODE as usize);
        fs.write_inode_bitmap()?;

        fs.data_bitmap.allocate(0);
        fs.data_bitmap.allocate(1);
        fs.write_data_bitmap()?;

        fs.create_root_directories()?;
        fs.create_root_credentials(root_password)?;
        fs.sync()?;

        info!("formatted {}, root home is /root", image_file_path.display());
        Ok(fs)
    }

    /// `/` on relative data block 0 and `/root` on relative data block 1
    fn create_root_directories(&mut self) -> Result<()> {
        let data_start = self.superblock.data_blocks_start;

        let mut root = Inode::new(
            ROOT_INODE,
            FileKind::Directory,
            DEFAULT_DIR_PERMS,
            ROOT_UID,
            ROOT_GID,
            "/",
        );
        root.file_size = BLOCK_SIZE as u64;
        // ".", ".." and "root"
        root.link_count = 3;
        root.set_direct_block(0, data_start)?;
        self.write_inode(&root)?;
        self.write_directory_entries(
            &mut root,
            &[
                DirectoryEntry::new(ROOT_INODE, FileKind::Directory, "."),
                DirectoryEntry::new(ROOT_INODE, FileKind::Directory, ".."),
                DirectoryEntry::new(ROOT_HOME_INODE, FileKind::Directory, "root"),
            ],
        )?;

        let mut home = Inode::new(
            ROOT_HOME_INODE,
            FileKind::Directory,
            DEFAULT_DIR_PERMS,
            ROOT_UID,
            ROOT_GID,
            "root",
        );
        home.file_size = BLOCK_SIZE as u64;
        home.link_count = 2;
        home.set_direct_block(0, data_start + 1)?;
        self.write_inode(&home)?;
        self.write_directory_entries(
            &mut home,
            &[
                DirectoryEntry::new(ROOT_HOME_INODE, FileKind::Directory, "."),
                DirectoryEntry::new(ROOT_INODE, FileKind::Directory, ".."),
            ],
        )
    }

    fn create_root_credentials(&mut self, root_password: &str) -> Result<()> {
        self.users.insert(User::new(
            ROOT_UID,
            "root",
            root_password,
            "Root Admin",
            "/root",
            ROOT_GID,
        ))?;
        let mut root_group = Group::new(ROOT_GID, "root");
        root_group.add_member(ROOT_UID);
        self.groups.insert(root_group)
    }
}
