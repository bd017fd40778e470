//! our custom filesystem
pub mod bitmap;
pub mod directory;
pub mod filekind;
pub mod fs_layout;
pub mod group;
pub mod inode;
pub mod registry;
pub mod superblock;
pub mod user;
pub use bitmap::*;
pub use directory::*;
pub use filekind::*;
pub use fs_layout::*;
pub use group::*;
pub use inode::*;
pub use registry::*;
pub use superblock::*;
pub use user::*;

pub const FS_MAGIC: u32 = 0x4D59_4653;
pub const FS_VERSION: u32 = 1;
pub const FS_NAME: &str = "myFS";
pub const BLOCK_SIZE: u32 = 4096;
/// one inode is provisioned for every 16 KiB of capacity
pub const BYTES_PER_INODE: u32 = 16 * 1024;
pub const INODE_SIZE: u32 = 256;
pub const DIRECT_POINTERS: usize = 12;
pub const DIR_ENTRY_SIZE: u32 = 64;
pub const ENTRIES_PER_BLOCK: usize = (BLOCK_SIZE / DIR_ENTRY_SIZE) as usize;
pub const CREDENTIAL_RECORD_SIZE: u32 = 512;
/// how many credential records fit after the 4 byte count prefix
pub const CREDENTIALS_PER_BLOCK: usize = ((BLOCK_SIZE - 4) / CREDENTIAL_RECORD_SIZE) as usize;

pub const ROOT_INODE: u32 = 0;
pub const ROOT_HOME_INODE: u32 = 1;
pub const ROOT_UID: u32 = 0;
pub const ROOT_GID: u32 = 0;
pub const USERS_GID: u32 = 1;
pub const DEFAULT_DIR_PERMS: u16 = 0o755;
pub const DEFAULT_FILE_PERMS: u16 = 0o644;

/// data blocks holding the user and group tables, relative to the data region
pub const USER_TABLE_BLOCK: u32 = 2;
pub const GROUP_TABLE_BLOCK: u32 = 3;

/// marks an unused direct pointer, a free directory slot or an empty credential slot
pub const NONE: u32 = u32::MAX;
