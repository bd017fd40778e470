use bincode::{Decode, Encode};

use crate::{
    error::{FsError, Result},
    utils::{fixed_str, time_util, traits::FixedSizeRecord},
};

use super::{filekind::FileKind, DIRECT_POINTERS, INODE_SIZE, NONE};

const INODE_NAME_LEN: usize = 64;

#[derive(Encode, Decode, Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    pub inode_number: u32,
    pub file_kind: FileKind,
    pub permissions: u16,
    pub owner_uid: u32,
    pub owner_gid: u32,
    pub file_size: u64,
    pub link_count: u32,
    pub created_at: u64,
    pub modified_at: u64,
    pub accessed_at: u64,
    /// absolute block numbers, [NONE] when unused
    direct_blocks: [u32; DIRECT_POINTERS],
    /// copy of the name given at creation, the parent's entry is authoritative
    name: [u8; INODE_NAME_LEN],
}

impl FixedSizeRecord for Inode {
    const SIZE: usize = INODE_SIZE as usize;
}

impl Inode {
    pub fn new(
        inode_number: u32,
        file_kind: FileKind,
        permissions: u16,
        owner_uid: u32,
        owner_gid: u32,
        name: &str,
    ) -> Self {
        let now = time_util::now();
        Inode {
            inode_number,
            file_kind,
            permissions,
            owner_uid,
            owner_gid,
            file_size: 0,
            link_count: 1,
            created_at: now,
            modified_at: now,
            accessed_at: now,
            direct_blocks: [NONE; DIRECT_POINTERS],
            name: fixed_str::encode(name),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.file_kind == FileKind::Directory
    }

    pub fn is_regular_file(&self) -> bool {
        self.file_kind == FileKind::RegularFile
    }

    /// the name this inode was created with
    pub fn name(&self) -> String {
        fixed_str::decode(&self.name)
    }

    pub fn update_modified_at(&mut self) {
        self.modified_at = time_util::now();
    }
}

/// This block is about block pointers
impl Inode {
    /// the only block an object ever maps
    pub fn first_block(&self) -> Option<u32> {
        self.direct_block(0)
    }

    pub fn direct_block(&self, index: usize) -> Option<u32> {
        self.direct_blocks
            .get(index)
            .copied()
            .filter(|block| *block != NONE)
    }

    pub fn direct_blocks(&self) -> Vec<u32> {
        self.direct_blocks
            .iter()
            .copied()
            .filter(|block| *block != NONE)
            .collect()
    }

    pub fn set_direct_block(&mut self, index: usize, block: u32) -> Result<()> {
        let slot = self.direct_blocks.get_mut(index).ok_or_else(|| {
            FsError::Validation(format!("direct pointer {index} out of {DIRECT_POINTERS}"))
        })?;
        *slot = block;
        Ok(())
    }

    /// forget every block pointer and return the blocks that were mapped
    pub fn clear_blocks(&mut self) -> Vec<u32> {
        let blocks = self.direct_blocks();
        self.direct_blocks = [NONE; DIRECT_POINTERS];
        self.file_size = 0;
        self.update_modified_at();
        blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inode_round_trip() -> anyhow::Result<()> {
        let mut inode = Inode::new(42, FileKind::Directory, 0o755, 1000, 100, "documents");
        inode.file_size = 4096;
        inode.link_count = 2;
        inode.set_direct_block(0, 1234)?;

        let bytes = inode.to_bytes()?;
        assert_eq!(bytes.len(), INODE_SIZE as usize);
        let restored = Inode::from_bytes(&bytes)?;
        assert_eq!(restored, inode);
        assert_eq!(restored.name(), "documents");
        assert_eq!(restored.first_block(), Some(1234));
        assert_eq!(restored.direct_block(1), None);
        assert!(restored.is_dir());
        Ok(())
    }

    #[test]
    fn test_zeroed_slot_decodes() -> anyhow::Result<()> {
        let inode = Inode::from_bytes(&[0u8; INODE_SIZE as usize])?;
        assert_eq!(inode.file_kind, FileKind::Unknown);
        assert_eq!(inode.name(), "");
        Ok(())
    }

    #[test]
    fn test_direct_pointer_bounds() {
        let mut inode = Inode::new(3, FileKind::RegularFile, 0o644, 0, 0, "a");
        assert!(inode.set_direct_block(DIRECT_POINTERS, 7).is_err());
        inode.set_direct_block(0, 7).unwrap();
        assert_eq!(inode.clear_blocks(), vec![7]);
        assert_eq!(inode.first_block(), None);
    }
}
