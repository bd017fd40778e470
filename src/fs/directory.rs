use bincode::{Decode, Encode};

use crate::utils::{fixed_str, traits::FixedSizeRecord};

use super::{FileKind, DIR_ENTRY_SIZE, NONE};

pub const MAX_NAME_LEN: usize = 55;

/// one slot of a directory block
#[derive(Encode, Decode, Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub inode_number: u32,
    pub entry_type: FileKind,
    name_len: u8,
    name: [u8; MAX_NAME_LEN],
}

impl FixedSizeRecord for DirectoryEntry {
    const SIZE: usize = DIR_ENTRY_SIZE as usize;
}

impl Default for DirectoryEntry {
    fn default() -> Self {
        Self::free()
    }
}

impl DirectoryEntry {
    pub fn new(inode_number: u32, entry_type: FileKind, name: &str) -> Self {
        DirectoryEntry {
            inode_number,
            entry_type,
            name_len: fixed_str::encoded_len::<MAX_NAME_LEN>(name) as u8,
            name: fixed_str::encode(name),
        }
    }

    /// an unused slot
    pub fn free() -> Self {
        DirectoryEntry {
            inode_number: NONE,
            entry_type: FileKind::Unknown,
            name_len: 0,
            name: [0u8; MAX_NAME_LEN],
        }
    }

    pub fn is_free(&self) -> bool {
        self.inode_number == NONE
    }

    pub fn name(&self) -> String {
        // a length beyond the field means the slot is damaged, fall back to the padding
        let len = (self.name_len as usize).min(MAX_NAME_LEN);
        fixed_str::decode(&self.name[..len])
    }

    pub fn name_len(&self) -> usize {
        self.name_len as usize
    }
}

/// find the entry called `name` among the used slots
pub fn lookup<'a>(entries: &'a [DirectoryEntry], name: &str) -> Option<&'a DirectoryEntry> {
    entries.iter().find(|e| !e.is_free() && e.name() == name)
}

/// put `entry` in the first free slot
/// # Return
/// `false` if every slot is taken
pub fn insert_entry(entries: &mut [DirectoryEntry], entry: DirectoryEntry) -> bool {
    match entries.iter_mut().find(|e| e.is_free()) {
        Some(slot) => {
            *slot = entry;
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_entry_serialization_and_deserialization() -> anyhow::Result<()> {
        let original = DirectoryEntry::new(42, FileKind::RegularFile, "hello.txt");
        let bytes = original.to_bytes()?;
        assert_eq!(bytes.len(), DIR_ENTRY_SIZE as usize);
        let restored = DirectoryEntry::from_bytes(&bytes)?;
        assert_eq!(restored, original);
        assert_eq!(restored.inode_number, 42);
        assert_eq!(restored.entry_type, FileKind::RegularFile);
        assert_eq!(restored.name_len(), 9);
        assert_eq!(restored.name(), "hello.txt");
        assert!(!restored.is_free());
        Ok(())
    }

    #[test]
    fn test_free_slot_round_trip() -> anyhow::Result<()> {
        let restored = DirectoryEntry::from_bytes(&DirectoryEntry::free().to_bytes()?)?;
        assert!(restored.is_free());
        assert_eq!(restored, DirectoryEntry::free());
        Ok(())
    }

    #[test]
    fn test_damaged_length_does_not_leak_into_name() -> anyhow::Result<()> {
        let mut bytes = DirectoryEntry::new(7, FileKind::Directory, "docs").to_bytes()?;
        // name_len sits right after the inode number and the kind tag
        bytes[8] = 0xff;
        let restored = DirectoryEntry::from_bytes(&bytes)?;
        assert_eq!(restored.name(), "docs");
        Ok(())
    }

    #[test]
    fn test_lookup_and_insert() {
        let mut entries = vec![DirectoryEntry::free(); 3];
        assert!(insert_entry(
            &mut entries,
            DirectoryEntry::new(0, FileKind::Directory, ".")
        ));
        assert!(insert_entry(
            &mut entries,
            DirectoryEntry::new(5, FileKind::Directory, "home")
        ));
        assert_eq!(lookup(&entries, "home").map(|e| e.inode_number), Some(5));
        assert!(lookup(&entries, "missing").is_none());
        assert!(insert_entry(
            &mut entries,
            DirectoryEntry::new(6, FileKind::RegularFile, "x")
        ));
        assert!(!insert_entry(
            &mut entries,
            DirectoryEntry::new(7, FileKind::RegularFile, "y")
        ));
    }
}
