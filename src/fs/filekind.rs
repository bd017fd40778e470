use bincode::{Decode, Encode};
use clap::ValueEnum;

/// an enum to describe the type of a file
#[derive(Encode, Decode, Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum FileKind {
    /// a free slot, or an inode that was never written
    #[default]
    Unknown,
    /// an regular file
    RegularFile,
    /// a directory
    Directory,
}

/// block mapping strategy recorded in the superblock
///
/// only the tag is stored: every object still maps through its first direct block
#[derive(Encode, Decode, Debug, Default, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum AllocationStrategy {
    Contiguous,
    Linked,
    #[default]
    Indexed,
}

impl std::fmt::Display for AllocationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AllocationStrategy::Contiguous => "contiguous allocation",
            AllocationStrategy::Linked => "linked allocation",
            AllocationStrategy::Indexed => "indexed allocation",
        };
        f.write_str(name)
    }
}
