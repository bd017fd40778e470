use bincode::{Decode, Encode};

use crate::utils::{fixed_str, traits::FixedSizeRecord};

use super::{Credential, CREDENTIAL_RECORD_SIZE, NONE};

pub const MAX_GROUP_MEMBERS: usize = 64;

/// a group and the uids belonging to it, persisted in the group table block
#[derive(Encode, Decode, Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub gid: u32,
    name: [u8; 64],
    /// member uids, [NONE] in unused slots
    members: [u32; MAX_GROUP_MEMBERS],
}

impl FixedSizeRecord for Group {
    const SIZE: usize = CREDENTIAL_RECORD_SIZE as usize;
}

impl Credential for Group {
    fn id(&self) -> u32 {
        self.gid
    }

    fn name(&self) -> String {
        self.group_name()
    }
}

impl Group {
    pub fn new(gid: u32, name: &str) -> Self {
        Group {
            gid,
            name: fixed_str::encode(name),
            members: [NONE; MAX_GROUP_MEMBERS],
        }
    }

    pub fn group_name(&self) -> String {
        fixed_str::decode(&self.name)
    }

    pub fn members(&self) -> Vec<u32> {
        self.members.iter().copied().filter(|m| *m != NONE).collect()
    }

    pub fn has_member(&self, uid: u32) -> bool {
        uid != NONE && self.members.contains(&uid)
    }

    /// add `uid` to the group
    /// # Return
    /// `false` if the member list is full
    pub fn add_member(&mut self, uid: u32) -> bool {
        if self.has_member(uid) {
            return true;
        }
        match self.members.iter_mut().find(|m| **m == NONE) {
            Some(slot) => {
                *slot = uid;
                true
            }
            None => false,
        }
    }

    pub fn remove_member(&mut self, uid: u32) {
        for m in self.members.iter_mut().filter(|m| **m == uid) {
            *m = NONE;
        }
    }
}
