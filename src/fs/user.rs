use bincode::{Decode, Encode};

use crate::utils::{
    digest::{self, HASH_LEN, SALT_LEN},
    fixed_str,
    traits::FixedSizeRecord,
};

use super::{Credential, CREDENTIAL_RECORD_SIZE};

/// a user account, persisted in the user table block
#[derive(Encode, Decode, Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub uid: u32,
    username: [u8; 64],
    salt: [u8; SALT_LEN],
    password_hash: [u8; HASH_LEN],
    full_name: [u8; 128],
    home_directory: [u8; 128],
    pub gid: u32,
}

impl FixedSizeRecord for User {
    const SIZE: usize = CREDENTIAL_RECORD_SIZE as usize;
}

impl Credential for User {
    fn id(&self) -> u32 {
        self.uid
    }

    fn name(&self) -> String {
        self.username()
    }
}

impl User {
    pub fn new(
        uid: u32,
        username: &str,
        password: &str,
        full_name: &str,
        home_directory: &str,
        gid: u32,
    ) -> Self {
        let salt = digest::generate_salt();
        User {
            uid,
            username: fixed_str::encode(username),
            salt,
            password_hash: digest::hash_password(&salt, password),
            full_name: fixed_str::encode(full_name),
            home_directory: fixed_str::encode(home_directory),
            gid,
        }
    }

    pub fn username(&self) -> String {
        fixed_str::decode(&self.username)
    }

    pub fn full_name(&self) -> String {
        fixed_str::decode(&self.full_name)
    }

    pub fn home_directory(&self) -> String {
        fixed_str::decode(&self.home_directory)
    }

    pub fn set_full_name(&mut self, full_name: &str) {
        self.full_name = fixed_str::encode(full_name);
    }

    /// verify a password against the stored salted hash
    pub fn check_password(&self, password: &str) -> bool {
        digest::verify_password(&self.salt, &self.password_hash, password)
    }

    /// replace the password, a new salt is drawn every time
    pub fn set_password(&mut self, password: &str) {
        self.salt = digest::generate_salt();
        self.password_hash = digest::hash_password(&self.salt, password);
    }
}
