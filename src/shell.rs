//! administrative session over a volume: who is logged in, where they are,
//! and the user/group management built from the [FileSystem] primitives
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::{
    error::{FsError, Result},
    fs::*,
};

const GUEST_PROMPT: &str = "guest@myFS$ ";

#[derive(Debug)]
pub struct Session {
    image_path: PathBuf,
    fs: Option<FileSystem>,
    /// uid of the logged in user
    current_user: Option<u32>,
    current_dir: String,
    running: bool,
}

impl Session {
    pub fn new<P: AsRef<Path>>(image_path: P) -> Self {
        Session {
            image_path: image_path.as_ref().to_path_buf(),
            fs: None,
            current_user: None,
            current_dir: "/".to_string(),
            running: true,
        }
    }

    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    pub fn is_mounted(&self) -> bool {
        self.fs.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn filesystem(&self) -> Result<&FileSystem> {
        self.fs.as_ref().ok_or(FsError::NotMounted)
    }

    fn filesystem_mut(&mut self) -> Result<&mut FileSystem> {
        self.fs.as_mut().ok_or(FsError::NotMounted)
    }

    fn is_root(&self) -> bool {
        self.current_user == Some(ROOT_UID)
    }

    fn require_root(&self, action: &str) -> Result<()> {
        self.filesystem()?;
        if self.is_root() {
            Ok(())
        } else {
            Err(FsError::PermissionDenied(format!("only root can {action}")))
        }
    }

    fn log_out(&mut self) {
        self.current_user = None;
        self.current_dir = "/".to_string();
    }

    /// format the image with the indexed strategy and log in as root
    pub fn format(&mut self, size_mb: u32, password: &str, confirmation: &str) -> Result<()> {
        check_new_password(password, confirmation)?;
        self.unmount()?;
        let fs = FileSystem::format(
            &self.image_path,
            size_mb,
            AllocationStrategy::Indexed,
            password,
        )?;
        self.fs = Some(fs);
        self.current_user = Some(ROOT_UID);
        self.current_dir = "/root".to_string();
        Ok(())
    }

    /// mount the image, nobody is logged in afterwards
    pub fn mount(&mut self) -> Result<()> {
        self.unmount()?;
        self.fs = Some(FileSystem::mount(&self.image_path)?);
        Ok(())
    }

    /// unmount the image if one is mounted
    pub fn unmount(&mut self) -> Result<()> {
        self.log_out();
        match self.fs.take() {
            Some(fs) => fs.unmount(),
            None => Ok(()),
        }
    }

    pub fn shutdown(&mut self) -> Result<()> {
        self.running = false;
        self.unmount()
    }

    /// create a user with a home directory under `/home`
    /// # Return
    /// the uid of the new user
    pub fn add_user(
        &mut self,
        username: &str,
        full_name: &str,
        password: &str,
        confirmation: &str,
    ) -> Result<u32> {
        self.require_root("create users")?;
        check_name(username)?;
        let fs = self.filesystem_mut()?;
        if fs.users().contains_name(username) {
            return Err(FsError::AlreadyExists(format!("user '{username}'")));
        }
        if fs.users().len() >= fs.users().capacity() {
            return Err(FsError::Capacity(format!(
                "the user table holds at most {} users",
                fs.users().capacity()
            )));
        }
        check_new_password(password, confirmation)?;

        let uid = fs.users().next_id();
        let home_directory = format!("/home/{username}");
        let home = ensure_home(fs)?;
        make_directory(fs, home, username, uid, USERS_GID)?;
        fs.users_mut().insert(User::new(
            uid,
            username,
            password,
            full_name,
            &home_directory,
            USERS_GID,
        ))?;
        fs.sync()?;
        info!("created user '{username}' (uid {uid}), home {home_directory}");
        Ok(uid)
    }

    /// # Return
    /// the gid of the new group
    pub fn add_group(&mut self, name: &str) -> Result<u32> {
        self.require_root("create groups")?;
        check_name(name)?;
        let fs = self.filesystem_mut()?;
        if fs.groups().contains_name(name) {
            return Err(FsError::AlreadyExists(format!("group '{name}'")));
        }
        let gid = fs.groups().next_id();
        fs.groups_mut().insert(Group::new(gid, name))?;
        fs.sync()?;
        info!("created group '{name}' (gid {gid})");
        Ok(gid)
    }

    /// root may change any password, everyone else only their own
    pub fn change_password(
        &mut self,
        username: &str,
        password: &str,
        confirmation: &str,
    ) -> Result<()> {
        let current = self.whoami()?.map(|u| u.username());
        if !self.is_root() && current.as_deref() != Some(username) {
            return Err(FsError::PermissionDenied(format!(
                "cannot change the password of '{username}'"
            )));
        }
        let fs = self.filesystem_mut()?;
        let uid = fs
            .users()
            .get_by_name(username)
            .map(|u| u.uid)
            .ok_or_else(|| FsError::NotFound(format!("user '{username}'")))?;
        check_new_password(password, confirmation)?;
        fs.users_mut().modify(uid, |u| u.set_password(password))?;
        fs.sync()?;
        info!("changed the password of '{username}'");
        Ok(())
    }

    /// log in as `username` and move to their home directory
    pub fn switch_user(&mut self, username: &str, password: &str) -> Result<()> {
        let fs = self.filesystem()?;
        let user = fs
            .users()
            .get_by_name(username)
            .ok_or_else(|| FsError::NotFound(format!("user '{username}'")))?;
        if !user.check_password(password) {
            warn!("failed login as '{username}'");
            return Err(FsError::Authentication(username.to_string()));
        }
        let (uid, home) = (user.uid, user.home_directory());
        self.current_user = Some(uid);
        self.current_dir = home;
        Ok(())
    }

    /// the logged in user, `None` for a guest
    pub fn whoami(&self) -> Result<Option<&User>> {
        let fs = self.filesystem()?;
        Ok(self.current_user.and_then(|uid| fs.users().get(uid)))
    }

    pub fn pwd(&self) -> &str {
        &self.current_dir
    }

    pub fn info(&self) -> Result<FsStats> {
        Ok(self.filesystem()?.stats())
    }

    pub fn prompt(&self) -> String {
        match self.whoami() {
            Ok(Some(user)) => format!("{}@myFS:{}$ ", user.username(), self.current_dir),
            _ => GUEST_PROMPT.to_string(),
        }
    }
}

fn check_new_password(password: &str, confirmation: &str) -> Result<()> {
    if password != confirmation {
        return Err(FsError::Validation("passwords do not match".to_string()));
    }
    if password.trim().is_empty() {
        return Err(FsError::Validation("password must not be empty".to_string()));
    }
    Ok(())
}

/// user, group and directory names share the directory entry limits
fn check_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name.len() > MAX_NAME_LEN
        || name == "."
        || name == ".."
        || name.contains(|c: char| c == '/' || c.is_whitespace() || c.is_control())
    {
        return Err(FsError::Validation(format!("invalid name '{name}'")));
    }
    Ok(())
}

/// inode of `/home`, created on first use
fn ensure_home(fs: &mut FileSystem) -> Result<u32> {
    let root = fs.read_inode(ROOT_INODE)?;
    let entries = fs.read_directory_entries(&root)?;
    match lookup(&entries, "home") {
        Some(entry) => Ok(entry.inode_number),
        None => {
            let home = make_directory(fs, ROOT_INODE, "home", ROOT_UID, ROOT_GID)?;
            info!("created /home");
            Ok(home)
        }
    }
}

/// create directory `name` inside directory `parent`
/// # Return
/// the inode number of the new directory
pub fn make_directory(
    fs: &mut FileSystem,
    parent: u32,
    name: &str,
    owner_uid: u32,
    owner_gid: u32,
) -> Result<u32> {
    check_name(name)?;
    let mut parent_inode = fs.read_inode(parent)?;
    let mut entries = fs.read_directory_entries(&parent_inode)?;
    if lookup(&entries, name).is_some() {
        return Err(FsError::AlreadyExists(format!("'{name}'")));
    }
    if !entries.is_empty() && !entries.iter().any(DirectoryEntry::is_free) {
        return Err(FsError::Capacity(format!("directory inode {parent} is full")));
    }

    let inode_number = fs.allocate_inode()?;
    let mut dir = Inode::new(
        inode_number,
        FileKind::Directory,
        DEFAULT_DIR_PERMS,
        owner_uid,
        owner_gid,
        name,
    );
    // "." and the entry in the parent
    dir.link_count = 2;
    fs.write_inode(&dir)?;
    fs.write_directory_entries(
        &mut dir,
        &[
            DirectoryEntry::new(inode_number, FileKind::Directory, "."),
            DirectoryEntry::new(parent, FileKind::Directory, ".."),
        ],
    )?;

    let entry = DirectoryEntry::new(inode_number, FileKind::Directory, name);
    if entries.is_empty() {
        entries.push(entry);
    } else {
        insert_entry(&mut entries, entry);
    }
    fs.write_directory_entries(&mut parent_inode, &entries)?;
    // the new ".." links back to the parent
    parent_inode.link_count += 1;
    parent_inode.update_modified_at();
    fs.write_inode(&parent_inode)?;
    Ok(inode_number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    fn formatted(dir: &TempDir) -> anyhow::Result<Session> {
        let mut session = Session::new(dir.path().join("fs.img"));
        session.format(16, "toor", "toor")?;
        Ok(session)
    }

    #[test]
    fn test_format_logs_in_as_root() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let session = formatted(&dir)?;
        assert!(session.is_mounted());
        assert_eq!(session.pwd(), "/root");
        assert_eq!(session.prompt(), "root@myFS:/root$ ");
        assert_eq!(session.whoami()?.map(|u| u.uid), Some(ROOT_UID));
        Ok(())
    }

    #[test]
    fn test_format_checks_confirmation() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let mut session = Session::new(dir.path().join("fs.img"));
        let err = session.format(16, "toor", "tor").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err = session.format(16, " ", " ").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(!session.is_mounted());
        Ok(())
    }

    #[test]
    fn test_operations_need_a_mount() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let mut session = Session::new(dir.path().join("fs.img"));
        assert_eq!(session.info().unwrap_err().kind(), ErrorKind::State);
        assert_eq!(session.whoami().unwrap_err().kind(), ErrorKind::State);
        assert_eq!(
            session.add_group("staff").unwrap_err().kind(),
            ErrorKind::State
        );
        assert_eq!(session.prompt(), GUEST_PROMPT);
        // unmounting nothing is fine
        session.unmount()?;
        Ok(())
    }

    #[test]
    fn test_add_user_builds_home() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let mut session = formatted(&dir)?;
        let free_inodes = session.info()?.free_inodes;
        let free_blocks = session.info()?.free_blocks;

        let uid = session.add_user("alice", "Alice A", "pw1", "pw1")?;
        assert_eq!(uid, 1);

        let fs = session.filesystem()?;
        // /home and /home/alice
        assert_eq!(fs.superblock().free_inodes, free_inodes - 2);
        assert_eq!(fs.superblock().free_blocks, free_blocks - 2);
        assert_eq!(fs.superblock().free_blocks as usize, fs.data_bitmap().count_free());

        let root = fs.read_inode(ROOT_INODE)?;
        assert_eq!(root.link_count, 4);
        let root_entries = fs.read_directory_entries(&root)?;
        let home_ino = lookup(&root_entries, "home").map(|e| e.inode_number).expect("/home");

        let home = fs.read_inode(home_ino)?;
        assert_eq!(home.link_count, 3);
        let home_entries = fs.read_directory_entries(&home)?;
        let alice_ino = lookup(&home_entries, "alice").map(|e| e.inode_number).expect("/home/alice");

        let alice_dir = fs.read_inode(alice_ino)?;
        assert_eq!(alice_dir.owner_uid, uid);
        assert_eq!(alice_dir.owner_gid, USERS_GID);
        let alice_entries = fs.read_directory_entries(&alice_dir)?;
        assert_eq!(lookup(&alice_entries, "..").map(|e| e.inode_number), Some(home_ino));

        let alice = fs.users().get(uid).expect("alice");
        assert_eq!(alice.home_directory(), "/home/alice");
        assert_eq!(alice.gid, USERS_GID);
        Ok(())
    }

    #[test]
    fn test_second_user_reuses_home() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let mut session = formatted(&dir)?;
        session.add_user("alice", "", "pw", "pw")?;
        let free_inodes = session.info()?.free_inodes;
        assert_eq!(session.add_user("bob", "", "pw", "pw")?, 2);
        assert_eq!(session.info()?.free_inodes, free_inodes - 1);

        let err = session.add_user("bob", "", "pw", "pw").unwrap_err();
        assert!(matches!(err, FsError::AlreadyExists(_)));
        let err = session.add_user("a/b", "", "pw", "pw").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        Ok(())
    }

    #[test]
    fn test_users_persist_across_remount() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let mut session = formatted(&dir)?;
        session.add_user("alice", "Alice", "pw1", "pw1")?;
        session.add_group("staff")?;
        session.unmount()?;
        assert!(!session.is_mounted());

        session.mount()?;
        assert_eq!(session.whoami()?, None);
        assert_eq!(session.prompt(), GUEST_PROMPT);
        session.switch_user("alice", "pw1")?;
        assert_eq!(session.pwd(), "/home/alice");
        assert_eq!(session.prompt(), "alice@myFS:/home/alice$ ");
        let stats = session.info()?;
        assert_eq!((stats.users, stats.groups), (2, 2));
        Ok(())
    }

    #[test]
    fn test_only_root_manages_accounts() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let mut session = formatted(&dir)?;
        session.add_user("alice", "", "pw1", "pw1")?;
        session.switch_user("alice", "pw1")?;

        let err = session.add_user("eve", "", "pw", "pw").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permission);
        let err = session.add_group("staff").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permission);
        let err = session.change_password("root", "x", "x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permission);

        session.change_password("alice", "pw2", "pw2")?;
        session.switch_user("alice", "pw2")?;
        Ok(())
    }

    #[test]
    fn test_switch_user_checks_password() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let mut session = formatted(&dir)?;
        let err = session.switch_user("root", "wrong").unwrap_err();
        assert!(matches!(err, FsError::Authentication(_)));
        let err = session.switch_user("nobody", "toor").unwrap_err();
        assert!(matches!(err, FsError::NotFound(_)));
        // still root
        assert_eq!(session.pwd(), "/root");
        Ok(())
    }

    #[test]
    fn test_root_changes_any_password() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let mut session = formatted(&dir)?;
        session.add_user("alice", "", "pw1", "pw1")?;
        session.change_password("alice", "fresh", "fresh")?;
        let err = session.change_password("alice", "a", "b").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        session.unmount()?;

        session.mount()?;
        assert!(session.switch_user("alice", "pw1").is_err());
        session.switch_user("alice", "fresh")?;
        Ok(())
    }

    #[test]
    fn test_user_table_capacity() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let mut session = formatted(&dir)?;
        for i in 1..CREDENTIALS_PER_BLOCK {
            session.add_user(&format!("user{i}"), "", "pw", "pw")?;
        }
        let free_inodes = session.info()?.free_inodes;
        let err = session.add_user("overflow", "", "pw", "pw").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Capacity);
        // nothing was allocated for the rejected user
        assert_eq!(session.info()?.free_inodes, free_inodes);
        Ok(())
    }

    #[test]
    fn test_shutdown_unmounts() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let mut session = formatted(&dir)?;
        session.shutdown()?;
        assert!(!session.is_running());
        assert!(!session.is_mounted());
        assert_eq!(session.pwd(), "/");
        Ok(())
    }
}
