use clap::Parser;

use crate::fs::AllocationStrategy;

#[derive(Parser, Debug, PartialEq)]
#[command(author, version, about, long_about)]
pub enum MyFsCli {
    /// create a new file system
    Format(FormatArgs),
    /// print the geometry and usage of a file system
    Info(ImageArgs),
    /// add a user with a home directory under /home
    Useradd(UseraddArgs),
    /// add a group
    Groupadd(GroupaddArgs),
    /// change the password of a user
    Passwd(PasswdArgs),
    /// open an interactive administrative shell
    Shell(ImageArgs),
}

/// make a new fs subcommand
#[derive(clap::Args, Debug, PartialEq)]
#[command(author, version, about = "make a new file system")]
pub struct FormatArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long)]
    pub image_file_path: String,
    /// the size of the file system in MiB
    #[clap(short, long)]
    pub size: u32,
    /// the allocation strategy recorded in the superblock
    #[clap(short = 'a', long, value_enum, default_value_t = AllocationStrategy::Indexed)]
    pub strategy: AllocationStrategy,
}

/// subcommands that only need the image
#[derive(clap::Args, Debug, PartialEq)]
pub struct ImageArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long)]
    pub image_file_path: String,
}

#[derive(clap::Args, Debug, PartialEq)]
#[command(about = "add a user, as root")]
pub struct UseraddArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long)]
    pub image_file_path: String,
    /// the login name of the new user
    pub username: String,
    /// the full name of the new user
    #[clap(short, long, default_value = "")]
    pub full_name: String,
}

#[derive(clap::Args, Debug, PartialEq)]
#[command(about = "add a group, as root")]
pub struct GroupaddArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long)]
    pub image_file_path: String,
    /// the name of the new group
    pub group_name: String,
}

#[derive(clap::Args, Debug, PartialEq)]
#[command(about = "change a password, as root or as the user")]
pub struct PasswdArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long)]
    pub image_file_path: String,
    /// the user whose password changes
    pub username: String,
    /// who logs in to authorize the change, root by default
    #[clap(short = 'u', long = "as", default_value = "root")]
    pub as_user: String,
}
