use std::io::{self, Write};

use byte_unit::Byte;
use clap::Parser;
use myfs::{
    cli_interface::{FormatArgs, MyFsCli},
    shell::Session,
    utils::time_util,
    FileSystem, FsStats,
};

/// a CLI interface to create a filesystem image and administer its accounts,
/// either one subcommand at a time or from an interactive shell.
fn main() -> anyhow::Result<()> {
    env_logger::builder().format_timestamp_nanos().init();
    let args = MyFsCli::parse();
    match args {
        MyFsCli::Format(FormatArgs {
            image_file_path,
            size,
            strategy,
        }) => {
            let password = prompt_new_password("root")?;
            let fs = FileSystem::format(&image_file_path, size, strategy, &password)?;
            print_info(&image_file_path, &fs.stats());
            fs.unmount()?;
        }
        MyFsCli::Info(args) => {
            let fs = FileSystem::mount(&args.image_file_path)?;
            print_info(&args.image_file_path, &fs.stats());
            fs.unmount()?;
        }
        MyFsCli::Useradd(args) => {
            let mut session = login(&args.image_file_path, "root")?;
            let password = prompt_new_password(&args.username)?;
            let uid = session.add_user(&args.username, &args.full_name, &password, &password)?;
            println!("created user '{}' with uid {uid}", args.username);
            session.unmount()?;
        }
        MyFsCli::Groupadd(args) => {
            let mut session = login(&args.image_file_path, "root")?;
            let gid = session.add_group(&args.group_name)?;
            println!("created group '{}' with gid {gid}", args.group_name);
            session.unmount()?;
        }
        MyFsCli::Passwd(args) => {
            let mut session = login(&args.image_file_path, &args.as_user)?;
            let password = prompt_new_password(&args.username)?;
            session.change_password(&args.username, &password, &password)?;
            println!("update user password successfully.");
            session.unmount()?;
        }
        MyFsCli::Shell(args) => run_shell(Session::new(&args.image_file_path))?,
    }
    Ok(())
}

/// ask twice, refuse a mismatch
fn prompt_new_password(username: &str) -> anyhow::Result<String> {
    let password = rpassword::prompt_password(format!("New password for {username}: "))?;
    let confirmation = rpassword::prompt_password("Retype the new password: ")?;
    if password != confirmation {
        anyhow::bail!("passwords do not match");
    }
    Ok(password)
}

/// mount the image and log in as `username`
fn login(image_file_path: &str, username: &str) -> anyhow::Result<Session> {
    let mut session = Session::new(image_file_path);
    session.mount()?;
    let password = rpassword::prompt_password(format!("Password for {username}: "))?;
    session.switch_user(username, &password)?;
    Ok(session)
}

fn print_info(image_file_path: &str, stats: &FsStats) {
    let size = |bytes: u64| Byte::from_bytes(bytes as _).get_appropriate_unit(true);
    println!("name:            {} v{}", stats.fs_name, stats.version);
    println!("image:           {image_file_path}");
    println!("total size:      {}", size(stats.total_bytes));
    println!("used:            {}", size(stats.used_bytes));
    println!("available:       {}", size(stats.free_bytes));
    println!("block size:      {} bytes", stats.block_size);
    println!(
        "blocks:          {} total, {} free, {} used",
        stats.total_blocks, stats.free_blocks, stats.used_blocks
    );
    println!(
        "inodes:          {} total, {} free, {} used",
        stats.total_inodes, stats.free_inodes, stats.used_inodes
    );
    println!("allocation:      {}", stats.allocation_strategy);
    println!("users / groups:  {} / {}", stats.users, stats.groups);
    println!("created:         {}", time_util::display(stats.created_at));
    println!("last mounted:    {}", time_util::display(stats.last_mounted_at));
}

const SHELL_HELP: &str = "\
commands:
  format <size-MiB>     format the image and log in as root
  mount                 mount the image
  unmount               unmount the image
  useradd <name>        create a user (root)
  groupadd <name>       create a group (root)
  passwd [name]         change a password (root, or your own)
  su <name>             log in as another user
  whoami                show the current user
  pwd                   show the current directory
  infofs                show the geometry and usage of the image
  help                  show this help
  exit                  unmount and leave";

fn run_shell(mut session: Session) -> anyhow::Result<()> {
    println!("myfs shell on {}, type `help` for commands", session.image_path().display());
    if session.image_path().exists() {
        match session.mount() {
            Ok(()) => println!("mounted, log in with `su <user>`"),
            Err(e) => eprintln!("could not mount: {e}"),
        }
    }

    while session.is_running() {
        print!("{}", session.prompt());
        io::stdout().flush()?;
        let mut line = String::new();
        // end of input
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&command, rest)) = words.split_first() else {
            continue;
        };
        if let Err(e) = run_command(&mut session, command, rest) {
            eprintln!("{command}: {e}");
        }
    }
    session.shutdown()?;
    Ok(())
}

fn run_command(session: &mut Session, command: &str, args: &[&str]) -> anyhow::Result<()> {
    match (command, args) {
        ("format", [size]) => {
            let size: u32 = size.parse()?;
            let password = rpassword::prompt_password("Password for root: ")?;
            let confirmation = rpassword::prompt_password("Retype the password: ")?;
            session.format(size, &password, &confirmation)?;
            println!("formatted, logged in as root in {}", session.pwd());
        }
        ("mount", []) => {
            session.mount()?;
            println!("mounted, log in with `su <user>`");
        }
        ("unmount", []) => session.unmount()?,
        ("useradd", [name]) => {
            session.filesystem()?;
            let full_name = prompt_line("Full name: ")?;
            let password = rpassword::prompt_password(format!("Password for {name}: "))?;
            let confirmation = rpassword::prompt_password("Retype the password: ")?;
            let uid = session.add_user(name, &full_name, &password, &confirmation)?;
            println!("created user '{name}' with uid {uid}, home /home/{name}");
        }
        ("groupadd", [name]) => {
            let gid = session.add_group(name)?;
            println!("created group '{name}' with gid {gid}");
        }
        ("passwd", [name]) => change_password(session, name)?,
        ("passwd", []) => {
            let name = match session.whoami()? {
                Some(user) => user.username(),
                None => anyhow::bail!("log in with `su <user>` first"),
            };
            change_password(session, &name)?;
        }
        ("su", [name]) => {
            let password = rpassword::prompt_password("Password: ")?;
            session.switch_user(name, &password)?;
            println!("logged in as {name} in {}", session.pwd());
        }
        ("whoami", []) => match session.whoami()? {
            Some(user) => {
                println!("user:      {}", user.username());
                println!("full name: {}", user.full_name());
                println!("uid:       {}", user.uid);
                println!("gid:       {}", user.gid);
                println!("home:      {}", user.home_directory());
            }
            None => println!("not logged in"),
        },
        ("pwd", []) => println!("{}", session.pwd()),
        ("infofs", []) => {
            let stats = session.info()?;
            print_info(&session.image_path().display().to_string(), &stats);
        }
        ("help", _) => println!("{SHELL_HELP}"),
        ("exit", []) => session.shutdown()?,
        _ => anyhow::bail!("unknown command or wrong arguments, see `help`"),
    }
    Ok(())
}

fn change_password(session: &mut Session, name: &str) -> anyhow::Result<()> {
    let password = rpassword::prompt_password(format!("New password for {name}: "))?;
    let confirmation = rpassword::prompt_password("Retype the new password: ")?;
    session.change_password(name, &password, &confirmation)?;
    println!("update user password successfully.");
    Ok(())
}

fn prompt_line(prompt: &str) -> anyhow::Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
