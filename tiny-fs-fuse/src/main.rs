use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;
use simple_logger::SimpleLogger;
use tiny_fs::consts::MAX_FILE_BYTES;
use tiny_fs::{FsError, FsResult};
use tiny_fs_fuse::boot;

/// Poke at a tiny-fs disk image.
#[derive(Parser)]
#[command(name = "tfs")]
struct Cli {
    /// Disk image backing file (created and formatted when missing)
    #[arg(long, short, default_value = "fs.img")]
    image: PathBuf,

    /// Raise the log level (repeat for more)
    #[arg(long, short, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List a directory
    Ls { path: String },
    /// Create a directory
    Mkdir { path: String },
    /// Create an empty file
    Touch { path: String },
    /// Write a string to a file from offset 0, creating it when missing
    Write { path: String, text: String },
    /// Print a file's contents
    Cat { path: String },
    /// Remove a file
    Rm { path: String },
    /// Remove an empty directory
    Rmdir { path: String },
    /// Show allocator usage
    Stat,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let _ = SimpleLogger::new().with_level(level).init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("tfs: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> FsResult<()> {
    let mut fs = boot(&cli.image)?;
    match &cli.command {
        Command::Ls { path } => {
            for name in fs.list(path)? {
                println!("{name}");
            }
        }
        Command::Mkdir { path } => {
            fs.create_dir(path)?;
            fs.sync()?;
        }
        Command::Touch { path } => {
            fs.create_file(path)?;
            fs.sync()?;
        }
        Command::Write { path, text } => {
            let fd = match fs.open(path) {
                Ok(fd) => fd,
                Err(FsError::NoSuchFile) => {
                    fs.create_file(path)?;
                    fs.open(path)?
                }
                Err(e) => return Err(e),
            };
            fs.write(fd, text.as_bytes())?;
            fs.close(fd)?;
            fs.sync()?;
        }
        Command::Cat { path } => {
            let fd = fs.open(path)?;
            let mut buf = vec![0u8; MAX_FILE_BYTES];
            let n = fs.read(fd, &mut buf)?;
            fs.close(fd)?;
            io::stdout().write_all(&buf[..n]).ok();
        }
        Command::Rm { path } => {
            fs.unlink_file(path)?;
            fs.sync()?;
        }
        Command::Rmdir { path } => {
            fs.unlink_dir(path)?;
            fs.sync()?;
        }
        Command::Stat => {
            let stat = fs.stat()?;
            println!("inodes:  {} free of {}", stat.free_inodes, stat.total_inodes);
            println!("sectors: {} free of {}", stat.free_sectors, stat.total_sectors);
        }
    }
    Ok(())
}
