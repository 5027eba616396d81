use clap::Parser;
use inode_fs::{
    disk::{FileDisk, MemoryDisk},
    FileSystem,
};
use std::{error::Error, path::PathBuf};

use crate::shell::start_shell;

mod shell;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Path to the disk image
    #[arg(required_unless_present = "memory")]
    image: Option<PathBuf>,

    /// Number of blocks; defaults to the size of an existing image
    #[arg(short, long)]
    blocks: Option<u64>,

    /// Use a RAM-backed disk instead of an image file
    #[arg(long, requires = "blocks", conflicts_with = "image")]
    memory: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match (cli.memory, cli.image, cli.blocks) {
        (true, _, Some(blocks)) => start_shell(FileSystem::new(MemoryDisk::new(blocks)))?,
        (_, Some(image), blocks) => start_shell(FileSystem::new(FileDisk::open(image, blocks)?))?,
        _ => return Err("either an image path or --memory --blocks N is required".into()),
    }

    Ok(())
}
