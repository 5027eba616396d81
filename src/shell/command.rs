use colored::*;
use dialoguer::Confirm;
use indicatif::ProgressBar;
use inode_fs::{disk::BlockDevice, FileSystem};
use std::{
    error::Error,
    io::{self, Write},
    path::PathBuf,
    time::Duration,
};

// cat / copyout 每次读取的字节数
const CHUNK_SIZE: usize = 16 * 1024;

#[derive(Debug)]
pub enum Command {
    Help,
    Format,
    Mount,
    Unmount,
    Debug,
    Stat,
    Create,
    Delete(u32),
    GetSize(u32),
    Cat(u32),
    Read {
        inumber: u32,
        length: u32,
        offset: u32,
    },
    Write {
        inumber: u32,
        offset: u32,
        text: String,
    },
    CopyIn(PathBuf, u32),
    CopyOut(u32, PathBuf),
    Exit,
}

pub fn execute_command<D: BlockDevice>(
    cmd: &Command,
    fs: &mut FileSystem<D>,
) -> Result<(), Box<dyn Error>> {
    match cmd {
        Command::Help => print_help(),
        Command::Format => format_volume(fs)?,
        Command::Mount => {
            fs.mount()?;
            println!("{}", "✅ File system mounted".green());
        }
        Command::Unmount => {
            fs.unmount()?;
            println!("{}", "✅ File system unmounted".green());
        }
        Command::Debug => println!("{}", fs.debug()?),
        Command::Stat => {
            let stats = fs.stat()?;
            println!(
                "{}\n{}: {}\n{}: {}\n{}: {} / {}\n",
                "📊 Volume Info".bright_yellow().bold(),
                "Blocks".blue(),
                stats.total_blocks,
                "Free".blue(),
                stats.free_blocks,
                "Inodes".blue(),
                stats.live_inodes,
                stats.inode_capacity
            );
        }
        Command::Create => {
            let inumber = fs.create()?;
            println!("📝 Created inode {}", inumber.to_string().green());
        }
        Command::Delete(inumber) => {
            if fs.delete(*inumber)? {
                println!("❌ Deleted inode {}", inumber.to_string().red());
            } else {
                println!("{}", format!("⚠️  Inode {inumber} is not in use").yellow());
            }
        }
        Command::GetSize(inumber) => {
            println!("📏 Inode {} has size {} bytes", inumber, fs.getsize(*inumber)?);
        }
        Command::Cat(inumber) => {
            let mut stdout = io::stdout().lock();
            copy_out(fs, *inumber, &mut stdout)?;
            stdout.flush()?;
            println!();
        }
        Command::Read {
            inumber,
            length,
            offset,
        } => {
            let mut buf = vec![0u8; *length as usize];
            let n = fs.read(*inumber, &mut buf, *offset)?;
            println!("📖 Read {} bytes", n.to_string().cyan());
            println!("{}", String::from_utf8_lossy(&buf[..n]));
        }
        Command::Write {
            inumber,
            offset,
            text,
        } => {
            let n = fs.write(*inumber, text.as_bytes(), *offset)?;
            report_written(n, text.len());
        }
        Command::CopyIn(path, inumber) => {
            let data = std::fs::read(path)?;
            let n = fs.write(*inumber, &data, 0)?;
            report_written(n, data.len());
        }
        Command::CopyOut(inumber, path) => {
            let mut file = std::fs::File::create(path)?;
            let n = copy_out(fs, *inumber, &mut file)?;
            println!(
                "✅ Copied {} bytes to {}",
                n.to_string().green(),
                path.display().to_string().cyan()
            );
        }
        Command::Exit => println!("{}", "👋 Exiting inode-fs shell...".yellow().bold()),
    }

    Ok(())
}

fn format_volume<D: BlockDevice>(fs: &mut FileSystem<D>) -> Result<(), Box<dyn Error>> {
    let confirmed = Confirm::new()
        .with_prompt("Formatting erases every file on the volume. Continue?")
        .default(false)
        .interact()?;
    if !confirmed {
        println!("{}", "Format cancelled".bright_black());
        return Ok(());
    }

    let pb = ProgressBar::new_spinner();
    pb.set_message("💾 Formatting virtual disk...");
    pb.enable_steady_tick(Duration::from_millis(80));
    match fs.format() {
        Ok(sb) => {
            pb.finish_with_message(format!(
                "✅ Disk formatted: {} blocks, {} inodes",
                sb.total_blocks, sb.inode_capacity
            ));
            Ok(())
        }
        Err(e) => {
            pb.finish_and_clear();
            Err(e.into())
        }
    }
}

/// 按块读取整个文件写入 `out`，返回复制的字节数
fn copy_out<D: BlockDevice>(
    fs: &FileSystem<D>,
    inumber: u32,
    out: &mut impl Write,
) -> Result<usize, Box<dyn Error>> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut offset = 0usize;
    loop {
        let n = fs.read(inumber, &mut buf, offset as u32)?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n])?;
        offset += n;
    }
    Ok(offset)
}

fn report_written(written: usize, requested: usize) {
    if written < requested {
        println!(
            "{}",
            format!("⚠️  Only {written} of {requested} bytes written, disk is full").yellow()
        );
    } else {
        println!("✏️  Wrote {} bytes", written.to_string().green());
    }
}

fn print_help() {
    println!("{}", "📘 inode-fs Commands".bright_cyan().bold());
    println!(
        "{}",
        "
  format                         Format the volume
  mount                          Mount the volume
  unmount                        Unmount the volume
  debug                          Dump superblock and live inodes
  stat                           Show volume usage
  create                         Create an empty file, print its inode
  delete <inode>                 Delete a file
  getsize <inode>                Show file size
  cat <inode>                    Print file content
  read <inode> <length> <offset> Read bytes from a file
  write <inode> <offset> <text>  Write text into a file
  copyin <path> <inode>          Copy a host file into a file
  copyout <inode> <path>         Copy a file out to the host
  help                           Show this help message
  exit                           Quit the shell
"
        .bright_black()
    );
}
