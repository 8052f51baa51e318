//! `redsimg` — creates, lists, imports into and exports out of a redsfs
//! image file. Command line parsing, directory traversal and host file
//! I/O live here, outside the core engine's scope; it exists only to
//! drive the library through its public API.

use redsfs::{FileBlockDevice, FileMode, Filesystem, MountConfig};
use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::exit;

/// Writes an error to stderr, then exits.
fn die<M: std::fmt::Display>(msg: M) -> ! {
    eprintln!("redsimg: error: {msg}");
    exit(1);
}

/// Structure storing command line arguments.
#[derive(Default)]
struct Args {
    /// Path to the image file.
    image: Option<PathBuf>,
    /// `-c SIZE`: create a new zeroed image of this many bytes.
    create_size: Option<u64>,
    /// `-i DIR`: import every regular file under `DIR` into the image.
    import_dir: Option<PathBuf>,
    /// `-o DIR`: export every file in the image into `DIR`.
    export_dir: Option<PathBuf>,
    /// `-l`: list the files in the image.
    list: bool,
}

fn parse_args() -> Args {
    let mut args: Args = Default::default();
    let mut iter = env::args().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-c" => {
                let sz = iter.next().unwrap_or_else(|| die("-c requires a size"));
                args.create_size = Some(sz.parse().unwrap_or_else(|_| die("invalid size")));
            }
            "-i" => {
                let dir = iter
                    .next()
                    .unwrap_or_else(|| die("-i requires a directory"));
                args.import_dir = Some(PathBuf::from(dir));
            }
            "-o" => {
                let dir = iter
                    .next()
                    .unwrap_or_else(|| die("-o requires a directory"));
                args.export_dir = Some(PathBuf::from(dir));
            }
            "-l" => args.list = true,
            _ => args.image = Some(PathBuf::from(arg)),
        }
    }

    args
}

const BLOCK_SIZE: u32 = 256;

fn open_image(path: &PathBuf, create_size: Option<u64>) -> io::Result<(File, u64)> {
    if let Some(size) = create_size {
        if size % BLOCK_SIZE as u64 != 0 {
            die("image size must be a multiple of the block size");
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(size)?;
        Ok((file, size))
    } else {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let size = file.metadata()?.len();
        Ok((file, size))
    }
}

/// Copies every regular file directly under `dir` into the mounted image,
/// using the host file's name (truncated to the image's 32-byte filename
/// field) as the stored name.
fn import_dir(fs: &mut Filesystem<FileBlockDevice>, dir: &PathBuf) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        println!("importing {name}");

        fs.open(name.as_bytes(), FileMode::Write)
            .unwrap_or_else(|e| die(format!("{name}: {e}")));

        let mut src = File::open(entry.path())?;
        let mut buf = [0u8; 4096];
        loop {
            let n = src.read(&mut buf)?;
            if n == 0 {
                break;
            }
            fs.write(&buf[..n])
                .unwrap_or_else(|e| die(format!("{name}: {e}")));
        }
        fs.close().unwrap_or_else(|e| die(format!("{name}: {e}")));
    }
    Ok(())
}

/// Copies every file stored in the mounted image out into `dir`.
fn export_dir(fs: &mut Filesystem<FileBlockDevice>, dir: &PathBuf) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    while let Some(name) = fs.next_file() {
        let name_str = String::from_utf8_lossy(&name).into_owned();
        println!("exporting {name_str}");

        fs.open(&name, FileMode::Read)
            .unwrap_or_else(|e| die(format!("{name_str}: {e}")));

        let mut dst = File::create(dir.join(&name_str))?;
        let mut buf = [0u8; 4096];
        loop {
            let n = fs
                .read(&mut buf)
                .unwrap_or_else(|e| die(format!("{name_str}: {e}")));
            if n == 0 {
                break;
            }
            dst.write_all(&buf[..n])?;
        }
    }
    Ok(())
}

fn list(fs: &mut Filesystem<FileBlockDevice>) {
    while let Some(name) = fs.next_file() {
        println!("{}", String::from_utf8_lossy(&name));
    }
}

fn main() {
    env_logger::init();
    let args = parse_args();

    let image_path = args
        .image
        .unwrap_or_else(|| die("specify a path to an image file"));
    let (file, size) = open_image(&image_path, args.create_size)
        .unwrap_or_else(|e| die(format!("{}: {e}", image_path.display())));

    let device = FileBlockDevice::new(file);
    let mut fs = Filesystem::mount(device, MountConfig::new(0, size as u32, BLOCK_SIZE));

    if let Some(dir) = &args.import_dir {
        import_dir(&mut fs, dir).unwrap_or_else(|e| die(e));
    }
    if let Some(dir) = &args.export_dir {
        export_dir(&mut fs, dir).unwrap_or_else(|e| die(e));
    }
    if args.list {
        list(&mut fs);
    }

    fs.unmount();
}
