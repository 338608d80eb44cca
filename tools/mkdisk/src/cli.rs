use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use fatimage::dir::ShortName;
use fatimage::{ImageResult, VolumeParams};

const MIB: u64 = 1024 * 1024;

#[derive(Parser)]
#[command(name = "mkdisk", bin_name = "mkdisk")]
#[command(about = "Build FAT16 volumes and boot disk images")]
pub struct Cli {
    /// More output; repeat for trace messages
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only report errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn log_level(&self) -> log::LevelFilter {
        if self.quiet {
            return log::LevelFilter::Error;
        }
        match self.verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a FAT16 volume from host files
    Fat(FatArgs),
    /// Assemble bootloader, kernel and FAT16 volume into one disk image
    Compose(ComposeArgs),
    /// Write a payload at a fixed sector of an existing disk image
    WriteRaw(WriteRawArgs),
}

#[derive(Args)]
pub struct FatArgs {
    #[arg(short, long, default_value = "fat16.img")]
    pub output: PathBuf,

    /// Volume size in MiB
    #[arg(long, default_value_t = 16)]
    pub size_mb: u64,

    /// Volume size in bytes, overrides --size-mb
    #[arg(long)]
    pub size: Option<u64>,

    #[arg(long, default_value_t = 4)]
    pub sectors_per_cluster: u8,

    #[arg(long, default_value_t = 1)]
    pub reserved_sectors: u16,

    #[arg(long, default_value_t = 2)]
    pub fats: u8,

    #[arg(long, default_value_t = 512)]
    pub root_entries: u16,

    #[arg(long, default_value = "NO NAME")]
    pub label: String,

    #[arg(long, default_value = "MKFSFAT")]
    pub oem: String,

    #[arg(long, default_value_t = 12345678)]
    pub serial: u32,

    /// Files to pack, as SRC or SRC=NAME, in directory order. A NAME never
    /// contains a path separator.
    #[arg(value_parser = parse_file_arg)]
    pub files: Vec<FileArg>,
}

impl FatArgs {
    pub fn size_bytes(&self) -> u64 {
        self.size.unwrap_or(self.size_mb.saturating_mul(MIB))
    }

    pub fn volume_params(&self) -> VolumeParams {
        VolumeParams {
            sectors_per_cluster: self.sectors_per_cluster,
            reserved_sectors: self.reserved_sectors,
            fat_count: self.fats,
            root_directory_entries: self.root_entries,
            oem_name: self.oem.clone(),
            volume_label: self.label.clone(),
            volume_serial: self.serial,
            ..VolumeParams::default()
        }
    }
}

#[derive(Args)]
pub struct ComposeArgs {
    #[arg(long)]
    pub boot: PathBuf,

    #[arg(long)]
    pub kernel: PathBuf,

    #[arg(long)]
    pub fat: PathBuf,

    #[arg(short, long, default_value = "os-image.bin")]
    pub output: PathBuf,

    #[arg(long, default_value_t = 2880)]
    pub disk_sectors: u32,

    #[arg(long, default_value_t = 128)]
    pub max_kernel_sectors: u32,
}

#[derive(Args)]
pub struct WriteRawArgs {
    #[arg(long, default_value = "os-image.bin")]
    pub image: PathBuf,

    /// Sector to start writing at
    #[arg(long, default_value_t = 150)]
    pub lba: u64,

    pub payload: PathBuf,
}

/// A host file and the name it takes in the root directory
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileArg {
    pub path: PathBuf,
    pub name: Option<String>,
}

/// `SRC=NAME` splits on the last `=`, unless what follows it contains a path
/// separator, in which case the whole argument is the source path.
fn parse_file_arg(arg: &str) -> Result<FileArg, String> {
    let (path, name) = match arg.rsplit_once('=') {
        Some((path, name)) if !name.contains(['/', '\\']) => (path, Some(name.to_string())),
        _ => (arg, None),
    };
    if path.is_empty() {
        return Err(format!("missing source path in \"{}\"", arg));
    }
    Ok(FileArg {
        path: PathBuf::from(path),
        name,
    })
}

impl FileArg {
    /// An 11-character name without a dot is taken as the raw directory
    /// field; anything else is normalised from its dotted form.
    pub fn short_name(&self) -> ImageResult<ShortName> {
        match &self.name {
            Some(name) if name.len() == 11 && !name.contains('.') => {
                ShortName::from_bytes(name.as_bytes())
            }
            Some(name) => ShortName::from_display(name),
            None => {
                let file_name = self
                    .path
                    .file_name()
                    .map(|name| name.to_string_lossy())
                    .unwrap_or_default();
                ShortName::from_display(&file_name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fatimage::error::{ImageError, NameError};

    #[test]
    fn source_with_raw_name() {
        let file = parse_file_arg("build/kernel.elf=KERNEL  BIN").unwrap();
        assert_eq!(file.path, PathBuf::from("build/kernel.elf"));
        assert_eq!(file.short_name().unwrap().as_bytes(), b"KERNEL  BIN");
    }

    #[test]
    fn source_with_dotted_name() {
        let file = parse_file_arg("a/b.txt=readme.txt").unwrap();
        assert_eq!(file.short_name().unwrap().as_bytes(), b"README  TXT");
    }

    #[test]
    fn source_named_after_file() {
        let file = parse_file_arg("out/cmd.elf").unwrap();
        assert_eq!(file.name, None);
        assert_eq!(file.short_name().unwrap().as_bytes(), b"CMD     ELF");
    }

    #[test]
    fn source_name_too_long() {
        let file = parse_file_arg("x=averylongname.txt").unwrap();
        assert!(matches!(
            file.short_name(),
            Err(ImageError::Name(NameError::TooLong { .. }))
        ));
    }

    #[test]
    fn equals_inside_path_kept() {
        let file = parse_file_arg("out=v2/a.bin").unwrap();
        assert_eq!(file.path, PathBuf::from("out=v2/a.bin"));
        assert_eq!(file.name, None);
        assert_eq!(file.short_name().unwrap().as_bytes(), b"A       BIN");

        let file = parse_file_arg("out=v2/a.bin=B.BIN").unwrap();
        assert_eq!(file.path, PathBuf::from("out=v2/a.bin"));
        assert_eq!(file.name.as_deref(), Some("B.BIN"));
    }

    #[test]
    fn missing_path_rejected() {
        assert!(parse_file_arg("=NAME").is_err());
    }

    #[test]
    fn cli_defaults() {
        let cli = Cli::try_parse_from(["mkdisk", "fat", "a.txt", "b.bin=B       BIN"]).unwrap();
        assert_eq!(cli.log_level(), log::LevelFilter::Info);
        let Commands::Fat(args) = cli.command else {
            panic!("expected fat subcommand");
        };
        assert_eq!(args.size_bytes(), 16 * MIB);
        assert_eq!(args.files.len(), 2);
        let params = args.volume_params();
        assert_eq!(params.sectors_per_cluster, 4);
        assert_eq!(params.root_directory_entries, 512);
    }

    #[test]
    fn size_in_bytes_wins() {
        let cli = Cli::try_parse_from(["mkdisk", "-vv", "fat", "--size", "1048576"]).unwrap();
        assert_eq!(cli.log_level(), log::LevelFilter::Trace);
        let Commands::Fat(args) = cli.command else {
            panic!("expected fat subcommand");
        };
        assert_eq!(args.size_bytes(), MIB);
    }

    #[test]
    fn write_raw_defaults() {
        let cli = Cli::try_parse_from(["mkdisk", "write-raw", "payload.bin"]).unwrap();
        let Commands::WriteRaw(args) = cli.command else {
            panic!("expected write-raw subcommand");
        };
        assert_eq!(args.lba, 150);
        assert_eq!(args.image, PathBuf::from("os-image.bin"));
    }
}
