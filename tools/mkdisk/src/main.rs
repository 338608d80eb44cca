mod cli;
mod disk;
mod logger;

use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::Parser;
use fatimage::dir::ShortName;
use fatimage::disk::DiskParams;

use cli::{Cli, Commands, ComposeArgs, FatArgs, WriteRawArgs};
use disk::{persist, FileDisk};

/// Seconds between the Unix epoch and 1980-01-01 00:00:00 UTC
const FAT_EPOCH_OFFSET: u64 = 315_532_800;

/// Wall clock in seconds since the FAT epoch. Times before 1980 clamp to the
/// epoch and times past the 32-bit range clamp to its end.
fn fat_timestamp() -> u32 {
    let unix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0);
    unix.saturating_sub(FAT_EPOCH_OFFSET).min(u32::MAX as u64) as u32
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init(cli.log_level())?;

    match cli.command {
        Commands::Fat(args) => cmd_fat(args),
        Commands::Compose(args) => cmd_compose(args),
        Commands::WriteRaw(args) => cmd_write_raw(args),
    }
}

fn cmd_fat(args: FatArgs) -> Result<()> {
    let mut names = Vec::with_capacity(args.files.len());
    let mut contents = Vec::with_capacity(args.files.len());
    for source in &args.files {
        let name = source
            .short_name()
            .with_context(|| format!("bad name for {}", source.path.display()))?;
        let data = fs::read(&source.path)
            .with_context(|| format!("failed to read {}", source.path.display()))?;
        names.push(name);
        contents.push(data);
    }
    let files: Vec<(ShortName, &[u8])> = names
        .into_iter()
        .zip(contents.iter().map(Vec::as_slice))
        .collect();

    let params = args.volume_params();
    let image = fatimage::build_image(args.size_bytes(), &params, &files, fat_timestamp)
        .context("failed to build FAT16 volume")?;
    persist(&args.output, &image)?;

    log::info!(
        "wrote {} ({} bytes, {} files)",
        args.output.display(),
        image.len(),
        files.len(),
    );
    Ok(())
}

fn cmd_compose(args: ComposeArgs) -> Result<()> {
    let boot = fs::read(&args.boot)
        .with_context(|| format!("failed to read bootloader {}", args.boot.display()))?;
    let kernel = fs::read(&args.kernel)
        .with_context(|| format!("failed to read kernel {}", args.kernel.display()))?;
    let volume = fs::read(&args.fat)
        .with_context(|| format!("failed to read FAT16 volume {}", args.fat.display()))?;

    let params = DiskParams {
        disk_sectors: args.disk_sectors,
        max_kernel_sectors: args.max_kernel_sectors,
    };
    let (disk, layout) = fatimage::disk::compose(&boot, &kernel, &volume, &params)
        .context("failed to assemble disk image")?;
    persist(&args.output, &disk)?;

    log::info!(
        "wrote {}: {} sectors, kernel {} sectors, volume at sector {}",
        args.output.display(),
        layout.total_sectors,
        layout.kernel_sectors,
        layout.volume_start,
    );
    Ok(())
}

fn cmd_write_raw(args: WriteRawArgs) -> Result<()> {
    let payload = fs::read(&args.payload)
        .with_context(|| format!("failed to read {}", args.payload.display()))?;
    let mut disk = FileDisk::open(&args.image)?;
    let sectors = fatimage::disk::write_payload(&mut disk, args.lba, &payload)
        .with_context(|| format!("failed to write {}", args.image.display()))?;

    log::info!(
        "wrote {} sectors of {} at LBA {}",
        sectors,
        args.payload.display(),
        args.lba,
    );
    Ok(())
}
