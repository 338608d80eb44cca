use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fatimage::disk::DiskIO;

/// An existing disk image on the host, written in place
pub struct FileDisk {
    file: File,
}

impl FileDisk {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("failed to open disk image {}", path.display()))?;
        Ok(Self { file })
    }
}

impl DiskIO for FileDisk {
    type Error = io::Error;

    fn write(&mut self, buffer: &[u8], offset: u64) -> Result<(), Self::Error> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buffer)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Write `bytes` next to `path` and rename over it, so a failed run never
/// leaves a truncated image behind.
pub fn persist(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = temp_path(path);
    let written = File::create(&tmp).and_then(|mut file| {
        file.write_all(bytes)?;
        file.sync_all()
    });
    if let Err(err) = written.and_then(|()| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(err).with_context(|| format!("failed to write {}", path.display()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mkdisk-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn persist_replaces_and_cleans_up() {
        let dir = scratch("persist");
        let target = dir.join("out.img");
        fs::write(&target, b"old contents").unwrap();
        persist(&target, b"new").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"new");
        assert!(!temp_path(&target).exists());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn persist_into_missing_dir_fails() {
        let dir = scratch("missing");
        let target = dir.join("nope").join("out.img");
        assert!(persist(&target, b"x").is_err());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn file_disk_writes_in_place() {
        let dir = scratch("filedisk");
        let target = dir.join("disk.img");
        fs::write(&target, vec![0xffu8; 4 * 512]).unwrap();
        let mut disk = FileDisk::open(&target).unwrap();
        let sectors = fatimage::disk::write_payload(&mut disk, 2, &[5u8; 10]).unwrap();
        assert_eq!(sectors, 1);
        drop(disk);

        let bytes = fs::read(&target).unwrap();
        assert_eq!(bytes.len(), 4 * 512);
        assert_eq!(bytes[1023], 0xff);
        assert!(bytes[1024..1034].iter().all(|&b| b == 5));
        assert!(bytes[1034..1536].iter().all(|&b| b == 0));
        assert_eq!(bytes[1536], 0xff);
        fs::remove_dir_all(&dir).unwrap();
    }
}
