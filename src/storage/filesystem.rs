use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use super::{address_path, validate_segment, BlobEntry, BlobStore, LocalArchive};

const TMP_SUFFIX: &str = ".tmp";

/// Blob store rooted at a local directory; `a/b.jpg` lands at `{root}/a/b.jpg`.
#[derive(Clone, Debug)]
pub struct FilesystemBlobStore {
    root: PathBuf,
}

impl FilesystemBlobStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .with_context(|| format!("create blob store root {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl BlobStore for FilesystemBlobStore {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    fn verify(&self) -> Result<()> {
        let meta = fs::metadata(&self.root)
            .with_context(|| format!("blob store root {} is not accessible", self.root.display()))?;
        if !meta.is_dir() {
            return Err(anyhow!("blob store root {} is not a directory", self.root.display()));
        }
        if meta.permissions().readonly() {
            return Err(anyhow!("blob store root {} is read-only", self.root.display()));
        }
        Ok(())
    }

    fn put(&self, address: &str, bytes: &[u8], content_type: &str) -> Result<()> {
        let path = address_path(&self.root, address)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create partition {}", parent.display()))?;
        }
        write_atomic(&path, bytes).with_context(|| format!("write blob {}", path.display()))?;
        log::debug!("stored {} ({} bytes, {})", address, bytes.len(), content_type);
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<BlobEntry>> {
        let mut entries = Vec::new();
        collect_entries(&self.root, "", &mut entries)?;
        entries.retain(|e| e.key.starts_with(prefix));
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    fn get(&self, address: &str) -> Result<Vec<u8>> {
        let path = address_path(&self.root, address)?;
        fs::read(&path).with_context(|| format!("read blob {}", path.display()))
    }
}

fn collect_entries(dir: &Path, key_prefix: &str, out: &mut Vec<BlobEntry>) -> Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("list {}", dir.display()))? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let key = if key_prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", key_prefix, name)
        };
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_entries(&entry.path(), &key, out)?;
        } else if file_type.is_file() && !name.ends_with(TMP_SUFFIX) {
            out.push(BlobEntry {
                key,
                size: entry.metadata()?.len(),
            });
        }
    }
    Ok(())
}

/// Local backup directory. Files are written flat under `dir`.
#[derive(Clone, Debug)]
pub struct FilesystemArchive {
    dir: PathBuf,
}

impl FilesystemArchive {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).with_context(|| format!("create archive {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl LocalArchive for FilesystemArchive {
    fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        validate_segment(name).map_err(|err| anyhow!("invalid archive name {:?}: {}", name, err))?;
        let path = self.dir.join(name);
        write_atomic(&path, bytes).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }
}

/// Write via a sibling temp file, fsync, then rename into place.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("path {} has no file name", path.display()))?;
    let tmp_path = path.with_file_name(format!("{}{}", file_name, TMP_SUFFIX));
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_list_get_round_trip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = FilesystemBlobStore::new(dir.path().join("blobs"))?;
        store.verify()?;

        store.put("02-12-2025/bird_a.jpg", b"abc", "image/jpeg")?;
        store.put("02-13-2025/bird_b.jpg", b"de", "image/jpeg")?;
        fs::write(dir.path().join("blobs/02-12-2025/partial.jpg.tmp"), b"x")?;

        let all = store.list("")?;
        assert_eq!(
            all.iter().map(|e| e.key.as_str()).collect::<Vec<_>>(),
            vec!["02-12-2025/bird_a.jpg", "02-13-2025/bird_b.jpg"]
        );
        let day = store.list("02-12-2025/")?;
        assert_eq!(day, vec![BlobEntry { key: "02-12-2025/bird_a.jpg".into(), size: 3 }]);
        assert_eq!(store.get("02-13-2025/bird_b.jpg")?, b"de".to_vec());
        Ok(())
    }

    #[test]
    fn put_rejects_escaping_address() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = FilesystemBlobStore::new(dir.path())?;
        assert!(store.put("../escape.jpg", b"x", "image/jpeg").is_err());
        assert!(store.get("..").is_err());
        Ok(())
    }

    #[test]
    fn verify_fails_when_root_is_a_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = FilesystemBlobStore::new(dir.path().join("root"))?;
        fs::remove_dir(dir.path().join("root"))?;
        fs::write(dir.path().join("root"), b"not a dir")?;
        assert!(store.verify().is_err());
        Ok(())
    }

    #[test]
    fn archive_writes_flat_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let archive = FilesystemArchive::new(dir.path().join("backup"))?;
        let path = archive.write("bird_x.jpg", b"jpeg")?;
        assert_eq!(path, dir.path().join("backup/bird_x.jpg"));
        assert_eq!(fs::read(&path)?, b"jpeg".to_vec());
        assert!(!dir.path().join("backup/bird_x.jpg.tmp").exists());
        assert!(archive.write("nested/x.jpg", b"jpeg").is_err());
        Ok(())
    }
}
