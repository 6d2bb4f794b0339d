// # -----------------------------
// # crates/tools/src/fs.rs
// # -----------------------------
use serde::Serialize;
use std::io;
use std::path::Path;
use tokio::io::AsyncReadExt;

#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("Requested path is not a file")]
    NotAFile,
    #[error("Requested path is not a directory")]
    NotADirectory,
    #[error("File too large ({size} bytes), limit is {limit}")]
    TooLarge { size: u64, limit: u64 },
    #[error("Directory has more than {limit} entries")]
    TooManyEntries { limit: usize },
    #[error("{0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Directory,
    File,
    Symlink,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub name: String,
    pub kind: EntryKind,
}

/// Reads a regular file as lossy UTF-8, refusing anything above `limit` bytes.
/// The size is checked from metadata before the file is opened.
pub async fn read_capped(path: &Path, limit: u64) -> Result<String, FsError> {
    let meta = tokio::fs::metadata(path).await?;
    if !meta.is_file() {
        return Err(FsError::NotAFile);
    }
    if meta.len() > limit {
        return Err(FsError::TooLarge {
            size: meta.len(),
            limit,
        });
    }
    let file = tokio::fs::File::open(path).await?;
    let mut buf = Vec::with_capacity(meta.len() as usize);
    // the file may have grown since the stat
    file.take(limit + 1).read_to_end(&mut buf).await?;
    if buf.len() as u64 > limit {
        return Err(FsError::TooLarge {
            size: buf.len() as u64,
            limit,
        });
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// First `max_bytes` of a file as lossy UTF-8.
pub async fn read_head(path: &Path, max_bytes: u64) -> io::Result<String> {
    let file = tokio::fs::File::open(path).await?;
    let mut buf = Vec::new();
    file.take(max_bytes).read_to_end(&mut buf).await?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Lists a directory, failing as soon as more than `max_entries` entries are seen.
/// Entries are sorted by name; symlinks are reported, never followed.
pub async fn list_dir(path: &Path, max_entries: usize) -> Result<Vec<RawEntry>, FsError> {
    let meta = tokio::fs::metadata(path).await?;
    if !meta.is_dir() {
        return Err(FsError::NotADirectory);
    }
    let mut rd = tokio::fs::read_dir(path).await?;
    let mut out = Vec::new();
    while let Some(entry) = rd.next_entry().await? {
        if out.len() == max_entries {
            return Err(FsError::TooManyEntries { limit: max_entries });
        }
        let ft = entry.file_type().await?;
        let kind = if ft.is_symlink() {
            EntryKind::Symlink
        } else if ft.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };
        out.push(RawEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            kind,
        });
    }
    out.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn read_respects_limit_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("f.txt");
        fs::write(&p, vec![b'a'; 16]).unwrap();
        assert_eq!(read_capped(&p, 16).await.unwrap().len(), 16);
        let err = read_capped(&p, 15).await.unwrap_err();
        assert!(matches!(err, FsError::TooLarge { size: 16, limit: 15 }));
        assert_eq!(err.to_string(), "File too large (16 bytes), limit is 15");
    }

    #[tokio::test]
    async fn read_rejects_directories() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(read_capped(dir.path(), 10).await, Err(FsError::NotAFile)));
    }

    #[tokio::test]
    async fn head_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("f.txt");
        fs::write(&p, "hello world").unwrap();
        assert_eq!(read_head(&p, 5).await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn list_is_sorted_and_bounded() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("b.txt"), "").unwrap();
        fs::write(dir.path().join("a.txt"), "").unwrap();
        let entries = list_dir(dir.path(), 3).await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["a.txt", "b.txt", "sub"]);
        assert_eq!(entries[2].kind, EntryKind::Directory);

        let err = list_dir(dir.path(), 2).await.unwrap_err();
        assert!(matches!(err, FsError::TooManyEntries { limit: 2 }));
    }

    #[tokio::test]
    async fn list_rejects_files() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("f.txt");
        fs::write(&p, "").unwrap();
        assert!(matches!(list_dir(&p, 10).await, Err(FsError::NotADirectory)));
    }
}
