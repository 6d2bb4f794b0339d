use fsgate_common::SandboxCfg;
use std::io;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("Invalid file path")]
    Empty,
    #[error("Invalid file path")]
    NulByte,
    #[error("Path too long ({len} chars), limit is {max}")]
    TooLong { len: usize, max: usize },
    #[error("Hidden files and directories are not accessible")]
    Hidden,
    #[error("Path traversal detected")]
    Traversal,
    #[error("Access to this path is blocked")]
    BlockedPattern(String),
    #[error("Files with extension {0} are blocked")]
    BlockedExtension(String),
    #[error("Symbolic links are not allowed")]
    Symlink,
    #[error("Path not found")]
    NotFound,
    #[error("Resolved path escapes the service directory")]
    Escape,
    #[error("filesystem error: {0}")]
    Io(#[from] io::Error),
}

fn io_err(e: io::Error) -> SandboxError {
    if e.kind() == io::ErrorKind::NotFound {
        SandboxError::NotFound
    } else {
        SandboxError::Io(e)
    }
}

/// Confines caller-supplied relative paths to a trusted base directory.
#[derive(Debug, Clone)]
pub struct PathGuard {
    max_path_len: usize,
    allow_dotfiles: bool,
    blocked_extensions: Vec<String>,
    blocked_patterns: Vec<String>,
}

impl PathGuard {
    pub fn new(cfg: &SandboxCfg) -> Self {
        let blocked_extensions = cfg
            .blocked_extensions
            .iter()
            .map(|e| format!(".{}", e.trim().trim_start_matches('.').to_lowercase()))
            .collect();
        let blocked_patterns = cfg
            .blocked_patterns
            .iter()
            .map(|p| p.to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self {
            max_path_len: cfg.max_path_len,
            allow_dotfiles: cfg.allow_dotfiles,
            blocked_extensions,
            blocked_patterns,
        }
    }

    pub fn max_path_len(&self) -> usize {
        self.max_path_len
    }

    pub fn allows_dotfiles(&self) -> bool {
        self.allow_dotfiles
    }

    /// Checks that need nothing but the input string: emptiness, NUL bytes, length,
    /// hidden segments.
    pub fn check_input(&self, rel: &str) -> Result<(), SandboxError> {
        if rel.trim().is_empty() {
            return Err(SandboxError::Empty);
        }
        if rel.contains('\0') {
            return Err(SandboxError::NulByte);
        }
        let len = rel.chars().count();
        if len > self.max_path_len {
            return Err(SandboxError::TooLong {
                len,
                max: self.max_path_len,
            });
        }
        if !self.allow_dotfiles
            && rel
                .split(['/', '\\'])
                .any(|seg| seg.starts_with('.') && seg != "." && seg != "..")
        {
            return Err(SandboxError::Hidden);
        }
        Ok(())
    }

    /// Lexical confinement. No filesystem access.
    pub fn confine(&self, base: &Path, rel: &str) -> Result<PathBuf, SandboxError> {
        self.check_input(rel)?;
        let base = normalize(base);
        let candidate = normalize(&base.join(rel));
        if escapes(&candidate, &base) {
            return Err(SandboxError::Traversal);
        }
        if let Some(pattern) = self.blocked_pattern(&candidate) {
            return Err(SandboxError::BlockedPattern(pattern.to_string()));
        }
        if let Some(ext) = self.blocked_extension(&candidate) {
            return Err(SandboxError::BlockedExtension(ext));
        }
        Ok(candidate)
    }

    /// Full resolution: lexical confinement, then `lstat` and `realpath` checks.
    pub async fn resolve(&self, base: &Path, rel: &str) -> Result<PathBuf, SandboxError> {
        let candidate = self.confine(base, rel)?;

        let meta = tokio::fs::symlink_metadata(&candidate).await.map_err(io_err)?;
        if meta.file_type().is_symlink() {
            tracing::debug!(path = %candidate.display(), "symlink rejected");
            return Err(SandboxError::Symlink);
        }

        let real = tokio::fs::canonicalize(&candidate).await.map_err(io_err)?;
        let real_base = tokio::fs::canonicalize(base).await.map_err(io_err)?;
        if escapes(&real, &real_base) {
            tracing::debug!(
                path = %candidate.display(),
                real = %real.display(),
                "real path escapes base"
            );
            return Err(SandboxError::Escape);
        }
        // An intermediate symlink that stays inside base still changes the real path.
        let offset =
            pathdiff::diff_paths(&candidate, normalize(base)).ok_or(SandboxError::Traversal)?;
        if real != real_base.join(&offset) {
            tracing::debug!(
                path = %candidate.display(),
                real = %real.display(),
                "symlinked component rejected"
            );
            return Err(SandboxError::Symlink);
        }
        Ok(candidate)
    }

    /// Whether a single directory-entry name may be shown to callers.
    pub fn is_visible_name(&self, name: &str) -> bool {
        self.allow_dotfiles || !name.starts_with('.')
    }

    /// Blocked substring or extension, the same rules `confine` applies.
    pub fn is_blocked(&self, path: &Path) -> bool {
        self.blocked_pattern(path).is_some() || self.blocked_extension(path).is_some()
    }

    fn blocked_pattern(&self, path: &Path) -> Option<&str> {
        let lowered = path.to_string_lossy().replace('\\', "/").to_lowercase();
        self.blocked_patterns
            .iter()
            .find(|p| lowered.contains(p.as_str()))
            .map(String::as_str)
    }

    fn blocked_extension(&self, path: &Path) -> Option<String> {
        let ext = format!(".{}", path.extension()?.to_string_lossy().to_lowercase());
        self.blocked_extensions.contains(&ext).then_some(ext)
    }
}

/// Lexically removes `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(comp);
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn escapes(candidate: &Path, base: &Path) -> bool {
    match pathdiff::diff_paths(candidate, base) {
        Some(offset) => {
            offset.is_absolute() || matches!(offset.components().next(), Some(Component::ParentDir))
        }
        None => true,
    }
}
