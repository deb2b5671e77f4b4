//! Versioned storage for operation documents.
//!
//! Every operation owns `{root}/{path}/` holding [`DOCUMENT_FILE`] and a git
//! repository rooted at the same directory. The git history is the durable
//! change log; the metadata store only indexes it.

mod diff;

pub use diff::unified_diff;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use git2::{Commit, ErrorCode, ObjectType, Oid, Repository, ResetType, Signature};

use crate::error::{Error, Result};

pub const DOCUMENT_FILE: &str = "main.ftml";

const FALLBACK_NAME: &str = "mscolab";
const FALLBACK_EMAIL: &str = "mscolab@localhost";

/// Identity recorded as author and committer of a revision.
#[derive(Debug, Clone, Copy)]
pub struct Author<'a> {
    pub name: &'a str,
    pub email: &'a str,
}

impl<'a> Author<'a> {
    #[must_use]
    pub fn new(name: &'a str, email: &'a str) -> Self {
        Self { name, email }
    }

    fn signature(&self) -> Result<Signature<'static>> {
        Signature::now(self.name, self.email)
            .or_else(|_| Signature::now(FALLBACK_NAME, FALLBACK_EMAIL))
            .map_err(Error::from)
    }
}

#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn operation_dir(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    fn document_path(&self, path: &str) -> PathBuf {
        self.operation_dir(path).join(DOCUMENT_FILE)
    }

    #[must_use]
    pub fn exists(&self, path: &str) -> bool {
        self.operation_dir(path).exists()
    }

    fn open(&self, path: &str) -> Result<Repository> {
        Repository::open(self.operation_dir(path)).map_err(|e| {
            if e.code() == ErrorCode::NotFound {
                Error::NotFound
            } else {
                Error::from(e)
            }
        })
    }

    /// Creates the operation directory, writes the initial document and
    /// records it as the first revision. The directory is removed again if
    /// any step fails.
    pub fn create(&self, path: &str, content: &str, author: Author<'_>) -> Result<Oid> {
        let dir = self.operation_dir(path);
        fs::create_dir_all(&self.root)?;
        fs::create_dir(&dir).map_err(|e| {
            if e.kind() == io::ErrorKind::AlreadyExists {
                Error::conflict(format!("directory already exists: {path}"))
            } else {
                Error::from(e)
            }
        })?;

        let result = fs::write(dir.join(DOCUMENT_FILE), content)
            .map_err(Error::from)
            .and_then(|()| {
                let repo = Repository::init(&dir)?;
                commit_document(&repo, "initial commit", author)
            });

        if result.is_err() {
            if let Err(e) = fs::remove_dir_all(&dir) {
                tracing::warn!("Failed to clean up {}: {e}", dir.display());
            }
        }
        result
    }

    /// Current content of the operation document.
    pub fn read(&self, path: &str) -> Result<String> {
        fs::read_to_string(self.document_path(path)).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                Error::NotFound
            } else {
                Error::from(e)
            }
        })
    }

    /// Content of the operation document as recorded in `commit_hash`.
    pub fn read_at(&self, path: &str, commit_hash: &str) -> Result<String> {
        let repo = self.open(path)?;
        let commit = find_commit(&repo, commit_hash)?;
        document_at(&repo, &commit)
    }

    /// Writes `content` and records it as a new revision. The previous file
    /// is restored when the revision cannot be recorded.
    pub fn commit(
        &self,
        path: &str,
        content: &str,
        message: &str,
        author: Author<'_>,
    ) -> Result<Oid> {
        let repo = self.open(path)?;
        let document = self.document_path(path);
        let previous = fs::read(&document)?;

        fs::write(&document, content)?;

        commit_document(&repo, message, author).inspect_err(|e| {
            tracing::warn!("Commit in {} failed, restoring document: {e}", path);
            if let Err(restore) = fs::write(&document, &previous) {
                tracing::error!("Failed to restore {}: {restore}", document.display());
            }
        })
    }

    /// Oid of the current head revision.
    pub fn head(&self, path: &str) -> Result<Oid> {
        let repo = self.open(path)?;
        let head = repo.head()?;
        head.target()
            .ok_or_else(|| Error::Git(git2::Error::from_str("HEAD is not a direct reference")))
    }

    /// Moves HEAD, index and document back to `oid`, discarding later
    /// revisions.
    pub fn reset_to(&self, path: &str, oid: Oid) -> Result<()> {
        let repo = self.open(path)?;
        let target = repo.find_object(oid, Some(ObjectType::Commit))?;
        repo.reset(&target, ResetType::Hard, None)?;
        Ok(())
    }

    /// Unified diff of the document between the parent of `commit_hash` and
    /// `commit_hash` itself. The first revision diffs against an empty file.
    pub fn diff_of(&self, path: &str, commit_hash: &str) -> Result<String> {
        let repo = self.open(path)?;
        let commit = find_commit(&repo, commit_hash)?;
        let after = document_at(&repo, &commit)?;
        let before = if commit.parent_count() > 0 {
            document_at(&repo, &commit.parent(0)?)?
        } else {
            String::new()
        };
        unified_diff(&before, &after)
    }

    /// Number of revisions reachable from HEAD.
    pub fn revision_count(&self, path: &str) -> Result<usize> {
        let repo = self.open(path)?;
        let mut walk = repo.revwalk()?;
        walk.push_head()?;
        Ok(walk.count())
    }

    pub fn rename(&self, from: &str, to: &str) -> Result<()> {
        let target = self.operation_dir(to);
        if target.exists() {
            return Err(Error::conflict(format!("directory already exists: {to}")));
        }
        let source = self.operation_dir(from);
        if !source.exists() {
            return Err(Error::NotFound);
        }
        fs::rename(source, target)?;
        Ok(())
    }

    pub fn remove(&self, path: &str) -> Result<()> {
        let dir = self.operation_dir(path);
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn find_commit<'a>(repo: &'a Repository, commit_hash: &str) -> Result<Commit<'a>> {
    let oid = Oid::from_str(commit_hash).map_err(|_| Error::NotFound)?;
    repo.find_commit(oid).map_err(|e| {
        if e.code() == ErrorCode::NotFound {
            Error::NotFound
        } else {
            Error::from(e)
        }
    })
}

fn document_at(repo: &Repository, commit: &Commit<'_>) -> Result<String> {
    let tree = commit.tree()?;
    let entry = tree
        .get_path(Path::new(DOCUMENT_FILE))
        .map_err(|_| Error::NotFound)?;
    let blob = entry.to_object(repo)?.peel_to_blob()?;
    String::from_utf8(blob.content().to_vec())
        .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

fn commit_document(repo: &Repository, message: &str, author: Author<'_>) -> Result<Oid> {
    let mut index = repo.index()?;
    index.add_path(Path::new(DOCUMENT_FILE))?;
    index.write()?;

    let tree = repo.find_tree(index.write_tree()?)?;
    let signature = author.signature()?;

    let parent = match repo.head() {
        Ok(head) => Some(head.peel_to_commit()?),
        Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => None,
        Err(e) => return Err(e.into()),
    };
    let parents: Vec<&Commit<'_>> = parent.iter().collect();

    let oid = repo.commit(
        Some("HEAD"),
        &signature,
        &signature,
        message,
        &tree,
        &parents,
    )?;
    Ok(oid)
}
