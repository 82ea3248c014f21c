//! A Markdown file on disk mirrored as a `DocumentStore`.
//!
//! The in-memory text is what the sync session sees. `refresh` pulls in
//! edits made to the file by other programs; `flush` writes remote updates
//! back out, unless the file changed on disk since it was last read.

use std::io;
use std::path::{Path, PathBuf};

use quire_editor_core::DocumentStore;
use tracing::debug;

pub struct FileDocument {
    path: PathBuf,
    text: String,
    /// File contents as of the last read or write.
    on_disk: String,
    dirty: bool,
}

async fn read_or_empty(path: &Path) -> io::Result<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e),
    }
}

impl FileDocument {
    /// Read `path`. A missing file starts out empty.
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let text = read_or_empty(&path).await?;
        Ok(Self {
            path,
            on_disk: text.clone(),
            text,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unwritten remote changes pending.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Re-read the file. Returns whether the text changed.
    ///
    /// Skipped while a remote change is still unwritten, so it is not
    /// clobbered by the stale file.
    pub async fn refresh(&mut self) -> io::Result<bool> {
        if self.dirty {
            return Ok(false);
        }
        let text = tokio::fs::read_to_string(&self.path).await?;
        if text == self.text {
            return Ok(false);
        }
        debug!(path = %self.path.display(), "file changed on disk");
        self.on_disk = text.clone();
        self.text = text;
        Ok(true)
    }

    /// Write pending remote changes.
    ///
    /// Returns `false` without writing when the file was edited after it was
    /// last read. The edited text then replaces the pending change, so the
    /// caller should send it as a local edit.
    pub async fn flush(&mut self) -> io::Result<bool> {
        if !self.dirty {
            return Ok(true);
        }
        let current = read_or_empty(&self.path).await?;
        self.dirty = false;
        if current != self.on_disk {
            debug!(path = %self.path.display(), "file edited before remote change was written");
            self.on_disk = current.clone();
            self.text = current;
            return Ok(false);
        }
        tokio::fs::write(&self.path, &self.text).await?;
        self.on_disk = self.text.clone();
        Ok(true)
    }
}

impl DocumentStore for FileDocument {
    fn text(&self) -> String {
        self.text.clone()
    }

    // A file has no cursor to carry over.
    fn set_text(&mut self, text: &str, _preserve_cursor: bool) {
        if self.text != text {
            self.text = text.to_owned();
            self.dirty = true;
        }
    }
}
