//! Script File Writer
//!
//! Streams composed lines into a temporary sibling of the target script and
//! promotes it with a rename on [`ScriptWriter::finish`]. A writer dropped or
//! cancelled before that leaves the target untouched.

use super::action::ScriptItem;
use super::composer::Composer;
use super::{GenerationConfig, WriteMode};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

const HEADER: &str = "function test()\n";
const FOOTER: &str = "end\n\ntest()\n";

/// Indentation level of generated lines inside `test()`
const BODY_LEVEL: usize = 1;

/// Writes one recording into a Lua script
pub struct ScriptWriter {
    target: PathBuf,
    temp_path: PathBuf,
    out: Option<BufWriter<File>>,
    composer: Composer,
    /// Original lines after the insertion point (append mode)
    tail: String,
    mode: WriteMode,
    items: usize,
    lines_written: usize,
}

impl ScriptWriter {
    /// Validate the destination and open the temporary file.
    ///
    /// Fails before anything is generated if the path is empty, is not a
    /// `.lua` file, its directory is missing, or (append mode) the file is
    /// missing or shorter than `append_line`.
    pub fn create(config: &GenerationConfig) -> crate::Result<Self> {
        let target = config.script_path.clone();
        validate_target(&target)?;

        let (head, tail) = match config.write_mode {
            WriteMode::New => (HEADER.to_string(), String::new()),
            WriteMode::Append => {
                if !target.is_file() {
                    return Err(crate::Error::Script(format!(
                        "cannot append to '{}': file does not exist",
                        target.display()
                    )));
                }
                let original = fs::read_to_string(&target)?;
                split_at_line(&original, config.append_line)?
            }
        };

        let temp_path = temp_sibling(&target);
        let out = BufWriter::new(File::create(&temp_path)?);
        debug!(
            path = %target.display(),
            temp = %temp_path.display(),
            mode = ?config.write_mode,
            "Opened script writer"
        );

        // Built before the head is written so a failed write is discarded on drop
        let mut writer = Self {
            target,
            temp_path,
            out: Some(out),
            composer: Composer::new(config, BODY_LEVEL),
            tail,
            mode: config.write_mode,
            items: 0,
            lines_written: 0,
        };
        writer.write_head(&head)?;
        Ok(writer)
    }

    fn write_head(&mut self, head: &str) -> crate::Result<()> {
        let Some(out) = self.out.as_mut() else {
            return Err(crate::Error::Script("script writer already closed".to_string()));
        };
        out.write_all(head.as_bytes())?;
        if !head.is_empty() && !head.ends_with('\n') {
            out.write_all(b"\n")?;
        }
        Ok(())
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Number of items pushed
    pub fn item_count(&self) -> usize {
        self.items
    }

    /// Generated lines written to the temporary file so far
    pub fn lines_written(&self) -> usize {
        self.lines_written
    }

    pub fn push(&mut self, item: ScriptItem) -> crate::Result<()> {
        self.items += 1;
        self.composer.push(item);
        let lines = self.composer.drain();
        self.write_lines(&lines)
    }

    pub fn extend(&mut self, items: impl IntoIterator<Item = ScriptItem>) -> crate::Result<()> {
        for item in items {
            self.push(item)?;
        }
        Ok(())
    }

    /// Flush pending lines, write the rest of the file and replace the target
    pub fn finish(mut self) -> crate::Result<PathBuf> {
        let lines = self.composer.finish();
        self.write_lines(&lines)?;

        let mut out = self
            .out
            .take()
            .ok_or_else(|| crate::Error::Script("script writer already closed".to_string()))?;
        match self.mode {
            WriteMode::New => out.write_all(FOOTER.as_bytes())?,
            WriteMode::Append => out.write_all(self.tail.as_bytes())?,
        }
        out.flush()?;
        drop(out);

        fs::rename(&self.temp_path, &self.target)?;
        info!(
            path = %self.target.display(),
            items = self.items,
            lines = self.lines_written,
            "Script written"
        );
        Ok(self.target.clone())
    }

    /// Discard everything generated; the target keeps its previous content
    pub fn cancel(mut self) {
        self.discard();
    }

    fn write_lines(&mut self, lines: &[String]) -> crate::Result<()> {
        let Some(out) = self.out.as_mut() else {
            return Err(crate::Error::Script("script writer already closed".to_string()));
        };
        for line in lines {
            out.write_all(line.as_bytes())?;
            out.write_all(b"\n")?;
        }
        self.lines_written += lines.len();
        Ok(())
    }

    fn discard(&mut self) {
        if self.out.take().is_some() {
            if let Err(e) = fs::remove_file(&self.temp_path) {
                warn!(temp = %self.temp_path.display(), error = %e, "Failed to remove temporary script");
            } else {
                debug!(path = %self.target.display(), "Discarded partial script");
            }
        }
    }
}

impl Drop for ScriptWriter {
    fn drop(&mut self) {
        self.discard();
    }
}

fn validate_target(path: &Path) -> crate::Result<()> {
    if path.as_os_str().is_empty() {
        return Err(crate::Error::Script("script path is empty".to_string()));
    }
    if path.extension().and_then(|e| e.to_str()) != Some("lua") {
        return Err(crate::Error::Script(format!(
            "script '{}' must have the .lua extension",
            path.display()
        )));
    }
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.is_dir() => {
            Err(crate::Error::Script(format!(
                "directory '{}' does not exist",
                dir.display()
            )))
        }
        _ => Ok(()),
    }
}

/// Split `text` after its first `n` lines, keeping line endings intact
fn split_at_line(text: &str, n: usize) -> crate::Result<(String, String)> {
    let count = text.split_inclusive('\n').count();
    if n > count {
        return Err(crate::Error::Script(format!(
            "append line {} is past the end of the script ({} lines)",
            n, count
        )));
    }
    let offset: usize = text.split_inclusive('\n').take(n).map(str::len).sum();
    Ok((text[..offset].to_string(), text[offset..].to_string()))
}

fn temp_sibling(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()))
}
