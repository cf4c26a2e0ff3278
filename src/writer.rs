//! The collaborator interface used by code generators to emit files: one
//! file per namespace, opened and closed around line writes. Implementors
//! must release the open file on every exit path.

use std::collections::HashMap;

use crate::error::{ConcertoError, ConcertoResult};

/// Sink for generated files.
pub trait FileWriter {
    /// Starts a new file. Fails if a file is already open.
    fn open_file(&mut self, name: &str) -> ConcertoResult<()>;

    /// Appends an indented line to the open file.
    fn write_line(&mut self, indent: usize, text: &str) -> ConcertoResult<()>;

    /// Queues a line emitted before all regular lines of the open file.
    fn write_before_line(&mut self, text: &str) -> ConcertoResult<()>;

    /// Flushes and releases the open file.
    fn close_file(&mut self) -> ConcertoResult<()>;
}

/// A [`FileWriter`] that accumulates files in memory; used by tests and
/// dry runs.
#[derive(Default)]
pub struct InMemoryFileWriter {
    files: HashMap<String, String>,
    current: Option<OpenFile>,
}

struct OpenFile {
    name: String,
    before_lines: Vec<String>,
    lines: Vec<String>,
}

impl InMemoryFileWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contents of a closed file.
    pub fn file(&self, name: &str) -> Option<&str> {
        self.files.get(name).map(String::as_str)
    }

    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    fn open_mut(&mut self) -> ConcertoResult<&mut OpenFile> {
        self.current.as_mut().ok_or_else(|| ConcertoError::Io(
            std::io::Error::new(std::io::ErrorKind::Other, "no file is open"),
        ))
    }
}

impl FileWriter for InMemoryFileWriter {
    fn open_file(&mut self, name: &str) -> ConcertoResult<()> {
        if self.current.is_some() {
            return Err(ConcertoError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "a file is already open",
            )));
        }
        self.current = Some(OpenFile {
            name: name.to_string(),
            before_lines: Vec::new(),
            lines: Vec::new(),
        });
        Ok(())
    }

    fn write_line(&mut self, indent: usize, text: &str) -> ConcertoResult<()> {
        let file = self.open_mut()?;
        file.lines.push(format!("{}{}", "    ".repeat(indent), text));
        Ok(())
    }

    fn write_before_line(&mut self, text: &str) -> ConcertoResult<()> {
        let file = self.open_mut()?;
        file.before_lines.push(text.to_string());
        Ok(())
    }

    fn close_file(&mut self) -> ConcertoResult<()> {
        let file = self.current.take().ok_or_else(|| ConcertoError::Io(
            std::io::Error::new(std::io::ErrorKind::Other, "no file is open"),
        ))?;
        let mut contents = String::new();
        for line in file.before_lines.iter().chain(file.lines.iter()) {
            contents.push_str(line);
            contents.push('\n');
        }
        self.files.insert(file.name, contents);
        Ok(())
    }
}
