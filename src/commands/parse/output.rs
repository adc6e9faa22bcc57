use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::util::ensure_directory;

/// The intermediate zip archive. An existing archive is appended to.
pub struct OutputArchive {
    path: PathBuf,
    writer: ZipWriter<File>,
    members: HashSet<String>,
}

impl OutputArchive {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            ensure_directory(parent)?;
        }

        if !path.exists() {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            return Ok(Self {
                path: path.to_path_buf(),
                writer: ZipWriter::new(file),
                members: HashSet::new(),
            });
        }

        let members = {
            let file = File::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            let archive = ZipArchive::new(file)
                .with_context(|| format!("failed to read zip archive {}", path.display()))?;
            archive.file_names().map(str::to_string).collect()
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("failed to open {} for append", path.display()))?;
        let writer = ZipWriter::new_append(file)
            .with_context(|| format!("failed to append to {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            members,
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.contains(name)
    }

    pub fn write_member(&mut self, name: &str, text: &str) -> Result<()> {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(text.len() as u64 >= u64::from(u32::MAX));

        self.writer
            .start_file(name, options)
            .with_context(|| format!("failed to start member {name} in {}", self.path.display()))?;
        self.writer
            .write_all(text.as_bytes())
            .with_context(|| format!("failed to write member {name} to {}", self.path.display()))?;
        self.members.insert(name.to_string());
        Ok(())
    }

    pub fn finish(self) -> Result<()> {
        self.writer
            .finish()
            .with_context(|| format!("failed to finalize {}", self.path.display()))?;
        Ok(())
    }
}

/// `name;kind;message` lines, CRLF terminated, appended across runs.
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self, name: &str, kind: &str, message: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open error log {}", self.path.display()))?;
        let line = format!("{name};{kind};{}\r\n", single_line(message));
        file.write_all(line.as_bytes())
            .with_context(|| format!("failed to write error log {}", self.path.display()))?;
        Ok(())
    }
}

fn single_line(message: &str) -> String {
    message.split_whitespace().collect::<Vec<_>>().join(" ")
}
