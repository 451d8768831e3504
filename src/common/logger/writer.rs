use std::{
    fs::{File, OpenOptions},
    io::{self, BufRead, BufReader, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::Mutex;

struct LogFile {
    handle: Option<File>,
    lines_since_trim: u32,
}

/// Line-capped log file.
///
/// Appends through one shared handle and, every `max(max_lines / 10, 50)`
/// lines, rewrites the file keeping only its newest `max_lines` lines.
#[derive(Clone)]
pub struct CircularFileWriter {
    path: Arc<PathBuf>,
    max_lines: usize,
    state: Arc<Mutex<LogFile>>,
}

impl CircularFileWriter {
    pub fn new(path: impl Into<PathBuf>, max_lines: u32) -> Self {
        Self {
            path: Arc::new(path.into()),
            max_lines: max_lines.max(1) as usize,
            state: Arc::new(Mutex::new(LogFile {
                handle: None,
                lines_since_trim: 0,
            })),
        }
    }

    fn trim_interval(&self) -> u32 {
        (self.max_lines as u32 / 10).max(50)
    }

    fn open(path: &Path) -> io::Result<File> {
        OpenOptions::new().create(true).append(true).open(path)
    }

    fn trim(path: &Path, max_lines: usize) -> io::Result<()> {
        let lines = BufReader::new(File::open(path)?)
            .lines()
            .collect::<io::Result<Vec<String>>>()?;
        if lines.len() <= max_lines {
            return Ok(());
        }

        let mut file = File::create(path)?;
        for line in &lines[lines.len() - max_lines..] {
            writeln!(file, "{line}")?;
        }
        file.flush()
    }
}

impl io::Write for CircularFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        if state.handle.is_none() {
            state.handle = Some(Self::open(&self.path)?);
        }
        if let Some(file) = state.handle.as_mut() {
            file.write_all(buf)?;
        }

        state.lines_since_trim += buf.iter().filter(|&&b| b == b'\n').count() as u32;
        if state.lines_since_trim >= self.trim_interval() {
            state.lines_since_trim = 0;
            // reopen after the rewrite so appends land in the new file
            state.handle = None;
            if let Err(e) = Self::trim(&self.path, self.max_lines) {
                eprintln!("Failed to trim log file {}: {e}", self.path.display());
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.state.lock().handle.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CircularFileWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
