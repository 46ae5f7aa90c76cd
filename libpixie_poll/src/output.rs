use byteorder::{LittleEndian, WriteBytesExt};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::config::Config;
use super::constants::{Word, WORD_SIZE_BYTES};
use super::error::SinkError;

/// SpillFileWriter appends raw spill words to run files on disk.
///
/// A file is opened on the first write and rolled over to a new numbered file whenever
/// the next spill would push it past the maximum file size. Words are written as
/// little-endian u32.
#[derive(Debug)]
pub struct SpillFileWriter {
    directory: PathBuf,
    prefix: String,
    run_number: u32,
    max_file_size: u64,
    file_number: u32,
    active: Option<BufWriter<File>>,
    active_path: Option<PathBuf>,
    bytes_in_file: u64,
    total_bytes: u64,
}

impl SpillFileWriter {
    pub fn new(config: &Config) -> Result<Self, SinkError> {
        if !config.output_directory.exists() {
            return Err(SinkError::BadDirectory(config.output_directory.clone()));
        }
        Ok(Self {
            directory: config.output_directory.clone(),
            prefix: config.output_filename.clone(),
            run_number: config.run_number,
            max_file_size: config.max_file_size,
            file_number: 0,
            active: None,
            active_path: None,
            bytes_in_file: 0,
            total_bytes: 0,
        })
    }

    /// Construct the file name for the current file number
    fn file_path(&self) -> PathBuf {
        if self.file_number == 0 {
            self.directory
                .join(format!("{}_{:0>4}.bin", self.prefix, self.run_number))
        } else {
            self.directory.join(format!(
                "{}_{:0>4}-{}.bin",
                self.prefix, self.run_number, self.file_number
            ))
        }
    }

    fn open_next(&mut self) -> Result<(), SinkError> {
        self.close()?;
        let path = self.file_path();
        let file = File::create(&path)?;
        spdlog::info!("Opening output file {}", path.display());
        self.active = Some(BufWriter::new(file));
        self.active_path = Some(path);
        self.bytes_in_file = 0;
        self.file_number += 1;
        Ok(())
    }

    /// Write one spill, returning the number of bytes written
    pub fn write_spill(&mut self, words: &[Word]) -> Result<usize, SinkError> {
        let n_bytes = words.len() * WORD_SIZE_BYTES;
        let would_overflow =
            self.bytes_in_file > 0 && self.bytes_in_file + n_bytes as u64 > self.max_file_size;
        if self.active.is_none() || would_overflow {
            self.open_next()?;
        }

        if let Some(writer) = self.active.as_mut() {
            for word in words {
                writer.write_u32::<LittleEndian>(*word)?;
            }
            writer.flush()?;
        }
        self.bytes_in_file += n_bytes as u64;
        self.total_bytes += n_bytes as u64;
        Ok(n_bytes)
    }

    /// Flush and close the active file, if any
    pub fn close(&mut self) -> Result<(), SinkError> {
        if let Some(mut writer) = self.active.take() {
            writer.flush()?;
            let path = self.active_path.take().unwrap_or_default();
            spdlog::info!(
                "Closed output file {} with {}",
                path.display(),
                human_bytes::human_bytes(self.bytes_in_file as f64)
            );
        }
        Ok(())
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.active_path.as_deref()
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }
}

impl Drop for SpillFileWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            spdlog::error!("Failed to close output file: {e}");
        }
    }
}
