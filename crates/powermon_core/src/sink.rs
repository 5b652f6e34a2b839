//! Destinos das amostras decodificadas.
//!
//! - [`StreamSink`]: escreve cada lote assim que chega e faz flush.
//! - [`RotatingFileSink`]: acumula `samples_per_file` linhas e grava um
//!   arquivo novo por cota atingida.

use crate::calibration::Calibration;
use crate::types::Sample;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Erros de escrita.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Erro de escrita: {0}")]
    Io(#[from] io::Error),

    #[error("Falha ao gravar {path}: {source}")]
    File { path: PathBuf, source: io::Error },
}

/// Consome lotes de amostras já decodificadas.
pub trait SampleSink {
    fn write_batch(&mut self, samples: &[Sample]) -> Result<(), SinkError>;

    /// Descarrega o que estiver pendente. Chamado no shutdown.
    fn finish(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Arquivos completos gravados até agora.
    fn files_written(&self) -> u64 {
        0
    }
}

// ──────────────────────────────────────────────
// Stream
// ──────────────────────────────────────────────

/// Escrita imediata com flush por lote.
pub struct StreamSink<W: Write> {
    writer: W,
    calibration: Calibration,
    line: String,
}

impl<W: Write> StreamSink<W> {
    pub fn new(writer: W, calibration: Calibration) -> Self {
        Self {
            writer,
            calibration,
            line: String::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl StreamSink<File> {
    /// Abre `path` em modo append.
    pub fn append_to(path: &Path, calibration: Calibration) -> Result<Self, SinkError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| SinkError::File {
                path: path.to_path_buf(),
                source,
            })?;
        info!("Gravando amostras em {}", path.display());
        Ok(Self::new(file, calibration))
    }
}

impl<W: Write> SampleSink for StreamSink<W> {
    fn write_batch(&mut self, samples: &[Sample]) -> Result<(), SinkError> {
        self.line.clear();
        for sample in samples {
            self.calibration.write_line(&mut self.line, sample);
        }
        self.writer.write_all(self.line.as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

// ──────────────────────────────────────────────
// Rotação
// ──────────────────────────────────────────────

/// Acumula linhas até a cota e grava um arquivo por cota.
///
/// `dados.txt` vira `dados-000000.txt`, `dados-000001.txt`, …
pub struct RotatingFileSink {
    base: PathBuf,
    samples_per_file: usize,
    calibration: Calibration,
    buffer: String,
    buffered: usize,
    sequence: u64,
}

impl RotatingFileSink {
    pub fn new(base: impl Into<PathBuf>, samples_per_file: usize, calibration: Calibration) -> Self {
        Self {
            base: base.into(),
            samples_per_file: samples_per_file.max(1),
            calibration,
            buffer: String::new(),
            buffered: 0,
            sequence: 0,
        }
    }

    /// Amostras no buffer ainda não gravadas.
    pub fn buffered(&self) -> usize {
        self.buffered
    }

    /// Caminho do arquivo de número `sequence`.
    pub fn file_path(&self, sequence: u64) -> PathBuf {
        let stem = self
            .base
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "samples".into());
        let name = match self.base.extension() {
            Some(ext) => format!("{stem}-{sequence:06}.{}", ext.to_string_lossy()),
            None => format!("{stem}-{sequence:06}"),
        };
        self.base.with_file_name(name)
    }

    fn rotate(&mut self) -> Result<(), SinkError> {
        let path = self.file_path(self.sequence);
        let write = |path: &Path, data: &[u8]| -> io::Result<()> {
            let mut file = File::create(path)?;
            file.write_all(data)?;
            file.sync_all()
        };
        write(&path, self.buffer.as_bytes()).map_err(|source| SinkError::File {
            path: path.clone(),
            source,
        })?;

        info!("{} amostras gravadas em {}", self.buffered, path.display());
        self.sequence += 1;
        self.buffer.clear();
        self.buffered = 0;
        Ok(())
    }
}

impl SampleSink for RotatingFileSink {
    fn write_batch(&mut self, samples: &[Sample]) -> Result<(), SinkError> {
        for sample in samples {
            self.calibration.write_line(&mut self.buffer, sample);
            self.buffered += 1;
            if self.buffered == self.samples_per_file {
                self.rotate()?;
            }
        }
        debug!("Buffer de rotação: {}/{}", self.buffered, self.samples_per_file);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        if self.buffered > 0 {
            info!("Gravando buffer parcial ({} amostras)", self.buffered);
            self.rotate()?;
        }
        Ok(())
    }

    fn files_written(&self) -> u64 {
        self.sequence
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timestamp;
    use std::fs;

    fn samples(n: usize) -> Vec<Sample> {
        (0..n)
            .map(|i| Sample::new(Timestamp::new(i as u32, 0), (i % 4096) as u16))
            .collect()
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("powermon-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn stream_writes_one_line_per_sample() {
        let mut sink = StreamSink::new(Vec::new(), Calibration::default());
        sink.write_batch(&samples(3)).unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "0.000000 0.0000");
        assert!(lines[2].starts_with("2.000000 "));
    }

    #[test]
    fn rotation_names() {
        let sink = RotatingFileSink::new("/tmp/out/power.txt", 64, Calibration::default());
        assert_eq!(sink.file_path(0), PathBuf::from("/tmp/out/power-000000.txt"));
        assert_eq!(sink.file_path(12), PathBuf::from("/tmp/out/power-000012.txt"));

        let bare = RotatingFileSink::new("/tmp/out/power", 64, Calibration::default());
        assert_eq!(bare.file_path(1), PathBuf::from("/tmp/out/power-000001"));
    }

    #[test]
    fn rotates_exactly_at_quota() {
        let dir = temp_dir("rotate");
        let base = dir.join("power.txt");
        let mut sink = RotatingFileSink::new(&base, 128, Calibration::default());

        sink.write_batch(&samples(64)).unwrap();
        assert_eq!(sink.buffered(), 64);
        assert_eq!(sink.files_written(), 0);
        assert!(!sink.file_path(0).exists());

        sink.write_batch(&samples(64)).unwrap();
        assert_eq!(sink.buffered(), 0);
        assert_eq!(sink.files_written(), 1);

        let content = fs::read_to_string(sink.file_path(0)).unwrap();
        assert_eq!(content.lines().count(), 128);
        assert!(!sink.file_path(1).exists());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn finish_flushes_partial_buffer() {
        let dir = temp_dir("partial");
        let mut sink = RotatingFileSink::new(dir.join("power.txt"), 128, Calibration::default());

        sink.write_batch(&samples(64)).unwrap();
        sink.finish().unwrap();
        assert_eq!(sink.files_written(), 1);
        assert_eq!(
            fs::read_to_string(sink.file_path(0)).unwrap().lines().count(),
            64
        );

        // Nada pendente: não cria arquivo vazio
        sink.finish().unwrap();
        assert_eq!(sink.files_written(), 1);

        fs::remove_dir_all(&dir).unwrap();
    }
}
