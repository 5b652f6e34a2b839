//! Buffer de lote com capacidade fixa.
//!
//! O lote só sai inteiro: enche em ordem, é serializado de uma vez e depois
//! zerado com [`BatchBuffer::reset`].

use crate::protocol::{BATCH_BYTES, RECORD_SIZE, SAMPLES_PER_BATCH, encode_record};
use crate::types::Sample;

/// Erros do buffer de lote.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
    #[error("Lote cheio ({0} amostras)")]
    CapacityExceeded(usize),

    #[error("Lote incompleto: {len} de {capacity} amostras")]
    Incomplete { len: usize, capacity: usize },
}

/// Exatamente [`SAMPLES_PER_BATCH`] amostras.
#[derive(Debug, Clone)]
pub struct BatchBuffer {
    samples: [Sample; SAMPLES_PER_BATCH],
    len: usize,
}

impl Default for BatchBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchBuffer {
    pub fn new() -> Self {
        Self {
            samples: [Sample::default(); SAMPLES_PER_BATCH],
            len: 0,
        }
    }

    pub const fn capacity(&self) -> usize {
        SAMPLES_PER_BATCH
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Pronto para transmissão.
    pub fn is_full(&self) -> bool {
        self.len == SAMPLES_PER_BATCH
    }

    /// Acrescenta uma amostra. Falha se o lote já está cheio.
    pub fn append(&mut self, sample: Sample) -> Result<(), BatchError> {
        if self.is_full() {
            return Err(BatchError::CapacityExceeded(SAMPLES_PER_BATCH));
        }
        self.samples[self.len] = sample;
        self.len += 1;
        Ok(())
    }

    /// Amostras acumuladas desde o último reset.
    pub fn samples(&self) -> &[Sample] {
        &self.samples[..self.len]
    }

    pub fn reset(&mut self) {
        self.samples = [Sample::default(); SAMPLES_PER_BATCH];
        self.len = 0;
    }

    /// Serializa o lote cheio em `out`, registro após registro.
    ///
    /// Lote parcial nunca é transmitido.
    pub fn encode_into(&self, out: &mut [u8; BATCH_BYTES]) -> Result<(), BatchError> {
        if !self.is_full() {
            return Err(BatchError::Incomplete {
                len: self.len,
                capacity: SAMPLES_PER_BATCH,
            });
        }
        for (chunk, sample) in out.chunks_exact_mut(RECORD_SIZE).zip(self.samples.iter()) {
            chunk.copy_from_slice(&encode_record(sample));
        }
        Ok(())
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
