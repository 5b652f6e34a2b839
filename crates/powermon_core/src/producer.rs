//! Loop do produtor: sensor → lote → datagrama.
//!
//! Lê uma amostra, marca o tempo logo depois da leitura, acumula até o lote
//! encher, serializa e envia uma única vez. Não há retry: qualquer erro de
//! sensor ou de envio encerra o loop e volta para o chamador.

use crate::batch::{BatchBuffer, BatchError};
use crate::channel::{ChannelError, DatagramSink};
use crate::clock::Clock;
use crate::protocol::BATCH_BYTES;
use crate::source::{SampleSource, SensorError};
use crate::types::Sample;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Erros do produtor.
#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
    #[error(transparent)]
    Sensor(#[from] SensorError),

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("Falha ao ler o relógio: {0}")]
    Clock(#[source] io::Error),
}

pub struct Producer<S, C, T> {
    source: S,
    clock: C,
    transport: T,
    batch: BatchBuffer,
    wire: [u8; BATCH_BYTES],
    batches_sent: u64,
}

impl<S, C, T> Producer<S, C, T>
where
    S: SampleSource,
    C: Clock,
    T: DatagramSink,
{
    pub fn new(source: S, clock: C, transport: T) -> Self {
        Self {
            source,
            clock,
            transport,
            batch: BatchBuffer::new(),
            wire: [0u8; BATCH_BYTES],
            batches_sent: 0,
        }
    }

    pub fn batches_sent(&self) -> u64 {
        self.batches_sent
    }

    /// Devolve o transporte para ser fechado pelo chamador.
    pub fn into_transport(self) -> T {
        self.transport
    }

    fn capture_batch(&mut self) -> Result<(), ProducerError> {
        while !self.batch.is_full() {
            let bytes = self.source.read_adc()?;
            let timestamp = self.clock.now().map_err(ProducerError::Clock)?;
            self.batch.append(Sample::from_adc_bytes(timestamp, bytes))?;
        }
        Ok(())
    }

    /// Captura e transmite exatamente um lote.
    pub fn run_once(&mut self) -> Result<(), ProducerError> {
        self.capture_batch()?;
        self.batch.encode_into(&mut self.wire)?;
        let sent = self.transport.send_datagram(&self.wire);
        self.batch.reset();
        sent?;

        self.batches_sent += 1;
        debug!("Lote #{} enviado ({BATCH_BYTES} bytes)", self.batches_sent);
        Ok(())
    }

    /// Roda até `running` virar false ou até o primeiro erro.
    pub fn run(&mut self, running: &AtomicBool) -> Result<u64, ProducerError> {
        while running.load(Ordering::Relaxed) {
            self.run_once()?;
        }
        info!("Produtor parado após {} lotes", self.batches_sent);
        Ok(self.batches_sent)
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
