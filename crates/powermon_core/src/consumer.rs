//! Loop do consumidor: datagrama → amostras → unidade física → destino.
//!
//! O mesmo loop atende os dois modos de saída; a diferença fica toda no
//! [`SampleSink`] escolhido (stream ou rotação de arquivos).

use crate::channel::{ChannelError, DatagramSource};
use crate::protocol::{BATCH_BYTES, ProtocolError, SAMPLES_PER_BATCH, decode_batch};
use crate::sink::{SampleSink, SinkError};
use crate::types::Sample;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// O que fazer com um datagrama de tamanho errado.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MismatchPolicy {
    /// Descarta, avisa e continua
    #[default]
    Discard,
    /// Interrompe o loop com erro
    Abort,
}

/// Erros do consumidor.
#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Resultado de uma volta do loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Accepted,
    Discarded,
    /// Timeout sem datagrama
    Idle,
}

/// Contadores do consumidor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub batches: u64,
    pub samples: u64,
    pub discarded: u64,
}

pub struct Consumer<R, K> {
    transport: R,
    sink: K,
    policy: MismatchPolicy,
    stats: ConsumerStats,
    decoded: Vec<Sample>,
}

impl<R, K> Consumer<R, K>
where
    R: DatagramSource,
    K: SampleSink,
{
    pub fn new(transport: R, sink: K, policy: MismatchPolicy) -> Self {
        Self {
            transport,
            sink,
            policy,
            stats: ConsumerStats::default(),
            decoded: Vec::with_capacity(SAMPLES_PER_BATCH),
        }
    }

    pub fn stats(&self) -> ConsumerStats {
        self.stats
    }

    /// Devolve transporte e destino para serem fechados pelo chamador.
    pub fn into_parts(self) -> (R, K) {
        (self.transport, self.sink)
    }

    fn reject(&mut self, expected: usize, actual: usize) -> Result<Outcome, ConsumerError> {
        self.stats.discarded += 1;
        match self.policy {
            MismatchPolicy::Discard => {
                warn!(
                    "Datagrama descartado: {actual} bytes (esperado {expected}) – total {}",
                    self.stats.discarded
                );
                Ok(Outcome::Discarded)
            }
            MismatchPolicy::Abort => Err(ProtocolError::LengthMismatch { expected, actual }.into()),
        }
    }

    /// Recebe e processa no máximo um datagrama.
    pub fn poll(&mut self) -> Result<Outcome, ConsumerError> {
        let bytes = match self.transport.recv_datagram(BATCH_BYTES) {
            Ok(bytes) => bytes,
            Err(e) if e.is_timeout() => return Ok(Outcome::Idle),
            Err(ChannelError::LengthMismatch { expected, actual }) => {
                return self.reject(expected, actual);
            }
            Err(e) => return Err(e.into()),
        };

        if bytes.len() != BATCH_BYTES {
            let actual = bytes.len();
            return self.reject(BATCH_BYTES, actual);
        }
        self.decoded.clear();
        self.decoded.extend(decode_batch(bytes)?);

        self.sink.write_batch(&self.decoded)?;
        self.stats.batches += 1;
        self.stats.samples += self.decoded.len() as u64;
        debug!("Lote #{} gravado", self.stats.batches);
        Ok(Outcome::Accepted)
    }

    /// Roda até `running` virar false ou até um erro fatal.
    pub fn run(&mut self, running: &AtomicBool) -> Result<ConsumerStats, ConsumerError> {
        while running.load(Ordering::Relaxed) {
            self.poll()?;
        }
        info!(
            "Consumidor parado: {} lotes, {} amostras, {} descartados",
            self.stats.batches, self.stats.samples, self.stats.discarded
        );
        Ok(self.stats)
    }

    /// Descarrega o destino.
    pub fn finish(&mut self) -> Result<(), ConsumerError> {
        self.sink.finish()?;
        Ok(())
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
