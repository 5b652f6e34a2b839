//! # Powermon Core
//!
//! Crate compartilhada entre produtor e consumidor do monitor de potência:
//! formato dos registros no fio, lote de tamanho fixo, canal UDP multicast
//! e os dois loops (sensor → rede → disco).
//!
//! ## Módulos
//! - [`types`] – Timestamp e amostra
//! - [`protocol`] – Registro binário de 10 bytes e validação do lote
//! - [`batch`] – Buffer de lote com capacidade fixa
//! - [`channel`] – Canal multicast (emissor/receptor)
//! - [`producer`] / [`consumer`] – Loops de captura e de gravação
//! - [`calibration`] – Conversão para unidade física e linha de saída
//! - [`sink`] – Saída em stream ou rotação de arquivos
//! - [`source`] / [`clock`] – Leituras do sensor e relógio monotônico
//! - [`config`] – Configuração unificada via TOML
//! - [`shutdown`] – Parada por SIGINT/SIGTERM

pub mod types;
pub mod protocol;
pub mod batch;
pub mod channel;
pub mod calibration;
pub mod sink;
pub mod source;
pub mod clock;
pub mod producer;
pub mod consumer;
pub mod config;
pub mod shutdown;

// Re-exports convenientes
pub use types::{Sample, Timestamp};
pub use protocol::{BATCH_BYTES, RECORD_SIZE, SAMPLES_PER_BATCH, decode_batch, decode_record, encode_record};
pub use batch::BatchBuffer;
pub use channel::{ChannelOptions, MulticastChannel, Role};
pub use config::{AppConfig, ConsumerConfig, OutputMode, ProducerConfig};
pub use consumer::{Consumer, MismatchPolicy};
pub use producer::Producer;
