//! Tipos de dados das amostras do monitor de potência.
//!
//! Uma [`Sample`] é uma leitura do ADC com o instante monotônico em que foi
//! capturada. Depois de criada ela não muda.

use serde::{Deserialize, Serialize};

/// Nanossegundos por segundo.
pub const NANOS_PER_SEC: u32 = 1_000_000_000;

/// Máscara dos 12 bits úteis de uma leitura do ADC.
pub const RAW_MASK: u16 = 0x0FFF;

// ──────────────────────────────────────────────
// Timestamp
// ──────────────────────────────────────────────

/// Instante do relógio monotônico, com a largura usada no fio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    /// Segundos (truncados para 32 bits)
    pub secs: u32,
    /// Nanossegundos dentro do segundo (0..1e9)
    pub nanos: u32,
}

impl Timestamp {
    pub const fn new(secs: u32, nanos: u32) -> Self {
        Self { secs, nanos }
    }

    /// Segundos como número real, usado na linha de saída.
    pub fn as_secs_f64(&self) -> f64 {
        f64::from(self.secs) + f64::from(self.nanos) / f64::from(NANOS_PER_SEC)
    }
}

// ──────────────────────────────────────────────
// Sample
// ──────────────────────────────────────────────

/// Uma observação do sensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: Timestamp,
    /// Leitura bruta de 12 bits num campo de 16 (4 bits superiores zerados)
    pub raw_reading: u16,
}

impl Sample {
    pub const fn new(timestamp: Timestamp, raw_reading: u16) -> Self {
        Self {
            timestamp,
            raw_reading,
        }
    }

    /// Monta uma amostra a partir dos dois bytes lidos do ADC.
    ///
    /// O conversor entrega a leitura alinhada à esquerda: `((b0 << 8) | b1) >> 4`.
    pub fn from_adc_bytes(timestamp: Timestamp, bytes: [u8; 2]) -> Self {
        let word = u16::from_be_bytes(bytes);
        Self::new(timestamp, (word >> 4) & RAW_MASK)
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_as_seconds() {
        let ts = Timestamp::new(12, 500_000_000);
        assert_eq!(ts.as_secs_f64(), 12.5);
        assert_eq!(Timestamp::default().as_secs_f64(), 0.0);
    }

    #[test]
    fn adc_bytes_are_left_aligned() {
        let ts = Timestamp::new(1, 2);
        assert_eq!(Sample::from_adc_bytes(ts, [0xFF, 0xF0]).raw_reading, 4095);
        assert_eq!(Sample::from_adc_bytes(ts, [0x12, 0x30]).raw_reading, 0x123);
        // Nibble inferior é descartado
        assert_eq!(Sample::from_adc_bytes(ts, [0x00, 0x1F]).raw_reading, 0x001);
    }

    #[test]
    fn raw_reading_never_exceeds_twelve_bits() {
        let s = Sample::from_adc_bytes(Timestamp::default(), [0xFF, 0xFF]);
        assert_eq!(s.raw_reading & !RAW_MASK, 0);
    }
}
