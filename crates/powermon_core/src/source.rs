//! Fontes de leituras brutas do sensor.

use std::io;
use std::time::Duration;

/// Erros de leitura do sensor.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("Falha ao abrir {path}: {source}")]
    Open { path: String, source: io::Error },

    #[error("Falha ao selecionar o dispositivo 0x{address:02X}: {source}")]
    Address { address: u16, source: io::Error },

    #[error("Falha ao escrever no barramento: {0}")]
    Write(io::Error),

    #[error("Leitura curta do barramento: {got} de {expected} bytes")]
    ShortRead { got: usize, expected: usize },

    #[error("Falha ao ler do barramento: {0}")]
    Read(io::Error),
}

/// Algo que entrega leituras do ADC, dois bytes por vez.
pub trait SampleSource {
    /// Bloqueia até a próxima leitura.
    fn read_adc(&mut self) -> Result<[u8; 2], SensorError>;
}

/// Dente de serra determinístico de 12 bits, para rodar sem hardware.
#[derive(Debug, Clone, Default)]
pub struct SyntheticSource {
    next: u16,
    step: u16,
    /// Pausa por leitura, imitando a taxa de conversão do ADC
    interval: Duration,
}

impl SyntheticSource {
    pub fn new(step: u16) -> Self {
        Self {
            next: 0,
            step: step.max(1),
            interval: Duration::ZERO,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

impl SampleSource for SyntheticSource {
    fn read_adc(&mut self) -> Result<[u8; 2], SensorError> {
        if !self.interval.is_zero() {
            std::thread::sleep(self.interval);
        }
        let value = self.next;
        self.next = self.next.wrapping_add(self.step.max(1)) & crate::types::RAW_MASK;
        // Mesmo alinhamento do conversor: 12 bits à esquerda.
        Ok((value << 4).to_be_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Sample, Timestamp};

    #[test]
    fn synthetic_wraps_at_twelve_bits() {
        let mut source = SyntheticSource::new(4000);
        let readings: Vec<u16> = (0..3)
            .map(|_| {
                Sample::from_adc_bytes(Timestamp::default(), source.read_adc().unwrap()).raw_reading
            })
            .collect();
        assert_eq!(readings, vec![0, 4000, 3904]);
    }
}
