//! Conversão da leitura bruta para unidade física e formatação da saída.

use crate::types::Sample;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Divisor de fundo de escala de um ADC de 12 bits.
pub const ADC_RESOLUTION: f64 = 4096.0;

/// Fundo de escala padrão do sensor.
pub const DEFAULT_FULL_SCALE: f64 = 105.84;

/// Ganho padrão do estágio de medição.
pub const DEFAULT_GAIN: f64 = 0.1;

/// Constantes de calibração do hardware.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub full_scale: f64,
    pub gain: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            full_scale: DEFAULT_FULL_SCALE,
            gain: DEFAULT_GAIN,
        }
    }
}

impl Calibration {
    pub const fn new(full_scale: f64, gain: f64) -> Self {
        Self { full_scale, gain }
    }

    /// `(full_scale / 4096) * raw / gain`
    pub fn to_physical(&self, raw_reading: u16) -> f64 {
        (self.full_scale / ADC_RESOLUTION) * f64::from(raw_reading) / self.gain
    }

    /// Acrescenta a linha `<segundos> <valor>` de uma amostra em `out`.
    pub fn write_line(&self, out: &mut String, sample: &Sample) {
        // Escrever numa String não falha.
        let _ = writeln!(
            out,
            "{:.6} {:.4}",
            sample.timestamp.as_secs_f64(),
            self.to_physical(sample.raw_reading)
        );
    }

    pub fn format_line(&self, sample: &Sample) -> String {
        let mut line = String::with_capacity(32);
        self.write_line(&mut line, sample);
        line
    }
}
