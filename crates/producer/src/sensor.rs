//! Driver do ADC no barramento I2C (`/dev/i2c-N`).
//!
//! Só o necessário para o monitor: seleciona o escravo com `I2C_SLAVE`,
//! escreve o byte de configuração uma vez e depois lê dois bytes por amostra.

use powermon_core::source::{SampleSource, SensorError};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;
use tracing::{debug, info};

/// `linux/i2c-dev.h`
const I2C_SLAVE: u32 = 0x0703;

/// ADC de 12 bits acessado por `/dev/i2c-N`.
pub struct I2cAdc {
    file: File,
    address: u16,
}

impl I2cAdc {
    /// Abre o barramento e seleciona o dispositivo.
    pub fn open(path: &str, address: u16) -> Result<Self, SensorError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| SensorError::Open {
                path: path.to_string(),
                source,
            })?;

        // SAFETY: o fd é válido enquanto `file` existir, e I2C_SLAVE recebe o
        // endereço por valor; nenhum ponteiro é passado ao kernel.
        let rc = unsafe {
            libc::ioctl(
                file.as_raw_fd(),
                I2C_SLAVE as _,
                libc::c_ulong::from(address),
            )
        };
        if rc < 0 {
            return Err(SensorError::Address {
                address,
                source: std::io::Error::last_os_error(),
            });
        }

        info!("ADC 0x{address:02X} em {path}");
        Ok(Self { file, address })
    }

    /// Escreve o byte de configuração do conversor.
    pub fn configure(&mut self, command: u8) -> Result<(), SensorError> {
        self.file.write_all(&[command]).map_err(SensorError::Write)?;
        debug!("ADC 0x{:02X} configurado com 0x{command:02X}", self.address);
        Ok(())
    }
}

impl SampleSource for I2cAdc {
    fn read_adc(&mut self) -> Result<[u8; 2], SensorError> {
        let mut buf = [0u8; 2];
        let got = self.file.read(&mut buf).map_err(SensorError::Read)?;
        if got != buf.len() {
            return Err(SensorError::ShortRead {
                got,
                expected: buf.len(),
            });
        }
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_bus_is_an_open_error() {
        let err = I2cAdc::open("/dev/powermon-no-such-bus", 0x30).err().unwrap();
        assert!(matches!(err, SensorError::Open { .. }));
        assert!(err.to_string().contains("/dev/powermon-no-such-bus"));
    }
}
