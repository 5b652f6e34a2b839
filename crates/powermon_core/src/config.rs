//! Configuração unificada via TOML.
//!
//! Um único `config.toml` com as seções `[producer]` e `[consumer]`; todo
//! campo ausente assume o valor padrão.

use crate::calibration::{Calibration, DEFAULT_FULL_SCALE, DEFAULT_GAIN};
use crate::channel::{ChannelOptions, DEFAULT_GROUP, DEFAULT_PORT, DEFAULT_TTL};
use crate::consumer::MismatchPolicy;
use crate::protocol::SAMPLES_PER_BATCH;
use serde::{Deserialize, Serialize};
use std::io;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Bits de controle do ADC.
pub mod adc {
    /// Conversão contínua de corrente
    pub const I_CONT: u8 = 1 << 2;
    /// Faixa estendida de tensão
    pub const VRANGE: u8 = 1 << 4;
}

/// Nome do arquivo de configuração.
pub const CONFIG_FILE: &str = "config.toml";

/// Amostras por arquivo no modo de rotação.
pub const DEFAULT_SAMPLES_PER_FILE: usize = 32768;

/// Configuração do Produtor (placa com o ADC).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    /// Grupo multicast de destino
    pub group: String,
    /// Porta UDP
    pub port: u16,
    /// Hop count dos datagramas
    pub ttl: u32,
    /// Barramento I2C
    pub device: String,
    /// Endereço I2C do ADC
    pub address: u16,
    /// Byte de configuração escrito no ADC na partida
    pub adc_command: u8,
    /// Espera após configurar o ADC (ms)
    pub settle_ms: u64,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            group: DEFAULT_GROUP.to_string(),
            port: DEFAULT_PORT,
            ttl: DEFAULT_TTL,
            device: "/dev/i2c-1".into(),
            address: 0x30,
            adc_command: adc::I_CONT | adc::VRANGE,
            settle_ms: 200,
        }
    }
}

impl ProducerConfig {
    pub fn group_addr(&self) -> Result<Ipv4Addr, String> {
        parse_group(&self.group)
    }

    pub fn channel_options(&self) -> ChannelOptions {
        ChannelOptions {
            ttl: self.ttl,
            ..Default::default()
        }
    }
}

/// Modo de saída do Consumidor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Escreve cada lote assim que chega
    #[default]
    Stream,
    /// Acumula `samples_per_file` amostras por arquivo
    Rotate,
}

/// Configuração do Consumidor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Grupo multicast a escutar
    pub group: String,
    /// Porta UDP
    pub port: u16,
    /// Interface local para o join (vazio = qualquer)
    pub interface: String,
    /// Arquivo de saída (vazio = stdout)
    pub output: String,
    /// "stream" ou "rotate"
    pub mode: OutputMode,
    /// Cota de amostras por arquivo (múltiplo de 64)
    pub samples_per_file: usize,
    /// "discard" ou "abort"
    pub on_length_mismatch: MismatchPolicy,
    /// Fundo de escala do sensor
    pub full_scale: f64,
    /// Ganho do estágio de medição
    pub gain: f64,
    /// Timeout de leitura do socket (ms, > 0: é o que deixa o loop ver o Ctrl-C)
    pub read_timeout_ms: u64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            group: DEFAULT_GROUP.to_string(),
            port: DEFAULT_PORT,
            interface: String::new(),
            output: String::new(),
            mode: OutputMode::Stream,
            samples_per_file: DEFAULT_SAMPLES_PER_FILE,
            on_length_mismatch: MismatchPolicy::Discard,
            full_scale: DEFAULT_FULL_SCALE,
            gain: DEFAULT_GAIN,
            read_timeout_ms: 1000,
        }
    }
}

impl ConsumerConfig {
    pub fn group_addr(&self) -> Result<Ipv4Addr, String> {
        parse_group(&self.group)
    }

    pub fn interface_addr(&self) -> Result<Ipv4Addr, String> {
        if self.interface.is_empty() {
            return Ok(Ipv4Addr::UNSPECIFIED);
        }
        self.interface
            .parse()
            .map_err(|_| format!("Interface inválida: {}", self.interface))
    }

    pub fn output_path(&self) -> Option<PathBuf> {
        (!self.output.is_empty()).then(|| PathBuf::from(&self.output))
    }

    pub fn calibration(&self) -> Calibration {
        Calibration::new(self.full_scale, self.gain)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn channel_options(&self) -> Result<ChannelOptions, String> {
        Ok(ChannelOptions {
            interface: self.interface_addr()?,
            read_timeout: Some(self.read_timeout()),
            ..Default::default()
        })
    }
}

fn parse_group(group: &str) -> Result<Ipv4Addr, String> {
    let addr: Ipv4Addr = group
        .parse()
        .map_err(|_| format!("Grupo multicast inválido: {group}"))?;
    if !addr.is_multicast() {
        return Err(format!("{addr} não é um endereço multicast"));
    }
    Ok(addr)
}

/// Erros de leitura/gravação do `config.toml`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Erro ao ler {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("Erro ao parsear {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Erro ao serializar configuração: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Erro ao gravar {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// Configuração raiz do aplicativo (unifica produtor e consumidor).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub producer: ProducerConfig,
    pub consumer: ConsumerConfig,
}

impl AppConfig {
    /// Lê e interpreta um arquivo TOML, sem fallback.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Carrega o arquivo; ausente ou inválido vira o padrão (com aviso).
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match Self::from_file(path) {
                Ok(config) => {
                    info!("Configuração carregada de {}", path.display());
                    return config;
                }
                Err(e) => warn!("{e}"),
            }
        }

        info!("Usando configuração padrão");
        AppConfig::default()
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// `config.toml` ao lado do executável (ou no diretório atual).
    pub fn default_path() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(CONFIG_FILE)))
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE))
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let p = &self.producer;
        let c = &self.consumer;

        if let Err(e) = p.group_addr() {
            errors.push(format!("producer: {e}"));
        }
        if p.port == 0 {
            errors.push("Porta do produtor não pode ser 0".into());
        }
        if p.ttl == 0 || p.ttl > 255 {
            errors.push(format!("TTL inválido: {} (1–255)", p.ttl));
        }
        if p.device.is_empty() {
            errors.push("Barramento I2C não definido".into());
        }
        if p.address > 0x7F {
            errors.push(format!("Endereço I2C inválido: 0x{:X} (7 bits)", p.address));
        }

        if let Err(e) = c.group_addr() {
            errors.push(format!("consumer: {e}"));
        }
        if let Err(e) = c.interface_addr() {
            errors.push(e);
        }
        if c.port == 0 {
            errors.push("Porta do consumidor não pode ser 0".into());
        }
        if c.samples_per_file == 0 || c.samples_per_file % SAMPLES_PER_BATCH != 0 {
            errors.push(format!(
                "samples_per_file inválido: {} (múltiplo positivo de {SAMPLES_PER_BATCH})",
                c.samples_per_file
            ));
        }
        if c.read_timeout_ms == 0 {
            errors.push("read_timeout_ms deve ser maior que 0".into());
        }
        if c.mode == OutputMode::Rotate && c.output.is_empty() {
            errors.push("Modo rotate exige um arquivo de saída".into());
        }
        if !c.gain.is_normal() || !c.full_scale.is_normal() || c.gain < 0.0 || c.full_scale < 0.0 {
            errors.push(format!(
                "Calibração inválida: full_scale {} / gain {}",
                c.full_scale, c.gain
            ));
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        let errors = config.validate();
        assert!(errors.is_empty(), "Erros: {:?}", errors);
    }

    #[test]
    fn defaults_match_link() {
        let config = AppConfig::default();
        assert_eq!(config.producer.group_addr().unwrap(), Ipv4Addr::new(225, 1, 1, 1));
        assert_eq!(config.producer.port, 5555);
        assert_eq!(config.producer.ttl, 1);
        assert_eq!(config.producer.address, 0x30);
        assert_eq!(config.producer.adc_command, 0x14);
        assert_eq!(config.consumer.samples_per_file, 32768);
        assert!(config.consumer.output_path().is_none());
    }

    #[test]
    fn roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.producer.port, parsed.producer.port);
        assert_eq!(config.consumer.mode, parsed.consumer.mode);
        assert_eq!(config.consumer.on_length_mismatch, parsed.consumer.on_length_mismatch);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let partial = r#"
[consumer]
output = "power.txt"
mode = "rotate"
on_length_mismatch = "abort"
"#;
        let config: AppConfig = toml::from_str(partial).unwrap();
        assert_eq!(config.consumer.mode, OutputMode::Rotate);
        assert_eq!(config.consumer.on_length_mismatch, MismatchPolicy::Abort);
        assert_eq!(config.consumer.output_path(), Some(PathBuf::from("power.txt")));
        // Outros campos devem ter valor padrão
        assert_eq!(config.consumer.port, 5555);
        assert_eq!(config.producer.device, "/dev/i2c-1");
        assert!(config.validate().is_empty());
    }

    #[test]
    fn rejects_bad_quota_and_group() {
        let mut config = AppConfig::default();
        config.consumer.samples_per_file = 100;
        config.producer.group = "10.0.0.1".into();
        let errors = config.validate();
        assert_eq!(errors.len(), 2, "Erros: {:?}", errors);
    }

    #[test]
    fn rotate_requires_output() {
        let mut config = AppConfig::default();
        config.consumer.mode = OutputMode::Rotate;
        assert_eq!(config.validate().len(), 1);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = AppConfig::default();
        assert_eq!(config.consumer.read_timeout(), Duration::from_millis(1000));
        assert_eq!(
            config.consumer.channel_options().unwrap().read_timeout,
            Some(Duration::from_millis(1000))
        );

        config.consumer.read_timeout_ms = 0;
        let errors = config.validate();
        assert_eq!(errors.len(), 1, "Erros: {:?}", errors);
        assert!(errors[0].contains("read_timeout_ms"));
    }

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("powermon-config-{tag}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn save_then_load_keeps_fields() {
        let dir = temp_dir("roundtrip");
        let path = dir.join(CONFIG_FILE);
        let mut config = AppConfig::default();
        config.consumer.mode = OutputMode::Rotate;
        config.consumer.output = "power.txt".into();
        config.producer.address = 0x48;

        config.save(&path).unwrap();
        let loaded = AppConfig::from_file(&path).unwrap();
        assert_eq!(loaded.consumer.mode, OutputMode::Rotate);
        assert_eq!(loaded.consumer.output, "power.txt");
        assert_eq!(loaded.producer.address, 0x48);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn broken_file_falls_back_to_defaults() {
        let dir = temp_dir("broken");
        let path = dir.join(CONFIG_FILE);
        std::fs::write(&path, "[consumer\nport = ").unwrap();

        assert!(matches!(AppConfig::from_file(&path), Err(ConfigError::Parse { .. })));
        assert_eq!(AppConfig::load(&path).consumer.port, 5555);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn save_into_missing_dir_is_a_write_error() {
        let path = std::env::temp_dir()
            .join(format!("powermon-missing-{}", std::process::id()))
            .join("nested")
            .join(CONFIG_FILE);
        let err = AppConfig::default().save(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Write { .. }));
        assert!(err.to_string().contains("nested"));
    }

    #[test]
    fn default_path_names_config_file() {
        assert!(AppConfig::default_path().ends_with(CONFIG_FILE));
    }
}
