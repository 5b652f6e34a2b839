//! # Powermon Producer
//!
//! Lê o ADC do monitor de potência via I2C e envia lotes de 64 amostras
//! por UDP multicast. Sem ack, sem retry: o lote sai uma vez ou se perde.
//!
//! ## Uso
//! ```bash
//! powermon_producer                       # /dev/i2c-1, endereço 0x30
//! powermon_producer /dev/i2c-0 72         # barramento e endereço explícitos
//! powermon_producer --simulate            # sem hardware (dente de serra)
//! ```

mod sensor;

use anyhow::{Context, bail};
use clap::Parser;
use powermon_core::channel::{MulticastChannel, Role};
use powermon_core::clock::MonotonicClock;
use powermon_core::config::AppConfig;
use powermon_core::producer::Producer;
use powermon_core::protocol::{BATCH_BYTES, SAMPLES_PER_BATCH};
use powermon_core::shutdown;
use powermon_core::source::{SampleSource, SyntheticSource};
use sensor::I2cAdc;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use tracing::{error, info, warn};

/// Produtor do monitor de potência
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Barramento I2C do ADC
    device: Option<String>,

    /// Endereço I2C do ADC (decimal ou 0x..)
    #[arg(value_parser = parse_address)]
    address: Option<u16>,

    /// Arquivo de configuração
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Usa uma fonte sintética no lugar do ADC
    #[arg(long)]
    simulate: bool,

    /// Intervalo entre leituras no modo simulado (µs)
    #[arg(long, default_value_t = 1000)]
    sample_interval_us: u64,
}

fn parse_address(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("endereço inválido '{s}': {e}"))
}

fn main() -> ExitCode {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    // ── Carregar config ──
    let config_path = args.config.clone().unwrap_or_else(AppConfig::default_path);
    let mut config = AppConfig::load(&config_path);

    // Salva config padrão se não existir
    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }

    if let Some(device) = args.device {
        config.producer.device = device;
    }
    if let Some(address) = args.address {
        config.producer.address = address;
    }

    let errors = config.validate();
    if !errors.is_empty() {
        bail!("Configuração inválida: {}", errors.join("; "));
    }

    let cfg = &config.producer;
    let group = cfg.group_addr().map_err(anyhow::Error::msg)?;
    let running = shutdown::install().context("Falha ao instalar handler de sinais")?;

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   ⚡ POWERMON PRODUCER – ATIVO");
    println!("══════════════════════════════════════════════");
    println!("  Destino:   {group}:{} (TTL {})", cfg.port, cfg.ttl);
    if args.simulate {
        println!("  Fonte:     sintética ({} µs)", args.sample_interval_us);
    } else {
        println!("  Fonte:     {} @ 0x{:02X}", cfg.device, cfg.address);
    }
    println!("  Lote:      {SAMPLES_PER_BATCH} amostras / {BATCH_BYTES} bytes");
    println!("══════════════════════════════════════════════");
    println!();

    if args.simulate {
        let source = SyntheticSource::new(1)
            .with_interval(Duration::from_micros(args.sample_interval_us));
        let channel = MulticastChannel::open(group, cfg.port, Role::Sender, &cfg.channel_options())
            .context("Falha ao abrir canal multicast")?;
        return stream(source, channel, &running);
    }

    // ── ADC ──
    let mut adc = I2cAdc::open(&cfg.device, cfg.address).context("Falha ao acessar o ADC")?;
    adc.configure(cfg.adc_command)
        .context("Falha ao configurar o ADC")?;
    std::thread::sleep(Duration::from_millis(cfg.settle_ms));

    let channel = MulticastChannel::open(group, cfg.port, Role::Sender, &cfg.channel_options())
        .context("Falha ao abrir canal multicast")?;
    stream(adc, channel, &running)
}

/// Roda o loop e fecha o canal em qualquer saída.
fn stream<S: SampleSource>(
    source: S,
    channel: MulticastChannel,
    running: &AtomicBool,
) -> anyhow::Result<()> {
    let mut producer = Producer::new(source, MonotonicClock, channel);
    let result = producer.run(running);
    let sent = producer.batches_sent();

    producer
        .into_transport()
        .close()
        .context("Falha ao fechar canal")?;
    result.context("Produtor interrompido")?;

    info!("Encerrado após {sent} lotes");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_accepts_decimal_and_hex() {
        assert_eq!(parse_address("48"), Ok(48));
        assert_eq!(parse_address("0x30"), Ok(0x30));
        assert!(parse_address("zz").is_err());
    }

    #[test]
    fn positional_arguments() {
        let args = Args::try_parse_from(["powermon_producer", "/dev/i2c-0", "0x48"]).unwrap();
        assert_eq!(args.device.as_deref(), Some("/dev/i2c-0"));
        assert_eq!(args.address, Some(0x48));
        assert!(!args.simulate);
    }
}
