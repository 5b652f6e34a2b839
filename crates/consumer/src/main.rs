//! # Powermon Consumer
//!
//! Entra no grupo multicast do produtor, decodifica cada lote de 64
//! amostras e grava `<segundos> <valor>` por linha, na saída padrão ou em
//! arquivo (stream ou rotação por cota de amostras).
//!
//! ## Uso
//! ```bash
//! powermon_consumer                                 # stdout
//! powermon_consumer dados.txt                       # append contínuo
//! powermon_consumer dados.txt --mode rotate         # dados-000000.txt, …
//! ```

use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use powermon_core::channel::{MulticastChannel, Role};
use powermon_core::config::{AppConfig, ConsumerConfig, OutputMode};
use powermon_core::consumer::Consumer;
use powermon_core::shutdown;
use powermon_core::sink::{RotatingFileSink, SampleSink, StreamSink};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Stream,
    Rotate,
}

impl From<Mode> for OutputMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Stream => OutputMode::Stream,
            Mode::Rotate => OutputMode::Rotate,
        }
    }
}

/// Consumidor do monitor de potência
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Arquivo de saída (omitido = stdout)
    output: Option<PathBuf>,

    /// Modo de saída
    #[arg(short, long, value_enum)]
    mode: Option<Mode>,

    /// Amostras por arquivo no modo rotate
    #[arg(long)]
    samples_per_file: Option<usize>,

    /// Arquivo de configuração
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    // ── Logging (stderr: stdout é dado) ──
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
    // ── Config ──
    let config_path = args.config.clone().unwrap_or_else(AppConfig::default_path);
    let mut config = AppConfig::load(&config_path);

    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }

    if let Some(output) = &args.output {
        config.consumer.output = output.to_string_lossy().into_owned();
    }
    if let Some(mode) = args.mode {
        config.consumer.mode = mode.into();
    }
    if let Some(quota) = args.samples_per_file {
        config.consumer.samples_per_file = quota;
    }

    let errors = config.validate();
    if !errors.is_empty() {
        bail!("Configuração inválida: {}", errors.join("; "));
    }

    let cfg = &config.consumer;
    let running = shutdown::install().context("Falha ao instalar handler de sinais")?;

    match (cfg.output_path(), cfg.mode) {
        (None, _) => {
            let sink = StreamSink::new(std::io::stdout().lock(), cfg.calibration());
            receive(cfg, sink, &running)
        }
        (Some(path), OutputMode::Stream) => {
            let sink = StreamSink::append_to(&path, cfg.calibration())?;
            receive(cfg, sink, &running)
        }
        (Some(path), OutputMode::Rotate) => {
            info!(
                "Rotação a cada {} amostras em {}",
                cfg.samples_per_file,
                path.display()
            );
            let sink = RotatingFileSink::new(path, cfg.samples_per_file, cfg.calibration());
            receive(cfg, sink, &running)
        }
    }
}

/// Roda o loop; destino e canal são liberados em qualquer saída.
fn receive<K: SampleSink>(cfg: &ConsumerConfig, sink: K, running: &AtomicBool) -> anyhow::Result<()> {
    let group = cfg.group_addr().map_err(anyhow::Error::msg)?;
    let options = cfg.channel_options().map_err(anyhow::Error::msg)?;
    let channel = MulticastChannel::open(group, cfg.port, Role::Receiver, &options)
        .context("Falha ao abrir canal multicast")?;

    let mut consumer = Consumer::new(channel, sink, cfg.on_length_mismatch);
    let result = consumer.run(running);
    let finished = consumer.finish();
    let stats = consumer.stats();

    let (channel, sink) = consumer.into_parts();
    let closed = channel.close();
    info!(
        "Encerrado: {} lotes, {} amostras, {} descartados, {} arquivos",
        stats.batches,
        stats.samples,
        stats.discarded,
        sink.files_written()
    );
    drop(sink);
    let _ = std::io::stdout().flush();

    result.context("Consumidor interrompido")?;
    finished.context("Falha ao descarregar saída")?;
    closed.context("Falha ao fechar canal")?;
    Ok(())
}
