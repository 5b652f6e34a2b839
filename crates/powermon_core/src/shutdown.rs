//! Parada graciosa via Ctrl-C / SIGTERM.
//!
//! Os loops checam a flag entre lotes; o receptor usa timeout de leitura
//! para não ficar preso no `recv`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Instala o handler e devolve a flag de execução (false = parar).
///
/// Só pode ser chamado uma vez por processo.
pub fn install() -> Result<Arc<AtomicBool>, ctrlc::Error> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;
    Ok(running)
}
