//! Relógio monotônico das amostras.

use crate::types::Timestamp;
use std::io;

/// Fonte de timestamps.
pub trait Clock {
    fn now(&mut self) -> io::Result<Timestamp>;
}

/// `CLOCK_MONOTONIC`, com os segundos truncados para a largura do fio.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    /// Lê o relógio, devolvendo o erro do sistema se houver.
    pub fn read() -> io::Result<Timestamp> {
        // SAFETY: timespec é POD; zerado é um valor válido, e `ts` é
        // exclusivo durante a chamada.
        let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Timestamp::new(ts.tv_sec as u32, ts.tv_nsec as u32))
    }
}

impl Clock for MonotonicClock {
    fn now(&mut self) -> io::Result<Timestamp> {
        Self::read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_never_goes_back() {
        let mut clock = MonotonicClock;
        let a = clock.now().unwrap();
        let b = clock.now().unwrap();
        assert!(b >= a);
        assert!(a.nanos < crate::types::NANOS_PER_SEC);
    }
}
