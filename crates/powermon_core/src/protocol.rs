//! Protocolo binário das amostras.
//!
//! Cada amostra vira um registro fixo de 10 bytes, campos em ordem de rede
//! (big-endian), sem padding:
//!
//! ```text
//! ┌───────────┬────────────┬──────────┐
//! │ secs (4)  │ nanos (4)  │ raw (2)  │
//! │ u32 BE    │ u32 BE     │ u16 BE   │
//! └───────────┴────────────┴──────────┘
//! ```
//!
//! Um datagrama carrega exatamente [`SAMPLES_PER_BATCH`] registros
//! consecutivos, ou seja [`BATCH_BYTES`] bytes. Não há header, versão nem
//! número de sequência: o tamanho fixo é a única validação possível no
//! receptor.

use crate::types::{Sample, Timestamp};

/// Tamanho de um registro no fio.
pub const RECORD_SIZE: usize = 10;

/// Amostras por datagrama.
pub const SAMPLES_PER_BATCH: usize = 64;

/// Tamanho de um datagrama completo.
pub const BATCH_BYTES: usize = SAMPLES_PER_BATCH * RECORD_SIZE;

/// MTU de Ethernet.
pub const ETHERNET_MTU: usize = 1500;

/// Payload UDP máximo sem fragmentação (MTU − IPv4 20 − UDP 8).
pub const MAX_DATAGRAM_PAYLOAD: usize = ETHERNET_MTU - 20 - 8;

// O lote inteiro precisa caber num único quadro.
const _: () = assert!(BATCH_BYTES < MAX_DATAGRAM_PAYLOAD);

const SECS_OFFSET: usize = 0;
const NANOS_OFFSET: usize = 4;
const RAW_OFFSET: usize = 8;

/// Erros do protocolo.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Tamanho de datagrama inválido: {actual} bytes (esperado {expected})")]
    LengthMismatch { expected: usize, actual: usize },
}

// ──────────────────────────────────────────────
// Campos
// ──────────────────────────────────────────────

fn put_u32(buf: &mut [u8; RECORD_SIZE], at: usize, value: u32) {
    buf[at..at + 4].copy_from_slice(&value.to_be_bytes());
}

fn put_u16(buf: &mut [u8; RECORD_SIZE], at: usize, value: u16) {
    buf[at..at + 2].copy_from_slice(&value.to_be_bytes());
}

fn get_u32(buf: &[u8; RECORD_SIZE], at: usize) -> u32 {
    u32::from_be_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

fn get_u16(buf: &[u8; RECORD_SIZE], at: usize) -> u16 {
    u16::from_be_bytes([buf[at], buf[at + 1]])
}

// ──────────────────────────────────────────────
// Registro
// ──────────────────────────────────────────────

/// Serializa uma amostra no registro de 10 bytes.
///
/// A leitura é gravada como está; o mascaramento para 12 bits acontece na
/// captura, não aqui.
pub fn encode_record(sample: &Sample) -> [u8; RECORD_SIZE] {
    let mut buf = [0u8; RECORD_SIZE];
    put_u32(&mut buf, SECS_OFFSET, sample.timestamp.secs);
    put_u32(&mut buf, NANOS_OFFSET, sample.timestamp.nanos);
    put_u16(&mut buf, RAW_OFFSET, sample.raw_reading);
    buf
}

/// Inverso exato de [`encode_record`].
pub fn decode_record(buf: &[u8; RECORD_SIZE]) -> Sample {
    Sample::new(
        Timestamp::new(get_u32(buf, SECS_OFFSET), get_u32(buf, NANOS_OFFSET)),
        get_u16(buf, RAW_OFFSET),
    )
}

// ──────────────────────────────────────────────
// Lote
// ──────────────────────────────────────────────

/// Valida o tamanho de um datagrama recebido e itera sobre seus registros.
///
/// Qualquer tamanho diferente de [`BATCH_BYTES`] é rejeitado antes de
/// qualquer decodificação.
pub fn decode_batch(data: &[u8]) -> Result<impl Iterator<Item = Sample> + '_, ProtocolError> {
    if data.len() != BATCH_BYTES {
        return Err(ProtocolError::LengthMismatch {
            expected: BATCH_BYTES,
            actual: data.len(),
        });
    }

    // chunks_exact garante RECORD_SIZE; o filter_map nunca descarta nada.
    Ok(data
        .chunks_exact(RECORD_SIZE)
        .filter_map(|chunk| <&[u8; RECORD_SIZE]>::try_from(chunk).ok())
        .map(decode_record))
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(secs: u32, nanos: u32, raw: u16) -> Sample {
        Sample::new(Timestamp::new(secs, nanos), raw)
    }

    #[test]
    fn encode_decode_roundtrip() {
        let cases = [
            sample(0, 0, 0),
            sample(1, 999_999_999, 4095),
            sample(u32::MAX, 123_456_789, 0x0800),
            sample(86_400, 1, 1),
        ];
        for original in cases {
            assert_eq!(decode_record(&encode_record(&original)), original);
        }
    }

    #[test]
    fn layout_is_big_endian_without_padding() {
        let encoded = encode_record(&sample(0x0102_0304, 0x0506_0708, 0x090A));
        assert_eq!(encoded, [1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
    }

    #[test]
    fn record_size_is_fixed() {
        assert_eq!(encode_record(&Sample::default()).len(), 10);
        assert_eq!(BATCH_BYTES, 640);
    }

    #[test]
    fn batch_fits_below_mtu() {
        assert!(BATCH_BYTES < MAX_DATAGRAM_PAYLOAD);
    }

    #[test]
    fn decode_batch_yields_every_record_in_order() {
        let mut data = Vec::with_capacity(BATCH_BYTES);
        for i in 0..SAMPLES_PER_BATCH as u32 {
            data.extend_from_slice(&encode_record(&sample(i, i * 10, i as u16)));
        }

        let decoded: Vec<Sample> = decode_batch(&data).unwrap().collect();
        assert_eq!(decoded.len(), SAMPLES_PER_BATCH);
        assert_eq!(decoded[0], sample(0, 0, 0));
        assert_eq!(decoded[63], sample(63, 630, 63));
    }

    #[test]
    fn rejects_short_batch() {
        let data = vec![0u8; BATCH_BYTES - 1];
        assert!(matches!(
            decode_batch(&data),
            Err(ProtocolError::LengthMismatch {
                expected: 640,
                actual: 639
            })
        ));
    }

    #[test]
    fn rejects_long_batch() {
        let data = vec![0u8; BATCH_BYTES + RECORD_SIZE];
        assert!(decode_batch(&data).is_err());
    }
}
