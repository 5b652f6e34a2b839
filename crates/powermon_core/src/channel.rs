//! Canal UDP multicast.
//!
//! O canal é dono do socket e da associação ao grupo: [`MulticastChannel::open`]
//! adquire, [`MulticastChannel::close`] (ou o `Drop`) libera. Não há retry
//! nem reconexão; qualquer falha de setup volta para o chamador.
//!
//! - Emissor: socket efêmero com TTL multicast (padrão 1, só o enlace local).
//! - Receptor: bind com `SO_REUSEADDR` na porta do grupo + `IP_ADD_MEMBERSHIP`,
//!   para que vários ouvintes dividam o mesmo host.

use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Grupo multicast padrão.
pub const DEFAULT_GROUP: Ipv4Addr = Ipv4Addr::new(225, 1, 1, 1);

/// Porta padrão.
pub const DEFAULT_PORT: u16 = 5555;

/// TTL padrão: não atravessa roteadores.
pub const DEFAULT_TTL: u32 = 1;

/// Maior datagrama UDP possível; qualquer excesso sobre o esperado aparece
/// como divergência de tamanho em vez de truncamento silencioso.
const RECV_BUFFER_SIZE: usize = 65536;

/// Papel do canal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Sender,
    Receiver,
}

/// Erros do canal.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("{0} não é um grupo multicast IPv4")]
    NotMulticast(Ipv4Addr),

    #[error("Falha ao criar socket em {addr}: {source}")]
    Bind { addr: SocketAddrV4, source: io::Error },

    #[error("Falha ao configurar socket ({option}): {source}")]
    SocketOption {
        option: &'static str,
        source: io::Error,
    },

    #[error("Falha ao entrar no grupo {group}: {source}")]
    Join { group: Ipv4Addr, source: io::Error },

    #[error("Falha ao sair do grupo {group}: {source}")]
    Leave { group: Ipv4Addr, source: io::Error },

    #[error("Erro ao enviar datagrama: {0}")]
    Send(io::Error),

    #[error("Envio parcial: {sent} de {expected} bytes")]
    ShortSend { sent: usize, expected: usize },

    #[error("Erro ao receber datagrama: {0}")]
    Recv(io::Error),

    #[error("Timeout de recepção")]
    Timeout,

    #[error("Datagrama de {actual} bytes (esperado {expected})")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Operação inválida para um canal {0:?}")]
    WrongRole(Role),
}

impl ChannelError {
    /// Timeout de leitura não é falha, só a chance de checar o shutdown.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ChannelError::Timeout)
    }
}

/// Opções de abertura.
#[derive(Debug, Clone)]
pub struct ChannelOptions {
    /// Hop count dos pacotes enviados
    pub ttl: u32,
    /// Interface local para a associação ao grupo (UNSPECIFIED = o kernel escolhe)
    pub interface: Ipv4Addr,
    /// Timeout de `recv` (None = bloqueia indefinidamente)
    pub read_timeout: Option<Duration>,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            interface: Ipv4Addr::UNSPECIFIED,
            read_timeout: None,
        }
    }
}

// ──────────────────────────────────────────────
// Traits de transporte
// ──────────────────────────────────────────────

/// Destino de datagramas inteiros (emissor).
pub trait DatagramSink {
    fn send_datagram(&mut self, bytes: &[u8]) -> Result<(), ChannelError>;
}

/// Origem de datagramas inteiros (receptor).
pub trait DatagramSource {
    /// Bloqueia até chegar um datagrama de exatamente `expected_len` bytes.
    fn recv_datagram(&mut self, expected_len: usize) -> Result<&[u8], ChannelError>;
}

// ──────────────────────────────────────────────
// MulticastChannel
// ──────────────────────────────────────────────

/// Socket multicast com estado de grupo explícito.
#[derive(Debug)]
pub struct MulticastChannel {
    socket: UdpSocket,
    group: SocketAddrV4,
    role: Role,
    interface: Ipv4Addr,
    joined: bool,
    buf: Vec<u8>,
    last_peer: Option<SocketAddr>,
}

impl MulticastChannel {
    /// Abre o canal no papel pedido.
    pub fn open(
        group: Ipv4Addr,
        port: u16,
        role: Role,
        options: &ChannelOptions,
    ) -> Result<Self, ChannelError> {
        if !group.is_multicast() {
            return Err(ChannelError::NotMulticast(group));
        }

        let bind_addr = match role {
            Role::Sender => SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0),
            Role::Receiver => SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port),
        };
        let bound = match role {
            Role::Sender => UdpSocket::bind(bind_addr),
            Role::Receiver => bind_reusable(bind_addr),
        };
        let socket = bound.map_err(|source| ChannelError::Bind {
            addr: bind_addr,
            source,
        })?;

        let mut channel = Self {
            socket,
            group: SocketAddrV4::new(group, port),
            role,
            interface: options.interface,
            joined: false,
            buf: Vec::new(),
            last_peer: None,
        };

        match role {
            Role::Sender => {
                channel
                    .socket
                    .set_multicast_ttl_v4(options.ttl)
                    .map_err(|source| ChannelError::SocketOption {
                        option: "IP_MULTICAST_TTL",
                        source,
                    })?;
                info!("Canal emissor → {} (TTL {})", channel.group, options.ttl);
            }
            Role::Receiver => {
                channel
                    .socket
                    .set_read_timeout(options.read_timeout)
                    .map_err(|source| ChannelError::SocketOption {
                        option: "SO_RCVTIMEO",
                        source,
                    })?;
                channel
                    .socket
                    .join_multicast_v4(&group, &options.interface)
                    .map_err(|source| ChannelError::Join { group, source })?;
                channel.joined = true;
                channel.buf = vec![0u8; RECV_BUFFER_SIZE];
                info!(
                    "Canal receptor em {} (interface {})",
                    channel.group, options.interface
                );
            }
        }

        Ok(channel)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn group(&self) -> SocketAddrV4 {
        self.group
    }

    /// Origem do último datagrama recebido.
    pub fn last_peer(&self) -> Option<SocketAddr> {
        self.last_peer
    }

    /// Envia `bytes` como um único datagrama. Envio parcial é erro.
    pub fn send(&self, bytes: &[u8]) -> Result<(), ChannelError> {
        if self.role != Role::Sender {
            return Err(ChannelError::WrongRole(self.role));
        }
        let sent = self
            .socket
            .send_to(bytes, self.group)
            .map_err(ChannelError::Send)?;
        if sent != bytes.len() {
            return Err(ChannelError::ShortSend {
                sent,
                expected: bytes.len(),
            });
        }
        trace!("→ {sent} bytes para {}", self.group);
        Ok(())
    }

    /// Recebe um datagrama. Tamanho diferente de `expected_len` é erro e o
    /// conteúdo não é exposto.
    pub fn recv(&mut self, expected_len: usize) -> Result<&[u8], ChannelError> {
        if self.role != Role::Receiver {
            return Err(ChannelError::WrongRole(self.role));
        }
        let (len, peer) = self.socket.recv_from(&mut self.buf).map_err(recv_error)?;
        self.last_peer = Some(peer);

        if len != expected_len {
            return Err(ChannelError::LengthMismatch {
                expected: expected_len,
                actual: len,
            });
        }
        trace!("← {len} bytes de {peer}");
        Ok(&self.buf[..len])
    }

    /// Sai do grupo (receptor) e fecha o socket.
    pub fn close(mut self) -> Result<(), ChannelError> {
        self.leave_group()
    }

    fn leave_group(&mut self) -> Result<(), ChannelError> {
        if !self.joined {
            return Ok(());
        }
        self.joined = false;
        let group = *self.group.ip();
        self.socket
            .leave_multicast_v4(&group, &self.interface)
            .map_err(|source| ChannelError::Leave { group, source })?;
        debug!("Saiu do grupo {group}");
        Ok(())
    }
}

/// Socket UDP com `SO_REUSEADDR` ligado antes do bind.
fn bind_reusable(addr: SocketAddrV4) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&SocketAddr::V4(addr).into())?;
    Ok(socket.into())
}

/// Com `SO_RCVTIMEO` o Linux devolve EINTR mesmo com SA_RESTART; um sinal
/// no meio do `recv` conta como timeout para o loop checar o shutdown.
fn recv_error(e: io::Error) -> ChannelError {
    match e.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted => {
            ChannelError::Timeout
        }
        _ => ChannelError::Recv(e),
    }
}

impl Drop for MulticastChannel {
    fn drop(&mut self) {
        if let Err(e) = self.leave_group() {
            warn!("{e}");
        }
    }
}

impl DatagramSink for MulticastChannel {
    fn send_datagram(&mut self, bytes: &[u8]) -> Result<(), ChannelError> {
        self.send(bytes)
    }
}

impl DatagramSource for MulticastChannel {
    fn recv_datagram(&mut self, expected_len: usize) -> Result<&[u8], ChannelError> {
        self.recv(expected_len)
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unicast_group() {
        let err = MulticastChannel::open(
            Ipv4Addr::new(192, 168, 0, 1),
            DEFAULT_PORT,
            Role::Receiver,
            &ChannelOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ChannelError::NotMulticast(_)));
    }

    #[test]
    fn default_options_are_link_local() {
        let options = ChannelOptions::default();
        assert_eq!(options.ttl, 1);
        assert_eq!(options.interface, Ipv4Addr::UNSPECIFIED);
        assert!(options.read_timeout.is_none());
    }

    #[test]
    fn sender_cannot_receive() {
        let mut channel =
            MulticastChannel::open(DEFAULT_GROUP, DEFAULT_PORT, Role::Sender, &ChannelOptions::default())
                .unwrap();
        assert_eq!(channel.role(), Role::Sender);
        assert!(matches!(
            channel.recv(640),
            Err(ChannelError::WrongRole(Role::Sender))
        ));
        channel.close().unwrap();
    }

    #[test]
    fn interrupted_recv_is_a_timeout() {
        for kind in [
            io::ErrorKind::Interrupted,
            io::ErrorKind::WouldBlock,
            io::ErrorKind::TimedOut,
        ] {
            assert!(recv_error(io::Error::from(kind)).is_timeout(), "{kind:?}");
        }
        assert!(matches!(
            recv_error(io::Error::from(io::ErrorKind::ConnectionRefused)),
            ChannelError::Recv(_)
        ));
    }

    #[test]
    fn reusable_bind_allows_shared_port() {
        let first = bind_reusable(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)).unwrap();
        let port = first.local_addr().unwrap().port();
        let second = bind_reusable(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port)).unwrap();
        assert_eq!(second.local_addr().unwrap().port(), port);
    }

    #[test]
    fn timeout_is_recognised() {
        assert!(ChannelError::Timeout.is_timeout());
        assert!(
            !ChannelError::LengthMismatch {
                expected: 640,
                actual: 639
            }
            .is_timeout()
        );
    }
}
