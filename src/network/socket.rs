//! ICMP socket management for the probe primitive
//!
//! A [`ProbeSocket`] is opened per probe and closed when it is dropped, so every
//! exit path of a probe releases its descriptor.

use crate::DiagError;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io;
use std::mem::MaybeUninit;
use std::net::{IpAddr, SocketAddr};

/// How the socket was opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    /// SOCK_RAW: sees every ICMP message, IPv4 reads include the IP header
    Raw,
    /// Unprivileged SOCK_DGRAM ICMP ("ping socket"): kernel owns the identifier
    Dgram,
}

/// Non-blocking ICMP socket used for a single echo exchange
#[derive(Debug)]
pub struct ProbeSocket {
    socket: Socket,
    kind: SocketKind,
    ipv6: bool,
}

impl ProbeSocket {
    /// Open an ICMP socket for the address family of `target`.
    ///
    /// Raw sockets are preferred; without the privilege for them an unprivileged
    /// datagram socket is used instead.
    pub fn open(target: IpAddr) -> crate::Result<Self> {
        let ipv6 = target.is_ipv6();
        let (domain, protocol) = if ipv6 {
            (Domain::IPV6, Protocol::ICMPV6)
        } else {
            (Domain::IPV4, Protocol::ICMPV4)
        };

        let (socket, kind) = match Socket::new(domain, Type::RAW, Some(protocol)) {
            Ok(socket) => (socket, SocketKind::Raw),
            Err(raw_err) => {
                log::debug!("Raw ICMP socket unavailable ({}), trying datagram ICMP", raw_err);
                let socket = Socket::new(domain, Type::DGRAM, Some(protocol))
                    .map_err(|_| DiagError::from_socket_error(raw_err))?;
                (socket, SocketKind::Dgram)
            }
        };

        socket.set_nonblocking(true).map_err(DiagError::from_socket_error)?;

        Ok(Self { socket, kind, ipv6 })
    }

    pub fn kind(&self) -> SocketKind {
        self.kind
    }

    pub fn is_ipv6(&self) -> bool {
        self.ipv6
    }

    /// Whether received datagrams start with an IPv4 header
    pub fn includes_ip_header(&self) -> bool {
        self.kind == SocketKind::Raw && !self.ipv6
    }

    /// Set the outgoing TTL / hop limit
    pub fn set_ttl(&self, ttl: u8) -> crate::Result<()> {
        let result = if self.ipv6 {
            self.socket.set_unicast_hops_v6(u32::from(ttl))
        } else {
            self.socket.set_ttl(u32::from(ttl))
        };
        result.map_err(DiagError::from_socket_error)
    }

    /// Forbid fragmentation of outgoing probes (IPv4 only)
    pub fn set_dont_fragment(&self) -> crate::Result<()> {
        if self.ipv6 {
            return Ok(());
        }
        set_dont_fragment(&self.socket).map_err(DiagError::from_socket_error)
    }

    /// Send one ICMP message to `target`
    pub fn send_to(&self, packet: &[u8], target: IpAddr) -> crate::Result<usize> {
        let dest = SockAddr::from(SocketAddr::new(target, 0));
        self.socket
            .send_to(packet, &dest)
            .map_err(|e| DiagError::NetworkError(format!("send to {} failed: {}", target, e)))
    }

    /// Receive one datagram into `buf` if one is queued.
    ///
    /// Returns the received bytes and their source, or `Ok(None)` when nothing
    /// is waiting. The buffer is reused across polls.
    pub fn try_recv<'b>(&self, buf: &'b mut [MaybeUninit<u8>]) -> io::Result<Option<(&'b [u8], IpAddr)>> {
        match self.socket.recv_from(buf) {
            Ok((size, addr)) => {
                let source = match addr.as_socket() {
                    Some(addr) => addr.ip(),
                    None => {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            "reply from a non-IP socket address",
                        ))
                    }
                };

                let size = size.min(buf.len());
                // recv_from initialised the first `size` bytes
                let data = unsafe { std::slice::from_raw_parts(buf.as_ptr() as *const u8, size) };

                Ok(Some((data, source)))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(target_os = "linux")]
fn set_dont_fragment(socket: &Socket) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let val: libc::c_int = libc::IP_PMTUDISC_DO;
    let ret = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            libc::IPPROTO_IP,
            libc::IP_MTU_DISCOVER,
            &val as *const _ as *const libc::c_void,
            std::mem::size_of_val(&val) as libc::socklen_t,
        )
    };
    if ret != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(target_os = "macos")]
fn set_dont_fragment(socket: &Socket) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    // IP_DONTFRAG on macOS
    const IP_DONTFRAG: libc::c_int = 28;
    let val: libc::c_int = 1;
    let ret = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            libc::IPPROTO_IP,
            IP_DONTFRAG,
            &val as *const _ as *const libc::c_void,
            std::mem::size_of_val(&val) as libc::socklen_t,
        )
    };
    if ret != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn set_dont_fragment(_socket: &Socket) -> io::Result<()> {
    log::debug!("Don't-fragment is not supported on this platform; sending without it");
    Ok(())
}
