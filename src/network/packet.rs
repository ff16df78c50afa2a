//! ICMP echo packet crafting and reply parsing

use pnet::packet::icmp::echo_reply::EchoReplyPacket;
use pnet::packet::icmp::echo_request::{EchoRequestPacket, MutableEchoRequestPacket};
use pnet::packet::icmp::{checksum, IcmpCode, IcmpPacket, IcmpType, IcmpTypes};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::ipv6::Ipv6Packet;
use pnet::packet::{MutablePacket, Packet};

/// ICMP header size (fixed)
pub const ICMP_HEADER_SIZE: usize = 8;

/// Fixed IPv6 header size
const IPV6_HEADER_SIZE: usize = 40;

/// Filler sent with TTL-limited (traceroute) probes
pub const TRACE_PAYLOAD: &[u8; 32] = b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

/// Payload of plain reachability pings, the usual 32-byte alphabet pattern
pub const DEFAULT_PAYLOAD: &[u8; 32] = b"abcdefghijklmnopqrstuvwabcdefghi";

const ICMPV6_ECHO_REQUEST: u8 = 128;
const ICMPV6_ECHO_REPLY: u8 = 129;
const ICMPV6_DEST_UNREACHABLE: u8 = 1;
const ICMPV6_TIME_EXCEEDED: u8 = 3;

/// What kind of answer a received ICMP message is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    EchoReply,
    TimeExceeded,
    /// Destination unreachable with its ICMP code
    Unreachable(u8),
}

/// A received ICMP message together with the echo it refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedReply {
    pub kind: ReplyKind,
    pub identifier: u16,
    pub sequence: u16,
}

impl ParsedReply {
    /// Does this reply belong to the echo request we sent?
    ///
    /// Datagram sockets rewrite the identifier, so only the sequence is compared.
    pub fn matches(&self, identifier: u16, sequence: u16, check_identifier: bool) -> bool {
        self.sequence == sequence && (!check_identifier || self.identifier == identifier)
    }
}

/// Build an ICMP (or ICMPv6) Echo Request carrying `payload`.
///
/// The ICMPv6 checksum is left zero; the kernel fills it in.
pub fn build_echo_request(identifier: u16, sequence: u16, payload: &[u8], ipv6: bool) -> Vec<u8> {
    let mut buffer = vec![0u8; ICMP_HEADER_SIZE + payload.len()];

    {
        // buffer is at least ICMP_HEADER_SIZE long
        let mut packet = match MutableEchoRequestPacket::new(&mut buffer) {
            Some(packet) => packet,
            None => return buffer,
        };

        if ipv6 {
            packet.set_icmp_type(IcmpType::new(ICMPV6_ECHO_REQUEST));
        } else {
            packet.set_icmp_type(IcmpTypes::EchoRequest);
        }
        packet.set_icmp_code(IcmpCode::new(0));
        packet.set_identifier(identifier);
        packet.set_sequence_number(sequence);
        packet.payload_mut().copy_from_slice(payload);
    }

    if !ipv6 {
        let cksum = IcmpPacket::new(&buffer).map(|icmp| checksum(&icmp));
        if let (Some(cksum), Some(mut packet)) = (cksum, MutableEchoRequestPacket::new(&mut buffer)) {
            packet.set_checksum(cksum);
        }
    }

    buffer
}

/// Parse a received datagram.
///
/// `has_ip_header` is true for raw IPv4 sockets, whose reads start with the IP
/// header. Returns `None` for anything that is not an echo reply, time exceeded,
/// or unreachable message referring to an echo request.
pub fn parse_reply(data: &[u8], has_ip_header: bool, ipv6: bool) -> Option<ParsedReply> {
    let icmp_bytes = if has_ip_header {
        let ip = Ipv4Packet::new(data)?;
        if ip.get_next_level_protocol() != IpNextHeaderProtocols::Icmp {
            return None;
        }
        let offset = usize::from(ip.get_header_length()) * 4;
        data.get(offset..)?
    } else {
        data
    };

    if ipv6 {
        parse_icmpv6(icmp_bytes)
    } else {
        parse_icmpv4(icmp_bytes)
    }
}

fn parse_icmpv4(icmp_bytes: &[u8]) -> Option<ParsedReply> {
    let icmp = IcmpPacket::new(icmp_bytes)?;
    let icmp_type = icmp.get_icmp_type();

    if icmp_type == IcmpTypes::EchoReply {
        let reply = EchoReplyPacket::new(icmp_bytes)?;
        return Some(ParsedReply {
            kind: ReplyKind::EchoReply,
            identifier: reply.get_identifier(),
            sequence: reply.get_sequence_number(),
        });
    }

    let kind = if icmp_type == IcmpTypes::TimeExceeded {
        ReplyKind::TimeExceeded
    } else if icmp_type == IcmpTypes::DestinationUnreachable {
        ReplyKind::Unreachable(icmp.get_icmp_code().0)
    } else {
        return None;
    };

    // Error messages quote the original IP header plus the first 8 ICMP bytes
    let quoted = icmp_bytes.get(ICMP_HEADER_SIZE..)?;
    let inner_ip = Ipv4Packet::new(quoted)?;
    if inner_ip.get_next_level_protocol() != IpNextHeaderProtocols::Icmp {
        return None;
    }
    let inner_offset = usize::from(inner_ip.get_header_length()) * 4;
    let inner_echo = EchoRequestPacket::new(quoted.get(inner_offset..)?)?;
    if inner_echo.get_icmp_type() != IcmpTypes::EchoRequest {
        return None;
    }

    Some(ParsedReply {
        kind,
        identifier: inner_echo.get_identifier(),
        sequence: inner_echo.get_sequence_number(),
    })
}

fn parse_icmpv6(icmp_bytes: &[u8]) -> Option<ParsedReply> {
    if icmp_bytes.len() < ICMP_HEADER_SIZE {
        return None;
    }

    let kind = match icmp_bytes[0] {
        ICMPV6_ECHO_REPLY => {
            return Some(ParsedReply {
                kind: ReplyKind::EchoReply,
                identifier: u16::from_be_bytes([icmp_bytes[4], icmp_bytes[5]]),
                sequence: u16::from_be_bytes([icmp_bytes[6], icmp_bytes[7]]),
            });
        }
        ICMPV6_TIME_EXCEEDED => ReplyKind::TimeExceeded,
        ICMPV6_DEST_UNREACHABLE => ReplyKind::Unreachable(icmp_bytes[1]),
        _ => return None,
    };

    let quoted = icmp_bytes.get(ICMP_HEADER_SIZE..)?;
    let inner_ip = Ipv6Packet::new(quoted)?;
    if inner_ip.get_next_header() != IpNextHeaderProtocols::Icmpv6 {
        return None;
    }
    let inner = quoted.get(IPV6_HEADER_SIZE..IPV6_HEADER_SIZE + ICMP_HEADER_SIZE)?;
    if inner[0] != ICMPV6_ECHO_REQUEST {
        return None;
    }

    Some(ParsedReply {
        kind,
        identifier: u16::from_be_bytes([inner[4], inner[5]]),
        sequence: u16::from_be_bytes([inner[6], inner[7]]),
    })
}

/// Human readable text for an ICMPv4 destination-unreachable code
pub fn unreachable_reason(code: u8, ipv6: bool) -> &'static str {
    if ipv6 {
        return match code {
            0 => "DestinationNetworkUnreachable",
            1 => "DestinationProhibited",
            3 => "DestinationHostUnreachable",
            4 => "DestinationPortUnreachable",
            _ => "DestinationUnreachable",
        };
    }
    match code {
        0 => "DestinationNetworkUnreachable",
        1 => "DestinationHostUnreachable",
        2 => "DestinationProtocolUnreachable",
        3 => "DestinationPortUnreachable",
        4 => "PacketTooBig",
        9 | 10 | 13 => "DestinationProhibited",
        _ => "DestinationUnreachable",
    }
}
