use super::{AddressFamily, SequenceNumber};
use crate::ping_error::{PingError, PingResult};
use pnet_packet::icmp::{
    echo_reply::EchoReplyPacket as EchoPacketV4, echo_request::MutableEchoRequestPacket as MutableEchoRequestPacketV4,
    IcmpCode, IcmpPacket, IcmpType, IcmpTypes,
};
use pnet_packet::icmpv6::{
    echo_reply::EchoReplyPacket as EchoPacketV6, echo_request::MutableEchoRequestPacket as MutableEchoRequestPacketV6,
    Icmpv6Code, Icmpv6Packet, Icmpv6Type, Icmpv6Types,
};
use pnet_packet::Packet;

const ICMP_ECHO_HEADER_LEN: usize = 8;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MessageType {
    EchoRequest,
    EchoReply,
    Other(u8),
}

impl MessageType {
    fn from_v4(icmp_type: IcmpType) -> Self {
        match icmp_type {
            IcmpTypes::EchoReply => MessageType::EchoReply,
            IcmpTypes::EchoRequest => MessageType::EchoRequest,
            IcmpType(other) => MessageType::Other(other),
        }
    }

    fn from_v6(icmpv6_type: Icmpv6Type) -> Self {
        match icmpv6_type {
            Icmpv6Types::EchoReply => MessageType::EchoReply,
            Icmpv6Types::EchoRequest => MessageType::EchoRequest,
            Icmpv6Type(other) => MessageType::Other(other),
        }
    }

    fn is_echo(self) -> bool {
        matches!(self, MessageType::EchoRequest | MessageType::EchoReply)
    }
}

/// Body of an echo request or reply.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Echo {
    pub identifier: u16,
    pub sequence_number: SequenceNumber,
    pub payload: Vec<u8>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MessageBody {
    Echo(Echo),
    /// Everything after the 4 byte ICMP header of a non-echo message.
    Other(Vec<u8>),
}

/// A decoded ICMP or ICMPv6 message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Message {
    pub family: AddressFamily,
    pub message_type: MessageType,
    pub code: u8,
    pub body: MessageBody,
}

impl Message {
    /// The echo body, if this is an echo reply.
    pub fn into_echo_reply(self) -> Option<Echo> {
        match (self.message_type, self.body) {
            (MessageType::EchoReply, MessageBody::Echo(echo)) => Some(echo),
            _ => None,
        }
    }
}

/// Builds an echo request for `family`.
///
/// IPv4 requests carry their checksum. The ICMPv6 checksum covers a pseudo header the
/// sender does not know, so it is left zero and filled in by the kernel.
pub fn encode_echo_request(
    family: AddressFamily,
    identifier: u16,
    sequence_number: SequenceNumber,
    payload: &[u8],
) -> PingResult<Vec<u8>> {
    let buf = vec![0u8; ICMP_ECHO_HEADER_LEN + payload.len()];
    match family {
        AddressFamily::V4 => {
            let mut package = MutableEchoRequestPacketV4::owned(buf).ok_or_else(buffer_too_small)?;
            package.set_icmp_type(IcmpTypes::EchoRequest);
            package.set_icmp_code(IcmpCode::new(0));
            package.set_identifier(identifier);
            package.set_sequence_number(sequence_number.into());
            package.set_payload(payload);

            package.set_checksum(0_u16);
            let checksum = pnet_packet::icmp::checksum(&IcmpPacket::new(package.packet()).ok_or_else(buffer_too_small)?);
            package.set_checksum(checksum);
            Ok(package.packet().to_vec())
        }
        AddressFamily::V6 => {
            let mut package = MutableEchoRequestPacketV6::owned(buf).ok_or_else(buffer_too_small)?;
            package.set_icmpv6_type(Icmpv6Types::EchoRequest);
            package.set_icmpv6_code(Icmpv6Code::new(0));
            package.set_identifier(identifier);
            package.set_sequence_number(sequence_number.into());
            package.set_payload(payload);
            package.set_checksum(0_u16);
            Ok(package.packet().to_vec())
        }
    }
}

/// Parses ICMP bytes (no IP header) received on a socket of `family`.
pub fn decode(bytes: &[u8], family: AddressFamily) -> PingResult<Message> {
    match family {
        AddressFamily::V4 => decode_v4(bytes),
        AddressFamily::V6 => decode_v6(bytes),
    }
}

fn decode_v4(bytes: &[u8]) -> PingResult<Message> {
    let packet = IcmpPacket::new(bytes).ok_or_else(|| truncated(bytes.len(), AddressFamily::V4))?;
    let message_type = MessageType::from_v4(packet.get_icmp_type());
    let code = packet.get_icmp_code().0;

    let body = if message_type.is_echo() {
        let echo = EchoPacketV4::new(bytes).ok_or_else(|| truncated(bytes.len(), AddressFamily::V4))?;
        MessageBody::Echo(Echo {
            identifier: echo.get_identifier(),
            sequence_number: echo.get_sequence_number().into(),
            payload: echo.payload().to_vec(),
        })
    } else {
        MessageBody::Other(packet.payload().to_vec())
    };
    Ok(Message { family: AddressFamily::V4, message_type, code, body })
}

fn decode_v6(bytes: &[u8]) -> PingResult<Message> {
    let packet = Icmpv6Packet::new(bytes).ok_or_else(|| truncated(bytes.len(), AddressFamily::V6))?;
    let message_type = MessageType::from_v6(packet.get_icmpv6_type());
    let code = packet.get_icmpv6_code().0;

    let body = if message_type.is_echo() {
        let echo = EchoPacketV6::new(bytes).ok_or_else(|| truncated(bytes.len(), AddressFamily::V6))?;
        MessageBody::Echo(Echo {
            identifier: echo.get_identifier(),
            sequence_number: echo.get_sequence_number().into(),
            payload: echo.payload().to_vec(),
        })
    } else {
        MessageBody::Other(packet.payload().to_vec())
    };
    Ok(Message { family: AddressFamily::V6, message_type, code, body })
}

fn truncated(len: usize, family: AddressFamily) -> PingError {
    PingError::MalformedPacket(format!("{len} bytes are too few for an {family} message"))
}

fn buffer_too_small() -> PingError {
    PingError::MalformedPacket("could not create ICMP package".to_owned())
}
