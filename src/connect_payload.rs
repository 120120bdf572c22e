// ABOUTME: Encoding and decoding of the CONNECT frame payload naming the gateway's upstream target.
// ABOUTME: Two shapes share one wire format: a 4-byte IPv4 address, or a variable-length hostname.

use crate::error::CodecError;
use std::net::Ipv4Addr;

/// Where a client wants the gateway to dial on its behalf.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectTarget {
    Ipv4 { addr: Ipv4Addr, port: u16 },
    Hostname { host: String, port: u16 },
}

impl ConnectTarget {
    /// Parse a `host:port` string the way the client CLI accepts it, choosing
    /// IPv4 mode when `host` parses as a dotted-quad address and hostname
    /// mode otherwise.
    pub fn parse(address: &str) -> Result<Self, &'static str> {
        let (host, port) = address.rsplit_once(':').ok_or("address must be host:port")?;
        let port: u16 = port.parse().map_err(|_| "port must be a u16")?;
        match host.parse::<Ipv4Addr>() {
            Ok(addr) => Ok(ConnectTarget::Ipv4 { addr, port }),
            Err(_) => Ok(ConnectTarget::Hostname { host: host.to_string(), port }),
        }
    }

    /// Whether this target needs the command's hostname-mode bit set.
    pub fn is_hostname(&self) -> bool {
        matches!(self, ConnectTarget::Hostname { .. })
    }

    /// Encode to the bytes carried in a CONNECT frame's payload.
    pub fn encode(&self) -> Vec<u8> {
        let (mut bytes, port) = match self {
            ConnectTarget::Ipv4 { addr, port } => (addr.octets().to_vec(), *port),
            ConnectTarget::Hostname { host, port } => (host.as_bytes().to_vec(), *port),
        };
        bytes.push((port & 0x00FF) as u8);
        bytes.push(((port >> 8) & 0x00FF) as u8);
        bytes
    }

    /// Decode a CONNECT frame's payload. `hostname_mode` comes from the
    /// command byte's high bit, not from the payload itself.
    pub fn decode(payload: &[u8], hostname_mode: bool) -> Result<Self, CodecError> {
        if payload.len() < 2 {
            return Err(CodecError::BadConnectPayload("payload shorter than the trailing port field"));
        }
        let (addr_bytes, port_bytes) = payload.split_at(payload.len() - 2);
        let port = u16::from_le_bytes([port_bytes[0], port_bytes[1]]);

        if hostname_mode {
            if addr_bytes.is_empty() {
                return Err(CodecError::BadConnectPayload("hostname CONNECT has an empty host"));
            }
            if addr_bytes.len() > 247 {
                return Err(CodecError::BadConnectPayload("hostname CONNECT exceeds the 247-byte maximum"));
            }
            let host = std::str::from_utf8(addr_bytes)
                .map_err(|_| CodecError::BadConnectPayload("hostname is not valid UTF-8"))?
                .to_string();
            Ok(ConnectTarget::Hostname { host, port })
        } else {
            let octets: [u8; 4] = addr_bytes
                .try_into()
                .map_err(|_| CodecError::BadConnectPayload("IPv4 CONNECT payload must carry exactly 4 address bytes"))?;
            Ok(ConnectTarget::Ipv4 { addr: Ipv4Addr::from(octets), port })
        }
    }

    /// The `host:port` string a gateway dials.
    pub fn dial_string(&self) -> String {
        match self {
            ConnectTarget::Ipv4 { addr, port } => format!("{addr}:{port}"),
            ConnectTarget::Hostname { host, port } => format!("{host}:{port}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_ipv4_target() {
        let target = ConnectTarget::Ipv4 { addr: Ipv4Addr::new(10, 0, 0, 1), port: 8080 };
        let encoded = target.encode();
        assert_eq!(encoded.len(), 6);
        let decoded = ConnectTarget::decode(&encoded, target.is_hostname()).unwrap();
        assert_eq!(decoded, target);
        assert_eq!(decoded.dial_string(), "10.0.0.1:8080");
    }

    #[test]
    fn round_trips_hostname_target_of_varying_length() {
        for host in ["a", "gateway.example.internal", "x.y.z.example.co"] {
            let target = ConnectTarget::Hostname { host: host.to_string(), port: 443 };
            let encoded = target.encode();
            let decoded = ConnectTarget::decode(&encoded, target.is_hostname()).unwrap();
            assert_eq!(decoded, target);
        }
    }

    #[test]
    fn parse_chooses_mode_from_host_shape() {
        assert_eq!(
            ConnectTarget::parse("192.168.1.1:22").unwrap(),
            ConnectTarget::Ipv4 { addr: Ipv4Addr::new(192, 168, 1, 1), port: 22 }
        );
        assert_eq!(
            ConnectTarget::parse("example.com:22").unwrap(),
            ConnectTarget::Hostname { host: "example.com".to_string(), port: 22 }
        );
    }

    #[test]
    fn rejects_empty_hostname() {
        let err = ConnectTarget::decode(&[0, 0], true).unwrap_err();
        assert!(matches!(err, CodecError::BadConnectPayload(_)));
    }

    #[test]
    fn rejects_wrong_length_ipv4_payload() {
        let err = ConnectTarget::decode(&[1, 2, 3, 0, 0], false).unwrap_err();
        assert!(matches!(err, CodecError::BadConnectPayload(_)));
    }

    #[test]
    fn accepts_hostname_at_the_247_byte_limit() {
        let host = "a".repeat(247);
        let target = ConnectTarget::Hostname { host, port: 22 };
        let encoded = target.encode();
        let decoded = ConnectTarget::decode(&encoded, true).unwrap();
        assert_eq!(decoded, target);
    }

    #[test]
    fn rejects_hostname_over_the_247_byte_limit() {
        let host = "a".repeat(248);
        let encoded = ConnectTarget::Hostname { host, port: 22 }.encode();
        let err = ConnectTarget::decode(&encoded, true).unwrap_err();
        assert!(matches!(err, CodecError::BadConnectPayload(_)));
    }
}
