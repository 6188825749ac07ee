use std::net::{Ipv4Addr, Ipv6Addr};

use etherparse::IpNumber;

use crate::layer::{Confidence, Layer};

/// Upper-layer protocol label and dispatch segment for an IP protocol number.
pub(crate) fn ip_protocol(number: u8) -> Option<(&'static str, &'static str)> {
    let entry = match IpNumber(number) {
        IpNumber::ICMP => ("ICMP", "icmp"),
        IpNumber::IGMP => ("IGMP", "igmp"),
        IpNumber::TCP => ("TCP", "tcp"),
        IpNumber::UDP => ("UDP", "udp"),
        IpNumber::IPV6_ICMP => ("ICMPv6", "icmpv6"),
        _ => return None,
    };
    Some(entry)
}

/// Zero-filled IPv4 address from up to four bytes.
pub(crate) fn ipv4_addr(bytes: &[u8]) -> Ipv4Addr {
    let mut raw = [0u8; 4];
    let len = bytes.len().min(raw.len());
    raw[..len].copy_from_slice(&bytes[..len]);
    Ipv4Addr::from(raw)
}

/// Zero-filled IPv6 address from up to sixteen bytes.
pub(crate) fn ipv6_addr(bytes: &[u8]) -> Ipv6Addr {
    let mut raw = [0u8; 16];
    let len = bytes.len().min(raw.len());
    raw[..len].copy_from_slice(&bytes[..len]);
    Ipv6Addr::from(raw)
}

pub(crate) fn mac_addr(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "00:00:00:00:00:00".to_string();
    }
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// `Error` once any field or layer-level check failed, `Exact` otherwise.
pub(crate) fn settle_confidence(layer: &mut Layer) {
    let confidence = if layer.has_errors() {
        Confidence::Error
    } else {
        Confidence::Exact
    };
    layer.set_confidence(confidence);
}

/// FNV-1a, used for stable stream keys.
pub(crate) fn fnv1a(parts: &[&[u8]]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET;
    for part in parts {
        for byte in *part {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(PRIME);
        }
        hash ^= 0xff;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::{fnv1a, ip_protocol, ipv6_addr, mac_addr};

    #[test]
    fn known_protocols() {
        assert_eq!(ip_protocol(6), Some(("TCP", "tcp")));
        assert_eq!(ip_protocol(17), Some(("UDP", "udp")));
        assert_eq!(ip_protocol(200), None);
    }

    #[test]
    fn short_addresses_are_zero_filled() {
        assert_eq!(ipv6_addr(&[]).to_string(), "::");
        assert_eq!(ipv6_addr(&[0xfe, 0x80]).to_string(), "fe80::");
    }

    #[test]
    fn mac_formatting() {
        assert_eq!(mac_addr(&[1, 2, 3, 4, 5, 0xab]), "01:02:03:04:05:ab");
        assert_eq!(mac_addr(&[]), "00:00:00:00:00:00");
    }

    #[test]
    fn fnv_separates_parts() {
        assert_ne!(fnv1a(&[b"ab", b"c"]), fnv1a(&[b"a", b"bc"]));
        assert_eq!(fnv1a(&[b"x"]), fnv1a(&[b"x"]));
    }
}
