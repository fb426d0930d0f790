// [libs/infra/discovery/src/range.rs]
/*!
 * =================================================================
 * APARATO: PARSEO DE RANGOS IP (V1.0)
 * CLASIFICACIÓN: INFRA LAYER (ESTRATO L3)
 * RESPONSABILIDAD: EXPANSIÓN ACOTADA DE RANGOS/CIDR A LISTAS DE IP
 * =================================================================
 */

use std::net::Ipv4Addr;

use thiserror::Error;

pub const MAX_IPS: usize = 10_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeParseError {
    #[error("invalid IP address: {0}")]
    InvalidAddress(String),
    #[error("invalid CIDR notation: {0}")]
    InvalidCidr(String),
    #[error("IP range too large, maximum {MAX_IPS} IPs allowed")]
    RangeTooLarge,
}

/// Expande un rango `start..=end` (orden normalizado automáticamente)
/// en la lista de direcciones contenidas, acotado a [`MAX_IPS`].
pub fn parse_ip_range(start_ip: &str, end_ip: &str) -> Result<Vec<Ipv4Addr>, RangeParseError> {
    let start: Ipv4Addr = start_ip
        .trim()
        .parse()
        .map_err(|_| RangeParseError::InvalidAddress(start_ip.to_string()))?;
    let end: Ipv4Addr = end_ip
        .trim()
        .parse()
        .map_err(|_| RangeParseError::InvalidAddress(end_ip.to_string()))?;

    let (lo, hi) = if u32::from(start) <= u32::from(end) {
        (start, end)
    } else {
        (end, start)
    };

    let lo_int = u32::from(lo);
    let hi_int = u32::from(hi);

    if (hi_int - lo_int) as usize > MAX_IPS {
        return Err(RangeParseError::RangeTooLarge);
    }

    Ok((lo_int..=hi_int).map(Ipv4Addr::from).collect())
}

/// Expande una notación CIDR en sus direcciones de host (excluye red y
/// broadcast para prefijos < /31, como `ipaddress.IPv4Network.hosts()`).
pub fn parse_cidr(cidr: &str) -> Result<Vec<Ipv4Addr>, RangeParseError> {
    let cidr = cidr.trim();
    let (addr_part, prefix_part) = cidr
        .split_once('/')
        .ok_or_else(|| RangeParseError::InvalidCidr(cidr.to_string()))?;

    let base: Ipv4Addr = addr_part
        .parse()
        .map_err(|_| RangeParseError::InvalidCidr(cidr.to_string()))?;
    let prefix_len: u32 = prefix_part
        .parse()
        .map_err(|_| RangeParseError::InvalidCidr(cidr.to_string()))?;

    if prefix_len > 32 {
        return Err(RangeParseError::InvalidCidr(cidr.to_string()));
    }

    let host_bits = 32 - prefix_len;
    let num_addresses: u64 = 1u64 << host_bits;

    if num_addresses > MAX_IPS as u64 {
        return Err(RangeParseError::RangeTooLarge);
    }

    let mask: u32 = if prefix_len == 0 {
        0
    } else {
        u32::MAX << host_bits
    };
    let network = u32::from(base) & mask;

    if prefix_len >= 31 {
        return Ok((network..network + num_addresses as u32).map(Ipv4Addr::from).collect());
    }

    let broadcast = network | !mask;
    Ok(((network + 1)..broadcast).map(Ipv4Addr::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_small_range_in_order() {
        let ips = parse_ip_range("10.0.0.1", "10.0.0.3").unwrap();
        assert_eq!(ips, vec![
            "10.0.0.1".parse::<Ipv4Addr>().unwrap(),
            "10.0.0.2".parse().unwrap(),
            "10.0.0.3".parse().unwrap(),
        ]);
    }

    #[test]
    fn normalizes_reversed_range() {
        let ips = parse_ip_range("10.0.0.3", "10.0.0.1").unwrap();
        assert_eq!(ips.len(), 3);
        assert_eq!(ips[0], "10.0.0.1".parse::<Ipv4Addr>().unwrap());
    }

    #[test]
    fn rejects_oversized_range() {
        let err = parse_ip_range("10.0.0.1", "10.1.0.1").unwrap_err();
        assert_eq!(err, RangeParseError::RangeTooLarge);
    }

    #[test]
    fn cidr_slash_24_yields_254_hosts() {
        let ips = parse_cidr("192.168.1.0/24").unwrap();
        assert_eq!(ips.len(), 254);
        assert_eq!(ips[0], "192.168.1.1".parse::<Ipv4Addr>().unwrap());
        assert_eq!(ips[253], "192.168.1.254".parse::<Ipv4Addr>().unwrap());
    }

    #[test]
    fn cidr_slash_30_excludes_network_and_broadcast() {
        let ips = parse_cidr("10.0.0.0/30").unwrap();
        assert_eq!(ips.len(), 2);
        assert_eq!(ips[0], "10.0.0.1".parse::<Ipv4Addr>().unwrap());
        assert_eq!(ips[1], "10.0.0.2".parse::<Ipv4Addr>().unwrap());
    }
}
