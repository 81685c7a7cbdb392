//! Target host validation.
//!
//! Only public IPv4 addresses, public IPv4 networks and syntactically valid
//! domain names are queried.

use crate::error::{Result, SurveyorError};
use crate::types::Target;
use ipnet::Ipv4Net;
use regex::Regex;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::OnceLock;

/// Networks never sent to a search source.
const PRIVATE_NETWORKS: [(Ipv4Addr, u8); 5] = [
    (Ipv4Addr::new(10, 0, 0, 0), 8),
    (Ipv4Addr::new(172, 16, 0, 0), 12),
    (Ipv4Addr::new(192, 168, 0, 0), 16),
    (Ipv4Addr::new(127, 0, 0, 0), 8),
    (Ipv4Addr::new(169, 254, 0, 0), 16),
];

fn domain_regex() -> &'static Regex {
    static DOMAIN_REGEX: OnceLock<Regex> = OnceLock::new();
    DOMAIN_REGEX.get_or_init(|| {
        Regex::new(r"^([a-zA-Z0-9]([a-zA-Z0-9\-]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z]{2,}$")
            .expect("valid regex")
    })
}

/// Whether `ip` falls in a private, loopback or link-local range.
#[must_use]
pub fn is_private_ipv4(ip: Ipv4Addr) -> bool {
    PRIVATE_NETWORKS.iter().any(|(addr, prefix)| {
        Ipv4Net::new(*addr, *prefix).is_ok_and(|net| net.contains(&ip))
    })
}

/// Check a single host, returning the reason it was rejected.
pub fn validate_host(host: &str) -> Result<()> {
    let host = host.trim();
    let reject = |reason: &str| {
        Err(SurveyorError::InvalidTarget {
            host: host.to_string(),
            reason: reason.to_string(),
        })
    };

    if host.is_empty() {
        return reject("empty host");
    }
    if host.starts_with("http") {
        return reject("URLs are not accepted, use the bare host");
    }

    if host.contains('/') {
        return match host.parse::<Ipv4Net>() {
            Ok(net) if is_private_ipv4(net.network()) => reject("private network"),
            Ok(_) => Ok(()),
            Err(_) => reject("malformed IPv4 network"),
        };
    }

    match host.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) if is_private_ipv4(ip) => reject("private address"),
        Ok(IpAddr::V4(_)) => Ok(()),
        Ok(IpAddr::V6(_)) => reject("IPv6 is not supported"),
        Err(_) if domain_regex().is_match(host) => Ok(()),
        Err(_) => reject("not an IPv4 address, IPv4 network or domain"),
    }
}

/// Whether a target should be queried.
#[must_use]
pub fn is_valid_target(target: &Target) -> bool {
    validate_host(&target.host).is_ok()
}

/// Keep the valid targets, logging each rejection.
#[must_use]
pub fn filter_valid(targets: Vec<Target>) -> Vec<Target> {
    let total = targets.len();
    let valid: Vec<Target> = targets
        .into_iter()
        .filter(|target| match validate_host(&target.host) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(organization = %target.organization, "Skipping target: {}", e);
                false
            }
        })
        .collect();

    tracing::info!("{} of {} targets passed validation", valid.len(), total);
    valid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_addresses_accepted() {
        assert!(validate_host("8.8.8.8").is_ok());
        assert!(validate_host("1.2.3.0/24").is_ok());
        assert!(validate_host(" 203.0.113.7 ").is_ok());
    }

    #[test]
    fn test_private_ranges_rejected() {
        for host in [
            "10.1.2.3",
            "172.16.0.1",
            "172.31.255.255",
            "192.168.1.1",
            "127.0.0.1",
            "169.254.10.10",
            "10.0.0.0/24",
        ] {
            assert!(validate_host(host).is_err(), "{host} should be rejected");
        }
        // Just outside 172.16.0.0/12
        assert!(validate_host("172.32.0.1").is_ok());
    }

    #[test]
    fn test_domains() {
        assert!(validate_host("example.com").is_ok());
        assert!(validate_host("sub-1.example.co.uk").is_ok());
        assert!(validate_host("-bad.example.com").is_err());
        assert!(validate_host("localhost").is_err());
        assert!(validate_host("example.c").is_err());
    }

    #[test]
    fn test_rejects_urls_and_ipv6() {
        assert!(validate_host("http://example.com").is_err());
        assert!(validate_host("https://example.com").is_err());
        assert!(validate_host("2001:db8::1").is_err());
        assert!(validate_host("1.2.3.0/40").is_err());
        assert!(validate_host("").is_err());
    }

    #[test]
    fn test_rejection_reason() {
        let err = validate_host("192.168.0.1").expect_err("private address");
        assert_eq!(
            err.to_string(),
            "invalid target '192.168.0.1': private address"
        );
    }

    #[test]
    fn test_filter_valid() {
        let targets = vec![
            Target::new("A", "example.com"),
            Target::new("A", "10.0.0.1"),
            Target::new("B", "8.8.8.0/24"),
            Target::new("B", "not a host"),
        ];
        let valid = filter_valid(targets);
        assert_eq!(
            valid,
            vec![Target::new("A", "example.com"), Target::new("B", "8.8.8.0/24")]
        );
        assert!(is_valid_target(&valid[0]));
    }
}
