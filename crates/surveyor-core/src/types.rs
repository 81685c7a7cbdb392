//! Target types shared across Surveyor crates.

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// Shape of a target host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostKind {
    /// A domain name
    Domain,
    /// A single IPv4 address
    Ip,
    /// An IPv4 network in CIDR notation
    Cidr,
}

impl HostKind {
    /// Classify a host string.
    ///
    /// Anything that does not parse as an IPv4 address or IPv4 network is
    /// treated as a domain.
    #[must_use]
    pub fn classify(host: &str) -> Self {
        let host = host.trim();
        if host.contains('/') && host.parse::<Ipv4Net>().is_ok() {
            Self::Cidr
        } else if host.parse::<Ipv4Addr>().is_ok() {
            Self::Ip
        } else {
            Self::Domain
        }
    }

    /// Whether the host should be searched with an IP-match expression.
    #[must_use]
    pub fn is_address(self) -> bool {
        matches!(self, Self::Ip | Self::Cidr)
    }
}

/// Returns true when `value` is a bare IPv4 address or IPv4 CIDR.
#[must_use]
pub fn is_ip_or_cidr(value: &str) -> bool {
    HostKind::classify(value).is_address()
}

/// External search sources Surveyor can aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// 360 Quake
    Quake,
    /// FOFA
    Fofa,
    /// Qianxin Hunter
    Hunter,
}

impl SourceKind {
    /// All known sources, in query order.
    pub const ALL: [SourceKind; 3] = [Self::Quake, Self::Fofa, Self::Hunter];

    /// Provenance tag written to the `source` column.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quake => "quake",
            Self::Fofa => "fofa",
            Self::Hunter => "hunter",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One host to query, with the organization it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    /// Organization label the host is attributed to
    pub organization: String,
    /// Domain, IPv4 address or IPv4 CIDR
    pub host: String,
}

impl Target {
    /// Create a new target.
    #[must_use]
    pub fn new(organization: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            host: host.into(),
        }
    }

    /// Classify this target's host.
    #[must_use]
    pub fn kind(&self) -> HostKind {
        HostKind::classify(&self.host)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.host, self.organization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_hosts() {
        assert_eq!(HostKind::classify("example.com"), HostKind::Domain);
        assert_eq!(HostKind::classify("1.2.3.4"), HostKind::Ip);
        assert_eq!(HostKind::classify("1.2.3.0/24"), HostKind::Cidr);
        assert_eq!(HostKind::classify(" 1.2.3.0/24 "), HostKind::Cidr);
        // Malformed networks fall through to domain
        assert_eq!(HostKind::classify("1.2.3.0/33"), HostKind::Domain);
    }

    #[test]
    fn test_is_ip_or_cidr() {
        assert!(is_ip_or_cidr("8.8.8.8"));
        assert!(is_ip_or_cidr("8.8.8.0/24"));
        assert!(!is_ip_or_cidr("dns.google"));
        assert!(!is_ip_or_cidr(""));
    }

    #[test]
    fn test_source_tags() {
        let tags: Vec<&str> = SourceKind::ALL.iter().map(|s| s.as_str()).collect();
        assert_eq!(tags, vec!["quake", "fofa", "hunter"]);
        assert_eq!(SourceKind::Fofa.to_string(), "fofa");
    }

    #[test]
    fn test_target_kind() {
        let target = Target::new("X", "example.com");
        assert_eq!(target.kind(), HostKind::Domain);
        assert!(!target.kind().is_address());
        assert_eq!(target.to_string(), "example.com (X)");
    }
}
