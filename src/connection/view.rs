//! Sorted and filtered views over a snapshot

use super::types::{Connection, Snapshot, SortKey};
use crate::Result;
use anyhow::Context;
use ipnet::IpNet;
use regex::Regex;

/// Narrows a view to matching connections. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct ViewFilter {
    pub network: Option<String>,
    pub rule: Option<String>,
    /// Matched against `host`, falling back to `dst`
    pub host: Option<Regex>,
    pub source_net: Option<IpNet>,
}

impl ViewFilter {
    /// Build a filter from raw query strings
    pub fn parse(
        network: Option<&str>,
        rule: Option<&str>,
        host: Option<&str>,
        source_net: Option<&str>,
    ) -> Result<Self> {
        let host = host
            .filter(|p| !p.is_empty())
            .map(|p| Regex::new(p).with_context(|| format!("Invalid host pattern: {}", p)))
            .transpose()?;

        let source_net = source_net
            .filter(|n| !n.is_empty())
            .map(|n| {
                n.parse::<IpNet>()
                    .with_context(|| format!("Invalid source network: {}", n))
            })
            .transpose()?;

        Ok(Self {
            network: network.filter(|n| !n.is_empty()).map(str::to_string),
            rule: rule.filter(|r| !r.is_empty()).map(str::to_string),
            host,
            source_net,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.network.is_none() && self.rule.is_none() && self.host.is_none() && self.source_net.is_none()
    }

    pub fn matches(&self, conn: &Connection) -> bool {
        if let Some(network) = &self.network {
            if !conn.network.eq_ignore_ascii_case(network) {
                return false;
            }
        }

        if let Some(rule) = &self.rule {
            if &conn.rule != rule {
                return false;
            }
        }

        if let Some(pattern) = &self.host {
            let hit = if conn.host.is_empty() {
                pattern.is_match(&conn.dst)
            } else {
                pattern.is_match(&conn.host) || pattern.is_match(&conn.dst)
            };
            if !hit {
                return false;
            }
        }

        if let Some(net) = &self.source_net {
            match conn.source_ip() {
                Some(ip) if net.contains(&ip) => {}
                _ => return false,
            }
        }

        true
    }
}

/// Sort key, direction and filter for one view request
#[derive(Debug, Clone, Default)]
pub struct ViewQuery {
    pub sort_key: SortKey,
    pub descending: bool,
    pub filter: ViewFilter,
}

impl ViewQuery {
    pub fn new(sort_key: SortKey, descending: bool) -> Self {
        Self {
            sort_key,
            descending,
            filter: ViewFilter::default(),
        }
    }

    pub fn with_filter(mut self, filter: ViewFilter) -> Self {
        self.filter = filter;
        self
    }
}

/// Filtered, sorted copy of one snapshot
pub fn apply_query(snapshot: &Snapshot, query: &ViewQuery) -> Vec<Connection> {
    let mut connections: Vec<Connection> = snapshot
        .connections
        .iter()
        .filter(|c| query.filter.matches(c))
        .cloned()
        .collect();
    sort_connections(&mut connections, query.sort_key, query.descending);
    connections
}

/// Stable sort in place. Descending reverses the comparator, not the
/// output, so equal keys keep snapshot order in both directions.
pub fn sort_connections(connections: &mut [Connection], key: SortKey, descending: bool) {
    connections.sort_by(|a, b| {
        let ord = key.compare(a, b);
        if descending { ord.reverse() } else { ord }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(uuid: &str, network: &str, src: &str, host: &str, dst: &str, rule: &str) -> Connection {
        Connection {
            uuid: uuid.to_string(),
            network: network.to_string(),
            src: src.to_string(),
            dst: dst.to_string(),
            host: host.to_string(),
            start: 0,
            upload_total: 0,
            download_total: 0,
            rule: rule.to_string(),
        }
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let filter = ViewFilter::parse(None, Some(""), None, None).unwrap();
        assert!(filter.is_empty());
        assert!(filter.matches(&conn("a", "tcp", "10.0.0.1:1", "", "x:1", "direct")));
    }

    #[test]
    fn test_filter_fields() {
        let filter = ViewFilter::parse(
            Some("TCP"),
            Some("proxy"),
            Some(r"google\.com$"),
            Some("10.0.0.0/8"),
        )
        .unwrap();

        assert!(filter.matches(&conn("a", "tcp", "10.1.2.3:5000", "www.google.com", "142.250.1.1:443", "proxy")));
        assert!(!filter.matches(&conn("b", "udp", "10.1.2.3:5000", "www.google.com", "142.250.1.1:443", "proxy")));
        assert!(!filter.matches(&conn("c", "tcp", "10.1.2.3:5000", "www.google.com", "142.250.1.1:443", "direct")));
        assert!(!filter.matches(&conn("d", "tcp", "192.168.0.2:5000", "www.google.com", "142.250.1.1:443", "proxy")));
        assert!(!filter.matches(&conn("e", "tcp", "10.1.2.3:5000", "example.org", "93.184.216.34:443", "proxy")));
    }

    #[test]
    fn test_host_pattern_falls_back_to_destination() {
        let filter = ViewFilter::parse(None, None, Some("^1\\.1\\.1\\.1"), None).unwrap();
        assert!(filter.matches(&conn("a", "udp", "10.0.0.1:1", "", "1.1.1.1:53", "dns")));
    }

    #[test]
    fn test_invalid_filter_inputs() {
        assert!(ViewFilter::parse(None, None, Some("(unclosed"), None).is_err());
        assert!(ViewFilter::parse(None, None, None, Some("10.0.0.0/99")).is_err());
    }

    #[test]
    fn test_descending_keeps_tie_order() {
        let mut conns = vec![
            conn("a", "tcp", "1", "", "x", "r"),
            conn("b", "tcp", "1", "", "x", "r"),
            conn("c", "tcp", "0", "", "x", "r"),
        ];
        sort_connections(&mut conns, SortKey::Source, true);
        let ids: Vec<&str> = conns.iter().map(|c| c.uuid.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
