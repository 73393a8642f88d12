//! Connection Types

use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// One active proxied flow as reported by the network core
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    /// Stable identity assigned by the core, never reused
    pub uuid: String,
    /// Transport tag (tcp, udp, ...)
    pub network: String,
    pub src: String,
    pub dst: String,
    /// Sniffed hostname, empty until known
    #[serde(default)]
    pub host: String,
    /// Unix epoch milliseconds
    pub start: u64,
    pub upload_total: u64,
    pub download_total: u64,
    /// Outbound rule that matched this flow
    pub rule: String,
}

impl Connection {
    /// Source IP address, if `src` is a socket address or a bare IP
    pub fn source_ip(&self) -> Option<std::net::IpAddr> {
        if let Ok(addr) = self.src.parse::<std::net::SocketAddr>() {
            return Some(addr.ip());
        }
        self.src.parse().ok()
    }
}

/// Field used to order a view of the ledger.
///
/// The set is closed: every key has a comparator and there is no fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    #[serde(alias = "time")]
    Start,
    #[serde(alias = "uuid")]
    Id,
    #[serde(alias = "src")]
    Source,
    #[serde(alias = "dst")]
    Destination,
    Upload,
    Download,
}

impl SortKey {
    pub const ALL: [SortKey; 6] = [
        SortKey::Start,
        SortKey::Id,
        SortKey::Source,
        SortKey::Destination,
        SortKey::Upload,
        SortKey::Download,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Start => "start",
            SortKey::Id => "id",
            SortKey::Source => "source",
            SortKey::Destination => "destination",
            SortKey::Upload => "upload",
            SortKey::Download => "download",
        }
    }

    /// Ascending comparison of two connections on this key
    pub fn compare(&self, a: &Connection, b: &Connection) -> Ordering {
        match self {
            SortKey::Start => a.start.cmp(&b.start),
            SortKey::Id => a.uuid.cmp(&b.uuid),
            SortKey::Source => a.src.cmp(&b.src),
            SortKey::Destination => a.dst.cmp(&b.dst),
            SortKey::Upload => a.upload_total.cmp(&b.upload_total),
            SortKey::Download => a.download_total.cmp(&b.download_total),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" | "time" => Ok(SortKey::Start),
            "id" | "uuid" => Ok(SortKey::Id),
            "source" | "src" => Ok(SortKey::Source),
            "destination" | "dst" => Ok(SortKey::Destination),
            "upload" => Ok(SortKey::Upload),
            "download" => Ok(SortKey::Download),
            other => bail!(
                "unknown sort key '{}', expected one of: start, id, source, destination, upload, download",
                other
            ),
        }
    }
}

/// Complete, point-in-time enumeration of active connections
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    pub generation: u64,
    pub connections: Vec<Connection>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn get(&self, uuid: &str) -> Option<&Connection> {
        self.connections.iter().find(|c| c.uuid == uuid)
    }

    pub fn contains(&self, uuid: &str) -> bool {
        self.get(uuid).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(uuid: &str, src: &str) -> Connection {
        Connection {
            uuid: uuid.to_string(),
            network: "tcp".to_string(),
            src: src.to_string(),
            dst: "1.1.1.1:443".to_string(),
            host: String::new(),
            start: 0,
            upload_total: 0,
            download_total: 0,
            rule: "proxy".to_string(),
        }
    }

    #[test]
    fn test_sort_key_parsing() {
        assert_eq!("start".parse::<SortKey>().unwrap(), SortKey::Start);
        assert_eq!("time".parse::<SortKey>().unwrap(), SortKey::Start);
        assert_eq!("SRC".parse::<SortKey>().unwrap(), SortKey::Source);
        assert_eq!("dst".parse::<SortKey>().unwrap(), SortKey::Destination);
        assert!("latency".parse::<SortKey>().is_err());

        for key in SortKey::ALL {
            assert_eq!(key.as_str().parse::<SortKey>().unwrap(), key);
        }
    }

    #[test]
    fn test_serde_accepts_parse_aliases() {
        for (alias, key) in [
            ("time", SortKey::Start),
            ("uuid", SortKey::Id),
            ("src", SortKey::Source),
            ("dst", SortKey::Destination),
        ] {
            let from_json: SortKey = serde_json::from_str(&format!("\"{}\"", alias)).unwrap();
            assert_eq!(from_json, key);
            assert_eq!(alias.parse::<SortKey>().unwrap(), key);
        }

        // Aliases are input only
        assert_eq!(serde_json::to_string(&SortKey::Destination).unwrap(), "\"destination\"");
    }

    #[test]
    fn test_camel_case_wire_names() {
        let json = r#"{
            "uuid": "a1",
            "network": "udp",
            "src": "10.0.0.2:5353",
            "dst": "8.8.8.8:53",
            "start": 1700000000000,
            "uploadTotal": 12,
            "downloadTotal": 34,
            "rule": "dns"
        }"#;

        let c: Connection = serde_json::from_str(json).unwrap();
        assert_eq!(c.host, "");
        assert_eq!(c.upload_total, 12);
        assert_eq!(c.download_total, 34);

        let back = serde_json::to_value(&c).unwrap();
        assert!(back.get("uploadTotal").is_some());
        assert!(back.get("upload_total").is_none());
    }

    #[test]
    fn test_source_ip() {
        assert_eq!(
            conn("a", "192.168.1.5:40000").source_ip(),
            Some("192.168.1.5".parse().unwrap())
        );
        assert_eq!(
            conn("b", "[fd00::1]:443").source_ip(),
            Some("fd00::1".parse().unwrap())
        );
        assert_eq!(conn("c", "10.1.1.1").source_ip(), Some("10.1.1.1".parse().unwrap()));
        assert_eq!(conn("d", "not-an-ip").source_ip(), None);
    }
}
