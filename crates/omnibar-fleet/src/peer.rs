//! Peer node addressing.

/// One cluster peer: its advertised node id and the base URL its fleet
/// surface listens on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerNode {
    /// Node id as advertised by `NODE_ID` on that node (e.g. `server@zelan`).
    pub node_id: String,
    /// Base URL of that node's API server, no trailing slash.
    pub base_url: String,
}

/// Parse a `CLUSTER_PEERS` entry.
///
/// Accepts `node_id=host:port` (preferred, lets the router address a peer
/// by the same id it advertises in `process.state_changed` envelopes) or a
/// bare `host:port`, in which case the address itself is used as the node
/// id until the peer's first response reveals otherwise.
#[must_use]
pub fn parse_peer(raw: &str) -> Option<PeerNode> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let (node_id, address) = raw.split_once('=').unwrap_or((raw, raw));
    let base_url = if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{address}")
    };
    Some(PeerNode {
        node_id: node_id.trim().to_string(),
        base_url: base_url.trim_end_matches('/').to_string(),
    })
}

/// Parse every entry in a `CLUSTER_PEERS`-style list, skipping blanks.
#[must_use]
pub fn parse_peers(raw: &[String]) -> Vec<PeerNode> {
    raw.iter().filter_map(|entry| parse_peer(entry)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_node_id_and_address_pair() {
        let peer = parse_peer("server@zelan=10.0.0.2:7175").expect("parse");
        assert_eq!(peer.node_id, "server@zelan");
        assert_eq!(peer.base_url, "http://10.0.0.2:7175");
    }

    #[test]
    fn bare_address_is_used_as_its_own_node_id() {
        let peer = parse_peer("10.0.0.3:7175").expect("parse");
        assert_eq!(peer.node_id, "10.0.0.3:7175");
        assert_eq!(peer.base_url, "http://10.0.0.3:7175");
    }

    #[test]
    fn preserves_an_explicit_scheme() {
        let peer = parse_peer("server@zelan=https://10.0.0.2:7175").expect("parse");
        assert_eq!(peer.base_url, "https://10.0.0.2:7175");
    }

    #[test]
    fn blank_entries_are_skipped() {
        assert!(parse_peers(&["".to_string(), "  ".to_string()]).is_empty());
    }
}
