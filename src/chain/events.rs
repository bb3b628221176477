//! Chain event types and ABI decoding.
//!
//! `Publication` and `NewPeer` are the two event families the tailer knows
//! how to parse. Each carries its own `decode(log)` constructor, so the set
//! of event kinds is a closed sum type rather than an open class hierarchy.

use crate::error::ChainRpcError;

/// A single decoded log entry as returned by the chain RPC client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLog {
    pub log_index: u64,
    pub block_number: u64,
    pub block_hash: String,
    pub transaction_hash: String,
    pub transaction_index: u64,
    pub address: String,
    pub data: String,
    pub topics: Vec<String>,
}

/// Announces a published bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub reply_to: String,
    pub magnet: String,
    pub source: String,
    pub size: u64,
    pub retention: u32,
    pub transaction_hash: String,
}

/// Announces a newly-seen peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPeer {
    pub addr: String,
    pub hostname: String,
    pub transaction_hash: String,
}

/// Closed sum type over every chain event family the tailer can parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    Publication(Publication),
    NewPeer(NewPeer),
}

impl ChainEvent {
    pub fn transaction_hash(&self) -> &str {
        match self {
            ChainEvent::Publication(p) => &p.transaction_hash,
            ChainEvent::NewPeer(p) => &p.transaction_hash,
        }
    }
}

/// Strip the `0x` prefix (if present) from a hex string.
fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x").unwrap_or(s)
}

/// Decode a 32-byte topic/data word as a hex digest (used for `reply_to` and
/// `magnet`, both `bytes32 indexed` in the ABI).
fn bytes32_to_hex(word: &str) -> String {
    strip_0x(word).to_lowercase()
}

/// Decode a 32-byte topic/data word as ASCII, trimming trailing NUL padding
/// (used for `hostname`, a `bytes32 ASCII` field).
fn bytes32_to_ascii(word: &str) -> Result<String, ChainRpcError> {
    let hex_str = strip_0x(word);
    let bytes = hex::decode(hex_str)
        .map_err(|e| ChainRpcError::Decode(format!("invalid hex in bytes32 field: {e}")))?;
    let trimmed: Vec<u8> = bytes.into_iter().take_while(|b| *b != 0).collect();
    String::from_utf8(trimmed)
        .map_err(|e| ChainRpcError::Decode(format!("hostname is not valid ASCII: {e}")))
}

/// Decode a `uint256`/`uint32`-style right-aligned hex word as an integer.
fn word_to_u64(word: &str) -> Result<u64, ChainRpcError> {
    let hex_str = strip_0x(word);
    u64::from_str_radix(hex_str.trim_start_matches('0'), 16)
        .or_else(|_| if hex_str.chars().all(|c| c == '0') { Ok(0) } else { Err(()) })
        .map_err(|_| ChainRpcError::Decode(format!("invalid uint word: {word}")))
}

/// `address` is a 20-byte value right-padded in a 32-byte topic word.
fn word_to_address(word: &str) -> String {
    let hex_str = strip_0x(word);
    let start = hex_str.len().saturating_sub(40);
    format!("0x{}", &hex_str[start..])
}

impl Publication {
    /// `Publication(replyTo: bytes32 indexed, magnet: bytes32 indexed, source: address, size: uint256, retention: uint32)`
    ///
    /// `topics[0]` is the event signature hash; `topics[1]` = replyTo,
    /// `topics[2]` = magnet (both indexed). `data` packs `source`, `size`,
    /// `retention` as three consecutive 32-byte words.
    pub fn decode(log: &RawLog) -> Result<Self, ChainRpcError> {
        let reply_to_topic = log
            .topics
            .get(1)
            .ok_or_else(|| ChainRpcError::Decode("missing replyTo topic".to_string()))?;
        let magnet_topic = log
            .topics
            .get(2)
            .ok_or_else(|| ChainRpcError::Decode("missing magnet topic".to_string()))?;

        let data = strip_0x(&log.data);
        if data.len() < 64 * 3 {
            return Err(ChainRpcError::Decode("Publication data too short".to_string()));
        }
        let source_word = &data[0..64];
        let size_word = &data[64..128];
        let retention_word = &data[128..192];

        Ok(Publication {
            reply_to: bytes32_to_hex(reply_to_topic),
            magnet: bytes32_to_hex(magnet_topic),
            source: word_to_address(source_word),
            size: word_to_u64(size_word)?,
            retention: word_to_u64(retention_word)? as u32,
            transaction_hash: log.transaction_hash.clone(),
        })
    }
}

impl NewPeer {
    /// `NewPeer(addr: address, hostname: bytes32 ASCII)`. Neither field is
    /// indexed, so both live in `data` as two consecutive 32-byte words.
    pub fn decode(log: &RawLog) -> Result<Self, ChainRpcError> {
        let data = strip_0x(&log.data);
        if data.len() < 64 * 2 {
            return Err(ChainRpcError::Decode("NewPeer data too short".to_string()));
        }
        let addr_word = &data[0..64];
        let hostname_word = &data[64..128];

        Ok(NewPeer {
            addr: word_to_address(addr_word),
            hostname: bytes32_to_ascii(hostname_word)?,
            transaction_hash: log.transaction_hash.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word_hex(s: &str) -> String {
        format!("{:0>64}", s)
    }

    #[test]
    fn decodes_publication_fields_with_hex_and_numeric_conversions() {
        let reply_to = "13600b294191fc92924bb3ce4b969c1e7e2bab8f4c93c3fc6d0a51733df3c060";
        let magnet = "23600b294191fc92924bb3ce4b969c1e7e2bab8f4c93c3fc6d0a51733df3c060";
        let data = format!(
            "0x{}{}{}",
            word_hex("000000000000000000000000aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"),
            word_hex("64"),
            word_hex("a")
        );
        let log = RawLog {
            log_index: 0,
            block_number: 100,
            block_hash: "0xabc".to_string(),
            transaction_hash: "0xdeadbeef".to_string(),
            transaction_index: 0,
            address: "0xcontract".to_string(),
            data,
            topics: vec!["0xsig".to_string(), format!("0x{reply_to}"), format!("0x{magnet}")],
        };
        let publication = Publication::decode(&log).unwrap();
        assert_eq!(publication.reply_to, reply_to);
        assert_eq!(publication.magnet, magnet);
        assert_eq!(publication.size, 0x64);
        assert_eq!(publication.retention, 0xa);
        assert_eq!(publication.transaction_hash, "0xdeadbeef");
    }

    #[test]
    fn decodes_new_peer_hostname_as_trimmed_ascii() {
        let addr_word = word_hex("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        let hostname_hex = hex::encode(b"my-hidden-service");
        let hostname_word = format!("{:0<64}", hostname_hex);
        let data = format!("0x{addr_word}{hostname_word}");
        let log = RawLog {
            log_index: 0,
            block_number: 1,
            block_hash: "0xabc".to_string(),
            transaction_hash: "0xtx1".to_string(),
            transaction_index: 0,
            address: "0xcontract".to_string(),
            data,
            topics: vec!["0xsig".to_string()],
        };
        let peer = NewPeer::decode(&log).unwrap();
        assert_eq!(peer.hostname, "my-hidden-service");
        assert_eq!(peer.addr, "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
    }
}
