//! Compact emoji-reaction wire format and hash.
//!
//! A reaction frame is a short ASCII header holding a Crockford-base32
//! hash of the target message, followed by the reacting emoji and the
//! sender's display name. The hash is computed over
//! `senderPrefix || messageTimestamp(LE) || messageText`.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

const CROCKFORD_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Length, in base32 characters, of the message hash header.
pub const HASH_LEN: usize = 8;

/// A parsed reaction to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    /// Crockford base32 hash of the reacted-to message.
    pub message_hash: String,
    /// The reacting emoji (a grapheme cluster, may be multiple `char`s).
    pub emoji: String,
    /// Display name of the sender who reacted.
    pub sender_name: String,
}

/// Encodes `bytes` as Crockford base32 (no padding).
#[must_use]
pub fn crockford_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len().div_ceil(5) * 8);
    let mut buffer: u64 = 0;
    let mut bits = 0u32;

    for &byte in bytes {
        buffer = (buffer << 8) | u64::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            let index = ((buffer >> bits) & 0x1F) as usize;
            out.push(CROCKFORD_ALPHABET[index] as char);
        }
    }

    if bits > 0 {
        let index = ((buffer << (5 - bits)) & 0x1F) as usize;
        out.push(CROCKFORD_ALPHABET[index] as char);
    }

    out
}

/// Computes the message hash used as the reaction header:
/// Crockford base32 over `senderPrefix || timestamp(LE) || text`,
/// truncated to [`HASH_LEN`] characters.
#[must_use]
pub fn message_hash(sender_prefix: &[u8], timestamp: u32, text: &str) -> String {
    let mut buf = BytesMut::with_capacity(sender_prefix.len() + 4 + text.len());
    buf.put_slice(sender_prefix);
    buf.put_u32_le(timestamp);
    buf.put_slice(text.as_bytes());
    let full = crockford_encode(&buf);
    full.chars().take(HASH_LEN).collect()
}

/// Encodes a reaction wire frame: `hash || emoji || '\0' || sender_name`.
#[must_use]
pub fn encode_reaction(message_hash: &str, emoji: &str, sender_name: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(message_hash.len() + emoji.len() + 1 + sender_name.len());
    buf.put_slice(message_hash.as_bytes());
    buf.put_slice(emoji.as_bytes());
    buf.put_u8(0);
    buf.put_slice(sender_name.as_bytes());
    buf.freeze()
}

/// Parses a reaction wire frame produced by [`encode_reaction`].
pub fn parse_reaction(data: &[u8]) -> Result<Reaction> {
    if data.len() < HASH_LEN {
        return Err(Error::Protocol {
            message: format!("reaction frame too short: {} bytes", data.len()),
        });
    }

    let message_hash = String::from_utf8_lossy(&data[..HASH_LEN]).into_owned();
    let rest = &data[HASH_LEN..];

    let nul_pos = rest.iter().position(|&b| b == 0).ok_or_else(|| Error::Protocol {
        message: "reaction frame missing sender-name separator".into(),
    })?;

    let emoji = String::from_utf8_lossy(&rest[..nul_pos]).into_owned();
    let sender_name = String::from_utf8_lossy(&rest[nul_pos + 1..]).into_owned();

    Ok(Reaction {
        message_hash,
        emoji,
        sender_name,
    })
}

/// Deduplication key for a reaction: `(messageID, senderName, emoji)`.
#[must_use]
pub fn reaction_key(message_id: &str, sender_name: &str, emoji: &str) -> String {
    format!("{message_id}\u{1}{sender_name}\u{1}{emoji}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crockford_encode_known_value() {
        // 0xFF -> 5 bits 11111 = 'Z', remaining 3 bits 111<<2=11100=28='W'
        assert_eq!(crockford_encode(&[0xFF]), "ZW");
    }

    #[test]
    fn test_message_hash_is_deterministic() {
        let a = message_hash(&[1, 2, 3, 4, 5, 6], 1000, "hello");
        let b = message_hash(&[1, 2, 3, 4, 5, 6], 1000, "hello");
        assert_eq!(a, b);
        assert_eq!(a.len(), HASH_LEN);
    }

    #[test]
    fn test_message_hash_differs_on_text_change() {
        let a = message_hash(&[1, 2, 3, 4, 5, 6], 1000, "hello");
        let b = message_hash(&[1, 2, 3, 4, 5, 6], 1000, "world");
        assert_ne!(a, b);
    }

    #[test]
    fn test_encode_parse_round_trip() {
        let hash = message_hash(&[9, 9, 9, 9, 9, 9], 42, "hi");
        let frame = encode_reaction(&hash, "\u{1F44D}", "Alice");
        let reaction = parse_reaction(&frame).unwrap();
        assert_eq!(reaction.message_hash, hash);
        assert_eq!(reaction.emoji, "\u{1F44D}");
        assert_eq!(reaction.sender_name, "Alice");
    }

    #[test]
    fn test_parse_reaction_too_short() {
        assert!(parse_reaction(b"abc").is_err());
    }

    #[test]
    fn test_reaction_key_dedup() {
        let k1 = reaction_key("msg1", "Alice", "\u{1F44D}");
        let k2 = reaction_key("msg1", "Alice", "\u{1F44D}");
        let k3 = reaction_key("msg1", "Bob", "\u{1F44D}");
        assert_eq!(k1, k2);
        assert_ne!(k1, k3);
    }
}
