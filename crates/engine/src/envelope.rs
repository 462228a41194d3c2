//! Stored record envelope
//!
//! Every value in the data sub-map carries the tag of the type that wrote it:
//!
//! ```text
//! [tag_len: u16 BE][tag bytes][codec payload]
//! ```
//!
//! The tag lets reads reject a record written as another type and lets the
//! type index be rebuilt from the data alone.

use byteorder::{BigEndian, ByteOrder};

use recordstore_core::{StoreError, StoreResult, TypeTag};

/// Wrap a codec payload with its tag
pub fn encode_envelope(tag: &TypeTag, payload: &[u8]) -> Vec<u8> {
    let tag_bytes = tag.as_bytes();
    let mut buf = vec![0u8; 2 + tag_bytes.len() + payload.len()];
    BigEndian::write_u16(&mut buf[..2], tag_bytes.len() as u16);
    buf[2..2 + tag_bytes.len()].copy_from_slice(tag_bytes);
    buf[2 + tag_bytes.len()..].copy_from_slice(payload);
    buf
}

/// Split a stored value into its tag and codec payload
pub fn decode_envelope(raw: &[u8]) -> StoreResult<(TypeTag, &[u8])> {
    if raw.len() < 2 {
        return Err(StoreError::Corruption(format!(
            "Envelope too short: {} bytes",
            raw.len()
        )));
    }
    let tag_len = BigEndian::read_u16(&raw[..2]) as usize;
    let Some(tag_bytes) = raw.get(2..2 + tag_len) else {
        return Err(StoreError::Corruption(format!(
            "Envelope declares {}-byte tag but holds {} bytes",
            tag_len,
            raw.len() - 2
        )));
    };
    let tag = std::str::from_utf8(tag_bytes)
        .map_err(|e| StoreError::Corruption(format!("Envelope tag is not UTF-8: {}", e)))?;
    let tag = TypeTag::new(tag)
        .map_err(|e| StoreError::Corruption(format!("Envelope tag is invalid: {}", e)))?;
    Ok((tag, &raw[2 + tag_len..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_envelope_layout() {
        let tag = TypeTag::new("widget").unwrap();
        let raw = encode_envelope(&tag, b"{}");
        assert_eq!(&raw[..2], &[0, 6]);
        assert_eq!(&raw[2..8], b"widget");
        assert_eq!(&raw[8..], b"{}");

        let (decoded, payload) = decode_envelope(&raw).unwrap();
        assert_eq!(decoded, tag);
        assert_eq!(payload, b"{}");
    }

    #[test]
    fn test_empty_payload() {
        let tag = TypeTag::new("t").unwrap();
        let raw = encode_envelope(&tag, b"");
        let (_, payload) = decode_envelope(&raw).unwrap();
        assert!(payload.is_empty());
    }

    #[test]
    fn test_malformed_envelopes() {
        assert!(decode_envelope(b"").is_err());
        assert!(decode_envelope(&[0]).is_err());
        assert!(decode_envelope(&[0, 9, b'a']).is_err());
        assert!(decode_envelope(&[0, 2, 0xFF, 0xFE]).is_err());
        assert!(decode_envelope(&[0, 0, b'{', b'}']).is_err());
    }

    proptest! {
        #[test]
        fn test_arbitrary_bytes_never_panic(raw in proptest::collection::vec(any::<u8>(), 0..64)) {
            let _ = decode_envelope(&raw);
        }

        #[test]
        fn test_payload_survives_wrapping(tag in "[a-z]{1,16}", payload in proptest::collection::vec(any::<u8>(), 0..64)) {
            let tag = TypeTag::new(tag).unwrap();
            let raw = encode_envelope(&tag, &payload);
            let (decoded, rest) = decode_envelope(&raw).unwrap();
            prop_assert_eq!(decoded, tag);
            prop_assert_eq!(rest, payload.as_slice());
        }
    }
}
