//! Entry framing: round trips, CRC checks, truncated buffers

use splaylsm::wal::{Operation, WalEntry, HEADER_SIZE};
use splaylsm::SplayError;

use super::{delete, merge, put};

// =============================================================================
// Round Trips
// =============================================================================

#[test]
fn test_each_operation_survives_framing() {
    for (lsn, op) in [
        (1, put("hello", "world")),
        (2, merge("counter", &[0x02, b'x'])),
        (3, delete("gone")),
        (4, put("", "")),
    ] {
        let entry = WalEntry::new(lsn, op);
        let recovered = WalEntry::deserialize(&entry.serialize().unwrap()).unwrap();
        assert_eq!(recovered, entry);
    }
}

#[test]
fn test_large_merge_operand() {
    let operand = vec![0xAB; 512 * 1024];
    let entry = WalEntry::new(7, merge("big", &operand));
    let recovered = WalEntry::deserialize(&entry.serialize().unwrap()).unwrap();

    match recovered.operation {
        Operation::Merge { key, operand: got } => {
            assert_eq!(key, b"big");
            assert_eq!(got, operand);
        }
        other => panic!("Expected Merge operation, got {:?}", other),
    }
}

#[test]
fn test_serialized_size_matches() {
    let entry = WalEntry::new(1, put("test_key", "test_value"));
    assert_eq!(
        entry.serialize().unwrap().len(),
        entry.serialized_size().unwrap()
    );
}

#[test]
fn test_operation_key_accessor() {
    assert_eq!(put("a", "1").key(), b"a");
    assert_eq!(merge("b", b"x").key(), b"b");
    assert_eq!(delete("c").key(), b"c");
}

// =============================================================================
// Corruption
// =============================================================================

#[test]
fn test_payload_corruption_detected() {
    let mut bytes = WalEntry::new(1, put("key", "value")).serialize().unwrap();
    if let Some(byte) = bytes.last_mut() {
        *byte ^= 0xFF;
    }

    let err = WalEntry::deserialize(&bytes).unwrap_err();
    assert!(matches!(err, SplayError::WalCorruption(_)));
}

#[test]
fn test_lsn_corruption_detected() {
    let mut bytes = WalEntry::new(1, put("key", "value")).serialize().unwrap();
    bytes[0] ^= 0x01;

    assert!(WalEntry::deserialize(&bytes).is_err());
}

#[test]
fn test_truncated_buffers_rejected() {
    let bytes = WalEntry::new(1, delete("key")).serialize().unwrap();

    assert!(WalEntry::deserialize(&[]).is_err());
    assert!(WalEntry::deserialize(&bytes[..HEADER_SIZE - 1]).is_err());
    assert!(WalEntry::deserialize(&bytes[..HEADER_SIZE + 2]).is_err());
}
