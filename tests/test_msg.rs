// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Envelope tests: wire form of the 8-byte header and the padded slot
// builder.

use memlink::{build_slot, LinkError, MsgHeader, HEADER_BYTES};

#[test]
fn header_wire_form() {
    let hdr = MsgHeader {
        subtype: 0x2A,
        error_code: 0xDEAD_BEEF,
    };
    let mut buf = [0u8; HEADER_BYTES];
    hdr.encode_into(&mut buf).expect("encode");

    assert_eq!(buf[..4], 0x2Au32.to_ne_bytes());
    assert_eq!(buf[4..], 0xDEAD_BEEFu32.to_ne_bytes());

    let back = MsgHeader::decode(&buf).expect("decode");
    assert_eq!(back, hdr);
    assert!(back.is_error());
}

#[test]
fn zero_error_code_means_ok() {
    let hdr = MsgHeader::new(7);
    assert_eq!(hdr.error_code, 0);
    assert!(!hdr.is_error());
}

#[test]
fn short_buffers_rejected() {
    let hdr = MsgHeader::new(1);
    let mut short = [0u8; HEADER_BYTES - 1];
    assert!(matches!(
        hdr.encode_into(&mut short),
        Err(LinkError::InvalidSize { .. })
    ));
    assert!(matches!(
        MsgHeader::decode(&short),
        Err(LinkError::InvalidSize { .. })
    ));
}

#[test]
fn slot_builder_pads_to_entry_size() {
    let hdr = MsgHeader::new(2);
    let slot = build_slot(&hdr, b"abc", 24).expect("build");
    assert_eq!(slot.len(), 24);

    let (back, payload) = MsgHeader::split(&slot).expect("split");
    assert_eq!(back, hdr);
    assert_eq!(&payload[..3], b"abc");
    assert!(payload[3..].iter().all(|&b| b == 0));
}

#[test]
fn slot_builder_rejects_overflow() {
    let hdr = MsgHeader::new(0);
    // 8 header bytes + 9 payload bytes > 16-byte slot.
    let err = build_slot(&hdr, &[0u8; 9], 16).unwrap_err();
    assert!(matches!(err, LinkError::InvalidSize { size: 17, max: 16 }));
}

#[test]
fn error_code_survives_round_trip() {
    let hdr = MsgHeader {
        subtype: 1,
        error_code: 113,
    };
    let slot = build_slot(&hdr, &[], 16).expect("build");
    let (back, _) = MsgHeader::split(&slot).expect("split");
    assert_eq!(back.error_code, 113);
    assert!(back.is_error());
}
