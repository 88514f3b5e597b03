// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use hex_literal::hex;
use tacplus_server_rs::models::{
    common::{Flags, HEADER_LEN, Header, MinorVersion, PacketType, Version, WireError},
    obfuscate,
};

/// Frames a body the way the connection layer does: header bytes followed
/// by the keystream-XORed body.
fn encode_frame(header: &Header, body: &[u8], secret: &[u8]) -> Vec<u8> {
    let mut frame = header.to_bytes().to_vec();
    let mut payload = body.to_vec();
    if !header.flags.contains(Flags::UNENCRYPTED) {
        obfuscate::toggle(header, secret, &mut payload);
    }
    frame.extend_from_slice(&payload);
    frame
}

fn decode_frame(frame: &[u8], secret: &[u8]) -> Result<(Header, Vec<u8>), WireError> {
    let header = Header::from_bytes(&frame[..HEADER_LEN])?;
    let mut body = frame[HEADER_LEN..].to_vec();
    if !header.flags.contains(Flags::UNENCRYPTED) {
        obfuscate::toggle(&header, secret, &mut body);
    }
    Ok((header, body))
}

#[test]
fn known_header_bytes() {
    // authentication, seq 1, session 0x01020304, 16-byte body
    let bytes = hex!("c0 01 01 00 01020304 00000010");
    let header = Header::from_bytes(&bytes).expect("valid header");

    assert_eq!(header.version, Version::new(MinorVersion::Default));
    assert_eq!(header.ty, PacketType::Authen);
    assert_eq!(header.seq_no, 1);
    assert_eq!(header.session_id, 0x0102_0304);
    assert_eq!(header.length, 16);
    assert_eq!(header.to_bytes(), bytes);
}

#[test]
fn frame_round_trip_through_obfuscation() {
    let header = Header {
        version: Version::new(MinorVersion::Default),
        ty: PacketType::Author,
        seq_no: 1,
        flags: Flags::empty(),
        session_id: 0xCAFE_F00D,
        length: 21,
    };
    let body = b"service=shellcmd=show";

    let frame = encode_frame(&header, body, b"fortytwo");
    assert_ne!(&frame[HEADER_LEN..], body.as_slice());

    let (decoded_header, decoded_body) =
        decode_frame(&frame, b"fortytwo").expect("decodable frame");
    assert_eq!(decoded_header, header);
    assert_eq!(decoded_body, body);
}

#[test]
fn plaintext_flag_skips_the_keystream() {
    let header = Header {
        version: Version::new(MinorVersion::Default),
        ty: PacketType::Acct,
        seq_no: 1,
        flags: Flags::UNENCRYPTED,
        session_id: 7,
        length: 5,
    };
    let frame = encode_frame(&header, b"hello", b"irrelevant");
    assert_eq!(&frame[HEADER_LEN..], b"hello");
}

#[test]
fn bad_type_and_version_are_rejected() {
    let mut bytes = hex!("c0 04 01 00 00000001 00000000");
    assert_eq!(Header::from_bytes(&bytes), Err(WireError::BadType(0x04)));

    bytes[0] = 0x10;
    bytes[1] = 0x01;
    assert_eq!(
        Header::from_bytes(&bytes),
        Err(WireError::VersionUnsupported(0x10))
    );
}

#[test]
fn truncated_header_is_rejected() {
    let bytes = hex!("c0 01 01 00 000000");
    assert_eq!(
        Header::from_bytes(&bytes),
        Err(WireError::Truncated("header"))
    );
}
