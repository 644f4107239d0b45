use bytes::Bytes;
use serde_json::json;

use ignition_kernel::jupyter::messages::MessageHeader;
use ignition_kernel::jupyter::signature::MessageSigner;
use ignition_kernel::jupyter::wire::{DELIMITER, WireMessage};

fn signer() -> MessageSigner {
    MessageSigner::new("hmac-sha256", b"25efe46d-b4a86582e13078bde5455bd0").unwrap()
}

fn header(msg_type: &str) -> MessageHeader {
    MessageHeader {
        date: "2023-06-28T05:58:34.523Z".to_string(),
        msg_id: "be70a42b-81a7-4790-983b-fcbcea47d7d6_14252_0".to_string(),
        msg_type: msg_type.to_string(),
        session: "be70a42b-81a7-4790-983b-fcbcea47d7d6".to_string(),
        username: "username".to_string(),
        version: "5.3".to_string(),
    }
}

/// Hand-built frames, the shape a real client emits.
fn client_frames(content: serde_json::Value) -> Vec<Bytes> {
    let signer = signer();
    let header_bytes = serde_json::to_vec(&serde_json::to_value(header("execute_request")).unwrap()).unwrap();
    let parent_bytes = b"{}".to_vec();
    let metadata_bytes = b"{}".to_vec();
    let content_bytes = serde_json::to_vec(&content).unwrap();
    let signature = signer.sign(&[&header_bytes, &parent_bytes, &metadata_bytes, &content_bytes]);
    vec![
        Bytes::from_static(b"00D70480B4"),
        Bytes::from_static(DELIMITER),
        Bytes::from(signature.into_bytes()),
        Bytes::from(header_bytes),
        Bytes::from(parent_bytes),
        Bytes::from(metadata_bytes),
        Bytes::from(content_bytes),
    ]
}

#[test]
fn parses_a_client_message() {
    let frames = client_frames(json!({"code": "1+2", "silent": false, "store_history": true}));
    let message = WireMessage::parse(&frames, &signer()).unwrap();
    assert_eq!(message.msg_type(), "execute_request");
    assert_eq!(message.ids, vec![Bytes::from_static(b"00D70480B4")]);
    assert!(message.parent_header.is_none());
    assert_eq!(message.content["code"], "1+2");
    assert!(message.buffers.is_empty());
}

#[test]
fn serialize_then_parse_is_identity() {
    let signer = signer();
    let message = WireMessage {
        ids: vec![Bytes::from_static(b"router-identity")],
        header: header("kernel_info_request"),
        parent_header: Some(header("execute_request")),
        metadata: json!({"cellId": "abc123"}),
        content: json!({"user_expressions": {}, "code": "x = 1"}),
        buffers: vec![Bytes::from_static(b"\x00\x01\x02\xff")],
    };
    let frames = message.to_frames(&signer).unwrap();
    let parsed = WireMessage::parse(&frames, &signer).unwrap();
    assert_eq!(parsed, message);
    assert_eq!(parsed.to_frames(&signer).unwrap(), frames);
}

#[test]
fn tampering_with_content_is_rejected() {
    let mut frames = client_frames(json!({"code": "1+2"}));
    let mut tampered = frames[6].to_vec();
    let last = tampered.len() - 2;
    tampered[last] ^= 0x20;
    frames[6] = Bytes::from(tampered);
    let err = WireMessage::parse(&frames, &signer()).unwrap_err();
    assert!(matches!(
        err,
        ignition_kernel::jupyter::errors::WireError::BadSignature
    ));
}

#[test]
fn wrong_key_is_rejected() {
    let frames = client_frames(json!({"code": "1+2"}));
    let other = MessageSigner::new("hmac-sha256", b"a-different-key").unwrap();
    assert!(matches!(
        WireMessage::parse(&frames, &other),
        Err(ignition_kernel::jupyter::errors::WireError::BadSignature)
    ));
}

#[test]
fn extra_frames_become_buffers() {
    let mut frames = client_frames(json!({"code": ""}));
    frames.push(Bytes::from_static(b"raw-buffer-1"));
    frames.push(Bytes::from_static(b"raw-buffer-2"));
    let message = WireMessage::parse(&frames, &signer()).unwrap();
    assert_eq!(
        message.buffers,
        vec![
            Bytes::from_static(b"raw-buffer-1"),
            Bytes::from_static(b"raw-buffer-2")
        ]
    );
}

#[test]
fn sha512_scheme_round_trips() {
    let signer = MessageSigner::new("hmac-sha512", b"key-512").unwrap();
    let message = WireMessage {
        ids: vec![],
        header: header("status"),
        parent_header: None,
        metadata: json!({}),
        content: json!({"execution_state": "idle"}),
        buffers: vec![],
    };
    let frames = message.to_frames(&signer).unwrap();
    assert_eq!(WireMessage::parse(&frames, &signer).unwrap(), message);
}
