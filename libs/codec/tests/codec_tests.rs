//! # RTMA Codec Integration Tests
//!
//! Exercises the public codec API the way the client crate uses it: header
//! first, then a payload whose length is only known after decoding.

use proptest::prelude::*;
use rtma_codec::{
    ConnectData, ControlVerb, FailSubscribe, Message, MessageHeader, MessageType, Payload,
    ProtocolError, SubscriptionControl, ALL_MESSAGE_TYPES, MAX_DATA_BYTES,
};
use zerocopy::AsBytes;

fn header_for(msg_type: i32, len: usize) -> MessageHeader {
    let mut header = MessageHeader::new(msg_type);
    header.msg_count = 3;
    header.send_time = 1_700_000_000.25;
    header.src_host_id = 1;
    header.src_mod_id = 101;
    header.num_data_bytes = len as i32;
    header
}

#[test]
fn test_two_step_decode() {
    let msg = Message::new(
        header_for(5000, 0),
        Payload::copy_from_slice(&[0xAB; 300]).unwrap(),
    );
    let wire = msg.encode();

    // Receivers pull the header, then exactly the announced payload
    let header = MessageHeader::decode(&wire[..MessageHeader::SIZE]).unwrap();
    let len = header.payload_len().unwrap();
    assert_eq!(len, 300);
    let payload = Payload::copy_from_slice(&wire[MessageHeader::SIZE..MessageHeader::SIZE + len]).unwrap();

    assert_eq!(Message { header, payload }, msg);
}

#[test]
fn test_corrupt_length_rejected() {
    let mut header = header_for(5000, 0);
    header.num_data_bytes = (MAX_DATA_BYTES + 10) as i32;
    let err = Message::decode(header.as_bytes()).unwrap_err();

    assert!(matches!(err, ProtocolError::InvalidPayloadLength { declared, .. } if declared == 4106));
}

#[test]
fn test_subscription_payload_wire_value() {
    let payload = Payload::from_struct(&SubscriptionControl { msg_type: 99 }).unwrap();
    assert_eq!(&payload[..], &99i32.to_ne_bytes());

    let wildcard = Payload::from_struct(&SubscriptionControl {
        msg_type: ALL_MESSAGE_TYPES,
    })
    .unwrap();
    assert_eq!(
        MessageType::from(wildcard.read_struct::<i32>().unwrap()),
        MessageType::AllTypes
    );
}

#[test]
fn test_control_dispatch_by_pattern() {
    let messages = [
        Message::new(MessageHeader::new(ControlVerb::Acknowledge), Payload::empty()),
        Message::new(
            MessageHeader::new(ControlVerb::FailSubscribe),
            Payload::from_struct(&FailSubscribe {
                mod_id: 12,
                reserved: 0,
                msg_type: 777,
            })
            .unwrap(),
        ),
        Message::new(MessageHeader::new(1234), Payload::empty()),
    ];

    let mut acks = 0;
    let mut failed_types = Vec::new();
    let mut app = 0;
    for msg in &messages {
        match msg.message_type() {
            MessageType::Control(ControlVerb::Acknowledge) => acks += 1,
            MessageType::Control(ControlVerb::FailSubscribe) => {
                failed_types.push(msg.definition::<FailSubscribe>().unwrap().msg_type)
            }
            MessageType::Application(_) => app += 1,
            _ => {}
        }
    }

    assert_eq!(acks, 1);
    assert_eq!(failed_types, vec![777]);
    assert_eq!(app, 1);
}

#[test]
fn test_connect_payload_defaults() {
    let payload = Payload::from_struct(&ConnectData::default()).unwrap();
    assert_eq!(&payload[..], &[0, 0, 0, 0]);
}

proptest! {
    #[test]
    fn prop_payload_survives_encoding(data in proptest::collection::vec(any::<u8>(), 0..=MAX_DATA_BYTES)) {
        let msg = Message::new(header_for(1234, 0), Payload::new(data.clone()).unwrap());
        let decoded = Message::decode(&msg.encode()).unwrap();

        prop_assert_eq!(decoded.header.num_data_bytes as usize, data.len());
        prop_assert_eq!(&decoded.payload[..], &data[..]);
    }

    #[test]
    fn prop_oversized_payload_rejected(extra in 1usize..1024) {
        let result = Payload::new(vec![0u8; MAX_DATA_BYTES + extra]);
        prop_assert_eq!(
            result.unwrap_err(),
            ProtocolError::PayloadTooLarge { size: MAX_DATA_BYTES + extra, max: MAX_DATA_BYTES }
        );
    }
}
