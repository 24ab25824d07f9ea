//! Session integration tests: handshake, framing and sequencing against a
//! loopback broker.

mod common;

use common::{connect_client, connected_pair, FakeBroker};
use proptest::prelude::*;
use proptest::test_runner::{Config, TestRunner};
use rtma_client::{Client, ClientError, ClientState, ControlVerb, MessageHeader};
use rtma_codec::{host_ids, ConnectData, ModuleReady, ProtocolError, MAX_DATA_BYTES};
use rtma_network::TransportError;
use std::cell::RefCell;
use std::thread;
use std::time::{Duration, Instant};

mod handshake {
    use super::*;

    #[test]
    fn test_connect_sends_connect_with_flags() {
        let broker = FakeBroker::bind();
        let mut client = Client::new(5, 1);
        client.set_connect_flags(true, false);

        let (_conn, connect) = connect_client(&mut client, &broker, 0);

        assert!(connect.message_type().is(ControlVerb::Connect));
        assert_eq!(connect.header.msg_count, 1);
        assert_eq!(connect.header.src_mod_id, 5);
        assert_eq!(connect.header.src_host_id, 1);
        assert_eq!(
            connect.payload_as::<ConnectData>().unwrap(),
            ConnectData {
                logger_status: 1,
                daemon_status: 0
            }
        );

        assert!(client.is_connected());
        assert_eq!(client.server_addr(), Some(broker.addr()));
        assert!(client.start_time() > 0.0);
    }

    #[test]
    fn test_dynamic_module_id_adopted_from_ack() {
        let (mut client, mut conn, _broker) = connected_pair(0, 7);
        assert_eq!(client.module_id(), 7);

        client.send_signal(1234).unwrap();
        assert_eq!(conn.read_message().header.src_mod_id, 7);
    }

    #[test]
    fn test_fixed_module_id_kept() {
        let (client, _conn, _broker) = connected_pair(5, 9);
        assert_eq!(client.module_id(), 5);
    }

    #[test]
    fn test_unacknowledged_connect_resets_session() {
        let broker = FakeBroker::bind();
        let mut client = Client::new(0, 0);
        client.set_ack_timeout(Duration::from_millis(200));

        let addr = broker.addr().to_string();
        let silent = thread::scope(|s| {
            let server = s.spawn(|| {
                let mut conn = broker.accept();
                conn.read_message();
                conn
            });

            let start = Instant::now();
            let result = client.connect_to(&addr);
            assert!(start.elapsed() >= Duration::from_millis(190));
            assert!(matches!(
                result,
                Err(ClientError::AckTimeout {
                    operation: "connect",
                    ..
                })
            ));
            server.join().unwrap()
        });
        drop(silent);

        assert_eq!(client.state(), ClientState::Unconnected);
        assert_eq!(client.server_addr(), None);
        assert_eq!(client.msg_count(), 0);
        assert_eq!(client.start_time(), 0.0);

        // The same session can connect again
        connect_client(&mut client, &broker, 3);
        assert!(client.is_connected());
        assert_eq!(client.module_id(), 3);
    }

    #[test]
    fn test_connect_refused() {
        let addr = FakeBroker::bind().addr();

        let mut client = Client::new(0, 0);
        match client.connect_addr(addr) {
            Err(ClientError::Transport(TransportError::Connect { .. })) => {}
            other => panic!("Expected connect error, got {:?}", other),
        }
        assert_eq!(client.state(), ClientState::Unconnected);
    }

    #[test]
    fn test_connect_twice_rejected() {
        let (mut client, _conn, broker) = connected_pair(4, 0);
        assert!(matches!(
            client.connect_to(&broker.addr().to_string()),
            Err(ClientError::AlreadyConnected { .. })
        ));
        assert!(client.is_connected());
    }
}

mod framing {
    use super::*;

    #[test]
    fn test_payload_lengths_survive_round_trip() {
        let (client, conn, _broker) = connected_pair(5, 0);
        let client = RefCell::new(client);
        let conn = RefCell::new(conn);

        let mut runner = TestRunner::new(Config::with_cases(64));
        runner
            .run(
                &prop::collection::vec(any::<u8>(), 0..=MAX_DATA_BYTES),
                |payload| {
                    let mut client = client.borrow_mut();
                    let mut conn = conn.borrow_mut();

                    client.send(4321, &payload).unwrap();
                    let wire = conn.read_message();
                    conn.write_message(&wire);

                    let received = client.receive(-1.0).unwrap().unwrap();
                    prop_assert!(received.header.recv_time >= received.header.send_time);

                    let mut header = received.header;
                    header.recv_time = 0.0;
                    prop_assert_eq!(header, wire.header);
                    prop_assert_eq!(header.num_data_bytes as usize, payload.len());
                    prop_assert_eq!(&received.payload[..], &payload[..]);
                    Ok(())
                },
            )
            .unwrap();
    }

    #[test]
    fn test_sequence_numbers_consecutive() {
        let (mut client, mut conn, _broker) = connected_pair(5, 0);

        // CONNECT carried sequence number 1
        for _ in 0..50 {
            client.send(1234, b"seq").unwrap();
        }
        for expected in 2..=51 {
            assert_eq!(conn.read_message().header.msg_count, expected);
        }
        assert_eq!(client.msg_count(), 51);
    }

    #[test]
    fn test_max_payload_boundary() {
        let (mut client, mut conn, _broker) = connected_pair(5, 0);

        let written = client.send(1234, &vec![7u8; MAX_DATA_BYTES]).unwrap();
        assert_eq!(written, Some(MessageHeader::SIZE + MAX_DATA_BYTES));
        assert_eq!(conn.read_message().payload.len(), MAX_DATA_BYTES);

        let before = client.msg_count();
        match client.send(1234, &vec![7u8; MAX_DATA_BYTES + 1]) {
            Err(ClientError::Protocol(ProtocolError::PayloadTooLarge { size, max })) => {
                assert_eq!(size, 4097);
                assert_eq!(max, 4096);
            }
            other => panic!("Expected PayloadTooLarge, got {:?}", other),
        }
        assert!(conn.is_silent_for(Duration::from_millis(100)));
        assert_eq!(client.msg_count(), before);
    }

    #[test]
    fn test_signal_round_trip() {
        let (mut client, mut conn, _broker) = connected_pair(5, 0);

        client.send_signal(1234).unwrap();
        let wire = conn.read_message();
        assert_eq!(wire.header.num_data_bytes, 0);
        assert!(wire.is_signal());
        conn.write_message(&wire);

        let received = client.receive(-1.0).unwrap().unwrap();
        assert_eq!(received.header.msg_type, 1234);
        assert!(received.header.recv_time > received.header.send_time);
    }

    #[test]
    fn test_send_to_keeps_destination() {
        let (mut client, mut conn, _broker) = connected_pair(5, 0);

        client.send_to(2000, b"direct", 9, host_ids::ALL_HOSTS).unwrap();
        client.send_signal_to(2001, 3, 2).unwrap();

        let first = conn.read_message();
        assert_eq!(first.header.dest_mod_id, 9);
        assert_eq!(first.header.dest_host_id, host_ids::ALL_HOSTS);
        assert_eq!(&first.payload[..], b"direct");

        let second = conn.read_message();
        assert_eq!((second.header.dest_mod_id, second.header.dest_host_id), (3, 2));

        assert!(matches!(
            client.send_to(2000, b"", 201, 0),
            Err(ClientError::Protocol(ProtocolError::InvalidDestination { .. }))
        ));
        assert!(conn.is_silent_for(Duration::from_millis(50)));
    }

    #[test]
    fn test_broadcast_header_defaults() {
        let (mut client, mut conn, _broker) = connected_pair(5, 0);

        client.send(1500, b"abc").unwrap();
        let header = conn.read_message().header;
        assert_eq!(header.dest_mod_id, 0);
        assert_eq!(header.dest_host_id, 0);
        assert_eq!(header.is_dynamic, 0);
        assert_eq!(header.reserved, 0);
        assert_eq!(header.remaining_bytes, 0);
        assert_eq!(header.recv_time, 0.0);
    }

    #[test]
    fn test_module_ready_carries_pid() {
        let (mut client, mut conn, _broker) = connected_pair(5, 0);

        client.send_module_ready().unwrap();
        let ready = conn.read_message();
        assert_eq!(
            ready.definition::<ModuleReady>(),
            Some(ModuleReady {
                pid: std::process::id() as i32
            })
        );
    }
}

mod receiving {
    use super::*;

    #[test]
    fn test_nonblocking_receive_returns_promptly() {
        let (mut client, _conn, _broker) = connected_pair(5, 0);

        let start = Instant::now();
        assert!(client.receive(0.0).unwrap().is_none());
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_bounded_receive_times_out() {
        let (mut client, _conn, _broker) = connected_pair(5, 0);

        let start = Instant::now();
        assert!(client.receive(0.1).unwrap().is_none());
        assert!(start.elapsed() >= Duration::from_millis(95));
    }

    #[test]
    fn test_blocking_receive_waits_for_delayed_writer() {
        let (mut client, mut conn, _broker) = connected_pair(5, 0);

        let writer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            conn.send(1234, b"late");
            conn
        });

        let start = Instant::now();
        let message = client.receive(-1.0).unwrap().unwrap();
        assert!(start.elapsed() >= Duration::from_millis(150));
        assert_eq!(&message.payload[..], b"late");
        writer.join().unwrap();
    }

    #[test]
    fn test_peer_close_mid_header_is_short_read() {
        let (mut client, mut conn, _broker) = connected_pair(5, 0);

        conn.write_raw(&[0u8; 20]);
        drop(conn);

        match client.receive(-1.0) {
            Err(ClientError::Transport(TransportError::ShortRead { received, .. })) => {
                assert_eq!(received, 20)
            }
            other => panic!("Expected ShortRead, got {:?}", other),
        }
    }

    #[test]
    fn test_payload_read_ignores_receive_timeout() {
        let (mut client, mut conn, _broker) = connected_pair(5, 0);

        let mut header = MessageHeader::new(1234);
        header.num_data_bytes = 100;
        conn.write_raw(zerocopy::AsBytes::as_bytes(&header));

        let writer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(300));
            conn.write_raw(&[7u8; 100]);
            conn
        });

        // The timeout only bounds the wait for a header
        let start = Instant::now();
        let message = client.receive(0.05).unwrap().unwrap();
        assert!(start.elapsed() >= Duration::from_millis(250));
        assert_eq!(message.payload.len(), 100);
        assert!(message.payload.iter().all(|&b| b == 7));
        writer.join().unwrap();
    }

    #[test]
    fn test_peer_close_mid_payload_is_short_read() {
        let (mut client, mut conn, _broker) = connected_pair(5, 0);

        let mut header = MessageHeader::new(1234);
        header.num_data_bytes = 100;
        conn.write_raw(zerocopy::AsBytes::as_bytes(&header));
        conn.write_raw(&[0u8; 32]);
        drop(conn);

        match client.receive(1.0) {
            Err(ClientError::Transport(TransportError::ShortRead {
                operation,
                expected,
                received,
            })) => {
                assert_eq!(operation, "recv payload");
                assert_eq!(expected, 100);
                assert_eq!(received, 32);
            }
            other => panic!("Expected ShortRead, got {:?}", other),
        }
    }

    #[test]
    fn test_corrupt_payload_length_rejected() {
        let (mut client, mut conn, _broker) = connected_pair(5, 0);

        let mut header = MessageHeader::new(1234);
        header.num_data_bytes = 5000;
        conn.write_raw(zerocopy::AsBytes::as_bytes(&header));

        let err = client.receive(-1.0).unwrap_err();
        assert!(matches!(
            err,
            ClientError::Protocol(ProtocolError::InvalidPayloadLength { declared: 5000, .. })
        ));
        assert!(err.is_fatal());
    }
}

mod lifecycle {
    use super::*;

    #[test]
    fn test_disconnect_and_reconnect() {
        let broker = FakeBroker::bind();
        let mut client = Client::new(0, 2);
        let (mut conn, _) = connect_client(&mut client, &broker, 11);
        client.send_signal(1234).unwrap();
        assert_eq!(client.module_id(), 11);

        client.disconnect().unwrap();
        assert_eq!(client.state(), ClientState::Disconnected);
        assert_eq!(client.module_id(), 0);
        assert_eq!(client.host_id(), 2);
        assert_eq!(client.msg_count(), 0);
        assert!(client.transport_stats().is_none());

        conn.read_message();
        assert!(conn.read_message().message_type().is(ControlVerb::Disconnect));
        assert!(conn.is_closed());

        // Idempotent
        client.disconnect().unwrap();
        assert!(matches!(client.send_signal(1234), Err(ClientError::NotConnected)));

        let (_conn, connect) = connect_client(&mut client, &broker, 12);
        assert_eq!(connect.header.msg_count, 1);
        assert_eq!(client.module_id(), 12);
        assert!(client.is_connected());
    }

    #[test]
    fn test_drop_closes_without_farewell() {
        let (client, mut conn, _broker) = connected_pair(5, 0);
        drop(client);
        assert!(conn.is_closed());
    }

    #[test]
    fn test_transport_stats_count_bytes() {
        let (mut client, mut conn, _broker) = connected_pair(5, 0);

        client.send(1234, &[0u8; 100]).unwrap();
        conn.read_message();

        let stats = client.transport_stats().unwrap();
        // CONNECT (48 + 4) plus this message (48 + 100)
        assert_eq!(stats.bytes_sent, 52 + 148);
        // ACKNOWLEDGE
        assert_eq!(stats.bytes_received, 48);
    }
}
