//! Loopback stand-in for the Message Manager
//!
//! Speaks the wire format over a real TCP socket so session behavior is
//! tested end to end, no mocks.

#![allow(dead_code)]

use rtma_client::{Client, ControlVerb, Message, MessageHeader, MessageType, Payload};
use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

pub struct FakeBroker {
    listener: TcpListener,
}

impl FakeBroker {
    pub fn bind() -> Self {
        Self {
            listener: TcpListener::bind("127.0.0.1:0").unwrap(),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.listener.local_addr().unwrap()
    }

    pub fn accept(&self) -> BrokerConn {
        let (stream, _) = self.listener.accept().unwrap();
        stream.set_nodelay(true).unwrap();
        BrokerConn { stream }
    }
}

/// Broker side of one client connection
pub struct BrokerConn {
    stream: TcpStream,
}

impl BrokerConn {
    pub fn read_message(&mut self) -> Message {
        let mut raw = [0u8; MessageHeader::SIZE];
        self.stream.read_exact(&mut raw).unwrap();
        let header = MessageHeader::decode(&raw).unwrap();

        let mut body = vec![0u8; header.payload_len().unwrap()];
        self.stream.read_exact(&mut body).unwrap();

        Message {
            header,
            payload: Payload::try_from(body).unwrap(),
        }
    }

    /// Write `message` exactly as given
    pub fn write_message(&mut self, message: &Message) {
        self.stream.write_all(&message.encode()).unwrap();
    }

    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).unwrap();
    }

    pub fn send(&mut self, msg_type: impl Into<MessageType>, payload: &[u8]) {
        let message = Message::new(
            MessageHeader::new(msg_type),
            Payload::copy_from_slice(payload).unwrap(),
        );
        self.write_message(&message);
    }

    /// ACKNOWLEDGE addressed to `dest_mod_id`
    pub fn ack(&mut self, dest_mod_id: i16) {
        let mut header = MessageHeader::new(ControlVerb::Acknowledge);
        header.dest_mod_id = dest_mod_id;
        self.write_message(&Message::new(header, Payload::empty()));
    }

    /// True if nothing arrives within `wait`
    pub fn is_silent_for(&mut self, wait: Duration) -> bool {
        self.stream.set_read_timeout(Some(wait)).unwrap();
        let mut probe = [0u8; 1];
        let silent = match self.stream.peek(&mut probe) {
            Ok(_) => false,
            Err(e) => matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut),
        };
        self.stream.set_read_timeout(None).unwrap();
        silent
    }

    /// True once the client has closed its end
    pub fn is_closed(&mut self) -> bool {
        self.stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let mut probe = [0u8; 1];
        matches!(self.stream.read(&mut probe), Ok(0))
    }
}

/// Connected session whose CONNECT was acknowledged with `assigned_mod_id`
///
/// Returns the CONNECT message the broker saw alongside the connection.
pub fn connect_client(client: &mut Client, broker: &FakeBroker, assigned_mod_id: i16) -> (BrokerConn, Message) {
    let addr = broker.addr();

    thread::scope(|s| {
        let handshake = s.spawn(|| {
            let mut conn = broker.accept();
            let connect = conn.read_message();
            conn.ack(assigned_mod_id);
            (conn, connect)
        });

        client.connect_to(&addr.to_string()).unwrap();
        handshake.join().unwrap()
    })
}

/// Fresh broker plus a session connected to it
pub fn connected_pair(module_id: i16, assigned_mod_id: i16) -> (Client, BrokerConn, FakeBroker) {
    let broker = FakeBroker::bind();
    let mut client = Client::new(module_id, 0);
    let (conn, _) = connect_client(&mut client, &broker, assigned_mod_id);
    (client, conn, broker)
}
