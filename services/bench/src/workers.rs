//! Publisher and subscriber sessions, one per thread

use crate::stats::{Role, Throughput};
use anyhow::{ensure, Context, Result};
use rtma_client::{Client, ControlVerb, MessageType, Timeout};
use rtma_config::ClientConfig;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const TEST_MSG: i32 = 1234;
pub const PUBLISHER_READY: i32 = 5677;
pub const PUBLISHER_DONE: i32 = 5678;
pub const SUBSCRIBER_READY: i32 = 5679;
pub const SUBSCRIBER_DONE: i32 = 5680;

/// Connected session subscribed to `types`, with MODULE_READY sent
pub fn open_session(config: &ClientConfig, types: &[MessageType]) -> Result<Client> {
    let mut client = Client::from_config(config)?;
    client
        .connect_addr(config.server_addr()?)
        .with_context(|| format!("connecting to {}", config.server))?;

    for &msg_type in types {
        let status = client.subscribe(msg_type)?;
        ensure!(
            status.is_acknowledged(),
            "subscription to {} was not acknowledged",
            msg_type
        );
    }
    client.send_module_ready()?;
    Ok(client)
}

/// How a wait for worker signals ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Complete,
    /// EXIT arrived first
    Exited,
    /// The deadline passed first
    TimedOut,
}

/// Longest single receive while waiting against a deadline
const POLL_SLICE: Duration = Duration::from_millis(100);

/// Wait until `count` messages of `msg_type` arrived, EXIT arrived, or
/// `deadline` passed; `None` waits indefinitely
pub fn wait_for_signals(
    client: &mut Client,
    msg_type: i32,
    count: usize,
    deadline: Option<Instant>,
) -> Result<WaitOutcome> {
    let mut seen = 0;
    while seen < count {
        let timeout = match deadline {
            None => Timeout::Blocking,
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return Ok(WaitOutcome::TimedOut);
                }
                Timeout::After((deadline - now).min(POLL_SLICE))
            }
        };

        let Some(msg) = client.receive(timeout)? else {
            continue;
        };
        match msg.message_type() {
            MessageType::Control(ControlVerb::Exit) => return Ok(WaitOutcome::Exited),
            t if t.raw() == msg_type => seen += 1,
            other => debug!(msg_type = %other, "Ignoring message"),
        }
    }
    Ok(WaitOutcome::Complete)
}

pub fn publisher_loop(
    id: usize,
    config: &ClientConfig,
    num_msgs: u64,
    msg_size: usize,
    num_subscribers: usize,
) -> Result<Throughput> {
    let mut client = open_session(
        config,
        &[ControlVerb::Exit.into(), SUBSCRIBER_READY.into()],
    )?;
    client.send_signal(PUBLISHER_READY)?;
    debug!(id, "Publisher ready, waiting for {} subscribers", num_subscribers);

    let mut report = Throughput {
        role: Role::Publisher,
        id,
        messages: 0,
        expected: num_msgs,
        msg_size,
        duration: Default::default(),
    };

    if wait_for_signals(&mut client, SUBSCRIBER_READY, num_subscribers, None)?
        != WaitOutcome::Complete
    {
        warn!(id, "Publisher received EXIT before subscribers were ready");
        client.disconnect()?;
        return Ok(report);
    }

    let data: Vec<u8> = (0..msg_size).map(|i| (i % 128) as u8).collect();

    let start = Instant::now();
    for _ in 0..num_msgs {
        client.send(TEST_MSG, &data)?;
        report.messages += 1;
    }
    client.send_signal(PUBLISHER_DONE)?;
    report.duration = start.elapsed();

    client.disconnect()?;
    info!(id, messages = report.messages, "Publisher finished");
    Ok(report)
}

pub fn subscriber_loop(
    id: usize,
    config: &ClientConfig,
    num_msgs: u64,
    msg_size: usize,
) -> Result<Throughput> {
    let mut client = open_session(config, &[ControlVerb::Exit.into(), TEST_MSG.into()])?;
    client.send_signal(SUBSCRIBER_READY)?;

    let mut report = Throughput {
        role: Role::Subscriber,
        id,
        messages: 0,
        expected: num_msgs,
        msg_size,
        duration: Default::default(),
    };

    let mut first_arrival = None;
    let mut aborted = false;
    while report.messages < num_msgs {
        let Some(msg) = client.receive(Timeout::Blocking)? else {
            continue;
        };
        match msg.message_type() {
            MessageType::Application(TEST_MSG) => {
                let now = Instant::now();
                let start = *first_arrival.get_or_insert(now);
                report.duration = now - start;
                report.messages += 1;
            }
            MessageType::Control(ControlVerb::Exit) => {
                warn!(id, received = report.messages, "Subscriber received EXIT");
                aborted = true;
                break;
            }
            _ => {}
        }
    }

    if !aborted {
        client.send_signal(SUBSCRIBER_DONE)?;
    }
    client.disconnect()?;
    info!(id, messages = report.messages, "Subscriber finished");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtma_client::{Message, MessageHeader, Payload};
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    fn write_signal(stream: &mut TcpStream, msg_type: impl Into<MessageType>) {
        let message = Message::new(MessageHeader::new(msg_type), Payload::empty());
        stream.write_all(&message.encode()).unwrap();
    }

    /// Session connected to a loopback broker that only acknowledges CONNECT
    fn coordinator_with_silent_broker() -> (Client, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let broker = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut raw = [0u8; MessageHeader::SIZE];
            stream.read_exact(&mut raw).unwrap();
            let header = MessageHeader::decode(&raw).unwrap();
            let mut body = vec![0u8; header.payload_len().unwrap()];
            stream.read_exact(&mut body).unwrap();
            write_signal(&mut stream, ControlVerb::Acknowledge);
            stream
        });

        let mut client = Client::new(0, 0);
        client.connect_addr(addr).unwrap();
        (client, broker.join().unwrap())
    }

    #[test]
    fn test_missing_workers_hit_deadline() {
        let (mut client, _broker) = coordinator_with_silent_broker();

        let start = Instant::now();
        let deadline = start + Duration::from_millis(300);
        let outcome = wait_for_signals(&mut client, PUBLISHER_READY, 2, Some(deadline)).unwrap();

        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(290));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_expired_deadline_returns_without_waiting() {
        let (mut client, _broker) = coordinator_with_silent_broker();

        let start = Instant::now();
        let outcome = wait_for_signals(&mut client, PUBLISHER_READY, 1, Some(start)).unwrap();
        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_counts_signals_and_stops_on_exit() {
        let (mut client, mut broker) = coordinator_with_silent_broker();
        let deadline = Some(Instant::now() + Duration::from_secs(5));

        write_signal(&mut broker, PUBLISHER_READY);
        write_signal(&mut broker, TEST_MSG);
        write_signal(&mut broker, PUBLISHER_READY);
        assert_eq!(
            wait_for_signals(&mut client, PUBLISHER_READY, 2, deadline).unwrap(),
            WaitOutcome::Complete
        );

        write_signal(&mut broker, ControlVerb::Exit);
        assert_eq!(
            wait_for_signals(&mut client, SUBSCRIBER_READY, 1, deadline).unwrap(),
            WaitOutcome::Exited
        );
    }
}
