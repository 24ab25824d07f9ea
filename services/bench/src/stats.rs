//! Throughput figures reported by each benchmark worker

use rtma_codec::MessageHeader;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Publisher,
    Subscriber,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Publisher => write!(f, "Publisher"),
            Role::Subscriber => write!(f, "Subscriber"),
        }
    }
}

/// Result of one publisher or subscriber run
#[derive(Debug, Clone, PartialEq)]
pub struct Throughput {
    pub role: Role,
    pub id: usize,
    /// Messages sent or received
    pub messages: u64,
    /// Messages the worker was asked to handle
    pub expected: u64,
    pub msg_size: usize,
    pub duration: Duration,
}

impl Throughput {
    /// Messages inside the timed window
    ///
    /// Subscribers start their clock on the first arrival, so that message
    /// is outside the window.
    fn timed_messages(&self) -> f64 {
        match self.role {
            Role::Publisher => self.messages as f64,
            Role::Subscriber => self.messages.saturating_sub(1) as f64,
        }
    }

    pub fn messages_per_sec(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.timed_messages() / secs
        } else {
            0.0
        }
    }

    /// Wire throughput, header included
    pub fn megabytes_per_sec(&self) -> f64 {
        let packet = (self.msg_size + MessageHeader::SIZE) as f64;
        self.messages_per_sec() * packet / (1024.0 * 1024.0)
    }

    pub fn is_complete(&self) -> bool {
        self.messages >= self.expected
    }

    pub fn completion_percent(&self) -> f64 {
        if self.expected == 0 {
            return 100.0;
        }
        self.timed_messages() / self.expected as f64 * 100.0
    }
}

impl fmt::Display for Throughput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}] -> {} messages", self.role, self.id, self.messages)?;
        if !self.is_complete() {
            write!(f, " ({:.0}%)", self.completion_percent())?;
        }
        write!(
            f,
            " | {:.0} messages/sec | {:.1} MB/sec | {:.6} sec",
            self.messages_per_sec(),
            self.megabytes_per_sec(),
            self.duration.as_secs_f64()
        )
    }
}

/// Time the coordinator waits for workers before broadcasting EXIT
pub fn abort_timeout(num_msgs: u64) -> Duration {
    Duration::from_secs_f64((num_msgs as f64 / 10_000.0).max(10.0))
}
