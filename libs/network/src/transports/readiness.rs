//! Socket readiness polling
//!
//! Unix targets block in `poll(2)` against an absolute deadline, restarting
//! after `EINTR` with the time actually remaining. Other targets fall back
//! to std socket timeouts: reads probe with `peek`, writes rely on the
//! blocking write path.

use super::{Direction, Readiness, Timeout};
use std::io;
use std::net::TcpStream;

#[cfg(unix)]
pub fn wait(stream: &TcpStream, direction: Direction, timeout: Timeout) -> io::Result<Readiness> {
    use nix::errno::Errno;
    use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
    use std::os::fd::AsFd;
    use std::time::{Duration, Instant};

    let events = match direction {
        Direction::Read => PollFlags::POLLIN,
        Direction::Write => PollFlags::POLLOUT,
    };
    let deadline = timeout.deadline_from(Instant::now());

    loop {
        let poll_timeout = match deadline {
            None => PollTimeout::NONE,
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                // Round up so poll never returns before the deadline
                let millis = remaining.as_micros().div_ceil(1000) as u64;
                PollTimeout::try_from(Duration::from_millis(millis)).unwrap_or(PollTimeout::MAX)
            }
        };

        let mut fds = [PollFd::new(stream.as_fd(), events)];
        match poll(&mut fds, poll_timeout) {
            Ok(0) => return Ok(Readiness::TimedOut),
            Ok(_) => {
                let revents = fds[0].revents().unwrap_or(PollFlags::empty());
                if revents.contains(PollFlags::POLLNVAL) {
                    return Err(io::Error::from(Errno::EBADF));
                }
                // POLLHUP/POLLERR count as ready: the following read or
                // write surfaces the actual error.
                return Ok(Readiness::Ready);
            }
            Err(Errno::EINTR) => continue,
            Err(errno) => return Err(io::Error::from(errno)),
        }
    }
}

#[cfg(not(unix))]
pub fn wait(stream: &TcpStream, direction: Direction, timeout: Timeout) -> io::Result<Readiness> {
    if direction == Direction::Write {
        return Ok(Readiness::Ready);
    }

    match timeout {
        Timeout::Blocking => stream.set_read_timeout(None)?,
        Timeout::After(duration) if !duration.is_zero() => {
            stream.set_read_timeout(Some(duration))?
        }
        _ => stream.set_nonblocking(true)?,
    }

    let mut probe = [0u8; 1];
    let result = stream.peek(&mut probe);

    stream.set_nonblocking(false)?;
    stream.set_read_timeout(None)?;

    match result {
        Ok(_) => Ok(Readiness::Ready),
        Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
            Ok(Readiness::TimedOut)
        }
        Err(e) => Err(e),
    }
}
