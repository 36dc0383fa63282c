use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};

use tracing::debug;

use crate::error::{Result, TransportError};

/// A connected broker stream implementing Read + Write.
///
/// This is the fundamental I/O type the frame layer reads from and writes to.
/// It wraps either a TCP stream or, on Unix, a Unix domain socket stream.
pub struct AmqpStream {
    inner: AmqpStreamInner,
}

enum AmqpStreamInner {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Read for AmqpStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            AmqpStreamInner::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            AmqpStreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for AmqpStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            AmqpStreamInner::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            AmqpStreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            AmqpStreamInner::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            AmqpStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl AmqpStream {
    /// Connect to a broker over TCP (blocking).
    ///
    /// Nagle is disabled: method frames are small and latency-bound.
    pub fn connect(addr: impl ToSocketAddrs + std::fmt::Debug) -> Result<Self> {
        let addr_text = format!("{addr:?}");
        let stream = TcpStream::connect(&addr).map_err(|source| TransportError::Connect {
            addr: addr_text.clone(),
            source,
        })?;
        stream.set_nodelay(true)?;
        debug!(addr = %addr_text, "connected to broker");
        Ok(Self::from_tcp(stream))
    }

    /// Create an AmqpStream from an already connected TCP stream.
    pub fn from_tcp(stream: TcpStream) -> Self {
        Self {
            inner: AmqpStreamInner::Tcp(stream),
        }
    }

    /// Create an AmqpStream from a Unix domain socket stream.
    #[cfg(unix)]
    pub fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: AmqpStreamInner::Unix(stream),
        }
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<std::time::Duration>) -> Result<()> {
        match &self.inner {
            AmqpStreamInner::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            #[cfg(unix)]
            AmqpStreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<std::time::Duration>) -> Result<()> {
        match &self.inner {
            AmqpStreamInner::Tcp(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            #[cfg(unix)]
            AmqpStreamInner::Unix(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
        }
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            AmqpStreamInner::Tcp(stream) => Ok(Self::from_tcp(stream.try_clone()?)),
            #[cfg(unix)]
            AmqpStreamInner::Unix(stream) => Ok(Self::from_unix(stream.try_clone()?)),
        }
    }

    /// Shut down both halves of the connection.
    ///
    /// Tearing the transport down after a connection close handshake is the
    /// owner's job; the channel core never calls this itself.
    pub fn shutdown(&self) -> Result<()> {
        let result = match &self.inner {
            AmqpStreamInner::Tcp(stream) => stream.shutdown(Shutdown::Both),
            #[cfg(unix)]
            AmqpStreamInner::Unix(stream) => stream.shutdown(Shutdown::Both),
        };
        match result {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotConnected => {
                Err(TransportError::Shutdown)
            }
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            AmqpStreamInner::Tcp(_) => "tcp",
            #[cfg(unix)]
            AmqpStreamInner::Unix(_) => "unix",
        }
    }
}

#[cfg(unix)]
impl std::os::fd::AsRawFd for AmqpStream {
    fn as_raw_fd(&self) -> std::os::fd::RawFd {
        match &self.inner {
            AmqpStreamInner::Tcp(stream) => stream.as_raw_fd(),
            AmqpStreamInner::Unix(stream) => stream.as_raw_fd(),
        }
    }
}

impl std::fmt::Debug for AmqpStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmqpStream")
            .field("type", &self.transport_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tcp_connect_and_exchange() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = std::thread::spawn(move || {
            let (mut server, _) = listener.accept().unwrap();
            let mut buf = [0u8; 8];
            server.read_exact(&mut buf).unwrap();
            assert_eq!(&buf, b"AMQP\x00\x00\x09\x01");
        });

        let mut client = AmqpStream::connect(addr).unwrap();
        assert_eq!(client.transport_name(), "tcp");
        client.write_all(b"AMQP\x00\x00\x09\x01").unwrap();

        handle.join().unwrap();
    }

    #[test]
    fn connect_refused_reports_address() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = AmqpStream::connect(addr).unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
        assert!(err.to_string().contains(&addr.port().to_string()));
    }

    #[test]
    #[cfg(unix)]
    fn unix_pair_clone_shares_connection() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let left = AmqpStream::from_unix(left);
        let mut right = AmqpStream::from_unix(right);

        let mut writer = left.try_clone().unwrap();
        writer.write_all(b"ping").unwrap();

        let mut buf = [0u8; 4];
        right.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");
        assert_eq!(format!("{left:?}"), "AmqpStream { type: \"unix\" }");
    }

    #[test]
    #[cfg(unix)]
    fn shutdown_signals_eof_to_peer() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let left = AmqpStream::from_unix(left);
        let mut right = AmqpStream::from_unix(right);

        left.shutdown().unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(right.read(&mut buf).unwrap(), 0);
    }
}
