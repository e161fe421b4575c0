//! Byte transport under a `Connection`.
//!
//! `Connection` only ever talks to its socket through this trait, so the
//! read/write paths can be driven by a scripted transport in tests.
//!
//! Every method is non-blocking: "no progress possible right now" is
//! reported as `io::ErrorKind::WouldBlock`.

use std::fs::File;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::os::fd::AsFd;

pub trait Transport {
    /// One non-blocking read. `Ok(0)` means the peer closed its side.
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// One non-blocking send.
    fn send(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Move up to `count` bytes of `file`, starting at `*offset`, to the
    /// peer. `*offset` is advanced by the bytes moved.
    fn send_file(&mut self, file: &File, offset: &mut libc::off_t, count: usize) -> io::Result<usize>;

    /// Shut down both directions.
    fn shutdown(&self) -> io::Result<()>;
}

impl Transport for TcpStream {
    #[inline]
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read(buf)
    }

    #[inline]
    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write(buf)
    }

    fn send_file(&mut self, file: &File, offset: &mut libc::off_t, count: usize) -> io::Result<usize> {
        let n = nix::sys::sendfile::sendfile(self.as_fd(), file.as_fd(), Some(offset), count)?;
        Ok(n)
    }

    fn shutdown(&self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn tcp_send_file_moves_bytes_and_offset() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (mut server, _) = listener.accept().unwrap();

        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"0123456789").unwrap();

        let mut offset: libc::off_t = 2;
        let n = server.send_file(&file, &mut offset, 5).unwrap();
        assert_eq!(n, 5);
        assert_eq!(offset, 7);

        Transport::shutdown(&server).unwrap();
        let mut got = String::new();
        client.read_to_string(&mut got).unwrap();
        assert_eq!(got, "23456");
    }

    #[test]
    fn tcp_recv_would_block_when_empty() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let _client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (mut server, _) = listener.accept().unwrap();
        server.set_nonblocking(true).unwrap();

        let mut buf = [0u8; 16];
        let err = server.recv(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }
}
