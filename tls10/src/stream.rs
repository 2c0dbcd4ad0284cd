use std::io::{Read, Result, Write};

use crate::conn::ClientConnection;

/// This type implements `io::Read` and `io::Write`, encapsulating
/// and owning a [`ClientConnection`] and an underlying blocking
/// transport `T`, such as a socket.
///
/// This allows you to use a tls10 connection like a normal stream.
#[derive(Debug)]
pub struct TlsStream<T: Read + Write> {
    /// Our connection
    pub conn: ClientConnection,

    /// The underlying transport, like a socket
    pub sock: T,
}

impl<T: Read + Write> TlsStream<T> {
    /// Make a new TlsStream taking the connection `conn` and socket-like
    /// object `sock`.  This does not fail and does no IO: the handshake
    /// happens on first use.
    pub fn new(conn: ClientConnection, sock: T) -> Self {
        Self { conn, sock }
    }

    /// Make a new TlsStream, and complete the handshake before returning.
    ///
    /// The handshake failing (including the server sending a fatal alert)
    /// is reported as an error; the alert we send to the server, if any,
    /// has been written to `sock`.
    pub fn connect(conn: ClientConnection, sock: T) -> Result<Self> {
        let mut stream = Self::new(conn, sock);
        while stream.conn.is_handshaking() {
            stream.conn.complete_io(&mut stream.sock)?;
        }

        if stream.conn.wants_write() {
            stream.conn.complete_io(&mut stream.sock)?;
        }
        Ok(stream)
    }

    /// Send a close_notify alert to the server, and write it out.
    ///
    /// Calling this more than once sends nothing further.
    pub fn close(&mut self) -> Result<()> {
        self.conn.send_close_notify();
        while self.conn.wants_write() {
            self.conn.write_tls(&mut self.sock)?;
        }
        self.sock.flush()
    }

    /// Get a reference to the underlying socket
    pub fn get_ref(&self) -> &T {
        &self.sock
    }

    /// Get a mutable reference to the underlying socket
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.sock
    }

    /// If we're handshaking, complete all the IO for that.
    /// If we have data to write, write it all.
    fn complete_prior_io(&mut self) -> Result<()> {
        if self.conn.is_handshaking() {
            self.conn.complete_io(&mut self.sock)?;
        }

        if self.conn.wants_write() {
            self.conn.complete_io(&mut self.sock)?;
        }

        Ok(())
    }
}

impl<T: Read + Write> Read for TlsStream<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.complete_prior_io()?;

        // We call complete_io() in a loop since a single call may read only
        // a partial packet from the underlying transport. A full packet is
        // needed to get more plaintext, which we must do if EOF has not been
        // hit. Otherwise, we will prematurely signal EOF by returning 0. We
        // determine if EOF has actually been hit by checking if 0 bytes were
        // read from the underlying transport.
        while self.conn.wants_read() {
            let at_eof = self.conn.complete_io(&mut self.sock)?.0 == 0;
            if at_eof {
                if let Ok(io_state) = self.conn.process_new_packets() {
                    if io_state.plaintext_bytes_to_read() == 0 {
                        return Ok(0);
                    }
                }
                break;
            }
        }

        self.conn.reader().read(buf)
    }
}

impl<T: Read + Write> Write for TlsStream<T> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.complete_prior_io()?;

        let len = self.conn.writer().write(buf)?;

        // Try to write the underlying transport here, but don't let
        // any errors mask the fact we've consumed `len` bytes.
        // Callers will learn of permanent errors on the next call.
        let _ = self.conn.complete_io(&mut self.sock);

        Ok(len)
    }

    fn flush(&mut self) -> Result<()> {
        self.complete_prior_io()?;

        self.conn.writer().flush()?;
        if self.conn.wants_write() {
            self.conn.complete_io(&mut self.sock)?;
        }
        Ok(())
    }
}
