//! COPS transport layer (TCP)
//!
//! Length-framed COPS message transport. The 8-byte COPS header carries a
//! 4-byte body length (header-exclusive), so one frame is header plus that
//! many body bytes. The policy server listens on well-known port 3918.

use bytes::BytesMut;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

use crate::error::{CopsError, CopsResult};
use crate::header::{CopsHeader, COPS_HEADER_LEN};
use crate::message::CopsMessage;

/// Maximum COPS message size accepted from the wire (64KB)
const MAX_MESSAGE_SIZE: usize = 65536;

/// Pull one complete COPS frame out of the buffer, if present.
fn try_parse_message(read_buf: &mut BytesMut) -> CopsResult<Option<CopsMessage>> {
    if read_buf.len() < COPS_HEADER_LEN {
        return Ok(None);
    }

    // Body length lives in header bytes 4-7 and excludes the header
    let body_len = u32::from_be_bytes([read_buf[4], read_buf[5], read_buf[6], read_buf[7]]) as usize;
    let frame_len = COPS_HEADER_LEN + body_len;

    if body_len % 4 != 0 {
        return Err(CopsError::UnalignedLength(body_len as u32));
    }
    if frame_len > MAX_MESSAGE_SIZE {
        return Err(CopsError::MessageTooLarge(frame_len));
    }
    if read_buf.len() < frame_len {
        return Ok(None);
    }

    let frame = read_buf.split_to(frame_len);
    let mut bytes = frame.freeze();
    let msg = CopsMessage::decode(&mut bytes)?;
    Ok(Some(msg))
}

async fn recv_framed<R: AsyncReadExt + Unpin>(
    stream: &mut R,
    read_buf: &mut BytesMut,
) -> CopsResult<CopsMessage> {
    loop {
        if let Some(msg) = try_parse_message(read_buf)? {
            return Ok(msg);
        }

        let n = stream.read_buf(read_buf).await?;
        if n == 0 {
            return Err(CopsError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed by peer",
            )));
        }
    }
}

/// COPS connection wrapping a TCP stream
pub struct CopsTransport {
    stream: TcpStream,
    read_buf: BytesMut,
    peer_addr: SocketAddr,
}

impl CopsTransport {
    /// Wrap an existing TCP stream
    pub fn new(stream: TcpStream) -> CopsResult<Self> {
        let peer_addr = stream.peer_addr()?;
        Ok(Self {
            stream,
            read_buf: BytesMut::with_capacity(4096),
            peer_addr,
        })
    }

    /// Connect to a remote peer
    pub async fn connect(addr: SocketAddr) -> CopsResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        Self::new(stream)
    }

    /// Get the remote peer address
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Send one COPS message
    pub async fn send(&mut self, msg: &CopsMessage) -> CopsResult<()> {
        let encoded = msg.encode();
        self.stream.write_all(&encoded).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Receive one COPS message, reading from the stream as needed
    pub async fn recv(&mut self) -> CopsResult<CopsMessage> {
        recv_framed(&mut self.stream, &mut self.read_buf).await
    }

    /// Shut down the connection
    pub async fn shutdown(&mut self) -> CopsResult<()> {
        self.stream.shutdown().await?;
        Ok(())
    }

    /// Split into independently owned read and write halves so a receive
    /// loop and senders on other tasks can share one socket.
    pub fn into_split(self) -> (CopsReader, CopsWriter) {
        let (read_half, write_half) = self.stream.into_split();
        (
            CopsReader {
                half: read_half,
                read_buf: self.read_buf,
                peer_addr: self.peer_addr,
            },
            CopsWriter {
                half: write_half,
                peer_addr: self.peer_addr,
            },
        )
    }
}

/// Read half of a split COPS connection
pub struct CopsReader {
    half: OwnedReadHalf,
    read_buf: BytesMut,
    peer_addr: SocketAddr,
}

impl CopsReader {
    pub async fn recv(&mut self) -> CopsResult<CopsMessage> {
        recv_framed(&mut self.half, &mut self.read_buf).await
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

/// Write half of a split COPS connection
pub struct CopsWriter {
    half: OwnedWriteHalf,
    peer_addr: SocketAddr,
}

impl CopsWriter {
    pub async fn send(&mut self, msg: &CopsMessage) -> CopsResult<()> {
        let encoded = msg.encode();
        self.half.write_all(&encoded).await?;
        self.half.flush().await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> CopsResult<()> {
        self.half.shutdown().await?;
        Ok(())
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

/// COPS TCP listener accepting incoming PEP connections
pub struct CopsListener {
    listener: TcpListener,
}

impl CopsListener {
    /// Bind to the given address
    pub async fn bind(addr: SocketAddr) -> CopsResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    /// Bind to the well-known PDP port on all interfaces
    pub async fn bind_default() -> CopsResult<Self> {
        let addr: SocketAddr = ([0, 0, 0, 0], crate::COPS_PDP_PORT).into();
        Self::bind(addr).await
    }

    /// Accept one incoming connection
    pub async fn accept(&self) -> CopsResult<CopsTransport> {
        let (stream, _addr) = self.listener.accept().await?;
        CopsTransport::new(stream)
    }

    /// Local address this listener is bound to
    pub fn local_addr(&self) -> CopsResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ClientAcceptMsg, ClientOpenMsg, KeepAliveMsg};
    use crate::object::PepId;
    use crate::COPS_CLIENT_PCMM;

    #[tokio::test]
    async fn test_transport_send_recv() {
        let addr: SocketAddr = ([127, 0, 0, 1], 0).into();
        let listener = CopsListener::bind(addr).await.unwrap();
        let listen_addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let mut server = listener.accept().await.unwrap();
            let msg = server.recv().await.unwrap();
            assert!(matches!(msg, CopsMessage::ClientOpen(_)));
            let accept =
                CopsMessage::ClientAccept(ClientAcceptMsg::new(COPS_CLIENT_PCMM, 30, None));
            server.send(&accept).await.unwrap();
            server.shutdown().await.unwrap();
        });

        let mut client = CopsTransport::connect(listen_addr).await.unwrap();
        let open =
            CopsMessage::ClientOpen(ClientOpenMsg::new(COPS_CLIENT_PCMM, PepId::new("pep-1")));
        client.send(&open).await.unwrap();

        let reply = client.recv().await.unwrap();
        match reply {
            CopsMessage::ClientAccept(accept) => assert_eq!(accept.ka_timer, 30),
            other => panic!("unexpected message {other:?}"),
        }

        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_transport_multiple_messages() {
        let addr: SocketAddr = ([127, 0, 0, 1], 0).into();
        let listener = CopsListener::bind(addr).await.unwrap();
        let listen_addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let mut server = listener.accept().await.unwrap();
            for _ in 0..3 {
                let msg = server.recv().await.unwrap();
                server.send(&msg).await.unwrap();
            }
        });

        let mut client = CopsTransport::connect(listen_addr).await.unwrap();
        let ka = CopsMessage::KeepAlive(KeepAliveMsg::new(COPS_CLIENT_PCMM));
        for _ in 0..3 {
            client.send(&ka).await.unwrap();
            let echo = client.recv().await.unwrap();
            assert_eq!(echo, ka);
        }

        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_split_transport() {
        let addr: SocketAddr = ([127, 0, 0, 1], 0).into();
        let listener = CopsListener::bind(addr).await.unwrap();
        let listen_addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let server = listener.accept().await.unwrap();
            let (mut reader, mut writer) = server.into_split();
            let msg = reader.recv().await.unwrap();
            writer.send(&msg).await.unwrap();
        });

        let mut client = CopsTransport::connect(listen_addr).await.unwrap();
        let ka = CopsMessage::KeepAlive(KeepAliveMsg::new(COPS_CLIENT_PCMM));
        client.send(&ka).await.unwrap();
        assert_eq!(client.recv().await.unwrap(), ka);

        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_connection_surfaces_eof() {
        let addr: SocketAddr = ([127, 0, 0, 1], 0).into();
        let listener = CopsListener::bind(addr).await.unwrap();
        let listen_addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let mut server = listener.accept().await.unwrap();
            server.shutdown().await.unwrap();
        });

        let mut client = CopsTransport::connect(listen_addr).await.unwrap();
        let err = client.recv().await.unwrap_err();
        assert!(matches!(err, CopsError::Io(_)));

        handle.await.unwrap();
    }
}
