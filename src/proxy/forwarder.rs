//! Data forwarding module
//!
//! This module handles data forwarding between a client and its backend.

use log::{debug, warn};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Bytes moved in each direction of one proxied connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardStats {
    pub client_to_backend: u64,
    pub backend_to_client: u64,
}

/// Forward data between two streams until both directions are done
///
/// Client to backend runs on the calling task, backend to client on a
/// spawned one. When one direction ends its write side is shut down, so the
/// peer sees end-of-stream while the other direction keeps draining. The
/// function returns only after both directions have returned; copy errors
/// are logged, not propagated.
///
/// # Parameters
///
/// * `client` - Accepted client stream
/// * `backend` - Connected backend stream
/// * `buffer_size` - Copy buffer size per direction
pub async fn proxy_data<C, B>(client: C, backend: B, buffer_size: usize) -> ForwardStats
where
    C: AsyncRead + AsyncWrite + Send + 'static,
    B: AsyncRead + AsyncWrite + Send + 'static,
{
    let (client_reader, client_writer) = tokio::io::split(client);
    let (backend_reader, backend_writer) = tokio::io::split(backend);

    // Data flow from backend to client
    let backend_to_client = tokio::spawn(async move {
        pipe(backend_reader, client_writer, buffer_size).await
    });

    // Data flow from client to backend
    let mut stats = ForwardStats::default();
    match pipe(client_reader, backend_writer, buffer_size).await {
        Ok(n) => stats.client_to_backend = n,
        Err(e) => warn!("Error copying from client to backend: {}", e),
    }
    debug!("Client to backend finished after {} bytes", stats.client_to_backend);

    match backend_to_client.await {
        Ok(Ok(n)) => stats.backend_to_client = n,
        Ok(Err(e)) => warn!("Error copying from backend to client: {}", e),
        Err(e) => warn!("Backend to client task failed: {}", e),
    }
    debug!("Backend to client finished after {} bytes", stats.backend_to_client);

    stats
}

/// Copy `reader` into `writer` until end-of-stream, then shut `writer` down
async fn pipe<R, W>(mut reader: R, mut writer: W, buffer_size: usize) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buffer = vec![0u8; buffer_size.max(1)];
    let mut total_bytes = 0u64;

    let result = async {
        loop {
            let n = reader.read(&mut buffer).await?;
            if n == 0 {
                break;
            }
            writer.write_all(&buffer[..n]).await?;
            total_bytes += n as u64;
        }
        Ok::<_, io::Error>(())
    }
    .await;

    // Half-close even after an error so the peer direction can finish
    let _ = writer.shutdown().await;

    result.map(|_| total_bytes)
}
