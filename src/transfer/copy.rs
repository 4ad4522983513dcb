//! Cancellable byte pump shared by data transfers and background commits.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

const BUFFER_SIZE: usize = 8192;

/// Copies `reader` into `writer` until EOF, reporting the running total after
/// every chunk. Cancellation is checked before every chunk and while waiting on
/// either side and surfaces as `ErrorKind::Interrupted`.
pub async fn copy_cancellable<R, W, F>(
    reader: &mut R,
    writer: &mut W,
    cancel: &CancellationToken,
    mut progress: F,
) -> io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
    F: FnMut(u64),
{
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled()),
            read = reader.read(&mut buffer) => read?,
        };
        if read == 0 {
            break;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled()),
            written = writer.write_all(&buffer[..read]) => written?,
        }

        total += read as u64;
        progress(total);
    }

    writer.flush().await?;
    Ok(total)
}

fn cancelled() -> io::Error {
    io::Error::new(io::ErrorKind::Interrupted, "transfer cancelled")
}
