//! Message framing over byte streams.
//!
//! Each message is one length-delimited frame (4-byte big-endian length)
//! carrying the CBOR encoding of the message. The codec only moves values;
//! it performs no protocol validation.

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::error::CodecError;
use crate::messages::limits::MAX_FRAME_SIZE;

/// Encode a message as CBOR.
pub fn encode<M: Serialize>(message: &M) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    ciborium::into_writer(message, &mut buf).map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(buf)
}

/// Decode a CBOR message.
pub fn decode<M: DeserializeOwned>(bytes: &[u8]) -> Result<M, CodecError> {
    ciborium::from_reader(bytes).map_err(|e| CodecError::Decode(e.to_string()))
}

/// A byte stream carrying length-prefixed CBOR messages in both directions.
pub struct FramedStream<T> {
    inner: Framed<T, LengthDelimitedCodec>,
}

impl<T> FramedStream<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(io: T) -> Self {
        let inner = LengthDelimitedCodec::builder()
            .max_frame_length(MAX_FRAME_SIZE)
            .new_framed(io);
        Self { inner }
    }

    /// Send one message and flush it.
    pub async fn send<M: Serialize>(&mut self, message: &M) -> Result<(), CodecError> {
        let bytes = encode(message)?;
        self.inner.send(Bytes::from(bytes)).await?;
        Ok(())
    }

    /// Receive the next message, or `None` once the peer has closed its side.
    pub async fn recv<M: DeserializeOwned>(&mut self) -> Result<Option<M>, CodecError> {
        match self.inner.next().await {
            Some(Ok(frame)) => decode(&frame).map(Some),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// Flush and shut down the write half.
    pub async fn close(&mut self) -> Result<(), CodecError> {
        SinkExt::<Bytes>::close(&mut self.inner).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{ExtendedHeaderRequest, ExtendedHeaderResponse};
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_framed_exchange() {
        let (a, b) = tokio::io::duplex(4096);
        let mut client = FramedStream::new(a);
        let mut server = FramedStream::new(b);

        let request = ExtendedHeaderRequest::by_height(4, 2);
        client.send(&request).await.unwrap();
        let received: ExtendedHeaderRequest = server.recv().await.unwrap().unwrap();
        assert_eq!(received, request);

        server.send(&ExtendedHeaderResponse::not_found()).await.unwrap();
        server.close().await.unwrap();

        let response: ExtendedHeaderResponse = client.recv().await.unwrap().unwrap();
        assert_eq!(response, ExtendedHeaderResponse::not_found());
        assert!(client.recv::<ExtendedHeaderResponse>().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_frame_is_decode_error() {
        let (mut a, b) = tokio::io::duplex(4096);
        let mut server = FramedStream::new(b);

        // Valid length prefix, garbage payload.
        a.write_all(&[0, 0, 0, 3, 0xff, 0xff, 0xff]).await.unwrap();
        let err = server.recv::<ExtendedHeaderRequest>().await.unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }

    #[tokio::test]
    async fn test_truncated_frame_is_io_error() {
        let (mut a, b) = tokio::io::duplex(4096);
        let mut server = FramedStream::new(b);

        a.write_all(&[0, 0, 0, 10, 1, 2]).await.unwrap();
        drop(a);
        let err = server.recv::<ExtendedHeaderRequest>().await.unwrap_err();
        assert!(matches!(err, CodecError::Io(_)));
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let (mut a, b) = tokio::io::duplex(4096);
        let mut server = FramedStream::new(b);

        let len = (MAX_FRAME_SIZE as u32 + 1).to_be_bytes();
        a.write_all(&len).await.unwrap();
        assert!(server.recv::<ExtendedHeaderRequest>().await.is_err());
    }
}
