//! One JSON object per line on the wire; chunk bytes travel as base64 text.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::utils::{P2PError, Result};

/// Upper bound on a single line, terminator excluded.
pub const MAX_MESSAGE_LEN: usize = 16 * 1024 * 1024;

/// Room kept in a `chunk_data` line for everything except the payload.
pub const ENVELOPE_RESERVE: usize = 64 * 1024;

/// Largest chunk whose base64 `chunk_data` reply still fits in one line.
pub const MAX_CHUNK_SIZE: usize = (MAX_MESSAGE_LEN - ENVELOPE_RESERVE) / 4 * 3;

pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');

    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one line and parses it as JSON.
///
/// A stream that closes before the terminator yields `Ok(None)`; text that is
/// not JSON is an error for this exchange only.
pub async fn read_value<R>(reader: &mut R) -> Result<Option<Value>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    (&mut *reader)
        .take(MAX_MESSAGE_LEN as u64 + 1)
        .read_until(b'\n', &mut line)
        .await?;

    if line.last() != Some(&b'\n') {
        if line.len() > MAX_MESSAGE_LEN {
            return Err(P2PError::MessageTooLarge(line.len()));
        }
        return Ok(None);
    }
    line.pop();

    let value = serde_json::from_slice(&line)?;
    Ok(Some(value))
}

pub async fn read_message<R, T>(reader: &mut R) -> Result<Option<T>>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    match read_value(reader).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

pub fn encode_chunk(data: &[u8]) -> String {
    STANDARD.encode(data)
}

pub fn decode_chunk(encoded: &str) -> Result<Vec<u8>> {
    Ok(STANDARD.decode(encoded)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Message;
    use tokio::io::{BufReader, duplex};

    #[tokio::test]
    async fn test_message_crosses_a_stream() {
        let (mut client, server) = duplex(1024);
        let mut reader = BufReader::new(server);

        write_message(&mut client, &Message::chunk_request("a.txt", 3))
            .await
            .unwrap();
        let received: Option<Message> = read_message(&mut reader).await.unwrap();

        assert_eq!(received, Some(Message::chunk_request("a.txt", 3)));
    }

    #[tokio::test]
    async fn test_line_is_newline_terminated_json() {
        let mut out = Vec::new();
        write_message(&mut out, &Message::GetPeers).await.unwrap();
        assert_eq!(out, b"{\"action\":\"get_peers\"}\n");
    }

    #[tokio::test]
    async fn test_close_before_terminator_is_no_message() {
        let mut reader = BufReader::new(&b"{\"status\": \"regis"[..]);
        assert!(read_value(&mut reader).await.unwrap().is_none());

        let mut empty = BufReader::new(&b""[..]);
        assert!(read_value(&mut empty).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_text_is_an_error() {
        let mut reader = BufReader::new(&b"this is not json\n"[..]);
        assert!(matches!(
            read_value(&mut reader).await,
            Err(P2PError::SerializationError(_))
        ));
    }

    #[tokio::test]
    async fn test_only_first_line_is_consumed() {
        let mut reader = BufReader::new(&b"{\"a\":1}\n{\"b\":2}\n"[..]);
        let first = read_value(&mut reader).await.unwrap().unwrap();
        assert_eq!(first["a"], 1);
    }

    #[test]
    fn test_largest_chunk_reply_fits_in_a_line() {
        let filename = "f".repeat(255);
        let data = vec![0xffu8; MAX_CHUNK_SIZE];
        let reply = Message::chunk_data(&filename, usize::MAX, &data);

        let line = serde_json::to_vec(&reply).unwrap();
        assert!(line.len() <= MAX_MESSAGE_LEN);
        let one_more = encode_chunk(&vec![0u8; MAX_CHUNK_SIZE + 1]);
        assert!(one_more.len() > MAX_MESSAGE_LEN - ENVELOPE_RESERVE);
    }

    #[test]
    fn test_chunk_encoding() {
        let bytes: Vec<u8> = (0..=255).collect();
        let encoded = encode_chunk(&bytes);
        assert!(encoded.is_ascii());
        assert!(!encoded.contains('\n'));
        assert_eq!(decode_chunk(&encoded).unwrap(), bytes);
        assert!(matches!(
            decode_chunk("not base64!"),
            Err(P2PError::EncodingError(_))
        ));
    }
}
