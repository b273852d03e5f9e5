//! Wire protocol shared by the client and server roles.
//!
//! Every message is a frame: a 4-byte big-endian length followed by the body.
//! A request body is a 5-byte ASCII command code followed by its payload; a
//! response body is the payload alone.
//!
//! ```text
//! addBK  -> tip hash (32 bytes)
//! addBK‖block json  -> "Success - ..." | "Fail    - ..."
//! getBC  -> chain json, headers only
//! getBK‖hash  -> chain json with the matching header, or empty
//! getTX‖merkle root  -> chain json with the matching full block, or empty
//! ```

use crate::constants::{COMMAND_LEN, MAX_FRAME_SIZE, STATUS_FAIL, STATUS_SUCCESS};
use minichain_core::{Hash, LedgerError, Result};
use std::fmt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    AddBlock,
    GetChain,
    GetBlock,
    GetData,
}

impl Command {
    pub const fn code(self) -> &'static [u8; COMMAND_LEN] {
        match self {
            Command::AddBlock => b"addBK",
            Command::GetChain => b"getBC",
            Command::GetBlock => b"getBK",
            Command::GetData => b"getTX",
        }
    }

    pub fn from_code(code: &[u8]) -> Option<Self> {
        match code {
            b"addBK" => Some(Command::AddBlock),
            b"getBC" => Some(Command::GetChain),
            b"getBK" => Some(Command::GetBlock),
            b"getTX" => Some(Command::GetData),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.code()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    pub command: Command,
    pub payload: Vec<u8>,
}

impl Request {
    pub fn new(command: Command, payload: Vec<u8>) -> Self {
        Self { command, payload }
    }

    pub fn bare(command: Command) -> Self {
        Self::new(command, Vec::new())
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(COMMAND_LEN + self.payload.len());
        body.extend_from_slice(self.command.code());
        body.extend_from_slice(&self.payload);
        body
    }

    pub fn decode(body: &[u8]) -> Result<Self> {
        if body.len() < COMMAND_LEN {
            return Err(LedgerError::MalformedPayload(format!(
                "request of {} bytes has no command code",
                body.len()
            )));
        }
        let (code, payload) = body.split_at(COMMAND_LEN);
        let command = Command::from_code(code).ok_or_else(|| {
            LedgerError::MalformedPayload(format!(
                "unknown command {:?}",
                String::from_utf8_lossy(code)
            ))
        })?;
        Ok(Self::new(command, payload.to_vec()))
    }
}

/// Reads a 32-byte hash payload (block hash or merkle root).
pub fn hash_payload(payload: &[u8]) -> Result<Hash> {
    payload.try_into().map_err(|_| {
        LedgerError::MalformedPayload(format!("expected 32-byte hash, got {} bytes", payload.len()))
    })
}

/// Outcome of the second `addBK` phase, carried as literal text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitStatus {
    Accepted,
    Rejected(String),
}

impl SubmitStatus {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmitStatus::Accepted)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            SubmitStatus::Accepted => format!("{STATUS_SUCCESS} - Blockchain is updated."),
            SubmitStatus::Rejected(reason) => format!("{STATUS_FAIL}    - {reason}"),
        }
        .into_bytes()
    }

    /// Anything not starting with the success literal counts as a rejection.
    pub fn parse(bytes: &[u8]) -> Self {
        let text = String::from_utf8_lossy(bytes);
        if text.starts_with(STATUS_SUCCESS) {
            return SubmitStatus::Accepted;
        }
        let reason = text
            .strip_prefix(STATUS_FAIL)
            .unwrap_or(&text)
            .trim_start_matches([' ', '-'])
            .to_string();
        SubmitStatus::Rejected(reason)
    }
}

impl fmt::Display for SubmitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.to_bytes()))
    }
}

pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, body: &[u8]) -> Result<()> {
    if body.is_empty() || body.len() > MAX_FRAME_SIZE {
        return Err(LedgerError::MalformedPayload(format!(
            "frame of {} bytes cannot be sent",
            body.len()
        )));
    }
    writer.write_u32(body.len() as u32).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>> {
    let len = reader.read_u32().await? as usize;
    if len == 0 || len > MAX_FRAME_SIZE {
        return Err(LedgerError::MalformedPayload(format!("invalid frame length {len}")));
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_codes_are_five_ascii_bytes() {
        for command in [
            Command::AddBlock,
            Command::GetChain,
            Command::GetBlock,
            Command::GetData,
        ] {
            assert_eq!(command.code().len(), COMMAND_LEN);
            assert!(command.code().is_ascii());
            assert_eq!(Command::from_code(command.code()), Some(command));
        }
        assert_eq!(Command::GetData.to_string(), "getTX");
        assert_eq!(Command::from_code(b"getXX"), None);
    }

    #[test]
    fn request_layout() {
        let request = Request::new(Command::GetBlock, vec![0xAB; 32]);
        let body = request.encode();
        assert_eq!(&body[..5], b"getBK");
        assert_eq!(&body[5..], &[0xAB; 32]);
        assert_eq!(Request::decode(&body).unwrap(), request);
        assert_eq!(Request::decode(b"getBC").unwrap(), Request::bare(Command::GetChain));
    }

    #[test]
    fn short_or_unknown_requests_are_malformed() {
        assert!(matches!(
            Request::decode(b"get"),
            Err(LedgerError::MalformedPayload(_))
        ));
        assert!(matches!(
            Request::decode(b"hello world"),
            Err(LedgerError::MalformedPayload(_))
        ));
    }

    #[test]
    fn hash_payload_requires_exact_length() {
        assert_eq!(hash_payload(&[7u8; 32]).unwrap(), [7u8; 32]);
        assert!(hash_payload(&[7u8; 31]).is_err());
        assert!(hash_payload(&[7u8; 33]).is_err());
        // trailing zero bytes are part of the hash, nothing is trimmed
        let mut hash = [1u8; 32];
        hash[31] = 0;
        assert_eq!(hash_payload(&hash).unwrap(), hash);
    }

    #[test]
    fn submit_status_literals() {
        assert_eq!(
            SubmitStatus::Accepted.to_bytes(),
            b"Success - Blockchain is updated.".to_vec()
        );
        let rejected = SubmitStatus::Rejected("someone was faster".into());
        assert_eq!(rejected.to_string(), "Fail    - someone was faster");
        assert_eq!(SubmitStatus::parse(&rejected.to_bytes()), rejected);
        assert_eq!(
            SubmitStatus::parse(b"Success - Blockchain is updated."),
            SubmitStatus::Accepted
        );
        assert!(!SubmitStatus::parse(b"garbage").is_accepted());
    }

    #[tokio::test]
    async fn frames_round_trip_over_a_stream() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let body = Request::new(Command::GetData, vec![0u8; 32]).encode();
        let sent = body.clone();
        let writer = tokio::spawn(async move {
            write_frame(&mut client, &sent).await.unwrap();
            write_frame(&mut client, b"getBC").await.unwrap();
        });
        assert_eq!(read_frame(&mut server).await.unwrap(), body);
        assert_eq!(read_frame(&mut server).await.unwrap(), b"getBC".to_vec());
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn oversized_frame_length_is_rejected() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_u32(MAX_FRAME_SIZE as u32 + 1).await.unwrap();
        assert!(matches!(
            read_frame(&mut server).await,
            Err(LedgerError::MalformedPayload(_))
        ));
    }

    #[tokio::test]
    async fn oversized_body_is_not_sent() {
        let (mut client, _server) = tokio::io::duplex(64);
        let body = vec![b'x'; MAX_FRAME_SIZE + 1];
        assert!(matches!(
            write_frame(&mut client, &body).await,
            Err(LedgerError::MalformedPayload(_))
        ));
    }

    #[tokio::test]
    async fn truncated_frame_is_an_io_error() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_u32(10).await.unwrap();
        client.write_all(b"abc").await.unwrap();
        drop(client);
        assert!(matches!(read_frame(&mut server).await, Err(LedgerError::Io(_))));
    }
}
