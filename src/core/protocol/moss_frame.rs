// src/core/protocol/moss_frame.rs

//! Implements the line-oriented MOSS submission protocol and the corresponding
//! `Encoder` and `Decoder` for network communication.
//!
//! Client messages are newline-terminated ASCII lines. A `file` line is followed
//! immediately by exactly as many raw bytes as it declares. Server replies are
//! unframed text, consumed in bounded chunks.

use crate::core::MossError;
use crate::core::language::Language;
use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

const LF: &[u8] = b"\n";

/// The reserved field of the `query` line. Always zero.
pub const QUERY_RESERVED: u32 = 0;

/// The file index used for every base file.
pub const BASE_FILE_INDEX: u32 = 0;

/// The default bound for a single server reply.
pub const DEFAULT_REPLY_LIMIT: usize = 1024;

/// A single client-to-server message.
#[derive(Debug, Clone, PartialEq)]
pub enum MossFrame {
    /// `moss <user_id>`
    Moss { user_id: String },
    /// `directory <1|0>`
    Directory(bool),
    /// `X <1|0>`
    Experimental(bool),
    /// `maxmatches <n>`
    MaxMatches(u32),
    /// `show <n>`
    Show(u32),
    /// `language <token>`
    Language(Language),
    /// `file <index> <language> <length> <label>` followed by the payload bytes.
    File {
        index: u32,
        language: Language,
        label: String,
        payload: Bytes,
    },
    /// `query 0 <comment>`
    Query { comment: String },
    /// `end`
    End,
}

impl MossFrame {
    /// A convenience method to encode a frame into a `Vec<u8>`.
    pub fn encode_to_vec(&self) -> Result<Vec<u8>, MossError> {
        let mut buf = BytesMut::new();
        MossCodec::default().encode(self.clone(), &mut buf)?;
        Ok(buf.to_vec())
    }

    /// The command keyword, used for logging.
    pub fn name(&self) -> &'static str {
        match self {
            MossFrame::Moss { .. } => "moss",
            MossFrame::Directory(_) => "directory",
            MossFrame::Experimental(_) => "X",
            MossFrame::MaxMatches(_) => "maxmatches",
            MossFrame::Show(_) => "show",
            MossFrame::Language(_) => "language",
            MossFrame::File { .. } => "file",
            MossFrame::Query { .. } => "query",
            MossFrame::End => "end",
        }
    }
}

/// A chunk of text received from the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerReply(pub String);

impl ServerReply {
    /// The reply with surrounding whitespace removed.
    pub fn trimmed(&self) -> &str {
        self.0.trim()
    }

    /// True when the service refused the previous header.
    pub fn is_rejection(&self) -> bool {
        self.trimmed().eq_ignore_ascii_case("no")
    }
}

/// A `tokio_util::codec` implementation for the MOSS protocol.
#[derive(Debug, Clone)]
pub struct MossCodec {
    reply_limit: usize,
}

impl Default for MossCodec {
    fn default() -> Self {
        Self {
            reply_limit: DEFAULT_REPLY_LIMIT,
        }
    }
}

impl MossCodec {
    pub fn new(reply_limit: usize) -> Self {
        Self {
            reply_limit: reply_limit.max(1),
        }
    }

    /// Sets the maximum number of bytes a single decoded reply may hold.
    pub fn set_reply_limit(&mut self, limit: usize) {
        self.reply_limit = limit.max(1);
    }

    pub fn reply_limit(&self) -> usize {
        self.reply_limit
    }
}

fn flag(value: bool) -> &'static [u8] {
    if value { b"1" } else { b"0" }
}

fn put_line(dst: &mut BytesMut, parts: &[&[u8]]) {
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            dst.extend_from_slice(b" ");
        }
        dst.extend_from_slice(part);
    }
    dst.extend_from_slice(LF);
}

impl Encoder<MossFrame> for MossCodec {
    type Error = MossError;

    /// Encodes a `MossFrame` into a `BytesMut` buffer.
    fn encode(&mut self, item: MossFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            MossFrame::Moss { user_id } => put_line(dst, &[b"moss", user_id.as_bytes()]),
            MossFrame::Directory(on) => put_line(dst, &[b"directory", flag(on)]),
            MossFrame::Experimental(on) => put_line(dst, &[b"X", flag(on)]),
            MossFrame::MaxMatches(n) => put_line(dst, &[b"maxmatches", n.to_string().as_bytes()]),
            MossFrame::Show(n) => put_line(dst, &[b"show", n.to_string().as_bytes()]),
            MossFrame::Language(language) => {
                put_line(dst, &[b"language", language.as_token().as_bytes()])
            }
            MossFrame::File {
                index,
                language,
                label,
                payload,
            } => {
                if label.is_empty() || label.chars().any(char::is_whitespace) {
                    return Err(MossError::InvalidState(format!(
                        "file label '{label}' must be a single non-empty token"
                    )));
                }
                dst.reserve(payload.len() + label.len() + 32);
                put_line(
                    dst,
                    &[
                        b"file",
                        index.to_string().as_bytes(),
                        language.as_token().as_bytes(),
                        payload.len().to_string().as_bytes(),
                        label.as_bytes(),
                    ],
                );
                // The declared length is the only framing the receiver has.
                dst.extend_from_slice(&payload);
            }
            MossFrame::Query { comment } => put_line(
                dst,
                &[
                    b"query",
                    QUERY_RESERVED.to_string().as_bytes(),
                    comment.as_bytes(),
                ],
            ),
            MossFrame::End => put_line(dst, &[b"end"]),
        }
        Ok(())
    }
}

impl Decoder for MossCodec {
    type Item = ServerReply;
    type Error = MossError;

    /// Takes whatever the service has sent so far, up to the reply limit.
    /// Replies carry no framing of their own.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }
        let take = src.len().min(self.reply_limit);
        let chunk = src.split_to(take);
        Ok(Some(ServerReply(String::from_utf8_lossy(&chunk).into_owned())))
    }
}
