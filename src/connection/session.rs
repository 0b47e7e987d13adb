// src/connection/session.rs

//! Drives one submission session over a single connection.
//!
//! The service keeps its own state machine and depends on receiving the
//! messages in exactly this order:
//!
//! 1. six header lines, then one read; a reply of `no` rejects the language,
//! 2. every base file (index 0), then every submission file (index 1, 2, ...),
//!    each as a `file` line followed by its raw bytes, with no replies,
//! 3. the `query` line, then one read holding the result URL.
//!
//! Every step is awaited before the next one starts. Any failure drops the
//! connection immediately and the session ends in `Closed`.

use super::state::SessionState;
use crate::config::SubmissionConfig;
use crate::core::MossError;
use crate::core::language::Language;
use crate::core::protocol::{BASE_FILE_INDEX, MossCodec, MossFrame, ServerReply};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// A client for one submission. Built from a finalized [`SubmissionConfig`],
/// it owns its connection from construction until [`MossClient::close`] or drop.
pub struct MossClient<S = TcpStream> {
    config: SubmissionConfig,
    framed: Option<Framed<S, MossCodec>>,
    state: SessionState,
}

impl MossClient<TcpStream> {
    /// Creates a client in `Disconnected`. No I/O happens until [`MossClient::open`].
    pub fn new(config: SubmissionConfig) -> Self {
        Self {
            config,
            framed: None,
            state: SessionState::Disconnected,
        }
    }

    /// Opens the connection to the configured service with the configured
    /// connect timeout. No protocol bytes are sent yet. A failed attempt
    /// leaves the client `Closed`.
    pub async fn open(&mut self) -> Result<(), MossError> {
        if self.state != SessionState::Disconnected {
            return Err(MossError::InvalidState(format!(
                "open requires a disconnected client, current state is '{}'",
                self.state
            )));
        }

        let addr = self.config.address();
        info!("Connecting to MOSS service at {}", addr);
        match dial(&addr, self.config.limits().connect_timeout).await {
            Ok(stream) => {
                let codec = MossCodec::new(self.config.limits().max_ack_bytes);
                self.framed = Some(Framed::new(stream, codec));
                self.advance(SessionState::Connected);
                Ok(())
            }
            Err(e) => {
                warn!("Could not connect to {}: {}", addr, e);
                self.advance(SessionState::Closed);
                Err(e)
            }
        }
    }

    /// Creates a client and opens its connection.
    pub async fn connect(config: SubmissionConfig) -> Result<Self, MossError> {
        let mut client = Self::new(config);
        client.open().await?;
        Ok(client)
    }

    /// Connects, runs the whole session and closes the connection, returning the
    /// result URL.
    pub async fn submit(config: SubmissionConfig) -> Result<String, MossError> {
        let mut client = Self::connect(config).await?;
        let result = client.send().await;
        client.close().await;
        result
    }
}

async fn dial(addr: &str, connect_timeout: Duration) -> Result<TcpStream, MossError> {
    let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| MossError::timed_out(&format!("connect to {addr}")))??;
    stream.set_nodelay(true)?;
    Ok(stream)
}

impl<S> MossClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an already established stream. The session starts in `Connected`.
    pub fn from_stream(config: SubmissionConfig, stream: S) -> Self {
        let codec = MossCodec::new(config.limits().max_ack_bytes);
        Self {
            config,
            framed: Some(Framed::new(stream, codec)),
            state: SessionState::Connected,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SubmissionConfig {
        &self.config
    }

    /// Runs the protocol and returns the service's reply to the query, trimmed.
    ///
    /// May be called once, on a `Connected` session. On failure the connection
    /// is released before the error is returned.
    pub async fn send(&mut self) -> Result<String, MossError> {
        if self.state != SessionState::Connected {
            return Err(MossError::InvalidState(format!(
                "send requires a connected session, current state is '{}'",
                self.state
            )));
        }

        match self.run().await {
            Ok(result) => {
                info!("MOSS session complete: {}", result);
                Ok(result)
            }
            Err(e) => {
                warn!("MOSS session failed while '{}': {}", self.state, e);
                self.abort();
                Err(e)
            }
        }
    }

    /// Releases the connection. After a successful session a courtesy `end`
    /// line is sent first when enabled; its failure is only logged.
    /// Safe to call any number of times.
    pub async fn close(&mut self) {
        if !self.state.is_open() {
            self.state = SessionState::Closed;
            return;
        }
        let Some(mut framed) = self.framed.take() else {
            self.advance(SessionState::Closed);
            return;
        };

        let limits = self.config.limits();
        if self.state == SessionState::ResponseReceived && limits.send_end {
            match tokio::time::timeout(limits.read_timeout, framed.send(MossFrame::End)).await {
                Ok(Ok(())) => debug!("Sent 'end' to the service."),
                Ok(Err(e)) => warn!("Could not send 'end' to the service: {}", e),
                Err(_) => warn!("Timed out sending 'end' to the service."),
            }
        }
        if let Err(e) = framed.get_mut().shutdown().await {
            debug!("Error shutting down connection: {}", e);
        }
        self.advance(SessionState::Closed);
    }

    fn abort(&mut self) {
        if self.state.is_open() {
            debug!("Dropping connection after failure.");
        }
        self.framed = None;
        self.advance(SessionState::Closed);
    }

    fn advance(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        debug!("Session state {} -> {}", self.state, next);
        self.state = next;
    }

    async fn run(&mut self) -> Result<String, MossError> {
        self.send_headers().await?;
        self.advance(SessionState::HeadersSent);

        self.upload_files().await?;
        self.advance(SessionState::FilesUploaded);

        self.send_query().await?;
        self.advance(SessionState::QuerySent);

        let result = self.read_result().await?;
        self.advance(SessionState::ResponseReceived);
        Ok(result)
    }

    async fn send_headers(&mut self) -> Result<(), MossError> {
        let config = &self.config;
        let framed = transport(&mut self.framed)?;

        let headers = [
            MossFrame::Moss {
                user_id: config.user_id().to_string(),
            },
            MossFrame::Directory(config.use_directory_mode()),
            MossFrame::Experimental(config.use_experimental_mode()),
            MossFrame::MaxMatches(config.max_ignore_threshold()),
            MossFrame::Show(config.max_matches_displayed()),
            MossFrame::Language(config.language()),
        ];
        for frame in headers {
            debug!("Sending header '{}'", frame.name());
            framed.feed(frame).await?;
        }
        framed.flush().await?;

        framed
            .codec_mut()
            .set_reply_limit(config.limits().max_ack_bytes);
        let reply = read_reply(framed, config.limits().read_timeout, "language acknowledgement")
            .await?
            .unwrap_or_else(|| ServerReply(String::new()));
        if reply.is_rejection() {
            return Err(MossError::UnsupportedLanguage(config.language()));
        }
        debug!("Language acknowledged: {:?}", reply.trimmed());
        Ok(())
    }

    async fn upload_files(&mut self) -> Result<(), MossError> {
        let config = &self.config;
        let framed = transport(&mut self.framed)?;
        let language = config.language();

        let mut count = 0usize;
        for (index, path) in tag_file_indices(config.base_files(), config.submission_files()) {
            send_file(framed, &path, index, language).await?;
            count += 1;
        }
        info!("Uploaded {} file(s).", count);
        Ok(())
    }

    async fn send_query(&mut self) -> Result<(), MossError> {
        let comment = self.config.comment().to_string();
        let framed = transport(&mut self.framed)?;
        debug!("Sending query with comment {:?}", comment);
        framed.send(MossFrame::Query { comment }).await
    }

    async fn read_result(&mut self) -> Result<String, MossError> {
        let limits = self.config.limits();
        let framed = transport(&mut self.framed)?;
        framed.codec_mut().set_reply_limit(limits.max_response_bytes);
        match read_reply(framed, limits.read_timeout, "result").await? {
            Some(reply) => Ok(reply.trimmed().to_string()),
            None => Err(MossError::Connection(Arc::new(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed by the service before a result was returned",
            )))),
        }
    }
}

impl<S> Drop for MossClient<S> {
    fn drop(&mut self) {
        if self.state.is_open() {
            debug!(
                "MossClient dropped in state '{}', releasing the connection.",
                self.state
            );
        }
    }
}

/// Pairs every file with its protocol index: base files are always 0,
/// submission files count up from 1 in iteration order.
pub fn tag_file_indices<P>(
    base: impl Iterator<Item = P>,
    submissions: impl Iterator<Item = P>,
) -> impl Iterator<Item = (u32, P)> {
    base.map(|path| (BASE_FILE_INDEX, path))
        .chain(submissions.zip(1u32..).map(|(path, index)| (index, path)))
}

/// The label sent with a file: its path, with whitespace replaced so the
/// label stays a single token.
pub fn file_label(path: &Path) -> String {
    path.to_string_lossy()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

fn transport<S>(
    framed: &mut Option<Framed<S, MossCodec>>,
) -> Result<&mut Framed<S, MossCodec>, MossError> {
    framed
        .as_mut()
        .ok_or_else(|| MossError::InvalidState("connection already released".into()))
}

async fn send_file<S>(
    framed: &mut Framed<S, MossCodec>,
    path: &Path,
    index: u32,
    language: Language,
) -> Result<(), MossError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let payload = tokio::fs::read(path)
        .await
        .map_err(|e| MossError::file_access(path, e))?;
    debug!(
        "Uploading file #{} '{}' ({} bytes)",
        index,
        path.display(),
        payload.len()
    );
    framed
        .send(MossFrame::File {
            index,
            language,
            label: file_label(path),
            payload: Bytes::from(payload),
        })
        .await
}

/// One bounded read. `None` means the service closed the connection.
async fn read_reply<S>(
    framed: &mut Framed<S, MossCodec>,
    timeout: Duration,
    what: &str,
) -> Result<Option<ServerReply>, MossError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match tokio::time::timeout(timeout, framed.next()).await {
        Ok(Some(Ok(reply))) => Ok(Some(reply)),
        Ok(Some(Err(e))) => Err(e),
        Ok(None) => Ok(None),
        Err(_) => Err(MossError::timed_out(&format!("waiting for {what}"))),
    }
}
