// src/config.rs

//! Manages submission configuration: the builder, the immutable value handed to
//! a session, and loading both from a TOML file.

use crate::core::MossError;
use crate::core::files::FileSet;
use crate::core::language::Language;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

fn default_server() -> String {
    "moss.stanford.edu".to_string()
}
fn default_port() -> u16 {
    7690
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_ignore_threshold() -> u32 {
    10
}
fn default_max_matches_displayed() -> u32 {
    250
}
fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}
fn default_read_timeout() -> Duration {
    // The result URL only arrives once the service has finished comparing.
    Duration::from_secs(300)
}
fn default_max_ack_bytes() -> usize {
    512
}
fn default_max_response_bytes() -> usize {
    1024
}
fn default_send_end() -> bool {
    true
}
fn default_comment() -> String {
    chrono::Local::now()
        .format("%Y-%m-%d %H:%M:%S%.6f")
        .to_string()
}

/// Transport bounds applied by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportLimits {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    /// Upper bound for the single reply read after the `language` header.
    pub max_ack_bytes: usize,
    /// Upper bound for the single reply read after the query.
    pub max_response_bytes: usize,
    /// Whether a successful session ends with a courtesy `end` line.
    pub send_end: bool,
}

impl Default for TransportLimits {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            read_timeout: default_read_timeout(),
            max_ack_bytes: default_max_ack_bytes(),
            max_response_bytes: default_max_response_bytes(),
            send_end: default_send_end(),
        }
    }
}

/// A finalized, validated submission. Produced by [`SubmissionConfigBuilder::build`];
/// read-only from then on.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionConfig {
    user_id: String,
    server: String,
    port: u16,
    comment: String,
    language: Language,
    use_directory_mode: bool,
    use_experimental_mode: bool,
    max_ignore_threshold: u32,
    max_matches_displayed: u32,
    base: FileSet,
    submissions: FileSet,
    limits: TransportLimits,
}

impl SubmissionConfig {
    /// Starts a builder for the given user id.
    pub fn builder(user_id: impl Into<String>) -> SubmissionConfigBuilder {
        SubmissionConfigBuilder::new(user_id)
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
    pub fn server(&self) -> &str {
        &self.server
    }
    pub fn port(&self) -> u16 {
        self.port
    }
    pub fn comment(&self) -> &str {
        &self.comment
    }
    pub fn language(&self) -> Language {
        self.language
    }
    pub fn use_directory_mode(&self) -> bool {
        self.use_directory_mode
    }
    pub fn use_experimental_mode(&self) -> bool {
        self.use_experimental_mode
    }
    pub fn max_ignore_threshold(&self) -> u32 {
        self.max_ignore_threshold
    }
    pub fn max_matches_displayed(&self) -> u32 {
        self.max_matches_displayed
    }
    pub fn limits(&self) -> &TransportLimits {
        &self.limits
    }

    /// Returns the same submission aimed at another port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// The `host:port` pair to connect to.
    pub fn address(&self) -> String {
        format!("{}:{}", self.server, self.port)
    }

    /// Base files, re-resolved on every call.
    pub fn base_files(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.base.iter()
    }

    /// Submission files, re-resolved on every call.
    pub fn submission_files(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.submissions.iter()
    }
}

/// Renders the equivalent invocation of the classic `moss` script.
impl fmt::Display for SubmissionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "moss -c \"{}\" -l {} -m {} -n {}",
            self.comment, self.language, self.max_ignore_threshold, self.max_matches_displayed
        )?;
        if self.use_directory_mode {
            f.write_str(" -d")?;
        }
        if self.use_experimental_mode {
            f.write_str(" -x")?;
        }
        for file in self.base_files() {
            write!(f, " -b \"{}\"", file.display())?;
        }
        for file in self.submission_files() {
            write!(f, " \"{}\"", file.display())?;
        }
        Ok(())
    }
}

/// Chained builder for [`SubmissionConfig`]. Setters return the builder; file
/// registration and `build` validate and return `Result`.
#[derive(Debug, Clone)]
pub struct SubmissionConfigBuilder {
    user_id: String,
    server: String,
    port: u16,
    comment: Option<String>,
    language: Language,
    use_directory_mode: bool,
    use_experimental_mode: bool,
    max_ignore_threshold: u32,
    max_matches_displayed: u32,
    base: FileSet,
    submissions: FileSet,
    limits: TransportLimits,
}

impl SubmissionConfigBuilder {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            server: default_server(),
            port: default_port(),
            comment: None,
            language: Language::default(),
            use_directory_mode: false,
            use_experimental_mode: false,
            max_ignore_threshold: default_max_ignore_threshold(),
            max_matches_displayed: default_max_matches_displayed(),
            base: FileSet::new(),
            submissions: FileSet::new(),
            limits: TransportLimits::default(),
        }
    }

    pub fn server(mut self, server: impl Into<String>) -> Self {
        self.server = server.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the comment (`-c`) attached to the query.
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Sets the language (`-l`).
    pub fn language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    /// Sets directory mode (`-d`).
    pub fn directory_mode(mut self, on: bool) -> Self {
        self.use_directory_mode = on;
        self
    }

    /// Sets experimental mode (`-x`).
    pub fn experimental(mut self, on: bool) -> Self {
        self.use_experimental_mode = on;
        self
    }

    /// Sets the `-m` cutoff: matches appearing more often than this are ignored.
    pub fn max_ignore_threshold(mut self, n: u32) -> Self {
        self.max_ignore_threshold = n;
        self
    }

    /// Sets the `-n` cap on matches shown in the result.
    pub fn max_matches_displayed(mut self, n: u32) -> Self {
        self.max_matches_displayed = n;
        self
    }

    pub fn limits(mut self, limits: TransportLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn add_base_file(mut self, path: impl Into<PathBuf>) -> Result<Self, MossError> {
        self.base.add_path(path.into())?;
        Ok(self)
    }

    pub fn add_base_glob(mut self, pattern: &str) -> Result<Self, MossError> {
        self.base.add_glob(pattern)?;
        Ok(self)
    }

    pub fn add_submission_file(mut self, path: impl Into<PathBuf>) -> Result<Self, MossError> {
        self.submissions.add_path(path.into())?;
        Ok(self)
    }

    pub fn add_submission_glob(mut self, pattern: &str) -> Result<Self, MossError> {
        self.submissions.add_glob(pattern)?;
        Ok(self)
    }

    /// Validates and freezes the configuration.
    pub fn build(self) -> Result<SubmissionConfig, MossError> {
        let user_id = self.user_id.trim().to_string();
        if user_id.is_empty() {
            return Err(MossError::InvalidConfig("user id cannot be empty".into()));
        }
        if user_id.chars().any(char::is_whitespace) {
            return Err(MossError::InvalidConfig(
                "user id cannot contain whitespace".into(),
            ));
        }
        if self.server.trim().is_empty() {
            return Err(MossError::InvalidConfig("server cannot be empty".into()));
        }
        if self.port == 0 {
            return Err(MossError::InvalidConfig("port cannot be 0".into()));
        }
        let comment = self.comment.unwrap_or_else(default_comment);
        if comment.contains(['\n', '\r']) {
            return Err(MossError::InvalidConfig(
                "comment cannot contain line breaks".into(),
            ));
        }
        if self.limits.max_ack_bytes == 0 || self.limits.max_response_bytes == 0 {
            return Err(MossError::InvalidConfig(
                "reply size bounds must be greater than 0".into(),
            ));
        }
        if self.limits.connect_timeout.is_zero() || self.limits.read_timeout.is_zero() {
            return Err(MossError::InvalidConfig(
                "timeouts must be greater than 0".into(),
            ));
        }
        if self.submissions.is_empty() {
            warn!("No submission files registered; the service will have nothing to compare.");
        }

        Ok(SubmissionConfig {
            user_id,
            server: self.server,
            port: self.port,
            comment,
            language: self.language,
            use_directory_mode: self.use_directory_mode,
            use_experimental_mode: self.use_experimental_mode,
            max_ignore_threshold: self.max_ignore_threshold,
            max_matches_displayed: self.max_matches_displayed,
            base: self.base,
            submissions: self.submissions,
            limits: self.limits,
        })
    }
}

/// A raw representation of the config file before validation.
#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default = "default_log_level")]
    log_level: String,
    user_id: String,
    #[serde(default = "default_server")]
    server: String,
    #[serde(default = "default_port")]
    port: u16,
    comment: Option<String>,
    #[serde(default)]
    language: Language,
    #[serde(default)]
    directory_mode: bool,
    #[serde(default)]
    experimental_mode: bool,
    #[serde(default = "default_max_ignore_threshold")]
    max_ignore_threshold: u32,
    #[serde(default = "default_max_matches_displayed")]
    max_matches_displayed: u32,
    #[serde(with = "humantime_serde", default = "default_connect_timeout")]
    connect_timeout: Duration,
    #[serde(with = "humantime_serde", default = "default_read_timeout")]
    read_timeout: Duration,
    #[serde(default = "default_max_ack_bytes")]
    max_ack_bytes: usize,
    #[serde(default = "default_max_response_bytes")]
    max_response_bytes: usize,
    #[serde(default = "default_send_end")]
    send_end: bool,
    #[serde(default)]
    base_files: Vec<PathBuf>,
    #[serde(default)]
    base_globs: Vec<String>,
    #[serde(default)]
    submission_files: Vec<PathBuf>,
    #[serde(default)]
    submission_globs: Vec<String>,
}

/// Process-level configuration loaded by the binary.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub submission: SubmissionConfig,
}

impl Config {
    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Invalid configuration in '{path}'"))
    }

    /// Parses and validates configuration from TOML text. Relative file paths
    /// are resolved against the current directory.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(contents).context("Failed to parse TOML")?;

        let mut builder = SubmissionConfigBuilder::new(raw.user_id)
            .server(raw.server)
            .port(raw.port)
            .language(raw.language)
            .directory_mode(raw.directory_mode)
            .experimental(raw.experimental_mode)
            .max_ignore_threshold(raw.max_ignore_threshold)
            .max_matches_displayed(raw.max_matches_displayed)
            .limits(TransportLimits {
                connect_timeout: raw.connect_timeout,
                read_timeout: raw.read_timeout,
                max_ack_bytes: raw.max_ack_bytes,
                max_response_bytes: raw.max_response_bytes,
                send_end: raw.send_end,
            });
        if let Some(comment) = raw.comment {
            builder = builder.comment(comment);
        }
        for pattern in &raw.base_globs {
            builder = builder.add_base_glob(pattern)?;
        }
        for path in raw.base_files {
            builder = builder.add_base_file(path)?;
        }
        for pattern in &raw.submission_globs {
            builder = builder.add_submission_glob(pattern)?;
        }
        for path in raw.submission_files {
            builder = builder.add_submission_file(path)?;
        }

        Ok(Config {
            log_level: raw.log_level,
            submission: builder.build()?,
        })
    }
}
