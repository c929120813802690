//! Application-wide constants for tuning and configuration
//!
//! Centralizes magic numbers to make them discoverable and configurable.

/// Prefix of every digest subject this tool sends.
/// The aggregator uses it to skip threads started by our own digests.
pub const DIGEST_SUBJECT_PREFIX: &str = "\u{1F4EC} ";

/// Stable middle part of the digest subject, shared by all period variants.
pub const DIGEST_SUBJECT_MARKER: &str = "Email Digest – ";

/// Maximum number of suggested reply options kept per digest entry.
/// The model is asked for at most this many; extras are discarded.
pub const MAX_REPLY_OPTIONS: usize = 3;

/// Fallback label for a reply option whose label normalizes to empty.
pub const DEFAULT_REPLY_LABEL: &str = "reply";

/// Subject sentinel for messages that arrive without one.
pub const NO_SUBJECT: &str = "No Subject";

/// Sender sentinel for transcript lines with an unresolvable address.
pub const UNKNOWN_SENDER: &str = "unknown";

/// Default lookback window for a daily digest run, in hours.
pub const DEFAULT_LOOKBACK_HOURS: i64 = 24;

/// Page size requested from the Graph messages endpoint.
/// Pagination via @odata.nextLink handles inboxes beyond this.
pub const GRAPH_PAGE_SIZE: u32 = 500;

/// Number of threads requested from the Gmail threads endpoint per run.
pub const GMAIL_THREAD_LIMIT: u32 = 20;

/// Maximum tokens requested from the summarization model per conversation.
pub const SUMMARY_MAX_TOKENS: u32 = 1200;

/// HTTP timeout for mail-provider and summarization requests, in seconds.
pub const HTTP_TIMEOUT_SECS: u64 = 60;
