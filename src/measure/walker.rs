// src/measure/walker.rs
// =============================================================================
// This module walks the redirect chain of a single URL.
//
// How a walk works:
// 1. Build a brand new HTTP client (own cookie store, no auto-redirects)
// 2. GET the current URL and read the whole body
// 3. Record the hop (status code, body size, position, effective URL)
// 4. If the response is a 3xx with a Location header, go to that URL
// 5. Stop on a terminal response, an error, or when the hop cap is hit
//
// Every walk shares one deadline: a slow chain of fast hops times out just
// like a single slow hop does.
//
// Rust concepts:
// - thiserror: Derive Display/Error for our own error enum
// - serde rename: Control the exact JSON field names we write
// - tokio::time::timeout_at: Bound a future by an absolute deadline
// =============================================================================

use reqwest::header::{HeaderValue, LOCATION};
use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use url::Url;

use crate::testlist::UrlEntry;

/// Failure text recorded when a chain needs more hops than allowed.
pub const TOO_MANY_REDIRECTIONS: &str = "too many redirections";

// The result of measuring one URL.
//
// Field names are renamed so every JSON line keeps the established
// `{"Failure", "OrigURL", "Filename", "Responses"}` layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement {
    /// What stopped the walk, if anything went wrong
    #[serde(rename = "Failure")]
    pub failure: Option<String>,
    /// The URL exactly as it appeared in the test list
    #[serde(rename = "OrigURL")]
    pub orig_url: String,
    /// Base name of the test list the URL came from
    #[serde(rename = "Filename")]
    pub filename: String,
    /// One entry per completed hop, in chain order
    #[serde(rename = "Responses")]
    pub responses: Vec<Response>,
}

impl Measurement {
    /// Starts an empty measurement for the given entry
    pub fn new(entry: &UrlEntry) -> Self {
        Self {
            failure: None,
            orig_url: entry.url.clone(),
            filename: entry.filename.clone(),
            responses: Vec::new(),
        }
    }

    /// True when the walk ended without recording a failure
    pub fn is_ok(&self) -> bool {
        self.failure.is_none()
    }

    fn fail(&mut self, failure: impl Into<String>) {
        self.failure = Some(failure.into());
    }
}

// One hop of a redirect chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Response {
    /// HTTP status code
    pub code: u16,
    /// Number of body bytes we read
    pub body_size: usize,
    /// Position in the chain, starting at zero
    pub idx: usize,
    /// The request that produced this response
    pub request: RequestInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestInfo {
    /// Effective URL of the request
    #[serde(rename = "URL")]
    pub url: String,
}

// Everything that can end a walk early.
//
// The Display text of each variant is what ends up in `Measurement::failure`.
#[derive(Debug, Error)]
pub enum HopError {
    #[error("generic_timeout_error: request timed out")]
    Timeout,
    #[error("{}", error_chain(.0))]
    Request(#[from] reqwest::Error),
    #[error("invalid Location header {location:?}: {reason}")]
    InvalidLocation { location: String, reason: String },
    #[error("cannot create HTTP client: {}", error_chain(.0))]
    Client(reqwest::Error),
}

// reqwest hides the interesting part ("connection refused", "dns error")
// in the source chain, so we flatten it into one line.
fn error_chain(error: &dyn StdError) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        // reqwest's own Display already carries some of its causes
        let cause_text = cause.to_string();
        if !text.contains(&cause_text) {
            text.push_str(": ");
            text.push_str(&cause_text);
        }
        source = cause.source();
    }
    text
}

/// Limits applied to every walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkerConfig {
    /// Time budget for the whole chain, counted from dispatch
    pub timeout: Duration,
    /// Maximum number of hops recorded before giving up
    pub max_hops: usize,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_hops: 10,
        }
    }
}

/// Follows redirect chains one hop at a time.
///
/// A `Walker` holds only configuration. Client state is created inside each
/// walk and dropped at its end, so one walker can be shared by many tasks.
#[derive(Debug, Clone, Default)]
pub struct Walker {
    config: WalkerConfig,
}

// What a single GET gave us, before we decide where to go next
struct Hop {
    record: Response,
    status: StatusCode,
    url: Url,
    location: Option<HeaderValue>,
}

impl Walker {
    pub fn new(config: WalkerConfig) -> Self {
        Self { config }
    }

    /// Measures `entry` with a fresh deadline of `config.timeout` from now
    pub async fn measure(&self, entry: &UrlEntry) -> Measurement {
        let deadline = Instant::now() + self.config.timeout;
        self.walk(entry, deadline).await
    }

    /// Walks the redirect chain starting at `entry.url` until `deadline`.
    ///
    /// Never fails: every problem is written into the returned measurement.
    pub async fn walk(&self, entry: &UrlEntry, deadline: Instant) -> Measurement {
        let mut measurement = Measurement::new(entry);

        let client = match build_client() {
            Ok(client) => client,
            Err(e) => {
                measurement.fail(HopError::Client(e).to_string());
                return measurement;
            }
        };

        let mut next = Some(entry.url.clone());
        while let Some(current) = next.take() {
            // Stop before an extra hop would push us past the cap
            if measurement.responses.len() >= self.config.max_hops {
                measurement.fail(TOO_MANY_REDIRECTIONS);
                break;
            }

            let idx = measurement.responses.len();
            let hop = match fetch(&client, &current, idx, deadline).await {
                Ok(hop) => hop,
                Err(e) => {
                    measurement.fail(e.to_string());
                    break;
                }
            };

            let target = redirect_target(hop.status, &hop.url, hop.location.as_ref());
            measurement.responses.push(hop.record);

            match target {
                Ok(target) => next = target.map(String::from),
                Err(e) => measurement.fail(e.to_string()),
            }
        }

        measurement
    }
}

// Builds the per-walk client.
//
// Policy::none(): every hop has to come back to us so it can be recorded.
fn build_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .redirect(Policy::none())
        .cookie_store(true)
        .build()
}

// Performs one GET and reads the full body, all within the walk deadline
async fn fetch(client: &Client, url: &str, idx: usize, deadline: Instant) -> Result<Hop, HopError> {
    let exchange = async {
        let response = client.get(url).send().await?;
        let status = response.status();
        let effective = response.url().clone();
        let location = response.headers().get(LOCATION).cloned();
        let body = response.bytes().await?;

        Ok::<_, HopError>(Hop {
            record: Response {
                code: status.as_u16(),
                body_size: body.len(),
                idx,
                request: RequestInfo {
                    url: effective.to_string(),
                },
            },
            status,
            url: effective,
            location,
        })
    };

    tokio::time::timeout_at(deadline, exchange)
        .await
        .map_err(|_| HopError::Timeout)?
}

// Decides where the chain continues.
//
// Ok(None) means the chain ended normally: either the status is not a
// redirect or there is no Location to follow. Relative locations are
// resolved against the URL that produced the response.
fn redirect_target(
    status: StatusCode,
    base: &Url,
    location: Option<&HeaderValue>,
) -> Result<Option<Url>, HopError> {
    let Some(location) = location.filter(|_| status.is_redirection()) else {
        return Ok(None);
    };

    // HeaderValue::to_str only accepts visible ASCII, servers do send UTF-8
    let raw = std::str::from_utf8(location.as_bytes()).map_err(|e| HopError::InvalidLocation {
        location: String::from_utf8_lossy(location.as_bytes()).into_owned(),
        reason: e.to_string(),
    })?;

    base.join(raw)
        .map(Some)
        .map_err(|e| HopError::InvalidLocation {
            location: raw.to_string(),
            reason: e.to_string(),
        })
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why a new Client for every walk?
//    - Each client owns its own cookie jar
//    - Cookies set on hop 1 are sent on hop 2 of the same chain...
//    - ...but never reach a different URL, even one measured at the same time
//
// 2. What is `let ... else`?
//    - Pattern match that must succeed, otherwise the else block runs
//    - The else block has to leave the function (return, break, ...)
//
// 3. Why does walk() return Measurement and not Result?
//    - A broken URL is data, not a bug in our program
//    - The error text goes into the measurement and the pipeline carries on
// -----------------------------------------------------------------------------
