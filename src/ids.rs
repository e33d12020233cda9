//! Request correlation identifiers.
//!
//! Every call to [`AppService::handle`](crate::service::AppService::handle) is tagged with a
//! [`RequestId`]. Resolution, dispatch, transaction and error-log events all carry it as the
//! `request_id` field. An upstream id is kept when the transport passes one that parses as a
//! ULID.

use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// ULID tagging one dispatched request.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct RequestId(Ulid);

impl RequestId {
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Keep the transport's correlation id when it is a ULID, mint one otherwise.
    #[must_use]
    pub fn from_header_or_new(header_value: Option<&str>) -> Self {
        match header_value.map(str::trim).map(str::parse::<RequestId>) {
            Some(Ok(id)) => id,
            _ => Self::new(),
        }
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for RequestId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}
