//! W3C Trace Context propagation.
//!
//! Every request runs under a span identified by a `traceparent` value:
//!
//! ```text
//! 00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01
//! ^^ ^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^ ^^^^^^^^^^^^^^^^ ^^
//! |  trace-id (16 bytes hex)          span-id (8 bytes) flags
//! version
//! ```
//!
//! If the caller sent a valid `traceparent`, the request joins that trace as a
//! child span. Otherwise a fresh trace is started. See
//! <https://www.w3.org/TR/trace-context/>.

use std::fmt;

use http::HeaderMap;
use uuid::Uuid;

/// The W3C Trace Context header name.
pub const TRACEPARENT: &str = "traceparent";

const SAMPLED: u8 = 0x01;

/// One span's position in a distributed trace.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TraceParent {
    trace_id: String,
    span_id: String,
    flags: u8,
}

impl TraceParent {
    /// Starts a new trace with a fresh trace id and span id.
    pub fn root() -> Self {
        Self { trace_id: new_trace_id(), span_id: new_span_id(), flags: SAMPLED }
    }

    /// A new span in the same trace, inheriting the sampling flags.
    pub fn child(&self) -> Self {
        Self { trace_id: self.trace_id.clone(), span_id: new_span_id(), flags: self.flags }
    }

    /// Parses a `traceparent` header value. Returns `None` for anything the
    /// W3C format rejects (wrong lengths, upper-case hex, all-zero ids, `ff`
    /// version).
    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.trim().split('-');
        let version = parts.next()?;
        let trace_id = parts.next()?;
        let span_id = parts.next()?;
        let flags = parts.next()?;

        if !is_lower_hex(version, 2) || version == "ff" {
            return None;
        }
        // Version 00 has exactly four fields; later versions may append more.
        if version == "00" && parts.next().is_some() {
            return None;
        }
        if !is_lower_hex(trace_id, 32) || is_all_zero(trace_id) {
            return None;
        }
        if !is_lower_hex(span_id, 16) || is_all_zero(span_id) {
            return None;
        }
        if !is_lower_hex(flags, 2) {
            return None;
        }

        Some(Self {
            trace_id: trace_id.to_owned(),
            span_id: span_id.to_owned(),
            flags: u8::from_str_radix(flags, 16).ok()?,
        })
    }

    /// The span for an inbound request: a child of the caller's span when the
    /// request carries a valid `traceparent`, otherwise a new root.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(TRACEPARENT)
            .and_then(|v| v.to_str().ok())
            .and_then(Self::parse)
            .map(|parent| parent.child())
            .unwrap_or_else(Self::root)
    }

    pub fn trace_id(&self) -> &str { &self.trace_id }
    pub fn span_id(&self) -> &str { &self.span_id }
    pub fn is_sampled(&self) -> bool { self.flags & SAMPLED != 0 }
}

impl fmt::Display for TraceParent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "00-{}-{}-{:02x}", self.trace_id, self.span_id, self.flags)
    }
}

fn new_trace_id() -> String {
    Uuid::now_v7().simple().to_string()
}

// The leading half of a v7 UUID is mostly timestamp; the tail is random.
fn new_span_id() -> String {
    Uuid::now_v7().simple().to_string()[16..].to_owned()
}

fn is_lower_hex(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

fn is_all_zero(s: &str) -> bool {
    s.bytes().all(|b| b == b'0')
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01";

    #[test]
    fn parses_valid_header() {
        let tp = TraceParent::parse(VALID).unwrap();
        assert_eq!(tp.trace_id(), "0af7651916cd43dd8448eb211c80319c");
        assert_eq!(tp.span_id(), "b7ad6b7169203331");
        assert!(tp.is_sampled());
        assert_eq!(tp.to_string(), VALID);
    }

    #[test]
    fn rejects_malformed_headers() {
        for bad in [
            "",
            "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331",
            "ff-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01",
            "00-0AF7651916CD43DD8448EB211C80319C-b7ad6b7169203331-01",
            "00-00000000000000000000000000000000-b7ad6b7169203331-01",
            "00-0af7651916cd43dd8448eb211c80319c-0000000000000000-01",
            "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01-extra",
            "00-0af7651916cd43dd-b7ad6b7169203331-01",
        ] {
            assert!(TraceParent::parse(bad).is_none(), "accepted {bad:?}");
        }
    }

    #[test]
    fn child_keeps_trace_and_changes_span() {
        let parent = TraceParent::parse(VALID).unwrap();
        let child = parent.child();
        assert_eq!(child.trace_id(), parent.trace_id());
        assert_ne!(child.span_id(), parent.span_id());
        assert_eq!(child.span_id().len(), 16);
    }

    #[test]
    fn from_headers_falls_back_to_root() {
        let mut headers = HeaderMap::new();
        let root = TraceParent::from_headers(&headers);
        assert_eq!(root.trace_id().len(), 32);

        headers.insert(TRACEPARENT, VALID.parse().unwrap());
        let joined = TraceParent::from_headers(&headers);
        assert_eq!(joined.trace_id(), "0af7651916cd43dd8448eb211c80319c");
    }
}
