//! Single byte-range handling for `Range: bytes=...` headers.
//!
//! Used by the in-memory storage backend so it answers range requests the way
//! S3 does: a syntactically invalid header is ignored (full body, 200), a
//! valid but unsatisfiable one is rejected (416).

/// Inclusive byte range within an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` header value for this range of a `total`-byte object.
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    /// No usable range: serve the whole object.
    Full,
    Partial(ByteRange),
    Unsatisfiable,
}

enum Spec {
    FromTo(u64, Option<u64>),
    Suffix(u64),
}

fn parse(header: &str) -> Option<Spec> {
    let spec = header.trim().strip_prefix("bytes=")?;
    // Multi-range requests are not supported by S3 either; they fall back to a full response.
    if spec.contains(',') {
        return None;
    }
    let (start, end) = spec.split_once('-')?;
    let (start, end) = (start.trim(), end.trim());
    match (start.is_empty(), end.is_empty()) {
        (true, true) => None,
        (true, false) => end.parse().ok().map(Spec::Suffix),
        (false, true) => start.parse().ok().map(|s| Spec::FromTo(s, None)),
        (false, false) => {
            let s: u64 = start.parse().ok()?;
            let e: u64 = end.parse().ok()?;
            (s <= e).then_some(Spec::FromTo(s, Some(e)))
        }
    }
}

/// Resolves a `Range` header against an object of `total` bytes.
pub fn resolve(header: &str, total: u64) -> Resolved {
    let Some(spec) = parse(header) else {
        return Resolved::Full;
    };
    match spec {
        Spec::FromTo(start, _) if start >= total => Resolved::Unsatisfiable,
        Spec::FromTo(start, end) => {
            let last = total - 1;
            Resolved::Partial(ByteRange {
                start,
                end: end.map_or(last, |e| e.min(last)),
            })
        }
        Spec::Suffix(0) => Resolved::Unsatisfiable,
        Spec::Suffix(_) if total == 0 => Resolved::Unsatisfiable,
        Spec::Suffix(n) => Resolved::Partial(ByteRange {
            start: total.saturating_sub(n),
            end: total - 1,
        }),
    }
}
