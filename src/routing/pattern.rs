//! Typed route patterns.
//!
//! # Responsibilities
//! - Parse `/literal/{name:kind}` patterns at registration time
//! - Reject malformed patterns before the server accepts traffic
//! - Validate captured values against their character class at match time
//!
//! # Design Decisions
//! - Capture kinds are a closed set, no user-supplied regex
//! - A capture failing its class means the route did not match
//! - Only whole-segment captures; `{*}` tail only in last position
//! - A tail capture also matches an empty remainder (`/identicon/`)
//! - Captured values are percent-decoded before their class is checked

use std::collections::HashSet;
use std::fmt;

use percent_encoding::percent_decode_str;

use crate::routing::RouteError;

/// Character class a capture must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    /// Host-like: ASCII alphanumerics plus `.`, `:`, `-`, `_`.
    Authority,
    /// ASCII alphanumerics.
    MediaId,
    /// ASCII alphanumerics plus `.`, `_`, `-`.
    Filename,
    /// Unrestricted remainder of the path.
    Tail,
}

impl CaptureKind {
    fn parse(kind: &str) -> Option<Self> {
        match kind {
            "authority" => Some(CaptureKind::Authority),
            "media_id" => Some(CaptureKind::MediaId),
            "filename" => Some(CaptureKind::Filename),
            "*" => Some(CaptureKind::Tail),
            _ => None,
        }
    }

    /// Returns true if `value` belongs to this class.
    pub fn accepts(&self, value: &str) -> bool {
        match self {
            CaptureKind::Authority => {
                !value.is_empty()
                    && value
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | ':' | '-' | '_'))
            }
            CaptureKind::MediaId => !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric()),
            CaptureKind::Filename => {
                !value.is_empty()
                    && value
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
            }
            CaptureKind::Tail => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Capture { name: String, kind: CaptureKind },
}

/// A parsed, validated route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    source: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    pub fn parse(pattern: &str) -> Result<Self, RouteError> {
        let malformed = |reason: &str| RouteError::Malformed {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        let rest = pattern
            .strip_prefix('/')
            .ok_or_else(|| malformed("pattern must start with `/`"))?;

        let raw: Vec<&str> = rest.split('/').collect();
        let mut segments = Vec::with_capacity(raw.len());
        let mut names = HashSet::new();

        for (i, segment) in raw.iter().enumerate() {
            if segment.is_empty() {
                return Err(malformed("empty path segment"));
            }

            let Some(inner) = segment.strip_prefix('{') else {
                if segment.contains(['{', '}']) {
                    return Err(malformed("captures must span a whole segment"));
                }
                segments.push(Segment::Literal(segment.to_string()));
                continue;
            };

            let inner = inner
                .strip_suffix('}')
                .ok_or_else(|| malformed("unterminated capture"))?;
            let (name, kind) = inner
                .split_once(':')
                .ok_or_else(|| malformed("capture needs a `name:kind` form"))?;

            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(malformed("invalid capture name"));
            }
            let kind = CaptureKind::parse(kind).ok_or_else(|| malformed("unknown capture kind"))?;
            if kind == CaptureKind::Tail && i + 1 != raw.len() {
                return Err(malformed("tail capture must be the last segment"));
            }
            if !names.insert(name.to_string()) {
                return Err(malformed("duplicate capture name"));
            }

            segments.push(Segment::Capture {
                name: name.to_string(),
                kind,
            });
        }

        Ok(Self {
            source: pattern.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The pattern in the radix tree's own syntax.
    pub(crate) fn tree_path(&self) -> String {
        let mut path = String::new();
        for segment in &self.segments {
            path.push('/');
            match segment {
                Segment::Literal(literal) => path.push_str(literal),
                Segment::Capture { name, kind: CaptureKind::Tail } => {
                    path.push_str("{*");
                    path.push_str(name);
                    path.push('}');
                }
                Segment::Capture { name, .. } => {
                    path.push('{');
                    path.push_str(name);
                    path.push('}');
                }
            }
        }
        path
    }

    /// Tree path for a tail capture matching nothing, e.g. `/identicon/`.
    ///
    /// The radix tree's catch-all never matches an empty remainder, so a
    /// pattern ending in a tail capture is inserted a second time under this
    /// path.
    pub(crate) fn empty_tail_path(&self) -> Option<String> {
        let (last, head) = self.segments.split_last()?;
        if !matches!(last, Segment::Capture { kind: CaptureKind::Tail, .. }) {
            return None;
        }
        let prefix = Self {
            source: String::new(),
            segments: head.to_vec(),
        };
        let mut path = prefix.tree_path();
        path.push('/');
        Some(path)
    }

    /// Check tree parameters against capture kinds.
    ///
    /// Values are percent-decoded first. Returns `None` if any capture is not
    /// valid UTF-8 once decoded, or fails its character class.
    pub(crate) fn captures(&self, params: &matchit::Params<'_, '_>) -> Option<Captures> {
        let mut captures = Vec::new();
        for segment in &self.segments {
            if let Segment::Capture { name, kind } = segment {
                let raw = params.get(name.as_str()).unwrap_or_default();
                let value = percent_decode_str(raw).decode_utf8().ok()?;
                if !kind.accepts(&value) {
                    return None;
                }
                captures.push((name.clone(), value.into_owned()));
            }
        }
        Some(Captures(captures))
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Named values extracted from a matched path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captures(Vec<(String, String)>);

impl Captures {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_tree_path() {
        let pattern =
            RoutePattern::parse("/_matrix/media/r0/download/{server:authority}/{media_id:media_id}").unwrap();
        assert_eq!(pattern.tree_path(), "/_matrix/media/r0/download/{server}/{media_id}");

        let pattern = RoutePattern::parse("/identicon/{seed:*}").unwrap();
        assert_eq!(pattern.tree_path(), "/identicon/{*seed}");
        assert_eq!(pattern.empty_tail_path().as_deref(), Some("/identicon/"));

        let pattern = RoutePattern::parse("/upload").unwrap();
        assert_eq!(pattern.empty_tail_path(), None);
    }

    #[test]
    fn test_malformed_patterns() {
        let cases = [
            "no/leading/slash",
            "/double//slash",
            "/trailing/",
            "/{server:authority",
            "/{server}",
            "/{:media_id}",
            "/{id:uuid}",
            "/{seed:*}/after",
            "/{a:media_id}/{a:media_id}",
            "/pre{a:media_id}",
        ];
        for case in cases {
            assert!(
                matches!(RoutePattern::parse(case), Err(RouteError::Malformed { .. })),
                "{case} should be rejected"
            );
        }
    }

    #[test]
    fn test_capture_classes() {
        assert!(CaptureKind::Authority.accepts("example.org:8448"));
        assert!(CaptureKind::Authority.accepts("my-host_1.example"));
        assert!(!CaptureKind::Authority.accepts("bad/host"));
        assert!(!CaptureKind::Authority.accepts(""));

        assert!(CaptureKind::MediaId.accepts("abc123XYZ"));
        assert!(!CaptureKind::MediaId.accepts("abc-123"));

        assert!(CaptureKind::Filename.accepts("cat_photo-1.png"));
        assert!(!CaptureKind::Filename.accepts("cat photo.png"));

        assert!(CaptureKind::Tail.accepts("anything at all/even slashes"));
        assert!(CaptureKind::Tail.accepts(""));
    }
}
