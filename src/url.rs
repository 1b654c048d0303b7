// Copyright (c) 2025 - Cowboy AI, LLC.

//! URL parsing and CAN-path normalization
//!
//! Gateway URLs follow `scheme://host/path?query`, where the scheme is one of
//! the four CAN schemes and the host is always the root token (a CID, a key
//! alias, a DNS-style name, or the reserved `local` literal). Path segments
//! are percent-decoded at parse time and re-encoded per segment when a
//! canonical CAN-path is composed, so `content://<cid>/example.txt` never
//! treats `example.txt` as a filename-in-host.

use std::fmt::{self, Display, Formatter};

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

use crate::errors::{GatewayError, GatewayResult};

/// Reserved host literal routed to administrative handlers
pub const RESERVED_HOST: &str = "local";

/// Characters escaped when re-encoding one path segment
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'?')
    .add(b'<')
    .add(b'>')
    .add(b'`');

/// Percent-encode one path segment for canonical composition
pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}

/// The four protocol schemes the gateway recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// Immutable content roots (`content://`)
    Content,
    /// Mutable naming layer (`name://`)
    Name,
    /// Linked-data graph (`linked://`)
    Linked,
    /// Publish/subscribe bus (`bus://`)
    Bus,
}

impl Scheme {
    /// Parse the scheme token preceding `://`
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "content" => Some(Scheme::Content),
            "name" => Some(Scheme::Name),
            "linked" => Some(Scheme::Linked),
            "bus" => Some(Scheme::Bus),
            _ => None,
        }
    }

    /// The scheme token as written in URLs
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Content => "content",
            Scheme::Name => "name",
            Scheme::Linked => "linked",
            Scheme::Bus => "bus",
        }
    }

    /// Root tag used when composing canonical CAN-paths for this scheme
    pub fn path_tag(&self) -> &'static str {
        match self {
            Scheme::Name => "name",
            _ => "content",
        }
    }
}

impl Display for Scheme {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed gateway URL: scheme, root token, decoded segments, and query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanUrl {
    scheme: Scheme,
    host: String,
    segments: Vec<String>,
    trailing_slash: bool,
    query: Vec<(String, Option<String>)>,
    raw: String,
}

impl CanUrl {
    /// Parse a URL string into its gateway decomposition
    pub fn parse(input: &str) -> GatewayResult<Self> {
        let (token, rest) = input
            .split_once("://")
            .ok_or_else(|| GatewayError::InvalidInput(format!("missing scheme in URL: {input}")))?;
        let scheme = Scheme::from_token(token)
            .ok_or_else(|| GatewayError::InvalidInput(format!("unrecognized scheme: {token}")))?;

        // Fragment is never forwarded to the network
        let rest = rest.split('#').next().unwrap_or(rest);
        let (path_part, query_part) = match rest.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (rest, None),
        };

        let (host, path) = match path_part.split_once('/') {
            Some((h, p)) => (h, p),
            None => (path_part, ""),
        };
        if host.is_empty() {
            return Err(GatewayError::InvalidInput(format!(
                "missing host token in URL: {input}"
            )));
        }

        let trailing_slash = path.ends_with('/');
        let segments = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(decode_segment)
            .collect::<GatewayResult<Vec<_>>>()?;

        let query = match query_part {
            Some(q) => parse_query(q),
            None => Vec::new(),
        };

        Ok(Self {
            scheme,
            host: host.to_string(),
            segments,
            trailing_slash,
            query,
            raw: input.to_string(),
        })
    }

    /// Scheme of this URL
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Root token: a CID, key alias, DNS name, topic, or `local`
    pub fn host(&self) -> &str {
        &self.host
    }

    /// True when the host is the reserved administrative literal
    pub fn is_local(&self) -> bool {
        self.host == RESERVED_HOST
    }

    /// Percent-decoded path segments, in order
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// True when the path ended in `/`
    pub fn trailing_slash(&self) -> bool {
        self.trailing_slash
    }

    /// The URL as received
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// First value for a query key; empty string for valueless keys
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_deref().unwrap_or(""))
    }

    /// True when the query key is present, with or without a value
    pub fn has_query(&self, key: &str) -> bool {
        self.query.iter().any(|(k, _)| k == key)
    }

    /// Decoded segments joined with `/`, without a leading slash
    pub fn rel_path(&self) -> String {
        self.segments.join("/")
    }

    /// Segments re-encoded and joined with `/`, without a leading slash
    pub fn encoded_path(&self) -> String {
        self.segments
            .iter()
            .map(|s| encode_segment(s))
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Canonical CAN-path for this URL, e.g. `/content/<cid>/<seg>/…`
    pub fn can_path(&self) -> String {
        let mut path = format!("/{}/{}", self.scheme.path_tag(), self.host);
        for segment in &self.segments {
            path.push('/');
            path.push_str(&encode_segment(segment));
        }
        path
    }
}

impl Display for CanUrl {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.host)?;
        for segment in &self.segments {
            write!(f, "/{}", encode_segment(segment))?;
        }
        if self.trailing_slash && !self.segments.is_empty() {
            f.write_str("/")?;
        }
        Ok(())
    }
}

fn decode_segment(segment: &str) -> GatewayResult<String> {
    percent_decode_str(segment)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| GatewayError::InvalidInput(format!("invalid percent-encoding: {e}")))
}

fn parse_query(query: &str) -> Vec<(String, Option<String>)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (
                decode_lossy(k),
                Some(decode_lossy(v)),
            ),
            None => (decode_lossy(pair), None),
        })
        .collect()
}

fn decode_lossy(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn host_is_always_the_root_token() {
        let url = CanUrl::parse("content://bafyaabakaieac/example.txt").unwrap();
        assert_eq!(url.host(), "bafyaabakaieac");
        assert_eq!(url.segments(), ["example.txt"]);

        // A single filename in host position stays the root token
        let url = CanUrl::parse("content://example.txt").unwrap();
        assert_eq!(url.host(), "example.txt");
        assert!(url.segments().is_empty());
    }

    #[test]
    fn segments_are_percent_decoded_then_reencoded() {
        let url = CanUrl::parse("content://bafyroot/sub%20dir/file%231.txt").unwrap();
        assert_eq!(url.segments(), ["sub dir", "file#1.txt"]);
        assert_eq!(url.encoded_path(), "sub%20dir/file%231.txt");
        assert_eq!(
            url.can_path(),
            "/content/bafyroot/sub%20dir/file%231.txt"
        );
    }

    #[test]
    fn name_scheme_composes_name_paths() {
        let url = CanUrl::parse("name://k51qzi5uqu5dgutdk6i1/posts/a").unwrap();
        assert_eq!(url.can_path(), "/name/k51qzi5uqu5dgutdk6i1/posts/a");
    }

    #[test]
    fn valueless_query_keys_are_present() {
        let url = CanUrl::parse("content://bafyroot/?noResolve").unwrap();
        assert!(url.has_query("noResolve"));
        assert_eq!(url.query("noResolve"), Some(""));
        assert!(!url.has_query("format"));
    }

    #[test]
    fn query_values_and_fragment() {
        let url = CanUrl::parse("name://local/?key=alpha&format=json#frag").unwrap();
        assert!(url.is_local());
        assert_eq!(url.query("key"), Some("alpha"));
        assert_eq!(url.query("format"), Some("json"));
    }

    #[test]
    fn trailing_slash_is_remembered() {
        assert!(CanUrl::parse("content://bafyroot/dir/").unwrap().trailing_slash());
        assert!(!CanUrl::parse("content://bafyroot/dir").unwrap().trailing_slash());
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        let err = CanUrl::parse("ftp://host/").unwrap_err();
        assert!(matches!(err, GatewayError::InvalidInput(_)));
    }

}
