//! URL canonicalization used for deduplication.
//!
//! Parsing with `url` already lower-cases the scheme and host, drops default ports and
//! resolves dot segments. On top of that we remove the fragment, collapse repeated path
//! slashes, upper-case percent escapes, decode escapes of unreserved characters and
//! drop an empty query. An empty path is always `/`.

use url::Url;

/// Canonical form of an already parsed URL
pub fn normalize(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);

    // mailto:, data: and friends have no hierarchical path to clean up
    if url.cannot_be_a_base() {
        return url;
    }

    let path = collapse_slashes(&canonical_escapes(url.path()));
    if path.is_empty() {
        url.set_path("/");
    } else {
        url.set_path(&path);
    }

    match url.query().map(canonical_escapes) {
        Some(query) if query.is_empty() => url.set_query(None),
        Some(query) => url.set_query(Some(&query)),
        None => {}
    }

    url
}

fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut previous_slash = false;
    for c in path.chars() {
        if c == '/' {
            if previous_slash {
                continue;
            }
            previous_slash = true;
        } else {
            previous_slash = false;
        }
        out.push(c);
    }
    out
}

/// Upper-cases `%xx` escapes and decodes the ones that stand for unreserved characters.
/// Input is a serialized URL component, so it is always ASCII.
fn canonical_escapes(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                let decoded = (hi << 4) | lo;
                if is_unreserved(decoded) {
                    out.push(char::from(decoded));
                } else {
                    out.push('%');
                    out.push(char::from(bytes[i + 1].to_ascii_uppercase()));
                    out.push(char::from(bytes[i + 2].to_ascii_uppercase()));
                }
                i += 3;
                continue;
            }
        }
        out.push(char::from(bytes[i]));
        i += 1;
    }
    out
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~')
}
