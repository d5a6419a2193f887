//! Percent-encoding for URL path segments and query values (RFC 3986
//! unreserved characters pass through).

fn encode(input: &str, keep: &[u8]) -> String {
    let mut out = String::with_capacity(input.len());
    for &b in input.as_bytes() {
        if b.is_ascii_alphanumeric() || b"-._~".contains(&b) || keep.contains(&b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

/// Encode a query value or a single path segment.
pub fn encode_component(input: &str) -> String {
    encode(input, &[])
}

/// Encode a repository path, keeping `/` separators.
pub fn encode_path(input: &str) -> String {
    encode(input.trim_matches('/'), b"/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_escapes_reserved() {
        assert_eq!(encode_component("a b&c=d/e"), "a%20b%26c%3Dd%2Fe");
        assert_eq!(encode_component("{\"k\": 1}\n"), "%7B%22k%22%3A%201%7D%0A");
    }

    #[test]
    fn path_keeps_separators() {
        assert_eq!(encode_path("/avatars/my cat.png"), "avatars/my%20cat.png");
    }

    #[test]
    fn utf8_is_byte_encoded() {
        assert_eq!(encode_component("é"), "%C3%A9");
    }
}
