//! fixed capacity string fields used by the on-disk records

/// copy `s` into a NUL padded buffer of `N` bytes,
/// truncating on a character boundary when it does not fit
pub fn encode<const N: usize>(s: &str) -> [u8; N] {
    let mut buf = [0u8; N];
    let mut end = s.len().min(N);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    buf[..end].copy_from_slice(&s.as_bytes()[..end]);
    buf
}

/// recover the string stored in a padded buffer
pub fn decode(buf: &[u8]) -> String {
    let end = buf.iter().position(|b| *b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end])
        .trim_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_string()
}

/// number of bytes [encode] keeps from `s`
pub fn encoded_len<const N: usize>(s: &str) -> usize {
    let mut end = s.len().min(N);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    end
}
