//! Compressed uuid decoding
//!
//! Manifests store asset uuids in a compact base64-like form. A 22 character
//! id keeps the first 2 hex digits literally, a 23 character id keeps the
//! first 5; every following character pair packs three hex nibbles.
//!
//! ```text
//! "fcmR3XADNLgJ1ByKhqcC5Z" -> "fc991dd7-0033-4b80-9d41-c8a86a702e59"
//! ```

/// Symbol alphabet, index = 6-bit value
pub const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// ASCII -> 6-bit lookup. Characters outside the alphabet map to 0.
const LOOKUP: [u8; 128] = build_lookup();

const fn build_lookup() -> [u8; 128] {
    let mut table = [0u8; 128];
    let mut i = 0;
    while i < ALPHABET.len() {
        table[ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    table
}

const HEX: &[u8; 16] = b"0123456789abcdef";

/// Hex digits in a canonical uuid, before hyphenation
const HEX_LEN: usize = 32;

fn value_of(c: char) -> u8 {
    let code = c as u32;
    if code < 128 {
        LOOKUP[code as usize]
    } else {
        0
    }
}

/// Decode a compressed uuid into its hyphenated 8-4-4-4-12 form.
///
/// Ids that are neither 22 nor 23 characters long are returned unchanged, so
/// decoding an already canonical uuid is a no-op. Malformed characters are
/// not rejected; they decode as zero.
pub fn decompress(id: &str) -> String {
    let chars: Vec<char> = id.chars().collect();
    let prefix_len = match chars.len() {
        23 => 5,
        22 => 2,
        _ => return id.to_string(),
    };

    let mut hex: String = chars[..prefix_len].iter().collect();
    for pair in chars[prefix_len..].chunks(2) {
        let r = value_of(pair[0]);
        let t = pair.get(1).copied().map_or(0, value_of);
        for nibble in [r >> 2, ((r & 3) << 2) | (t >> 4), t & 15] {
            hex.push(HEX[nibble as usize] as char);
        }
    }

    while hex.chars().count() < HEX_LEN {
        hex.push('0');
    }

    hyphenate(&hex)
}

fn hyphenate(hex: &str) -> String {
    let chars: Vec<char> = hex.chars().collect();
    let groups = [(0, 8), (8, 12), (12, 16), (16, 20), (20, HEX_LEN)];
    groups
        .iter()
        .map(|&(start, end)| chars[start..end].iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("-")
}

/// Split a canonical uuid into its store shard (first 2 characters) and itself
pub fn shard(canonical: &str) -> &str {
    match canonical.char_indices().nth(2) {
        Some((end, _)) => &canonical[..end],
        None => canonical,
    }
}

/// True if `id` has the length of a compressed uuid
pub fn is_compressed(id: &str) -> bool {
    matches!(id.chars().count(), 22 | 23)
}
