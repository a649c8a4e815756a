//! Content exposure filters
//!
//! Path and byte heuristics that decide whether a file may ever be shown as a
//! textual diff. Both fail closed: a false positive only hides a harmless
//! file, so the rules lean towards flagging.

/// Bytes inspected by the binary heuristic
pub const BINARY_SAMPLE_LEN: usize = 1024;

/// Share of control bytes (in percent) above which content counts as binary
const CONTROL_BYTE_PERCENT: usize = 30;

const CREDENTIAL_EXTENSIONS: &[&str] = &[
    "pem", "key", "crt", "cer", "pfx", "p12", "der", "jks", "keystore", "asc",
];

const SENSITIVE_KEYWORDS: &[&str] = &[
    "secret",
    "credential",
    "token",
    "password",
    "private",
    "apikey",
];

/// Check whether a path names a file whose content must never be exposed.
///
/// Matches environment files (`.env`, `.env.*`), SSH key names (`id_*`),
/// credential extensions, and any path segment holding a keyword such as
/// `secret` or `token` as a separate word. Case-insensitive.
pub fn is_sensitive_path(path: &str) -> bool {
    let normalized = path.replace('\\', "/");
    let lowered = normalized.to_lowercase();
    let file_name = lowered.rsplit('/').next().unwrap_or(&lowered);

    if file_name == ".env" || file_name.starts_with(".env.") {
        return true;
    }

    if file_name.starts_with("id_") {
        return true;
    }

    if let Some((_, extension)) = file_name.rsplit_once('.') {
        if CREDENTIAL_EXTENSIONS.contains(&extension) {
            return true;
        }
    }

    normalized
        .split('/')
        .any(|segment| segment_has_keyword(segment))
}

/// Lowercased words of a path segment, split on non-alphanumerics and on
/// camelCase humps (`dbPassword` is `db`, `password`; `APIKey` is `api`, `key`)
fn segment_words(segment: &str) -> Vec<String> {
    let chars: Vec<char> = segment.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_ascii_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if c.is_ascii_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            if prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_is_lower)
            {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c.to_ascii_lowercase());
    }

    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn segment_has_keyword(segment: &str) -> bool {
    let words = segment_words(segment);

    let is_keyword = |word: &str| {
        SENSITIVE_KEYWORDS
            .iter()
            .any(|keyword| word == *keyword || word.strip_suffix('s') == Some(*keyword))
    };

    // "api_key" and "apiKey" spell the same keyword across a word boundary
    words.iter().any(|word| is_keyword(word))
        || words
            .windows(2)
            .any(|pair| is_keyword(&format!("{}{}", pair[0], pair[1])))
}

/// Check if content appears to be binary.
///
/// Looks at the first [`BINARY_SAMPLE_LEN`] bytes: any NUL byte means binary,
/// otherwise content is binary when more than 30% of the sample are control
/// bytes other than tab, newline and carriage return (DEL included).
pub fn is_probably_binary(content: &[u8]) -> bool {
    let sample = &content[..content.len().min(BINARY_SAMPLE_LEN)];
    if sample.is_empty() {
        return false;
    }

    if sample.contains(&0) {
        return true;
    }

    let control = sample
        .iter()
        .filter(|&&byte| {
            (byte < 0x20 && !matches!(byte, b'\t' | b'\n' | b'\r')) || byte == 0x7f
        })
        .count();

    control * 100 > sample.len() * CONTROL_BYTE_PERCENT
}
