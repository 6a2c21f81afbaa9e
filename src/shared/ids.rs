use getrandom::getrandom;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

const BASE36_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const MESSAGE_SUFFIX_SPACE: u32 = 36 * 36 * 36 * 36;

fn validate_segment(kind: &str, value: &str, extra: &[char]) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{kind} must be non-empty"));
    }
    if value
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || extra.contains(&ch))
    {
        return Ok(());
    }
    let allowed: String = extra.iter().collect();
    Err(format!(
        "{kind} must use only ASCII letters, digits or `{allowed}`"
    ))
}

/// A validated `host/owner/name` repository reference.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RepositoryRef(String);

impl RepositoryRef {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("repository reference must be non-empty".to_string());
        }
        let parts: Vec<&str> = trimmed.split('/').collect();
        if parts.len() != 3 {
            return Err(format!(
                "repository reference `{trimmed}` must have the form host/owner/name"
            ));
        }
        validate_segment("repository host", parts[0], &['-', '.'])?;
        validate_segment("repository owner", parts[1], &['-', '.', '_'])?;
        validate_segment("repository name", parts[2], &['-', '.', '_'])?;
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn host(&self) -> &str {
        self.0.split('/').next().unwrap_or_default()
    }

    pub fn owner(&self) -> &str {
        self.0.split('/').nth(1).unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.0.split('/').nth(2).unwrap_or_default()
    }
}

impl std::fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::borrow::Borrow<str> for RepositoryRef {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl TryFrom<String> for RepositoryRef {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl<'de> Deserialize<'de> for RepositoryRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw)
            .map_err(|err| D::Error::custom(format!("invalid repository reference `{raw}`: {err}")))
    }
}

fn base36_encode_u64(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36_ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

fn base36_encode_fixed_u32(mut value: u32, width: usize) -> String {
    let mut digits = vec![b'0'; width];
    for slot in digits.iter_mut().rev() {
        *slot = BASE36_ALPHABET[(value % 36) as usize];
        value /= 36;
    }
    String::from_utf8(digits).unwrap_or_default()
}

/// Compact unique message id: `msg-<base36 millis>-<base36 suffix>`.
///
/// The millisecond prefix keeps ids monotonic enough for timeline ordering;
/// the random suffix separates entries created in the same millisecond.
pub fn new_message_id(now_millis: i64) -> String {
    let mut bytes = [0u8; 4];
    let sample = match getrandom(&mut bytes) {
        Ok(()) => u32::from_le_bytes(bytes) % MESSAGE_SUFFIX_SPACE,
        Err(_) => 0,
    };
    let ts = base36_encode_u64(now_millis.max(0) as u64);
    let suffix = base36_encode_fixed_u32(sample, 4);
    format!("msg-{ts}-{suffix}")
}
