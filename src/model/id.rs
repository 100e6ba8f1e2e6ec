//! 短链接序号编解码
//!
//! 链接在存储中以 u64 序号标识，对外使用 base36（`0-9a-z`）文本形式。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, UrlshrtError};

const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// 链接序号
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(u64);

impl LinkId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// 编码为 base36 文本
    pub fn encode(self) -> String {
        let mut value = self.0;
        if value == 0 {
            return "0".to_string();
        }

        // u64::MAX 在 base36 下为 13 位
        let mut buf = [0u8; 13];
        let mut pos = buf.len();
        while value > 0 {
            pos -= 1;
            buf[pos] = ALPHABET[(value % 36) as usize];
            value /= 36;
        }

        buf[pos..].iter().map(|&b| b as char).collect()
    }

    /// 从 base36 文本解码（大小写不敏感）
    pub fn decode(text: &str) -> Result<Self> {
        if text.is_empty() || !text.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(UrlshrtError::malformed_identifier(format!(
                "unable to parse {:?}: it must be alphanumeric",
                text
            )));
        }

        u64::from_str_radix(text, 36).map(Self).map_err(|_| {
            UrlshrtError::malformed_identifier(format!(
                "unable to parse {:?}: identifier is out of range",
                text
            ))
        })
    }

    /// 拼接完整短链接：`prefix/encoded`
    pub fn short_url(self, prefix: &str) -> String {
        format!("{}/{}", prefix.trim_end_matches('/'), self.encode())
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for LinkId {
    type Err = UrlshrtError;

    fn from_str(s: &str) -> Result<Self> {
        Self::decode(s)
    }
}

/// 用户 ID（单调递增计数器的值）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(u64);

impl UserId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_small_values() {
        assert_eq!(LinkId::new(0).encode(), "0");
        assert_eq!(LinkId::new(9).encode(), "9");
        assert_eq!(LinkId::new(10).encode(), "a");
        assert_eq!(LinkId::new(35).encode(), "z");
        assert_eq!(LinkId::new(36).encode(), "10");
    }

    #[test]
    fn test_encode_max() {
        assert_eq!(LinkId::new(u64::MAX).encode(), "3w5e11264sgsf");
        assert_eq!(LinkId::decode("3w5e11264sgsf").unwrap().get(), u64::MAX);
    }

    #[test]
    fn test_decode_is_case_insensitive() {
        assert_eq!(LinkId::decode("Z").unwrap(), LinkId::new(35));
        assert_eq!(LinkId::decode("1A").unwrap(), LinkId::new(46));
    }

    #[test]
    fn test_decode_rejects_malformed() {
        for bad in ["", "-1", "+1", "a b", "é", "1/2"] {
            let err = LinkId::decode(bad).unwrap_err();
            assert!(
                matches!(err, UrlshrtError::MalformedIdentifier(_)),
                "expected MalformedIdentifier for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_decode_rejects_overflow() {
        let err = LinkId::decode("3w5e11264sgsg").unwrap_err();
        assert!(matches!(err, UrlshrtError::MalformedIdentifier(_)));
    }

    #[test]
    fn test_display_and_from_str() {
        let id: LinkId = "zz".parse().unwrap();
        assert_eq!(id.get(), 35 * 36 + 35);
        assert_eq!(id.to_string(), "zz");
    }

    #[test]
    fn test_short_url() {
        assert_eq!(
            LinkId::new(0).short_url("http://localhost:8080"),
            "http://localhost:8080/0"
        );
        assert_eq!(
            LinkId::new(37).short_url("http://localhost:8080/"),
            "http://localhost:8080/11"
        );
    }
}
