use crate::operators::error::DiscoveryError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static BANNER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Climate Data Operators version (\d+(?:\.\d+)*\S*)").expect("valid version regex")
});

static ANY_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d+\.\d+\S*)").expect("valid version regex"));

/// Tool version, compared numerically. Suffixes such as `rc1` are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CdoVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl CdoVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Finds the version in `-V` output. Returns the parsed value and the raw string.
    pub(crate) fn from_banner(text: &str) -> Option<(CdoVersion, String)> {
        let raw = BANNER
            .captures(text)
            .or_else(|| ANY_VERSION.captures(text.lines().next().unwrap_or_default()))?
            .get(1)?
            .as_str()
            .to_string();
        raw.parse().ok().map(|v| (v, raw))
    }
}

impl FromStr for CdoVersion {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = [0u32; 3];
        let mut seen = 0;
        for (i, piece) in s.trim().split('.').take(3).enumerate() {
            let digits: String = piece.chars().take_while(char::is_ascii_digit).collect();
            if digits.is_empty() {
                break;
            }
            parts[i] = digits
                .parse()
                .map_err(|_| DiscoveryError::VersionParse(s.to_string()))?;
            seen += 1;
            if digits.len() != piece.len() {
                break;
            }
        }
        if seen == 0 {
            return Err(DiscoveryError::VersionParse(s.to_string()));
        }
        Ok(CdoVersion::new(parts[0], parts[1], parts[2]))
    }
}

impl fmt::Display for CdoVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_order() {
        let v: CdoVersion = "1.9.10".parse().unwrap();
        assert_eq!(v, CdoVersion::new(1, 9, 10));
        assert!(v > CdoVersion::new(1, 9, 3));
        assert!("2.0.0rc3".parse::<CdoVersion>().unwrap() >= CdoVersion::new(2, 0, 0));
        assert_eq!("1.8".parse::<CdoVersion>().unwrap(), CdoVersion::new(1, 8, 0));
        assert!("beta".parse::<CdoVersion>().is_err());
    }

    #[test]
    fn test_version_from_banner() {
        let banner = "Climate Data Operators version 2.4.0 (https://mpimet.mpg.de/cdo)\nSystem: x86_64";
        let (version, raw) = CdoVersion::from_banner(banner).unwrap();
        assert_eq!(version, CdoVersion::new(2, 4, 0));
        assert_eq!(raw, "2.4.0");
    }
}
