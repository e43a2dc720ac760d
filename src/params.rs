//! Parameter set canonicalization
//!
//! A caller supplies an ordered list of `key=value` strings. Two stable
//! representations are derived from it: the raw string stored in results
//! rows, and a path token used to key output directories. Caller order is
//! significant and preserved; nothing is sorted or deduplicated, so two
//! lists that differ only in order land in different directories.

use crate::constants::{DEFAULT_PARAM_TOKEN, RAW_PARAM_SEPARATOR, TOKEN_PAIR_SEPARATOR};
use crate::error::{HarnessError, Result};

/// An ordered, validated list of `key=value` pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSet {
    pairs: Vec<(String, String)>,
}

impl ParameterSet {
    /// Parse caller-supplied `key=value` strings, preserving order
    pub fn parse<S: AsRef<str>>(params: &[S]) -> Result<Self> {
        let pairs = params
            .iter()
            .map(|p| {
                let p = p.as_ref();
                if p.contains(RAW_PARAM_SEPARATOR) {
                    return Err(HarnessError::config(format!(
                        "parameter '{}' contains the reserved separator '{}'",
                        p, RAW_PARAM_SEPARATOR
                    )));
                }
                match p.split_once('=') {
                    Some((key, value)) if !key.is_empty() => {
                        Ok((key.to_string(), value.to_string()))
                    }
                    _ => Err(HarnessError::config(format!(
                        "parameter '{}' is not of the form key=value",
                        p
                    ))),
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { pairs })
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// The pairs in caller order
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// The pairs re-rendered as `key=value` strings, in caller order
    pub fn to_args(&self) -> Vec<String> {
        self.pairs.iter().map(|(k, v)| format!("{}={}", k, v)).collect()
    }

    /// Pairs joined by `;`, or `None` when the set is empty
    ///
    /// `None` is stored as NULL so that "no parameters" stays distinct from
    /// an empty-string parameter. `parse` refuses `;` inside a pair, so the
    /// raw string always splits back into the original pairs.
    pub fn raw(&self) -> Option<String> {
        if self.pairs.is_empty() {
            None
        } else {
            Some(self.to_args().join(RAW_PARAM_SEPARATOR))
        }
    }

    /// Directory-safe token: `default`, or pairs as `key-value` joined by `_`
    ///
    /// Every `=` in a value becomes `-` as well.
    pub fn token(&self) -> Result<String> {
        let token = if self.pairs.is_empty() {
            DEFAULT_PARAM_TOKEN.to_string()
        } else {
            self.pairs
                .iter()
                .map(|(k, v)| format!("{}-{}", k, v.replace('=', "-")))
                .collect::<Vec<_>>()
                .join(TOKEN_PAIR_SEPARATOR)
        };
        validate_path_segment(&token, "parameter token")?;
        Ok(token)
    }

    /// Last value given for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Typed lookup with a default when absent
    pub fn get_f64(&self, key: &str, default: f64) -> Result<f64> {
        self.get_parsed(key, default)
    }

    pub fn get_usize(&self, key: &str, default: usize) -> Result<usize> {
        self.get_parsed(key, default)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key) {
            None => Ok(default),
            Some(v) => match v.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" => Ok(false),
                _ => Err(HarnessError::config(format!(
                    "parameter {}={} is not a boolean",
                    key, v
                ))),
            },
        }
    }

    fn get_parsed<T: std::str::FromStr>(&self, key: &str, default: T) -> Result<T> {
        match self.get(key) {
            None => Ok(default),
            Some(v) => v.parse().map_err(|_| {
                HarnessError::config(format!("parameter {}={} has an invalid value", key, v))
            }),
        }
    }
}

/// `canonicalize(params) -> (raw, token)`; the empty list maps to `("", "default")`
pub fn canonicalize<S: AsRef<str>>(params: &[S]) -> Result<(String, String)> {
    let set = ParameterSet::parse(params)?;
    Ok((set.raw().unwrap_or_default(), set.token()?))
}

/// Reject anything that would not stay a single directory name
pub fn validate_path_segment(segment: &str, what: &str) -> Result<()> {
    let bad = segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment
            .chars()
            .any(|c| c == '/' || c == '\\' || c == '\0' || c.is_control());
    if bad {
        return Err(HarnessError::config(format!(
            "{} '{}' is not a safe path segment",
            what,
            segment.escape_debug()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_set() {
        assert_eq!(
            canonicalize::<&str>(&[]).unwrap(),
            (String::new(), "default".to_string())
        );
        assert_eq!(ParameterSet::default().raw(), None);
    }

    #[test]
    fn test_raw_and_token() {
        let (raw, token) = canonicalize(&["alpha=2.0", "beta=0.5"]).unwrap();
        assert_eq!(raw, "alpha=2.0;beta=0.5");
        assert_eq!(token, "alpha-2.0_beta-0.5");
    }

    #[test]
    fn test_order_is_preserved() {
        let a = canonicalize(&["alpha=1", "beta=2"]).unwrap();
        let b = canonicalize(&["beta=2", "alpha=1"]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_value_may_contain_equals() {
        let set = ParameterSet::parse(&["expr=a=b"]).unwrap();
        assert_eq!(set.get("expr"), Some("a=b"));
        assert_eq!(set.raw().as_deref(), Some("expr=a=b"));
        assert_eq!(set.token().unwrap(), "expr-a-b");

        let (_, token) = canonicalize(&["f=x==y=", "g=1"]).unwrap();
        assert_eq!(token, "f-x--y-_g-1");
    }

    #[test]
    fn test_rejects_malformed_pairs() {
        assert!(ParameterSet::parse(&["novalue"]).is_err());
        assert!(ParameterSet::parse(&["=1"]).is_err());
    }

    #[test]
    fn test_rejects_unsafe_tokens() {
        for bad in ["path=a/b", "path=..\\x", "nul=a\0b", "nl=a\nb"] {
            let err = canonicalize(&[bad]).unwrap_err();
            assert!(matches!(err, HarnessError::Configuration(_)), "{}", bad);
        }
        assert!(validate_path_segment("..", "name").is_err());
        assert!(validate_path_segment(".", "name").is_err());
        assert!(validate_path_segment("", "name").is_err());
        assert!(validate_path_segment("rcm", "name").is_ok());
    }

    #[test]
    fn test_raw_separator_is_reserved() {
        for bad in ["a=1;b=2", "k;x=1", "list=1;"] {
            let err = ParameterSet::parse(&[bad]).unwrap_err();
            assert!(matches!(err, HarnessError::Configuration(_)), "{}", bad);
        }

        let set = ParameterSet::parse(&["symmetric=true", "k=3"]).unwrap();
        let raw = set.raw().unwrap();
        let pieces: Vec<&str> = raw.split(RAW_PARAM_SEPARATOR).collect();
        assert_eq!(ParameterSet::parse(&pieces).unwrap(), set);
    }

    #[test]
    fn test_typed_accessors() {
        let set = ParameterSet::parse(&["n=4", "n=8", "x=0.25", "force_cpu=true", "bad=x"]).unwrap();
        assert_eq!(set.get_usize("n", 1).unwrap(), 8);
        assert_eq!(set.get_f64("x", 0.0).unwrap(), 0.25);
        assert!(set.get_bool("force_cpu", false).unwrap());
        assert_eq!(set.get_usize("missing", 3).unwrap(), 3);
        assert!(set.get_usize("bad", 1).is_err());
        assert!(set.get_bool("bad", false).is_err());
    }
}
