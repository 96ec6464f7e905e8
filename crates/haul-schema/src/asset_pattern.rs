//! Glob matching for release asset names.
//!
//! `*` matches within one path segment, `**` matches across `/`, `?` matches a
//! single non-separator character. Everything else is literal and matching
//! ignores case, so `MyPlugin-*.jar` picks up `myplugin-1.2.0.JAR`.

use std::fmt;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A compiled, case-insensitive glob.
#[derive(Debug, Clone)]
pub struct AssetPattern {
    glob: String,
    regex: Regex,
}

impl AssetPattern {
    /// Compile a glob.
    ///
    /// # Errors
    ///
    /// Only fails if the translated expression exceeds the regex size limit.
    pub fn new(glob: &str) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(&glob_to_regex(glob))
            .case_insensitive(true)
            .build()?;
        Ok(Self {
            glob: glob.to_string(),
            regex,
        })
    }

    /// The glob as written.
    pub fn as_str(&self) -> &str {
        &self.glob
    }

    /// Whether `name` matches the whole glob.
    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() * 2 + 2);
    out.push('^');
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                out.push_str(".*");
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            other => {
                let mut buf = [0u8; 4];
                out.push_str(&regex::escape(other.encode_utf8(&mut buf)));
            }
        }
    }
    out.push('$');
    out
}

impl PartialEq for AssetPattern {
    fn eq(&self, other: &Self) -> bool {
        self.glob == other.glob
    }
}

impl Eq for AssetPattern {}

impl fmt::Display for AssetPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.glob)
    }
}

impl Serialize for AssetPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.glob)
    }
}

impl<'de> Deserialize<'de> for AssetPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::new(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(glob: &str, name: &str) -> bool {
        AssetPattern::new(glob).unwrap().matches(name)
    }

    #[test]
    fn test_star_stays_in_segment() {
        assert!(matches("MyPlugin-*.jar", "MyPlugin-1.2.0.jar"));
        assert!(matches("MyPlugin-*.jar", "myplugin-1.2.0.JAR"));
        assert!(!matches("MyPlugin-*.jar", "MyPlugin-1.2.0-sources.zip"));
        assert!(!matches("*.jar", "build/libs/plugin.jar"));
    }

    #[test]
    fn test_double_star_crosses_segments() {
        assert!(matches("**.jar", "build/libs/plugin.jar"));
        assert!(matches("build/**/plugin.jar", "build/libs/x/plugin.jar"));
    }

    #[test]
    fn test_question_mark() {
        assert!(matches("plugin-?.jar", "plugin-1.jar"));
        assert!(!matches("plugin-?.jar", "plugin-12.jar"));
        assert!(!matches("a?b", "a/b"));
    }

    #[test]
    fn test_metacharacters_are_literal() {
        assert!(matches("plugin(1).jar", "plugin(1).jar"));
        assert!(!matches("plugin.jar", "pluginxjar"));
        assert!(matches("a+b[c].jar", "A+B[C].jar"));
    }
}
