use std::fmt;

/// A DNS owner name as an ordered sequence of labels, root-last.
///
/// `example.com.` is stored as `["example", "com"]`; the root name is the
/// empty label list. Comparisons and hashing are case-insensitive, matching
/// DNS's canonical name equivalence.
#[derive(Clone, Debug, Default, Eq, serde::Serialize, serde::Deserialize)]
pub struct Name {
    labels: Vec<String>,
}

impl Name {
    pub fn root() -> Self {
        Self { labels: Vec::new() }
    }

    pub fn from_labels(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// Parse a presentation-format name such as `"www.example.com."`.
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim_end_matches('.');
        if trimmed.is_empty() {
            return Self::root();
        }
        Self {
            labels: trimmed.split('.').map(|l| l.to_string()).collect(),
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    pub fn is_root(&self) -> bool {
        self.labels.is_empty()
    }

    /// Does any label contain a literal zero byte? Such names are rejected
    /// by the key codec, since `0x00` doubles as the lookup-format label
    /// separator.
    pub fn has_zero_byte_label(&self) -> bool {
        self.labels.iter().any(|l| l.as_bytes().contains(&0u8))
    }

    /// `self` with the leading `n` labels stripped (the ancestor reached by
    /// walking up `n` labels towards the root).
    pub fn strip_leading(&self, n: usize) -> Name {
        let n = n.min(self.labels.len());
        Name {
            labels: self.labels[n..].to_vec(),
        }
    }

    /// Owner name of the wildcard source of synthesis for this encloser:
    /// `*.encloser`.
    pub fn wildcard(&self) -> Name {
        let mut labels = Vec::with_capacity(self.labels.len() + 1);
        labels.push("*".to_string());
        labels.extend(self.labels.iter().cloned());
        Name { labels }
    }

    /// Ancestor-shortening iterator: full name, then each suffix up to (and
    /// including) the root, one label at a time. Used by the closest-NS walk.
    pub fn ancestors(&self) -> impl Iterator<Item = Name> + '_ {
        (0..=self.labels.len()).map(move |n| self.strip_leading(n))
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.labels.len() == other.labels.len()
            && self
                .labels
                .iter()
                .zip(other.labels.iter())
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }
}

impl std::hash::Hash for Name {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.labels.len().hash(state);
        for label in &self.labels {
            label.to_ascii_lowercase().hash(state);
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.labels.is_empty() {
            return write!(f, ".");
        }
        for label in &self.labels {
            write!(f, "{label}.")?;
        }
        Ok(())
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Name::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_through_display() {
        let n = Name::parse("www.example.com.");
        assert_eq!(n.to_string(), "www.example.com.");
        assert_eq!(n.label_count(), 3);
    }

    #[test]
    fn root_is_empty() {
        assert!(Name::parse(".").is_root());
        assert!(Name::root().is_root());
    }

    #[test]
    fn case_insensitive_equality() {
        assert_eq!(Name::parse("Example.COM."), Name::parse("example.com."));
    }

    #[test]
    fn strip_leading_walks_towards_root() {
        let n = Name::parse("a.b.example.com.");
        assert_eq!(n.strip_leading(2).to_string(), "example.com.");
        assert_eq!(n.strip_leading(4).to_string(), ".");
        assert_eq!(n.strip_leading(10).to_string(), ".");
    }

    #[test]
    fn ancestors_walks_from_full_to_root() {
        let n = Name::parse("b.example.com.");
        let chain: Vec<String> = n.ancestors().map(|a| a.to_string()).collect();
        assert_eq!(chain, vec!["b.example.com.", "example.com.", "com.", "."]);
    }

    #[test]
    fn wildcard_prefixes_star() {
        let n = Name::parse("example.com.");
        assert_eq!(n.wildcard().to_string(), "*.example.com.");
    }

    #[test]
    fn detects_zero_byte_labels() {
        let n = Name::from_labels(vec!["a\0b".to_string()]);
        assert!(n.has_zero_byte_label());
        assert!(!Name::parse("example.com.").has_zero_byte_label());
    }
}
