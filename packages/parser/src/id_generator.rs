use crc32fast::Hasher;

pub const DEFAULT_PREFIX: &str = "ncd";
pub const DEFAULT_WIDTH: usize = 4;

/// Derive a short namespace from an arbitrary key (site id, run id, path) using CRC32
pub fn namespace_for(key: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(key.as_bytes());
    format!("{:08x}", hasher.finalize())
}

/// Sequential identifier generator for one generation run.
///
/// A single generator is shared by every page of a site so identifiers are
/// unique across the whole page set, not just within one file. Ids look like
/// `ncd-0007`, or `ncd-1a2b3c4d-0007` when namespaced.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    prefix: String,
    namespace: Option<String>,
    width: usize,
    count: u32,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::with_prefix(DEFAULT_PREFIX, DEFAULT_WIDTH)
    }

    pub fn with_prefix(prefix: impl Into<String>, width: usize) -> Self {
        Self {
            prefix: prefix.into(),
            namespace: None,
            width,
            count: 0,
        }
    }

    /// Namespace ids with a CRC32 of `key` so independently seeded runs cannot collide
    pub fn namespaced(mut self, key: &str) -> Self {
        self.namespace = Some(namespace_for(key));
        self
    }

    /// Generate next sequential ID
    pub fn new_id(&mut self) -> String {
        self.count += 1;
        self.format(self.count)
    }

    /// Advance past an id that already exists, if it belongs to this scheme.
    /// Returns whether the id was recognised.
    pub fn observe(&mut self, id: &str) -> bool {
        match self.sequence_of(id) {
            Some(seq) => {
                self.count = self.count.max(seq);
                true
            }
            None => false,
        }
    }

    /// Sequence number of an id minted by this scheme
    pub fn sequence_of(&self, id: &str) -> Option<u32> {
        let rest = id.strip_prefix(self.prefix.as_str())?.strip_prefix('-')?;
        let digits = match &self.namespace {
            Some(ns) => rest.strip_prefix(ns.as_str())?.strip_prefix('-')?,
            None => rest,
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    /// Number of ids issued (or observed) so far
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    fn format(&self, seq: u32) -> String {
        let width = self.width;
        match &self.namespace {
            Some(ns) => format!("{}-{}-{:0width$}", self.prefix, ns, seq),
            None => format!("{}-{:0width$}", self.prefix, seq),
        }
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_ids() {
        let mut gen = IdGenerator::new();

        assert_eq!(gen.new_id(), "ncd-0001");
        assert_eq!(gen.new_id(), "ncd-0002");
        assert_eq!(gen.new_id(), "ncd-0003");
    }

    #[test]
    fn test_width_grows_instead_of_wrapping() {
        let mut gen = IdGenerator::with_prefix("ncd", 2);
        for _ in 0..99 {
            gen.new_id();
        }
        assert_eq!(gen.new_id(), "ncd-100");
    }

    #[test]
    fn test_namespace_is_stable() {
        assert_eq!(namespace_for("site-a"), namespace_for("site-a"));
        assert_ne!(namespace_for("site-a"), namespace_for("site-b"));

        let mut gen = IdGenerator::new().namespaced("site-a");
        let id = gen.new_id();
        assert!(id.starts_with("ncd-"));
        assert!(id.ends_with("-0001"));
        assert!(id.contains(&namespace_for("site-a")));
    }

    #[test]
    fn test_observe_resumes_sequence() {
        let mut gen = IdGenerator::new();
        assert!(gen.observe("ncd-0041"));
        assert!(gen.observe("ncd-0007"));
        assert!(!gen.observe("other-0100"));
        assert!(!gen.observe("ncd-abc"));
        assert_eq!(gen.new_id(), "ncd-0042");
    }

    #[test]
    fn test_observe_ignores_other_namespaces() {
        let mut gen = IdGenerator::new().namespaced("site-a");
        assert!(!gen.observe("ncd-0500"));
        let foreign = IdGenerator::new().namespaced("site-b").new_id();
        assert!(!gen.observe(&foreign));
        assert_eq!(gen.count(), 0);
    }
}
