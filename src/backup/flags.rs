use super::CompatibilityMode;

pub const BASE_FLAGS: &[&str] = &["--archive", "--delete", "--delete-excluded"];

pub const VERBOSE_FLAGS: &[&str] = &["--verbose", "--progress", "--human-readable"];

/// Metadata preservation that FAT32/NTFS targets reject.
const METADATA_FLAGS: &[&str] = &[
    "--archive",
    "--links",
    "--devices",
    "--specials",
    "--perms",
    "--owner",
    "--group",
];

/// What `--archive` implied that still matters without metadata, plus size-based comparison.
const FALLBACK_FLAGS: &[&str] = &["--size-only", "--modify-window=1", "--recursive"];

/// An ordered, immutable rsync flag list. Adjustments return a new set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagSet {
    flags: Vec<String>,
}

impl FlagSet {
    pub fn base() -> Self {
        Self::from_flags(BASE_FLAGS.iter().copied())
    }

    pub fn from_flags<I, S>(flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            flags: flags.into_iter().map(Into::into).collect(),
        }
    }

    /// Same set with metadata flags dropped and the fallback flags appended once.
    pub fn with_fallback(&self) -> Self {
        let mut flags: Vec<String> = self
            .flags
            .iter()
            .filter(|f| !METADATA_FLAGS.contains(&f.as_str()))
            .cloned()
            .collect();
        for extra in FALLBACK_FLAGS {
            if !flags.iter().any(|f| f == extra) {
                flags.push(extra.to_string());
            }
        }
        Self { flags }
    }

    pub fn for_mode(&self, mode: CompatibilityMode) -> Self {
        match mode {
            CompatibilityMode::Native => self.clone(),
            CompatibilityMode::Fallback => self.with_fallback(),
        }
    }

    pub fn contains(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.flags
    }
}

impl Default for FlagSet {
    fn default() -> Self {
        Self::base()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_mode_keeps_archive_flags() {
        let base = FlagSet::base();
        assert_eq!(base.for_mode(CompatibilityMode::Native), base);
        assert!(base.contains("--archive"));
    }

    #[test]
    fn test_fallback_replaces_archive() {
        let fallback = FlagSet::base().with_fallback();
        assert_eq!(
            fallback.as_slice(),
            &[
                "--delete",
                "--delete-excluded",
                "--size-only",
                "--modify-window=1",
                "--recursive"
            ]
        );
    }

    #[test]
    fn test_fallback_is_applied_once() {
        let once = FlagSet::base().with_fallback();
        let twice = once.with_fallback();
        assert_eq!(once, twice);
        let count = twice
            .as_slice()
            .iter()
            .filter(|f| f.as_str() == "--size-only")
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_fallback_leaves_base_untouched() {
        let base = FlagSet::base();
        let _ = base.with_fallback();
        assert_eq!(base, FlagSet::base());
    }

    #[test]
    fn test_fallback_strips_individual_metadata_flags() {
        let custom = FlagSet::from_flags(["--links", "--perms", "--delete", "--devices"]);
        let fallback = custom.with_fallback();
        assert!(!fallback.contains("--links"));
        assert!(!fallback.contains("--perms"));
        assert!(!fallback.contains("--devices"));
        assert!(fallback.contains("--delete"));
        assert!(fallback.contains("--recursive"));
    }
}
