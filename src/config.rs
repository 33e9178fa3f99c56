//! Options controlling how archives are scanned.

/// How a header scan reacts to malformed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanMode {
    /// Any decode or I/O failure ends the scan. A damaged archive yields a
    /// partial index instead of an error.
    #[default]
    Lenient,
    /// Malformed headers, checksum mismatches, and truncated entries are
    /// reported to the caller.
    Strict,
}

/// Options for building an [`ArchiveIndex`](crate::ArchiveIndex).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexOptions {
    pub mode: ScanMode,
    /// Compare each header's stored checksum against its contents
    pub verify_checksums: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            mode: ScanMode::Lenient,
            verify_checksums: false,
        }
    }
}

impl IndexOptions {
    /// Strict scanning with checksum verification
    pub fn strict() -> Self {
        Self {
            mode: ScanMode::Strict,
            verify_checksums: true,
        }
    }

    pub fn with_mode(mut self, mode: ScanMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_lenient() {
        let opts = IndexOptions::default();
        assert_eq!(opts.mode, ScanMode::Lenient);
        assert!(!opts.verify_checksums);
    }

    #[test]
    fn test_builders() {
        let opts = IndexOptions::default()
            .with_mode(ScanMode::Strict)
            .with_checksums(true);
        assert_eq!(opts, IndexOptions::strict());
    }
}
