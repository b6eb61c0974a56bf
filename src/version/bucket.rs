use std::fmt;
use std::ops::BitOr;

use super::{CURRENT_WORKFLOW_VERSION, FormatVersion, STRUCTURED_FORMAT_VERSION};

/// Coarse classification of a document version into the format generations
/// that still require distinct transform chains.
///
/// Buckets are not persisted; they only select which chain executes during a
/// single migration pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatBucket {
    /// The flat legacy encoding (endpoint declarations as string arrays).
    BeforeVersion3,
    /// The transition generation introducing structured endpoints.
    ForVersion3,
    /// Every structured-format generation up to the current one.
    AfterVersion3,
}

impl FormatBucket {
    pub const ALL: [FormatBucket; 3] = [
        FormatBucket::BeforeVersion3,
        FormatBucket::ForVersion3,
        FormatBucket::AfterVersion3,
    ];

    fn bit(self) -> u8 {
        match self {
            FormatBucket::BeforeVersion3 => 0b001,
            FormatBucket::ForVersion3 => 0b010,
            FormatBucket::AfterVersion3 => 0b100,
        }
    }
}

/// A bitmask of [`FormatBucket`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BucketSet(u8);

impl BucketSet {
    pub const NONE: BucketSet = BucketSet(0);

    pub fn contains(self, bucket: FormatBucket) -> bool {
        self.0 & bucket.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn insert(&mut self, bucket: FormatBucket) {
        self.0 |= bucket.bit();
    }
}

impl From<FormatBucket> for BucketSet {
    fn from(bucket: FormatBucket) -> Self {
        BucketSet(bucket.bit())
    }
}

impl BitOr for BucketSet {
    type Output = BucketSet;

    fn bitor(self, rhs: BucketSet) -> BucketSet {
        BucketSet(self.0 | rhs.0)
    }
}

impl BitOr<FormatBucket> for BucketSet {
    type Output = BucketSet;

    fn bitor(self, rhs: FormatBucket) -> BucketSet {
        BucketSet(self.0 | rhs.bit())
    }
}

impl fmt::Display for BucketSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let mut first = true;
        for bucket in FormatBucket::ALL {
            if self.contains(bucket) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{:?}", bucket)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Classifies a workflow document version into the buckets whose transform
/// chains apply. Pure; a missing version is older than any known generation.
///
/// The silent pass (`interactive == false`) runs first and is limited to the
/// two legacy buckets; the interactive pass covers the full chain and may be
/// preceded by a user prompt and a backup, both outside this crate.
pub fn classify(version: Option<&FormatVersion>, interactive: bool) -> BucketSet {
    let mut buckets = BucketSet::NONE;

    let older_than = |reference: &str| -> bool {
        match (version, FormatVersion::parse(reference)) {
            (Some(version), Some(reference)) => *version < reference,
            // No declared version: predates every known generation.
            (None, _) => true,
            _ => false,
        }
    };

    if older_than("1") {
        buckets.insert(FormatBucket::BeforeVersion3);
    }
    if older_than(STRUCTURED_FORMAT_VERSION) {
        buckets.insert(FormatBucket::ForVersion3);
    }
    if interactive && older_than(CURRENT_WORKFLOW_VERSION) {
        buckets.insert(FormatBucket::AfterVersion3);
    }
    buckets
}
