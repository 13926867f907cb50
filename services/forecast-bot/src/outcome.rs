//! Outcome classification

use std::fmt;

/// Outcome numbers at or above this value are BIG
pub const BIG_THRESHOLD: u32 = 5;

/// Size bucket of a round outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Small,
    Big,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Small => "SMALL",
            Bucket::Big => "BIG",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map an outcome number to its bucket
pub fn classify(number: u32) -> Bucket {
    if number >= BIG_THRESHOLD {
        Bucket::Big
    } else {
        Bucket::Small
    }
}

/// The other bucket
pub fn opposite(bucket: Bucket) -> Bucket {
    match bucket {
        Bucket::Small => Bucket::Big,
        Bucket::Big => Bucket::Small,
    }
}

/// Next-round prediction for an observed outcome
pub fn predict_next(number: u32) -> Bucket {
    opposite(classify(number))
}
