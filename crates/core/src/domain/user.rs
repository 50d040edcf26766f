use std::fmt;

use serde::{Deserialize, Serialize};

/// Chat-platform identity of a user; also the registry join key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub display_name: String,
    pub external_id: String,
}

impl UserProfile {
    pub fn new(display_name: impl Into<String>, external_id: impl Into<String>) -> Self {
        Self { display_name: display_name.into(), external_id: external_id.into() }
    }

    pub fn owner_label(&self) -> OwnerLabel {
        OwnerLabel::for_profile(self)
    }
}

/// Text written into a booked cell: `"<display name> (<external id>)"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerLabel(String);

impl OwnerLabel {
    pub fn for_profile(profile: &UserProfile) -> Self {
        Self(format!("{} ({})", profile.display_name, profile.external_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Cells are compared after trimming surrounding whitespace on both sides.
    pub fn matches(&self, raw: &str) -> bool {
        let label = self.0.trim();
        !label.is_empty() && raw.trim() == label
    }
}

impl fmt::Display for OwnerLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
