//! Data type model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of synced data owned by one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Memos,
    Folders,
    Trash,
    Macros,
    Calendar,
    Activities,
    Settings,
}

/// How a data type is shaped, which selects the merger applied to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataShape {
    /// Sequence of id-bearing entities
    Collection,
    /// Date key to schedule list
    Calendar,
    /// Singleton settings document
    Settings,
    /// Singleton macro list
    Macros,
}

impl DataType {
    /// Every data type, in the order clients sync them.
    pub const ALL: [Self; 7] = [
        Self::Memos,
        Self::Folders,
        Self::Trash,
        Self::Macros,
        Self::Calendar,
        Self::Activities,
        Self::Settings,
    ];

    /// Name used for cache and sync-metadata keys (`memos`, `folders`, ...)
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Memos => "memos",
            Self::Folders => "folders",
            Self::Trash => "trash",
            Self::Macros => "macros",
            Self::Calendar => "calendar",
            Self::Activities => "activities",
            Self::Settings => "settings",
        }
    }

    /// Name of a single item, used for fingerprint keys (`memo`, `folder`, ...)
    pub const fn item_type(self) -> &'static str {
        match self {
            Self::Memos => "memo",
            Self::Folders => "folder",
            Self::Trash => "trash",
            Self::Macros => "macros",
            Self::Calendar => "calendar",
            Self::Activities => "activity",
            Self::Settings => "settings",
        }
    }

    pub const fn shape(self) -> DataShape {
        match self {
            Self::Memos | Self::Folders | Self::Trash | Self::Activities => DataShape::Collection,
            Self::Calendar => DataShape::Calendar,
            Self::Settings => DataShape::Settings,
            Self::Macros => DataShape::Macros,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|data_type| {
                data_type.as_str() == normalized || data_type.item_type() == normalized
            })
            .ok_or_else(|| format!("unknown data type '{}'", s.trim()))
    }
}
