//! Canonical status and rejection-reason enums.
//!
//! The same value has two spellings in the system: the display name used by
//! the REST API (and JSON in general) and the stored name found in database
//! columns. Both live in one explicit table per enum, generated by
//! [`define_status_enum!`], so no code ever substitutes strings ad hoc.
//!
//! | Enum | Variant | Display | Stored |
//! |------|---------|---------|--------|
//! | `BlockVisitStatus` | `Queued` | `Queued` | `In queue` |
//! | `BlockStatus` | `OnHold` | `On hold` | `On Hold` |
//! | `BlockStatus` | `NotSet` | `Not set` | `Not Set` |

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A status or reason string that matches no entry of its serialization table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {domain} value: {value:?}")]
pub struct UnknownValue {
    /// Which table was consulted (e.g. "block visit status").
    pub domain: &'static str,
    /// The offending input.
    pub value: String,
}

impl UnknownValue {
    fn new(domain: &'static str, value: &str) -> Self {
        Self {
            domain,
            value: value.to_string(),
        }
    }
}

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $domain:literal {
            $( $(#[$vmeta:meta])* $variant:ident => ($display:literal, $stored:literal) ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Serialization table: `(variant, display name, stored name)`.
            pub const NAMES: &'static [($name, &'static str, &'static str)] = &[
                $( ($name::$variant, $display, $stored) ),+
            ];

            /// Name used by the REST API.
            pub fn display_name(&self) -> &'static str {
                match self {
                    $( $name::$variant => $display ),+
                }
            }

            /// Name used in database columns.
            pub fn stored_name(&self) -> &'static str {
                match self {
                    $( $name::$variant => $stored ),+
                }
            }

            pub fn from_display_name(value: &str) -> Result<Self, UnknownValue> {
                Self::NAMES
                    .iter()
                    .find(|(_, display, _)| *display == value)
                    .map(|(variant, _, _)| *variant)
                    .ok_or_else(|| UnknownValue::new($domain, value))
            }

            pub fn from_stored_name(value: &str) -> Result<Self, UnknownValue> {
                Self::NAMES
                    .iter()
                    .find(|(_, _, stored)| *stored == value)
                    .map(|(variant, _, _)| *variant)
                    .ok_or_else(|| UnknownValue::new($domain, value))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.display_name())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.display_name())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                $name::from_display_name(&raw).map_err(de::Error::custom)
            }
        }
    };
}

define_status_enum! {
    /// Status of an executed (or queued) block visit.
    BlockVisitStatus, "block visit status" {
        Queued => ("Queued", "In queue"),
        Accepted => ("Accepted", "Accepted"),
        Rejected => ("Rejected", "Rejected"),
        /// Terminal: deleted visits are never mutated again.
        Deleted => ("Deleted", "Deleted"),
    }
}

define_status_enum! {
    /// Lifecycle status of a block.
    BlockStatus, "block status" {
        Active => ("Active", "Active"),
        Completed => ("Completed", "Completed"),
        OnHold => ("On hold", "On Hold"),
        Deleted => ("Deleted", "Deleted"),
        Expired => ("Expired", "Expired"),
        Superseded => ("Superseded", "Superseded"),
        NotSet => ("Not set", "Not Set"),
    }
}

define_status_enum! {
    /// Why a block visit was rejected.
    RejectionReason, "rejection reason" {
        ObservingConditionsNotMet => ("Observing conditions not met", "Observing conditions not met"),
        InstrumentTechnicalProblems => ("Instrument technical problems", "Instrument technical problems"),
        TelescopeTechnicalProblems => ("Telescope technical problems", "Telescope technical problems"),
        Phase2Problem => ("Phase 2 problem", "Phase 2 problem"),
        Other => ("Other", "Other"),
    }
}

impl BlockVisitStatus {
    pub fn is_deleted(&self) -> bool {
        matches!(self, BlockVisitStatus::Deleted)
    }
}

/// Reasons whose time is booked as lost to weather.
pub const WEATHER_REASONS: &[RejectionReason] = &[RejectionReason::ObservingConditionsNotMet];

/// Reasons whose time is booked as lost to technical problems.
pub const TECHNICAL_REASONS: &[RejectionReason] = &[
    RejectionReason::InstrumentTechnicalProblems,
    RejectionReason::TelescopeTechnicalProblems,
];

/// Night time-accounting bucket a rejection reason is charged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LostTimeBucket {
    Weather,
    Technical,
}

impl RejectionReason {
    /// The lost-time bucket of this reason, or `None` for reasons that do not
    /// affect time accounting.
    pub fn lost_time_bucket(&self) -> Option<LostTimeBucket> {
        bucket_for(*self, WEATHER_REASONS, TECHNICAL_REASONS)
    }
}

/// Classify `reason` against the given partition. Weather is checked first,
/// so a reason listed in both sets counts as weather.
pub fn bucket_for(
    reason: RejectionReason,
    weather: &[RejectionReason],
    technical: &[RejectionReason],
) -> Option<LostTimeBucket> {
    if weather.contains(&reason) {
        Some(LostTimeBucket::Weather)
    } else if technical.contains(&reason) {
        Some(LostTimeBucket::Technical)
    } else {
        None
    }
}
