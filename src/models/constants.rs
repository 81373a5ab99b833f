//! CAP enumerations shared by alerts and their sub-documents.
//!
//! Variant names are the exact wire values, so serde derives are enough to
//! reject anything outside the closed set.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! cap_enum {
    (
        $(#[$meta:meta])*
        $name:ident, default = $default:ident, [$($variant:ident),+ $(,)?]
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant,)+
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
            pub const DEFAULT: $name = $name::$default;

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant),)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

cap_enum!(
    /// Appropriate handling of an alert.
    Status, default = Test, [Actual, Exercise, System, Draft, Test]
);

cap_enum!(
    /// Nature of an alert (CAP `msgType`).
    MsgType, default = Ask, [Alert, Update, Cancel, Error, Ask]
);

cap_enum!(
    /// Intended distribution of an alert.
    Scope, default = Private, [Public, Restricted, Private]
);

cap_enum!(
    Category, default = Other,
    [Geo, Met, Safety, Security, Rescue, Fire, Health, Env, Transport, Infra, CBRNE, Other]
);

cap_enum!(
    /// Action recommended for the target audience (CAP `responseType`).
    ResponseType, default = None,
    [Shelter, Evacuate, Prepare, Execute, Avoid, Monitor, Assess, AllClear, None]
);

cap_enum!(
    Urgency, default = Unknown, [Immediate, Expected, Future, Past, Unknown]
);

cap_enum!(
    Severity, default = Unknown, [Extreme, Severe, Moderate, Minor, Unknown]
);

cap_enum!(
    Certainty, default = Unknown, [Observed, Likely, Possible, Unlikely, Unknown]
);

cap_enum!(
    /// Whether an alert was received from a source or issued by us.
    Direction, default = Inbound, [Inbound, Outbound]
);

pub const COLOR_UNKNOWN: &str = "#3366FF";
pub const COLOR_MINOR: &str = "#88E729";
pub const COLOR_MODERATE: &str = "#FFFF00";
pub const COLOR_SEVERE: &str = "#FE9901";
pub const COLOR_EXTREME: &str = "#D72E29";
pub const DEFAULT_COLOR: &str = COLOR_UNKNOWN;

pub const COLORS: &[&str] = &[
    COLOR_UNKNOWN,
    COLOR_MINOR,
    COLOR_MODERATE,
    COLOR_SEVERE,
    COLOR_EXTREME,
];

impl Severity {
    /// Hex color used to differentiate alerts of this severity visually.
    pub fn color(&self) -> &'static str {
        match self {
            Severity::Unknown => COLOR_UNKNOWN,
            Severity::Minor => COLOR_MINOR,
            Severity::Moderate => COLOR_MODERATE,
            Severity::Severe => COLOR_SEVERE,
            Severity::Extreme => COLOR_EXTREME,
        }
    }
}
