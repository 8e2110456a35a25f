use crate::error::{Error, Result};
use std::borrow::Borrow;
use std::fmt;

const MAX_NAME_LEN: usize = 128;
const MAX_RESOURCE_ID_LEN: usize = 255;
const SEPARATOR: char = '.';

fn validate_simple_name(value: &str, kind: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidId(format!("{kind} must not be empty")));
    }
    if trimmed.len() > MAX_NAME_LEN {
        return Err(Error::InvalidId(format!(
            "{kind} length must be <= {MAX_NAME_LEN}"
        )));
    }
    if !trimmed.chars().all(is_allowed_name_char) {
        return Err(Error::InvalidId(format!(
            "{kind} contains invalid characters"
        )));
    }
    Ok(trimmed.to_string())
}

fn validate_resource_id(value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidId("resource id must not be empty".to_string()));
    }
    if trimmed.len() > MAX_RESOURCE_ID_LEN {
        return Err(Error::InvalidId(format!(
            "resource id length must be <= {MAX_RESOURCE_ID_LEN}"
        )));
    }
    for segment in trimmed.split(SEPARATOR) {
        if segment.is_empty() {
            return Err(Error::InvalidId(
                "resource id must not have empty segments".to_string(),
            ));
        }
        if !segment.chars().all(is_allowed_name_char) {
            return Err(Error::InvalidId(
                "resource id contains invalid characters".to_string(),
            ));
        }
    }
    Ok(trimmed.to_string())
}

fn is_allowed_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, ':' | '_' | '-')
}

macro_rules! define_id_type {
    ($(#[$doc:meta])* $name:ident, $kind:expr) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        pub struct $name(String);

        impl $name {
            /// Creates a validated identifier.
            pub fn new(value: impl AsRef<str>) -> Result<Self> {
                validate_simple_name(value.as_ref(), $kind).map(Self)
            }

            /// Creates an identifier from a trusted string without validation.
            pub fn from_string(value: String) -> Self {
                Self(value)
            }

            /// Returns the underlying string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<&str> for $name {
            type Error = Error;

            fn try_from(value: &str) -> Result<Self> {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::from_string(value)
            }
        }
    };
}

define_id_type!(
    /// Principal identifier.
    PrincipalId,
    "principal id"
);
define_id_type!(
    /// Human readable role name, unique per store.
    RoleName,
    "role name"
);
define_id_type!(
    /// Action name such as `read` or `index`.
    ActionName,
    "action name"
);
define_id_type!(
    /// Name of a resource-supplied condition predicate.
    ConditionName,
    "condition name"
);

macro_rules! define_numeric_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        pub struct $name(u64);

        impl $name {
            /// Wraps a raw storage key.
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the raw storage key.
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

define_numeric_id!(
    /// Storage key of a role.
    RoleId
);
define_numeric_id!(
    /// Storage key of a rule.
    RuleId
);

/// A stored role.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Role {
    /// Storage key.
    pub id: RoleId,
    /// Unique name.
    pub name: RoleName,
}

/// Reference to a role by storage key or by name.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum RoleRef {
    /// Role storage key.
    Id(RoleId),
    /// Role name.
    Name(RoleName),
}

impl fmt::Display for RoleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "#{id}"),
            Self::Name(name) => f.write_str(name.as_str()),
        }
    }
}

impl From<RoleId> for RoleRef {
    fn from(value: RoleId) -> Self {
        Self::Id(value)
    }
}

impl From<RoleName> for RoleRef {
    fn from(value: RoleName) -> Self {
        Self::Name(value)
    }
}

impl From<&Role> for RoleRef {
    fn from(value: &Role) -> Self {
        Self::Id(value.id)
    }
}

/// Dot-delimited hierarchical resource identifier such as `m:order.42`.
///
/// Segments grow more specific from left to right. The identifier never
/// contains empty segments, so truncating at the last `.` always yields
/// another valid identifier.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct ResourceId(String);

impl ResourceId {
    /// Creates a validated resource identifier.
    pub fn new(value: impl AsRef<str>) -> Result<Self> {
        validate_resource_id(value.as_ref()).map(Self)
    }

    /// Creates a resource identifier from a trusted string without validation.
    pub fn from_string(value: String) -> Self {
        Self(value)
    }

    /// Identifier for a data model, optionally narrowed to one record:
    /// `m:<model>` or `m:<model>.<key>`.
    pub fn for_model(model: impl AsRef<str>, key: Option<&dyn fmt::Display>) -> Result<Self> {
        let model = validate_simple_name(model.as_ref(), "model name")?.to_ascii_lowercase();
        match key {
            Some(key) => Self::new(format!("m:{model}.{key}")),
            None => Self::new(format!("m:{model}")),
        }
    }

    /// Identifier for a request handler group: `c:<name>`.
    pub fn for_controller(name: impl AsRef<str>) -> Result<Self> {
        let name = validate_simple_name(name.as_ref(), "controller name")?.to_ascii_lowercase();
        Self::new(format!("c:{name}"))
    }

    /// Returns the underlying string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the identifier with its last segment removed.
    pub fn parent(&self) -> Option<ResourceId> {
        self.0
            .rfind(SEPARATOR)
            .map(|pos| Self(self.0[..pos].to_string()))
    }

    /// Iterates over the identifier and every ancestor, most specific first.
    pub fn hierarchy(&self) -> impl Iterator<Item = &str> {
        hierarchy(&self.0)
    }

    /// Returns true when `self` lies strictly below `ancestor`.
    pub fn is_descendant_of(&self, ancestor: &str) -> bool {
        is_descendant(&self.0, ancestor)
    }
}

pub(crate) fn hierarchy(id: &str) -> impl Iterator<Item = &str> {
    std::iter::successors(Some(id), |&current: &&str| {
        current.rfind(SEPARATOR).map(|pos| &current[..pos])
    })
}

pub(crate) fn is_descendant(id: &str, ancestor: &str) -> bool {
    id.len() > ancestor.len()
        && id.starts_with(ancestor)
        && id[ancestor.len()..].starts_with(SEPARATOR)
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ResourceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for ResourceId {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<String> for ResourceId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ResourceId> for String {
    fn from(value: ResourceId) -> Self {
        value.0
    }
}
