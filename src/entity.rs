//! Entity identity types.
//!
//! Everything the pipeline touches is expressed in terms of these values:
//! a descriptor says *what* to resolve, a handle says *what was found*, and
//! an [`EntityRef`] is a typed identity that can sit on either end of a link.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ConfigError;

/// Globally unique, stable entity identifier.
///
/// # Examples
///
/// ```
/// use relnode::EntityId;
///
/// let id = EntityId::new();
/// assert!(!id.is_nil());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Creates a new random entity ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an entity ID from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Returns true if this is a nil (all zeros) UUID.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EntityId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// The closed set of entity kinds a descriptor can name.
///
/// Only some kinds have a resolution strategy registered by default; the
/// rest resolve to an empty handle without touching any backing service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    /// The tenant that owns every other entity.
    Tenant,
    /// A customer of the tenant.
    Customer,
    /// A user account.
    User,
    /// A dashboard, indexed by title.
    Dashboard,
    /// An asset.
    Asset,
    /// A device.
    Device,
    /// An alarm.
    Alarm,
    /// A rule chain.
    RuleChain,
    /// A filtered view over a device or asset.
    EntityView,
}

impl EntityKind {
    /// All kinds, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::Tenant,
        Self::Customer,
        Self::User,
        Self::Dashboard,
        Self::Asset,
        Self::Device,
        Self::Alarm,
        Self::RuleChain,
        Self::EntityView,
    ];

    /// Upper-snake name used in configuration and error messages.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Tenant => "TENANT",
            Self::Customer => "CUSTOMER",
            Self::User => "USER",
            Self::Dashboard => "DASHBOARD",
            Self::Asset => "ASSET",
            Self::Device => "DEVICE",
            Self::Alarm => "ALARM",
            Self::RuleChain => "RULE_CHAIN",
            Self::EntityView => "ENTITY_VIEW",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownKind {
                value: s.to_string(),
            })
    }
}

/// A typed identity: an [`EntityId`] together with the kind it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    /// Kind of the referenced entity.
    pub kind: EntityKind,
    /// Identity of the referenced entity.
    pub id: EntityId,
}

impl EntityRef {
    /// Creates a typed identity.
    #[must_use]
    pub const fn new(kind: EntityKind, id: EntityId) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// What to resolve: the cache key.
///
/// Equality and hashing cover all three fields, so `subtype: None` and
/// `subtype: Some("")` are different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityDescriptor {
    /// Entity name (or title, for title-indexed kinds).
    pub name: String,
    /// Optional subtype, used when an entity is created.
    pub subtype: Option<String>,
    /// Entity kind.
    pub kind: EntityKind,
}

impl EntityDescriptor {
    /// Creates a descriptor without a subtype.
    #[must_use]
    pub fn new(kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subtype: None,
            kind,
        }
    }

    /// Sets the subtype.
    #[must_use]
    pub fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }
}

impl fmt::Display for EntityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subtype {
            Some(subtype) => write!(f, "{}('{}', subtype '{subtype}')", self.kind, self.name),
            None => write!(f, "{}('{}')", self.kind, self.name),
        }
    }
}

/// Result of a resolution. `id` is `None` when nothing was found and nothing
/// was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityHandle {
    /// Kind the handle was resolved for.
    pub kind: EntityKind,
    /// Resolved identity, if any.
    pub id: Option<EntityId>,
}

impl EntityHandle {
    /// A handle with a resolved identity.
    #[must_use]
    pub const fn found(kind: EntityKind, id: EntityId) -> Self {
        Self { kind, id: Some(id) }
    }

    /// A handle with no identity.
    #[must_use]
    pub const fn absent(kind: EntityKind) -> Self {
        Self { kind, id: None }
    }

    /// Returns the typed identity, if resolved.
    #[must_use]
    pub fn entity_ref(&self) -> Option<EntityRef> {
        self.id.map(|id| EntityRef::new(self.kind, id))
    }
}

/// Which side of a link the resolved entity occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    /// The resolved entity is the source; the message originator is the target.
    From,
    /// The message originator is the source; the resolved entity is the target.
    To,
}

impl Direction {
    /// Places the resolved entity and the originator on the two ends of a link.
    ///
    /// # Examples
    ///
    /// ```
    /// use relnode::{Direction, EntityId, EntityKind, EntityRef};
    ///
    /// let resolved = EntityRef::new(EntityKind::Asset, EntityId::new());
    /// let originator = EntityRef::new(EntityKind::Device, EntityId::new());
    /// let link = Direction::From.assign(resolved, originator);
    /// assert_eq!(link.from, resolved);
    /// assert_eq!(link.to, originator);
    /// ```
    #[must_use]
    pub const fn assign(self, resolved: EntityRef, originator: EntityRef) -> LinkEndpoints {
        match self {
            Self::From => LinkEndpoints {
                from: resolved,
                to: originator,
            },
            Self::To => LinkEndpoints {
                from: originator,
                to: resolved,
            },
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::From => f.write_str("FROM"),
            Self::To => f.write_str("TO"),
        }
    }
}

/// The two ends of a link after direction assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkEndpoints {
    /// Source of the link.
    pub from: EntityRef,
    /// Target of the link.
    pub to: EntityRef,
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.as_str().parse::<EntityKind>().unwrap(), kind);
        }
        assert!("WIDGET".parse::<EntityKind>().is_err());
        assert!("device".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_kind_serde_uses_upper_snake_case() {
        let json = serde_json::to_string(&EntityKind::EntityView).unwrap();
        assert_eq!(json, "\"ENTITY_VIEW\"");
        let kind: EntityKind = serde_json::from_str("\"DEVICE\"").unwrap();
        assert_eq!(kind, EntityKind::Device);
    }

    #[test]
    fn test_descriptor_absent_and_empty_subtype_are_distinct() {
        let a = EntityDescriptor::new(EntityKind::Device, "d");
        let b = EntityDescriptor::new(EntityKind::Device, "d").with_subtype("");
        assert_ne!(a, b);

        let mut set = HashSet::new();
        set.insert(a.clone());
        set.insert(b);
        set.insert(a);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_descriptor_kind_participates_in_equality() {
        let a = EntityDescriptor::new(EntityKind::Device, "x");
        let b = EntityDescriptor::new(EntityKind::Asset, "x");
        assert_ne!(a, b);
    }

    #[test]
    fn test_direction_assign_both_ways() {
        let resolved = EntityRef::new(EntityKind::Asset, EntityId::new());
        let originator = EntityRef::new(EntityKind::Device, EntityId::new());

        let from = Direction::From.assign(resolved, originator);
        assert_eq!(from.from, resolved);
        assert_eq!(from.to, originator);

        let to = Direction::To.assign(resolved, originator);
        assert_eq!(to.from, originator);
        assert_eq!(to.to, resolved);
    }

    #[test]
    fn test_handle_entity_ref() {
        let id = EntityId::new();
        assert_eq!(
            EntityHandle::found(EntityKind::Device, id).entity_ref(),
            Some(EntityRef::new(EntityKind::Device, id))
        );
        assert_eq!(EntityHandle::absent(EntityKind::Device).entity_ref(), None);
    }
}
