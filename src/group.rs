use crate::{PointGroupId, PointId};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A key identifying a [PointGroup] across a save/reload cycle.
///
/// Unlike a [PointGroupId], which is only valid for the lifetime of the
/// set that issued it, a stable key is persisted with the group.
pub type StableKey = i32;

/// The stable key stored when a reference is unbound.
pub const UNBOUND_KEY: StableKey = -1;

/// A named, ordered set of network entry/exit points.
/// Traffic volumes use point groups as their sources and destinations.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PointGroup {
    /// The group's ID, reassigned whenever the group is inserted into a set.
    #[cfg_attr(feature = "serde", serde(skip))]
    id: PointGroupId,
    /// The key persisted in place of references to this group.
    key: StableKey,
    /// A human readable name.
    title: String,
    /// The member points.
    points: Vec<PointId>,
}

impl PointGroup {
    /// Creates a new point group.
    pub(crate) fn new(id: PointGroupId, key: StableKey, title: &str, points: &[PointId]) -> Self {
        Self {
            id,
            key,
            title: title.to_owned(),
            points: points.to_vec(),
        }
    }

    /// Gets the group's ID.
    pub fn id(&self) -> PointGroupId {
        self.id
    }

    /// Gets the group's stable key.
    pub fn key(&self) -> StableKey {
        self.key
    }

    /// Gets the group's title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Gets the member points, in order.
    pub fn points(&self) -> &[PointId] {
        &self.points
    }

    /// Whether the group has no member points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub(crate) fn set_id(&mut self, id: PointGroupId) {
        self.id = id;
    }

    pub(crate) fn set_key(&mut self, key: StableKey) {
        self.key = key;
    }

    pub(crate) fn set_points(&mut self, points: &[PointId]) {
        self.points = points.to_vec();
    }
}
