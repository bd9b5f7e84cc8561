use crate::{ConnectionId, PointId, VehicleId, VehicleSet};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The minimum gap between the start of a connection and the rear of the
/// last vehicle to enter it before another vehicle may enter, in m.
pub const MIN_GAP: f64 = 2.0; // m

/// A connection is a single lane of traffic between two points.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Connection {
    /// The connection ID.
    id: ConnectionId,
    /// The point the connection starts at.
    from: PointId,
    /// The point the connection ends at.
    to: PointId,
    /// The length of the connection in m.
    length: f64,
    /// The velocity vehicles aim to travel at, in m/s.
    target_velocity: f64,
    /// The maximum number of vehicles on the connection at once.
    capacity: usize,
    /// The vehicles on the connection, in the order they entered.
    vehicles: Vec<VehicleId>,
}

/// The attributes of a connection.
#[derive(Clone, Copy, Debug)]
pub struct ConnectionAttributes {
    /// The point the connection starts at.
    pub from: PointId,
    /// The point the connection ends at.
    pub to: PointId,
    /// The velocity vehicles aim to travel at, in m/s.
    pub target_velocity: f64,
    /// The maximum number of vehicles on the connection at once.
    pub capacity: usize,
}

impl Connection {
    /// Creates a new connection.
    pub(crate) fn new(id: ConnectionId, attribs: &ConnectionAttributes, length: f64) -> Self {
        Self {
            id,
            from: attribs.from,
            to: attribs.to,
            length,
            target_velocity: attribs.target_velocity,
            capacity: attribs.capacity,
            vehicles: vec![],
        }
    }

    /// Gets the connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Gets the point the connection starts at.
    pub fn from(&self) -> PointId {
        self.from
    }

    /// Gets the point the connection ends at.
    pub fn to(&self) -> PointId {
        self.to
    }

    /// Gets the length of the connection in m.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Gets the velocity vehicles aim to travel at, in m/s.
    pub fn target_velocity(&self) -> f64 {
        self.target_velocity
    }

    /// Gets the maximum number of vehicles on the connection at once.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Gets the IDs of the vehicles on the connection.
    pub fn vehicles(&self) -> &[VehicleId] {
        &self.vehicles
    }

    /// Determines whether a vehicle placed at the start of the connection
    /// may enter it. Does not modify anything.
    pub(crate) fn can_admit(&self, vehicles: &VehicleSet) -> bool {
        if self.vehicles.len() >= self.capacity {
            return false;
        }
        match self.vehicles.last() {
            Some(id) => vehicles.get(*id).map_or(true, |v| v.pos_rear() >= MIN_GAP),
            None => true,
        }
    }

    /// Records that the vehicle with the given ID has entered the connection.
    pub(crate) fn insert_vehicle(&mut self, id: VehicleId) {
        self.vehicles.push(id);
    }

    /// Removes the vehicle with the given ID from the connection.
    pub(crate) fn remove_vehicle(&mut self, id: VehicleId) {
        if let Some(idx) = self.vehicles.iter().position(|v| *v == id) {
            self.vehicles.remove(idx);
        }
    }
}
