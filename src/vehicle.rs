use crate::{ConnectionId, PointId};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// The class of a vehicle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum VehicleKind {
    /// A light vehicle.
    Car,
    /// A heavy goods vehicle.
    Truck,
    /// A transit bus.
    Bus,
    /// A rail tram.
    Tram,
}

impl VehicleKind {
    /// All vehicle kinds, in the order arrivals are generated each tick.
    pub const ALL: [VehicleKind; 4] = [Self::Car, Self::Truck, Self::Bus, Self::Tram];

    /// The index of this kind within [VehicleKind::ALL].
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The length of vehicles of this kind, in m.
    pub fn length(self) -> f64 {
        match self {
            Self::Car => 4.5,
            Self::Truck => 12.0,
            Self::Bus => 12.0,
            Self::Tram => 30.0,
        }
    }
}

impl fmt::Display for VehicleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Car => "car",
            Self::Truck => "truck",
            Self::Bus => "bus",
            Self::Tram => "tram",
        };
        f.write_str(name)
    }
}

/// Where a vehicle is within the network.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VehicleState {
    /// The connection the vehicle is placed on, if any.
    pub connection: Option<ConnectionId>,
    /// The longitudinal position of the front of the vehicle along the connection, in m.
    pub pos: f64,
}

/// The kinematic state of a vehicle.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Physics {
    /// The velocity in m/s.
    pub velocity: f64,
    /// The desired velocity in m/s.
    pub target_velocity: f64,
    /// The acceleration in m/s^2.
    pub acceleration: f64,
}

/// A vehicle, either waiting to be admitted or travelling through a network.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vehicle {
    kind: VehicleKind,
    /// The vehicle length in m.
    length: f64,
    state: VehicleState,
    physics: Physics,
    /// The points the vehicle would like to leave the network at.
    targets: Vec<PointId>,
}

impl Vehicle {
    /// Creates a new vehicle of the given kind, with no position in any network.
    pub fn new(kind: VehicleKind) -> Self {
        Self {
            kind,
            length: kind.length(),
            state: VehicleState::default(),
            physics: Physics::default(),
            targets: vec![],
        }
    }

    /// The vehicle's class.
    pub fn kind(&self) -> VehicleKind {
        self.kind
    }

    /// The vehicle's length in m.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// The vehicle's placement.
    pub fn state(&self) -> &VehicleState {
        &self.state
    }

    /// The vehicle's kinematic state.
    pub fn physics(&self) -> &Physics {
        &self.physics
    }

    /// The ID of the connection the vehicle is placed on.
    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.state.connection
    }

    /// The longitudinal position of the front of the vehicle in m.
    pub fn pos_front(&self) -> f64 {
        self.state.pos
    }

    /// The longitudinal position of the rear of the vehicle in m.
    pub fn pos_rear(&self) -> f64 {
        self.state.pos - self.length
    }

    /// The points the vehicle is routed towards.
    pub fn targets(&self) -> &[PointId] {
        &self.targets
    }

    /// Places the vehicle at the start of a connection, travelling at
    /// the connection's target velocity.
    pub(crate) fn place(&mut self, connection: ConnectionId, target_velocity: f64) {
        self.state = VehicleState {
            connection: Some(connection),
            pos: 0.0,
        };
        self.physics = Physics {
            velocity: target_velocity,
            target_velocity,
            acceleration: 0.0,
        };
    }

    /// Sets the points the vehicle is routed towards.
    pub(crate) fn set_targets(&mut self, targets: &[PointId]) {
        self.targets = targets.to_vec();
    }

    /// Integrates the vehicle's velocity and position.
    ///
    /// # Parameters
    /// * `dt` - The time step in seconds
    pub(crate) fn integrate(&mut self, dt: f64) {
        let vel = f64::max(self.physics.velocity + dt * self.physics.acceleration, 0.0);
        self.state.pos += 0.5 * (self.physics.velocity + vel) * dt;
        self.physics.velocity = vel;
    }
}
