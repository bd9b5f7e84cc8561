use crate::math::Point2d;
use crate::vehicle::Vehicle;
use crate::{ConnectionId, ConnectionSet, PointId, PointSet, VehicleId, VehicleSet};
use cgmath::MetricSpace;
pub use connection::{Connection, ConnectionAttributes, MIN_GAP};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

mod connection;

/// The view of a road network needed to admit vehicles into it.
pub trait Network {
    /// The connections leaving the given point.
    /// Unknown points have no outgoing connections.
    fn outgoing_connections(&self, point: PointId) -> &[ConnectionId];

    /// The velocity vehicles aim to travel at on the given connection, in m/s.
    fn target_velocity(&self, connection: ConnectionId) -> f64;

    /// Attempts to place a vehicle, already positioned at the start of
    /// `connection`, onto the network.
    ///
    /// On rejection the vehicle is handed back and the network is unchanged.
    fn try_admit(&mut self, connection: ConnectionId, vehicle: Vehicle)
        -> Result<VehicleId, Vehicle>;

    /// Sets the points an admitted vehicle is routed towards.
    fn set_vehicle_targets(&mut self, vehicle_id: VehicleId, targets: &[PointId]);
}

/// A network entry/exit or junction point.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point {
    /// The point ID.
    id: PointId,
    /// The position of the point in world space.
    pos: Point2d,
    /// The connections that start at this point.
    connections_out: SmallVec<[ConnectionId; 4]>,
    /// The connections that end at this point.
    connections_in: SmallVec<[ConnectionId; 4]>,
}

impl Point {
    /// Gets the point's ID.
    pub fn id(&self) -> PointId {
        self.id
    }

    /// Gets the position of the point in world space.
    pub fn pos(&self) -> Point2d {
        self.pos
    }

    /// Gets the connections that start at this point.
    pub fn connections_out(&self) -> &[ConnectionId] {
        &self.connections_out
    }

    /// Gets the connections that end at this point.
    pub fn connections_in(&self) -> &[ConnectionId] {
        &self.connections_in
    }
}

/// A minimal road network: points joined by straight, single lane
/// connections, along which vehicles travel at constant velocity.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoadNetwork {
    /// The points in the network.
    points: PointSet,
    /// The connections in the network.
    connections: ConnectionSet,
    /// The vehicles travelling through the network.
    vehicles: VehicleSet,
}

impl RoadNetwork {
    /// Creates an empty network.
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a point to the network.
    pub fn add_point(&mut self, pos: Point2d) -> PointId {
        self.points.insert_with_key(|id| Point {
            id,
            pos,
            connections_out: SmallVec::new(),
            connections_in: SmallVec::new(),
        })
    }

    /// Adds a connection between two existing points.
    pub fn add_connection(&mut self, attribs: &ConnectionAttributes) -> ConnectionId {
        let length = self.points[attribs.from]
            .pos
            .distance(self.points[attribs.to].pos);
        let id = self
            .connections
            .insert_with_key(|id| Connection::new(id, attribs, length));
        self.points[attribs.from].connections_out.push(id);
        self.points[attribs.to].connections_in.push(id);
        id
    }

    /// Gets a reference to the point with the given ID.
    pub fn get_point(&self, id: PointId) -> Option<&Point> {
        self.points.get(id)
    }

    /// Gets a reference to the connection with the given ID.
    pub fn get_connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(id)
    }

    /// Gets a reference to the vehicle with the given ID.
    pub fn get_vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(id)
    }

    /// Returns an iterator over all the points in the network.
    pub fn iter_points(&self) -> impl Iterator<Item = &Point> {
        self.points.values()
    }

    /// Returns an iterator over all the connections in the network.
    pub fn iter_connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Returns an iterator over all the vehicles in the network.
    pub fn iter_vehicles(&self) -> impl Iterator<Item = (VehicleId, &Vehicle)> {
        self.vehicles.iter()
    }

    /// Advances every vehicle by `dt` seconds, removing those that
    /// have reached the end of their connection.
    /// A `dt` that is not a positive, finite number leaves the network unchanged.
    pub fn step(&mut self, dt: f64) {
        if !(dt > 0.0 && dt.is_finite()) {
            return;
        }

        let mut exited = vec![];

        for (vehicle_id, vehicle) in &mut self.vehicles {
            vehicle.integrate(dt);
            let length = vehicle
                .connection_id()
                .and_then(|id| self.connections.get(id))
                .map_or(0.0, |c| c.length());
            if vehicle.pos_front() >= length {
                exited.push((vehicle_id, vehicle.connection_id()));
            }
        }

        for (vehicle_id, conn_id) in exited {
            if let Some(conn) = conn_id.and_then(|id| self.connections.get_mut(id)) {
                conn.remove_vehicle(vehicle_id);
            }
            self.vehicles.remove(vehicle_id);
            log::trace!("vehicle {:?} left the network", vehicle_id);
        }
    }

    /// Checks that every ID stored in the network refers to an entity that
    /// exists, and that vehicles and connections agree on who is where.
    /// Returns a description of the first problem found.
    pub(crate) fn check_consistency(&self) -> Result<(), String> {
        for (id, point) in &self.points {
            if point.id != id {
                return Err(format!("point {:?} is stored as {:?}", point.id, id));
            }
            let mut conns = point.connections_out.iter().chain(&point.connections_in);
            if let Some(conn) = conns.find(|c| !self.connections.contains_key(**c)) {
                return Err(format!("point {:?} refers to missing {:?}", id, conn));
            }
        }

        for (id, conn) in &self.connections {
            if conn.id() != id {
                return Err(format!("connection {:?} is stored as {:?}", conn.id(), id));
            }
            for point in [conn.from(), conn.to()] {
                if !self.points.contains_key(point) {
                    return Err(format!("{:?} refers to missing {:?}", id, point));
                }
            }
            for vehicle_id in conn.vehicles() {
                match self.vehicles.get(*vehicle_id) {
                    Some(vehicle) if vehicle.connection_id() == Some(id) => {}
                    Some(_) => {
                        return Err(format!("{:?} lists {:?} placed elsewhere", id, vehicle_id))
                    }
                    None => return Err(format!("{:?} lists missing {:?}", id, vehicle_id)),
                }
            }
        }

        for (id, vehicle) in &self.vehicles {
            let listed = vehicle
                .connection_id()
                .and_then(|conn| self.connections.get(conn))
                .map_or(false, |conn| conn.vehicles().contains(&id));
            if !listed {
                return Err(format!("{:?} is not on any known connection", id));
            }
        }

        Ok(())
    }
}

impl Network for RoadNetwork {
    fn outgoing_connections(&self, point: PointId) -> &[ConnectionId] {
        self.points
            .get(point)
            .map(|p| p.connections_out.as_slice())
            .unwrap_or(&[])
    }

    fn target_velocity(&self, connection: ConnectionId) -> f64 {
        self.connections
            .get(connection)
            .map(|c| c.target_velocity())
            .unwrap_or(0.0)
    }

    fn try_admit(
        &mut self,
        connection: ConnectionId,
        vehicle: Vehicle,
    ) -> Result<VehicleId, Vehicle> {
        let Some(conn) = self.connections.get_mut(connection) else {
            return Err(vehicle);
        };
        if vehicle.connection_id() != Some(connection) || !conn.can_admit(&self.vehicles) {
            return Err(vehicle);
        }
        let vehicle_id = self.vehicles.insert(vehicle);
        conn.insert_vehicle(vehicle_id);
        Ok(vehicle_id)
    }

    fn set_vehicle_targets(&mut self, vehicle_id: VehicleId, targets: &[PointId]) {
        if let Some(vehicle) = self.vehicles.get_mut(vehicle_id) {
            vehicle.set_targets(targets);
        }
    }
}
