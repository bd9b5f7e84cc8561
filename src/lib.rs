pub use cgmath;
pub use error::{ConfigError, SaveError};
pub use group::{PointGroup, StableKey, UNBOUND_KEY};
pub use network::{Connection, ConnectionAttributes, Network, Point, RoadNetwork, MIN_GAP};
pub use save::SAVE_VERSION;
pub use simulation::{Simulation, SimulationConfig};
use slotmap::{new_key_type, SlotMap};
pub use slotmap::{Key, KeyData};
pub use tick::{TickContext, Tickable};
pub use vehicle::{Physics, Vehicle, VehicleKind, VehicleState};
pub use volume::{GroupBinding, TrafficVolume, VolumeRates};

pub mod arrival;
mod error;
mod group;
pub mod math;
mod network;
mod save;
mod simulation;
mod tick;
mod vehicle;
mod volume;

new_key_type! {
    /// Unique ID of a [Point].
    pub struct PointId;
    /// Unique ID of a [Connection].
    pub struct ConnectionId;
    /// Unique ID of a [Vehicle] that has been admitted to a network.
    pub struct VehicleId;
    /// Unique ID of a [PointGroup].
    pub struct PointGroupId;
    /// Unique ID of a [TrafficVolume].
    pub struct VolumeId;
}

type PointSet = SlotMap<PointId, Point>;
type ConnectionSet = SlotMap<ConnectionId, Connection>;
type VehicleSet = SlotMap<VehicleId, Vehicle>;
/// The point groups known to a simulation.
pub type PointGroupSet = SlotMap<PointGroupId, PointGroup>;
