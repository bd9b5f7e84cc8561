use crate::arrival;
use crate::error::ConfigError;
use crate::group::{PointGroup, StableKey, UNBOUND_KEY};
use crate::network::Network;
use crate::tick::{TickContext, Tickable};
use crate::vehicle::{Vehicle, VehicleKind};
use crate::PointGroupId;
use rand::seq::SliceRandom;
use rand::Rng;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Hourly arrival rates, one per vehicle kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VolumeRates {
    /// Cars per hour.
    pub cars: u32,
    /// Trucks per hour.
    pub trucks: u32,
    /// Buses per hour.
    pub buses: u32,
    /// Trams per hour.
    pub trams: u32,
}

impl VolumeRates {
    /// Creates a new set of rates, in vehicles/hour.
    pub const fn new(cars: u32, trucks: u32, buses: u32, trams: u32) -> Self {
        Self {
            cars,
            trucks,
            buses,
            trams,
        }
    }

    /// Gets the rate of the given vehicle kind.
    pub fn get(&self, kind: VehicleKind) -> u32 {
        match kind {
            VehicleKind::Car => self.cars,
            VehicleKind::Truck => self.trucks,
            VehicleKind::Bus => self.buses,
            VehicleKind::Tram => self.trams,
        }
    }

    /// Sets the rate of the given vehicle kind.
    pub fn set(&mut self, kind: VehicleKind, rate: u32) {
        let slot = match kind {
            VehicleKind::Car => &mut self.cars,
            VehicleKind::Truck => &mut self.trucks,
            VehicleKind::Bus => &mut self.buses,
            VehicleKind::Tram => &mut self.trams,
        };
        *slot = rate;
    }

    /// The combined rate of all vehicle kinds.
    pub fn total(&self) -> u64 {
        VehicleKind::ALL.iter().map(|k| self.get(*k) as u64).sum()
    }
}

/// Converts signed rates, in [VehicleKind::ALL] order, rejecting negative ones.
impl TryFrom<[i64; 4]> for VolumeRates {
    type Error = ConfigError;

    fn try_from(values: [i64; 4]) -> Result<Self, Self::Error> {
        let mut rates = VolumeRates::default();
        for (kind, value) in VehicleKind::ALL.into_iter().zip(values) {
            if value < 0 {
                return Err(ConfigError::NegativeRate { kind, value });
            }
            let rate = u32::try_from(value).map_err(|_| ConfigError::RateTooLarge {
                kind,
                value,
                max: u32::MAX,
            })?;
            rates.set(kind, rate);
        }
        Ok(rates)
    }
}

/// A live reference from a traffic volume to a point group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GroupBinding {
    /// The group's ID within the simulation.
    pub id: PointGroupId,
    /// The group's stable key.
    pub key: StableKey,
}

impl From<&PointGroup> for GroupBinding {
    fn from(group: &PointGroup) -> Self {
        Self {
            id: group.id(),
            key: group.key(),
        }
    }
}

/// The traffic demand from one point group to another.
///
/// Each tick, vehicles are born according to the hourly rates and join the
/// back of a queue. The vehicle at the front of the queue is then offered to
/// the network; it stays at the front until the network accepts it.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrafficVolume {
    /// The hourly rates.
    rates: VolumeRates,
    /// The points vehicles enter the network at.
    #[cfg_attr(feature = "serde", serde(skip))]
    start: Option<GroupBinding>,
    /// The points vehicles are routed towards.
    #[cfg_attr(feature = "serde", serde(skip))]
    destination: Option<GroupBinding>,
    /// The persisted stand-in for `start`.
    #[cfg_attr(feature = "serde", serde(default = "unbound_key"))]
    start_key: StableKey,
    /// The persisted stand-in for `destination`.
    #[cfg_attr(feature = "serde", serde(default = "unbound_key"))]
    destination_key: StableKey,
    /// Vehicles that have been born but not yet admitted, oldest first.
    #[cfg_attr(feature = "serde", serde(skip))]
    queue: VecDeque<Vehicle>,
    /// The number of vehicles born.
    #[cfg_attr(feature = "serde", serde(skip))]
    born: u64,
    /// The number of vehicles admitted to the network.
    #[cfg_attr(feature = "serde", serde(skip))]
    admitted: u64,
}

#[cfg(feature = "serde")]
fn unbound_key() -> StableKey {
    UNBOUND_KEY
}

impl Default for TrafficVolume {
    /// Creates an unbound traffic volume with all rates zero.
    /// It stays inert until both of its point groups are bound.
    fn default() -> Self {
        Self {
            rates: VolumeRates::default(),
            start: None,
            destination: None,
            start_key: UNBOUND_KEY,
            destination_key: UNBOUND_KEY,
            queue: VecDeque::new(),
            born: 0,
            admitted: 0,
        }
    }
}

impl TrafficVolume {
    /// Creates a traffic volume between two point groups, with all rates zero.
    pub fn new(start: &PointGroup, destination: &PointGroup) -> Self {
        Self {
            start: Some(start.into()),
            destination: Some(destination.into()),
            ..Default::default()
        }
    }

    /// Gets the hourly rates.
    pub fn rates(&self) -> VolumeRates {
        self.rates
    }

    /// Sets all four hourly rates at once.
    pub fn set_rates(&mut self, rates: VolumeRates) {
        self.rates = rates;
    }

    /// Gets the hourly rate of the given vehicle kind.
    pub fn rate(&self, kind: VehicleKind) -> u32 {
        self.rates.get(kind)
    }

    /// Sets the hourly rate of the given vehicle kind.
    pub fn set_rate(&mut self, kind: VehicleKind, rate: u32) {
        self.rates.set(kind, rate);
    }

    /// Cars per hour.
    pub fn cars(&self) -> u32 {
        self.rates.cars
    }

    /// Sets the number of cars per hour.
    pub fn set_cars(&mut self, rate: u32) {
        self.rates.cars = rate;
    }

    /// Trucks per hour.
    pub fn trucks(&self) -> u32 {
        self.rates.trucks
    }

    /// Sets the number of trucks per hour.
    pub fn set_trucks(&mut self, rate: u32) {
        self.rates.trucks = rate;
    }

    /// Buses per hour.
    pub fn buses(&self) -> u32 {
        self.rates.buses
    }

    /// Sets the number of buses per hour.
    pub fn set_buses(&mut self, rate: u32) {
        self.rates.buses = rate;
    }

    /// Trams per hour.
    pub fn trams(&self) -> u32 {
        self.rates.trams
    }

    /// Sets the number of trams per hour.
    pub fn set_trams(&mut self, rate: u32) {
        self.rates.trams = rate;
    }

    /// The group vehicles enter the network from, if bound.
    pub fn start(&self) -> Option<GroupBinding> {
        self.start
    }

    /// The group vehicles are routed towards, if bound.
    pub fn destination(&self) -> Option<GroupBinding> {
        self.destination
    }

    /// Binds the group vehicles enter the network from.
    pub fn set_start(&mut self, group: &PointGroup) {
        self.start = Some(group.into());
    }

    /// Binds the group vehicles are routed towards.
    pub fn set_destination(&mut self, group: &PointGroup) {
        self.destination = Some(group.into());
    }

    /// Unbinds any side referencing the given group.
    pub(crate) fn unbind_group(&mut self, id: PointGroupId) {
        if self.start.map_or(false, |b| b.id == id) {
            self.start = None;
        }
        if self.destination.map_or(false, |b| b.id == id) {
            self.destination = None;
        }
    }

    /// Whether both point groups are bound. Unbound volumes never
    /// generate or admit vehicles.
    pub fn is_bound(&self) -> bool {
        self.start.is_some() && self.destination.is_some()
    }

    /// The number of vehicles waiting to enter the network.
    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    /// Returns an iterator over the waiting vehicles, oldest first.
    pub fn iter_queued(&self) -> impl Iterator<Item = &Vehicle> {
        self.queue.iter()
    }

    /// The number of vehicles born since the volume was created or loaded.
    pub fn born(&self) -> u64 {
        self.born
    }

    /// The number of vehicles admitted since the volume was created or loaded.
    pub fn admitted(&self) -> u64 {
        self.admitted
    }

    /// The persisted keys of the start and destination groups.
    pub fn saved_keys(&self) -> (StableKey, StableKey) {
        (self.start_key, self.destination_key)
    }

    /// Records the stable keys of the bound groups so they can be
    /// persisted in place of the references themselves.
    /// Must be called before the volume is serialized.
    pub fn prepare_for_save(&mut self) {
        self.start_key = self.start.map_or(UNBOUND_KEY, |b| b.key);
        self.destination_key = self.destination.map_or(UNBOUND_KEY, |b| b.key);
    }

    /// Rebinds the point groups from the persisted keys after loading.
    ///
    /// A key with no matching group leaves that side unbound; the caller
    /// should check [TrafficVolume::is_bound].
    ///
    /// # Parameters
    /// * `version` - The save format version the volume was read from
    /// * `start_groups` - All groups vehicles may enter from
    /// * `destination_groups` - All groups vehicles may be routed towards
    pub fn recover_from_load<'a>(
        &mut self,
        version: u32,
        start_groups: impl IntoIterator<Item = &'a PointGroup>,
        destination_groups: impl IntoIterator<Item = &'a PointGroup>,
    ) {
        // Every save version so far persists the same pair of keys.
        log::trace!("recovering traffic volume from save version {}", version);
        self.start = find_group(start_groups, self.start_key);
        self.destination = find_group(destination_groups, self.destination_key);
    }

    /// Offers the vehicle at the front of the queue to the network.
    /// Returns whether it was admitted.
    fn admit_next<N, R>(
        &mut self,
        start: &PointGroup,
        destination: &PointGroup,
        network: &mut N,
        rng: &mut R,
    ) -> bool
    where
        N: Network + ?Sized,
        R: Rng + ?Sized,
    {
        if self.queue.is_empty() {
            return false;
        }

        let Some(&point) = start.points().choose(rng) else {
            return false;
        };
        let Some(&connection) = network.outgoing_connections(point).choose(rng) else {
            log::trace!("no connection out of {:?}", point);
            return false;
        };
        let Some(mut vehicle) = self.queue.pop_front() else {
            return false;
        };

        vehicle.place(connection, network.target_velocity(connection));
        match network.try_admit(connection, vehicle) {
            Ok(vehicle_id) => {
                network.set_vehicle_targets(vehicle_id, destination.points());
                self.admitted += 1;
                log::debug!("admitted {:?} onto {:?}", vehicle_id, connection);
                true
            }
            Err(vehicle) => {
                self.queue.push_front(vehicle);
                log::trace!("{:?} is full, {} vehicles queued", connection, self.queue.len());
                false
            }
        }
    }
}

/// Finds the last group with the given key.
fn find_group<'a>(
    groups: impl IntoIterator<Item = &'a PointGroup>,
    key: StableKey,
) -> Option<GroupBinding> {
    if key == UNBOUND_KEY {
        return None;
    }
    let found = groups.into_iter().filter(|g| g.key() == key).last();
    if found.is_none() {
        log::warn!("no point group with key {}, leaving reference unbound", key);
    }
    found.map(GroupBinding::from)
}

impl Tickable for TrafficVolume {
    fn tick(&mut self, dt: f64, ctx: &mut TickContext<'_>) {
        let (Some(start), Some(destination)) = (self.start, self.destination) else {
            return;
        };
        let groups = ctx.groups;
        let (Some(start), Some(destination)) = (groups.get(start.id), groups.get(destination.id))
        else {
            return;
        };

        for kind in arrival::generate(dt, &self.rates, ctx.demand_multiplier, &mut *ctx.rng) {
            log::trace!("{} born", kind);
            self.queue.push_back(Vehicle::new(kind));
            self.born += 1;
        }

        self.admit_next(start, destination, &mut *ctx.network, &mut *ctx.rng);
    }

    fn reset(&mut self) {
        // Nothing to clean up between rounds
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::math::Point2d;
    use crate::network::{ConnectionAttributes, RoadNetwork};
    use crate::{ConnectionId, PointGroupSet, PointId, VehicleId};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use slotmap::SlotMap;

    /// A network with a single entry connection that only admits vehicles
    /// while its gate is open.
    struct GatedNetwork {
        connections: Vec<ConnectionId>,
        open: bool,
        vehicles: SlotMap<VehicleId, Vehicle>,
        order: Vec<VehicleId>,
    }

    impl GatedNetwork {
        fn new(open: bool) -> Self {
            let mut ids = SlotMap::<ConnectionId, ()>::with_key();
            Self {
                connections: vec![ids.insert(())],
                open,
                vehicles: SlotMap::with_key(),
                order: vec![],
            }
        }

        fn admitted_kinds(&self) -> Vec<VehicleKind> {
            self.order.iter().map(|id| self.vehicles[*id].kind()).collect()
        }
    }

    impl Network for GatedNetwork {
        fn outgoing_connections(&self, _point: PointId) -> &[ConnectionId] {
            &self.connections
        }

        fn target_velocity(&self, _connection: ConnectionId) -> f64 {
            12.5
        }

        fn try_admit(
            &mut self,
            _connection: ConnectionId,
            vehicle: Vehicle,
        ) -> Result<VehicleId, Vehicle> {
            if !self.open {
                return Err(vehicle);
            }
            let id = self.vehicles.insert(vehicle);
            self.order.push(id);
            Ok(id)
        }

        fn set_vehicle_targets(&mut self, vehicle_id: VehicleId, targets: &[PointId]) {
            self.vehicles[vehicle_id].set_targets(targets);
        }
    }

    fn groups(start: &[PointId], destination: &[PointId]) -> (PointGroupSet, PointGroupId, PointGroupId) {
        let mut groups = PointGroupSet::with_key();
        let a = groups.insert_with_key(|id| PointGroup::new(id, 1, "start", start));
        let b = groups.insert_with_key(|id| PointGroup::new(id, 2, "destination", destination));
        (groups, a, b)
    }

    fn tick(
        volume: &mut TrafficVolume,
        dt: f64,
        groups: &PointGroupSet,
        network: &mut dyn Network,
        rng: &mut StdRng,
    ) {
        let mut ctx = TickContext {
            groups,
            network,
            rng,
            demand_multiplier: 1.0,
        };
        volume.tick(dt, &mut ctx);
        volume.reset();
    }

    fn dummy_points(n: usize) -> Vec<PointId> {
        let mut net = RoadNetwork::new();
        (0..n).map(|i| net.add_point(Point2d::new(i as f64, 0.0))).collect()
    }

    #[test]
    fn negative_rates_rejected() {
        let err = VolumeRates::try_from([10, 0, -5, 0]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NegativeRate {
                kind: VehicleKind::Bus,
                value: -5
            }
        ));
        let rates = VolumeRates::try_from([10, 20, 0, 40]).unwrap();
        assert_eq!(rates, VolumeRates::new(10, 20, 0, 40));
        assert_eq!(rates.total(), 70);
    }

    #[test]
    fn rate_accessors() {
        let mut volume = TrafficVolume::default();
        volume.set_cars(100);
        volume.set_trucks(20);
        volume.set_buses(6);
        volume.set_trams(4);
        assert_eq!(volume.rates(), VolumeRates::new(100, 20, 6, 4));
        volume.set_rate(VehicleKind::Truck, 0);
        assert_eq!(volume.trucks(), 0);
        assert_eq!(volume.rate(VehicleKind::Car), 100);
        volume.set_rates(VolumeRates::new(1, 2, 3, 4));
        assert_eq!(
            (volume.cars(), volume.trucks(), volume.buses(), volume.trams()),
            (1, 2, 3, 4)
        );
    }

    #[test]
    fn certain_arrival_every_tick() {
        let points = dummy_points(2);
        let (groups, a, b) = groups(&points[..1], &points[1..]);
        let mut volume = TrafficVolume::new(&groups[a], &groups[b]);
        volume.set_cars(3600);
        let mut network = GatedNetwork::new(false);
        let mut rng = StdRng::seed_from_u64(7);

        for i in 1..=50 {
            tick(&mut volume, 1.0, &groups, &mut network, &mut rng);
            assert_eq!(volume.born(), i);
            assert_eq!(volume.queued_len(), i as usize);
        }
    }

    #[test]
    fn rejected_vehicles_are_kept() {
        let points = dummy_points(2);
        let (groups, a, b) = groups(&points[..1], &points[1..]);
        let mut volume = TrafficVolume::new(&groups[a], &groups[b]);
        volume.set_rates(VolumeRates::new(1800, 900, 600, 300));
        let mut network = GatedNetwork::new(false);
        let mut rng = StdRng::seed_from_u64(8);

        for _ in 0..500 {
            let before = volume.queued_len();
            let born_before = volume.born();
            tick(&mut volume, 1.0, &groups, &mut network, &mut rng);
            let births = (volume.born() - born_before) as usize;
            assert!(births <= 4);
            assert_eq!(volume.queued_len(), before + births);
        }
        assert_eq!(volume.admitted(), 0);
        assert_eq!(volume.queued_len() as u64, volume.born());
        assert!(network.order.is_empty());
    }

    #[test]
    fn admits_in_birth_order() {
        let points = dummy_points(2);
        let (groups, a, b) = groups(&points[..1], &points[1..]);
        let mut volume = TrafficVolume::new(&groups[a], &groups[b]);
        volume.set_rates(VolumeRates::new(1200, 1200, 1200, 1200));
        let mut network = GatedNetwork::new(false);
        let mut rng = StdRng::seed_from_u64(9);

        for _ in 0..200 {
            tick(&mut volume, 1.0, &groups, &mut network, &mut rng);
        }
        let queued: Vec<_> = volume.iter_queued().map(|v| v.kind()).collect();
        assert!(!queued.is_empty());

        // Open the gate and stop generating; one vehicle is admitted per tick
        volume.set_rates(VolumeRates::default());
        network.open = true;
        for i in 1..=queued.len() {
            tick(&mut volume, 1.0, &groups, &mut network, &mut rng);
            assert_eq!(volume.admitted(), i as u64);
        }
        assert_eq!(volume.queued_len(), 0);
        assert_eq!(network.admitted_kinds(), queued);
    }

    #[test]
    fn admitted_vehicle_is_routed() {
        let points = dummy_points(3);
        let (groups, a, b) = groups(&points[..1], &points[1..]);
        let mut volume = TrafficVolume::new(&groups[a], &groups[b]);
        volume.set_buses(3600);
        let mut network = GatedNetwork::new(true);
        let mut rng = StdRng::seed_from_u64(10);

        tick(&mut volume, 1.0, &groups, &mut network, &mut rng);
        assert_eq!(volume.admitted(), 1);
        let vehicle = &network.vehicles[network.order[0]];
        assert_eq!(vehicle.kind(), VehicleKind::Bus);
        assert_eq!(vehicle.targets(), &points[1..]);
        assert_eq!(vehicle.connection_id(), Some(network.connections[0]));
        assert_eq!(vehicle.pos_front(), 0.0);
        assert_eq!(vehicle.physics().velocity, 12.5);
        assert_eq!(vehicle.physics().target_velocity, 12.5);
        assert_eq!(vehicle.physics().acceleration, 0.0);
    }

    #[test]
    fn dead_end_start_never_admits() {
        let mut network = RoadNetwork::new();
        let start = network.add_point(Point2d::new(0.0, 0.0));
        let other = network.add_point(Point2d::new(50.0, 0.0));
        let end = network.add_point(Point2d::new(100.0, 0.0));
        // Leads into the start point, never out of it
        network.add_connection(&ConnectionAttributes {
            from: other,
            to: start,
            target_velocity: 10.0,
            capacity: 10,
        });
        let (groups, a, b) = groups(&[start], &[end]);
        let mut volume = TrafficVolume::new(&groups[a], &groups[b]);
        volume.set_rates(VolumeRates::new(3600, 360, 0, 0));
        let mut rng = StdRng::seed_from_u64(11);

        for _ in 0..1000 {
            tick(&mut volume, 1.0, &groups, &mut network, &mut rng);
            assert_eq!(volume.queued_len() as u64, volume.born());
        }
        assert_eq!(volume.admitted(), 0);
        assert_eq!(network.iter_vehicles().count(), 0);
    }

    #[test]
    fn unbound_volume_is_inert() {
        let points = dummy_points(2);
        let (groups, a, _) = groups(&points[..1], &points[1..]);
        let mut volume = TrafficVolume::default();
        volume.set_cars(3600);
        volume.set_start(&groups[a]);
        let mut network = GatedNetwork::new(true);
        let mut rng = StdRng::seed_from_u64(12);

        for _ in 0..10 {
            tick(&mut volume, 1.0, &groups, &mut network, &mut rng);
        }
        assert!(!volume.is_bound());
        assert_eq!(volume.born(), 0);
        assert!(network.order.is_empty());
    }

    #[test]
    fn save_then_recover_restores_bindings() {
        let points = dummy_points(2);
        let (groups, a, b) = groups(&points[..1], &points[1..]);
        let mut volume = TrafficVolume::new(&groups[a], &groups[b]);
        let (start, destination) = (volume.start(), volume.destination());

        volume.prepare_for_save();
        assert_eq!(volume.saved_keys(), (1, 2));

        let all: Vec<&PointGroup> = groups.values().collect();
        volume.recover_from_load(1, all.iter().copied(), all.iter().copied());
        assert_eq!(volume.start(), start);
        assert_eq!(volume.destination(), destination);
        assert!(volume.is_bound());
    }

    #[test]
    fn missing_group_left_unbound() {
        let points = dummy_points(2);
        let (groups, a, b) = groups(&points[..1], &points[1..]);
        let mut volume = TrafficVolume::new(&groups[a], &groups[b]);
        volume.prepare_for_save();

        let starts = [&groups[a]];
        let destinations = [&groups[a]];
        volume.recover_from_load(1, starts, destinations);
        assert_eq!(volume.start().map(|s| s.id), Some(a));
        assert_eq!(volume.destination(), None);
        assert!(!volume.is_bound());
    }

    #[test]
    fn unbound_sides_save_as_unbound() {
        let mut volume = TrafficVolume::default();
        volume.prepare_for_save();
        assert_eq!(volume.saved_keys(), (UNBOUND_KEY, UNBOUND_KEY));
    }
}
