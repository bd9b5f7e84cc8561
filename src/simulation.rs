use crate::error::ConfigError;
use crate::group::{PointGroup, StableKey, UNBOUND_KEY};
use crate::network::RoadNetwork;
use crate::tick::{TickContext, Tickable};
use crate::volume::TrafficVolume;
use crate::{PointGroupId, PointGroupSet, PointId, VolumeId};
use rand::rngs::StdRng;
use rand::SeedableRng;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

/// The configuration of a simulation.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct SimulationConfig {
    /// Seeds the random number generator. Without a seed, it is seeded from entropy.
    pub seed: Option<u64>,
    /// Scales the hourly rates of every traffic volume.
    pub demand_multiplier: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: None,
            demand_multiplier: 1.0,
        }
    }
}

impl SimulationConfig {
    /// Parses and validates a configuration from JSON.
    /// Missing fields take their default values.
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the configuration is meaningful.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.demand_multiplier.is_finite() || self.demand_multiplier < 0.0 {
            return Err(ConfigError::InvalidMultiplier(self.demand_multiplier));
        }
        Ok(())
    }
}

/// A traffic demand simulation: a road network, the point groups
/// within it, and the traffic volumes feeding vehicles into it.
pub struct Simulation {
    /// The road network.
    network: RoadNetwork,
    /// The point groups.
    groups: PointGroupSet,
    /// The traffic volumes, ticked in insertion order.
    volumes: SlotMap<VolumeId, TrafficVolume>,
    /// The source of all randomness in the simulation.
    rng: StdRng,
    /// The configuration.
    config: SimulationConfig,
    /// The stable key given to the next point group.
    next_key: StableKey,
    /// The current frame of simulation.
    frame: usize,
    /// The simulated time in s.
    time: f64,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}

impl Simulation {
    /// Creates a new, empty simulation.
    pub fn new(config: SimulationConfig) -> Self {
        Self::with_network(config, RoadNetwork::new())
    }

    /// Creates a simulation around an existing network.
    pub fn with_network(config: SimulationConfig, network: RoadNetwork) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            network,
            groups: PointGroupSet::with_key(),
            volumes: SlotMap::with_key(),
            rng,
            config,
            next_key: 0,
            frame: 0,
            time: 0.0,
        }
    }

    /// Gets the configuration.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Sets the factor every hourly rate is scaled by.
    pub fn set_demand_multiplier(&mut self, multiplier: f64) -> Result<(), ConfigError> {
        let config = SimulationConfig {
            demand_multiplier: multiplier,
            ..self.config.clone()
        };
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Gets a reference to the road network.
    pub fn network(&self) -> &RoadNetwork {
        &self.network
    }

    /// Gets a mutable reference to the road network.
    pub fn network_mut(&mut self) -> &mut RoadNetwork {
        &mut self.network
    }

    /// Adds a point group, giving it the next free stable key.
    pub fn add_point_group(&mut self, title: &str, points: &[PointId]) -> PointGroupId {
        let key = self.take_key();
        self.groups
            .insert_with_key(|id| PointGroup::new(id, key, title, points))
    }

    /// Hands out the next stable key.
    fn take_key(&mut self) -> StableKey {
        let key = self.next_key;
        self.next_key = self.next_key.saturating_add(1);
        key
    }

    /// Replaces the member points of a point group.
    pub fn set_point_group_points(&mut self, id: PointGroupId, points: &[PointId]) {
        if let Some(group) = self.groups.get_mut(id) {
            group.set_points(points);
        }
    }

    /// Removes a point group. Traffic volumes that referenced it become unbound.
    pub fn remove_point_group(&mut self, id: PointGroupId) -> Option<PointGroup> {
        let group = self.groups.remove(id)?;
        for volume in self.volumes.values_mut() {
            volume.unbind_group(id);
        }
        Some(group)
    }

    /// Gets a reference to the point group with the given ID.
    pub fn get_point_group(&self, id: PointGroupId) -> Option<&PointGroup> {
        self.groups.get(id)
    }

    /// Returns an iterator over all the point groups.
    pub fn iter_point_groups(&self) -> impl Iterator<Item = &PointGroup> {
        self.groups.values()
    }

    /// Adds a traffic volume between two point groups, with all rates zero.
    /// Returns `None` if either group does not exist.
    pub fn add_volume(
        &mut self,
        start: PointGroupId,
        destination: PointGroupId,
    ) -> Option<VolumeId> {
        let start = self.groups.get(start)?;
        let destination = self.groups.get(destination)?;
        Some(self.volumes.insert(TrafficVolume::new(start, destination)))
    }

    /// Removes a traffic volume, discarding any vehicles still waiting in it.
    pub fn remove_volume(&mut self, id: VolumeId) -> Option<TrafficVolume> {
        self.volumes.remove(id)
    }

    /// Gets a reference to the traffic volume with the given ID.
    pub fn volume(&self, id: VolumeId) -> Option<&TrafficVolume> {
        self.volumes.get(id)
    }

    /// Gets a mutable reference to the traffic volume with the given ID.
    pub fn volume_mut(&mut self, id: VolumeId) -> Option<&mut TrafficVolume> {
        self.volumes.get_mut(id)
    }

    /// Returns an iterator over all the traffic volumes.
    pub fn iter_volumes(&self) -> impl Iterator<Item = (VolumeId, &TrafficVolume)> {
        self.volumes.iter()
    }

    /// The number of vehicles waiting to enter the network, across all volumes.
    pub fn queued_len(&self) -> usize {
        self.volumes.values().map(|v| v.queued_len()).sum()
    }

    /// Gets the current simulation frame index.
    pub fn frame(&self) -> usize {
        self.frame
    }

    /// Gets the simulated time in s.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Advances the simulation by `dt` seconds.
    ///
    /// Vehicles already in the network move first, then every traffic
    /// volume generates arrivals and admits at most one vehicle.
    ///
    /// A `dt` that is not a positive, finite number (a paused simulation)
    /// neither moves vehicles nor advances time; volumes still attempt
    /// to admit their queued vehicles.
    pub fn step(&mut self, dt: f64) {
        if !(dt > 0.0 && dt.is_finite()) {
            self.tick_volumes(0.0);
            return;
        }
        self.network.step(dt);
        self.tick_volumes(dt);
        self.frame += 1;
        self.time += dt;
    }

    /// Ticks, then resets, every traffic volume.
    fn tick_volumes(&mut self, dt: f64) {
        let mut ctx = TickContext {
            groups: &self.groups,
            network: &mut self.network,
            rng: &mut self.rng,
            demand_multiplier: self.config.demand_multiplier,
        };
        for volume in self.volumes.values_mut() {
            volume.tick(dt, &mut ctx);
        }
        for volume in self.volumes.values_mut() {
            volume.reset();
        }
    }

    /// Serializes the simulation as a JSON snapshot.
    ///
    /// Vehicles still waiting to enter the network are not saved.
    #[cfg(feature = "serde")]
    pub fn save_json(&mut self) -> Result<String, crate::SaveError> {
        for volume in self.volumes.values_mut() {
            volume.prepare_for_save();
        }
        let json = crate::save::write_snapshot(
            &self.network,
            self.groups.values(),
            self.volumes.values(),
        )?;
        log::debug!(
            "saved {} point groups and {} traffic volumes",
            self.groups.len(),
            self.volumes.len()
        );
        Ok(json)
    }

    /// Restores a simulation from a JSON snapshot.
    ///
    /// Traffic volumes whose point groups are missing from the snapshot
    /// are loaded unbound.
    #[cfg(feature = "serde")]
    pub fn load_json(json: &str, config: SimulationConfig) -> Result<Self, crate::SaveError> {
        let snapshot = crate::save::read_snapshot(json)?;
        snapshot
            .network
            .check_consistency()
            .map_err(crate::SaveError::Inconsistent)?;
        let mut sim = Self::with_network(config, snapshot.network);

        let highest = snapshot.groups.iter().map(|g| g.key()).max();
        sim.next_key = match highest {
            Some(key) => key.max(UNBOUND_KEY).checked_add(1).ok_or_else(|| {
                crate::SaveError::Inconsistent(format!("no stable key follows {}", key))
            })?,
            None => 0,
        };

        for mut group in snapshot.groups {
            if group.key() == UNBOUND_KEY {
                // No saved reference can name the unbound key
                log::warn!("point group {:?} has no stable key, assigning one", group.title());
                group.set_key(sim.take_key());
            }
            sim.groups.insert_with_key(|id| {
                group.set_id(id);
                group
            });
        }

        for mut volume in snapshot.volumes {
            volume.recover_from_load(snapshot.version, sim.groups.values(), sim.groups.values());
            sim.volumes.insert(volume);
        }

        log::debug!(
            "loaded {} point groups and {} traffic volumes from save version {}",
            sim.groups.len(),
            sim.volumes.len(),
            snapshot.version
        );
        Ok(sim)
    }
}
