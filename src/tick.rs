use crate::network::Network;
use crate::PointGroupSet;
use rand::RngCore;

/// Everything an entity may touch while it is ticked.
pub struct TickContext<'a> {
    /// The point groups of the simulation.
    pub groups: &'a PointGroupSet,
    /// The network vehicles are admitted into.
    pub network: &'a mut dyn Network,
    /// The simulation's source of randomness.
    pub rng: &'a mut dyn RngCore,
    /// Scales every traffic volume's hourly rates.
    pub demand_multiplier: f64,
}

/// An entity that advances with simulated time.
pub trait Tickable {
    /// Notification that simulated time has advanced by `dt` seconds.
    fn tick(&mut self, dt: f64, ctx: &mut TickContext<'_>);

    /// Notification that every entity has been ticked for this round.
    fn reset(&mut self);
}
