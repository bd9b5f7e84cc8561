//! The JSON snapshot format.
//!
//! Point groups and traffic volumes are stored side by side. A volume never
//! stores its groups directly; it stores their stable keys, written by
//! [crate::TrafficVolume::prepare_for_save] and resolved again by
//! [crate::TrafficVolume::recover_from_load] once every group has been read.

#[cfg(feature = "serde")]
use crate::{error::SaveError, group::PointGroup, network::RoadNetwork, volume::TrafficVolume};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The current snapshot format version.
pub const SAVE_VERSION: u32 = 1;

/// A snapshot as written.
#[cfg(feature = "serde")]
#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    network: &'a RoadNetwork,
    groups: Vec<&'a PointGroup>,
    volumes: Vec<&'a TrafficVolume>,
}

/// A snapshot as read.
#[cfg(feature = "serde")]
#[derive(Deserialize)]
pub(crate) struct Snapshot {
    pub version: u32,
    pub network: RoadNetwork,
    pub groups: Vec<PointGroup>,
    pub volumes: Vec<TrafficVolume>,
}

/// Just enough of a snapshot to check whether it can be read.
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct Header {
    version: u32,
}

/// Serializes a snapshot. The volumes must already be prepared for saving.
#[cfg(feature = "serde")]
pub(crate) fn write_snapshot<'a>(
    network: &'a RoadNetwork,
    groups: impl IntoIterator<Item = &'a PointGroup>,
    volumes: impl IntoIterator<Item = &'a TrafficVolume>,
) -> Result<String, SaveError> {
    let snapshot = SnapshotRef {
        version: SAVE_VERSION,
        network,
        groups: groups.into_iter().collect(),
        volumes: volumes.into_iter().collect(),
    };
    Ok(serde_json::to_string(&snapshot)?)
}

/// Deserializes a snapshot, rejecting versions newer than this build.
#[cfg(feature = "serde")]
pub(crate) fn read_snapshot(json: &str) -> Result<Snapshot, SaveError> {
    let header: Header = serde_json::from_str(json)?;
    if header.version > SAVE_VERSION {
        return Err(SaveError::FutureVersion(header.version));
    }
    Ok(serde_json::from_str(json)?)
}
