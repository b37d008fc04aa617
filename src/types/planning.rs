//! Offline planning input

use serde::{Deserialize, Serialize};

use super::{OperatingWindowRow, PointRow, TripDescriptor};

/// Everything one scheduling run reads, as a single JSON document.
/// Used by the `plan` subcommand to reproduce a build outside the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningInput {
    pub trip: TripDescriptor,
    pub points: Vec<PointRow>,
    #[serde(default)]
    pub windows: Vec<OperatingWindowRow>,
}
