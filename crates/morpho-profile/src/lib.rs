//! morpho-profile: circular boundary profiles and segmentation (sans-IO).
//!
//! Turns a closed outline into measurement profiles and a named, ordered
//! partition of segments bound to landmarks, then compares those
//! partitioned profiles across a population:
//! boundary -> profile -> landmarks -> segments -> population.
//!
//! Every index in this crate lives on a ring: index `len - 1` is next to
//! index `0`, and index arithmetic wraps (see [`ring`]).
//!
//! This crate has **no I/O dependencies**. Reading outlines from files
//! and reporting results lives in `morpho-bench`.

pub mod boundary;
pub mod cache;
pub mod diagnostics;
pub mod fit;
pub mod landmark;
pub mod measure;
pub mod outline;
pub mod partition;
pub mod population;
pub mod profile;
pub mod ring;
pub mod segment;
pub mod segmented;
pub mod types;

pub use boundary::Boundary;
pub use diagnostics::AggregateDiagnostics;
pub use fit::fit_segments;
pub use landmark::{Landmark, LandmarkMap, LandmarkMapState};
pub use measure::{ProfileKind, ProfileMeasure};
pub use outline::{OutlineState, ProfiledOutline};
pub use partition::{PartitionState, SegmentPartition};
pub use population::{
    Population, PopulationSummary, ProfileSample, Profileable, Similarity, Variability,
    composite_profile,
};
pub use profile::Profile;
pub use segment::{Segment, SegmentId};
pub use segmented::SegmentedProfile;
pub use types::{EngineConfig, Point, ProfileError, Result};
