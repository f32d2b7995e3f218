//! Collaborator health probing
//!
//! Reachability is recomputed at every iteration boundary and never cached.

mod probe;

pub use probe::{HealthProbe, HttpHealthProbe, ScriptedProbe, check_endpoint};
