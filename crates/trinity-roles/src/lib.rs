//! WITNESS / ARCHITECT / EXECUTOR — the three cooperative workers of the
//! Trinity core (§4.5). Each role is a stateless loop over one of the bus's
//! queues; all coordination and learned state lives in `trinity-bus`,
//! `trinity-patterns`, and `trinity-cost`, never in these structs (§9:
//! "stateless roles with global state in stores").

pub mod architect;
pub mod config;
pub mod detector;
pub mod error;
pub mod executor;
pub mod signal;
pub mod witness;

pub use architect::{Architect, ArchitectStats};
pub use config::{ArchitectConfig, ExecutorConfig, WitnessConfig};
pub use detector::{Detection, DetectorError, PatternDetector, StubPatternDetector};
pub use error::{PlanningError, Result, RoleError};
pub use executor::{Executor, ExecutorStats};
pub use signal::{Signal, SignalData};
pub use witness::{Witness, WitnessStats};
