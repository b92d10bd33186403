pub mod command;
pub mod config;
pub mod controller;
pub mod draft;
pub mod gate;
pub mod mode;
pub mod projection;
pub mod snapshot;
pub mod topics;
pub mod types;
pub mod view;

pub use command::{CommandRejected, OverrideDuration, ZoneCommand};
pub use config::{CardConfig, CardSettings, ConfigError, NetworkConfig, RuntimeConfig};
pub use controller::{IssuedCommand, SnapshotOutcome, ZoneController};
pub use draft::Draft;
pub use gate::{AttemptId, CommandGate, Expectation, WindowOutcome, COMMAND_DEADLINE_MS};
pub use mode::{ZoneAction, ZoneMode};
pub use projection::StatusProjection;
pub use snapshot::ZoneSnapshot;
pub use topics::*;
pub use types::{HvacMode, SetpointMode};
pub use view::{CardView, ZoneView};
