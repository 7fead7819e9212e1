// Library surface for headless/integration tests and reuse.
// Front-end types (App, screens) stay in the binary.
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod error;
pub mod exercise;
pub mod logging;
pub mod metrics;
pub mod profile;
pub mod runtime;
pub mod session;
pub mod store;
pub mod time_series;
pub mod trainer;
pub mod util;

pub use error::{ProfileError, SessionError, TrainerError};
pub use exercise::{Exercise, ExerciseManager};
pub use metrics::Metrics;
pub use session::{KeystrokeResult, SessionPhase, TypingSession};
pub use trainer::{ExerciseSelection, Trainer};
