// Shutter Tester Core - photosensor shutter speed measurement
// Calibration, edge timing, speed classification and raw trace capture

// Module declarations
pub mod calibration;
pub mod classifier;
pub mod clock;
pub mod config;
pub mod error;
pub mod monitor;
pub mod prompt;
pub mod sensor;
pub mod session;
pub mod signal;
pub mod testing;
pub mod timing;
pub mod trace;

// Re-exports for convenience
pub use calibration::{CalibrationResult, ThresholdStrategy};
pub use classifier::{NominalSpeed, ShutterReading, SpeedTable};
pub use config::AppConfig;
pub use session::{ProfileReport, Session};
pub use signal::StopSignal;
pub use timing::{Measurement, Polarity};
pub use trace::{TraceRecord, TraceRecorder};

use tracing_subscriber::EnvFilter;

/// Install the stderr log subscriber.
///
/// `RUST_LOG` takes precedence over `default_directive`. Calling this more
/// than once is harmless; later calls are ignored.
pub fn init_logging(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
