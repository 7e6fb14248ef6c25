// MeterBridge: analog VU meter and 31-band RTA for a streaming telemetry backend
// Expose public modules for use in integration tests

pub mod config;
pub mod control;
pub mod pacer;
pub mod render;
pub mod signal;
pub mod smoothing;
pub mod term;
pub mod theme;
pub mod transport;
pub mod trig;
pub mod vframebuf;
pub mod wire;

// Re-export commonly used types for convenience
pub use config::{Config, ConfigError, Overrides};
pub use control::ControlClient;
pub use pacer::{AutoPacer, Pacer};
pub use render::Renderer;
pub use signal::{MeterMode, SignalSnapshot, SignalStore};
pub use smoothing::Needle;
pub use theme::{Skin, ThemeParams};
pub use transport::{ConnectionState, Transport, TransportConfig};
pub use vframebuf::VarFrameBuf;
pub use wire::InboundFrame;
