use uuid::Uuid;

pub mod target;
pub mod subscription;
pub mod price_observation;

// Re-exports for convenience
pub use target::*;
pub use subscription::*;
pub use price_observation::*;

/// Lowest check cadence (in minutes) a subscription may request.
pub const MIN_CHECK_INTERVAL_MINUTES: u32 = 5;

/// Cadence used when a subscription does not ask for one.
pub const DEFAULT_CHECK_INTERVAL_MINUTES: u32 = 60;

// Helper function to generate UUIDs in the format expected by the database
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}
