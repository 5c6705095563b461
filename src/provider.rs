pub use realtime::Identity;

/// Everything a vehicle session needs from its host.
pub trait Provider: tracking::Provider + Identity {}

impl<T> Provider for T where T: tracking::Provider + Identity {}
