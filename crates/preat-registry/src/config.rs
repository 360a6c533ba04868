/// Default number of user methods a registry can hold.
pub const DEFAULT_CAPACITY: usize = 128;

/// Controls method registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Maximum number of user-registered methods. Built-ins do not count.
    pub capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}
