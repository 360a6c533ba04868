use std::fmt;

use preat_frame::{method_name, ParamKind, START_ASSERTION, START_ASSERTION_SIGNATURE};
use tracing::{debug, warn};

use crate::builtin::StartAssertion;
use crate::config::RegistryConfig;
use crate::handler::Handler;

/// Whether a method drives the target or observes it.
///
/// Output methods are the trigger of an open assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Output,
    Input,
}

impl Direction {
    pub fn is_output(self) -> bool {
        self == Direction::Output
    }
}

/// A registered method.
pub struct HandlerDescriptor {
    pub id: u16,
    pub direction: Direction,
    pub handler: Box<dyn Handler>,
    /// Declared parameter kinds; a `ParamKind::Undefined` entry ends the list.
    pub signature: &'static [ParamKind],
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("id", &format_args!("0x{:03x}", self.id))
            .field("direction", &self.direction)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// Append-only table of methods, with built-ins searched first.
///
/// Duplicate ids are accepted; lookups return the first registered match.
pub struct MethodRegistry {
    builtins: Vec<HandlerDescriptor>,
    pool: Vec<HandlerDescriptor>,
    config: RegistryConfig,
}

impl MethodRegistry {
    /// Create a registry with default config and the built-in methods.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a registry with explicit config and the built-in methods.
    pub fn with_config(config: RegistryConfig) -> Self {
        let builtins = vec![HandlerDescriptor {
            id: START_ASSERTION,
            direction: Direction::Input,
            handler: Box::new(StartAssertion),
            signature: START_ASSERTION_SIGNATURE,
        }];
        Self {
            builtins,
            pool: Vec::with_capacity(config.capacity),
            config,
        }
    }

    /// Register a user method. Returns false only when the pool is full.
    pub fn register<H>(
        &mut self,
        id: u16,
        direction: Direction,
        handler: H,
        signature: &'static [ParamKind],
    ) -> bool
    where
        H: Handler + 'static,
    {
        if self.pool.len() >= self.config.capacity {
            warn!(
                id,
                capacity = self.config.capacity,
                "method registry full"
            );
            return false;
        }
        if self.find(id).is_some() {
            debug!(id, "method id registered again; earlier entry keeps precedence");
        }
        self.pool.push(HandlerDescriptor {
            id,
            direction,
            handler: Box::new(handler),
            signature,
        });
        debug!(id, name = method_name(id), ?direction, "method registered");
        true
    }

    /// Find the method for `id`: built-ins first, then in registration order.
    pub fn find(&self, id: u16) -> Option<&HandlerDescriptor> {
        self.builtins
            .iter()
            .chain(self.pool.iter())
            .find(|descriptor| descriptor.id == id)
    }

    /// Number of user-registered methods.
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// All methods in lookup order.
    pub fn iter(&self) -> impl Iterator<Item = &HandlerDescriptor> {
        self.builtins.iter().chain(self.pool.iter())
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodRegistry")
            .field("methods", &self.pool.len())
            .field("capacity", &self.config.capacity)
            .finish()
    }
}
