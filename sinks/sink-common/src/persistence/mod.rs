mod common;
#[cfg(test)]
mod default;

pub use self::common::PersistenceClient;
#[cfg(test)]
pub use self::default::InMemoryPersistence;

/// Persistence client boxed for use by the connector.
pub type BoxedPersistenceClient = Box<dyn PersistenceClient + Send + Sync>;
