pub mod counter;
pub mod query_client;

pub use crate::domain::model::{CounterSync, RepoRecord};
pub use crate::domain::ports::{ConfigProvider, RepoMutator, RepoSource};
pub use crate::utils::error::Result;
