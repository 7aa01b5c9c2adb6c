//! Timeouts - Per-operation deadlines for provider calls

use std::future::Future;
use std::time::Duration;

use crate::provider::{ProviderError, ProviderResult};
use crate::resource::ResourceId;

/// Kind of provider operation a timeout applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// Timeouts for each operation of a resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: minutes(30),
            read: minutes(5),
            update: minutes(30),
            delete: minutes(30),
        }
    }
}

impl Timeouts {
    pub fn new(create: Duration, read: Duration, update: Duration, delete: Duration) -> Self {
        Self {
            create,
            read,
            update,
            delete,
        }
    }

    pub fn for_operation(&self, op: Operation) -> Duration {
        match op {
            Operation::Create => self.create,
            Operation::Read => self.read,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        }
    }

    /// Run `fut`, failing with a timeout error once the operation deadline passes
    pub async fn run<T, F>(&self, op: Operation, id: &ResourceId, fut: F) -> ProviderResult<T>
    where
        F: Future<Output = ProviderResult<T>>,
    {
        let limit = self.for_operation(op);
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::timeout(format!(
                "timed out after {:?} waiting to {} {}",
                limit, op, id
            ))
            .for_resource(id.clone())),
        }
    }
}

pub const fn minutes(m: u64) -> Duration {
    Duration::from_secs(m * 60)
}

pub const fn hours(h: u64) -> Duration {
    Duration::from_secs(h * 3600)
}
