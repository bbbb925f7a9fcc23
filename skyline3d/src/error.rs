use thiserror::Error;

use crate::resources::ResourceId;

#[derive(Debug, Error)]
pub enum SkylineError {
    #[error("Resource {0:?} was already disposed")]
    AlreadyDisposed(ResourceId),
    #[error("Resource {0:?} is not registered")]
    UnknownResource(ResourceId),
    #[error("Couldn't parse skyline config: {0}")]
    Config(#[from] serde_json::Error),
}
