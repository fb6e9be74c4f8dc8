use thiserror::Error;

use conciliar_core::TableError;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}
