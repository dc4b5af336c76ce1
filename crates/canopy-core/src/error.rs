use crate::{
    backend::BackendError, cloner::CloneError, document::DocumentError, entity::ContainerError,
    schema::RegistryError, serialize::SerializeError, unserialize::UnserializeError,
    value::ConvertError, version::VersionError,
};
use thiserror::Error as ThisError;

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("local clone policy requires a bounding document")]
    LocalCloneWithoutDocument,

    #[error("unknown reference style '{0}'")]
    UnknownRefStyle(String),
}

///
/// Error
///
/// Top-level error, aggregating every engine concern transparently.
///

#[derive(Debug, ThisError)]
#[remain::sorted]
pub enum Error {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Clone(#[from] CloneError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Serialize(#[from] SerializeError),

    #[error(transparent)]
    Unserialize(#[from] UnserializeError),

    #[error(transparent)]
    Version(#[from] VersionError),
}
