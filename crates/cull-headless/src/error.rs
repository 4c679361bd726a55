use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no suitable vulkan device found")]
    NoSuitableDeviceFound,
    #[error("the vulkan backend needs a compiled shader module, see --shader")]
    MissingShader,
    #[error("unknown backend {0:?}, expected reference or vulkan")]
    UnknownBackend(String),
    #[error("invalid resolution {0:?}, expected WIDTHxHEIGHT")]
    InvalidResolution(String),
}
