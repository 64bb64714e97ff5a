//! 通用模块，包含算法标识、信封格式、配置、错误类型和工具函数

pub mod algorithm;
pub mod config;
pub mod envelope;
pub mod errors;
pub mod utils;

pub use self::algorithm::{Algorithm, AlgorithmFamily};
pub use self::config::{CryptoConfig, KmsConfig, StorageConfig};
pub use self::envelope::{EnvelopeHeader, EnvelopeKind};
pub use self::errors::{ProviderError, StoreError};
pub use self::utils::{Base64Bytes, ZeroizingVec};
