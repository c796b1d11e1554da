
pub mod types;
pub mod cipher;
pub mod digest;
pub mod kdf;
pub mod registry;

pub use types::*;
pub use cipher::{Sealed, StreamDecryptor, StreamEncryptor};
pub use digest::{digest, DigestState, MacState};
pub use kdf::*;
pub use registry::{CipherAlgorithm, HashAlgorithm, ParameterSpec};
