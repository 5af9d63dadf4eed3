pub mod error;
pub mod installer;
pub mod source;
pub mod target;

pub use error::InstallError;
pub use installer::Installer;
