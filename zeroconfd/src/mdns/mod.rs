pub mod browser;
pub mod connector;
pub mod error;
pub mod publish;
pub mod socket;
