//! Certification simulator backend: passcode login, profile registration, and
//! oracle-scored exam modules (reading, writing, listening, speaking).

pub mod config;
pub mod domain;
pub mod error;
pub mod logic;
pub mod normalize;
pub mod openai;
pub mod oracle;
pub mod otp;
pub mod policy;
pub mod protocol;
pub mod routes;
pub mod seeds;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod util;
