//! Connection module
//!
//! This module handles all communication with the SAPHostControl service,
//! including session setup with transport fallback and SOAP envelope handling.

pub mod envelope;
pub mod transport;
