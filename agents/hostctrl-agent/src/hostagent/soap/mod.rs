//! SOAP Host Agent Module
//!
//! Provides the SAPHostControl SOAP implementation of the HostAgent trait.

pub mod adapter;

pub use adapter::SoapAdapter;
