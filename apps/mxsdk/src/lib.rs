#![warn(clippy::pedantic)]

//! # mxsdk
//!
//! Provisions Flex SDKs on demand and runs their `mxmlc` compiler.
//!
//! ```no_run
//! # async fn demo() -> Result<(), mxsdk::errors::SdkError> {
//! use mxsdk::sdk::{Provisioner, ProvisionerConfig, SdkCatalog, SdkPaths};
//!
//! let catalog = SdkCatalog::load("catalog.json".as_ref())?;
//! let paths = SdkPaths::with_root("/tmp/mxsdk".into());
//! let provisioner = Provisioner::new(catalog, paths, ProvisionerConfig::default());
//!
//! let sdk = provisioner.acquire("4.6.0").await?;
//! sdk.exec(["-version"]).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod errors;
pub mod sdk;
