//! Completion-callback wrappers over the async API.
//!
//! For embedders that drive acquisition from callback-style code. The
//! callback is `FnOnce`, so it runs exactly once with the outcome.

use std::ffi::OsStr;

use crate::errors::SdkError;
use crate::sdk::download::Fetcher;
use crate::sdk::pipeline::{Preparer, Provisioner, SdkInstallation};

/// Acquires `version` and hands the result to `callback`.
pub async fn acquire_with_callback<F, P, C>(
    provisioner: &Provisioner<F, P>,
    version: &str,
    callback: C,
) where
    F: Fetcher,
    P: Preparer,
    C: FnOnce(Result<SdkInstallation, SdkError>),
{
    callback(provisioner.acquire(version).await);
}

/// Runs the compiler of `installation` and hands the result to `callback`.
pub async fn exec_with_callback<I, S, C>(installation: &SdkInstallation, args: I, callback: C)
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
    C: FnOnce(Result<(), SdkError>),
{
    callback(installation.exec(args).await);
}
