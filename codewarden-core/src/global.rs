//! Process-wide client registry.
//!
//! A thin convenience layer over an explicit [`Client`] for applications
//! that do not want to thread a handle through their code. Nothing here is
//! required: every operation is available on `Client` directly.
//!
//! License: MIT OR APACHE 2.0

use log::{info, warn};
use once_cell::sync::Lazy;
use std::error::Error as StdError;
use std::sync::{PoisonError, RwLock};

use crate::client::Client;
use crate::errors::{WardenError, WardenResult};
use crate::event::Level;
use crate::options::ClientOptions;
use crate::transport::FlushReport;

static GLOBAL_CLIENT: Lazy<RwLock<Option<Client>>> = Lazy::new(|| RwLock::new(None));

/// Creates a client and installs it as the global one. A previously
/// installed client is replaced; its queue is not drained.
pub fn init(options: ClientOptions) -> WardenResult<Client> {
    let client = Client::init(options)?;
    set_client(client.clone());
    Ok(client)
}

/// Installs an already-built client.
pub fn set_client(client: Client) {
    let mut slot = GLOBAL_CLIENT.write().unwrap_or_else(PoisonError::into_inner);
    if slot.replace(client).is_some() {
        warn!("Replacing an existing global CodeWarden client without closing it.");
    }
}

pub fn client() -> WardenResult<Client> {
    GLOBAL_CLIENT
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
        .ok_or(WardenError::NotInitialized)
}

pub fn is_initialized() -> bool {
    GLOBAL_CLIENT.read().unwrap_or_else(PoisonError::into_inner).is_some()
}

pub fn capture_message(message: impl Into<String>, level: Level) -> WardenResult<String> {
    Ok(client()?.capture_message(message, level))
}

pub fn capture_exception<E: StdError + ?Sized>(err: &E) -> WardenResult<String> {
    Ok(client()?.capture_exception(err))
}

/// Removes the global client and closes it. A no-op when none is installed.
pub async fn shutdown() -> Option<FlushReport> {
    let client = GLOBAL_CLIENT.write().unwrap_or_else(PoisonError::into_inner).take()?;
    let report = client.close().await;
    info!("Global CodeWarden client shut down.");
    Some(report)
}
