//! Identity resolution: which address refreshed threads are forwarded to.

use crate::domain::AccountIdentity;
use crate::providers::email::MailStore;

use super::SweepError;

/// Resolves the account's identity from its send-as addresses.
///
/// The forward target is the first address the store returns. An account
/// with no addresses is a configuration error and aborts the run.
pub async fn resolve_forward_target(store: &dyn MailStore) -> Result<AccountIdentity, SweepError> {
    let addresses = store
        .list_owned_addresses()
        .await
        .map_err(SweepError::Identity)?;

    let identity = AccountIdentity::from_addresses(addresses).ok_or(SweepError::NoForwardTarget)?;

    let found: Vec<&str> = identity
        .addresses()
        .iter()
        .map(|a| a.email.as_str())
        .collect();
    tracing::info!(addresses = ?found, "Email addresses found");
    tracing::info!(
        target = %identity.forward_target().email,
        "Email address that threads will be forwarded to"
    );

    Ok(identity)
}
