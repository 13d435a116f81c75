//! Interface to the host's authentication provider. The sync engine only
//! cares whether a principal is present and what its stable id is.

use anyhow::Result;

/// The authenticated user, as reported by the host auth layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub email: String,
}

pub trait AuthProvider: Send + Sync {
    fn current_principal(&self) -> Option<Principal>;
    fn sign_out(&self) -> Result<()>;
}
