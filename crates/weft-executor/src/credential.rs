use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ExecutorError;

/// A decrypted secret, as handed to a node executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
  pub id: String,
  pub value: String,
}

/// Read-only access to decrypted secrets, scoped to the workflow owner.
///
/// Returning `Ok(None)` means the credential does not exist for that owner;
/// executors map this to a non-retriable configuration failure.
#[async_trait]
pub trait CredentialStore: Send + Sync {
  async fn get_credential(
    &self,
    credential_id: &str,
    owner_id: &str,
  ) -> Result<Option<Credential>, ExecutorError>;
}
