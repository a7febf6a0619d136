use std::future::Future;

use crate::error::OracleError;

/// Text-in, text-out code generation capability.
///
/// Implementations must accept arbitrarily long prompts (a full function
/// source plus instructions) and report every transport, authentication or
/// rate-limit problem as an [`OracleError`] rather than panicking.
pub trait CodeOracle {
    /// Sends `prompt` to the backend and returns its raw response text.
    ///
    /// # Returns
    /// * `Ok(String)` - The non-empty response
    /// * `Err(OracleError::EmptyResponse)` - The backend answered with nothing usable
    /// * `Err(_)` - Any other backend failure
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String, OracleError>> + Send;
}
