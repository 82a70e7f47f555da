//! Identity of a connecting client.
//!
//! The hall never issues or checks credentials itself. An
//! [`Authenticator`] turns whatever token the client presents into a
//! stable [`PlayerId`], and every action on that connection runs as that
//! player. Creator checks compare this id with the game's creator, so
//! the authenticator is the only thing standing between a client and
//! someone else's game.

use std::future::Future;

use bingo_protocol::PlayerId;

use crate::BingoError;

/// Validates a client's token and returns its identity.
///
/// ```rust
/// use bingo::{Authenticator, BingoError};
/// use bingo_protocol::PlayerId;
///
/// /// Uses the token itself as the player id. Development only.
/// struct DevAuthenticator;
///
/// impl Authenticator for DevAuthenticator {
///     async fn authenticate(&self, token: &str) -> Result<PlayerId, BingoError> {
///         let id: u64 = token
///             .parse()
///             .map_err(|_| BingoError::Unauthorized("token must be a number".into()))?;
///         Ok(PlayerId(id))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// # Errors
    /// [`BingoError::Unauthorized`] when the token is rejected.
    fn authenticate(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<PlayerId, BingoError>> + Send;
}
