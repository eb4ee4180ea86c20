// SPDX-License-Identifier: MIT

//! Invite/view code and reset-token generation.
//!
//! Codes are short shared secrets; uniqueness is guaranteed by re-drawing on
//! collision before insert (checked with a query), since Firestore has no
//! unique constraints.

use crate::db::Db;
use crate::error::AppError;
use rand::Rng;

/// Alphabet without visually ambiguous characters (0/O, 1/I/L).
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Length of invite and view codes.
pub const CODE_LEN: usize = 8;

/// Length of password-reset tokens.
pub const RESET_TOKEN_LEN: usize = 40;

/// Draws before giving up on a unique code. Collisions on a 31^8 space are
/// vanishingly rare, so hitting this indicates a systemic problem.
const MAX_DRAWS: usize = 5;

/// Generate a random code of `len` characters from [`CODE_ALPHABET`].
pub fn generate_code(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| {
            let idx = rng.gen_range(0..CODE_ALPHABET.len());
            CODE_ALPHABET[idx] as char
        })
        .collect()
}

/// Generate an invite code not used by any existing group.
pub async fn unique_invite_code(db: &Db) -> Result<String, AppError> {
    for _ in 0..MAX_DRAWS {
        let code = generate_code(CODE_LEN);
        if db.find_group_by_invite_code(&code).await?.is_none() {
            return Ok(code);
        }
        tracing::warn!("Invite code collision, re-drawing");
    }
    Err(AppError::Internal(anyhow::anyhow!(
        "Could not generate a unique invite code"
    )))
}

/// Generate a view code not used by any existing profile.
pub async fn unique_view_code(db: &Db) -> Result<String, AppError> {
    for _ in 0..MAX_DRAWS {
        let code = generate_code(CODE_LEN);
        if db.find_profile_by_view_code(&code).await?.is_none() {
            return Ok(code);
        }
        tracing::warn!("View code collision, re-drawing");
    }
    Err(AppError::Internal(anyhow::anyhow!(
        "Could not generate a unique view code"
    )))
}

/// Generate a password-reset token.
pub fn generate_reset_token() -> String {
    generate_code(RESET_TOKEN_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_length_and_alphabet() {
        let code = generate_code(CODE_LEN);
        assert_eq!(code.len(), CODE_LEN);
        assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_codes_are_not_constant() {
        // Not a randomness test, just a guard against a broken generator.
        let codes: std::collections::HashSet<String> =
            (0..32).map(|_| generate_code(CODE_LEN)).collect();
        assert!(codes.len() > 1);
    }

    #[test]
    fn test_reset_token_is_longer_than_codes() {
        assert!(generate_reset_token().len() > CODE_LEN);
    }
}
