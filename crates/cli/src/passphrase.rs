//! Passphrase entry.
//!
//! `TSVAULT_PASSPHRASE` wins when set; otherwise the passphrase is read from
//! the terminal without echo. The passphrase is wiped from memory when
//! dropped.

use std::env;
use tracing::debug;
use zeroize::Zeroizing;

/// Environment variable holding the archive passphrase.
pub const PASSPHRASE_ENV: &str = "TSVAULT_PASSPHRASE";

/// Obtain the passphrase. With `confirm`, an interactive entry must be typed
/// twice.
pub fn read_passphrase(confirm: bool) -> Result<Zeroizing<String>, String> {
    if let Ok(passphrase) = env::var(PASSPHRASE_ENV) {
        debug!(var = PASSPHRASE_ENV, "Passphrase taken from environment");
        return check_non_empty(Zeroizing::new(passphrase));
    }

    let first = prompt("Passphrase: ")?;
    if confirm {
        let second = prompt("Confirm passphrase: ")?;
        if first != second {
            return Err("Passphrases do not match".to_string());
        }
    }
    check_non_empty(first)
}

fn prompt(label: &str) -> Result<Zeroizing<String>, String> {
    rpassword::prompt_password(label)
        .map(Zeroizing::new)
        .map_err(|e| format!("Failed to read passphrase: {}", e))
}

fn check_non_empty(passphrase: Zeroizing<String>) -> Result<Zeroizing<String>, String> {
    if passphrase.is_empty() {
        Err("Passphrase must not be empty".to_string())
    } else {
        Ok(passphrase)
    }
}
