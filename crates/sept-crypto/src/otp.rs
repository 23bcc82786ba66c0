//! Six-digit one-time passcodes

use rand::{rngs::OsRng, Rng};

use crate::OTP_DIGITS;

/// True iff `otp` is exactly six ASCII digits, with no surrounding
/// whitespace.
pub fn validate_otp(otp: &str) -> bool {
    otp.len() == OTP_DIGITS && otp.bytes().all(|b| b.is_ascii_digit())
}

/// Generate a uniformly random OTP in `100000..=999999` from the OS CSPRNG.
///
/// The leading digit is never zero.
pub fn generate_otp() -> String {
    OsRng.gen_range(100_000u32..=999_999).to_string()
}
