use chrono::Utc;
use rand::Rng;
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::OtpCode;

pub const CODE_LENGTH: usize = 6;

pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// A phone has at most one live code: issuing marks everything older as
/// consumed before the new row goes in.
pub fn issue_code(conn: &Connection, phone: &str, ttl_mins: i64) -> anyhow::Result<OtpCode> {
    queries::supersede_active_otps(conn, phone)?;

    let now = Utc::now().naive_utc();
    let mut otp = OtpCode {
        id: 0,
        phone: phone.to_string(),
        code: generate_code(),
        issued_at: now,
        expires_at: now + chrono::Duration::minutes(ttl_mins),
        consumed: false,
    };
    otp.id = queries::insert_otp(conn, &otp)?;
    Ok(otp)
}

/// Checks run in a fixed order: missing, already used, expired, mismatch.
/// Consumption is a conditional update, so two racing verifications cannot
/// both pass.
pub fn verify_code(conn: &Connection, phone: &str, submitted: &str) -> Result<(), AppError> {
    let otp = queries::latest_otp_for_phone(conn, phone)?
        .ok_or_else(|| AppError::NotFound("no verification code for this phone".to_string()))?;

    if otp.consumed {
        return Err(AppError::OtpAlreadyUsed);
    }
    if Utc::now().naive_utc() > otp.expires_at {
        return Err(AppError::OtpExpired);
    }
    if !codes_match(submitted, &otp.code) {
        return Err(AppError::OtpMismatch);
    }
    if !queries::consume_otp(conn, otp.id)? {
        return Err(AppError::OtpAlreadyUsed);
    }
    Ok(())
}

/// Compares every byte so timing does not reveal the first mismatching digit.
fn codes_match(submitted: &str, stored: &str) -> bool {
    if submitted.len() != stored.len() {
        return false;
    }
    submitted
        .bytes()
        .zip(stored.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    #[test]
    fn test_generate_code_shape() {
        for _ in 0..50 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|b| b.is_ascii_digit()));
        }
    }

    #[test]
    fn test_codes_match() {
        assert!(codes_match("123456", "123456"));
        assert!(!codes_match("123456", "123457"));
        assert!(!codes_match("12345", "123456"));
        assert!(!codes_match("", "123456"));
    }

    #[test]
    fn test_issue_supersedes_prior_code() {
        let conn = setup_db();
        let first = issue_code(&conn, "+15550001234", 5).unwrap();
        let second = issue_code(&conn, "+15550001234", 5).unwrap();

        assert_eq!(
            queries::count_active_otps(&conn, "+15550001234").unwrap(),
            1
        );

        // The superseded code no longer verifies; the fresh one does.
        let old = verify_code(&conn, "+15550001234", &first.code);
        if first.code == second.code {
            // Identical codes can happen; the old row is consumed either way.
            assert!(old.is_ok());
        } else {
            assert!(matches!(old.unwrap_err(), AppError::OtpMismatch));
            assert!(verify_code(&conn, "+15550001234", &second.code).is_ok());
        }
    }

    #[test]
    fn test_verify_consumes_code() {
        let conn = setup_db();
        let otp = issue_code(&conn, "+15550001234", 5).unwrap();

        assert!(verify_code(&conn, "+15550001234", &otp.code).is_ok());
        let second = verify_code(&conn, "+15550001234", &otp.code);
        assert!(matches!(second.unwrap_err(), AppError::OtpAlreadyUsed));
    }

    #[test]
    fn test_verify_expired_code_even_when_matching() {
        let conn = setup_db();
        let now = Utc::now().naive_utc();
        let otp = OtpCode {
            id: 0,
            phone: "+15550001234".to_string(),
            code: "123456".to_string(),
            issued_at: now - chrono::Duration::minutes(10),
            expires_at: now - chrono::Duration::minutes(5),
            consumed: false,
        };
        queries::insert_otp(&conn, &otp).unwrap();

        let result = verify_code(&conn, "+15550001234", "123456");
        assert!(matches!(result.unwrap_err(), AppError::OtpExpired));
    }

    #[test]
    fn test_verify_mismatched_code() {
        let conn = setup_db();
        let otp = issue_code(&conn, "+15550001234", 5).unwrap();
        let wrong = if otp.code == "000000" { "000001" } else { "000000" };

        let result = verify_code(&conn, "+15550001234", wrong);
        assert!(matches!(result.unwrap_err(), AppError::OtpMismatch));

        // A failed attempt does not burn the code.
        assert!(verify_code(&conn, "+15550001234", &otp.code).is_ok());
    }

    #[test]
    fn test_verify_unknown_phone() {
        let conn = setup_db();
        let result = verify_code(&conn, "+15550009999", "123456");
        assert!(matches!(result.unwrap_err(), AppError::NotFound(_)));
    }
}
