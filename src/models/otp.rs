use chrono::NaiveDateTime;

/// A one-time verification code. Rows are never deleted on use; `consumed`
/// flips exactly once, and stale rows are purged in the background.
#[derive(Debug, Clone)]
pub struct OtpCode {
    pub id: i64,
    pub phone: String,
    pub code: String,
    pub issued_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    pub consumed: bool,
}
