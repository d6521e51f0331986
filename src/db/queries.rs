use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection};

use crate::models::{Appointment, AppointmentStatus, OtpCode, Role, User};

// ── Users ──

pub fn create_user(conn: &Connection, user: &User) -> anyhow::Result<()> {
    let created_at = user.created_at.format("%Y-%m-%d %H:%M:%S").to_string();

    conn.execute(
        "INSERT INTO users (id, phone, role, name, family, bio, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            user.id,
            user.phone,
            user.role.as_str(),
            user.name,
            user.family,
            user.bio,
            created_at,
        ],
    )?;
    Ok(())
}

pub fn get_user_by_phone(conn: &Connection, phone: &str) -> anyhow::Result<Option<User>> {
    let result = conn.query_row(
        "SELECT id, phone, role, name, family, bio, created_at FROM users WHERE phone = ?1",
        params![phone],
        |row| Ok(parse_user_row(row)),
    );

    match result {
        Ok(user) => Ok(Some(user?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_user_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<User>> {
    let result = conn.query_row(
        "SELECT id, phone, role, name, family, bio, created_at FROM users WHERE id = ?1",
        params![id],
        |row| Ok(parse_user_row(row)),
    );

    match result {
        Ok(user) => Ok(Some(user?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn update_user_profile(conn: &Connection, user: &User) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE users SET name = ?1, family = ?2, bio = ?3 WHERE id = ?4",
        params![user.name, user.family, user.bio, user.id],
    )?;
    Ok(())
}

pub fn list_users(conn: &Connection, limit: i64) -> anyhow::Result<Vec<User>> {
    let mut stmt = conn.prepare(
        "SELECT id, phone, role, name, family, bio, created_at
         FROM users ORDER BY created_at DESC LIMIT ?1",
    )?;

    let rows = stmt.query_map(params![limit], |row| Ok(parse_user_row(row)))?;

    let mut users = vec![];
    for row in rows {
        users.push(row??);
    }
    Ok(users)
}

fn parse_user_row(row: &rusqlite::Row) -> anyhow::Result<User> {
    let id: String = row.get(0)?;
    let phone: String = row.get(1)?;
    let role_str: String = row.get(2)?;
    let name: String = row.get(3)?;
    let family: String = row.get(4)?;
    let bio: Option<String> = row.get(5)?;
    let created_at_str: String = row.get(6)?;

    let role = Role::parse(&role_str)
        .ok_or_else(|| anyhow::anyhow!("unknown role in users table: {role_str}"))?;
    let created_at = NaiveDateTime::parse_from_str(&created_at_str, "%Y-%m-%d %H:%M:%S")
        .unwrap_or_else(|_| Utc::now().naive_utc());

    Ok(User {
        id,
        phone,
        role,
        name,
        family,
        bio,
        created_at,
    })
}

// ── OTP codes ──

pub fn insert_otp(conn: &Connection, otp: &OtpCode) -> anyhow::Result<i64> {
    let issued_at = otp.issued_at.format("%Y-%m-%d %H:%M:%S").to_string();
    let expires_at = otp.expires_at.format("%Y-%m-%d %H:%M:%S").to_string();

    conn.execute(
        "INSERT INTO otp_codes (phone, code, issued_at, expires_at, consumed)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![otp.phone, otp.code, issued_at, expires_at, otp.consumed as i32],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn latest_otp_for_phone(conn: &Connection, phone: &str) -> anyhow::Result<Option<OtpCode>> {
    let result = conn.query_row(
        "SELECT id, phone, code, issued_at, expires_at, consumed
         FROM otp_codes WHERE phone = ?1 ORDER BY id DESC LIMIT 1",
        params![phone],
        |row| Ok(parse_otp_row(row)),
    );

    match result {
        Ok(otp) => Ok(Some(otp?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Flips the consumed flag, but only if nobody got there first. The affected
/// row count is the verdict on who won.
pub fn consume_otp(conn: &Connection, id: i64) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE otp_codes SET consumed = 1 WHERE id = ?1 AND consumed = 0",
        params![id],
    )?;
    Ok(count > 0)
}

pub fn supersede_active_otps(conn: &Connection, phone: &str) -> anyhow::Result<usize> {
    let count = conn.execute(
        "UPDATE otp_codes SET consumed = 1 WHERE phone = ?1 AND consumed = 0",
        params![phone],
    )?;
    Ok(count)
}

pub fn count_active_otps(conn: &Connection, phone: &str) -> anyhow::Result<i64> {
    let now = Utc::now().naive_utc().format("%Y-%m-%d %H:%M:%S").to_string();
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM otp_codes WHERE phone = ?1 AND consumed = 0 AND expires_at > ?2",
        params![phone, now],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn parse_otp_row(row: &rusqlite::Row) -> anyhow::Result<OtpCode> {
    let id: i64 = row.get(0)?;
    let phone: String = row.get(1)?;
    let code: String = row.get(2)?;
    let issued_at_str: String = row.get(3)?;
    let expires_at_str: String = row.get(4)?;
    let consumed: bool = row.get::<_, i32>(5)? != 0;

    let issued_at = NaiveDateTime::parse_from_str(&issued_at_str, "%Y-%m-%d %H:%M:%S")
        .unwrap_or_else(|_| Utc::now().naive_utc());
    let expires_at = NaiveDateTime::parse_from_str(&expires_at_str, "%Y-%m-%d %H:%M:%S")
        .unwrap_or_else(|_| Utc::now().naive_utc());

    Ok(OtpCode {
        id,
        phone,
        code,
        issued_at,
        expires_at,
        consumed,
    })
}

// ── OTP request limits ──

pub fn record_otp_request(conn: &Connection, phone: &str) -> anyhow::Result<i64> {
    let window = current_hour_window();

    conn.execute(
        "INSERT INTO otp_requests (phone, window_start, request_count)
         VALUES (?1, ?2, 1)
         ON CONFLICT(phone, window_start) DO UPDATE SET request_count = request_count + 1",
        params![phone, window],
    )?;

    let count: i64 = conn.query_row(
        "SELECT request_count FROM otp_requests WHERE phone = ?1 AND window_start = ?2",
        params![phone, window],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn current_hour_window() -> String {
    Utc::now().format("%Y-%m-%d %H:00:00").to_string()
}

// ── Appointments ──

/// Returns false when the scheduler already has a slot at that exact start
/// time (the UNIQUE constraint fired).
pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> anyhow::Result<bool> {
    let starts_at = appt.starts_at.format("%Y-%m-%d %H:%M:%S").to_string();
    let created_at = appt.created_at.format("%Y-%m-%d %H:%M:%S").to_string();
    let updated_at = appt.updated_at.format("%Y-%m-%d %H:%M:%S").to_string();

    let result = conn.execute(
        "INSERT INTO appointments (id, scheduler_id, booker_id, starts_at, duration_minutes, status, note, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            appt.id,
            appt.scheduler_id,
            appt.booker_id,
            starts_at,
            appt.duration_minutes,
            appt.status.as_str(),
            appt.note,
            created_at,
            updated_at,
        ],
    );

    match result {
        Ok(_) => Ok(true),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

pub fn get_appointment_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Appointment>> {
    let result = conn.query_row(
        "SELECT id, scheduler_id, booker_id, starts_at, duration_minutes, status, note, created_at, updated_at
         FROM appointments WHERE id = ?1",
        params![id],
        |row| Ok(parse_appointment_row(row)),
    );

    match result {
        Ok(appt) => Ok(Some(appt?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_appointments_for_scheduler(
    conn: &Connection,
    scheduler_id: &str,
    status_filter: Option<&str>,
    limit: i64,
) -> anyhow::Result<Vec<Appointment>> {
    let (sql, params_vec): (String, Vec<Box<dyn rusqlite::types::ToSql>>) = match status_filter {
        Some(status) => (
            "SELECT id, scheduler_id, booker_id, starts_at, duration_minutes, status, note, created_at, updated_at \
             FROM appointments WHERE scheduler_id = ?1 AND status = ?2 ORDER BY starts_at DESC LIMIT ?3"
                .to_string(),
            vec![
                Box::new(scheduler_id.to_string()) as Box<dyn rusqlite::types::ToSql>,
                Box::new(status.to_string()),
                Box::new(limit),
            ],
        ),
        None => (
            "SELECT id, scheduler_id, booker_id, starts_at, duration_minutes, status, note, created_at, updated_at \
             FROM appointments WHERE scheduler_id = ?1 ORDER BY starts_at DESC LIMIT ?2"
                .to_string(),
            vec![
                Box::new(scheduler_id.to_string()) as Box<dyn rusqlite::types::ToSql>,
                Box::new(limit),
            ],
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_appointment_row(row)))?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

pub fn list_all_appointments(
    conn: &Connection,
    status_filter: Option<&str>,
    limit: i64,
) -> anyhow::Result<Vec<Appointment>> {
    let (sql, params_vec): (String, Vec<Box<dyn rusqlite::types::ToSql>>) = match status_filter {
        Some(status) => (
            "SELECT id, scheduler_id, booker_id, starts_at, duration_minutes, status, note, created_at, updated_at \
             FROM appointments WHERE status = ?1 ORDER BY starts_at DESC LIMIT ?2"
                .to_string(),
            vec![
                Box::new(status.to_string()) as Box<dyn rusqlite::types::ToSql>,
                Box::new(limit),
            ],
        ),
        None => (
            "SELECT id, scheduler_id, booker_id, starts_at, duration_minutes, status, note, created_at, updated_at \
             FROM appointments ORDER BY starts_at DESC LIMIT ?1"
                .to_string(),
            vec![Box::new(limit) as Box<dyn rusqlite::types::ToSql>],
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_appointment_row(row)))?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

/// Future open slots only; past slots stay in the table but are never offered.
pub fn list_open_appointments(conn: &Connection, limit: i64) -> anyhow::Result<Vec<Appointment>> {
    let now = Utc::now().naive_utc().format("%Y-%m-%d %H:%M:%S").to_string();
    let mut stmt = conn.prepare(
        "SELECT id, scheduler_id, booker_id, starts_at, duration_minutes, status, note, created_at, updated_at
         FROM appointments WHERE status = 'open' AND starts_at > ?1 ORDER BY starts_at ASC LIMIT ?2",
    )?;

    let rows = stmt.query_map(params![now, limit], |row| Ok(parse_appointment_row(row)))?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

pub fn list_appointments_for_booker(
    conn: &Connection,
    booker_id: &str,
    scope: Option<&str>,
    limit: i64,
) -> anyhow::Result<Vec<Appointment>> {
    let now = Utc::now().naive_utc().format("%Y-%m-%d %H:%M:%S").to_string();
    let (sql, params_vec): (String, Vec<Box<dyn rusqlite::types::ToSql>>) = match scope {
        Some("upcoming") => (
            "SELECT id, scheduler_id, booker_id, starts_at, duration_minutes, status, note, created_at, updated_at \
             FROM appointments WHERE booker_id = ?1 AND status = 'booked' AND starts_at > ?2 \
             ORDER BY starts_at ASC LIMIT ?3"
                .to_string(),
            vec![
                Box::new(booker_id.to_string()) as Box<dyn rusqlite::types::ToSql>,
                Box::new(now),
                Box::new(limit),
            ],
        ),
        Some("past") => (
            "SELECT id, scheduler_id, booker_id, starts_at, duration_minutes, status, note, created_at, updated_at \
             FROM appointments WHERE booker_id = ?1 AND starts_at <= ?2 \
             ORDER BY starts_at DESC LIMIT ?3"
                .to_string(),
            vec![
                Box::new(booker_id.to_string()) as Box<dyn rusqlite::types::ToSql>,
                Box::new(now),
                Box::new(limit),
            ],
        ),
        _ => (
            "SELECT id, scheduler_id, booker_id, starts_at, duration_minutes, status, note, created_at, updated_at \
             FROM appointments WHERE booker_id = ?1 \
             ORDER BY starts_at DESC LIMIT ?2"
                .to_string(),
            vec![
                Box::new(booker_id.to_string()) as Box<dyn rusqlite::types::ToSql>,
                Box::new(limit),
            ],
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_appointment_row(row)))?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

pub fn next_appointment_for_booker(
    conn: &Connection,
    booker_id: &str,
) -> anyhow::Result<Option<Appointment>> {
    let now = Utc::now().naive_utc().format("%Y-%m-%d %H:%M:%S").to_string();
    let result = conn.query_row(
        "SELECT id, scheduler_id, booker_id, starts_at, duration_minutes, status, note, created_at, updated_at
         FROM appointments WHERE booker_id = ?1 AND status = 'booked' AND starts_at > ?2
         ORDER BY starts_at ASC LIMIT 1",
        params![booker_id, now],
        |row| Ok(parse_appointment_row(row)),
    );

    match result {
        Ok(appt) => Ok(Some(appt?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// open -> booked, guarded by the status check. Exactly one caller can win;
/// everyone else sees zero affected rows.
pub fn book_appointment(conn: &Connection, id: &str, booker_id: &str) -> anyhow::Result<bool> {
    let now = Utc::now()
        .naive_utc()
        .format("%Y-%m-%d %H:%M:%S")
        .to_string();
    let count = conn.execute(
        "UPDATE appointments SET status = 'booked', booker_id = ?1, updated_at = ?2
         WHERE id = ?3 AND status = 'open'",
        params![booker_id, now, id],
    )?;
    Ok(count > 0)
}

pub fn cancel_appointment_by_scheduler(
    conn: &Connection,
    id: &str,
    scheduler_id: &str,
) -> anyhow::Result<bool> {
    let now = Utc::now()
        .naive_utc()
        .format("%Y-%m-%d %H:%M:%S")
        .to_string();
    let count = conn.execute(
        "UPDATE appointments SET status = 'cancelled', updated_at = ?1
         WHERE id = ?2 AND scheduler_id = ?3 AND status != 'cancelled'",
        params![now, id, scheduler_id],
    )?;
    Ok(count > 0)
}

pub fn cancel_appointment_by_booker(
    conn: &Connection,
    id: &str,
    booker_id: &str,
) -> anyhow::Result<bool> {
    let now = Utc::now()
        .naive_utc()
        .format("%Y-%m-%d %H:%M:%S")
        .to_string();
    let count = conn.execute(
        "UPDATE appointments SET status = 'cancelled', updated_at = ?1
         WHERE id = ?2 AND booker_id = ?3 AND status = 'booked'",
        params![now, id, booker_id],
    )?;
    Ok(count > 0)
}

fn parse_appointment_row(row: &rusqlite::Row) -> anyhow::Result<Appointment> {
    let id: String = row.get(0)?;
    let scheduler_id: String = row.get(1)?;
    let booker_id: Option<String> = row.get(2)?;
    let starts_at_str: String = row.get(3)?;
    let duration_minutes: i32 = row.get(4)?;
    let status_str: String = row.get(5)?;
    let note: Option<String> = row.get(6)?;
    let created_at_str: String = row.get(7)?;
    let updated_at_str: String = row.get(8)?;

    let starts_at = NaiveDateTime::parse_from_str(&starts_at_str, "%Y-%m-%d %H:%M:%S")
        .unwrap_or_else(|_| Utc::now().naive_utc());
    let created_at = NaiveDateTime::parse_from_str(&created_at_str, "%Y-%m-%d %H:%M:%S")
        .unwrap_or_else(|_| Utc::now().naive_utc());
    let updated_at = NaiveDateTime::parse_from_str(&updated_at_str, "%Y-%m-%d %H:%M:%S")
        .unwrap_or_else(|_| Utc::now().naive_utc());

    Ok(Appointment {
        id,
        scheduler_id,
        booker_id,
        starts_at,
        duration_minutes,
        status: AppointmentStatus::from_str(&status_str),
        note,
        created_at,
        updated_at,
    })
}

// ── Revoked tokens ──

pub fn revoke_token(conn: &Connection, jti: &str, expires_at: &NaiveDateTime) -> anyhow::Result<()> {
    let expires_at = expires_at.format("%Y-%m-%d %H:%M:%S").to_string();
    conn.execute(
        "INSERT INTO revoked_tokens (jti, expires_at) VALUES (?1, ?2)
         ON CONFLICT(jti) DO NOTHING",
        params![jti, expires_at],
    )?;
    Ok(())
}

pub fn is_token_revoked(conn: &Connection, jti: &str) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM revoked_tokens WHERE jti = ?1",
        params![jti],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

// ── Housekeeping ──

/// Drops rows that can no longer affect any decision: day-old OTP codes,
/// revocations for tokens that have expired on their own, and stale
/// rate-limit windows.
pub fn purge_expired(conn: &Connection) -> anyhow::Result<()> {
    let now = Utc::now().naive_utc().format("%Y-%m-%d %H:%M:%S").to_string();
    let otp_cutoff = (Utc::now() - chrono::Duration::days(1))
        .naive_utc()
        .format("%Y-%m-%d %H:%M:%S")
        .to_string();
    let window_cutoff = (Utc::now() - chrono::Duration::hours(2))
        .format("%Y-%m-%d %H:00:00")
        .to_string();

    conn.execute(
        "DELETE FROM otp_codes WHERE expires_at < ?1",
        params![otp_cutoff],
    )?;
    conn.execute(
        "DELETE FROM revoked_tokens WHERE expires_at < ?1",
        params![now],
    )?;
    conn.execute(
        "DELETE FROM otp_requests WHERE window_start < ?1",
        params![window_cutoff],
    )?;
    Ok(())
}
