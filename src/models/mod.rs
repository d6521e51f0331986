pub mod appointment;
pub mod otp;
pub mod user;

pub use appointment::{Appointment, AppointmentStatus};
pub use otp::OtpCode;
pub use user::{normalize_phone, Role, User};
