pub mod otp;
pub mod sms;
