use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::auth::token::TokenService;
use crate::config::AppConfig;
use crate::services::sms::SmsSender;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub sms: Box<dyn SmsSender>,
    pub tokens: TokenService,
}
