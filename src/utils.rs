mod log_error;
mod teloxide;

pub use log_error::ResultExt;

pub use self::teloxide::BotExt;
