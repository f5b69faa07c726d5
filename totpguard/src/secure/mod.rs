mod clock;
mod sanitize;
mod totp;

pub use clock::{Clock, ManualClock, SystemClock};
pub use sanitize::{sanitize, sanitize_token};
pub use totp::{
    CODE_DIGITS, DYNAMIC_TRUNCATION_WIDTH, TIME_STEP_SECONDS, current_step, decode_secret,
    format_code, generate_code, generate_secret, step_at,
};
