pub mod time;

pub use time::{describe_age, format_age, format_age_at};
