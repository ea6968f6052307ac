pub mod group;
pub mod record;
pub mod token;

pub use group::{Group, Subject, UNKNOWN_SUBJECT};
pub use record::{ImageRecord, PreviewHandle};
pub use token::SeparatorToken;
