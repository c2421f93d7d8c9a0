pub mod bulk;
pub mod interaction;
pub mod pusher;

pub use crate::domain::model::{InputType, InteractionRecord, LogEntry, ParsedInteraction};
pub use crate::domain::ports::{ConfigProvider, IndexSink, Storage};
pub use crate::utils::error::Result;
