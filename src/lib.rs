pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{ElasticSink, LocalStorage};
pub use config::settings::Settings;
pub use crate::core::bulk::{build_bulk_frame, BulkFrameBuilder};
pub use crate::core::interaction::parse_interaction;
pub use crate::core::pusher::{PushOutcome, Pusher};
pub use utils::error::{PusherError, Result};
