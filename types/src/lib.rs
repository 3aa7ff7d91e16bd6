pub mod audio;
pub mod codec;
pub mod content;
pub mod events;
pub mod session;

pub use content::{ContentType, GenerationStage, Role};
pub use events::{ClientEvent, Envelope, ServerEvent};
