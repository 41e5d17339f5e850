pub mod buffer;
pub mod context;
mod lifecycle;
pub mod pipeline;
pub(crate) mod tee;

pub use buffer::SharedBuffer;
pub use context::{Context, ContextError};
pub use pipeline::{ChainState, Pipeline, StreamKind, StreamLink};
