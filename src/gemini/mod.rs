//! Client for the hosted generative language service. The service is
//! treated as an opaque collaborator: prompts go in, text or audio
//! comes out.
mod core;
pub use self::core::{
    Blob, Content, Part, Role, generate, generate_stream, synthesize_speech,
};
