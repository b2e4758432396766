//! The mention worker, the heart of Postwright.
//!
//! Each cycle follows the same path:
//!
//! 1. **Wait** for a mention on the message bus
//! 2. **Instruct** the content generator with persona, request, and contract
//! 3. **Validate** the answer as exactly five well-formed posts
//! 4. **Reply** in the mention's thread, addressed to its sender
//!
//! Any failure abandons the cycle; the [`Worker`] backs off and waits again.

pub mod batch;
pub mod instruction;
pub mod pipeline;
pub mod worker;

#[cfg(test)]
mod testing;

pub use batch::{ContentBatch, ContentItem, POSTS_PER_BATCH};
pub use instruction::{Instruction, Persona};
pub use pipeline::{MentionHandler, ResponsePipeline};
pub use worker::{Worker, WorkerExit, WorkerReport};
