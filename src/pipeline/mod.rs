//! Pipeline stages for a page explanation request.
//!
//! Each submodule implements exactly one step, so each is testable on its
//! own and the page backend can be swapped without touching networking.
//!
//! ## Data Flow
//!
//! ```text
//! extract ──▶ request ──▶ crate::stream ──▶ crate::conversation
//! (pdfium)    (multipart)  (frame decoder)   (reducer)
//! ```
//!
//! 1. [`extract`]: copy the selected page into a fresh single-page PDF; runs
//!    in `spawn_blocking` because pdfium is not async-safe
//! 2. [`request`]: build the multipart body, POST it, and turn a rejected
//!    response into a user-facing message

pub mod extract;
pub mod request;
