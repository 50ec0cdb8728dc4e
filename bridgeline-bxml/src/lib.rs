//! Bridgeline BXML - Call-Control Document Builder
//!
//! Encodes an ordered list of [`CallControlInstruction`]s as a Bandwidth XML
//! (BXML) `<Response>` document, one element per instruction:
//!
//! | Instruction | Element |
//! |-------------|---------|
//! | `Pause`     | `<Pause duration="N"/>` |
//! | `Speak`     | `<SpeakSentence>text</SpeakSentence>` |
//! | `Bridge`    | `<Bridge>legId</Bridge>` |
//!
//! [`parse`] reads the same subset back and is used by round-trip tests and
//! diagnostics.
//!
//! [`CallControlInstruction`]: bridgeline_core::CallControlInstruction

mod builder;
mod parser;

pub use builder::{build, SerializedDocument, CONTENT_TYPE};
pub use parser::parse;

pub(crate) const ROOT: &str = "Response";
pub(crate) const PAUSE: &str = "Pause";
pub(crate) const PAUSE_DURATION: &str = "duration";
pub(crate) const SPEAK_SENTENCE: &str = "SpeakSentence";
pub(crate) const BRIDGE: &str = "Bridge";
