//! Document builder

use crate::{BRIDGE, PAUSE, PAUSE_DURATION, ROOT, SPEAK_SENTENCE};
use bridgeline_core::{BridgelineResult, CallControlInstruction, DocumentError};
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::fmt;

/// MIME type of a serialized document.
pub const CONTENT_TYPE: &str = "application/xml";

/// A finished BXML document ready to be sent as a response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedDocument(String);

impl SerializedDocument {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn content_type(&self) -> &'static str {
        CONTENT_TYPE
    }
}

impl fmt::Display for SerializedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SerializedDocument {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<SerializedDocument> for String {
    fn from(doc: SerializedDocument) -> Self {
        doc.0
    }
}

/// Build a BXML document from an instruction sequence.
///
/// Output is deterministic and preserves instruction order. Text content is
/// escaped only where XML requires it (`<`, `>` and `&`).
pub fn build(instructions: &[CallControlInstruction]) -> BridgelineResult<SerializedDocument> {
    let mut writer = Writer::new(Vec::new());

    write(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )?;
    write(&mut writer, Event::Start(BytesStart::new(ROOT)))?;

    for instruction in instructions {
        match instruction {
            CallControlInstruction::Pause { duration_seconds } => {
                let duration = duration_seconds.to_string();
                let mut pause = BytesStart::new(PAUSE);
                pause.push_attribute((PAUSE_DURATION, duration.as_str()));
                write(&mut writer, Event::Empty(pause))?;
            }
            CallControlInstruction::Speak { text } => {
                write_text_element(&mut writer, SPEAK_SENTENCE, text)?;
            }
            CallControlInstruction::Bridge { target_leg_id } => {
                write_text_element(&mut writer, BRIDGE, target_leg_id.as_str())?;
            }
        }
    }

    write(&mut writer, Event::End(BytesEnd::new(ROOT)))?;

    let bytes = writer.into_inner();
    let xml = String::from_utf8(bytes).map_err(|e| DocumentError::WriteFailed {
        reason: e.to_string(),
    })?;
    Ok(SerializedDocument(xml))
}

fn write_text_element(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    text: &str,
) -> Result<(), DocumentError> {
    write(writer, Event::Start(BytesStart::new(name)))?;
    if !text.is_empty() {
        write(writer, Event::Text(BytesText::from_escaped(partial_escape(text))))?;
    }
    write(writer, Event::End(BytesEnd::new(name)))
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), DocumentError> {
    writer
        .write_event(event)
        .map_err(|e| DocumentError::WriteFailed {
            reason: e.to_string(),
        })
}
