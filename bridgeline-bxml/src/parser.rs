//! Document parser for the element subset the builder emits

use crate::{BRIDGE, PAUSE, PAUSE_DURATION, ROOT, SPEAK_SENTENCE};
use bridgeline_core::{BridgelineResult, CallControlInstruction, DocumentError, LegId};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

fn parse_failed(reason: impl Into<String>) -> DocumentError {
    DocumentError::ParseFailed {
        reason: reason.into(),
    }
}

fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn pause_from(e: &BytesStart<'_>) -> Result<CallControlInstruction, DocumentError> {
    let attr = e
        .try_get_attribute(PAUSE_DURATION)
        .map_err(|err| parse_failed(err.to_string()))?
        .ok_or_else(|| parse_failed("Pause is missing its duration attribute"))?;
    let value = attr
        .unescape_value()
        .map_err(|err| parse_failed(err.to_string()))?;
    let duration_seconds = value
        .trim()
        .parse::<u32>()
        .map_err(|_| parse_failed(format!("invalid Pause duration: {}", value)))?;
    Ok(CallControlInstruction::pause(duration_seconds))
}

fn text_instruction(name: &str, text: String) -> Result<CallControlInstruction, DocumentError> {
    match name {
        SPEAK_SENTENCE => Ok(CallControlInstruction::speak(text)),
        BRIDGE if text.trim().is_empty() => Err(parse_failed("Bridge has no target leg")),
        BRIDGE => Ok(CallControlInstruction::bridge(LegId::new(text.trim()))),
        other => Err(DocumentError::UnknownElement {
            element: other.to_string(),
        }),
    }
}

/// Parse a BXML document back into instructions.
///
/// Accepts `Pause`, `SpeakSentence` and `Bridge` inside a `Response` root.
/// Any other element is rejected with [`DocumentError::UnknownElement`].
pub fn parse(xml: &str) -> BridgelineResult<Vec<CallControlInstruction>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut instructions = Vec::new();

    let mut in_root = false;
    let mut seen_root = false;
    // Open text-bearing element and the text gathered inside it.
    let mut open: Option<(String, String)> = None;
    let mut open_pause: Option<CallControlInstruction> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = element_name(e);
                if open.is_some() || open_pause.is_some() {
                    return Err(parse_failed(format!("unexpected nested element {}", name)).into());
                }
                match (in_root, name.as_str()) {
                    (false, ROOT) if !seen_root => {
                        in_root = true;
                        seen_root = true;
                    }
                    (true, PAUSE) => open_pause = Some(pause_from(e)?),
                    (true, SPEAK_SENTENCE) | (true, BRIDGE) => open = Some((name, String::new())),
                    _ => return Err(DocumentError::UnknownElement { element: name }.into()),
                }
            }
            Ok(Event::Empty(ref e)) => {
                let name = element_name(e);
                if !in_root || open.is_some() || open_pause.is_some() {
                    return Err(parse_failed(format!("unexpected element {}", name)).into());
                }
                let instruction = match name.as_str() {
                    PAUSE => pause_from(e)?,
                    SPEAK_SENTENCE | BRIDGE => text_instruction(&name, String::new())?,
                    _ => return Err(DocumentError::UnknownElement { element: name }.into()),
                };
                instructions.push(instruction);
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().map_err(|err| parse_failed(err.to_string()))?;
                match open.as_mut() {
                    Some((_, content)) => content.push_str(&text),
                    None if text.trim().is_empty() => {}
                    None => return Err(parse_failed(format!("unexpected text: {}", text)).into()),
                }
            }
            Ok(Event::CData(ref e)) => {
                let text = String::from_utf8_lossy(e).into_owned();
                match open.as_mut() {
                    Some((_, content)) => content.push_str(&text),
                    None => return Err(parse_failed("unexpected CDATA section").into()),
                }
            }
            Ok(Event::End(ref e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if let Some(pause) = open_pause.take() {
                    instructions.push(pause);
                } else if let Some((open_name, content)) = open.take() {
                    instructions.push(text_instruction(&open_name, content)?);
                } else if name == ROOT && in_root {
                    in_root = false;
                } else {
                    return Err(parse_failed(format!("unexpected closing tag {}", name)).into());
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(parse_failed(e.to_string()).into()),
            _ => {}
        }
        buf.clear();
    }

    if !seen_root {
        return Err(parse_failed("missing Response element").into());
    }
    if in_root {
        return Err(parse_failed("unterminated Response element").into());
    }

    Ok(instructions)
}

// ============================================================================
// TESTS
// ============================================================================
