use std::io::Cursor;

use eyre::Result;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

/// Renders a TwiML messaging response carrying a single reply.
pub fn message_response(message: &str) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("Response")))?;
    writer.write_event(Event::Start(BytesStart::new("Message")))?;
    writer.write_event(Event::Text(BytesText::new(message)))?;
    writer.write_event(Event::End(BytesEnd::new("Message")))?;
    writer.write_event(Event::End(BytesEnd::new("Response")))?;

    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}
