//! SOAP 1.1 envelope encoding and decoding

use super::mtom::{self, Attachment};
use super::xml::XmlElement;
use crate::endpoint::{EndpointSpec, MessageEncoding};
use crate::{Error, Result};
use base64::Engine;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use tracing::trace;

pub const SOAP11_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema";
pub const XOP_NS: &str = "http://www.w3.org/2004/08/xop/include";

/// Content type of a text encoded SOAP 1.1 message
pub const TEXT_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

/// One RPC call: an operation name and its parameters in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapRequest {
    pub operation: String,
    pub parameters: Vec<XmlElement>,
}

impl SoapRequest {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            parameters: Vec::new(),
        }
    }

    pub fn param(mut self, parameter: XmlElement) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Append a text parameter
    pub fn arg(self, name: &str, value: impl std::fmt::Display) -> Self {
        self.param(XmlElement::text(name, value))
    }
}

/// An encoded HTTP request body
#[derive(Debug, Clone)]
pub struct EncodedRequest {
    pub content_type: String,
    pub body: Vec<u8>,
}

/// Encode a request for an endpoint using the endpoint's wire encoding
pub fn encode_request(
    request: &SoapRequest,
    spec: &EndpointSpec,
    encoding: MessageEncoding,
) -> Result<EncodedRequest> {
    match encoding {
        MessageEncoding::Text => {
            let body = write_envelope(request, spec.namespace, None)?;
            Ok(EncodedRequest {
                content_type: TEXT_CONTENT_TYPE.to_string(),
                body,
            })
        }
        MessageEncoding::Mtom => {
            let mut attachments = Vec::new();
            let envelope = write_envelope(request, spec.namespace, Some(&mut attachments))?;
            let boundary = mtom::new_boundary();
            let body = mtom::encode(&envelope, &attachments, &boundary);
            Ok(EncodedRequest {
                content_type: mtom::content_type(&boundary),
                body,
            })
        }
    }
}

/// Write a SOAP 1.1 envelope
///
/// With `attachments` set, binary parameters are moved into MTOM parts;
/// without it they are written inline as base64.
pub fn write_envelope(
    request: &SoapRequest,
    namespace: &str,
    mut attachments: Option<&mut Vec<Attachment>>,
) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut envelope = BytesStart::new("soap:Envelope");
    envelope.push_attribute(("xmlns:soap", SOAP11_ENVELOPE_NS));
    envelope.push_attribute(("xmlns:xsi", XSI_NS));
    envelope.push_attribute(("xmlns:xsd", XSD_NS));
    writer.write_event(Event::Start(envelope))?;
    writer.write_event(Event::Start(BytesStart::new("soap:Body")))?;

    let mut operation = BytesStart::new(request.operation.as_str());
    operation.push_attribute(("xmlns", namespace));
    writer.write_event(Event::Start(operation))?;
    for parameter in &request.parameters {
        write_element(&mut writer, parameter, attachments.as_deref_mut())?;
    }
    writer.write_event(Event::End(BytesEnd::new(request.operation.as_str())))?;

    writer.write_event(Event::End(BytesEnd::new("soap:Body")))?;
    writer.write_event(Event::End(BytesEnd::new("soap:Envelope")))?;
    Ok(writer.into_inner())
}

fn write_element(
    writer: &mut Writer<Vec<u8>>,
    element: &XmlElement,
    mut attachments: Option<&mut Vec<Attachment>>,
) -> Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    let empty = element.children.is_empty() && element.text.is_empty() && element.binary.is_none();
    if empty {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    if let Some(binary) = &element.binary {
        match attachments.as_deref_mut() {
            Some(parts) => {
                let content_id = mtom::content_id(parts.len());
                let mut include = BytesStart::new("xop:Include");
                include.push_attribute(("xmlns:xop", XOP_NS));
                include.push_attribute(("href", format!("cid:{content_id}").as_str()));
                writer.write_event(Event::Empty(include))?;
                parts.push(Attachment {
                    content_id,
                    data: binary.clone(),
                });
            }
            None => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(binary);
                writer.write_event(Event::Text(BytesText::new(&encoded)))?;
            }
        }
    } else if !element.text.is_empty() {
        writer.write_event(Event::Text(BytesText::new(&element.text)))?;
    }
    for child in &element.children {
        write_element(writer, child, attachments.as_deref_mut())?;
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
    Ok(())
}

/// Decode a response into the operation's response element
///
/// Multipart bodies are unpacked and their `xop:Include` references resolved
/// before the envelope is inspected. A `Fault` in the body becomes
/// [`Error::Fault`].
pub fn decode_response(content_type: Option<&str>, body: &[u8]) -> Result<XmlElement> {
    let envelope = match content_type {
        Some(ct) if mtom::is_multipart(ct) => {
            let package = mtom::decode(ct, body)?;
            let mut root = XmlElement::parse(&package.root)?;
            mtom::resolve_includes(&mut root, &package.attachments)?;
            root
        }
        _ => XmlElement::parse(body)?,
    };

    if envelope.name != "Envelope" {
        return Err(Error::invalid_response(format!(
            "expected SOAP Envelope, found {}",
            envelope.name
        )));
    }

    let body = envelope
        .child("Body")
        .ok_or_else(|| Error::missing_element("Envelope/Body"))?;
    let payload = body
        .children
        .first()
        .ok_or_else(|| Error::invalid_response("SOAP body is empty"))?;

    if payload.name == "Fault" {
        let code = payload
            .child("faultcode")
            .map(|c| c.text.trim().to_string())
            .unwrap_or_default();
        let message = payload
            .child("faultstring")
            .map(|c| c.text.trim().to_string())
            .unwrap_or_default();
        return Err(Error::fault(code, message));
    }

    trace!(
        "Decoded {} with {} child element(s)",
        payload.name,
        payload.children.len()
    );
    Ok(payload.clone())
}
