//! SOAP 1.1 message codec
//!
//! Requests are written as SOAP 1.1 envelopes, either as plain UTF-8 text or
//! packaged with MTOM. Responses in either form are decoded back into an
//! [`XmlElement`] tree rooted at the operation's response element.

mod envelope;
pub mod mtom;
pub mod xml;

pub use envelope::{
    EncodedRequest, SOAP11_ENVELOPE_NS, SoapRequest, TEXT_CONTENT_TYPE, decode_response,
    encode_request, write_envelope,
};
pub use xml::XmlElement;
