//! # mailbridge-mime
//!
//! Parsing side of RFC 5322 / MIME, sized for notifications: headers,
//! transfer encodings, RFC 2047 encoded words, multipart walking and a
//! [`Summary`] of sender, subject, date and body excerpt.
//!
//! ```
//! use mailbridge_mime::Summary;
//!
//! let raw = b"From: Alice <alice@example.com>\r\nSubject: Hi\r\n\r\nHello";
//! let summary = Summary::parse(raw, 0).unwrap();
//! assert_eq!(summary.subject.as_deref(), Some("Hi"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod charset;
mod content_type;
mod error;
mod header;
mod message;
mod summary;
mod text;

pub mod encoding;

pub use address::Address;
pub use charset::decode_charset;
pub use content_type::ContentType;
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{Message, Part, TransferEncoding};
pub use summary::{Summary, parse_date};
pub use text::{excerpt, html_to_text};
