//! Display model for the safe HTML subset shown in the browser window.
//!
//! [`RichTextDocument::from_markup`] turns markup into blocks of styled
//! spans. Painting them is left to the UI.

mod color;
mod document;
mod entities;
mod tokenizer;

pub use color::Rgb;
pub use color::color_from_style;
pub use color::parse_color;
pub use document::Block;
pub use document::BlockKind;
pub use document::RichTextDocument;
pub use document::Span;
pub use document::SpanStyle;
pub use document::extract_title;
pub use entities::decode_entities;
