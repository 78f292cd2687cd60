//! Gutachten Document Renderer
//!
//! Renders a validated [`SubmissionRecord`](gutachten_common::SubmissionRecord)
//! into a paginated PDF with a fixed letterhead, the client, vehicle and
//! incident sections, and a place/date/signature block.

pub mod errors;
pub mod layout;
pub mod renderer;
pub mod signature;
pub mod text;

pub use errors::{RenderError, SignatureError};
pub use renderer::{document_file_name, DocumentRenderer, PdfRenderer, RenderedDocument};
