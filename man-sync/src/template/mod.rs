//! Note templating: filters, placeholder rendering, entry contexts and
//! frontmatter records.

pub mod context;
pub mod engine;
pub mod filters;
pub mod frontmatter;

pub use context::entry_context;
pub use engine::TemplateEngine;
pub use filters::{FilterRegistry, SystemClock};
pub use frontmatter::{build_frontmatter, FieldType, FrontmatterEntry};
