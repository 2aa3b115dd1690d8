mod output;
mod section;

pub use output::{OutputBuffer, RenderedLine};
pub use section::{OutputSection, SectionId};
