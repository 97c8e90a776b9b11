pub mod detect;
pub mod format;
pub mod section;

pub use format::{format_reference, CHECKMARK};
pub use section::{read_section, replace_section, SectionUpdate};
