//! In-page presentation: the hover highlight and the confirmation toolbar.

pub mod highlight;
pub mod overlay;
