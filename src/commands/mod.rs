pub mod info;
pub mod section;
