pub mod div;
pub mod temporary_file;
