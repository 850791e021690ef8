pub mod arch;
pub mod filesystems;
