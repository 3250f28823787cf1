pub mod path_utils;
pub mod static_files;

pub use static_files::serve;
