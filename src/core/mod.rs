//! Core data types and I/O operations.

pub mod stack;
pub mod writers;

pub use stack::{find_class_stack, read_images, ClassImage, ClassStack, MrcHeader, StackError};
pub use writers::{
    copy_stack, write_data_star, write_info_file, write_model_star, write_score_report, WriteError,
};
