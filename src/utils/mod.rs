pub mod constants;
pub mod coordinates;
pub mod filename;
pub mod progress;

pub use constants::*;
pub use coordinates::{mean_center, validate_coordinates};
pub use filename::{generate_default_map_filename, generate_default_output_filename, join_object_path};
pub use progress::ProgressReporter;
