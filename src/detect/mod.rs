pub mod backend;
pub mod backends;
pub mod filter;
pub mod result;

pub use backend::DetectorBackend;
pub use filter::filter;
pub use result::{Category, CategoryStyle, Detection, RawDetection, RenderPolicy};
