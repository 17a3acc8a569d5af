pub mod admission;
pub mod classify;
pub mod fetch;
pub mod types;

pub use admission::{Admission, admit_images};
pub use classify::classify;
pub use fetch::{InboundAttachment, fetch_attachments};
pub use types::{ContentPackage, ContentType, EncodedImage, RawAttachment, SUPPORTED_IMAGE_TYPES};
