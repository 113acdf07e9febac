pub mod ambient;
pub mod config;
pub mod csrf;
pub mod exception;
pub mod param;
pub mod request;
pub mod session;
pub mod upload;
pub mod util;
pub mod validation;

pub use ambient::Ambient;
pub use config::Config;
pub use exception::Exception;
pub use param::{HttpMethod, HttpVersion};
pub use request::{ParamMap, RequestBuilder, RequestFacade};
pub use session::{MemorySession, SessionStore};
pub use upload::{FileUpload, UploadEntry, UploadedFile};
pub use validation::ValidationErrors;
