//! # MedRec Client
//!
//! 面向远端影像记录接口的客户端层：传输、上传、记录/用户服务、
//! 会话与本地键值存储。

pub mod config;
pub mod records;
pub mod session;
pub mod storage;
pub mod transport;
pub mod upload;
pub mod users;

pub use config::{endpoints, ClientConfig};
pub use records::{RecordGateway, RecordService};
pub use session::{AuthMode, SessionStore};
pub use storage::LocalStore;
pub use transport::{ApiClient, ApiEnvelope, CredentialProvider, NoCredentials};
pub use upload::{CancelToken, ImageFile, ProgressFn, UploadClient};
pub use users::UserService;
