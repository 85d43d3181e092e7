pub mod atomic_file;
pub mod attributecache;
pub mod http_client;
pub mod instance_lock;
pub mod musicbrainz;

pub use attributecache::{AttributeCache, CacheError};
pub use http_client::{HttpClient, HttpClientError, HttpResponse, ReqwestHttpClient};
pub use instance_lock::{InstanceLock, LockError};
