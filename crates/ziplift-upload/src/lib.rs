//! Directory upload to an object store.
//!
//! A directory is walked in enumeration order and every regular file is
//! put to the store under `<prefix><relative path>`, strictly one file at a
//! time. The first failure ends that directory's upload. Several
//! directories can be uploaded concurrently with [`Uploader::upload_all`];
//! each call owns its own progress counters.

pub use error::{Result, StoreError, UploadError};
pub use key::object_key;
pub use progress::{Progress, ProgressSnapshot, UploadProgress};
pub use store::{BoxStream, FsObjectStore, ObjectBody, ObjectStore};
#[cfg(feature = "reqwest")]
pub use store::{HttpObjectStore, HttpStoreError};
pub use uploader::{JobOutcome, ProgressCallback, UploadJob, UploadOptions, UploadReport, Uploader};

mod error;
mod key;
pub mod progress;
pub mod store;
mod uploader;
