//! I/O layer: the XNAT REST client (`xnat`), XML catalog parsing (`catalog`),
//! NIfTI header access (`nifti`), zip extraction (`archive`), credential
//! resolution (`credentials`) and small file `writers`.
pub mod xnat;
pub use xnat::{RemoteFile, ResourceOwner, ResourceRef, XnatApi, XnatClient};

pub mod archive;
pub mod catalog;
pub use catalog::Investigator;

pub mod credentials;
pub use credentials::XnatCredentials;

pub mod nifti;
pub use self::nifti::{NiftiTiming, TimeUnit};

pub mod writers;
