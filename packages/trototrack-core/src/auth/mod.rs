//! Session credentials and the token sources that feed authorized requests.

mod credentials;
mod token;

pub(crate) use credentials::get_config_dir;
pub use credentials::{
    credential_storage_info, delete_credentials, load_credentials, save_credentials, Credentials,
};
pub use token::{StaticToken, StoredCredentials, TokenPublisher, TokenSource, WatchTokenSource};
