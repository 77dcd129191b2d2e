mod credentials_store;

pub use credentials_store::{delete_credentials, get_credentials, store_credentials, Credentials};
