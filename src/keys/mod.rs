//! Loading signing credentials from disk.

pub mod loader;

pub use loader::{
    load_key_pair_from_json, load_key_pair_from_pem, load_private_key_from_json,
    load_x509_credential,
};
