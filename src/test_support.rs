//! Test-only fixtures shared with the integration tests.

use crate as signer_lib;

#[path = "../tests/common/pki.rs"]
mod pki;

pub use pki::{CertBuilder, TestKey, TestPki};
