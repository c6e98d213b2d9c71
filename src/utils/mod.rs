// SPDX-License-Identifier: GPL-3.0-only
pub mod certificate;
pub mod checksum;
pub mod url_validator;

pub use certificate::{is_pem_certificate, validate_certificate_file};
pub use checksum::ChecksumType;
pub use url_validator::validate_feed_url;
