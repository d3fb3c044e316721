// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HMAC-SHA256 signing for payloads fire sends to other services.
//!
//! Build callbacks and replayed GitHub deliveries carry a
//! `X-Hub-Signature-256: sha256=<hex>` header so receivers can authenticate
//! them with the shared secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header name GitHub (and fire callbacks) use for the signature.
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

const SIGNATURE_PREFIX: &str = "sha256=";

/// Compute an HMAC-SHA256 signature for a payload.
///
/// Returns the hex-encoded signature without any prefix.
pub fn compute_hmac_sha256(secret: &[u8], payload: &[u8]) -> String {
	let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
	mac.update(payload);
	let result = mac.finalize();
	hex::encode(result.into_bytes())
}

/// Signature header value in GitHub's format: `sha256=<hex>`.
pub fn signature_header_value(secret: &[u8], payload: &[u8]) -> String {
	format!("{SIGNATURE_PREFIX}{}", compute_hmac_sha256(secret, payload))
}

/// Verify a `sha256=<hex>` header value against a payload.
pub fn verify_signature_header(secret: &[u8], payload: &[u8], header: &str) -> bool {
	let Some(hex_sig) = header.strip_prefix(SIGNATURE_PREFIX) else {
		return false;
	};

	let expected_bytes = match hex::decode(hex_sig) {
		Ok(bytes) => bytes,
		Err(_) => return false,
	};

	let mut mac = match HmacSha256::new_from_slice(secret) {
		Ok(m) => m,
		Err(_) => return false,
	};

	mac.update(payload);
	mac.verify_slice(&expected_bytes).is_ok()
}


#[cfg(test)]
mod proptests {
	use super::*;
	use proptest::prelude::*;

	proptest! {
		#[test]
		fn prop_signature_is_64_hex_chars(
			secret in proptest::collection::vec(proptest::num::u8::ANY, 1..100),
			payload in proptest::collection::vec(proptest::num::u8::ANY, 0..1000)
		) {
			let sig = compute_hmac_sha256(&secret, &payload);
			prop_assert_eq!(sig.len(), 64);
			prop_assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
		}

		#[test]
		fn prop_wrong_secret_fails(
			secret1 in proptest::collection::vec(proptest::num::u8::ANY, 1..100),
			secret2 in proptest::collection::vec(proptest::num::u8::ANY, 1..100),
			payload in proptest::collection::vec(proptest::num::u8::ANY, 1..500)
		) {
			if secret1 != secret2 {
				let header = signature_header_value(&secret1, &payload);
				prop_assert!(!verify_signature_header(&secret2, &payload, &header));
			}
		}
	}
}
