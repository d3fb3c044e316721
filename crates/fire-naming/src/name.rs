// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::{Fingerprint, Ref, TrackedRepository};

/// Number of fingerprint characters appended to build environment names.
pub const FINGERPRINT_PREFIX_LEN: usize = 10;

/// A derived environment name. Only [`derive_name`] constructs these.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvironmentName(String);

impl EnvironmentName {
	/// Preview (no fingerprint) or build (with fingerprint) name of a ref.
	pub fn for_ref(repo: &TrackedRepository, r: &Ref, with_fingerprint: bool) -> Self {
		let fingerprint = with_fingerprint.then_some(&r.fingerprint);
		derive_name(&repo.prefix_for(r.kind), &r.id, fingerprint)
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn into_string(self) -> String {
		self.0
	}
}

impl fmt::Display for EnvironmentName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl AsRef<str> for EnvironmentName {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

impl PartialEq<str> for EnvironmentName {
	fn eq(&self, other: &str) -> bool {
		self.0 == other
	}
}

impl PartialEq<&str> for EnvironmentName {
	fn eq(&self, other: &&str) -> bool {
		self.0 == *other
	}
}

/// Reduces a ref identifier to `[a-z0-9-]`.
///
/// ASCII letters are lowercased, every other character outside the alphabet
/// is dropped, runs of `-` collapse to one and edge dashes are trimmed. An
/// identifier with nothing left (`"///"`, non-ASCII names) maps to `ref`
/// followed by eight hex characters of its SHA-256, so the result is never
/// empty and still deterministic.
pub fn sanitize(ident: &str) -> String {
	let mut out = String::with_capacity(ident.len());
	for c in ident.chars() {
		let c = c.to_ascii_lowercase();
		match c {
			'a'..='z' | '0'..='9' => out.push(c),
			'-' => {
				if !out.is_empty() && !out.ends_with('-') {
					out.push('-');
				}
			}
			_ => {}
		}
	}
	while out.ends_with('-') {
		out.pop();
	}

	if out.is_empty() {
		let digest = Sha256::digest(ident.as_bytes());
		return format!("ref{}", &hex::encode(digest)[..8]);
	}
	out
}

/// `prefix-slug`, or `prefix-slug-fp10` when a fingerprint is given.
pub fn derive_name(prefix: &str, ref_id: &str, fingerprint: Option<&Fingerprint>) -> EnvironmentName {
	let base = format!("{prefix}-{}", sanitize(ref_id));
	match fingerprint {
		Some(fp) => EnvironmentName(format!("{base}-{}", fp.prefix(FINGERPRINT_PREFIX_LEN))),
		None => EnvironmentName(base),
	}
}

/// The tracked repository whose prefix owns `name`, if any.
///
/// Ownership needs `<prefix>-` followed by a slug that starts with an
/// alphanumeric character and contains no `--`. Template names such as
/// `sd--base` and temporary names such as `sd-base--tmp` are therefore never
/// owned, and the reconciler never considers them.
pub fn owner_of<'a>(name: &str, repos: &'a [TrackedRepository]) -> Option<&'a TrackedRepository> {
	let (head, rest) = name.split_once('-')?;
	let valid_rest = rest
		.chars()
		.next()
		.is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
		&& rest
			.chars()
			.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
		&& !rest.contains("--");
	if !valid_rest {
		return None;
	}
	repos
		.iter()
		.find(|repo| repo.prefixes().iter().any(|p| p == head))
}

/// Whether `name` ends in `-<10 hex chars>` after a non-empty slug.
pub fn has_fingerprint_suffix(name: &str) -> bool {
	let Some((before, tail)) = name.rsplit_once('-') else {
		return false;
	};
	tail.len() == FINGERPRINT_PREFIX_LEN
		&& tail
			.chars()
			.all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
		&& before.contains('-')
}

/// Names that get a reverse-proxy route: owned preview environments.
///
/// `previews` are names known to be preview environments, derived from live
/// refs. They are routed even when their slug happens to end in ten hex
/// characters (a branch called `fix-deadbeef00`). Other owned names are
/// classified by shape, which leaves out fingerprint-suffixed build
/// environments. Input order is preserved.
pub fn route_candidates<'a, I>(names: I, repos: &[TrackedRepository], previews: &BTreeSet<String>) -> Vec<String>
where
	I: IntoIterator<Item = &'a String>,
{
	names
		.into_iter()
		.filter(|name| {
			owner_of(name, repos).is_some() && (previews.contains(name.as_str()) || !has_fingerprint_suffix(name))
		})
		.cloned()
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::RefKind;
	use proptest::prelude::*;

	fn repos() -> Vec<TrackedRepository> {
		vec![
			TrackedRepository::new("sd", "superdesk/superdesk").unwrap(),
			TrackedRepository::new("sds", "superdesk/superdesk-server").unwrap(),
		]
	}

	fn fp(s: &str) -> Fingerprint {
		Fingerprint::new(s).unwrap()
	}

	#[test]
	fn sanitize_drops_separators() {
		assert_eq!(sanitize("feature/x"), "featurex");
		assert_eq!(sanitize("Feature_X.2"), "featurex2");
		assert_eq!(sanitize("release-1.2"), "release-12");
	}

	#[test]
	fn sanitize_collapses_and_trims_dashes() {
		assert_eq!(sanitize("--a---b--"), "a-b");
		assert_eq!(sanitize("a/-/b"), "a-b");
	}

	#[test]
	fn sanitize_never_returns_empty() {
		let slug = sanitize("///");
		assert!(slug.starts_with("ref"));
		assert_eq!(slug.len(), 11);
		assert_ne!(sanitize("///"), sanitize("日本"));
	}

	#[test]
	fn derive_name_without_fingerprint() {
		assert_eq!(derive_name("superdesk", "feature/x", None), "superdesk-featurex");
	}

	#[test]
	fn derive_name_appends_ten_fingerprint_chars() {
		let name = derive_name("superdesk", "feature/x", Some(&fp("ab12cd34ef5678901234")));
		assert_eq!(name, "superdesk-featurex-ab12cd34ef");
	}

	#[test]
	fn for_ref_uses_pr_prefix() {
		let repo = &repos()[0];
		let r = Ref::pull_request(42, fp("0123456789abcdef"));
		assert_eq!(r.kind, RefKind::PullRequest);
		assert_eq!(EnvironmentName::for_ref(repo, &r, false), "sdpr-42");
		assert_eq!(EnvironmentName::for_ref(repo, &r, true), "sdpr-42-0123456789");
	}

	#[test]
	fn owner_matches_whole_prefix() {
		let repos = repos();
		assert_eq!(owner_of("sd-master", &repos).unwrap().short_name, "sd");
		assert_eq!(owner_of("sdpr-12", &repos).unwrap().short_name, "sd");
		assert_eq!(owner_of("sds-master", &repos).unwrap().short_name, "sds");
		assert_eq!(owner_of("sdspr-3", &repos).unwrap().short_name, "sds");
		assert!(owner_of("sdx-master", &repos).is_none());
	}

	#[test]
	fn templates_are_not_owned() {
		let repos = repos();
		assert!(owner_of("sd--base", &repos).is_none());
		assert!(owner_of("sd-base--tmp", &repos).is_none());
		assert!(owner_of("sd-", &repos).is_none());
		assert!(owner_of("sd", &repos).is_none());
		assert!(owner_of("sd-Master", &repos).is_none());
	}

	#[test]
	fn fingerprint_suffix_detection() {
		assert!(has_fingerprint_suffix("sd-master-0123456789"));
		assert!(!has_fingerprint_suffix("sd-master"));
		assert!(!has_fingerprint_suffix("sd-0123456789"));
		assert!(!has_fingerprint_suffix("sd-master-012345678"));
		assert!(!has_fingerprint_suffix("sd-master-012345678z"));
	}

	#[test]
	fn route_candidates_keep_preview_environments_only() {
		let names: Vec<String> = ["sd-master", "sd-master-0123456789", "sdpr-7", "other", "sd--base"]
			.into_iter()
			.map(String::from)
			.collect();
		assert_eq!(route_candidates(&names, &repos(), &BTreeSet::new()), vec!["sd-master", "sdpr-7"]);
	}

	#[test]
	fn known_preview_with_hex_looking_slug_is_routed() {
		let repo = &repos()[0];
		let preview = EnvironmentName::for_ref(repo, &Ref::branch("fix-deadbeef00", fp("0123456789abcdef")), false);
		assert_eq!(preview, "sd-fix-deadbeef00");
		assert!(has_fingerprint_suffix(preview.as_str()));

		let names: Vec<String> = ["sd-fix-deadbeef00", "sd-master-0123456789"]
			.into_iter()
			.map(String::from)
			.collect();
		assert!(route_candidates(&names, &repos(), &BTreeSet::new()).is_empty());

		let previews = BTreeSet::from([preview.into_string()]);
		assert_eq!(route_candidates(&names, &repos(), &previews), vec!["sd-fix-deadbeef00"]);
	}

	proptest! {
		#[test]
		fn prop_derive_name_is_deterministic(
			prefix in "[a-z]{1,6}",
			ident in ".{0,40}",
			sha in "[0-9a-f]{40}",
		) {
			let fp = fp(&sha);
			prop_assert_eq!(derive_name(&prefix, &ident, None), derive_name(&prefix, &ident, None));
			prop_assert_eq!(
				derive_name(&prefix, &ident, Some(&fp)),
				derive_name(&prefix, &ident, Some(&fp))
			);
		}

		#[test]
		fn prop_sanitize_output_alphabet(ident in ".{0,60}") {
			let slug = sanitize(&ident);
			prop_assert!(!slug.is_empty());
			prop_assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
			prop_assert!(!slug.starts_with('-') && !slug.ends_with('-'));
			prop_assert!(!slug.contains("--"));
		}

		#[test]
		fn prop_sanitize_is_idempotent(ident in ".{0,60}") {
			let once = sanitize(&ident);
			prop_assert_eq!(sanitize(&once), once.clone());
		}

		// Canonical identifiers (already in the output alphabet) are mapped to
		// themselves, so two distinct canonical identifiers never collide.
		// Identifiers outside the alphabet can collapse onto one slug; that case
		// is caught by `detect_collisions` instead.
		#[test]
		fn prop_canonical_identifiers_never_collide(
			a in "[a-z0-9]{1,12}(-[a-z0-9]{1,12}){0,3}",
			b in "[a-z0-9]{1,12}(-[a-z0-9]{1,12}){0,3}",
		) {
			prop_assume!(a != b);
			prop_assert_ne!(derive_name("sd", &a, None), derive_name("sd", &b, None));
		}

		#[test]
		fn prop_derived_names_are_owned(ident in ".{0,40}", sha in "[0-9a-f]{40}") {
			let repos = repos();
			let fp = fp(&sha);
			let base = derive_name("sd", &ident, None);
			let build = derive_name("sd", &ident, Some(&fp));
			prop_assert_eq!(&owner_of(base.as_str(), &repos).unwrap().short_name, "sd");
			prop_assert_eq!(&owner_of(build.as_str(), &repos).unwrap().short_name, "sd");
			prop_assert!(has_fingerprint_suffix(build.as_str()));
		}
	}
}
