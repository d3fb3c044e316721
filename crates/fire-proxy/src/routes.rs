// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::BTreeMap;

use fire_runtime::Environment;

use crate::error::RenderError;
use crate::template::RouteTemplate;

/// One hostname routed to an environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
	pub name: String,
	pub host: String,
	pub address: String,
}

/// The full routing table, in render order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
	routes: Vec<Route>,
}

impl RouteTable {
	/// Builds the table for `environments`.
	///
	/// The `primary` environment, when present, comes first so the proxy
	/// treats it as the default server. The rest are sorted by name. Duplicate
	/// names collapse to one route.
	pub fn build(environments: &[Environment], domain: &str, primary: Option<&str>) -> Result<Self, RenderError> {
		let domain = domain.trim().trim_matches('.');
		if domain.is_empty() {
			return Err(RenderError::EmptyDomain);
		}

		let mut by_name = BTreeMap::new();
		for env in environments {
			let address = env
				.address
				.as_deref()
				.filter(|a| !a.is_empty())
				.ok_or_else(|| RenderError::MissingAddress(env.name.clone()))?;
			by_name.insert(env.name.as_str(), address);
		}

		let (front, rest): (Vec<_>, Vec<_>) = by_name
			.into_iter()
			.partition(|(name, _)| Some(*name) == primary);

		let routes = front
			.into_iter()
			.chain(rest)
			.map(|(name, address)| Route {
				name: name.to_string(),
				host: format!("{name}.{domain}"),
				address: address.to_string(),
			})
			.collect();

		Ok(Self { routes })
	}

	pub fn routes(&self) -> &[Route] {
		&self.routes
	}

	pub fn is_empty(&self) -> bool {
		self.routes.is_empty()
	}

	pub fn len(&self) -> usize {
		self.routes.len()
	}

	/// Hostnames in render order.
	pub fn hosts(&self) -> Vec<String> {
		self.routes.iter().map(|r| r.host.clone()).collect()
	}

	/// hostname -> address.
	pub fn to_map(&self) -> BTreeMap<String, String> {
		self.routes
			.iter()
			.map(|r| (r.host.clone(), r.address.clone()))
			.collect()
	}

	pub fn render(&self, template: &RouteTemplate) -> String {
		let mut out = String::new();
		for (i, route) in self.routes.iter().enumerate() {
			if i > 0 {
				out.push('\n');
			}
			template.render_into(&mut out, &route.name, &route.host, &route.address);
		}
		out
	}
}

/// Renders the proxy configuration for `environments`.
pub fn render(
	environments: &[Environment],
	template: &RouteTemplate,
	domain: &str,
	primary: Option<&str>,
) -> Result<String, RenderError> {
	Ok(RouteTable::build(environments, domain, primary)?.render(template))
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn env(name: &str, address: &str) -> Environment {
		Environment::running(name, Some(address.to_string()))
	}

	fn simple() -> RouteTemplate {
		RouteTemplate::parse("{host} -> {address}\n").unwrap()
	}

	#[test]
	fn primary_is_rendered_first() {
		let envs = [env("sd-a", "10.0.0.1"), env("sd-master", "10.0.0.2"), env("sd-b", "10.0.0.3")];
		let out = render(&envs, &simple(), "test.example.org", Some("sd-master")).unwrap();
		assert_eq!(
			out,
			"sd-master.test.example.org -> 10.0.0.2\n\nsd-a.test.example.org -> 10.0.0.1\n\nsd-b.test.example.org -> 10.0.0.3\n"
		);
	}

	#[test]
	fn absent_primary_keeps_sorted_order() {
		let envs = [env("sd-b", "10.0.0.3"), env("sd-a", "10.0.0.1")];
		let table = RouteTable::build(&envs, "x.org", Some("sd-master")).unwrap();
		assert_eq!(table.hosts(), vec!["sd-a.x.org", "sd-b.x.org"]);
	}

	#[test]
	fn missing_address_aborts() {
		let envs = [env("sd-a", "10.0.0.1"), Environment::running("sd-b", None)];
		assert_eq!(
			RouteTable::build(&envs, "x.org", None),
			Err(RenderError::MissingAddress("sd-b".to_string()))
		);
	}

	#[test]
	fn empty_domain_aborts() {
		assert_eq!(RouteTable::build(&[], " . ", None), Err(RenderError::EmptyDomain));
	}

	#[test]
	fn empty_table_renders_empty_file() {
		let table = RouteTable::build(&[], "x.org", Some("sd-master")).unwrap();
		assert!(table.is_empty());
		assert_eq!(table.render(&simple()), "");
	}

	#[test]
	fn to_map_maps_hosts_to_addresses() {
		let table = RouteTable::build(&[env("sd-a", "10.0.0.1")], "x.org", None).unwrap();
		assert_eq!(table.to_map().get("sd-a.x.org").map(String::as_str), Some("10.0.0.1"));
	}

	proptest! {
		#[test]
		fn prop_render_is_order_independent(
			names in proptest::collection::btree_set("[a-z]{1,8}", 0..10).prop_map(|s| s.into_iter().collect::<Vec<_>>()),
			primary_idx in 0usize..10,
		) {
			let primary = names.get(primary_idx).cloned();
			let envs: Vec<Environment> = names.iter().enumerate().map(|(i, n)| env(n, &format!("10.0.0.{i}"))).collect();
			let first = render(&envs, &simple(), "x.org", primary.as_deref()).unwrap();

			let mut reversed = envs.clone();
			reversed.reverse();
			let second = render(&reversed, &simple(), "x.org", primary.as_deref()).unwrap();
			prop_assert_eq!(&first, &second);

			if let Some(primary) = primary {
				let expected_prefix = format!("{primary}.x.org");
				prop_assert!(first.starts_with(&expected_prefix));
			}
		}
	}
}
