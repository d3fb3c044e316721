// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Route block templates.
//!
//! A placeholder is `{` immediately followed by lowercase letters or `_` and
//! a closing `}`: `{name}`, `{host}` and `{address}`. Any other brace is
//! literal text, so nginx blocks (`server {`, `location / {`) need no escaping.

use std::path::Path;

use crate::error::{ProxyError, RenderError};

pub const DEFAULT_TEMPLATE: &str = "\
server {
	listen 80;
	server_name {host};

	location /.well-known/acme-challenge/ {
		root /var/tmp;
	}

	location / {
		proxy_pass http://{address};
		proxy_set_header Host $host;
		proxy_set_header X-Real-IP $remote_addr;
		proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
		proxy_set_header X-Forwarded-Proto $scheme;
		proxy_http_version 1.1;
		proxy_set_header Upgrade $http_upgrade;
		proxy_set_header Connection \"upgrade\";
		proxy_read_timeout 300;
	}
}
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
	Name,
	Host,
	Address,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
	Literal(String),
	Field(Field),
}

/// A parsed, validated route template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTemplate {
	segments: Vec<Segment>,
}

impl RouteTemplate {
	pub fn parse(source: &str) -> Result<Self, RenderError> {
		let mut segments = Vec::new();
		let mut literal = String::new();
		let mut rest = source;

		while let Some(open) = rest.find('{') {
			literal.push_str(&rest[..open]);
			let after = &rest[open + 1..];
			let ident_len = after
				.find(|c: char| !(c.is_ascii_lowercase() || c == '_'))
				.unwrap_or(after.len());

			if ident_len > 0 && after[ident_len..].starts_with('}') {
				let ident = &after[..ident_len];
				let field = match ident {
					"name" => Field::Name,
					"host" => Field::Host,
					"address" => Field::Address,
					other => return Err(RenderError::UnknownPlaceholder(other.to_string())),
				};
				if !literal.is_empty() {
					segments.push(Segment::Literal(std::mem::take(&mut literal)));
				}
				segments.push(Segment::Field(field));
				rest = &after[ident_len + 1..];
			} else {
				literal.push('{');
				rest = after;
			}
		}
		literal.push_str(rest);
		if !literal.is_empty() {
			segments.push(Segment::Literal(literal));
		}

		Ok(Self { segments })
	}

	/// Reads and parses a template file.
	pub fn from_file(path: &Path) -> Result<Self, ProxyError> {
		let source = std::fs::read_to_string(path).map_err(|e| ProxyError::TemplateRead {
			path: path.to_path_buf(),
			source: e,
		})?;
		Ok(Self::parse(&source)?)
	}

	pub fn render_into(&self, out: &mut String, name: &str, host: &str, address: &str) {
		for segment in &self.segments {
			match segment {
				Segment::Literal(text) => out.push_str(text),
				Segment::Field(Field::Name) => out.push_str(name),
				Segment::Field(Field::Host) => out.push_str(host),
				Segment::Field(Field::Address) => out.push_str(address),
			}
		}
	}
}

impl Default for RouteTemplate {
	fn default() -> Self {
		Self::parse(DEFAULT_TEMPLATE).unwrap_or(Self { segments: Vec::new() })
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn render(template: &RouteTemplate) -> String {
		let mut out = String::new();
		template.render_into(&mut out, "sd-master", "sd-master.example.org", "10.0.3.2");
		out
	}

	#[test]
	fn default_template_parses() {
		let template = RouteTemplate::parse(DEFAULT_TEMPLATE).unwrap();
		let out = render(&template);
		assert!(out.contains("server_name sd-master.example.org;"));
		assert!(out.contains("proxy_pass http://10.0.3.2;"));
		assert!(out.starts_with("server {"));
	}

	#[test]
	fn nginx_braces_are_literal() {
		let template = RouteTemplate::parse("location ~ ^/a{2}/ { return 204; } {name}").unwrap();
		assert_eq!(render(&template), "location ~ ^/a{2}/ { return 204; } sd-master");
	}

	#[test]
	fn unknown_placeholder_is_rejected() {
		assert_eq!(
			RouteTemplate::parse("listen {port};"),
			Err(RenderError::UnknownPlaceholder("port".to_string()))
		);
	}

	#[test]
	fn unterminated_brace_is_literal() {
		let template = RouteTemplate::parse("a {name").unwrap();
		assert_eq!(render(&template), "a {name");
	}

	proptest! {
		#[test]
		fn prop_brace_free_text_is_unchanged(text in "[^{}]{0,200}") {
			let template = RouteTemplate::parse(&text).unwrap();
			prop_assert_eq!(render(&template), text);
		}
	}
}
