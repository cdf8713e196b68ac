//! Project-root deduction: turns an import path into a `(project_root, source_url)`
//! pair via a prioritized chain of registered patterns, falling back to an HTML
//! meta-import lookup against the host.

use regex::Regex;

use crate::config::DeductionPattern;
use crate::core::error::{ResolverError, Result};
use crate::vcs::VcsKind;

/// The outcome of a successful deduction: the project root the import path collapses to,
/// the fetch URL for the underlying VCS, and which VCS it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeducedSource {
    pub project_root: String,
    pub source_url: String,
    pub vcs: VcsKind,
}

/// Applies `patterns` in order; the first whose `prefix` matches `import_path` and whose
/// regex successfully captures `root`/`source` wins. Returns `None` if nothing matches,
/// signaling the caller should fall through to the HTML meta-import lookup.
#[must_use]
pub fn deduce_from_patterns(import_path: &str, patterns: &[DeductionPattern]) -> Option<DeducedSource> {
    for pattern in patterns {
        let Some(rest) = import_path.strip_prefix(pattern.prefix.as_str()) else { continue };
        let Ok(re) = Regex::new(&pattern.pattern) else { continue };
        let Some(captures) = re.captures(rest) else { continue };
        let root = captures.name("root").map(|m| m.as_str())?;
        let vcs = captures.name("vcs").map(|m| m.as_str()).map(parse_vcs_name).unwrap_or(VcsKind::Git);
        let source_url = if let Some(fixed) = &pattern.source_override {
            fixed.clone()
        } else {
            let source = captures.name("source").map(|m| m.as_str()).unwrap_or(root);
            // A `source` capture that already names a scheme (`file://`, `ssh://`, ...)
            // is used verbatim; otherwise it's a path appended to the prefix under the
            // pattern's configured scheme (`https` unless overridden).
            if source.contains("://") {
                source.to_string()
            } else {
                format!("{}://{}{}", pattern.scheme.as_deref().unwrap_or("https"), pattern.prefix, source)
            }
        };
        return Some(DeducedSource { project_root: format!("{}{}", pattern.prefix, root), source_url, vcs });
    }
    None
}

fn parse_vcs_name(name: &str) -> VcsKind {
    match name {
        "hg" | "mercurial" => VcsKind::Mercurial,
        "bzr" | "bazaar" => VcsKind::Bazaar,
        "svn" | "subversion" => VcsKind::Subversion,
        _ => VcsKind::Git,
    }
}

/// Fetches `https://{host}/{path}?go-get=1`-style HTML (falling back to plain HTTP on
/// failure) and parses `<meta name="go-import" content="root vcs url">`-equivalent tags,
/// Pure with respect to its inputs and the HTTP responses it receives — the same
/// import path and the same server response always deduce the same source.
pub async fn deduce_from_meta_import(import_path: &str, client: &reqwest::Client) -> Result<DeducedSource> {
    let Some((host, path)) = import_path.split_once('/') else {
        return Err(ResolverError::MissingProject { project_root: import_path.to_string() });
    };

    let https_url = format!("https://{host}/{path}?go-get=1");
    let body = match client.get(&https_url).send().await {
        Ok(resp) if resp.status().is_success() => resp.text().await.ok(),
        _ => None,
    };
    let body = match body {
        Some(b) => b,
        None => {
            let http_url = format!("http://{host}/{path}?go-get=1");
            client
                .get(&http_url)
                .send()
                .await
                .map_err(|e| ResolverError::SourceUnreachable { source: import_path.to_string(), reason: e.to_string() })?
                .text()
                .await
                .map_err(|e| ResolverError::SourceUnreachable { source: import_path.to_string(), reason: e.to_string() })?
        }
    };

    parse_meta_import(&body, import_path)
}

/// Parses `<meta name="go-import" content="root vcs url">` tags out of an HTML document.
/// Exposed separately from [`deduce_from_meta_import`] so the parsing logic is testable
/// without a live HTTP fetch.
fn parse_meta_import(html: &str, import_path: &str) -> Result<DeducedSource> {
    let re = Regex::new(r#"<meta\s+name=["']go-import["']\s+content=["']([^"']+)["']"#).expect("static regex is valid");
    for captures in re.captures_iter(html) {
        let content = &captures[1];
        let mut fields = content.split_whitespace();
        let (Some(root), Some(vcs_name), Some(url)) = (fields.next(), fields.next(), fields.next()) else { continue };
        if import_path.starts_with(root) {
            return Ok(DeducedSource { project_root: root.to_string(), source_url: url.to_string(), vcs: parse_vcs_name(vcs_name) });
        }
    }
    Err(ResolverError::MissingProject { project_root: import_path.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_match_captures_root_and_source() {
        let patterns = vec![DeductionPattern {
            prefix: "github.com/".to_string(),
            pattern: r"^(?P<root>[^/]+/[^/]+)".to_string(),
            scheme: None,
            source_override: None,
        }];
        let deduced = deduce_from_patterns("github.com/foo/bar/sub/pkg", &patterns).unwrap();
        assert_eq!(deduced.project_root, "github.com/foo/bar");
        assert_eq!(deduced.vcs, VcsKind::Git);
    }

    #[test]
    fn source_capture_with_a_scheme_is_used_verbatim() {
        let patterns = vec![DeductionPattern {
            prefix: "test.local/".to_string(),
            pattern: r"^(?P<root>[^/]+)/(?P<source>.+)$".to_string(),
            scheme: None,
            source_override: None,
        }];
        let deduced = deduce_from_patterns("test.local/repo-a/file:///tmp/repo-a", &patterns).unwrap();
        assert_eq!(deduced.project_root, "test.local/repo-a");
        assert_eq!(deduced.source_url, "file:///tmp/repo-a");
    }

    #[test]
    fn configured_scheme_overrides_the_https_default() {
        let patterns = vec![DeductionPattern {
            prefix: "test.local".to_string(),
            pattern: r"^(?P<root>/.+)$".to_string(),
            scheme: Some("file".to_string()),
            source_override: None,
        }];
        let deduced = deduce_from_patterns("test.local/tmp/fixture-a", &patterns).unwrap();
        assert_eq!(deduced.project_root, "test.local/tmp/fixture-a");
        assert_eq!(deduced.source_url, "file:///tmp/fixture-a");
    }

    #[test]
    fn fixed_source_override_bypasses_derivation_entirely() {
        let patterns = vec![DeductionPattern {
            prefix: "example.com/pinned".to_string(),
            pattern: r"^(?P<root>)$".to_string(),
            scheme: None,
            source_override: Some("file:///srv/pinned".to_string()),
        }];
        let deduced = deduce_from_patterns("example.com/pinned", &patterns).unwrap();
        assert_eq!(deduced.project_root, "example.com/pinned");
        assert_eq!(deduced.source_url, "file:///srv/pinned");
    }

    #[test]
    fn no_matching_prefix_returns_none() {
        let patterns = vec![DeductionPattern {
            prefix: "bitbucket.org/".to_string(),
            pattern: r"^(?P<root>[^/]+/[^/]+)".to_string(),
            scheme: None,
            source_override: None,
        }];
        assert!(deduce_from_patterns("github.com/foo/bar", &patterns).is_none());
    }

    #[test]
    fn meta_import_tag_is_parsed() {
        let html = r#"<html><head>
            <meta name="go-import" content="example.com/pkg git https://github.com/example/pkg">
        </head></html>"#;
        let deduced = parse_meta_import(html, "example.com/pkg/sub").unwrap();
        assert_eq!(deduced.project_root, "example.com/pkg");
        assert_eq!(deduced.source_url, "https://github.com/example/pkg");
        assert_eq!(deduced.vcs, VcsKind::Git);
    }

    #[test]
    fn missing_meta_tag_is_an_error() {
        let html = "<html><head></head></html>";
        assert!(parse_meta_import(html, "example.com/pkg").is_err());
    }
}
