//! RFC 3986 reference resolution, enough for `@base` handling.

/// True if the IRI has a scheme.
pub fn is_absolute(iri: &str) -> bool {
    match iri.find(':') {
        Some(colon) => {
            let scheme = &iri[..colon];
            !scheme.is_empty()
                && scheme.as_bytes()[0].is_ascii_alphabetic()
                && scheme
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'-' || b == b'.')
        }
        None => false,
    }
}

pub fn is_blank(value: &str) -> bool {
    value.starts_with("_:")
}

#[derive(Debug, Default, PartialEq)]
struct Parts<'a> {
    scheme: Option<&'a str>,
    authority: Option<&'a str>,
    path: &'a str,
    query: Option<&'a str>,
    fragment: Option<&'a str>,
}

impl<'a> Parts<'a> {
    fn parse(iri: &'a str) -> Parts<'a> {
        let mut rest = iri;
        let mut parts = Parts::default();
        if is_absolute(rest) {
            if let Some((scheme, tail)) = rest.split_once(':') {
                parts.scheme = Some(scheme);
                rest = tail;
            }
        }
        if let Some((head, fragment)) = rest.split_once('#') {
            parts.fragment = Some(fragment);
            rest = head;
        }
        if let Some((head, query)) = rest.split_once('?') {
            parts.query = Some(query);
            rest = head;
        }
        if let Some(tail) = rest.strip_prefix("//") {
            let end = tail.find('/').unwrap_or(tail.len());
            parts.authority = Some(&tail[..end]);
            rest = &tail[end..];
        }
        parts.path = rest;
        parts
    }
}

fn recompose(
    scheme: Option<&str>,
    authority: Option<&str>,
    path: &str,
    query: Option<&str>,
    fragment: Option<&str>,
) -> String {
    let mut iri = String::new();
    if let Some(scheme) = scheme {
        iri.push_str(scheme);
        iri.push(':');
    }
    if let Some(authority) = authority {
        iri.push_str("//");
        iri.push_str(authority);
    }
    iri.push_str(path);
    if let Some(query) = query {
        iri.push('?');
        iri.push_str(query);
    }
    if let Some(fragment) = fragment {
        iri.push('#');
        iri.push_str(fragment);
    }
    iri
}

fn remove_dot_segments(path: &str) -> String {
    let mut output: Vec<&str> = vec![];
    let segments: Vec<&str> = path.split('/').collect();
    let last = segments.len().saturating_sub(1);
    for (i, segment) in segments.iter().enumerate() {
        match *segment {
            "." => {
                if i == last {
                    output.push("");
                }
            }
            ".." => {
                if output.len() > 1 || output.first().is_some_and(|first| !first.is_empty()) {
                    output.pop();
                }
                if i == last {
                    output.push("");
                }
            }
            segment => output.push(segment),
        }
    }
    let mut result = output.join("/");
    if path.starts_with('/') && !result.starts_with('/') {
        result.insert(0, '/');
    }
    result
}

/// Resolves `reference` against `base` (RFC 3986 section 5.2).
pub fn resolve(base: Option<&str>, reference: &str) -> String {
    let Some(base) = base.filter(|base| !base.is_empty()) else {
        return reference.to_owned();
    };
    let r = Parts::parse(reference);
    if r.scheme.is_some() {
        return recompose(
            r.scheme,
            r.authority,
            &remove_dot_segments(r.path),
            r.query,
            r.fragment,
        );
    }
    let b = Parts::parse(base);
    let (authority, path, query) = if r.authority.is_some() {
        (r.authority, remove_dot_segments(r.path), r.query)
    } else if r.path.is_empty() {
        (b.authority, b.path.to_owned(), r.query.or(b.query))
    } else if r.path.starts_with('/') {
        (b.authority, remove_dot_segments(r.path), r.query)
    } else {
        let merged = if b.authority.is_some() && b.path.is_empty() {
            format!("/{}", r.path)
        } else {
            match b.path.rfind('/') {
                Some(slash) => format!("{}{}", &b.path[..=slash], r.path),
                None => r.path.to_owned(),
            }
        };
        (b.authority, remove_dot_segments(&merged), r.query)
    };
    recompose(b.scheme, authority, &path, query, r.fragment)
}

/// Shortest reference that resolves to `iri` against `base`.
pub fn make_relative(base: Option<&str>, iri: &str) -> String {
    let Some(base) = base.filter(|base| !base.is_empty()) else {
        return iri.to_owned();
    };
    let b = Parts::parse(base);
    let root = recompose(b.scheme, b.authority, "", None, None);
    let Some(rest) = iri.strip_prefix(root.as_str()) else {
        return iri.to_owned();
    };
    if b.authority.is_some() && !(rest.is_empty() || rest.starts_with(['/', '?', '#'])) {
        return iri.to_owned();
    }
    let rel = Parts::parse(rest);
    let base_path = remove_dot_segments(b.path);
    let rel_path = remove_dot_segments(rel.path);
    let mut base_segments: Vec<&str> = base_path.split('/').collect();
    let mut iri_segments: Vec<&str> = rel_path.split('/').collect();
    let last = if rel.fragment.is_some() || rel.query.is_some() {
        0
    } else {
        1
    };
    while !base_segments.is_empty() && iri_segments.len() > last {
        if base_segments[0] != iri_segments[0] {
            break;
        }
        base_segments.remove(0);
        iri_segments.remove(0);
    }
    let mut relative = String::new();
    if !base_segments.is_empty() {
        base_segments.pop();
        for _ in &base_segments {
            relative.push_str("../");
        }
    }
    relative.push_str(&iri_segments.join("/"));
    if let Some(query) = rel.query {
        relative.push('?');
        relative.push_str(query);
    }
    if let Some(fragment) = rel.fragment {
        relative.push('#');
        relative.push_str(fragment);
    }
    if relative.is_empty() {
        relative.push_str("./");
    }
    relative
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_needs_scheme() {
        assert!(is_absolute("http://example.com/"));
        assert!(is_absolute("urn:uuid:1234"));
        assert!(!is_absolute("http//example.com/"));
        assert!(!is_absolute("1"));
        assert!(!is_absolute(":name"));
    }

    #[test]
    fn resolves_rfc3986_examples() {
        let base = Some("http://a/b/c/d;p?q");
        assert_eq!(resolve(base, "g"), "http://a/b/c/g");
        assert_eq!(resolve(base, "./g"), "http://a/b/c/g");
        assert_eq!(resolve(base, "g/"), "http://a/b/c/g/");
        assert_eq!(resolve(base, "/g"), "http://a/g");
        assert_eq!(resolve(base, "//g"), "http://g");
        assert_eq!(resolve(base, "?y"), "http://a/b/c/d;p?y");
        assert_eq!(resolve(base, "#s"), "http://a/b/c/d;p?q#s");
        assert_eq!(resolve(base, ""), "http://a/b/c/d;p?q");
        assert_eq!(resolve(base, ".."), "http://a/b/");
        assert_eq!(resolve(base, "../g"), "http://a/b/g");
        assert_eq!(resolve(base, "../../g"), "http://a/g");
        assert_eq!(resolve(base, "../../../g"), "http://a/g");
        assert_eq!(resolve(base, "g:h"), "g:h");
    }

    #[test]
    fn no_base_keeps_reference() {
        assert_eq!(resolve(None, "1"), "1");
        assert_eq!(resolve(Some(""), "1"), "1");
    }

    #[test]
    fn relative_against_directory_base() {
        let base = Some("https://levelgraph.io/get/");
        assert_eq!(make_relative(base, "https://levelgraph.io/get/1"), "1");
        assert_eq!(make_relative(base, "https://levelgraph.io/get/"), "./");
        assert_eq!(make_relative(base, "https://levelgraph.io/other"), "../other");
        assert_eq!(make_relative(base, "https://levelgraph.io/get/a#b"), "a#b");
        assert_eq!(make_relative(base, "http://example.org/x"), "http://example.org/x");
        assert_eq!(make_relative(base, "https://levelgraph.iox/y"), "https://levelgraph.iox/y");
    }
}
