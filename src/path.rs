//! Archive path resolution.
//!
//! Every path the pipeline touches (manifest hrefs, navigation hrefs, image
//! sources, stylesheet links, CSS `url()` values) goes through [`resolve`].
//! Archive paths use `/` separators and never start with one, e.g.
//! `OEBPS/text/ch01.xhtml`. Resolution is path algebra only: no I/O happens.

use std::fmt;

use percent_encoding::percent_decode_str;

/// Whether a `#fragment` survives resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fragment {
    Keep,
    #[default]
    Drop,
}

/// A reference resolved to an archive path.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedRef {
    /// Percent-decoded archive path. Empty means "no target".
    pub path: String,
    /// Raw fragment (without `#`), only present under [`Fragment::Keep`].
    pub fragment: Option<String>,
}

impl ResolvedRef {
    pub fn is_empty(&self) -> bool {
        self.path.is_empty() && self.fragment.is_none()
    }
}

impl fmt::Display for ResolvedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)?;
        if let Some(fragment) = &self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

/// Directory part of an archive path, keeping the trailing `/`.
///
/// `"OEBPS/content.opf"` becomes `"OEBPS/"`; a path without a separator has
/// the archive root `""` as its directory.
pub fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..=idx],
        None => "",
    }
}

/// Split `href` at the first `#` into path and fragment.
pub fn split_fragment(href: &str) -> (&str, Option<&str>) {
    match href.split_once('#') {
        Some((path, fragment)) => (path, Some(fragment)),
        None => (href, None),
    }
}

/// True if `reference` carries a URL scheme (`http:`, `data:`, `blob:`, ...)
/// or is protocol-relative (`//host/x.png`).
///
/// Such references point outside the archive or are already materialized and
/// are never resolved against a base directory.
pub fn is_absolute_reference(reference: &str) -> bool {
    let reference = reference.trim();
    reference.starts_with("//") || scheme_of(reference).is_some()
}

fn scheme_of(reference: &str) -> Option<&str> {
    let (scheme, _) = reference.split_once(':')?;
    let mut chars = scheme.chars();
    let first = chars.next()?;
    // A single letter before ':' is a drive letter, not a scheme.
    if !first.is_ascii_alphabetic() || scheme.len() < 2 {
        return None;
    }
    chars
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        .then_some(scheme)
}

/// Resolve `reference` against the archive directory `base_dir`.
///
/// - An empty reference resolves to an empty path.
/// - A reference starting with `/` is relative to the archive root.
/// - A reference with a URL scheme, or starting with `//`, is returned
///   unchanged.
/// - `\` separators are read as `/`.
/// - Anything else is joined to `base_dir` with relative-URL semantics: the
///   part of `base_dir` after its last `/` is treated as a file name and
///   dropped, `.` segments vanish, `..` pops a segment and stops at the root,
///   and a `?query` is discarded.
///
/// The resulting path is percent-decoded; the fragment is kept verbatim when
/// `policy` is [`Fragment::Keep`].
pub fn resolve(base_dir: &str, reference: &str, policy: Fragment) -> ResolvedRef {
    if reference.is_empty() {
        return ResolvedRef::default();
    }

    if is_absolute_reference(reference) {
        let (path, fragment) = split_fragment(reference);
        return ResolvedRef {
            path: path.to_string(),
            fragment: keep_fragment(fragment, policy),
        };
    }

    let (without_fragment, fragment) = split_fragment(reference);
    let raw_path = without_fragment
        .split_once('?')
        .map_or(without_fragment, |(path, _query)| path)
        .replace('\\', "/");

    let path = if let Some(rooted) = raw_path.strip_prefix('/') {
        normalize(None, rooted)
    } else {
        normalize(Some(base_dir), &raw_path)
    };

    ResolvedRef {
        path: percent_decode_str(&path).decode_utf8_lossy().into_owned(),
        fragment: keep_fragment(fragment, policy),
    }
}

/// Resolve and render as a single string (`path` or `path#fragment`).
pub fn resolve_href(base_dir: &str, reference: &str, policy: Fragment) -> String {
    resolve(base_dir, reference, policy).to_string()
}

fn keep_fragment(fragment: Option<&str>, policy: Fragment) -> Option<String> {
    match policy {
        Fragment::Keep => fragment.map(str::to_string),
        Fragment::Drop => None,
    }
}

fn normalize(base_dir: Option<&str>, relative: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    if let Some(base) = base_dir {
        let base = base.trim_start_matches('/');
        let directory = match base.rfind('/') {
            Some(idx) => &base[..idx],
            None => "",
        };
        for segment in directory.split('/') {
            push_segment(&mut segments, segment);
        }
    }

    if relative.is_empty() {
        // "?x" or "" after stripping: the base document directory itself.
        let mut out = segments.join("/");
        if !out.is_empty() {
            out.push('/');
        }
        return out;
    }

    let parts: Vec<&str> = relative.split('/').collect();
    let last = parts.len() - 1;
    let mut trailing_slash = false;
    for (i, segment) in parts.into_iter().enumerate() {
        push_segment(&mut segments, segment);
        if i == last {
            trailing_slash = matches!(segment, "" | "." | "..");
        }
    }

    let mut out = segments.join("/");
    if trailing_slash && !out.is_empty() {
        out.push('/');
    }
    out
}

fn push_segment<'a>(segments: &mut Vec<&'a str>, segment: &'a str) {
    match segment {
        "" | "." => {}
        ".." => {
            segments.pop();
        }
        other => segments.push(other),
    }
}
