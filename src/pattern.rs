//! Pattern parser (C1): compiles a URL pattern string into a structured
//! [`Pattern`] — segment list, query list, host/port — bound against a
//! [`HandlerDescriptor`].

use crate::descriptor::HandlerDescriptor;
use crate::error::RouteError;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};

/// Identifies which handler argument a captured value feeds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamRef {
    /// The i-th positional argument of the handler (0-based).
    Positional(usize),
    /// A handler argument named `s` (only reachable via the variadic-named
    /// sink; a `$name` that matches a declared positional name is
    /// reclassified to `Positional` at parse time).
    Named(String),
}

/// One piece of a [`MixedComponent`]'s interleaved literal/parameter shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    Param(ParamRef),
}

/// A synthesised-regex path or query component made of interleaved literal
/// and parameter tokens (§4.1).
#[derive(Debug, Clone)]
pub struct MixedComponent {
    pub regex: Regex,
    pub tokens: Vec<Token>,
}

impl PartialEq for MixedComponent {
    fn eq(&self, other: &Self) -> bool {
        self.tokens == other.tokens && self.regex.as_str() == other.regex.as_str()
    }
}
impl Eq for MixedComponent {}

/// A compiled path component or query value (§3 "Path component").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Component {
    /// A plain literal (including the empty-segment case).
    Literal(String),
    /// The whole component is one parameter.
    Param(ParamRef),
    /// Interleaved literal/parameter tokens, matched via a synthesised regex.
    Mixed(MixedComponent),
}

/// A compiled URL pattern (§3).
#[derive(Debug, Clone)]
pub struct Pattern {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: Vec<Component>,
    /// Pattern ends in `$*`: absorb remaining path components into the
    /// handler's variadic positional sink.
    pub star: bool,
    pub query: Vec<(String, Component)>,
    pub used_positional: HashSet<usize>,
    pub used_named: HashSet<String>,
}

/// The abstract signature of a pattern, used to detect duplicate
/// registrations (§4.2): two patterns collide when they bind the same
/// positional indices and named keys at the same positions, in the same
/// host/port scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UrlMapSignature {
    host: Option<String>,
    port: Option<u16>,
    star: bool,
    path: Vec<ComponentSig>,
    query: BTreeMap<String, ComponentSig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ComponentSig {
    Literal,
    Single(ParamRef),
    Mixed(Vec<MixedTokSig>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum MixedTokSig {
    Lit,
    Param(ParamRef),
}

impl Component {
    fn signature(&self) -> ComponentSig {
        match self {
            Component::Literal(_) => ComponentSig::Literal,
            Component::Param(p) => ComponentSig::Single(p.clone()),
            Component::Mixed(m) => ComponentSig::Mixed(
                m.tokens
                    .iter()
                    .map(|t| match t {
                        Token::Literal(_) => MixedTokSig::Lit,
                        Token::Param(p) => MixedTokSig::Param(p.clone()),
                    })
                    .collect(),
            ),
        }
    }
}

impl Pattern {
    /// The trie-insertion key for this pattern's path: `true` entries carry
    /// literal segment text, `false` entries are wildcard steps.
    pub fn trie_key(&self) -> Vec<(bool, String)> {
        self.path
            .iter()
            .map(|c| match c {
                Component::Literal(s) => (true, s.clone()),
                _ => (false, String::new()),
            })
            .collect()
    }

    pub fn url_map(&self) -> UrlMapSignature {
        UrlMapSignature {
            host: self.host.clone(),
            port: self.port,
            star: self.star,
            path: self.path.iter().map(Component::signature).collect(),
            query: self
                .query
                .iter()
                .map(|(name, c)| (name.clone(), c.signature()))
                .collect(),
        }
    }
}

/// Compile `url` (plus optional host/port override) into a [`Pattern`],
/// binding every parameter against `descriptor`. Equivalent to
/// `compile_with(url, host, port, descriptor, true)` — query values are
/// strict-decoded (§4.1).
pub fn compile(
    url: &str,
    host: Option<&str>,
    port: Option<u16>,
    descriptor: &HandlerDescriptor,
) -> Result<Pattern, RouteError> {
    compile_with(url, host, port, descriptor, true)
}

/// Compile `url` as [`compile`] does, but let `strict_query` (SPEC_FULL
/// §A.3, `RouterConfig::strict_query_parsing`) decide how malformed `%xx`
/// escapes in *query* values are treated: `true` fails compilation (§4.1's
/// default), `false` passes the escape through literally. Path segments are
/// always strict-decoded regardless — their shape drives the trie, so a
/// malformed escape there is a caller bug, not noise to tolerate.
pub fn compile_with(
    url: &str,
    host: Option<&str>,
    port: Option<u16>,
    descriptor: &HandlerDescriptor,
    strict_query: bool,
) -> Result<Pattern, RouteError> {
    let (host, port) = resolve_host_port(host, port)?;
    let (raw_segments, raw_query) = split_url(url, strict_query)?;

    let mut used_positional = HashSet::new();
    let mut used_named = HashSet::new();
    let mut star = false;
    let mut path = Vec::with_capacity(raw_segments.len());

    for (idx, seg) in raw_segments.iter().enumerate() {
        if seg == "$*" {
            if idx != raw_segments.len() - 1 {
                return Err(RouteError::MisplacedStar);
            }
            if !descriptor.has_variadic_positional {
                return Err(RouteError::NoVariadic);
            }
            star = true;
            continue;
        }
        let component = parse_component(seg, descriptor, &mut used_positional, &mut used_named)?;
        path.push(component);
    }

    let mut query = Vec::with_capacity(raw_query.len());
    for (name, value) in raw_query {
        let component =
            parse_component(&value, descriptor, &mut used_positional, &mut used_named)?;
        query.push((name, component));
    }

    verify_binding_completeness(descriptor, &used_positional)?;

    Ok(Pattern {
        host,
        port,
        path,
        star,
        query,
        used_positional,
        used_named,
    })
}

fn verify_binding_completeness(
    descriptor: &HandlerDescriptor,
    used: &HashSet<usize>,
) -> Result<(), RouteError> {
    let diff = descriptor.mandatory_prefix_len();
    for i in 0..diff {
        if !used.contains(&i) {
            return Err(RouteError::UndefinedPathParameter(
                descriptor.names[i].clone(),
            ));
        }
    }
    for (offset, default) in descriptor.defaults.iter().enumerate() {
        let i = diff + offset;
        if default.is_none() && !used.contains(&i) {
            let name = descriptor
                .names
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("${}", i + 1));
            return Err(RouteError::UndefinedPathParameter(name));
        }
    }
    if let Some(&max) = used.iter().max() {
        for i in descriptor.names.len()..max {
            if !used.contains(&i) {
                return Err(RouteError::UndefinedPathParameter(format!("${}", i + 1)));
            }
        }
    }
    Ok(())
}

fn resolve_host_port(
    host: Option<&str>,
    port: Option<u16>,
) -> Result<(Option<String>, Option<u16>), RouteError> {
    match host {
        None => Ok((None, port)),
        Some(h) => {
            if let Some(idx) = h.find(':') {
                if port.is_some() {
                    return Err(RouteError::DuplicatePort);
                }
                let host_part = &h[..idx];
                let port_part = &h[idx + 1..];
                let parsed: u16 = port_part
                    .parse()
                    .map_err(|_| RouteError::BadHost(h.to_string()))?;
                Ok((Some(host_part.to_string()), Some(parsed)))
            } else {
                Ok((Some(h.to_string()), port))
            }
        }
    }
}

/// Split a pattern URL into decoded path segments and decoded
/// `(name, value)` query pairs. Path segments always strict-parse `%xx`/`+`
/// (§4.1); query values honor `strict_query`.
fn split_url(
    url: &str,
    strict_query: bool,
) -> Result<(Vec<String>, Vec<(String, String)>), RouteError> {
    let (path_part, query_part) = match url.find('?') {
        Some(idx) => (&url[..idx], Some(&url[idx + 1..])),
        None => (url, None),
    };
    let path_part = path_part.strip_prefix('/').unwrap_or(path_part);
    let mut segments = Vec::new();
    if !path_part.is_empty() {
        for seg in path_part.split('/') {
            if seg == "$*" {
                segments.push(seg.to_string());
            } else {
                segments.push(decode_strict(seg)?);
            }
        }
    }

    let mut pairs = Vec::new();
    if let Some(q) = query_part {
        for raw_pair in q.split('&') {
            if raw_pair.is_empty() {
                continue;
            }
            let (raw_name, raw_value) = match raw_pair.find('=') {
                Some(idx) => (&raw_pair[..idx], &raw_pair[idx + 1..]),
                None => (raw_pair, ""),
            };
            if raw_value == "$*" {
                return Err(RouteError::MisplacedStar);
            }
            let (name, value) = if strict_query {
                (decode_strict(raw_name)?, decode_strict(raw_value)?)
            } else {
                (decode_lenient(raw_name), decode_lenient(raw_value))
            };
            pairs.push((name, value));
        }
    }

    Ok((segments, pairs))
}

fn decode_strict(s: &str) -> Result<String, RouteError> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                if i + 2 >= bytes.len() {
                    return Err(RouteError::InvalidComponent(s.to_string()));
                }
                let hi = hex_val(bytes[i + 1]).ok_or_else(|| RouteError::InvalidComponent(s.to_string()))?;
                let lo = hex_val(bytes[i + 2]).ok_or_else(|| RouteError::InvalidComponent(s.to_string()))?;
                out.push(hi * 16 + lo);
                i += 3;
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).map_err(|_| RouteError::InvalidComponent(s.to_string()))
}

/// As [`decode_strict`], but a malformed `%xx` escape is copied through
/// literally (the `%` and whatever follows it) instead of failing.
fn decode_lenient(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let decoded = (i + 2 < bytes.len())
                    .then(|| {
                        let hi = hex_val(bytes[i + 1])?;
                        let lo = hex_val(bytes[i + 2])?;
                        Some(hi * 16 + lo)
                    })
                    .flatten();
                match decoded {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[derive(Debug, Clone)]
enum RawTok {
    Lit(String),
    Pos(usize),
    Named(String),
}

/// Tokenise one path segment or query value per the grammar in §4.1/§6.
fn scan(raw: &str) -> Result<Vec<RawTok>, RouteError> {
    let bytes = raw.as_bytes();
    let mut out = Vec::new();
    let mut i = 0usize;
    let mut last_was_param = false;

    while i < bytes.len() {
        if bytes[i] == b'$' && !(i + 1 < bytes.len() && bytes[i + 1] == b'$') {
            if last_was_param {
                return Err(RouteError::InvalidComponent(raw.to_string()));
            }
            let start = i + 1;
            if start >= bytes.len() {
                return Err(RouteError::InvalidComponent(raw.to_string()));
            }
            if bytes[start].is_ascii_digit() {
                let mut j = start;
                while j < bytes.len() && bytes[j].is_ascii_digit() {
                    j += 1;
                }
                let n: usize = raw[start..j]
                    .parse()
                    .map_err(|_| RouteError::InvalidComponent(raw.to_string()))?;
                if n == 0 {
                    return Err(RouteError::InvalidComponent(raw.to_string()));
                }
                out.push(RawTok::Pos(n - 1));
                i = j;
            } else if bytes[start] == b'_' || bytes[start].is_ascii_alphabetic() {
                let mut j = start;
                while j < bytes.len() && (bytes[j] == b'_' || bytes[j].is_ascii_alphanumeric()) {
                    j += 1;
                }
                out.push(RawTok::Named(raw[start..j].to_string()));
                i = j;
            } else {
                return Err(RouteError::InvalidComponent(raw.to_string()));
            }
            last_was_param = true;
        } else {
            let (lit, next_i) = collect_literal(raw, i);
            out.push(RawTok::Lit(lit));
            i = next_i;
            last_was_param = false;
        }
    }
    Ok(out)
}

/// Collect a maximal literal run starting at byte offset `i`: any sequence
/// of non-`$` chars and `$$` (escaped-dollar) pairs. Stops right before a
/// real parameter token or the end of the string.
fn collect_literal(raw: &str, mut i: usize) -> (String, usize) {
    let bytes = raw.as_bytes();
    let mut buf = String::new();
    while i < bytes.len() {
        if bytes[i] == b'$' {
            if i + 1 < bytes.len() && bytes[i + 1] == b'$' {
                buf.push('$');
                i += 2;
                continue;
            }
            break;
        }
        // '$' is single-byte ASCII and can't be a UTF-8 continuation byte,
        // so every boundary we stop or resume at here is a char boundary.
        let ch = match raw[i..].chars().next() {
            Some(c) => c,
            None => break,
        };
        buf.push(ch);
        i += ch.len_utf8();
    }
    (buf, i)
}

fn resolve_pos(
    n: usize,
    descriptor: &HandlerDescriptor,
    used_positional: &mut HashSet<usize>,
) -> Result<ParamRef, RouteError> {
    if n >= descriptor.names.len() && !descriptor.has_variadic_positional {
        return Err(RouteError::UnknownParameter(format!("${}", n + 1)));
    }
    if !used_positional.insert(n) {
        return Err(RouteError::DuplicateParameter(format!("${}", n + 1)));
    }
    Ok(ParamRef::Positional(n))
}

fn resolve_named(
    name: &str,
    descriptor: &HandlerDescriptor,
    used_positional: &mut HashSet<usize>,
    used_named: &mut HashSet<String>,
) -> Result<ParamRef, RouteError> {
    if let Some(i) = descriptor.names.iter().position(|n| n == name) {
        if !used_positional.insert(i) {
            return Err(RouteError::DuplicateParameter(name.to_string()));
        }
        Ok(ParamRef::Positional(i))
    } else if descriptor.has_variadic_named {
        if !used_named.insert(name.to_string()) {
            return Err(RouteError::DuplicateParameter(name.to_string()));
        }
        Ok(ParamRef::Named(name.to_string()))
    } else {
        Err(RouteError::UnknownParameter(name.to_string()))
    }
}

fn parse_component(
    raw: &str,
    descriptor: &HandlerDescriptor,
    used_positional: &mut HashSet<usize>,
    used_named: &mut HashSet<String>,
) -> Result<Component, RouteError> {
    if raw.is_empty() {
        return Ok(Component::Literal(String::new()));
    }
    let tokens = scan(raw)?;
    match tokens.as_slice() {
        [] => Ok(Component::Literal(String::new())),
        [RawTok::Lit(s)] => Ok(Component::Literal(s.clone())),
        [RawTok::Pos(n)] => Ok(Component::Param(resolve_pos(*n, descriptor, used_positional)?)),
        [RawTok::Named(name)] => Ok(Component::Param(resolve_named(
            name,
            descriptor,
            used_positional,
            used_named,
        )?)),
        _ => {
            let (regex, out) = build_mixed(&tokens, descriptor, used_positional, used_named)?;
            Ok(Component::Mixed(MixedComponent { regex, tokens: out }))
        }
    }
}

fn build_mixed(
    raw_tokens: &[RawTok],
    descriptor: &HandlerDescriptor,
    used_positional: &mut HashSet<usize>,
    used_named: &mut HashSet<String>,
) -> Result<(Regex, Vec<Token>), RouteError> {
    let mut pattern = String::from("^");
    let mut out = Vec::with_capacity(raw_tokens.len());
    let mut ends_open = false;

    for (idx, tok) in raw_tokens.iter().enumerate() {
        match tok {
            RawTok::Lit(s) => {
                for ch in s.chars() {
                    pattern.push('[');
                    pattern.push_str(&regex::escape(&ch.to_string()));
                    pattern.push(']');
                }
                out.push(Token::Literal(s.clone()));
                ends_open = false;
            }
            RawTok::Pos(n) => {
                let pref = resolve_pos(*n, descriptor, used_positional)?;
                append_param_regex(&mut pattern, raw_tokens.get(idx + 1), &mut ends_open);
                out.push(Token::Param(pref));
            }
            RawTok::Named(name) => {
                let pref = resolve_named(name, descriptor, used_positional, used_named)?;
                append_param_regex(&mut pattern, raw_tokens.get(idx + 1), &mut ends_open);
                out.push(Token::Param(pref));
            }
        }
    }
    if !ends_open {
        pattern.push('$');
    }
    let regex =
        Regex::new(&pattern).map_err(|e| RouteError::InvalidComponent(format!("{e}")))?;
    Ok((regex, out))
}

fn append_param_regex(pattern: &mut String, next: Option<&RawTok>, ends_open: &mut bool) {
    match next {
        // Adjacency of two parameter tokens is rejected during scan, so
        // `next`, when present, is always a non-empty literal.
        Some(RawTok::Lit(s)) if !s.is_empty() => {
            let c = s.chars().next().unwrap_or(' ');
            pattern.push_str("([^");
            pattern.push_str(&regex::escape(&c.to_string()));
            pattern.push_str("]*)");
            *ends_open = false;
        }
        _ => {
            pattern.push_str("(.*)$");
            *ends_open = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(names: &[&str]) -> HandlerDescriptor {
        HandlerDescriptor::new(names.iter().map(|s| s.to_string()))
    }

    #[test]
    fn compiles_simple_positional() {
        let d = desc(&["id"]);
        let p = compile("/articles/$1", None, None, &d).unwrap();
        assert_eq!(p.path.len(), 2);
        assert_eq!(p.path[1], Component::Param(ParamRef::Positional(0)));
    }

    #[test]
    fn compiles_named_matching_descriptor_name() {
        let d = desc(&["id"]);
        let p = compile("/articles/$id", None, None, &d).unwrap();
        assert_eq!(p.path[1], Component::Param(ParamRef::Positional(0)));
    }

    #[test]
    fn rejects_misplaced_star() {
        let d = desc(&["id"]).with_variadic_positional();
        let err = compile("/a/$*/b", None, None, &d).unwrap_err();
        assert_eq!(err, RouteError::MisplacedStar);
    }

    #[test]
    fn rejects_star_without_variadic_handler() {
        let d = desc(&[]);
        let err = compile("/a/$*", None, None, &d).unwrap_err();
        assert_eq!(err, RouteError::NoVariadic);
    }

    #[test]
    fn rejects_star_in_query() {
        let d = desc(&[]).with_variadic_positional();
        let err = compile("/a?x=$*", None, None, &d).unwrap_err();
        assert_eq!(err, RouteError::MisplacedStar);
    }

    #[test]
    fn rejects_adjacent_parameters() {
        let d = desc(&["a", "b"]);
        let err = compile("/p/$a$b", None, None, &d).unwrap_err();
        assert!(matches!(err, RouteError::InvalidComponent(_)));
    }

    #[test]
    fn mixed_component_builds_regex() {
        let d = desc(&["a", "b"]);
        let p = compile("/p/$a-$b", None, None, &d).unwrap();
        match &p.path[1] {
            Component::Mixed(m) => {
                assert!(m.regex.is_match("foo-bar"));
                let caps = m.regex.captures("foo-bar").unwrap();
                assert_eq!(&caps[1], "foo");
                assert_eq!(&caps[2], "bar");
            }
            other => panic!("expected Mixed, got {other:?}"),
        }
    }

    #[test]
    fn rejects_undefined_mandatory_parameter() {
        let d = desc(&["id"]);
        let err = compile("/articles", None, None, &d).unwrap_err();
        assert_eq!(err, RouteError::UndefinedPathParameter("id".to_string()));
    }

    #[test]
    fn host_with_embedded_port_splits() {
        let d = desc(&[]);
        let p = compile("/a", Some("example.com:8080"), None, &d).unwrap();
        assert_eq!(p.host.as_deref(), Some("example.com"));
        assert_eq!(p.port, Some(8080));
    }

    #[test]
    fn duplicate_port_is_an_error() {
        let d = desc(&[]);
        let err = compile("/a", Some("example.com:8080"), Some(80), &d).unwrap_err();
        assert_eq!(err, RouteError::DuplicatePort);
    }

    #[test]
    fn literal_dollar_escape() {
        let d = desc(&[]);
        let p = compile("/a/b$$c", None, None, &d).unwrap();
        assert_eq!(p.path[1], Component::Literal("b$c".to_string()));
    }

    #[test]
    fn strict_percent_decoding_rejects_malformed_escape() {
        let d = desc(&[]);
        let err = compile("/a%zz", None, None, &d).unwrap_err();
        assert!(matches!(err, RouteError::InvalidComponent(_)));
    }

    #[test]
    fn url_map_distinguishes_different_positional_bindings() {
        let d = desc(&["a", "b"]);
        let p1 = compile("/x/$a", None, None, &d).unwrap();
        let p2 = compile("/x/$b", None, None, &d).unwrap();
        assert_ne!(p1.url_map(), p2.url_map());
    }

    #[test]
    fn url_map_same_shape_is_equal() {
        let d1 = desc(&["a"]);
        let d2 = desc(&["a"]);
        let p1 = compile("/x/$a", None, None, &d1).unwrap();
        let p2 = compile("/x/$a", None, None, &d2).unwrap();
        assert_eq!(p1.url_map(), p2.url_map());
    }
}
