use std::fmt;
use std::iter::Peekable;
use std::path::Path;
use std::str::CharIndices;

use serde::Serialize;

use crate::error::SyncError;
use crate::logging::StatusLog;
use crate::networking::Fetch;
use crate::storage::confined_join;

/// Core files refreshed when the remote manifest cannot be obtained.
const FALLBACK_FILES: &[&str] = &["qlassets.py", "gui.py", "launcher.py", "icon.png", "version.txt"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    pub logical_name: String,
    pub source_location: String,
}

impl ManifestEntry {
    pub fn new(logical_name: impl Into<String>, source_location: impl Into<String>) -> Self {
        Self {
            logical_name: logical_name.into(),
            source_location: source_location.into(),
        }
    }
}

/// Why the strict tokenizer refused a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TupleError {
    Expected(&'static str, usize),
    UnterminatedString,
    UnknownEscape(char),
    TrailingInput(usize),
}

impl fmt::Display for TupleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TupleError::Expected(what, usize::MAX) => write!(f, "expected {what} at end of line"),
            TupleError::Expected(what, pos) => write!(f, "expected {what} at column {}", pos + 1),
            TupleError::UnterminatedString => f.write_str("unterminated string"),
            TupleError::UnknownEscape(c) => write!(f, "unknown escape \\{c}"),
            TupleError::TrailingInput(pos) => write!(f, "unexpected input at column {}", pos + 1),
        }
    }
}

/// Hard-coded list used in place of an unavailable manifest.
pub fn fallback_entries(remote_base: &str) -> Vec<ManifestEntry> {
    FALLBACK_FILES
        .iter()
        .map(|name| ManifestEntry::new(*name, format!("{remote_base}/{name}")))
        .collect()
}

/// Fetch and parse the remote manifest.
///
/// A failed fetch, an empty document, or one with no usable entries all come back as
/// [`SyncError::ManifestUnavailable`] so the caller can switch to [`fallback_entries`].
pub async fn fetch_manifest<T: Fetch + ?Sized>(
    transport: &T,
    url: &str,
    log: &StatusLog,
) -> Result<Vec<ManifestEntry>, SyncError> {
    let bytes = transport
        .fetch(url)
        .await
        .map_err(|e| SyncError::ManifestUnavailable(e.to_string()))?;
    let document = String::from_utf8_lossy(&bytes);
    if document.trim().is_empty() {
        return Err(SyncError::ManifestUnavailable(format!("{url} is empty")));
    }
    let entries = parse(&document, log);
    if entries.is_empty() {
        return Err(SyncError::ManifestUnavailable(format!(
            "{url} contains no usable entries"
        )));
    }
    log.debug(format!("manifest: {} entries from {url}", entries.len()));
    Ok(entries)
}

/// Parse a manifest document into entries, in document order.
///
/// Blank lines and `#` comments are skipped. Each other line should be a
/// `("name", "url")` tuple; lines the strict tokenizer rejects get one permissive
/// comma-split attempt and are otherwise dropped with a warning.
pub fn parse(document: &str, log: &StatusLog) -> Vec<ManifestEntry> {
    let mut entries = Vec::new();
    for (index, raw) in document.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.trim_end_matches(',').trim_end();

        let parsed = match parse_tuple(line) {
            Ok(pair) => Some(pair),
            Err(err) => {
                log.debug(format!("manifest line {}: strict parse failed ({err})", index + 1));
                split_tuple(line)
            }
        };
        let Some((name, url)) = parsed else {
            log.warn(format!("manifest line {}: dropping malformed entry {line:?}", index + 1));
            continue;
        };
        if confined_join(Path::new(""), &name).is_err() {
            log.warn(format!("manifest line {}: refusing unsafe name {name:?}", index + 1));
            continue;
        }
        entries.push(ManifestEntry::new(name, url));
    }
    entries
}

/// Strict tokenizer for `( STRING , STRING [,] )`.
pub fn parse_tuple(line: &str) -> Result<(String, String), TupleError> {
    let mut chars = line.char_indices().peekable();
    skip_ws(&mut chars);
    expect(&mut chars, '(', "'('")?;
    skip_ws(&mut chars);
    let name = quoted(&mut chars)?;
    skip_ws(&mut chars);
    expect(&mut chars, ',', "','")?;
    skip_ws(&mut chars);
    let url = quoted(&mut chars)?;
    skip_ws(&mut chars);
    if chars.peek().is_some_and(|&(_, c)| c == ',') {
        chars.next();
        skip_ws(&mut chars);
    }
    expect(&mut chars, ')', "')'")?;
    skip_ws(&mut chars);
    if let Some(&(pos, _)) = chars.peek() {
        return Err(TupleError::TrailingInput(pos));
    }
    Ok((name, url))
}

/// Last-resort split for lines that look like a tuple but are not well-formed literals.
fn split_tuple(line: &str) -> Option<(String, String)> {
    if !(line.contains('(') && line.contains(')')) {
        return None;
    }
    let inner = line.trim_matches(|c: char| c == '(' || c == ')' || c.is_whitespace());
    let mut parts = inner.split(',');
    let clean = |s: &str| {
        s.trim()
            .trim_matches(|c: char| c == '"' || c == '\'')
            .to_owned()
    };
    let name = clean(parts.next()?);
    let url = clean(parts.next()?);
    (!name.is_empty() && !url.is_empty()).then_some((name, url))
}

fn skip_ws(chars: &mut Peekable<CharIndices<'_>>) {
    while chars.peek().is_some_and(|&(_, c)| c.is_whitespace()) {
        chars.next();
    }
}

fn expect(
    chars: &mut Peekable<CharIndices<'_>>,
    wanted: char,
    label: &'static str,
) -> Result<(), TupleError> {
    match chars.next() {
        Some((_, c)) if c == wanted => Ok(()),
        Some((pos, _)) => Err(TupleError::Expected(label, pos)),
        None => Err(TupleError::Expected(label, usize::MAX)),
    }
}

fn quoted(chars: &mut Peekable<CharIndices<'_>>) -> Result<String, TupleError> {
    let quote = match chars.next() {
        Some((_, c @ ('"' | '\''))) => c,
        Some((pos, _)) => return Err(TupleError::Expected("quoted string", pos)),
        None => return Err(TupleError::Expected("quoted string", usize::MAX)),
    };
    let mut value = String::new();
    loop {
        match chars.next() {
            None => return Err(TupleError::UnterminatedString),
            Some((_, c)) if c == quote => return Ok(value),
            Some((_, '\\')) => match chars.next() {
                Some((_, c @ ('\\' | '\'' | '"'))) => value.push(c),
                Some((_, 'n')) => value.push('\n'),
                Some((_, 't')) => value.push('\t'),
                Some((_, other)) => return Err(TupleError::UnknownEscape(other)),
                None => return Err(TupleError::UnterminatedString),
            },
            Some((_, c)) => value.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::networking::fake::FakeTransport;
    use proptest::prelude::*;

    fn entry(name: &str, url: &str) -> ManifestEntry {
        ManifestEntry::new(name, url)
    }

    #[test]
    fn tokenizer_accepts_both_quote_styles_and_trailing_comma() {
        assert_eq!(
            parse_tuple(r#"("gui.py", "https://x/gui.py")"#),
            Ok(("gui.py".into(), "https://x/gui.py".into()))
        );
        assert_eq!(
            parse_tuple("('gui.py','https://x/gui.py',)"),
            Ok(("gui.py".into(), "https://x/gui.py".into()))
        );
        assert_eq!(
            parse_tuple(r#"( 'it\'s.txt' , "a\"b" )"#),
            Ok(("it's.txt".into(), "a\"b".into()))
        );
    }

    #[test]
    fn tokenizer_rejects_anything_but_two_strings() {
        assert!(parse_tuple(r#"("a", "b", "c")"#).is_err());
        assert!(parse_tuple(r#"("a")"#).is_err());
        assert!(parse_tuple(r#"(a, b)"#).is_err());
        assert!(parse_tuple(r#"("a", "b") + ("c", "d")"#).is_err());
        assert!(parse_tuple(r#"("a", __import__("os"))"#).is_err());
        assert_eq!(parse_tuple(r#"("a", "b"#), Err(TupleError::UnterminatedString));
        assert_eq!(parse_tuple(r#"("a\q", "b")"#), Err(TupleError::UnknownEscape('q')));
    }

    #[test]
    fn parse_skips_comments_blanks_and_strips_trailing_commas() {
        let doc = "# files to sync\n\n(\"gui.py\", \"U1\"),\n   ('icon.png', 'U2'),  \n";
        let log = StatusLog::new("manifest");
        assert_eq!(
            parse(doc, &log),
            vec![entry("gui.py", "U1"), entry("icon.png", "U2")]
        );
    }

    #[test]
    fn permissive_split_recovers_unquoted_tuples() {
        let log = StatusLog::new("manifest");
        assert_eq!(
            parse("(launcher.py, https://x/launcher.py)", &log),
            vec![entry("launcher.py", "https://x/launcher.py")]
        );
    }

    #[test]
    fn malformed_lines_are_dropped_with_a_warning() {
        let doc = "(\"a.txt\", \"U1\")\ngarbage here\n(\"b.txt\", \"U2\")\n(\"only-one\")\n";
        let log = StatusLog::capturing("manifest");
        assert_eq!(parse(doc, &log), vec![entry("a.txt", "U1"), entry("b.txt", "U2")]);
        let warnings = log.lines();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("line 2"));
        assert!(warnings[1].contains("line 4"));
    }

    #[test]
    fn escaping_names_are_refused() {
        let doc = "(\"../../.bashrc\", \"U1\")\n(\"/etc/hosts\", \"U2\")\n(\"ok.txt\", \"U3\")";
        let log = StatusLog::new("manifest");
        assert_eq!(parse(doc, &log), vec![entry("ok.txt", "U3")]);
    }

    #[test]
    fn fallback_lists_core_files_under_remote_base() {
        let entries = fallback_entries("https://host/repo");
        let names: Vec<_> = entries.iter().map(|e| e.logical_name.as_str()).collect();
        assert_eq!(names, FALLBACK_FILES);
        assert_eq!(entries[1].source_location, "https://host/repo/gui.py");
    }

    #[tokio::test]
    async fn unreachable_or_empty_manifest_is_unavailable() {
        let log = StatusLog::new("manifest");
        let transport = FakeTransport::new()
            .with("empty", "  \n")
            .with("junk", "nothing useful\n# only comments");

        for url in ["missing", "empty", "junk"] {
            let err = fetch_manifest(&transport, url, &log).await.unwrap_err();
            assert!(matches!(err, SyncError::ManifestUnavailable(_)), "{url}");
        }
    }

    #[tokio::test]
    async fn fetch_manifest_parses_remote_document() {
        let log = StatusLog::new("manifest");
        let transport = FakeTransport::new().with("m", "(\"a.txt\", \"U1\"),\n(\"b.txt\", \"U2\"),\n");
        let entries = fetch_manifest(&transport, "m", &log).await.unwrap();
        assert_eq!(entries, vec![entry("a.txt", "U1"), entry("b.txt", "U2")]);
    }

    fn well_formed() -> impl Strategy<Value = (String, String, String)> {
        ("[a-z]{1,8}\\.(txt|py|png)", "https://[a-z]{1,8}\\.example/[a-z]{1,8}", any::<bool>())
            .prop_map(|(name, url, single)| {
                let line = if single {
                    format!("('{name}', '{url}'),")
                } else {
                    format!("(\"{name}\", \"{url}\")")
                };
                (name, url, line)
            })
    }

    fn noise() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-z =+]{1,20}".prop_map(|s| format!("x{s}")),
            "[a-z ]{0,20}".prop_map(|s| format!("# {s}")),
            Just(String::new()),
            Just("\"only\", \"quotes\"".to_owned()),
        ]
    }

    proptest! {
        #[test]
        fn returns_exactly_the_well_formed_entries_in_order(
            lines in prop::collection::vec(
                prop_oneof![
                    well_formed().prop_map(Ok::<_, String>),
                    noise().prop_map(Err::<(String, String, String), _>),
                ],
                1..24,
            ),
            anchor in well_formed(),
        ) {
            let mut all = lines;
            all.push(Ok(anchor));
            let doc: String = all
                .iter()
                .map(|l| match l {
                    Ok((_, _, line)) => line.clone(),
                    Err(noise) => noise.clone(),
                })
                .collect::<Vec<_>>()
                .join("\n");
            let expected: Vec<ManifestEntry> = all
                .iter()
                .filter_map(|l| l.as_ref().ok())
                .map(|(name, url, _)| entry(name, url))
                .collect();

            let log = StatusLog::new("manifest");
            prop_assert_eq!(parse(&doc, &log), expected);
        }
    }
}
