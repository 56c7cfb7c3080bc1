/*!
`redpen.rs`

Implements the `redpen` subcommand: a stand-in for the RedPen CLI that
validates a document through a RedPen server.

Requests:
  - validate : POST `<base>/rest/document/validate`
               body  = document (input file, or --sentence text)
               query = format, documentParser, lang[, config]
  - --version: GET `<base>/rest/config/redpens`, prints the `version` field

After a successful validation the relayed report is scanned for errors; more
than `--limit` errors turns the exit code into a failure, as the native CLI
does.

Configuration lookup (when --conf is absent):
  ./redpen-conf.xml, ./redpen-conf-*.xml, then the same in each ancestor
  directory, then $REDPEN_HOME/conf (./conf when REDPEN_HOME is unset).
*/

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::Result;
use clap::{Args, ValueEnum};
use regex::Regex;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::cmd::shared::{self, Globals};
use crate::error::{SabacanError, exitcode};
use crate::server::{Environment, RequestSpec, Service};

const VALIDATE_PATH: &str = "rest/document/validate";
const VERSION_PATH: &str = "rest/config/redpens";
const DEFAULT_LANG: &str = "en";

/* -------------------------------------------------------------------------- */
/* Value Enums                                                                */
/* -------------------------------------------------------------------------- */

/// Report formats the RedPen server can produce.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Json2,
    Plain,
    Plain2,
    Xml,
}

impl ReportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Json2 => "json2",
            ReportFormat::Plain => "plain",
            ReportFormat::Plain2 => "plain2",
            ReportFormat::Xml => "xml",
        }
    }
}

/// Document parsers, with the file extensions that select them.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentParser {
    Markdown,
    Plain,
    Wiki,
    Asciidoc,
    Latex,
    Rest,
    Review,
    Properties,
}

impl DocumentParser {
    const EXTENSIONS: &'static [(DocumentParser, &'static [&'static str])] = &[
        (DocumentParser::Markdown, &["md", "markdown"]),
        (DocumentParser::Plain, &["txt"]),
        (DocumentParser::Wiki, &["wiki"]),
        (DocumentParser::Asciidoc, &["adoc", "asciidoc"]),
        (DocumentParser::Latex, &["tex", "latex"]),
        (DocumentParser::Rest, &["rest", "rst"]),
        (DocumentParser::Review, &["re", "review"]),
        (DocumentParser::Properties, &["properties"]),
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentParser::Markdown => "markdown",
            DocumentParser::Plain => "plain",
            DocumentParser::Wiki => "wiki",
            DocumentParser::Asciidoc => "asciidoc",
            DocumentParser::Latex => "latex",
            DocumentParser::Rest => "rest",
            DocumentParser::Review => "review",
            DocumentParser::Properties => "properties",
        }
    }

    /// Parser implied by a file name's extension, if it has a known one.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::EXTENSIONS
            .iter()
            .find(|(_, exts)| exts.contains(&ext))
            .map(|(parser, _)| *parser)
    }
}

/* -------------------------------------------------------------------------- */
/* Argument Struct                                                            */
/* -------------------------------------------------------------------------- */

#[derive(Args, Debug)]
pub struct RedPenArgs {
    /// Configuration file
    #[arg(short = 'c', long = "conf", value_name = "CONF FILE")]
    pub conf: Option<PathBuf>,

    /// Input file format
    #[arg(short = 'f', long = "format", value_name = "FORMAT")]
    pub document_parser: Option<DocumentParser>,

    /// Error limit number
    #[arg(short = 'l', long, value_name = "LIMIT NUMBER", default_value_t = 1)]
    pub limit: usize,

    /// Language of error messages (NOT SUPPORTED)
    #[arg(short = 'L', long, value_name = "LANGUAGE", value_parser = ["en", "ja"])]
    pub lang: Option<String>,

    /// Output result format
    #[arg(
        short = 'r',
        long = "result-format",
        value_name = "RESULT FORMAT",
        default_value = "plain"
    )]
    pub result_format: ReportFormat,

    /// Input sentences
    #[arg(short = 's', long = "sentence", value_name = "INPUT SENTENCES")]
    pub sentence: Option<String>,

    /// Threshold of error level (NOT SUPPORTED)
    #[arg(short = 't', long, value_name = "THRESHOLD", value_parser = ["info", "warn", "error"])]
    pub threshold: Option<String>,

    /// Displays version information and exits
    #[arg(short = 'v', long)]
    pub version: bool,

    /// Input document
    #[arg(value_name = "INPUT FILE")]
    pub input: Option<PathBuf>,
}

/* -------------------------------------------------------------------------- */
/* Translation                                                                */
/* -------------------------------------------------------------------------- */

/// Result of translating the arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Ask the server for its version.
    Version(RequestSpec),
    /// Validate a document; the report comes back in `format`.
    Validate { spec: RequestSpec, format: ReportFormat },
}

/// Translate arguments into a plan.
///
/// `cwd` anchors the configuration search; `env` supplies `REDPEN_HOME`.
pub fn translate(args: &RedPenArgs, cwd: &Path, env: &Environment) -> Result<Plan, SabacanError> {
    if args.version {
        return Ok(Plan::Version(RequestSpec::get(VERSION_PATH)));
    }

    for (name, set) in [("lang", args.lang.is_some()), ("threshold", args.threshold.is_some())] {
        if set {
            tracing::warn!("Option \"{name}\" is not supported");
        }
    }

    let config = match &args.conf {
        Some(path) => Some(shared::read_text_input(path)?),
        None => match find_config(cwd, env.get("REDPEN_HOME")) {
            Some(path) => {
                tracing::debug!("using configuration {}", path.display());
                Some(shared::read_text_input(&path)?)
            }
            None => None,
        },
    };

    let document = match (&args.sentence, &args.input) {
        (Some(sentence), _) => sentence.clone().into_bytes(),
        (None, Some(path)) => shared::read_input(path)?,
        (None, None) => return Err(SabacanError::input("Input is not given")),
    };

    let parser = args
        .document_parser
        .or_else(|| args.input.as_deref().and_then(DocumentParser::from_path))
        .unwrap_or(DocumentParser::Plain);
    let lang = config
        .as_deref()
        .and_then(config_lang)
        .unwrap_or_else(|| DEFAULT_LANG.to_string());

    tracing::debug!(
        "validating (document_parser={}, lang={lang}, format={})",
        parser.as_str(),
        args.result_format.as_str()
    );

    let mut spec = RequestSpec::post_text(VALIDATE_PATH, document)
        .with_query("format", args.result_format.as_str())
        .with_query("documentParser", parser.as_str())
        .with_query("lang", lang);
    if let Some(config) = config {
        spec = spec.with_query("config", config);
    }

    Ok(Plan::Validate {
        spec,
        format: args.result_format,
    })
}

/* -------------------------------------------------------------------------- */
/* Configuration                                                              */
/* -------------------------------------------------------------------------- */

fn search_conf(dir: &Path) -> Option<PathBuf> {
    let conf = dir.join("redpen-conf.xml");
    if conf.is_file() {
        return Some(conf);
    }
    let mut variants: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("redpen-conf-") && n.ends_with(".xml"))
        })
        .collect();
    variants.sort();
    variants.into_iter().next()
}

/// Locate the default configuration file.
pub fn find_config(cwd: &Path, redpen_home: Option<&str>) -> Option<PathBuf> {
    let home = redpen_home.map_or_else(|| cwd.to_path_buf(), PathBuf::from);
    cwd.ancestors()
        .find_map(search_conf)
        .or_else(|| search_conf(&home.join("conf")))
}

fn root_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[A-Za-z_][\w.:-]*([^>]*)>").expect("valid regex"))
}

fn comment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"))
}

fn lang_attr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?:^|\s)lang\s*=\s*["']([^"']*)["']"#).expect("valid regex"))
}

/// `lang` attribute of the configuration's root element.
pub fn config_lang(config: &str) -> Option<String> {
    let stripped = comment_regex().replace_all(config, "");
    let root = root_tag_regex().captures(&stripped)?;
    let attrs = root.get(1)?.as_str();
    lang_attr_regex()
        .captures(attrs)
        .map(|c| c[1].to_string())
}

/* -------------------------------------------------------------------------- */
/* Report Inspection                                                          */
/* -------------------------------------------------------------------------- */

#[derive(Deserialize)]
struct JsonReport {
    errors: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct Json2Report {
    errors: Vec<JsonReport>,
}

#[derive(Deserialize)]
struct VersionReply {
    version: String,
}

/// Reports come back as one object, or wrapped in a one-element array.
fn first_report<T: DeserializeOwned>(report: &str) -> Option<T> {
    let value: serde_json::Value = serde_json::from_str(report).ok()?;
    let value = match value {
        serde_json::Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
        other => other,
    };
    serde_json::from_value(value).ok()
}

fn xml_error_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<error\b").expect("valid regex"))
}

/// Number of errors in a validation report, or None if it cannot be read.
pub fn count_errors(report: &str, format: ReportFormat) -> Option<usize> {
    match format {
        ReportFormat::Json => first_report::<JsonReport>(report).map(|r| r.errors.len()),
        ReportFormat::Json2 => {
            first_report::<Json2Report>(report).map(|r| r.errors.iter().map(|s| s.errors.len()).sum())
        }
        ReportFormat::Plain => Some(report.lines().filter(|l| !l.trim().is_empty()).count()),
        ReportFormat::Plain2 => Some(
            report
                .lines()
                .filter(|line| {
                    let body = line.trim_start();
                    body.len() < line.len()
                        && body.starts_with(|c: char| c.is_alphanumeric() || c == '_')
                        && !body.starts_with("Line:")
                        && !body.starts_with("Sentence:")
                })
                .count(),
        ),
        ReportFormat::Xml => Some(xml_error_regex().find_iter(report).count()),
    }
}

/// Exit code after checking a successful report against the error limit.
fn check_limit(report: &[u8], format: ReportFormat, limit: usize) -> i32 {
    let text = String::from_utf8_lossy(report);
    match count_errors(&text, format) {
        Some(count) if count > limit => {
            tracing::error!(
                "The number of errors \"{count}\" is larger than specified (limit is \"{limit}\")"
            );
            exitcode::FAILURE
        }
        Some(count) => {
            tracing::debug!("The number of errors is {count}");
            exitcode::OK
        }
        None => {
            tracing::warn!("could not read the {} report; error limit not checked", format.as_str());
            exitcode::OK
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Public Entry Point                                                         */
/* -------------------------------------------------------------------------- */

pub fn execute_redpen(args: RedPenArgs, globals: &Globals) -> Result<i32> {
    let target = shared::resolve(Service::RedPen, globals)?;
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let plan = translate(&args, &cwd, &globals.env)?;

    match plan {
        Plan::Version(spec) => {
            let outcome = shared::run_request(&spec, &target)?;
            if !outcome.is_success() {
                return shared::relay_stdout(&outcome);
            }
            let reply: VersionReply = serde_json::from_slice(&outcome.body).map_err(|e| {
                SabacanError::transport(format!("malformed version reply from {target}: {e}"))
            })?;
            println!("{}", reply.version);
            Ok(exitcode::OK)
        }
        Plan::Validate { spec, format } => {
            let outcome = shared::run_request(&spec, &target)?;
            let code = shared::relay_stdout(&outcome)?;
            if code != exitcode::OK {
                return Ok(code);
            }
            Ok(check_limit(&outcome.body, format, args.limit))
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Tests                                                                      */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::request::Method;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(subcommand)]
        cmd: TestSub,
    }

    #[derive(clap::Subcommand, Debug)]
    enum TestSub {
        Redpen(RedPenArgs),
    }

    fn parse(args: &[&str]) -> RedPenArgs {
        let argv = ["t", "redpen"].into_iter().chain(args.iter().copied());
        match TestCli::try_parse_from(argv).unwrap().cmd {
            TestSub::Redpen(a) => a,
        }
    }

    fn query<'a>(spec: &'a RequestSpec, key: &str) -> Option<&'a str> {
        spec.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn validate_sends_document_and_format() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("document.md");
        std::fs::write(&doc, "# Title\n\nThis is a pen.\n").unwrap();

        let args = parse(&["-r", "json", doc.to_str().unwrap()]);
        let Plan::Validate { spec, format } = translate(&args, dir.path(), &Environment::default()).unwrap()
        else {
            panic!("expected validation");
        };
        assert_eq!(format, ReportFormat::Json);
        assert_eq!(spec.method, Method::Post);
        assert_eq!(spec.path, "rest/document/validate");
        assert_eq!(spec.body, b"# Title\n\nThis is a pen.\n");
        let keys: Vec<&str> = spec.query.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["format", "documentParser", "lang"]);
        assert_eq!(query(&spec, "format"), Some("json"));
        assert_eq!(query(&spec, "documentParser"), Some("markdown"));
        assert_eq!(query(&spec, "lang"), Some("en"));
    }

    #[test]
    fn sentence_and_explicit_parser() {
        let dir = tempfile::tempdir().unwrap();
        let args = parse(&["-s", "This is a pen.", "-f", "wiki"]);
        let Plan::Validate { spec, format } = translate(&args, dir.path(), &Environment::default()).unwrap()
        else {
            panic!("expected validation");
        };
        assert_eq!(format, ReportFormat::Plain);
        assert_eq!(spec.body, b"This is a pen.");
        assert_eq!(query(&spec, "documentParser"), Some("wiki"));
    }

    #[test]
    fn missing_input_is_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = translate(&parse(&[]), dir.path(), &Environment::default()).unwrap_err();
        assert!(matches!(err, SabacanError::Input(_)));

        let missing = dir.path().join("nope.md");
        let err = translate(&parse(&[missing.to_str().unwrap()]), dir.path(), &Environment::default())
            .unwrap_err();
        assert!(matches!(err, SabacanError::Input(_)));
    }

    #[test]
    fn named_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let args = parse(&["-c", "/no/such/redpen-conf.xml", "-s", "x"]);
        let err = translate(&args, dir.path(), &Environment::default()).unwrap_err();
        assert!(matches!(err, SabacanError::Input(_)));
    }

    #[test]
    fn config_found_in_ancestor_sets_lang() {
        let dir = tempfile::tempdir().unwrap();
        let conf = r#"<?xml version="1.0"?>
<!-- <other lang="xx"> -->
<redpen-conf lang="ja" variant="zenkaku">
  <validators><validator name="SentenceLength"/></validators>
</redpen-conf>"#;
        std::fs::write(dir.path().join("redpen-conf-ja.xml"), conf).unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let args = parse(&["-s", "これはペンです。"]);
        let Plan::Validate { spec, .. } = translate(&args, &nested, &Environment::default()).unwrap() else {
            panic!("expected validation");
        };
        assert_eq!(
            spec.query,
            vec![
                ("format".to_string(), "plain".to_string()),
                ("documentParser".to_string(), "plain".to_string()),
                ("lang".to_string(), "ja".to_string()),
                ("config".to_string(), conf.to_string()),
            ]
        );
    }

    #[test]
    fn redpen_home_conf_is_last_resort() {
        let home = tempfile::tempdir().unwrap();
        std::fs::create_dir(home.path().join("conf")).unwrap();
        std::fs::write(home.path().join("conf").join("redpen-conf.xml"), "<redpen-conf/>").unwrap();
        let cwd = tempfile::tempdir().unwrap();

        let found = find_config(cwd.path(), home.path().to_str());
        assert_eq!(found, Some(home.path().join("conf").join("redpen-conf.xml")));
    }

    #[test]
    fn conf_dir_under_cwd_without_redpen_home() {
        let cwd = tempfile::tempdir().unwrap();
        std::fs::create_dir(cwd.path().join("conf")).unwrap();
        std::fs::write(cwd.path().join("conf").join("redpen-conf-en.xml"), "<redpen-conf/>").unwrap();

        let found = find_config(cwd.path(), None);
        assert_eq!(found, Some(cwd.path().join("conf").join("redpen-conf-en.xml")));
    }

    #[test]
    fn config_lang_ignores_namespaced_lang() {
        let conf = r#"<redpen-conf xml:lang="ja" lang="en"/>"#;
        assert_eq!(config_lang(conf), Some("en".into()));
        assert_eq!(config_lang(r#"<redpen-conf xml:lang="ja"/>"#), None);
    }

    #[test]
    fn config_lang_defaults() {
        assert_eq!(config_lang("<redpen-conf lang='ja'/>"), Some("ja".into()));
        assert_eq!(config_lang("<redpen-conf><x lang=\"ja\"/></redpen-conf>"), None);
    }

    #[test]
    fn version_is_a_get() {
        let dir = tempfile::tempdir().unwrap();
        let plan = translate(&parse(&["-v"]), dir.path(), &Environment::default()).unwrap();
        assert_eq!(plan, Plan::Version(RequestSpec::get("rest/config/redpens")));
    }

    #[test]
    fn parser_from_extension() {
        assert_eq!(DocumentParser::from_path(Path::new("a.rst")), Some(DocumentParser::Rest));
        assert_eq!(DocumentParser::from_path(Path::new("a.adoc")), Some(DocumentParser::Asciidoc));
        assert_eq!(DocumentParser::from_path(Path::new("a.re")), Some(DocumentParser::Review));
        assert_eq!(DocumentParser::from_path(Path::new("a.doc")), None);
        assert_eq!(DocumentParser::from_path(Path::new("README")), None);
    }

    #[test]
    fn count_json_errors() {
        let report = r#"{"document":"x","errors":[{"message":"a"},{"message":"b"}]}"#;
        assert_eq!(count_errors(report, ReportFormat::Json), Some(2));
        let wrapped = format!("[{report}]");
        assert_eq!(count_errors(&wrapped, ReportFormat::Json), Some(2));
        assert_eq!(count_errors("not json", ReportFormat::Json), None);
    }

    #[test]
    fn count_json2_errors() {
        let report = r#"{"errors":[{"sentence":"a","errors":[{},{}]},{"sentence":"b","errors":[{}]}]}"#;
        assert_eq!(count_errors(report, ReportFormat::Json2), Some(3));
    }

    #[test]
    fn count_plain_errors() {
        let report = "doc.md:1: ValidationError[SentenceLength], too long\ndoc.md:3: ValidationError[Spelling], typo\n";
        assert_eq!(count_errors(report, ReportFormat::Plain), Some(2));
        assert_eq!(count_errors("", ReportFormat::Plain), Some(0));
    }

    #[test]
    fn count_plain2_errors() {
        let report = "doc.md:\n  Line: 1, Offset: 0\n    Sentence: This is a pen.\n    The length of the sentence exceeds the maximum.\n    Found invalid word.\n";
        assert_eq!(count_errors(report, ReportFormat::Plain2), Some(2));
    }

    #[test]
    fn count_xml_errors() {
        let report = "<validation-result><errors-summary/><error><message>a</message></error><error><message>b</message></error></validation-result>";
        assert_eq!(count_errors(report, ReportFormat::Xml), Some(2));
    }

    #[test]
    fn limit_exceeded_is_failure() {
        let report = br#"{"errors":[{},{}]}"#;
        assert_eq!(check_limit(report, ReportFormat::Json, 1), exitcode::FAILURE);
        assert_eq!(check_limit(report, ReportFormat::Json, 2), exitcode::OK);
        assert_eq!(check_limit(b"garbage", ReportFormat::Json, 0), exitcode::OK);
    }
}
