/*!
compat.rs - native PlantUML command-line compatibility.

The PlantUML CLI spells long options with a single dash (`-pipe`, `-ofile`,
`-checkversion`), which clap would read as bundles of short flags. Before
parsing, every argument after the `plantuml` subcommand is looked up in a
static table:

  - Long(name)    : rewritten to `--name`
  - Ignore{arity} : dropped (with its value, if any) and reported, because
                    the server has no way to honour it

Short options PlantUML shares with clap (`-tpng`, `-o DIR`, `-p`, `-h`) are
left untouched.
*/

use std::ffi::OsString;

/// What to do with one native PlantUML option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rewrite {
    Long(&'static str),
    Ignore { takes_value: bool },
}

use Rewrite::{Ignore, Long};

const FLAG: Rewrite = Ignore { takes_value: false };
const VALUE: Rewrite = Ignore { takes_value: true };

static PLANTUML_OPTIONS: &[(&str, Rewrite)] = &[
    ("-pipe", Long("pipe")),
    ("-output", Long("output")),
    ("-ofile", Long("ofile")),
    ("-pipedelimitor", Long("pipedelimitor")),
    ("-syntax", Long("syntax")),
    ("-encodeurl", Long("encodeurl")),
    ("-computeurl", Long("encodeurl")),
    ("-decodeurl", Long("decodeurl")),
    ("-language", Long("language")),
    ("-version", Long("version")),
    ("-license", Long("license")),
    ("-about", Long("about")),
    ("-author", Long("about")),
    ("-authors", Long("about")),
    ("-stdlib", Long("stdlib")),
    ("-checkversion", Long("checkversion")),
    ("-testdot", Long("testdot")),
    ("-printfonts", Long("printfonts")),
    ("-help", Long("help")),
    ("-?", Long("help")),
    // no server-side counterpart
    ("-gui", FLAG),
    ("-verbose", FLAG),
    ("-v", FLAG),
    ("-quiet", FLAG),
    ("-recurse", FLAG),
    ("-r", FLAG),
    ("-metadata", FLAG),
    ("-nometadata", FLAG),
    ("-checkmetadata", FLAG),
    ("-word", FLAG),
    ("-overwrite", FLAG),
    ("-debugsvek", FLAG),
    ("-debug_svek", FLAG),
    ("-checkonly", FLAG),
    ("-failfast", FLAG),
    ("-failfast2", FLAG),
    ("-pattern", FLAG),
    ("-duration", FLAG),
    ("-enablestats", FLAG),
    ("-disablestats", FLAG),
    ("-htmlstats", FLAG),
    ("-xmlstats", FLAG),
    ("-realtimestats", FLAG),
    ("-loopstats", FLAG),
    ("-dumpstats", FLAG),
    ("-dumphtmlstats", FLAG),
    ("-clipboard", FLAG),
    ("-clipboardloop", FLAG),
    ("-splash", FLAG),
    ("-progress", FLAG),
    ("-pipemap", FLAG),
    ("-pipenostderr", FLAG),
    ("-extractstdlib", FLAG),
    ("-stdrpt", FLAG),
    ("-stdrpt:1", FLAG),
    ("-useseparatorminus", FLAG),
    ("-preproc", FLAG),
    ("-cypher", FLAG),
    ("-graphvizdot", VALUE),
    ("-graphviz_dot", VALUE),
    ("-encodesprite", VALUE),
    ("-nbthread", VALUE),
    ("-timeout", VALUE),
    ("-config", VALUE),
    ("-c", VALUE),
    ("-charset", VALUE),
    ("-exclude", VALUE),
    ("-x", VALUE),
    ("-logdata", VALUE),
    ("-pipeimageindex", VALUE),
    ("-filename", VALUE),
];

/// `-DVAR=value`, `-Sparam=value`, `-I/path`: value attached or separate.
static PLANTUML_PREFIX_OPTIONS: &[&str] = &["-D", "-S", "-I"];

/// Options (after rewriting) whose next argument is a value.
static PLANTUML_VALUE_OPTIONS: &[&str] = &["-t", "-o", "--output", "--ofile", "--pipedelimitor"];

/// Top-level options whose next argument is a value.
static GLOBAL_VALUE_OPTIONS: &[&str] = &["-u", "--url", "-t", "--timeout"];

/// Arguments ready for clap plus the native options that were dropped.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Normalized {
    pub args: Vec<OsString>,
    pub ignored: Vec<String>,
}

fn lookup(arg: &str) -> Option<Rewrite> {
    if let Some((_, rw)) = PLANTUML_OPTIONS.iter().find(|(name, _)| *name == arg) {
        return Some(*rw);
    }
    PLANTUML_PREFIX_OPTIONS
        .iter()
        .find(|p| arg.starts_with(**p))
        .map(|p| Ignore { takes_value: arg == *p })
}

/// Rewrite native PlantUML options in a full argv (program name first).
pub fn normalize_args<I, T>(argv: I) -> Normalized
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut out = Normalized::default();
    let mut iter = argv.into_iter().map(Into::into);

    if let Some(program) = iter.next() {
        out.args.push(program);
    }

    // Top level: copy through until the subcommand token.
    let mut in_plantuml = false;
    while let Some(arg) = iter.next() {
        let s = arg.to_str().map(str::to_string);
        out.args.push(arg);
        match s.as_deref() {
            Some(flag) if GLOBAL_VALUE_OPTIONS.contains(&flag) => {
                if let Some(value) = iter.next() {
                    out.args.push(value);
                }
            }
            Some("plantuml") => {
                in_plantuml = true;
                break;
            }
            Some(flag) if flag.starts_with('-') => {}
            _ => break,
        }
    }

    if !in_plantuml {
        out.args.extend(iter);
        return out;
    }

    let mut expect_value = false;
    while let Some(arg) = iter.next() {
        if expect_value {
            expect_value = false;
            out.args.push(arg);
            continue;
        }
        let Some(s) = arg.to_str() else {
            out.args.push(arg);
            continue;
        };
        if s == "--" {
            out.args.push(arg);
            out.args.extend(iter);
            break;
        }
        match lookup(s) {
            Some(Long(name)) => {
                let long = format!("--{name}");
                expect_value = PLANTUML_VALUE_OPTIONS.contains(&long.as_str());
                out.args.push(long.into());
            }
            Some(Ignore { takes_value }) => {
                let mut shown = s.to_string();
                if takes_value && let Some(value) = iter.next() {
                    shown.push(' ');
                    shown.push_str(&value.to_string_lossy());
                }
                out.ignored.push(shown);
            }
            None => {
                expect_value = PLANTUML_VALUE_OPTIONS.contains(&s);
                out.args.push(arg);
            }
        }
    }
    out
}
