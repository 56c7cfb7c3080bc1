/*!
`plantuml.rs`

Implements the `plantuml` subcommand: a stand-in for the PlantUML CLI that
renders through a PlantUML server.

Modes (first match wins):
  - information flags (-version, -license, -about, -stdlib, -checkversion,
    -testdot, -printfonts): POST `<base>/txt/` with a one-word diagram
  - -language : GET `<base>/language`
  - -encodeurl / -decodeurl : local text encoding, no request
  - -syntax : GET `<base>/check/<encoded source>`
  - default : POST `<base>/<format pattern>/` with the source as body

The diagram source comes from the positional file, or stdin with -pipe.
The response body goes to stdout unless -o DIR / -ofile FILE redirect it.
*/

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use clap::builder::PossibleValuesParser;

use crate::cmd::encoding;
use crate::cmd::shared::{self, Globals};
use crate::error::{SabacanError, exitcode};
use crate::server::{RequestSpec, Service};

/// Output formats the PlantUML server can render.
pub const FORMATS: &[&str] = &[
    "png",
    "braille",
    "svg",
    "svg:nornd",
    "eps",
    "eps:text",
    "pdf",
    "vdx",
    "xmi",
    "xmi:argo",
    "xmi:star",
    "scxml",
    "html",
    "txt",
    "utxt",
    "latex",
    "latex:nopreamble",
    "base64",
];

/// Formats served under a different URL segment than their name.
const FORMAT_URL_PATTERNS: &[(&str, &str)] = &[("eps:text", "epstext"), ("utxt", "txt")];

/* -------------------------------------------------------------------------- */
/* Argument Struct                                                            */
/* -------------------------------------------------------------------------- */

#[derive(Args, Debug)]
pub struct PlantUmlArgs {
    /// To generate images using specified format (default is PNG)
    #[arg(
        short = 't',
        value_name = "format",
        default_value = "png",
        value_parser = PossibleValuesParser::new(FORMATS)
    )]
    pub format: String,

    /// To generate images in the specified directory
    #[arg(short = 'o', long = "output", value_name = "dir")]
    pub outdir: Option<PathBuf>,

    /// To generate an image with the specified filename
    #[arg(long = "ofile", value_name = "file")]
    pub outfile: Option<PathBuf>,

    /// To use stdin for PlantUML source and stdout for image generation
    #[arg(short = 'p', long)]
    pub pipe: bool,

    /// Line printed after the image in pipe mode
    #[arg(long, value_name = "text")]
    pub pipedelimitor: Option<String>,

    /// To report any syntax error without generating images
    #[arg(long)]
    pub syntax: bool,

    /// To compute the encoded URL of a PlantUML source file
    #[arg(long)]
    pub encodeurl: bool,

    /// To retrieve the PlantUML source from an encoded URL
    #[arg(long)]
    pub decodeurl: bool,

    /// To print the list of PlantUML keywords
    #[arg(long)]
    pub language: bool,

    /// To display information about PlantUML and Java versions
    #[arg(long)]
    pub version: bool,

    /// To display license
    #[arg(long)]
    pub license: bool,

    /// To print information about PlantUML authors
    #[arg(long)]
    pub about: bool,

    /// To print standard library info
    #[arg(long)]
    pub stdlib: bool,

    /// To check if a newer version is available for download
    #[arg(long)]
    pub checkversion: bool,

    /// To test the installation of graphviz
    #[arg(long)]
    pub testdot: bool,

    /// To print fonts available on your system
    #[arg(long)]
    pub printfonts: bool,

    /// UML source file (encoded text with -decodeurl)
    #[arg(value_name = "file")]
    pub input: Option<PathBuf>,
}

impl PlantUmlArgs {
    /// Keyword of the information diagram requested, if any.
    fn info_keyword(&self) -> Option<&'static str> {
        [
            (self.version, "version"),
            (self.license, "license"),
            (self.about, "authors"),
            (self.stdlib, "stdlib"),
            (self.checkversion, "checkversion"),
            (self.testdot, "testdot"),
            (self.printfonts, "help font"),
        ]
        .into_iter()
        .find_map(|(set, keyword)| set.then_some(keyword))
    }

    /// True when the invocation never needs the server.
    fn is_local(&self) -> bool {
        self.info_keyword().is_none() && !self.language && (self.decodeurl || self.encodeurl)
    }
}

/* -------------------------------------------------------------------------- */
/* Translation                                                                */
/* -------------------------------------------------------------------------- */

/// Where a relayed body ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Stdout,
    File(PathBuf),
}

/// Result of translating the arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// One request whose body is relayed to `output`.
    Request { spec: RequestSpec, output: Output },
    /// Handled locally; the text is printed and no request is made.
    Local(String),
}

/// URL segment for an output format.
pub fn format_url_pattern(format: &str) -> &str {
    FORMAT_URL_PATTERNS
        .iter()
        .find(|(f, _)| *f == format)
        .map_or(format, |(_, pattern)| *pattern)
}

/// File extension (with dot) for an output format.
pub fn format_extension(format: &str) -> String {
    match format {
        "txt" => ".atxt".to_string(),
        "braille" => ".braille.png".to_string(),
        _ => match format.split_once(':') {
            Some((base, _)) => format!(".{base}"),
            None => format!(".{format}"),
        },
    }
}

/// Translate arguments into a plan. `stdin` is read only in pipe mode.
pub fn translate<R: Read + ?Sized>(args: &PlantUmlArgs, stdin: &mut R) -> Result<Plan, SabacanError> {
    if let Some(keyword) = args.info_keyword() {
        let code = format!("@startuml\n{keyword}\n@enduml");
        return Ok(Plan::Request {
            spec: RequestSpec::post_text("txt/", code.into_bytes()),
            output: Output::Stdout,
        });
    }

    if args.language {
        return Ok(Plan::Request {
            spec: RequestSpec::get("language"),
            output: Output::Stdout,
        });
    }

    if args.decodeurl {
        let encoded = args
            .input
            .as_ref()
            .ok_or_else(|| SabacanError::input("no encoded text given"))?;
        let mut source = encoding::decode(&encoded.to_string_lossy())?;
        source.push('\n');
        return Ok(Plan::Local(source));
    }

    let source = read_source(args, stdin)?;

    if args.encodeurl {
        let text = String::from_utf8(source)
            .map_err(|_| SabacanError::input("diagram source is not valid UTF-8"))?;
        let mut encoded = encoding::encode(&text)?;
        encoded.push('\n');
        return Ok(Plan::Local(encoded));
    }

    if args.syntax {
        let text = String::from_utf8(source)
            .map_err(|_| SabacanError::input("diagram source is not valid UTF-8"))?;
        let path = format!("check/{}", encoding::encode(&text)?);
        return Ok(Plan::Request {
            spec: RequestSpec::get(path),
            output: Output::Stdout,
        });
    }

    let path = format!("{}/", format_url_pattern(&args.format));
    Ok(Plan::Request {
        spec: RequestSpec::post_text(path, source),
        output: output_for(args),
    })
}

fn read_source<R: Read + ?Sized>(args: &PlantUmlArgs, stdin: &mut R) -> Result<Vec<u8>, SabacanError> {
    if args.pipe {
        return shared::read_stream(stdin, "<stdin>");
    }
    match &args.input {
        Some(path) => shared::read_input(path),
        None => Err(SabacanError::input(
            "no diagram file given (pass a file or use -pipe)",
        )),
    }
}

fn output_for(args: &PlantUmlArgs) -> Output {
    if args.pipe {
        if args.outfile.is_some() || args.outdir.is_some() {
            tracing::warn!("-o/-ofile ignored in pipe mode; writing to stdout");
        }
        return Output::Stdout;
    }
    if let Some(file) = &args.outfile {
        return Output::File(file.clone());
    }
    match (&args.outdir, &args.input) {
        (Some(dir), Some(input)) => Output::File(output_path(input, dir, &args.format)),
        _ => Output::Stdout,
    }
}

/// `<dir>/<input stem><ext>`; a relative `dir` is taken from the input's folder.
fn output_path(input: &Path, dir: &Path, format: &str) -> PathBuf {
    let base = input.parent().unwrap_or(Path::new("")).join(dir);
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "diagram".to_string());
    base.join(format!("{stem}{}", format_extension(format)))
}

/* -------------------------------------------------------------------------- */
/* Public Entry Point                                                         */
/* -------------------------------------------------------------------------- */

pub fn execute_plantuml(args: PlantUmlArgs, globals: &Globals) -> Result<i32> {
    let target = if args.is_local() {
        None
    } else {
        Some(shared::resolve(Service::PlantUml, globals)?)
    };

    let plan = translate(&args, &mut io::stdin().lock())?;
    let (spec, output) = match plan {
        Plan::Local(text) => {
            let mut out = io::stdout().lock();
            out.write_all(text.as_bytes())
                .and_then(|_| out.flush())
                .context("Failed to write to stdout")?;
            return Ok(exitcode::OK);
        }
        Plan::Request { spec, output } => (spec, output),
    };
    let target = match target {
        Some(target) => target,
        None => shared::resolve(Service::PlantUml, globals)?,
    };

    let outcome = shared::run_request(&spec, &target)?;
    let code = match &output {
        Output::Stdout => shared::relay_stdout(&outcome)?,
        Output::File(path) => shared::write_output_file(&outcome, path)?,
    };

    if args.pipe
        && let Some(delim) = &args.pipedelimitor
    {
        println!("{delim}");
    }
    Ok(code)
}

/* -------------------------------------------------------------------------- */
/* Tests                                                                      */
/* -------------------------------------------------------------------------- */
