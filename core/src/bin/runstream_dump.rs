//! runstream-dump: decode a captured run stream into JSON lines.
//!
//! ```text
//! runstream-dump [--fold-depth N] [--read-size N] [--config FILE] [--stats] [FILE]
//! runstream-dump --encode [FILE]
//! ```
//!
//! Reads FILE, or stdin when omitted. One `{"key": ..., "record": ...}`
//! object per line on stdout. `--stats` writes the telemetry snapshot to
//! stderr when decoding ends. `--encode` goes the other way: JSON lines in,
//! framed stream out (fixtures for tests and benchmarks). Log level via
//! `RUST_LOG` (default `warn`).

use std::env;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};

use runstream_core::config::PipelineConfig;
use runstream_core::stream::framing::FrameWriter;
use runstream_core::stream::pathval::{encode_path, encode_value};
use runstream_core::stream::{decode_records, open_input, unfold, InputSource};
use runstream_core::value::{Node, Path, Record, ScalarValue};

#[derive(Debug, Default)]
struct CliConfig {
    fold_depth: Option<usize>,
    read_size: Option<usize>,
    config: Option<PathBuf>,
    stats: bool,
    encode: bool,
    input: Option<PathBuf>,
}

fn print_help() {
    println!(
        "runstream-dump [--fold-depth N] [--read-size N] [--config FILE] [--stats] [FILE]\n\
         runstream-dump --encode [FILE]\n\n\
         Decode a framed path/value stream and print one JSON record per line,\n\
         or with --encode turn such JSON lines back into a framed stream.\n\
         Reads stdin when FILE is omitted."
    );
}

fn parse_usize(flag: &str, value: Option<&String>) -> Result<usize> {
    let Some(value) = value else {
        bail!("{flag} requires a value");
    };
    value.parse().with_context(|| format!("invalid value for {flag}: {value}"))
}

/// `Ok(None)` when help was printed.
fn parse_args(args: &[String]) -> Result<Option<CliConfig>> {
    let mut cli = CliConfig::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--fold-depth" => cli.fold_depth = Some(parse_usize(arg, iter.next())?),
            "--read-size" => cli.read_size = Some(parse_usize(arg, iter.next())?),
            "--config" => {
                let Some(path) = iter.next() else {
                    bail!("--config requires a value");
                };
                cli.config = Some(PathBuf::from(path));
            }
            "--stats" => cli.stats = true,
            "--encode" => cli.encode = true,
            "-h" | "--help" => {
                print_help();
                return Ok(None);
            }
            flag if flag.starts_with("--") => bail!("unknown option: {flag}"),
            path => {
                if cli.input.is_some() {
                    bail!("more than one input file given");
                }
                cli.input = Some(PathBuf::from(path));
            }
        }
    }

    Ok(Some(cli))
}

fn float_json(f: f64) -> Value {
    if f.is_nan() {
        Value::from("NaN")
    } else if f.is_infinite() {
        Value::from(if f > 0.0 { "Infinity" } else { "-Infinity" })
    } else {
        Value::from(f)
    }
}

fn node_json(node: &Node) -> Value {
    match node {
        Node::Scalar(s) => match s {
            ScalarValue::Null => Value::Null,
            ScalarValue::Bool(b) => Value::Bool(*b),
            ScalarValue::Int(i) => Value::from(*i),
            ScalarValue::Float(f) => float_json(*f),
            ScalarValue::String(s) => Value::String(s.clone()),
            ScalarValue::Blob(b) => Value::String(STANDARD.encode(b)),
        },
        Node::Array(items) => Value::Array(items.iter().map(node_json).collect()),
        Node::Map(entries) => Value::Object(entries.iter().map(|(k, v)| (k.clone(), node_json(v))).collect()),
    }
}

fn json_node(value: &Value) -> Node {
    match value {
        Value::Null => Node::null(),
        Value::Bool(b) => Node::from(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Node::from(i),
            None => Node::from(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => Node::from(s.as_str()),
        Value::Array(items) => Node::Array(items.iter().map(json_node).collect()),
        Value::Object(map) => Node::Map(map.iter().map(|(k, v)| (k.clone(), json_node(v))).collect()),
    }
}

/// JSON lines on `input` -> framed stream on `out`. Returns frames written.
fn encode_lines<W: Write>(input: impl BufRead, out: W) -> Result<u64> {
    let mut writer = FrameWriter::new(out);

    for (n, line) in input.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let doc: Value = serde_json::from_str(&line).with_context(|| format!("line {}", n + 1))?;
        let Some(key) = doc.get("key").and_then(Value::as_str) else {
            bail!("line {}: missing string field `key`", n + 1);
        };
        let record = Record {
            key: Path::parse_dotted(key),
            root: doc.get("record").map(json_node).unwrap_or_else(Node::null),
        };
        for (path, leaf) in unfold(&record) {
            writer.write_pair(&encode_path(&path), &encode_value(&leaf))?;
        }
    }

    writer.flush()?;
    Ok(writer.frames_written())
}

fn run_encode(cli: &CliConfig) -> Result<()> {
    let input: Box<dyn Read> = match &cli.input {
        Some(path) => Box::new(
            std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?,
        ),
        None => Box::new(io::stdin()),
    };
    let stdout = io::stdout();
    let frames = encode_lines(BufReader::new(input), BufWriter::new(stdout.lock()))?;
    tracing::debug!(frames, "encoded");
    Ok(())
}

fn run(cli: CliConfig) -> Result<()> {
    if cli.encode {
        return run_encode(&cli);
    }

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(depth) = cli.fold_depth {
        config = config.with_fold_depth(depth);
    }
    if let Some(size) = cli.read_size {
        config = config.with_read_size(size);
    }

    let source = match &cli.input {
        Some(path) => InputSource::File(path.clone()),
        None => InputSource::Reader(Box::new(io::stdin())),
    };
    let transport = open_input(source).context("opening input")?;
    let mut records = decode_records(transport, config)?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut outcome: Result<()> = Ok(());

    for item in records.by_ref() {
        match item {
            Ok(record) => {
                let line = json!({ "key": record.key_string(), "record": node_json(&record.root) });
                writeln!(out, "{line}")?;
            }
            Err(e) => {
                outcome = Err(e).context("decoding stream");
                break;
            }
        }
    }
    out.flush()?;

    if cli.stats {
        eprintln!("{}", records.snapshot().to_json()?);
    }
    outcome
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let cli = match parse_args(&args) {
        Ok(Some(cli)) => cli,
        Ok(None) => return ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("runstream-dump: {e:#}");
            return ExitCode::from(2);
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("runstream-dump: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_flags_and_file() {
        let cli = parse_args(&args(&["--fold-depth", "2", "--stats", "runs.bin"])).unwrap().unwrap();
        assert_eq!(cli.fold_depth, Some(2));
        assert!(cli.stats);
        assert_eq!(cli.input, Some(PathBuf::from("runs.bin")));
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(parse_args(&args(&["--read-size"])).is_err());
        assert!(parse_args(&args(&["--read-size", "big"])).is_err());
        assert!(parse_args(&args(&["--verbose"])).is_err());
        assert!(parse_args(&args(&["a", "b"])).is_err());
    }

    #[test]
    fn renders_non_finite_floats_and_blobs() {
        let node = Node::Array(vec![
            Node::from(f64::NAN),
            Node::from(f64::NEG_INFINITY),
            Node::from(1.5),
            Node::Scalar(ScalarValue::Blob(bytes::Bytes::from_static(b"hi"))),
        ]);
        assert_eq!(node_json(&node), json!(["NaN", "-Infinity", 1.5, "aGk="]));
    }

    #[test]
    fn encode_then_decode_restores_records() {
        let lines = concat!(
            r#"{"key": "runA", "record": {"params": {"lr": 0.01, "batch": 32}, "tags": []}}"#,
            "\n\n",
            r#"{"key": "runB", "record": {"params": {"lr": 0.1}}}"#,
            "\n",
        );
        let mut wire = Vec::new();
        let frames = encode_lines(lines.as_bytes(), &mut wire).unwrap();
        assert_eq!(frames, 4);

        let transport = runstream_core::stream::MemoryTransport::new(wire);
        let out: Vec<Value> = decode_records(transport, PipelineConfig::default())
            .unwrap()
            .map(|r| {
                let r = r.unwrap();
                json!({ "key": r.key_string(), "record": node_json(&r.root) })
            })
            .collect();
        assert_eq!(out[0], json!({"key": "runA", "record": {"params": {"lr": 0.01, "batch": 32}, "tags": []}}));
        assert_eq!(out[1]["record"]["params"]["lr"], json!(0.1));
    }

    #[test]
    fn map_keys_keep_stream_order() {
        let node = Node::Map(vec![("zeta".into(), Node::from(1i64)), ("alpha".into(), Node::from(2i64))]);
        assert_eq!(node_json(&node).to_string(), r#"{"zeta":1,"alpha":2}"#);

        let mut wire = Vec::new();
        encode_lines(&br#"{"key": "r", "record": {"zeta": 1, "alpha": 2}}"#[..], &mut wire).unwrap();
        let record = decode_records(runstream_core::stream::MemoryTransport::new(wire), PipelineConfig::default())
            .unwrap()
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(record.root, node);
    }

    #[test]
    fn encode_rejects_missing_key() {
        assert!(encode_lines(&br#"{"record": 1}"#[..], Vec::new()).is_err());
    }
}
