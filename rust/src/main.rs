use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use refcode::{CodeConfig, CodeGenerator, GeneratorState, OverflowPolicy};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct CliOpts {
    config_path: Option<PathBuf>,
    prefix: Option<String>,
    date_format: Option<String>,
    separator: Option<String>,
    width: Option<usize>,
    time_zone: Option<String>,
    on_overflow: Option<OverflowPolicy>,
    count: usize,
    state_file: Option<PathBuf>,
    date: Option<String>,
    json: bool,
    strict: bool,
}

impl Default for CliOpts {
    fn default() -> Self {
        Self {
            config_path: None,
            prefix: None,
            date_format: None,
            separator: None,
            width: None,
            time_zone: None,
            on_overflow: None,
            count: 1,
            state_file: None,
            date: None,
            json: false,
            strict: false,
        }
    }
}

fn print_help() {
    eprintln!(
        "refcode - reference code generator CLI\n\n\
Usage:\n  refcode next [--count <n>] [--state-file <path>]\n  refcode from-seq <n> [--date <key>]\n  refcode increment <code>\n  refcode validate <code> [--strict]\n  refcode parse <code> [--json]\n  refcode date-key\n  refcode healthcheck [--json]\n\n\
Common flags:\n  --prefix <s> --separator <s> --date-format <strftime> --width <n>\n  --tz <IANA zone> --on-overflow continue|reset --config <file.json>\n\n\
Configuration layers: defaults, --config file, REFCODE_* environment, flags.\n\
Logging: REFCODE_LOG=<filter> (default refcode=warn), written to stderr.\n"
    );
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_env("REFCODE_LOG").unwrap_or_else(|_| EnvFilter::new("refcode=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn take_value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str, String> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| format!("missing value for {flag}"))
}

fn parse_flags(args: &[String]) -> Result<(Vec<String>, CliOpts), String> {
    let mut opts = CliOpts::default();
    let mut positional = Vec::new();
    let mut i = 0;

    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--json" => {
                opts.json = true;
                i += 1;
                continue;
            }
            "--strict" => {
                opts.strict = true;
                i += 1;
                continue;
            }
            _ if !flag.starts_with("--") => {
                positional.push(args[i].clone());
                i += 1;
                continue;
            }
            _ => {}
        }

        let value = take_value(args, i, flag)?;
        match flag {
            "--config" => opts.config_path = Some(PathBuf::from(value)),
            "--prefix" => opts.prefix = Some(value.to_string()),
            "--date-format" => opts.date_format = Some(value.to_string()),
            "--separator" => opts.separator = Some(value.to_string()),
            "--width" => {
                opts.width = Some(
                    value
                        .parse::<usize>()
                        .map_err(|_| "invalid integer for --width".to_string())?,
                )
            }
            "--tz" => opts.time_zone = Some(value.to_string()),
            "--on-overflow" => {
                opts.on_overflow = Some(
                    OverflowPolicy::parse(value)
                        .ok_or_else(|| "--on-overflow must be continue or reset".to_string())?,
                )
            }
            "--count" => {
                opts.count = match value.parse::<usize>() {
                    Ok(0) => return Err("--count must be >= 1".to_string()),
                    Ok(n) => n,
                    Err(_) => return Err("invalid integer for --count".to_string()),
                }
            }
            "--state-file" => opts.state_file = Some(PathBuf::from(value)),
            "--date" => opts.date = Some(value.to_string()),
            _ => return Err(format!("unknown flag: {flag}")),
        }
        i += 2;
    }

    Ok((positional, opts))
}

fn resolve_config(opts: &CliOpts) -> Result<CodeConfig, String> {
    resolve_config_with(opts, |key| env::var(key).ok())
}

fn resolve_config_with<F>(opts: &CliOpts, lookup: F) -> Result<CodeConfig, String>
where
    F: Fn(&str) -> Option<String>,
{
    let base = match &opts.config_path {
        Some(path) => CodeConfig::from_file(path).map_err(|e| e.to_string())?,
        None => CodeConfig::default(),
    };
    let mut config = base.overlay_lookup(lookup).map_err(|e| e.to_string())?;

    if let Some(v) = &opts.prefix {
        config.prefix = v.clone();
    }
    if let Some(v) = &opts.date_format {
        config.date_format = v.clone();
    }
    if let Some(v) = &opts.separator {
        config.separator = v.clone();
    }
    if let Some(v) = opts.width {
        config.sequence_width = v;
    }
    if let Some(v) = &opts.time_zone {
        config.time_zone = v.clone();
    }
    if let Some(v) = opts.on_overflow {
        config.on_overflow = v;
    }
    Ok(config)
}

fn build_generator(opts: &CliOpts) -> Result<CodeGenerator, String> {
    CodeGenerator::new(resolve_config(opts)?).map_err(|e| e.to_string())
}

fn single_positional(positional: &[String], what: &str) -> Result<String, String> {
    match positional {
        [one] => Ok(one.clone()),
        [] => Err(format!("{what} is required")),
        _ => Err(format!("expected a single {what}")),
    }
}

fn load_state(path: &Path) -> Result<Option<GeneratorState>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| format!("failed to read state file: {e}"))?;
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| format!("invalid state file: {e}"))
}

fn save_state(path: &Path, state: &GeneratorState) -> Result<(), String> {
    let raw = serde_json::to_string_pretty(state).map_err(|e| e.to_string())?;
    fs::write(path, raw).map_err(|e| format!("failed to write state file: {e}"))
}

fn run_next(args: &[String]) -> Result<(), String> {
    let (positional, opts) = parse_flags(args)?;
    if !positional.is_empty() {
        return Err(format!("unexpected argument: {}", positional[0]));
    }

    let mut generator = build_generator(&opts)?;
    for code in next_codes(&mut generator, &opts)? {
        println!("{code}");
    }
    Ok(())
}

/// `next` proper: restore from the state file, generate, write the state back.
fn next_codes(generator: &mut CodeGenerator, opts: &CliOpts) -> Result<Vec<String>, String> {
    if let Some(path) = &opts.state_file {
        if let Some(state) = load_state(path)? {
            generator.restore_state(state);
        }
    }

    let codes = generator.next_n(opts.count);

    if let Some(path) = &opts.state_file {
        save_state(path, &generator.state())?;
    }
    Ok(codes)
}

fn run_from_seq(args: &[String]) -> Result<(), String> {
    let (positional, opts) = parse_flags(args)?;
    let sequence = single_positional(&positional, "sequence")?
        .parse::<u64>()
        .map_err(|_| "sequence must be a positive integer".to_string())?;

    let generator = build_generator(&opts)?;
    let code = generator
        .generate_from_sequence(sequence, opts.date.as_deref())
        .map_err(|e| e.to_string())?;
    println!("{code}");
    Ok(())
}

fn run_increment(args: &[String]) -> Result<(), String> {
    let (positional, opts) = parse_flags(args)?;
    let code = single_positional(&positional, "code")?;
    let generator = build_generator(&opts)?;
    println!("{}", generator.increment(&code).map_err(|e| e.to_string())?);
    Ok(())
}

fn run_validate(args: &[String]) -> Result<(), String> {
    let (positional, opts) = parse_flags(args)?;
    let code = single_positional(&positional, "code")?;
    let generator = build_generator(&opts)?;

    let ok = if opts.strict {
        generator.validate_strict(&code)
    } else {
        generator.validate(&code)
    };

    println!("{}", if ok { "true" } else { "false" });
    if ok {
        Ok(())
    } else {
        Err("invalid code".to_string())
    }
}

fn run_parse(args: &[String]) -> Result<(), String> {
    let (positional, opts) = parse_flags(args)?;
    let code = single_positional(&positional, "code")?;
    let generator = build_generator(&opts)?;
    let parsed = generator.parse(&code).map_err(|e| e.to_string())?;

    if opts.json {
        println!("{}", serde_json::to_string(&parsed).map_err(|e| e.to_string())?);
    } else {
        println!("prefix={}", parsed.prefix);
        println!("date={}", parsed.date);
        println!("sequence={}", parsed.sequence);
    }
    Ok(())
}

fn run_date_key(args: &[String]) -> Result<(), String> {
    let (_, opts) = parse_flags(args)?;
    println!("{}", build_generator(&opts)?.date_key());
    Ok(())
}

fn run_healthcheck(args: &[String]) -> Result<(), String> {
    let (_, opts) = parse_flags(args)?;
    let generator = build_generator(&opts)?;

    let sample = generator.generate_from_sequence(1, None).map_err(|e| e.to_string())?;
    let ok = generator.validate(&sample)
        && generator.extract_sequence(&sample) == Some(1)
        && generator.extract_date(&sample) == generator.date_key();

    if opts.json {
        let config = generator.config();
        let payload = json!({
            "ok": ok,
            "prefix": config.prefix,
            "date_format": config.date_format,
            "separator": config.separator,
            "sequence_width": generator.sequence_width(),
            "time_zone": config.time_zone,
            "on_overflow": config.on_overflow.as_str(),
            "sample_code": sample,
        });
        println!("{}", serde_json::to_string(&payload).map_err(|e| e.to_string())?);
    } else {
        println!("ok={} sample={}", if ok { "true" } else { "false" }, sample);
    }

    if ok {
        Ok(())
    } else {
        Err("healthcheck failed".to_string())
    }
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();

    if args.is_empty() {
        print_help();
        process::exit(2);
    }

    if args[0] == "-h" || args[0] == "--help" || args[0] == "help" {
        print_help();
        return;
    }

    init_logging();

    let cmd = args[0].as_str();
    let rest = &args[1..];

    let res = match cmd {
        "next" => run_next(rest),
        "from-seq" => run_from_seq(rest),
        "increment" => run_increment(rest),
        "validate" => run_validate(rest),
        "parse" => run_parse(rest),
        "date-key" => run_date_key(rest),
        "healthcheck" => run_healthcheck(rest),
        _ => Err(format!("unknown command: {}", cmd)),
    };

    if let Err(err) = res {
        eprintln!("error: {}", err);
        process::exit(1);
    }
}
