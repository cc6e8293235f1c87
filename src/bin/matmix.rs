use std::path::PathBuf;
use std::process::ExitCode;

use matmix::{MixerConfig, format_routes, load_config, load_config_from, mix_wav};

const USAGE: &str = "usage: matmix <in.wav> <out.wav> [config.toml] [--routes \"<notation>\"]";

struct Args {
    input: PathBuf,
    output: PathBuf,
    config: Option<PathBuf>,
    routes: Option<String>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Option<Args> {
    let mut positional = Vec::new();
    let mut routes = None;
    while let Some(arg) = args.next() {
        if arg == "--routes" {
            routes = Some(args.next()?);
        } else {
            positional.push(PathBuf::from(arg));
        }
    }
    if !(2..=3).contains(&positional.len()) {
        return None;
    }
    let mut positional = positional.into_iter();
    Some(Args {
        input: positional.next()?,
        output: positional.next()?,
        config: positional.next(),
        routes,
    })
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config: MixerConfig = match &args.config {
        Some(path) => load_config_from(path)?,
        None => load_config(),
    };
    if args.routes.is_some() {
        config.routes = args.routes;
    }

    let mut mixer = config.build()?;
    // offline renders start from the configured gains
    mixer.settle();
    log::info!("Routes: {}", format_routes(mixer.applied(), mixer.shape()));

    let frames = mix_wav(&mut mixer, &args.input, &args.output)?;
    log::info!(
        "Rendered {} frames ({:.2} s)",
        frames,
        frames as f64 / mixer.sample_rate()
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Some(args) = parse_args(std::env::args().skip(1)) else {
        eprintln!("{USAGE}");
        return ExitCode::from(2);
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
