//! Command line tool for predicting venues with a trained model archive

use std::path::Path;

use anyhow::Result;
use burn::backend::{libtorch::LibTorchDevice, LibTorch};
use pico_args::Arguments;
use serde_json::Value;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use venue_classifier::{pipelines::text_classification::Predictor, utils::files::file_reader};

const HELP: &str = "\
Usage: predict [OPTIONS] ARCHIVE_DIR [INPUT_FILE]

Arguments:
  ARCHIVE_DIR          Model archive written by the train command
  INPUT_FILE           JSON lines of {\"title\", \"paperAbstract\"}; reads stdin when absent

Options:
  -h, --help           Print help
  -b, --batch-size     Number of papers per forward pass (defaults to 32)
  --cpu                Predict on the CPU instead of the first CUDA device
";

#[derive(Debug)]
struct Args {
    /// Papers per forward pass
    batch_size: usize,

    /// Use the CPU
    use_cpu: bool,

    /// The model archive
    archive_dir: String,

    /// Input file, stdin when absent
    input: Option<String>,
}

impl Args {
    fn parse() -> Result<Option<Self>> {
        let mut pargs = Arguments::from_env();

        // Help has a higher priority and should be handled separately.
        if pargs.contains(["-h", "--help"]) {
            return Ok(None);
        }

        let args = Args {
            batch_size: pargs
                .opt_value_from_str(["-b", "--batch-size"])?
                .unwrap_or(32),
            use_cpu: pargs.contains("--cpu"),
            archive_dir: pargs.free_from_str()?,
            input: pargs.opt_free_from_str()?,
        };

        Ok(Some(args))
    }
}

async fn read_lines(input: Option<&str>) -> Result<Vec<String>> {
    let mut lines = Vec::new();

    match input {
        Some(path) => {
            let mut reader = file_reader(Path::new(path)).await?;
            while let Some(line) = reader.next_line().await? {
                lines.push(line);
            }
        }
        None => {
            let mut reader = BufReader::new(io::stdin()).lines();
            while let Some(line) = reader.next_line().await? {
                lines.push(line);
            }
        }
    }

    Ok(lines)
}

#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::init();

    let Some(args) = Args::parse()? else {
        print!("{}", HELP);
        return Ok(());
    };

    let device = if args.use_cpu {
        LibTorchDevice::Cpu
    } else {
        LibTorchDevice::Cuda(0)
    };

    let predictor = Predictor::<LibTorch>::from_archive(&args.archive_dir, device).await?;

    let inputs = read_lines(args.input.as_deref())
        .await?
        .into_iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str::<Value>(&line))
        .collect::<Result<Vec<_>, _>>()?;

    log::info!("Predicting venues for {} papers", inputs.len());

    for chunk in inputs.chunks(args.batch_size.max(1)) {
        for output in predictor.predict_batch_json(chunk)? {
            println!("{}", output);
        }
    }

    Ok(())
}
