//! Command line tool to train a venue classifier

use anyhow::anyhow;
use burn::backend::{libtorch::LibTorchDevice, Autodiff, LibTorch};
use pico_args::Arguments;
use venue_classifier::{
    datasets::Dataset,
    pipelines::text_classification::{self, Experiment, Predictor},
};

const HELP: &str = "\
Usage: train [OPTIONS] TRAIN_PATH VALIDATION_PATH

Arguments:
  TRAIN_PATH           JSON-lines file of training papers
  VALIDATION_PATH      JSON-lines file of validation papers

Options:
  -h, --help           Print help
  -c, --config         Experiment file (JSON or YAML); positional paths override its data paths
  -o, --output-dir     Where checkpoints and the model archive are written (defaults to 'output')
  -e, --embeddings     GloVe-format embedding file, local or hf://<owner>/<repo>/<file>
  -n, --num-epochs     Number of epochs to train for
  -b, --batch-size     Batch size
  --cpu                Train on the CPU instead of the first CUDA device
  --no-tui             Disable TUI
";

#[derive(Debug)]
struct Args {
    config: Option<String>,
    output_dir: Option<String>,
    embeddings: Option<String>,
    num_epochs: Option<usize>,
    batch_size: Option<usize>,
    use_cpu: bool,
    use_tui: bool,
    train_path: Option<String>,
    validation_path: Option<String>,
}

impl Args {
    fn parse() -> anyhow::Result<Option<Self>> {
        let mut pargs = Arguments::from_env();

        // Help has a higher priority and should be handled separately.
        if pargs.contains(["-h", "--help"]) {
            return Ok(None);
        }

        let args = Args {
            config: pargs.opt_value_from_str(["-c", "--config"])?,
            output_dir: pargs.opt_value_from_str(["-o", "--output-dir"])?,
            embeddings: pargs.opt_value_from_str(["-e", "--embeddings"])?,
            num_epochs: pargs.opt_value_from_str(["-n", "--num-epochs"])?,
            batch_size: pargs.opt_value_from_str(["-b", "--batch-size"])?,
            use_cpu: pargs.contains("--cpu"),
            use_tui: !(pargs.contains("--no-tui")),
            train_path: pargs.opt_free_from_str()?,
            validation_path: pargs.opt_free_from_str()?,
        };

        Ok(Some(args))
    }

    /// Build the experiment from the config file, then apply command line overrides
    fn experiment(&self) -> anyhow::Result<Experiment> {
        let mut experiment = match (&self.config, &self.train_path, &self.validation_path) {
            (Some(config), _, _) => Experiment::from_file(config)?,
            (None, Some(train), Some(validation)) => Experiment::new(train.clone(), validation.clone()),
            (None, None, _) => return Err(anyhow!("Missing required argument: TRAIN_PATH")),
            (None, Some(_), None) => {
                return Err(anyhow!("Missing required argument: VALIDATION_PATH"))
            }
        };

        if let Some(train) = &self.train_path {
            experiment.train_data_path = train.clone();
        }

        if let Some(validation) = &self.validation_path {
            experiment.validation_data_path = validation.clone();
        }

        if let Some(output_dir) = &self.output_dir {
            experiment.artifact_dir = output_dir.clone();
        }

        if let Some(embeddings) = &self.embeddings {
            experiment.pretrained_file = Some(embeddings.clone());
        }

        if let Some(num_epochs) = self.num_epochs {
            experiment.training.num_epochs = num_epochs;
        }

        if let Some(batch_size) = self.batch_size {
            experiment.training.batch_size = batch_size;
        }

        Ok(experiment)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let Some(args) = Args::parse()? else {
        print!("{}", HELP);

        return Ok(());
    };

    let experiment = args.experiment()?;
    let validation_path = experiment.validation_data_path.clone();
    let reader = experiment.reader();

    let device = if args.use_cpu {
        LibTorchDevice::Cpu
    } else {
        LibTorchDevice::Cuda(0)
    };

    let archive_dir =
        text_classification::train::<Autodiff<LibTorch>>(vec![device.clone()], experiment, args.use_tui)
            .await?;

    // Show a few validation papers next to their predicted venue
    let predictor = Predictor::<LibTorch>::from_archive(&archive_dir, device).await?;
    let samples = Dataset::load(&reader, &validation_path).await?.get_samples(5);
    let expected: Vec<_> = samples.iter().map(|s| s.label.clone()).collect();

    for (i, (sample, prediction)) in samples
        .iter()
        .zip(predictor.predict_instances(samples.clone()))
        .enumerate()
    {
        log::info!(
            "\n=== Item {i} ===\
             \n- Title: {}\
             \n- Predicted: {}\
             \n- Expected: {}\
             \n================",
            sample.title.join(" "),
            prediction.label,
            expected[i].as_deref().unwrap_or("-"),
        );
    }

    Ok(())
}
