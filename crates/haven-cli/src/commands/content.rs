use clap::{Subcommand, ValueEnum};
use haven_core::content::{ApiLabelSource, IpfsManifestSource, RandomClipSource};
use haven_core::{Config, ContentSource, LabelSource};

use super::{http_client, print_json, runtime, CliResult};

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum SourceKind {
    /// Fixed manifest published on IPFS
    Ipfs,
    /// Random batch from the API
    Random,
}

#[derive(Subcommand)]
pub enum ContentAction {
    /// Fetch the next batch of clips
    Fetch {
        #[arg(long, value_enum, default_value = "ipfs")]
        source: SourceKind,
    },
    /// Fetch alternative labels for the picker
    Labels,
}

pub fn run(action: ContentAction) -> CliResult {
    let config = Config::load()?;
    let client = http_client(config.api.submit_timeout_secs)?;
    let rt = runtime()?;
    match action {
        ContentAction::Fetch { source } => {
            let source: Box<dyn ContentSource> = match source {
                SourceKind::Ipfs => Box::new(IpfsManifestSource::new(client, &config.api)),
                SourceKind::Random => Box::new(RandomClipSource::new(client, &config.api)),
            };
            let batch = rt.block_on(source.fetch_next_batch())?;
            print_json(&batch)
        }
        ContentAction::Labels => {
            let labels = rt.block_on(ApiLabelSource::new(client, &config.api).alternative_labels())?;
            print_json(&labels)
        }
    }
}
