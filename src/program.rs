use console::Term;
use anyhow::Error;

use crate::mirror::MirrorConnector;
use crate::mirror::extract::{Extractor, HtmlGalleryExtractor, JsonApiExtractor, MediaKind};
use crate::mirror::fetch::HttpFetcher;
use crate::mirror::io::{CONFIG_NAME, Config, SourceShape};

/// The name of the cargo package.
const NAME: &str = env!("CARGO_PKG_NAME");

/// The version of the cargo package.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A program class that handles the flow of the mirroring run and steps of
/// execution.
pub(crate) struct Program;

impl Program {
    /// Creates a new instance of the program.
    pub(crate) fn new() -> Self {
        Self
    }

    /// Runs the mirror program.
    pub(crate) fn run(&self) -> Result<(), Error> {
        Term::stdout().set_title("gallery mirror");
        trace!("Starting gallery mirror...");
        trace!("Program Name: {}", NAME);
        trace!("Program Version: {}", VERSION);

        // Check the config file and ensure that it is created.
        trace!("Checking if config file exists...");
        if !Config::config_exists() {
            info!("Creating config file...");
            Config::create_config()?;
            info!(
                "A default {} was created. Edit it with your source's URLs and page range, then run again.",
                CONFIG_NAME
            );
            return Ok(());
        }

        let config = Config::load()?;
        trace!("Source base URL:       \"{}\"", config.base_url());
        trace!("Page URL template:     \"{}\"", config.page_url_template());
        trace!(
            "Index range:           [{}, {}]",
            config.start_page(),
            config.end_page()
        );
        trace!("Download directory:    \"{}\"", config.download_directory());

        let fetcher = HttpFetcher::new()?;
        let extractor: Box<dyn Extractor> = match config.source_shape() {
            SourceShape::Html => {
                Box::new(HtmlGalleryExtractor::with_default_rules(config.base_url())?)
            }
            SourceShape::JsonApi => Box::new(JsonApiExtractor::new(
                config.base_url(),
                config.api_url_field(),
                config.api_record_filter(),
                MediaKind::Video,
            )?),
        };

        let connector = MirrorConnector::new(&config, extractor.as_ref(), &fetcher);
        let report = connector.run()?;

        info!("Finished mirroring: {}", report);
        Ok(())
    }
}
