use log::{debug, error};
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, GaugeVec, IntCounter, Opts, Registry, TextEncoder};

use crate::error::Result;
use crate::providers::{BuildkiteProvider, PipelineStats};

const NAMESPACE: &str = "buildkite";

/// Turns Buildkite build counts into Prometheus metrics on demand.
///
/// The two counters live in the exporter's registry for the whole process.
/// `builds_total` is rebuilt from scratch on every scrape so series for
/// pipelines or states that disappeared are not carried over.
pub struct Exporter {
    provider: BuildkiteProvider,
    registry: Registry,
    builds_total: Opts,
    total_scrapes: IntCounter,
    scrape_errors: IntCounter,
}

impl Exporter {
    pub fn new(provider: BuildkiteProvider) -> Result<Self> {
        let registry = Registry::new();

        let total_scrapes = IntCounter::with_opts(
            Opts::new(
                "scrapes_total",
                "Total number of times Buildkite was scraped for metrics.",
            )
            .namespace(NAMESPACE),
        )?;
        let scrape_errors = IntCounter::with_opts(
            Opts::new(
                "scrape_errors_total",
                "Total number of errors while attempting to scrape Buildkite.",
            )
            .namespace(NAMESPACE),
        )?;

        registry.register(Box::new(total_scrapes.clone()))?;
        registry.register(Box::new(scrape_errors.clone()))?;

        let builds_total =
            Opts::new("builds_total", "Total number of buildkite builds").namespace(NAMESPACE);

        Ok(Self {
            provider,
            registry,
            builds_total,
            total_scrapes,
            scrape_errors,
        })
    }

    /// Scrape Buildkite once and return every metric family to expose.
    ///
    /// A failed scrape is logged and counted; the counters are still returned.
    pub async fn collect(&self) -> Result<Vec<MetricFamily>> {
        self.total_scrapes.inc();

        let scrape_registry = Registry::new();
        match self.provider.fetch_pipeline_stats().await {
            Ok(pipelines) => {
                debug!("Scraped {} pipelines", pipelines.len());
                let builds = self.builds_gauge(&pipelines)?;
                scrape_registry.register(Box::new(builds))?;
            }
            Err(e) => {
                error!(
                    "Failed to scrape Buildkite organization '{}': {e}",
                    self.provider.organization
                );
                self.scrape_errors.inc();
            }
        }

        let mut families = self.registry.gather();
        families.extend(scrape_registry.gather());
        families.sort_by(|a, b| a.get_name().cmp(b.get_name()));
        Ok(families)
    }

    /// Scrape and encode in the Prometheus text exposition format.
    pub async fn render(&self) -> Result<String> {
        let families = self.collect().await?;

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;

        Ok(String::from_utf8(buffer)?)
    }

    #[allow(clippy::cast_precision_loss)]
    fn builds_gauge(&self, pipelines: &[PipelineStats]) -> Result<GaugeVec> {
        let builds = GaugeVec::new(self.builds_total.clone(), &["state", "pipeline"])?;

        for pipeline in pipelines {
            for stat in &pipeline.stats {
                builds
                    .get_metric_with_label_values(&[stat.state.as_str(), pipeline.slug.as_str()])?
                    .set(stat.count as f64);
            }
        }

        Ok(builds)
    }
}
