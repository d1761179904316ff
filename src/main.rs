use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use structopt::StructOpt;

use wayback_terms::{AnalysisOutcome, AnalysisReport, AnalysisRequest, Analyzer, Config, Language};

#[allow(missing_docs)]
#[derive(Debug, StructOpt)]
#[structopt(
    name = "wayback-terms",
    about = "Term frequency analysis of archived web pages."
)]
struct App {
    #[structopt(long = "start", help = "First year of the period.")]
    start_year: i32,
    #[structopt(long = "end", help = "Last year of the period.")]
    end_year: i32,
    #[structopt(
        long = "max-documents",
        help = "Max. number of pages to analyze.",
        default_value = "600"
    )]
    max_documents: usize,
    #[structopt(
        long = "domain",
        help = "Domain to search, can be repeated. Popular news sites if omitted."
    )]
    domains: Vec<String>,
    #[structopt(
        long = "term",
        help = "Only pages whose url contains this word, can be repeated."
    )]
    search_terms: Vec<String>,
    #[structopt(
        long = "language",
        help = "Language of the content to keep.",
        default_value = "en"
    )]
    language: String,
    #[structopt(long = "top", help = "Number of top terms to show.", default_value = "20")]
    top: usize,
    #[structopt(flatten)]
    opts: Opts,
    #[structopt(
        long = "output",
        short = "o",
        help = "The file to store the report as json.",
        parse(from_os_str)
    )]
    output: Option<PathBuf>,
}

impl App {
    async fn run(self) -> anyhow::Result<()> {
        let language = match self.language.parse::<Language>() {
            Ok(language) => language,
            Err(other) => other,
        };
        let request = AnalysisRequest::new(self.start_year, self.end_year)
            .max_documents(self.max_documents)
            .domains(&self.domains)
            .search_terms(&self.search_terms)
            .language(language);

        let mut analyzer = Analyzer::new(self.opts.as_config())?;
        let report = match analyzer.analyze_period(request).await {
            AnalysisOutcome::Completed(report) => report,
            AnalysisOutcome::Failed { error } => bail!("Analysis failed: {}", error),
        };

        Self::print_summary(&report, self.top);
        let cache = analyzer.cache_stats();
        eprintln!(
            "Term cache: {} hits, {} misses ({:.1}% hit rate)",
            cache.cache_hits, cache.cache_misses, cache.hit_rate_percent
        );

        Self::write(self.output, &report).await
    }

    fn print_summary(report: &AnalysisReport, top: usize) {
        let summary = &report.summary;
        eprintln!(
            "Documents: {} found, {} with content",
            summary.total_documents, summary.documents_with_content
        );
        eprintln!("Unique terms: {}", summary.total_unique_terms);
        if let Some(stats) = summary.session_stats {
            eprintln!(
                "Requests: {} total, {} failed ({:.1}% success)",
                stats.total_requests, stats.failed_requests, stats.success_rate
            );
        }
        eprintln!("Elapsed: {:.1} min", summary.elapsed_time_minutes);
        for (rank, term) in report.top_terms.iter().take(top).enumerate() {
            eprintln!("{:>3}. {:<20} {}", rank + 1, term.term, term.count);
        }
    }

    /// Writes the report as json.
    ///
    /// If a output file is configured, then the report will be stored there,
    /// otherwise to std::out.
    async fn write(out: Option<PathBuf>, report: &AnalysisReport) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(report)?;
        if let Some(out) = out {
            tokio::fs::write(&out, json)
                .await
                .with_context(|| format!("Failed to write report to {}", out.display()))?;
        } else {
            println!("{}", json);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, StructOpt)]
pub struct Opts {
    #[structopt(
        long = "rate-limit-delay",
        help = "Seconds to wait after rate limiting and between domains."
    )]
    rate_limit_delay: Option<f64>,
    #[structopt(long = "min-term-len", help = "Min. number of chars of a term.")]
    min_term_len: Option<usize>,
    #[structopt(long = "no-parallel", help = "Count terms on a single thread.")]
    no_parallel: bool,
    #[structopt(long = "user-agent", help = "The user-agent used for requests.")]
    user_agent: Option<String>,
}

impl Opts {
    fn as_config(&self) -> Config {
        let mut config = Config::builder();
        if let Some(delay) = self.rate_limit_delay {
            config = config.rate_limit_delay(Duration::from_secs_f64(delay.max(0.0)));
        }
        if let Some(min_term_len) = self.min_term_len {
            config = config.min_term_len(min_term_len);
        }
        if self.no_parallel {
            config = config.parallel(false);
        }
        if let Some(user_agent) = self.user_agent.clone() {
            config = config.browser_user_agent(user_agent);
        }

        config.build()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    App::from_args().run().await
}
