use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use dotenvy::dotenv;
use feed_rs::parser;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const ARXIV_API_URL: &str = "https://export.arxiv.org/api/query";
const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const SLACK_POST_MESSAGE_URL: &str = "https://slack.com/api/chat.postMessage";

const MAX_SUMMARY_ATTEMPTS: usize = 3;
const RETRY_DELAY: Duration = Duration::from_secs(20);
const SUMMARY_COOLDOWN: Duration = Duration::from_secs(5);
const POST_PACING: Duration = Duration::from_secs(10);

const SUMMARY_INSTRUCTION: &str = "\
### 指示 ###
論文のタイトルと内容を理解した上で、タイトルの和訳と重要なポイントを箇条書きで3点書いてください。

### 箇条書きの制約 ###
- 最大3個
- 日本語
- 箇条書き1個を50文字以内

### 出力形式 ###
タイトル(和名)

- 箇条書き1
- 箇条書き2
- 箇条書き3
";

#[derive(Parser)]
#[command(name = "paper-letter", version, about = "Weekly arXiv keyword digest posted to Slack")]
struct Cli {
    #[arg(long, default_value = "data/letter.yml")]
    config: PathBuf,
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: String,
    #[arg(long, env = "SLACK_BOT_TOKEN", hide_env_values = true)]
    slack_bot_token: String,
    #[arg(long, env = "SLACK_CHANNEL")]
    slack_channel: String,
    #[arg(long, default_value = "gpt-4o-mini")]
    openai_model: String,
    #[arg(long, default_value_t = 0.25)]
    temperature: f32,
    #[arg(long, default_value_t = 10)]
    max_results: usize,
    /// Width of the search window, in days.
    #[arg(long, default_value_t = 1)]
    window_days: i64,
    /// How far behind today the window ends, to absorb arXiv indexing delay.
    #[arg(long, default_value_t = 7)]
    lag_days: i64,
}

#[derive(Debug, Deserialize)]
struct LetterConfig {
    keywords: Vec<String>,
    categories: Vec<String>,
}

/// One arXiv entry, validated at the ingestion boundary. The title doubles
/// as the dedup key for the per-run seen set.
#[derive(Clone, Debug)]
struct PaperRecord {
    entry_id: String,
    title: String,
    abstract_text: String,
    published: DateTime<Utc>,
    categories: Vec<String>,
}

/// Model reply split into its two positional parts.
#[derive(Debug)]
struct SummaryResult {
    translated_title: String,
    body: String,
}

impl SummaryResult {
    fn parse(reply: &str) -> Self {
        let mut lines = reply.lines();
        let translated_title = lines.next().unwrap_or_default().to_string();
        let body = lines.collect::<Vec<_>>().join("\n");
        Self {
            translated_title,
            body,
        }
    }
}

#[derive(Debug, Error)]
enum FetchError {
    #[error("arxiv request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("arxiv feed unparseable: {0}")]
    Feed(#[from] feed_rs::parser::ParseFeedError),
}

#[derive(Debug, Error)]
enum SummaryApiError {
    #[error("chat completion request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("chat completion error: {status} {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("chat completion reply unparseable: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("chat completion reply was empty")]
    EmptyReply,
}

#[derive(Debug, Error)]
#[error("summarization failed after {attempts} attempts")]
struct GenerationError {
    attempts: usize,
    #[source]
    source: SummaryApiError,
}

#[derive(Debug, Error)]
enum PostError {
    #[error("slack request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("slack api error: {0}")]
    Api(String),
}

/// Fixed-delay bounded retry, shared by outbound calls that may hit
/// transient provider failures.
#[derive(Clone, Copy, Debug)]
struct RetryPolicy {
    max_attempts: usize,
    delay: Duration,
}

impl RetryPolicy {
    fn run<T, E: std::fmt::Display>(&self, mut op: impl FnMut() -> Result<T, E>) -> Result<T, E> {
        let mut attempt = 1usize;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_attempts => {
                    warn!("attempt {attempt}/{} failed: {err}", self.max_attempts);
                    sleep(self.delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// The `[start, end)` range a keyword query is bounded to.
#[derive(Clone, Copy, Debug)]
struct DateWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl DateWindow {
    fn ending_days_ago(now: DateTime<Utc>, lag_days: i64, window_days: i64) -> Self {
        let end = now - chrono::Duration::days(lag_days);
        let start = end - chrono::Duration::days(window_days);
        Self { start, end }
    }
}

fn build_query(keyword: &str, window: &DateWindow) -> String {
    format!(
        "( ti:\"{keyword}\" OR abs:\"{keyword}\" ) AND submittedDate:[{start} TO {end}]",
        start = window.start.format("%Y%m%d%H%M%S"),
        end = window.end.format("%Y%m%d%H%M%S"),
    )
}

struct PaperSearch {
    client: Client,
    max_results: usize,
    categories: HashSet<String>,
}

impl PaperSearch {
    fn new(client: Client, max_results: usize, categories: HashSet<String>) -> Self {
        Self {
            client,
            max_results,
            categories,
        }
    }

    /// Returns up to `max_results` unseen, in-category papers for `query`,
    /// newest first, and records their titles in `seen`. A fetch failure
    /// propagates to the caller; there is no retry at this layer.
    fn search(
        &self,
        query: &str,
        seen: &mut HashSet<String>,
    ) -> Result<Vec<PaperRecord>, FetchError> {
        let fetched = self.fetch(query)?;
        Ok(select_candidates(
            fetched,
            seen,
            &self.categories,
            self.max_results,
        ))
    }

    fn fetch(&self, query: &str) -> Result<Vec<PaperRecord>, FetchError> {
        // Over-fetch so that seen and off-category entries still leave
        // enough candidates to fill the cap.
        let fetch_cap = self.max_results * 3;
        let response = self
            .client
            .get(ARXIV_API_URL)
            .query(&[("search_query", query)])
            .query(&[("start", 0usize), ("max_results", fetch_cap)])
            .query(&[("sortBy", "submittedDate"), ("sortOrder", "descending")])
            .send()?
            .error_for_status()?;
        let bytes = response.bytes()?;
        let feed = parser::parse(&bytes[..])?;
        Ok(feed
            .entries
            .into_iter()
            .filter_map(paper_from_entry)
            .collect())
    }
}

fn select_candidates(
    fetched: Vec<PaperRecord>,
    seen: &mut HashSet<String>,
    categories: &HashSet<String>,
    max_results: usize,
) -> Vec<PaperRecord> {
    let mut candidates = Vec::new();
    for paper in fetched {
        if candidates.len() >= max_results {
            break;
        }
        if seen.contains(&paper.title) {
            continue;
        }
        if !paper.categories.iter().any(|c| categories.contains(c)) {
            continue;
        }
        seen.insert(paper.title.clone());
        candidates.push(paper);
    }
    candidates
}

fn paper_from_entry(entry: feed_rs::model::Entry) -> Option<PaperRecord> {
    let title = entry
        .title
        .as_ref()
        .map(|text| squash_whitespace(&text.content))?;
    if title.is_empty() {
        return None;
    }
    let abstract_text = entry
        .summary
        .as_ref()
        .map(|text| squash_whitespace(&text.content))?;
    let published = entry.published.or(entry.updated)?;
    let entry_id = if entry.id.trim().is_empty() {
        entry
            .links
            .iter()
            .map(|link| link.href.trim().to_string())
            .find(|href| !href.is_empty())?
    } else {
        entry.id.clone()
    };
    let categories = entry
        .categories
        .iter()
        .map(|category| category.term.clone())
        .collect();
    Some(PaperRecord {
        entry_id,
        title,
        abstract_text,
        published,
        categories,
    })
}

fn squash_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

trait Summarize {
    fn summarize(&self, paper: &PaperRecord) -> Result<String, GenerationError>;
}

struct SummaryGenerator {
    client: Client,
    api_key: String,
    model: String,
    temperature: f32,
    retry: RetryPolicy,
    cooldown: Duration,
}

impl SummaryGenerator {
    fn new(client: Client, api_key: String, model: String, temperature: f32) -> Self {
        Self {
            client,
            api_key,
            model,
            temperature,
            retry: RetryPolicy {
                max_attempts: MAX_SUMMARY_ATTEMPTS,
                delay: RETRY_DELAY,
            },
            cooldown: SUMMARY_COOLDOWN,
        }
    }

    fn request_completion(&self, user_text: &str) -> Result<String, SummaryApiError> {
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                { "role": "system", "content": SUMMARY_INSTRUCTION },
                { "role": "user", "content": user_text },
            ],
        });
        let response = self
            .client
            .post(OPENAI_CHAT_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;
        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            return Err(SummaryApiError::Api {
                status,
                body: truncate_preview(&text, 400),
            });
        }
        let parsed: ChatCompletionResponse = serde_json::from_str(&text)?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .unwrap_or_default();
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(SummaryApiError::EmptyReply);
        }
        Ok(trimmed.to_string())
    }
}

impl Summarize for SummaryGenerator {
    fn summarize(&self, paper: &PaperRecord) -> Result<String, GenerationError> {
        let user_text = format!("title: {}\nbody: {}", paper.title, paper.abstract_text);
        let reply = self
            .retry
            .run(|| self.request_completion(&user_text))
            .map_err(|source| GenerationError {
                attempts: self.retry.max_attempts,
                source,
            })?;
        // Pace downstream API usage before handing the reply back.
        sleep(self.cooldown);
        let summary = SummaryResult::parse(&reply);
        Ok(render_message(paper, &summary))
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

fn render_message(paper: &PaperRecord, summary: &SummaryResult) -> String {
    format!(
        "Published: {}\n{}\n{}\n{}\n{}\n",
        paper.published.format("%Y-%m-%d %H:%M:%S"),
        paper.entry_id,
        paper.title,
        summary.translated_title,
        summary.body,
    )
}

fn truncate_preview(input: &str, max: usize) -> String {
    if input.len() <= max {
        return input.to_string();
    }
    let mut end = max;
    while end > 0 && !input.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = input[..end].to_string();
    out.push_str("...");
    out
}

trait ChatSink {
    fn post(&self, text: &str) -> Result<String, PostError>;
}

struct SlackClient {
    client: Client,
    token: String,
    channel: String,
}

impl SlackClient {
    fn new(client: Client, token: String, channel: String) -> Self {
        Self {
            client,
            token,
            channel,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SlackPostResponse {
    ok: bool,
    ts: Option<String>,
    error: Option<String>,
}

impl ChatSink for SlackClient {
    fn post(&self, text: &str) -> Result<String, PostError> {
        let body = json!({ "channel": self.channel, "text": text });
        let response = self
            .client
            .post(SLACK_POST_MESSAGE_URL)
            .bearer_auth(&self.token)
            .json(&body)
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(PostError::Api(format!("http {status}")));
        }
        let parsed: SlackPostResponse = response.json()?;
        if !parsed.ok {
            return Err(PostError::Api(
                parsed.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        Ok(parsed.ts.unwrap_or_default())
    }
}

struct Announcer<'a, S: ChatSink, G: Summarize> {
    sink: &'a S,
    generator: &'a G,
    pacing: Duration,
}

impl<'a, S: ChatSink, G: Summarize> Announcer<'a, S, G> {
    fn new(sink: &'a S, generator: &'a G, pacing: Duration) -> Self {
        Self {
            sink,
            generator,
            pacing,
        }
    }

    /// Posts the framed header, then one summary message per paper in
    /// order. A failure on one paper is logged and the loop moves on; the
    /// batch never aborts on a partial failure.
    fn announce(&self, results: &[PaperRecord], keyword: &str) {
        let header = if results.is_empty() {
            format!("No papers found for {keyword}!")
        } else {
            format!("{} papers found for {keyword}!", results.len())
        };
        if let Err(err) = self.sink.post(&framed(&header)) {
            warn!("header post for '{keyword}' failed: {err}");
        }
        for (index, paper) in results.iter().enumerate() {
            let position = index + 1;
            match self.generator.summarize(paper) {
                Ok(summary) => {
                    let message = format!("{keyword}: {position}-th paper\n{summary}");
                    match self.sink.post(&message) {
                        Ok(ts) => info!("posted paper {position} for '{keyword}' (ts {ts})"),
                        Err(err) => {
                            warn!("post of paper {position} for '{keyword}' failed: {err}")
                        }
                    }
                }
                Err(err) => {
                    warn!("summarization of paper {position} for '{keyword}' failed: {err}")
                }
            }
            sleep(self.pacing);
        }
    }
}

fn framed(text: &str) -> String {
    let bar = "=".repeat(40);
    format!("{bar}\n{text}\n{bar}")
}

struct LetterJob<'a, S: ChatSink, G: Summarize> {
    search: &'a PaperSearch,
    announcer: &'a Announcer<'a, S, G>,
    lag_days: i64,
    window_days: i64,
}

impl<'a, S: ChatSink, G: Summarize> LetterJob<'a, S, G> {
    /// Runs one keyword: computes the lagged window, searches, announces.
    /// The seen set carries over to the next keyword in the same run.
    fn run(&self, keyword: &str, seen: &mut HashSet<String>) -> Result<usize, FetchError> {
        let window = DateWindow::ending_days_ago(Utc::now(), self.lag_days, self.window_days);
        let query = build_query(keyword, &window);
        let results = self.search.search(&query, seen)?;
        info!("keyword '{keyword}': {} new papers in window", results.len());
        self.announcer.announce(&results, keyword);
        Ok(results.len())
    }
}

fn load_config(path: &Path) -> Result<LetterConfig> {
    let raw = fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let config: LetterConfig = serde_yaml::from_str(&raw).context("parse config yaml")?;
    if config.keywords.is_empty() {
        bail!("config keywords must be non-empty");
    }
    if config.categories.is_empty() {
        bail!("config categories must be non-empty");
    }
    Ok(config)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    dotenv().ok();
    init_tracing();
    let cli = Cli::parse();
    if cli.max_results < 1 {
        bail!("--max-results must be >= 1");
    }
    if cli.window_days < 1 {
        bail!("--window-days must be >= 1");
    }
    if cli.lag_days < 0 {
        bail!("--lag-days must be >= 0");
    }
    let config = load_config(&cli.config)?;

    let client = Client::builder()
        .user_agent(concat!("paper-letter/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .build()
        .context("build http client")?;

    let search = PaperSearch::new(
        client.clone(),
        cli.max_results,
        config.categories.iter().cloned().collect(),
    );
    let generator = SummaryGenerator::new(
        client.clone(),
        cli.openai_api_key.clone(),
        cli.openai_model.clone(),
        cli.temperature,
    );
    let slack = SlackClient::new(client, cli.slack_bot_token.clone(), cli.slack_channel.clone());
    let announcer = Announcer::new(&slack, &generator, POST_PACING);
    let job = LetterJob {
        search: &search,
        announcer: &announcer,
        lag_days: cli.lag_days,
        window_days: cli.window_days,
    };

    let mut seen = HashSet::new();
    let mut failed = 0usize;
    for keyword in &config.keywords {
        if let Err(err) = job.run(keyword, &mut seen) {
            failed += 1;
            warn!("keyword '{keyword}' failed: {err}");
        }
    }
    info!(
        "run finished: {} keywords, {} failed",
        config.keywords.len(),
        failed
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::cell::RefCell;

    fn paper(title: &str, categories: &[&str]) -> PaperRecord {
        PaperRecord {
            entry_id: format!("http://arxiv.org/abs/{title}"),
            title: title.to_string(),
            abstract_text: "We study things.".to_string(),
            published: Utc.with_ymd_and_hms(2026, 8, 20, 12, 0, 0).unwrap(),
            categories: categories.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn filter(categories: &[&str]) -> HashSet<String> {
        categories.iter().map(|c| c.to_string()).collect()
    }

    #[derive(Default)]
    struct RecordingSink {
        messages: RefCell<Vec<String>>,
    }

    impl ChatSink for RecordingSink {
        fn post(&self, text: &str) -> Result<String, PostError> {
            self.messages.borrow_mut().push(text.to_string());
            Ok("1700000000.000100".to_string())
        }
    }

    struct FailingSink;

    impl ChatSink for FailingSink {
        fn post(&self, _text: &str) -> Result<String, PostError> {
            Err(PostError::Api("channel_not_found".to_string()))
        }
    }

    struct StubSummarizer;

    impl Summarize for StubSummarizer {
        fn summarize(&self, paper: &PaperRecord) -> Result<String, GenerationError> {
            Ok(format!("summary of {}", paper.title))
        }
    }

    struct FailingSummarizer;

    impl Summarize for FailingSummarizer {
        fn summarize(&self, _paper: &PaperRecord) -> Result<String, GenerationError> {
            Err(GenerationError {
                attempts: MAX_SUMMARY_ATTEMPTS,
                source: SummaryApiError::EmptyReply,
            })
        }
    }

    #[test]
    fn seen_titles_are_skipped_and_seen_grows() {
        let mut seen: HashSet<String> = ["Old Paper".to_string()].into_iter().collect();
        let fetched = vec![paper("Old Paper", &["cs.LG"]), paper("New Paper", &["cs.LG"])];
        let picked = select_candidates(fetched, &mut seen, &filter(&["cs.LG"]), 10);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].title, "New Paper");
        assert!(seen.contains("Old Paper"));
        assert!(seen.contains("New Paper"));
    }

    #[test]
    fn candidates_are_capped_at_max_results() {
        let mut seen = HashSet::new();
        let fetched = vec![
            paper("A", &["cs.LG"]),
            paper("B", &["cs.LG"]),
            paper("C", &["cs.LG"]),
        ];
        let picked = select_candidates(fetched, &mut seen, &filter(&["cs.LG"]), 2);
        assert_eq!(picked.len(), 2);
        assert_eq!(picked[0].title, "A");
        assert_eq!(picked[1].title, "B");
        // The third paper was never accepted, so it stays unseen.
        assert!(!seen.contains("C"));
    }

    #[test]
    fn off_category_papers_are_never_returned() {
        let mut seen = HashSet::new();
        let fetched = vec![paper("Biology Paper", &["q-bio.NC"])];
        let picked = select_candidates(fetched, &mut seen, &filter(&["cs.LG"]), 10);
        assert!(picked.is_empty());
        assert!(seen.is_empty());
    }

    #[test]
    fn retry_stops_after_max_attempts() {
        let policy = RetryPolicy {
            max_attempts: 3,
            delay: Duration::ZERO,
        };
        let mut calls = 0usize;
        let result: Result<(), String> = policy.run(|| {
            calls += 1;
            Err("boom".to_string())
        });
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }

    #[test]
    fn retry_recovers_from_transient_failures() {
        let policy = RetryPolicy {
            max_attempts: 3,
            delay: Duration::ZERO,
        };
        let mut calls = 0usize;
        let result: Result<usize, String> = policy.run(|| {
            calls += 1;
            if calls < 3 {
                Err("boom".to_string())
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result, Ok(3));
    }

    #[test]
    fn generation_error_reports_attempt_count() {
        let err = GenerationError {
            attempts: 3,
            source: SummaryApiError::EmptyReply,
        };
        assert!(err.to_string().contains("after 3 attempts"));
    }

    #[test]
    fn summary_message_keeps_positional_order() {
        let record = paper("Sparse Routing", &["cs.LG"]);
        let summary = SummaryResult::parse("タイトル\n- A\n- B\n- C");
        let message = render_message(&record, &summary);
        let lines: Vec<&str> = message.lines().collect();
        assert_eq!(lines[0], "Published: 2026-08-20 12:00:00");
        assert_eq!(lines[1], "http://arxiv.org/abs/Sparse Routing");
        assert_eq!(lines[2], "Sparse Routing");
        assert_eq!(lines[3], "タイトル");
        assert_eq!(&lines[4..7], &["- A", "- B", "- C"]);
    }

    #[test]
    fn empty_results_send_one_framed_message() {
        let sink = RecordingSink::default();
        let generator = StubSummarizer;
        let announcer = Announcer::new(&sink, &generator, Duration::ZERO);
        announcer.announce(&[], "LLM");
        let messages = sink.messages.borrow();
        assert_eq!(messages.len(), 1);
        let lines: Vec<&str> = messages[0].lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "=".repeat(40));
        assert_eq!(lines[1], "No papers found for LLM!");
        assert_eq!(lines[2], "=".repeat(40));
    }

    #[test]
    fn search_then_announce_end_to_end() {
        let mut seen = HashSet::new();
        let categories = filter(&["cs.LG"]);
        let fetched = vec![
            paper("Paper One", &["cs.LG"]),
            paper("Biology Paper", &["q-bio.NC"]),
            paper("Paper Two", &["cs.LG", "cs.CL"]),
        ];
        let picked = select_candidates(fetched.clone(), &mut seen, &categories, 10);
        assert_eq!(picked.len(), 2);
        assert!(seen.contains("Paper One"));
        assert!(seen.contains("Paper Two"));

        let sink = RecordingSink::default();
        let generator = StubSummarizer;
        let announcer = Announcer::new(&sink, &generator, Duration::ZERO);
        announcer.announce(&picked, "LLM");
        let messages = sink.messages.borrow();
        assert_eq!(messages.len(), 3);
        assert!(messages[0].contains("2 papers found for LLM!"));
        assert!(messages[1].starts_with("LLM: 1-th paper\nsummary of Paper One"));
        assert!(messages[2].starts_with("LLM: 2-th paper\nsummary of Paper Two"));

        // Re-running with the grown seen set yields nothing new.
        let picked_again = select_candidates(fetched, &mut seen, &categories, 10);
        assert!(picked_again.is_empty());
    }

    #[test]
    fn per_paper_failures_do_not_abort_the_batch() {
        let sink = RecordingSink::default();
        let generator = FailingSummarizer;
        let announcer = Announcer::new(&sink, &generator, Duration::ZERO);
        let papers = vec![paper("A", &["cs.LG"]), paper("B", &["cs.LG"])];
        announcer.announce(&papers, "LLM");
        // Header still went out; both summaries failed and were skipped.
        assert_eq!(sink.messages.borrow().len(), 1);
    }

    #[test]
    fn post_failures_are_swallowed() {
        let sink = FailingSink;
        let generator = StubSummarizer;
        let announcer = Announcer::new(&sink, &generator, Duration::ZERO);
        announcer.announce(&[paper("A", &["cs.LG"])], "LLM");
    }

    #[test]
    fn query_covers_title_abstract_and_window() {
        let now = Utc.with_ymd_and_hms(2026, 8, 30, 0, 0, 0).unwrap();
        let window = DateWindow::ending_days_ago(now, 7, 1);
        assert_eq!(window.end, now - chrono::Duration::days(7));
        assert_eq!(window.start, now - chrono::Duration::days(8));
        let query = build_query("LLM", &window);
        assert!(query.contains("ti:\"LLM\""));
        assert!(query.contains("abs:\"LLM\""));
        assert!(query.contains("submittedDate:[20260822000000 TO 20260823000000]"));
    }

    const ARXIV_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <id>http://arxiv.org/api/query</id>
  <updated>2026-08-30T00:00:00Z</updated>
  <title>ArXiv Query Results</title>
  <entry>
    <id>http://arxiv.org/abs/2608.01234v1</id>
    <updated>2026-08-20T12:00:00Z</updated>
    <published>2026-08-19T03:30:00Z</published>
    <title>Sparse Mixture Routing
 for Long Contexts</title>
    <summary>We study routing.
Across two lines.</summary>
    <author><name>Doe, J.</name></author>
    <category term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
    <link href="http://arxiv.org/abs/2608.01234v1" rel="alternate" type="text/html"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2608.09999v1</id>
    <updated>2026-08-20T12:00:00Z</updated>
    <title>No Abstract Here</title>
    <category term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
</feed>
"#;

    #[test]
    fn atom_entries_become_validated_records() {
        let feed = parser::parse(ARXIV_FEED.as_bytes()).expect("parse feed");
        let records: Vec<PaperRecord> = feed
            .entries
            .into_iter()
            .filter_map(paper_from_entry)
            .collect();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.title, "Sparse Mixture Routing for Long Contexts");
        assert_eq!(record.abstract_text, "We study routing. Across two lines.");
        assert_eq!(record.entry_id, "http://arxiv.org/abs/2608.01234v1");
        assert_eq!(record.categories, vec!["cs.LG", "cs.CL"]);
        assert_eq!(
            record.published,
            Utc.with_ymd_and_hms(2026, 8, 19, 3, 30, 0).unwrap()
        );
    }
}
