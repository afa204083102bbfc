//! Google Finance JSON quotes with an HTML quote page as a second source.
//!
//! One symbol is fetched per pass. When the JSON request fails and the symbol
//! carries an exchange suffix (`BP.L`), the quote page for that exchange is
//! scraped instead. When both fail the previous record is pushed again with its
//! fail count raised.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info, warn};
use reqwest::blocking::Client;
use scraper::{Html, Selector};
use serde_json::Value;
use stock_common::{FeedError, Result, StockDataRecord};

use crate::adapter::{ProviderAdapter, PushCallback};
use crate::market_hours::MarketHours;
use crate::providers::batch::{BatchCursor, IDLE_TICK, Schedule, run_pass};
use crate::providers::book::SymbolBook;
use crate::providers::http_client;
use crate::worker::{DEFAULT_JOIN_TIMEOUT, PollWorker};

const JSON_URL: &str = "https://finance.google.com/finance?output=json&q=";
const ALTERNATE_URL: &str = "http://eoddata.com/stockquote";

const WARM_UP: Duration = Duration::from_secs(20);
const SCHEDULE: Schedule = Schedule {
    batch_size: 1,
    first_pass: Duration::from_secs(10),
    when_open: Duration::from_secs(120),
    when_closed: Duration::from_secs(120),
};

const NAME_SELECTOR: &str = "#ctl00_cph1_qp1_div1 div.rc_bg_bl table tr td";
const VALUES_SELECTOR: &str = "#ctl00_cph1_qp1_div1 div.cb table tr td b";
const VALUE_FIELDS: [&str; 11] = [
    "price",
    "change",
    "open",
    "high",
    "ask",
    "volume",
    "chg_percent",
    "prev",
    "low",
    "bid",
    "open_int",
];

/// Parses a number that may be quoted and decorated (`"+1,234.5%"`, `"12.3M"`).
fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number_text(s),
        _ => None,
    }
}

fn parse_number_text(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '+' | '%' | ' '))
        .collect();
    let (digits, scale) = match cleaned.chars().last()? {
        'K' | 'k' => (&cleaned[..cleaned.len() - 1], 1e3),
        'M' | 'm' => (&cleaned[..cleaned.len() - 1], 1e6),
        'B' | 'b' => (&cleaned[..cleaned.len() - 1], 1e9),
        _ => (cleaned.as_str(), 1.0),
    };
    digits.parse::<f64>().ok().map(|v| v * scale)
}

/// Parses the `output=json` response for `symbol`.
///
/// The body may start with a `//` guard and may be a bare object rather than a
/// list; both are tolerated. A quote without a `name` is rejected.
pub fn parse_google_json(body: &str, symbol: &str) -> Result<StockDataRecord> {
    let mut text = body;
    if let Some(pos) = text.find("//").filter(|pos| *pos < 10) {
        text = &text[pos + 2..];
    }
    let text = text.trim();
    let quotes: Value = if text.starts_with('{') {
        serde_json::from_str(&format!("[{}]", text))?
    } else {
        serde_json::from_str(text)?
    };

    let first = quotes
        .as_array()
        .and_then(|list| list.first())
        .ok_or_else(|| FeedError::Format(format!("no quote for {} in response", symbol)))?;
    let name = first
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| FeedError::Format(format!("quote for {} has no name", symbol)))?;

    let field = |key: &str| first.get(key).and_then(parse_number);
    Ok(StockDataRecord {
        symbol: symbol.to_string(),
        name: Some(name.to_string()),
        price: field("l"),
        change: field("c"),
        percent_change: field("cp"),
        volume: field("vo").map(|v| v as u64),
        fail_count: 0,
        timestamp: Utc::now().timestamp_millis() as u64,
        extras: BTreeMap::new(),
    })
}

/// Scrapes the quote page of the alternate source.
///
/// Values come from a fixed sequence of bold cells; those without a dedicated
/// record field are kept in `extras` as text.
pub fn parse_alternate_html(html: &str, symbol: &str) -> Result<StockDataRecord> {
    let document = Html::parse_document(html);
    let name_selector = Selector::parse(NAME_SELECTOR).map_err(|e| FeedError::Scrape(e.to_string()))?;
    let values_selector = Selector::parse(VALUES_SELECTOR).map_err(|e| FeedError::Scrape(e.to_string()))?;

    let cell_text = |el: scraper::ElementRef| el.text().collect::<String>().trim().to_string();

    let names: Vec<String> = document.select(&name_selector).map(cell_text).collect();
    let values: Vec<String> = document.select(&values_selector).map(cell_text).collect();
    if values.is_empty() {
        return Err(FeedError::Scrape(format!("no quote values for {}", symbol)));
    }

    let mut record = StockDataRecord::new(symbol);
    record.name = Some(if names.len() > 2 { names[1].clone() } else { symbol.to_string() });
    record.timestamp = Utc::now().timestamp_millis() as u64;
    for (field, text) in VALUE_FIELDS.iter().zip(values) {
        match *field {
            "price" => record.price = parse_number_text(&text),
            "change" => record.change = parse_number_text(&text),
            "chg_percent" => record.percent_change = parse_number_text(&text),
            "volume" => record.volume = parse_number_text(&text).map(|v| v as u64),
            other => {
                record.extras.insert(other.to_string(), Value::String(text));
            }
        }
    }
    Ok(record)
}

/// Quote page URL for `symbol`, or `None` when it has no exchange suffix.
pub fn alternate_url(symbol: &str) -> Option<String> {
    let (ticker, exchange) = symbol.split_once('.')?;
    let exchange = match exchange {
        "L" => "LSE",
        other => other,
    };
    Some(format!("{}/{}/{}.htm", ALTERNATE_URL, exchange, ticker))
}

struct GoogleState {
    name: String,
    client: Client,
    book: SymbolBook,
    hours: MarketHours,
    only_when_open: AtomicBool,
    status: Mutex<String>,
    callback: PushCallback,
}

impl GoogleState {
    fn get_text(&self, url: &str) -> Result<String> {
        self.client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.text())
            .map_err(|e| FeedError::fetch(&self.name, e))
    }

    fn fetch(&self, symbol: &str) -> Result<StockDataRecord> {
        let primary = self
            .get_text(&format!("{}{}", JSON_URL, symbol))
            .and_then(|body| parse_google_json(&body, symbol));
        let err = match primary {
            Ok(record) => return Ok(record),
            Err(e) => e,
        };
        debug!("{}: JSON quote for {} failed: {}", self.name, symbol, err);
        match alternate_url(symbol) {
            Some(url) => self
                .get_text(&url)
                .and_then(|html| parse_alternate_html(&html, symbol)),
            None => Err(err),
        }
    }

    fn fetch_or_failed(&self, symbol: &str) -> StockDataRecord {
        match self.fetch(symbol) {
            Ok(record) => record,
            Err(e) => {
                warn!("{}: failed to get quote for {}: {}", self.name, symbol, e);
                if let Ok(mut status) = self.status.lock() {
                    *status = format!("failed for {}", symbol);
                }
                match self.book.record(symbol) {
                    Some(mut previous) => {
                        previous.fail_count = previous.fail_count.saturating_add(1);
                        previous
                    }
                    None => StockDataRecord::failed(symbol),
                }
            }
        }
    }

    fn pass(&self, cursor: &mut BatchCursor) -> Result<Duration> {
        let market_open = self.hours.is_open();
        if let Ok(mut status) = self.status.lock() {
            *status = self.hours.status_label().to_string();
        }
        run_pass(
            &self.book,
            cursor,
            &SCHEDULE,
            market_open,
            self.only_when_open.load(Ordering::Relaxed),
            &self.callback,
            |batch| batch.iter().map(|symbol| self.fetch_or_failed(symbol)).collect(),
        )
    }
}

/// Scraping provider for Google Finance.
pub struct GoogleProvider {
    shared: Arc<GoogleState>,
    worker: Mutex<Option<PollWorker>>,
}

impl GoogleProvider {
    /// Builds the provider and its HTTP client.
    pub fn new(name: &str, callback: PushCallback) -> Result<Self> {
        let client = http_client(name)?;
        info!("{} initialized", name);
        Ok(GoogleProvider {
            shared: Arc::new(GoogleState {
                name: name.to_string(),
                client,
                book: SymbolBook::new(),
                hours: MarketHours::london(),
                only_when_open: AtomicBool::new(false),
                status: Mutex::new(String::new()),
                callback,
            }),
            worker: Mutex::new(None),
        })
    }
}

impl ProviderAdapter for GoogleProvider {
    fn name(&self) -> &str {
        &self.shared.name
    }

    fn set_stocks(&self, symbols: &[String]) -> Result<()> {
        info!("{} setStocks: {} symbols: {:?}", self.shared.name, symbols.len(), symbols);
        self.shared.book.replace(symbols)
    }

    fn add_stock(&self, symbol: &str) -> Result<()> {
        self.shared.book.add(symbol)
    }

    fn stock_data(&self, symbol: &str) -> Option<StockDataRecord> {
        self.shared.book.record(symbol)
    }

    fn start(&self) -> Result<()> {
        let mut worker = self.worker.lock()?;
        if worker.is_some() {
            return Ok(());
        }
        let shared = Arc::clone(&self.shared);
        let mut cursor = BatchCursor::default();
        *worker = Some(PollWorker::spawn(&self.shared.name, WARM_UP, move || {
            shared.pass(&mut cursor).unwrap_or_else(|e| {
                error!("Error in {} update thread: {}", shared.name, e);
                IDLE_TICK
            })
        })?);
        info!("{} started", self.shared.name);
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let worker = self.worker.lock()?.take();
        if let Some(worker) = worker {
            worker.stop(DEFAULT_JOIN_TIMEOUT)?;
        }
        info!("{} stopped", self.shared.name);
        Ok(())
    }

    fn set_only_update_when_market_open(&self, only_when_open: bool) {
        self.shared.only_when_open.store(only_when_open, Ordering::Relaxed);
    }

    fn market_open_status(&self) -> String {
        self.shared.hours.status_label().to_string()
    }

    fn status(&self) -> Option<String> {
        self.shared
            .status
            .lock()
            .ok()
            .map(|s| s.clone())
            .filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_guarded_bare_object() {
        let body = r#"// {"name":"BP PLC","l":"434.20","c":"+2.10","vo":"12.3M","cp":"0.49"}"#;
        let record = parse_google_json(body, "BP.L").unwrap();
        assert_eq!(record.name.as_deref(), Some("BP PLC"));
        assert_eq!(record.price, Some(434.2));
        assert_eq!(record.change, Some(2.1));
        assert_eq!(record.volume, Some(12_300_000));
        assert_eq!(record.percent_change, Some(0.49));
    }

    #[test]
    fn parses_list_with_numbers() {
        let body = r#"[{"name":"Apple","l":189.5,"c":-1.0,"vo":"1,234","cp":"-0.5"}]"#;
        let record = parse_google_json(body, "AAPL").unwrap();
        assert_eq!(record.price, Some(189.5));
        assert_eq!(record.volume, Some(1234));
        assert_eq!(record.percent_change, Some(-0.5));
    }

    #[test]
    fn rejects_quote_without_name() {
        assert!(parse_google_json(r#"[{"l":"1.0"}]"#, "X").is_err());
        assert!(parse_google_json("[]", "X").is_err());
        assert!(parse_google_json("<html>", "X").is_err());
    }

    #[test]
    fn scrapes_quote_page() {
        let html = r#"<html><body><div id="ctl00_cph1_qp1_div1">
            <div class="rc_bg_bl"><table><tr><td>BP</td><td>BP PLC</td><td>LSE</td></tr></table></div>
            <div class="cb"><table><tr>
              <td><b>434.20</b></td><td><b>+2.10</b></td><td><b>431.00</b></td><td><b>436.00</b></td>
              <td><b>434.30</b></td><td><b>12,345,678</b></td><td><b>0.49%</b></td>
            </tr></table></div>
        </div></body></html>"#;
        let record = parse_alternate_html(html, "BP.L").unwrap();
        assert_eq!(record.name.as_deref(), Some("BP PLC"));
        assert_eq!(record.price, Some(434.2));
        assert_eq!(record.volume, Some(12_345_678));
        assert_eq!(record.percent_change, Some(0.49));
        assert_eq!(record.extras["open"], Value::String("431.00".into()));
        assert!(!record.extras.contains_key("bid"));
    }

    #[test]
    fn empty_page_is_a_scrape_error() {
        let err = parse_alternate_html("<html></html>", "BP.L").unwrap_err();
        assert!(matches!(err, FeedError::Scrape(_)));
    }

    #[test]
    fn alternate_url_maps_london_exchange() {
        assert_eq!(
            alternate_url("BP.L").as_deref(),
            Some("http://eoddata.com/stockquote/LSE/BP.htm")
        );
        assert_eq!(alternate_url("AAPL"), None);
    }
}
