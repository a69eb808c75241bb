//! HTML parsing for portal pages
//!
//! Pure functions over page bodies so they can be tested against fixtures.
//! `scraper::Html` is not `Send`; documents never live across an await.

use crate::record::{ConsultationRecord, ConsultationSlug, ResponseRecord};
use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeMap, BTreeSet};
use url::Url;

/// Separator between the answers of one response
pub const ANSWER_SEPARATOR: &str = "\n###\n";

const MAINTENANCE_MARKER: &str = "De website is tijdelijk niet beschikbaar";
const REPORT_ANCHOR_ID: &str = "mainContentPlaceHolder_consultatierapportDocumentDownloadLink_typeAnchor";
const RESPONSE_COUNT_MARKER: &str = "Reacties op consultatie [";

const AUTHOR_KEY: &str = "Naam";
const ORGANISATION_KEYS: &[&str] = &["Organisatie", "Ministerie", "Verantwoordelijk ministerie"];
const TOPIC_KEYS: &[&str] = &["Onderwerpen", "Onderwerp"];
const PERIOD_KEYS: &[&str] = &["Looptijd", "Periode"];
const START_KEYS: &[&str] = &["Startdatum", "Begindatum"];
const END_KEYS: &[&str] = &["Einddatum", "Sluitingsdatum"];

const DUTCH_MONTHS: [&str; 12] = [
    "januari",
    "februari",
    "maart",
    "april",
    "mei",
    "juni",
    "juli",
    "augustus",
    "september",
    "oktober",
    "november",
    "december",
];

/// Why a page could not be turned into a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageIssue {
    /// The portal served its maintenance notice instead of content
    Maintenance,
    /// A required element is absent
    Missing(&'static str),
}

impl std::fmt::Display for PageIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageIssue::Maintenance => write!(f, "portal is in maintenance"),
            PageIssue::Missing(what) => write!(f, "missing {}", what),
        }
    }
}

fn select_all<'a>(document: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => document.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

fn select_within<'a>(element: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => element.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

/// Text content with whitespace runs collapsed
fn flat_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn absolute(base: &Url, href: &str) -> Option<String> {
    base.join(href).ok().map(|url| url.to_string())
}

/// Links to the detail pages on a listing page
pub fn result_links(html: &str, base: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    select_all(&document, "div.result--list li")
        .into_iter()
        .filter_map(|item| {
            select_within(item, "a[href]")
                .into_iter()
                .next()
                .and_then(|a| a.value().attr("href"))
                .and_then(|href| absolute(base, href))
        })
        .collect()
}

/// The "next page" link of the consultation listing, if any
pub fn next_link(html: &str, base: &Url) -> Option<String> {
    let document = Html::parse_document(html);
    select_all(&document, "li.next a[href]")
        .into_iter()
        .next()
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| absolute(base, href))
}

/// Highest page number linked from the pagination block
pub fn max_page(html: &str) -> Option<u32> {
    let document = Html::parse_document(html);
    select_all(&document, "div.pagination a[href]")
        .into_iter()
        .filter_map(|a| flat_text(a).parse::<u32>().ok())
        .max()
}

/// Rows of the key/value overview table, in page order
fn data_table(document: &Html) -> Vec<(String, String)> {
    select_all(document, "table.table__data-overview tr")
        .into_iter()
        .filter_map(|row| {
            let key = select_within(row, "th").into_iter().next().map(flat_text)?;
            if key.is_empty() {
                return None;
            }
            let value = select_within(row, "td").into_iter().next().map(flat_text).unwrap_or_default();
            Some((key, value))
        })
        .collect()
}

/// Take the value of the first matching key out of `properties`
fn take_first(properties: &mut BTreeMap<String, String>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| properties.remove(*key)).filter(|v| !v.is_empty())
}

/// First path segment of a consultation URL
pub fn slug_from_url(url: &str) -> Option<ConsultationSlug> {
    let parsed = Url::parse(url).ok()?;
    let first = parsed.path_segments()?.find(|s| !s.is_empty())?;
    Some(ConsultationSlug::new(first))
}

/// Last non-empty path segment of a response URL
pub fn response_id_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    Some(last.to_string())
}

/// Parse a Dutch portal date: `15 januari 2024`, `15-01-2024` or `2024-01-15`
pub fn parse_dutch_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    for format in ["%d-%m-%Y", "%Y-%m-%d", "%d/%m/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date);
        }
    }

    let parts: Vec<&str> = text.split_whitespace().collect();
    if let [day, month, year] = parts.as_slice() {
        let month_name = month.to_lowercase();
        let month = DUTCH_MONTHS.iter().position(|m| *m == month_name)? as u32 + 1;
        return NaiveDate::from_ymd_opt(year.parse().ok()?, month, day.parse().ok()?);
    }
    None
}

/// Split a period like `1 maart 2024 t/m 12 april 2024` into its two dates
fn parse_period(text: &str) -> (Option<NaiveDate>, Option<NaiveDate>) {
    for separator in [" t/m ", " tot en met ", " - ", " tot "] {
        if let Some((start, end)) = text.split_once(separator) {
            return (parse_dutch_date(start), parse_dutch_date(end));
        }
    }
    (parse_dutch_date(text), None)
}

fn response_count(document: &Html, html: &str) -> u64 {
    let from_label = select_all(document, "span.reacties__sublabel")
        .into_iter()
        .next()
        .and_then(|span| flat_text(span).split_whitespace().next().and_then(|n| n.parse().ok()));
    if let Some(count) = from_label {
        return count;
    }

    html.find(RESPONSE_COUNT_MARKER)
        .map(|pos| &html[pos + RESPONSE_COUNT_MARKER.len()..])
        .and_then(|rest| {
            let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
            digits.parse().ok()
        })
        .unwrap_or(0)
}

/// Parse a consultation detail page
pub fn parse_consultation(html: &str, url: &str, slug: &ConsultationSlug) -> Result<ConsultationRecord, PageIssue> {
    if html.contains(MAINTENANCE_MARKER) {
        return Err(PageIssue::Maintenance);
    }

    let document = Html::parse_document(html);
    let title = select_all(&document, "h1")
        .into_iter()
        .next()
        .map(flat_text)
        .filter(|t| !t.is_empty())
        .ok_or(PageIssue::Missing("title"))?;

    let mut properties: BTreeMap<String, String> = data_table(&document).into_iter().collect();

    let organisation = take_first(&mut properties, ORGANISATION_KEYS);
    let topics: BTreeSet<String> = take_first(&mut properties, TOPIC_KEYS)
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let (mut start_date, mut end_date) = take_first(&mut properties, PERIOD_KEYS)
        .map(|period| parse_period(&period))
        .unwrap_or((None, None));
    if let Some(start) = take_first(&mut properties, START_KEYS) {
        start_date = start_date.or_else(|| parse_dutch_date(&start));
    }
    if let Some(end) = take_first(&mut properties, END_KEYS) {
        end_date = end_date.or_else(|| parse_dutch_date(&end));
    }

    let mut record = ConsultationRecord::new(slug.clone(), title)
        .with_url(url)
        .with_period(start_date, end_date)
        .with_response_count(response_count(&document, html));
    record.organisation = organisation;
    record.topics = topics;
    record.report_available = html.contains(REPORT_ANCHOR_ID);
    record.properties = properties;
    Ok(record)
}

/// Parse a response detail page
///
/// The author name is read when present; dropping it is up to the caller.
pub fn parse_response(
    html: &str,
    url: &str,
    slug: &ConsultationSlug,
    response_id: &str,
) -> Result<ResponseRecord, PageIssue> {
    if html.contains(MAINTENANCE_MARKER) {
        return Err(PageIssue::Maintenance);
    }

    let document = Html::parse_document(html);
    let base = Url::parse(url).map_err(|_| PageIssue::Missing("valid page url"))?;

    let mut properties: BTreeMap<String, String> = data_table(&document).into_iter().collect();
    let author = properties.remove(AUTHOR_KEY).filter(|name| !name.is_empty());

    let text = select_all(&document, "blockquote")
        .into_iter()
        .map(|quote| quote.text().collect::<String>().trim().to_string())
        .collect::<Vec<_>>()
        .join(ANSWER_SEPARATOR);

    let mut record = ResponseRecord::new(slug.clone(), response_id, text);
    record.url = Some(url.to_string());
    record.author_name = author;
    record.properties = properties;

    for link in select_all(&document, "a.icon--download[href]") {
        if let Some(href) = link.value().attr("href").and_then(|href| absolute(&base, href)) {
            record = record.with_attachment(href);
        }
    }

    Ok(record)
}
