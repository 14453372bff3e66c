use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use regex::Regex;

use crate::model::{DateSource, ExtractedMetadata};
use crate::series_map::SeriesMap;

const SERIES_TRAILING_SEPARATORS: &[char] = &['-', '_', '.', ' '];
const GENERIC_SUFFIXES: &[&str] = &["_document", "_doc", "_file", "_pdf"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateShape {
    YearMonthDay,
    DayMonthYear,
    YearMonth,
    Year,
}

#[derive(Debug)]
struct DatePattern {
    shape: DateShape,
    regex: Regex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DateHit {
    date: NaiveDate,
    start: usize,
}

#[derive(Debug)]
pub struct MetadataExtractor {
    patterns: Vec<DatePattern>,
}

impl MetadataExtractor {
    pub fn new() -> Result<Self> {
        let specs = [
            (
                DateShape::YearMonthDay,
                r"[0-9]{4}-[0-9]{2}-[0-9]{2}|[0-9]{4}_[0-9]{2}_[0-9]{2}",
            ),
            (
                DateShape::DayMonthYear,
                r"[0-9]{2}-[0-9]{2}-[0-9]{4}|[0-9]{2}_[0-9]{2}_[0-9]{4}",
            ),
            (DateShape::YearMonth, r"[0-9]{4}-[0-9]{2}|[0-9]{4}_[0-9]{2}"),
            (DateShape::Year, r"[0-9]{4}"),
        ];

        let mut patterns = Vec::with_capacity(specs.len());
        for (shape, source) in specs {
            let regex = Regex::new(source)
                .with_context(|| format!("failed to compile {shape:?} date regex"))?;
            patterns.push(DatePattern { shape, regex });
        }

        Ok(Self { patterns })
    }

    pub fn extract(&self, filename: &str, series_map: &SeriesMap) -> ExtractedMetadata {
        self.extract_on(filename, series_map, Local::now().date_naive())
    }

    pub fn extract_on(
        &self,
        filename: &str,
        series_map: &SeriesMap,
        today: NaiveDate,
    ) -> ExtractedMetadata {
        let stem = file_stem(filename);
        let date_hit = self.find_date(stem);

        let series = series_map
            .lookup(filename)
            .map(ToOwned::to_owned)
            .or_else(|| match date_hit {
                Some(hit) => series_before(stem, hit.start),
                None => series_without_suffix(stem),
            });

        let (published_date, date_source) = match date_hit {
            Some(hit) => (hit.date, DateSource::Filename),
            None => (today, DateSource::DefaultToday),
        };

        ExtractedMetadata {
            title: stem.to_string(),
            published_date,
            series,
            date_source,
        }
    }

    fn find_date(&self, stem: &str) -> Option<DateHit> {
        self.patterns.iter().find_map(|pattern| {
            let found = pattern.regex.find(stem)?;
            let date = parse_date(pattern.shape, found.as_str())?;
            Some(DateHit {
                date,
                start: found.start(),
            })
        })
    }
}

fn file_stem(filename: &str) -> &str {
    Path::new(filename)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(filename)
}

fn parse_date(shape: DateShape, text: &str) -> Option<NaiveDate> {
    let fields = text
        .split(['-', '_'])
        .map(|field| field.parse::<u32>().ok())
        .collect::<Option<Vec<u32>>>()?;

    let (year, month, day) = match (shape, fields.as_slice()) {
        (DateShape::YearMonthDay, [year, month, day]) => (*year, *month, *day),
        (DateShape::DayMonthYear, [day, month, year]) => (*year, *month, *day),
        (DateShape::YearMonth, [year, month]) => (*year, *month, 1),
        (DateShape::Year, [year]) => (*year, 1, 1),
        _ => return None,
    };

    if year == 0 {
        return None;
    }

    NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)
}

fn series_before(stem: &str, date_start: usize) -> Option<String> {
    let prefix = stem[..date_start]
        .trim()
        .trim_end_matches(SERIES_TRAILING_SEPARATORS);
    (!prefix.is_empty()).then(|| prefix.to_string())
}

fn series_without_suffix(stem: &str) -> Option<String> {
    let stripped = GENERIC_SUFFIXES.iter().find_map(|suffix| {
        let cut = stem.len().checked_sub(suffix.len())?;
        if !stem.is_char_boundary(cut) || !stem[cut..].eq_ignore_ascii_case(suffix) {
            return None;
        }
        Some(&stem[..cut])
    })?;

    (!stripped.is_empty()).then(|| stripped.to_string())
}
