use std::io::{self, Write};

use anyhow::{Context, Result};
use serde::Serialize;

use super::sources::collect_candidates;
use crate::cli::ExtractArgs;
use crate::extract::MetadataExtractor;
use crate::model::ExtractedMetadata;
use crate::series_map::SeriesMap;
use crate::util::expand_home;

#[derive(Debug, Serialize)]
struct ExtractedFile {
    filename: String,
    metadata: ExtractedMetadata,
}

pub fn run(args: ExtractArgs) -> Result<()> {
    let series_map = SeriesMap::load_or_empty(&expand_home(&args.series_map));
    let extractor = MetadataExtractor::new()?;

    let extracted: Vec<ExtractedFile> = collect_candidates(&args.source)?
        .into_iter()
        .map(|candidate| ExtractedFile {
            metadata: extractor.extract(&candidate.filename, &series_map),
            filename: candidate.filename,
        })
        .collect();

    let mut output = io::BufWriter::new(io::stdout().lock());
    if args.json {
        serde_json::to_writer_pretty(&mut output, &extracted)
            .context("failed to serialize extract json output")?;
        writeln!(output)?;
    } else {
        for file in &extracted {
            let marker = if file.metadata.date_defaulted() {
                " (today)"
            } else {
                ""
            };
            writeln!(output, "{}", file.filename)?;
            writeln!(output, "\ttitle={}", file.metadata.title)?;
            writeln!(output, "\tdate={}{marker}", file.metadata.published_date)?;
            writeln!(
                output,
                "\tseries={}",
                file.metadata.series.as_deref().unwrap_or("-")
            )?;
        }
    }
    output.flush()?;
    Ok(())
}
