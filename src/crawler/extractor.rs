//! Page extraction
//!
//! An [`Extractor`] turns one fetched document into typed records and typed
//! follow-up links. It never sees the frontier, so running it twice over the
//! same document gives the same answer.

use crate::crawler::fetcher::FetchedDocument;
use crate::model::{
    track_id_from_url, CrawlTask, Direction, FollowUp, PageRole, SampleEdge, TrackRef,
};
use crate::url::resolve_link;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

/// Malformed or unexpected page shapes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("{role}: missing required field '{field}'")]
    MissingField { role: PageRole, field: &'static str },

    #[error("{role}: unexpected layout: {detail}")]
    UnexpectedLayout { role: PageRole, detail: String },

    #[error("invalid link: {0}")]
    InvalidLink(String),

    #[error("invalid selector '{0}'")]
    Selector(String),
}

/// A record found on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Track(TrackRef),
    Edge {
        edge: SampleEdge,
        /// Direction of the traversal that reached the detail page
        direction: Direction,
    },
}

/// Everything one page yields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub records: Vec<Record>,
    pub followups: Vec<FollowUp>,
}

/// Turns a fetched page into records and follow-up links
pub trait Extractor: Send + Sync {
    fn extract(
        &self,
        document: &FetchedDocument,
        task: &CrawlTask,
    ) -> Result<Extraction, ExtractionError>;
}

/// CSS selectors used against the sampling site's markup
struct Selectors {
    index_track: Selector,
    next_page: Selector,
    track_heading: Selector,
    heading_link: Selector,
    album: Selector,
    label_name: Selector,
    label_year: Selector,
    producer: Selector,
    video: Selector,
    section_header: Selector,
    section_title: Selector,
    button: Selector,
    entry_cell: Selector,
    anchor: Selector,
    entry_box: Selector,
    entry_track: Selector,
    timing: Selector,
}

fn selector(css: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(css).map_err(|_| ExtractionError::Selector(css.to_string()))
}

impl Selectors {
    fn new() -> Result<Self, ExtractionError> {
        Ok(Self {
            index_track: selector(r#"h3.trackName a[itemprop="url"]"#)?,
            next_page: selector("span.next a[href]")?,
            track_heading: selector("div.trackInfo h1")?,
            heading_link: selector("a")?,
            album: selector("div.release-name a")?,
            label_name: selector("div.label-details span")?,
            label_year: selector("div.label-details a")?,
            producer: selector("div.track-metainfo span.producer a")?,
            video: selector("div.media-container iframe[src]")?,
            section_header: selector("header")?,
            section_title: selector("h3")?,
            button: selector("a.btn[href]")?,
            entry_cell: selector("td.tdata__td1")?,
            anchor: selector("a[href]")?,
            entry_box: selector("div.sampleEntryBox")?,
            entry_track: selector("a.trackName[href]")?,
            timing: selector("div.timing-wrapper span")?,
        })
    }
}

/// Extractor for the sampling site's HTML pages
pub struct HtmlExtractor {
    selectors: Selectors,
}

impl HtmlExtractor {
    pub fn new() -> Result<Self, ExtractionError> {
        Ok(Self {
            selectors: Selectors::new()?,
        })
    }

    /// Year index: one track link per listed track, plus the next page
    fn year_index(&self, html: &Html, base: &Url) -> Extraction {
        let mut followups: Vec<FollowUp> = html
            .select(&self.selectors.index_track)
            .filter_map(|a| href(a, base))
            .map(|url| FollowUp::Track { url })
            .collect();

        followups.extend(self.next_page(html, base));

        Extraction {
            records: Vec::new(),
            followups,
        }
    }

    /// Track page: the track record, inline sample links for both
    /// directions and any "see all" list links
    fn track_page(
        &self,
        html: &Html,
        document: &FetchedDocument,
        task: &CrawlTask,
    ) -> Result<Extraction, ExtractionError> {
        let role = PageRole::TrackPage;
        let base = &document.url;

        let id = task
            .track_id()
            .ok_or(ExtractionError::MissingField { role, field: "id" })?;

        let heading = html
            .select(&self.selectors.track_heading)
            .next()
            .ok_or(ExtractionError::MissingField { role, field: "title" })?;

        let title = direct_text(heading)
            .or_else(|| clean_text(&heading.text().collect::<String>()))
            .ok_or(ExtractionError::MissingField { role, field: "title" })?;

        let mut track = TrackRef::new(id, title, base);
        track.artists = heading
            .select(&self.selectors.heading_link)
            .filter_map(|a| clean_text(&a.text().collect::<String>()))
            .collect();
        track.album = first_text(html, &self.selectors.album);
        track.record_label = first_text(html, &self.selectors.label_name);
        track.release_year =
            first_text(html, &self.selectors.label_year).and_then(|s| find_year(&s));
        track.producers = html
            .select(&self.selectors.producer)
            .filter_map(|a| clean_text(&a.text().collect::<String>()))
            .collect();
        track.youtube_link = html
            .select(&self.selectors.video)
            .next()
            .and_then(|frame| frame.value().attr("src"))
            .map(|src| src.trim().to_string());

        let mut followups = Vec::new();
        for header in html.select(&self.selectors.section_header) {
            let Some(direction) = self.section_direction(header) else {
                continue;
            };
            self.section_links(header, direction, base, &mut followups);
        }

        Ok(Extraction {
            records: vec![Record::Track(track)],
            followups,
        })
    }

    /// Which sampling section a `<header>` opens, if any
    fn section_direction(&self, header: ElementRef) -> Option<Direction> {
        let title = header
            .select(&self.selectors.section_title)
            .next()?
            .text()
            .collect::<String>()
            .to_lowercase();

        if title.contains("contains samples") {
            Some(Direction::Forward)
        } else if title.contains("sampled in") {
            Some(Direction::Reverse)
        } else {
            None
        }
    }

    /// Collects the links in the siblings between a section header and the
    /// next header
    fn section_links(
        &self,
        header: ElementRef,
        direction: Direction,
        base: &Url,
        followups: &mut Vec<FollowUp>,
    ) {
        let siblings = header
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .take_while(|el| el.value().name() != "header");

        for sibling in siblings {
            let see_all = sibling
                .select(&self.selectors.button)
                .chain(Some(sibling).filter(|el| self.selectors.button.matches(el)))
                .find(|btn| {
                    btn.text()
                        .collect::<String>()
                        .to_lowercase()
                        .contains("see all")
                })
                .and_then(|btn| href(btn, base));

            if let Some(url) = see_all {
                followups.push(match direction {
                    Direction::Forward => FollowUp::SamplesPage { url },
                    Direction::Reverse => FollowUp::SampledPage { url },
                });
            }

            followups.extend(
                self.entry_links(sibling, base)
                    .map(|url| FollowUp::SampleDetail { url, direction }),
            );
        }
    }

    /// First link in each `td.tdata__td1` cell under `scope`
    fn entry_links<'a>(
        &'a self,
        scope: ElementRef<'a>,
        base: &'a Url,
    ) -> impl Iterator<Item = Url> + 'a {
        scope.select(&self.selectors.entry_cell).filter_map(move |cell| {
            cell.select(&self.selectors.anchor)
                .next()
                .and_then(|a| href(a, base))
        })
    }

    /// Dedicated samples/sampled list: every entry's detail link plus the
    /// next page
    fn list_page(&self, html: &Html, base: &Url, direction: Direction) -> Extraction {
        let mut followups: Vec<FollowUp> = self
            .entry_links(html.root_element(), base)
            .map(|url| FollowUp::SampleDetail { url, direction })
            .collect();

        followups.extend(self.next_page(html, base));

        Extraction {
            records: Vec::new(),
            followups,
        }
    }

    /// Sample detail page: the edge between the two entry boxes and a link to
    /// the endpoint on the far side of the traversal
    fn detail_page(
        &self,
        html: &Html,
        base: &Url,
        task: &CrawlTask,
    ) -> Result<Extraction, ExtractionError> {
        let role = PageRole::SampleDetailPage;
        let boxes: Vec<ElementRef> = html.select(&self.selectors.entry_box).collect();

        if boxes.is_empty() {
            return Err(ExtractionError::UnexpectedLayout {
                role,
                detail: "no sample entry boxes".to_string(),
            });
        }

        let sampler = self.entry_box(boxes[0], base)?;
        let sampled = boxes
            .get(1)
            .map(|el| self.entry_box(*el, base))
            .transpose()?;

        let source_id = sampler
            .url
            .as_ref()
            .and_then(track_id_from_url)
            .or_else(|| task.context.source_track_id.clone());
        let target_id = sampled
            .as_ref()
            .and_then(|s| s.url.as_ref())
            .and_then(track_id_from_url)
            .or_else(|| task.context.target_track_id.clone());

        let direction = task.context.direction;
        let mut records = Vec::new();

        match (source_id, target_id) {
            (Some(source), Some(target)) => {
                let mut edge = SampleEdge::new(source, target);
                edge.timestamps_in_source = sampler.timings.clone();
                edge.timestamps_in_target = sampled
                    .as_ref()
                    .map(|s| s.timings.clone())
                    .unwrap_or_default();
                records.push(Record::Edge { edge, direction });
            }
            _ => tracing::debug!("Unresolved edge endpoint on {}", base),
        }

        let far_side = match direction {
            Direction::Forward => sampled.and_then(|s| s.url),
            Direction::Reverse => sampler.url,
        };

        Ok(Extraction {
            records,
            followups: far_side.map(|url| FollowUp::Track { url }).into_iter().collect(),
        })
    }

    /// Reads one entry box; a track link that does not resolve is an error
    fn entry_box(&self, entry: ElementRef, base: &Url) -> Result<EntryBox, ExtractionError> {
        let url = match entry
            .select(&self.selectors.entry_track)
            .next()
            .and_then(|a| a.value().attr("href"))
        {
            Some(raw) => Some(
                resolve_link(raw, base)
                    .ok_or_else(|| ExtractionError::InvalidLink(raw.to_string()))?,
            ),
            None => None,
        };

        Ok(EntryBox {
            url,
            timings: entry
                .select(&self.selectors.timing)
                .filter_map(|span| clean_text(&span.text().collect::<String>()))
                .collect(),
        })
    }

    fn next_page(&self, html: &Html, base: &Url) -> Option<FollowUp> {
        html.select(&self.selectors.next_page)
            .next()
            .and_then(|a| href(a, base))
            .map(|url| FollowUp::Pagination { url })
    }
}

/// One side of a sample detail page
struct EntryBox {
    url: Option<Url>,
    timings: Vec<String>,
}

impl Extractor for HtmlExtractor {
    fn extract(
        &self,
        document: &FetchedDocument,
        task: &CrawlTask,
    ) -> Result<Extraction, ExtractionError> {
        let html = Html::parse_document(&document.body);
        let base = &document.url;

        match task.role {
            PageRole::YearIndexPage => Ok(self.year_index(&html, base)),
            PageRole::TrackPage => self.track_page(&html, document, task),
            PageRole::SamplesListPage => Ok(self.list_page(&html, base, Direction::Forward)),
            PageRole::SampledListPage => Ok(self.list_page(&html, base, Direction::Reverse)),
            PageRole::SampleDetailPage => self.detail_page(&html, base, task),
        }
    }
}

fn href(element: ElementRef, base: &Url) -> Option<Url> {
    element
        .value()
        .attr("href")
        .and_then(|h| resolve_link(h, base))
}

/// Trims, turns newlines into spaces and drops carriage returns
fn clean_text(text: &str) -> Option<String> {
    let cleaned = text.trim().replace('\n', " ").replace('\r', "");
    (!cleaned.is_empty()).then_some(cleaned)
}

/// First non-blank text node directly under an element
fn direct_text(element: ElementRef) -> Option<String> {
    element
        .children()
        .filter_map(|node| node.value().as_text().map(|t| t.trim().to_string()))
        .find_map(|t| clean_text(&t))
}

fn first_text(html: &Html, selector: &Selector) -> Option<String> {
    html.select(selector)
        .next()
        .and_then(|el| clean_text(&el.text().collect::<String>()))
}

/// First run of exactly four ASCII digits
fn find_year(text: &str) -> Option<u16> {
    let bytes = text.as_bytes();
    (0..bytes.len().saturating_sub(3))
        .find(|&i| {
            bytes[i..i + 4].iter().all(u8::is_ascii_digit)
                && (i == 0 || !bytes[i - 1].is_ascii_digit())
                && bytes.get(i + 4).map_or(true, |b| !b.is_ascii_digit())
        })
        .and_then(|i| text[i..i + 4].parse().ok())
}
