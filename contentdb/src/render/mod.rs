//! Lazy rendering of content entries.
//!
//! Bodies are kept raw in the snapshot and only turned into HTML when
//! [`Entry::render`] is called, through a [`Renderer`] collaborator.

use crate::document::SourceFormat;
use crate::error::{ContentError, Result};
use crate::store::Entry;
use pulldown_cmark::{html, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A heading found in a rendered body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Heading {
    pub depth: u8,
    pub text: String,
    pub slug: String,
}

/// What a rendering collaborator returns for one body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderOutput {
    pub html: String,
    pub headings: Vec<Heading>,
    /// Plugin-derived metadata.
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Rendered entry: content, headings, and frontmatter merged with renderer metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rendered {
    pub content: String,
    pub headings: Vec<Heading>,
    pub frontmatter: serde_json::Map<String, serde_json::Value>,
}

pub trait Renderer: Send + Sync {
    fn render(&self, body: &str, format: SourceFormat) -> Result<RenderOutput>;

    /// Render a whole entry. The default implementation renders every call.
    fn render_entry(&self, entry: &Entry) -> Result<Arc<Rendered>> {
        let body = match (&entry.slug, &entry.body) {
            (Some(_), Some(body)) => body,
            _ => {
                return Err(ContentError::NotRenderable {
                    collection: entry.collection.clone(),
                    id: entry.id.clone(),
                })
            }
        };

        let output = self.render(body, entry.format)?;
        let mut frontmatter = entry.data.as_object().cloned().unwrap_or_default();
        frontmatter.extend(output.metadata);

        Ok(Arc::new(Rendered {
            content: output.html,
            headings: output.headings,
            frontmatter,
        }))
    }
}

impl Entry {
    /// Render this entry's body. Data entries are not renderable.
    pub fn render(&self, renderer: &dyn Renderer) -> Result<Arc<Rendered>> {
        renderer.render_entry(self)
    }
}

/// CommonMark renderer with heading extraction.
///
/// MDX bodies are rendered as plain markdown; JSX is passed through as HTML.
#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    options: Options,
    words_per_minute: usize,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
        MarkdownRenderer {
            options,
            words_per_minute: 200,
        }
    }

    pub fn with_words_per_minute(mut self, wpm: usize) -> Self {
        self.words_per_minute = wpm.max(1);
        self
    }
}

impl Renderer for MarkdownRenderer {
    fn render(&self, body: &str, _format: SourceFormat) -> Result<RenderOutput> {
        let mut events: Vec<Event<'_>> = Parser::new_ext(body, self.options).collect();
        let mut headings = Vec::new();
        let mut seen_slugs: HashMap<String, usize> = HashMap::new();
        let mut words: usize = 0;

        let mut open: Option<(usize, HeadingLevel, Option<String>, String)> = None;
        let mut generated_ids = Vec::new();
        for (i, event) in events.iter().enumerate() {
            match event {
                Event::Start(Tag::Heading { level, id, .. }) => {
                    let explicit = id.as_ref().map(|s| s.to_string());
                    open = Some((i, *level, explicit, String::new()));
                }
                Event::End(TagEnd::Heading(_)) => {
                    if let Some((start, level, explicit, text)) = open.take() {
                        let slug = match explicit {
                            Some(id) => {
                                seen_slugs.entry(id.clone()).or_insert(0);
                                id
                            }
                            None => {
                                let slug = unique_slug(&mut seen_slugs, &text);
                                generated_ids.push((start, slug.clone()));
                                slug
                            }
                        };
                        headings.push(heading(level, text, slug));
                    }
                }
                Event::Text(text) | Event::Code(text) => {
                    words += text.split_whitespace().count();
                    if let Some((_, _, _, heading_text)) = open.as_mut() {
                        heading_text.push_str(text);
                    }
                }
                _ => {}
            }
        }

        for (index, slug) in generated_ids {
            if let Event::Start(Tag::Heading { id, .. }) = &mut events[index] {
                *id = Some(slug.into());
            }
        }

        let mut html_out = String::new();
        html::push_html(&mut html_out, events.into_iter());

        let mut metadata = serde_json::Map::new();
        metadata.insert("words".into(), words.into());
        metadata.insert(
            "minutes_read".into(),
            words.div_ceil(self.words_per_minute).into(),
        );

        Ok(RenderOutput {
            html: html_out,
            headings,
            metadata,
        })
    }
}

fn heading(level: HeadingLevel, text: String, slug: String) -> Heading {
    Heading {
        depth: level as u8,
        text,
        slug,
    }
}

/// GitHub-style heading slugs: repeated slugs get `-1`, `-2`, ... suffixes
/// and underscores are kept.
fn unique_slug(seen: &mut HashMap<String, usize>, text: &str) -> String {
    let base = text
        .split('_')
        .map(slug::slugify)
        .collect::<Vec<_>>()
        .join("_");
    let mut slug = base.clone();
    while seen.contains_key(&slug) {
        let count = seen.entry(base.clone()).or_insert(0);
        *count += 1;
        slug = format!("{base}-{count}");
    }
    seen.insert(slug.clone(), 0);
    slug
}

/// Caches rendered entries by `(collection, id)`.
///
/// Entries never change within a snapshot, so the cache is never invalidated;
/// build a new one alongside each new snapshot.
pub struct CachedRenderer<R> {
    inner: R,
    cache: Mutex<HashMap<(String, String), Arc<Rendered>>>,
}

impl<R: Renderer> CachedRenderer<R> {
    pub fn new(inner: R) -> Self {
        CachedRenderer {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<R: Renderer> Renderer for CachedRenderer<R> {
    fn render(&self, body: &str, format: SourceFormat) -> Result<RenderOutput> {
        self.inner.render(body, format)
    }

    fn render_entry(&self, entry: &Entry) -> Result<Arc<Rendered>> {
        let key = (entry.collection.clone(), entry.id.clone());
        if let Some(hit) = self.cache.lock().ok().and_then(|c| c.get(&key).cloned()) {
            return Ok(hit);
        }
        // Rendering happens outside the lock; a concurrent miss renders twice
        let rendered = self.inner.render_entry(entry)?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.entry(key).or_insert_with(|| rendered.clone());
        }
        Ok(rendered)
    }
}
