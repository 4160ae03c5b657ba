//! Podcast feeds: fetch over HTTP, parse RSS, serve through the cache.

use std::sync::Arc;

use cast_proto::protocol::{slugify, Cast, Podcast};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, info};

use crate::cache::{FetchError, ResourceCache};

pub type PodcastCache = ResourceCache<String, Arc<Podcast>>;
pub type ArtworkCache = ResourceCache<String, Arc<Vec<u8>>>;

/// What a feed document declares, before it becomes a [`Podcast`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFeed {
    pub name: String,
    pub casts: Vec<Cast>,
    pub image_url: Option<String>,
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(concat!("castplay/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

async fn get(client: &reqwest::Client, url: &str) -> Result<reqwest::Response, FetchError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| FetchError::Network {
            url: url.to_string(),
            message: e.to_string(),
        })?;

    if !response.status().is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }
    Ok(response)
}

pub async fn fetch_text(client: &reqwest::Client, url: &str) -> Result<String, FetchError> {
    get(client, url)
        .await?
        .text()
        .await
        .map_err(|e| FetchError::Network {
            url: url.to_string(),
            message: e.to_string(),
        })
}

pub async fn fetch_bytes(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, FetchError> {
    let bytes = get(client, url)
        .await?
        .bytes()
        .await
        .map_err(|e| FetchError::Network {
            url: url.to_string(),
            message: e.to_string(),
        })?;
    Ok(bytes.to_vec())
}

pub async fn load_podcast(client: &reqwest::Client, feed_url: &str) -> Result<Podcast, FetchError> {
    let text = fetch_text(client, feed_url).await?;
    let parsed = parse_feed(&text).map_err(|e| FetchError::Parse {
        url: feed_url.to_string(),
        message: format!("{:#}", e),
    })?;
    info!(
        "feed: loaded '{}' ({} casts) from {}",
        parsed.name,
        parsed.casts.len(),
        feed_url
    );
    Ok(Podcast {
        slug: slugify(&parsed.name),
        name: parsed.name,
        feed_url: feed_url.to_string(),
        casts: parsed.casts,
        image_url: parsed.image_url,
    })
}

/// Podcasts keyed by feed URL, each fetched at most once.
pub fn podcast_cache(client: reqwest::Client) -> PodcastCache {
    ResourceCache::from_fn(move |feed_url: String| {
        let client = client.clone();
        async move { load_podcast(&client, &feed_url).await.map(Arc::new) }
    })
}

/// Cover art bytes keyed by image URL, each fetched at most once.
pub fn artwork_cache(client: reqwest::Client) -> ArtworkCache {
    ResourceCache::from_fn(move |image_url: String| {
        let client = client.clone();
        async move { fetch_bytes(&client, &image_url).await.map(Arc::new) }
    })
}

// ── RSS ───────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct ItemDraft {
    title: String,
    url: Option<String>,
}

/// Parse an RSS 2.0 document into a channel name and its playable items.
///
/// Items without an audio enclosure are skipped.  Namespaced tags are
/// matched on their local name, so `<itunes:image href>` counts as artwork.
pub fn parse_feed(text: &str) -> anyhow::Result<ParsedFeed> {
    // Text is trimmed per element, not per event: entity references split text events
    let mut reader = Reader::from_str(text);

    let mut path: Vec<String> = Vec::new();
    let mut buf_text = String::new();
    let mut name: Option<String> = None;
    let mut image_url: Option<String> = None;
    let mut casts = Vec::new();
    let mut item: Option<ItemDraft> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let tag = local_name(&e);
                buf_text.clear();
                if tag == "item" {
                    item = Some(ItemDraft::default());
                }
                on_attributes(&e, &tag, &mut item, &mut image_url)?;
                path.push(tag);
            }
            Event::Empty(e) => {
                let tag = local_name(&e);
                on_attributes(&e, &tag, &mut item, &mut image_url)?;
            }
            Event::Text(e) => {
                buf_text.push_str(&e.decode()?);
            }
            Event::CData(e) => {
                buf_text.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }
            Event::GeneralRef(e) => {
                if let Some(c) = resolve_entity(&e.decode()?) {
                    buf_text.push_str(&c);
                }
            }
            Event::End(_) => {
                let Some(tag) = path.pop() else {
                    anyhow::bail!("unbalanced closing tag");
                };
                let parent = path.last().map(String::as_str);
                let value = buf_text.trim().to_string();
                buf_text.clear();

                match (tag.as_str(), parent) {
                    ("title", Some("item")) => {
                        if let Some(draft) = item.as_mut() {
                            draft.title = value;
                        }
                    }
                    ("title", Some("channel")) if name.is_none() => name = Some(value),
                    ("url", Some("image")) if item.is_none() && image_url.is_none() => {
                        if !value.is_empty() {
                            image_url = Some(value);
                        }
                    }
                    ("item", _) => {
                        if let Some(draft) = item.take() {
                            match draft.url {
                                Some(url) => casts.push(Cast {
                                    title: if draft.title.is_empty() {
                                        url.clone()
                                    } else {
                                        draft.title
                                    },
                                    url,
                                }),
                                None => debug!("feed: skipping item without enclosure"),
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let name = name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| anyhow::anyhow!("feed has no channel title"))?;
    Ok(ParsedFeed {
        name,
        casts,
        image_url,
    })
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).to_string()
}

fn on_attributes(
    e: &BytesStart<'_>,
    tag: &str,
    item: &mut Option<ItemDraft>,
    image_url: &mut Option<String>,
) -> anyhow::Result<()> {
    match tag {
        "enclosure" => {
            if let Some(draft) = item.as_mut() {
                if let Some(attr) = e.try_get_attribute("url")? {
                    let url = attr.unescape_value()?.trim().to_string();
                    if !url.is_empty() && draft.url.is_none() {
                        draft.url = Some(url);
                    }
                }
            }
        }
        "image" if item.is_none() && image_url.is_none() => {
            if let Some(attr) = e.try_get_attribute("href")? {
                let href = attr.unescape_value()?.trim().to_string();
                if !href.is_empty() {
                    *image_url = Some(href);
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// `amp` → `&`, `#233` → `é`, `#x2019` → `’`.  Unknown names resolve to nothing.
fn resolve_entity(name: &str) -> Option<String> {
    let resolved = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        _ => {
            let code = name.strip_prefix('#')?;
            let value = match code.strip_prefix('x').or_else(|| code.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse::<u32>().ok()?,
            };
            char::from_u32(value)?
        }
    };
    Some(resolved.to_string())
}
