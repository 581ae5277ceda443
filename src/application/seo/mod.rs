//! Search and social metadata derived from post attributes.
//!
//! Everything here is a pure function of a [`PostRecord`] (or a
//! [`ProgrammaticPage`] plus variables) and the site-wide [`SiteConfig`]. The
//! rendered HTML is never consulted.

mod template;
mod text;

use serde::Serialize;
use serde_json::{Map, Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::config::SiteSettings;
use crate::domain::entities::PostRecord;
use crate::util::html::{strip_tags, word_count};

pub use template::{ProgrammaticPage, substitute};
pub use text::{
    DESCRIPTION_TARGET_CHARS, TITLE_CUT_CHARS, TITLE_MAX_CHARS, optimize_description,
    optimize_title,
};

pub const DEFAULT_SCHEMA_TYPE: &str = "Article";
pub const ARTICLE_BODY_MAX_CHARS: usize = 5000;

/// Schema.org types that carry the article body and word count.
const FULL_BODY_TYPES: &[&str] = &["TechArticle", "ScholarlyArticle", "NewsArticle", "BlogPosting"];

/// Site-wide constants used when deriving metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    /// Absolute base URL without a trailing slash.
    pub url: String,
    pub name: String,
    pub organization: String,
    pub logo_url: Option<String>,
    pub default_image: Option<String>,
    pub language: String,
    pub twitter_handle: Option<String>,
}

impl SiteConfig {
    pub fn new(url: &str, name: impl Into<String>, organization: impl Into<String>) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            name: name.into(),
            organization: organization.into(),
            logo_url: None,
            default_image: None,
            language: "pt-BR".to_string(),
            twitter_handle: None,
        }
    }

    /// Resolve a site-relative path or URL against the site base.
    pub fn absolute_url(&self, path: &str) -> String {
        let path = path.trim();
        if path.starts_with("http://")
            || path.starts_with("https://")
            || path.starts_with("data:")
        {
            return path.to_string();
        }
        if let Some(rest) = path.strip_prefix("//") {
            return format!("https://{rest}");
        }
        let trimmed = path.trim_start_matches('/');
        if trimmed.is_empty() {
            self.url.clone()
        } else {
            format!("{}/{trimmed}", self.url)
        }
    }
}

impl From<&SiteSettings> for SiteConfig {
    fn from(settings: &SiteSettings) -> Self {
        Self {
            url: settings.url.trim_end_matches('/').to_string(),
            name: settings.name.clone(),
            organization: settings.organization.clone(),
            logo_url: settings.logo_url.clone(),
            default_image: settings.default_image.clone(),
            language: settings.language.clone(),
            twitter_handle: settings.twitter_handle.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CrawlerDirectives {
    pub index: bool,
    pub follow: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Robots {
    pub index: bool,
    pub follow: bool,
    pub google_bot: CrawlerDirectives,
}

impl Robots {
    pub fn from_flags(noindex: bool, nofollow: bool) -> Self {
        let directives = CrawlerDirectives {
            index: !noindex,
            follow: !nofollow,
        };
        Self {
            index: directives.index,
            follow: directives.follow,
            google_bot: directives,
        }
    }

    /// `content` value for a `<meta name="robots">` tag.
    pub fn directive(&self) -> String {
        let index = if self.index { "index" } else { "noindex" };
        let follow = if self.follow { "follow" } else { "nofollow" };
        format!("{index}, {follow}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TwitterCard {
    pub card: String,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeoMetadata {
    pub title: String,
    pub description: String,
    pub canonical_url: String,
    pub og_title: String,
    pub og_description: String,
    pub og_image: Option<String>,
    pub og_type: String,
    pub keywords: Vec<String>,
    pub robots: Robots,
    pub twitter: TwitterCard,
    pub structured_data: Value,
}

impl SeoMetadata {
    /// Structured data serialized for a `<script type="application/ld+json">` block.
    pub fn json_ld(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.structured_data)
    }
}

/// Derive the full metadata set for a post.
pub fn build_metadata(post: &PostRecord, site: &SiteConfig) -> SeoMetadata {
    let title = optimize_title(first_present([post.meta_title.as_deref()]).unwrap_or(&post.title));
    let description = optimize_description(
        &description_source(post),
        DESCRIPTION_TARGET_CHARS,
    );
    let canonical_url = canonical_url(post, site);
    let image = first_present([
        post.og_image.as_deref(),
        post.cover_image.as_deref(),
        site.default_image.as_deref(),
    ])
    .map(|image| site.absolute_url(image));
    let keywords = if post.keywords.is_empty() {
        post.tags.clone()
    } else {
        post.keywords.clone()
    };

    let og_title = first_present([post.og_title.as_deref()])
        .map(str::to_string)
        .unwrap_or_else(|| title.clone());
    let og_description = first_present([post.og_description.as_deref()])
        .map(|text| optimize_description(text, DESCRIPTION_TARGET_CHARS))
        .unwrap_or_else(|| description.clone());

    let structured_data = article_schema(ArticleSchemaInput {
        post,
        site,
        headline: &title,
        description: &description,
        canonical_url: &canonical_url,
        image: image.as_deref(),
        keywords: &keywords,
    });

    SeoMetadata {
        twitter: twitter_card(site, &og_title, &og_description, image.as_deref()),
        title,
        description,
        canonical_url,
        og_title,
        og_description,
        og_image: image,
        og_type: "article".to_string(),
        keywords,
        robots: Robots::from_flags(post.noindex, post.nofollow),
        structured_data,
    }
}

/// Derive metadata for a templated page from its variables.
pub fn build_programmatic_metadata(
    page: &ProgrammaticPage,
    variables: &Map<String, Value>,
    site: &SiteConfig,
) -> SeoMetadata {
    let title = optimize_title(&substitute(&page.title_template, variables));
    let description = optimize_description(
        &substitute(&page.description_template, variables),
        DESCRIPTION_TARGET_CHARS,
    );
    let canonical_url = site.absolute_url(&substitute(&page.path_template, variables));
    let image = first_present([page.image.as_deref(), site.default_image.as_deref()])
        .map(|image| site.absolute_url(&substitute(image, variables)));
    let keywords: Vec<String> = page
        .keywords
        .iter()
        .map(|keyword| substitute(keyword, variables))
        .filter(|keyword| !keyword.trim().is_empty())
        .collect();
    let schema_type = first_present([page.schema_type.as_deref()]).unwrap_or("WebPage");

    let mut schema = Map::new();
    schema.insert("@context".into(), json!("https://schema.org"));
    schema.insert("@type".into(), json!(schema_type));
    schema.insert("name".into(), json!(title));
    schema.insert("description".into(), json!(description));
    schema.insert("url".into(), json!(canonical_url));
    if let Some(image) = &image {
        schema.insert("image".into(), json!(image));
    }
    if !keywords.is_empty() {
        schema.insert("keywords".into(), json!(keywords));
    }
    schema.insert("publisher".into(), publisher(site));
    schema.insert("inLanguage".into(), json!(site.language));

    SeoMetadata {
        twitter: twitter_card(site, &title, &description, image.as_deref()),
        og_title: title.clone(),
        og_description: description.clone(),
        title,
        description,
        canonical_url,
        og_image: image,
        og_type: "website".to_string(),
        keywords,
        robots: Robots::from_flags(page.noindex, false),
        structured_data: Value::Object(schema),
    }
}

/// `{site}/{blog|estudos}/{slug-or-id}` unless the post overrides it.
pub fn canonical_url(post: &PostRecord, site: &SiteConfig) -> String {
    if let Some(url) = first_present([post.canonical_url.as_deref()]) {
        return site.absolute_url(url);
    }
    let slug = post.slug.trim();
    let identifier = if slug.is_empty() {
        post.id.to_string()
    } else {
        slug.to_string()
    };
    format!("{}/{}/{identifier}", site.url, post.kind.path_segment())
}

fn description_source(post: &PostRecord) -> String {
    match first_present([
        post.meta_description.as_deref(),
        post.excerpt.as_deref(),
        post.description.as_deref(),
    ]) {
        Some(text) => text.to_string(),
        None => strip_tags(&post.content),
    }
}

struct ArticleSchemaInput<'a> {
    post: &'a PostRecord,
    site: &'a SiteConfig,
    headline: &'a str,
    description: &'a str,
    canonical_url: &'a str,
    image: Option<&'a str>,
    keywords: &'a [String],
}

fn article_schema(input: ArticleSchemaInput<'_>) -> Value {
    let ArticleSchemaInput {
        post,
        site,
        headline,
        description,
        canonical_url,
        image,
        keywords,
    } = input;
    let schema_type = first_present([post.schema_type.as_deref()]).unwrap_or(DEFAULT_SCHEMA_TYPE);

    let author = match first_present([post.author.as_deref()]) {
        Some(name) => json!({ "@type": "Person", "name": name }),
        None => json!({ "@type": "Organization", "name": site.organization }),
    };

    let mut schema = Map::new();
    schema.insert("@context".into(), json!("https://schema.org"));
    schema.insert("@type".into(), json!(schema_type));
    schema.insert("headline".into(), json!(headline));
    schema.insert("description".into(), json!(description));
    if let Some(image) = image {
        schema.insert("image".into(), json!(image));
    }
    schema.insert("author".into(), author);
    schema.insert("publisher".into(), publisher(site));
    if let Some(published) = rfc3339(post.created_at) {
        schema.insert("datePublished".into(), json!(published));
    }
    if let Some(modified) = rfc3339(post.updated_at) {
        schema.insert("dateModified".into(), json!(modified));
    }
    schema.insert(
        "mainEntityOfPage".into(),
        json!({ "@type": "WebPage", "@id": canonical_url }),
    );
    if !keywords.is_empty() {
        schema.insert("keywords".into(), json!(keywords));
    }
    if FULL_BODY_TYPES.contains(&schema_type) {
        let body = strip_tags(&post.content);
        schema.insert(
            "articleBody".into(),
            json!(body.chars().take(ARTICLE_BODY_MAX_CHARS).collect::<String>()),
        );
        schema.insert("wordCount".into(), json!(word_count(&body)));
    }
    schema.insert("inLanguage".into(), json!(site.language));

    Value::Object(schema)
}

fn publisher(site: &SiteConfig) -> Value {
    let mut publisher = json!({ "@type": "Organization", "name": site.organization });
    if let (Some(logo), Value::Object(map)) = (site.logo_url.as_deref(), &mut publisher) {
        map.insert(
            "logo".into(),
            json!({ "@type": "ImageObject", "url": site.absolute_url(logo) }),
        );
    }
    publisher
}

fn twitter_card(
    site: &SiteConfig,
    title: &str,
    description: &str,
    image: Option<&str>,
) -> TwitterCard {
    let card = if image.is_some() {
        "summary_large_image"
    } else {
        "summary"
    };
    TwitterCard {
        card: card.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        image: image.map(str::to_string),
        site: site.twitter_handle.clone(),
    }
}

fn rfc3339(value: OffsetDateTime) -> Option<String> {
    value.format(&Rfc3339).ok()
}

fn first_present<'a, const N: usize>(candidates: [Option<&'a str>; N]) -> Option<&'a str> {
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ContentKind;
    use time::macros::datetime;
    use uuid::Uuid;

    fn site() -> SiteConfig {
        let mut site = SiteConfig::new("https://escriba.dev/", "Escriba", "Escriba Labs");
        site.logo_url = Some("/logo.png".to_string());
        site.default_image = Some("/og-default.png".to_string());
        site.twitter_handle = Some("@escriba".to_string());
        site
    }

    fn post() -> PostRecord {
        let mut post = PostRecord::new(Uuid::nil(), ContentKind::Blog, "Ownership em Rust");
        post.slug = "ownership-em-rust".to_string();
        post.content = "<p>Ownership garante segurança de memória.</p>".to_string();
        post.created_at = datetime!(2024-03-01 12:00 UTC);
        post.updated_at = datetime!(2024-03-02 08:30 UTC);
        post
    }

    #[test]
    fn canonical_url_uses_kind_segment_and_slug() {
        let site = site();
        let mut post = post();
        assert_eq!(
            build_metadata(&post, &site).canonical_url,
            "https://escriba.dev/blog/ownership-em-rust"
        );

        post.kind = ContentKind::Study;
        post.slug.clear();
        assert_eq!(
            build_metadata(&post, &site).canonical_url,
            format!("https://escriba.dev/estudos/{}", Uuid::nil())
        );

        post.canonical_url = Some("https://elsewhere.dev/original".to_string());
        assert_eq!(
            build_metadata(&post, &site).canonical_url,
            "https://elsewhere.dev/original"
        );
    }

    #[test]
    fn title_and_description_prefer_overrides() {
        let mut post = post();
        post.excerpt = Some("Resumo curto.".to_string());
        post.description = Some("Descrição longa.".to_string());
        let metadata = build_metadata(&post, &site());
        assert_eq!(metadata.title, "Ownership em Rust");
        assert_eq!(metadata.description, "Resumo curto.");

        post.meta_title = Some("Guia de ownership".to_string());
        post.meta_description = Some("Meta descrição.".to_string());
        let metadata = build_metadata(&post, &site());
        assert_eq!(metadata.title, "Guia de ownership");
        assert_eq!(metadata.description, "Meta descrição.");
        assert_eq!(metadata.og_title, "Guia de ownership");
    }

    #[test]
    fn json_ld_is_the_structured_data_document() {
        let metadata = build_metadata(&post(), &site());
        let encoded = metadata.json_ld().expect("json-ld");
        assert!(!encoded.contains('\n'));

        let decoded: Value = serde_json::from_str(&encoded).expect("valid json");
        assert_eq!(decoded, metadata.structured_data);
        assert_eq!(decoded["@context"], "https://schema.org");
        assert_eq!(decoded["headline"], "Ownership em Rust");
    }

    #[test]
    fn description_falls_back_to_stripped_content() {
        let metadata = build_metadata(&post(), &site());
        assert_eq!(metadata.description, "Ownership garante segurança de memória.");
    }

    #[test]
    fn image_prefers_override_then_cover_then_site_default() {
        let site = site();
        let mut post = post();
        assert_eq!(
            build_metadata(&post, &site).og_image.as_deref(),
            Some("https://escriba.dev/og-default.png")
        );
        post.cover_image = Some("https://cdn.escriba.dev/cover.jpg".to_string());
        assert_eq!(
            build_metadata(&post, &site).og_image.as_deref(),
            Some("https://cdn.escriba.dev/cover.jpg")
        );
        post.og_image = Some("/images/og.png".to_string());
        let metadata = build_metadata(&post, &site);
        assert_eq!(
            metadata.og_image.as_deref(),
            Some("https://escriba.dev/images/og.png")
        );
        assert_eq!(metadata.structured_data["image"], "https://escriba.dev/images/og.png");
        assert_eq!(metadata.twitter.card, "summary_large_image");
    }

    #[test]
    fn structured_data_defaults_to_article_without_body() {
        let metadata = build_metadata(&post(), &site());
        let data = &metadata.structured_data;
        assert_eq!(data["@context"], "https://schema.org");
        assert_eq!(data["@type"], "Article");
        assert_eq!(data["headline"], "Ownership em Rust");
        assert_eq!(data["author"]["@type"], "Organization");
        assert_eq!(data["author"]["name"], "Escriba Labs");
        assert_eq!(data["publisher"]["logo"]["url"], "https://escriba.dev/logo.png");
        assert_eq!(data["datePublished"], "2024-03-01T12:00:00Z");
        assert_eq!(data["dateModified"], "2024-03-02T08:30:00Z");
        assert_eq!(data["inLanguage"], "pt-BR");
        assert!(data.get("articleBody").is_none());
        assert!(data.get("wordCount").is_none());
    }

    #[test]
    fn full_body_types_include_capped_article_body() {
        let mut post = post();
        post.schema_type = Some("TechArticle".to_string());
        post.author = Some("Ana Souza".to_string());
        post.content = format!("<p>{}</p>", "palavra ".repeat(1000));
        let metadata = build_metadata(&post, &site());
        let data = &metadata.structured_data;
        assert_eq!(data["@type"], "TechArticle");
        assert_eq!(data["author"]["@type"], "Person");
        assert_eq!(data["author"]["name"], "Ana Souza");
        let body = data["articleBody"].as_str().expect("body");
        assert_eq!(body.chars().count(), ARTICLE_BODY_MAX_CHARS);
        assert_eq!(data["wordCount"], 1000);
    }

    #[test]
    fn keywords_prefer_explicit_list_over_tags() {
        let mut post = post();
        post.tags = vec!["rust".to_string(), "memoria".to_string()];
        assert_eq!(build_metadata(&post, &site()).keywords, post.tags);
        post.keywords = vec!["ownership".to_string()];
        let metadata = build_metadata(&post, &site());
        assert_eq!(metadata.keywords, vec!["ownership".to_string()]);
        assert_eq!(metadata.structured_data["keywords"], json!(["ownership"]));
    }

    #[test]
    fn robots_invert_flags_with_nested_crawler_block() {
        let mut post = post();
        post.noindex = true;
        let metadata = build_metadata(&post, &site());
        assert!(!metadata.robots.index);
        assert!(metadata.robots.follow);
        assert!(!metadata.robots.google_bot.index);
        assert_eq!(metadata.robots.directive(), "noindex, follow");

        let json = serde_json::to_value(&metadata).expect("json");
        assert_eq!(json["robots"]["googleBot"]["follow"], true);
        assert_eq!(json["canonicalUrl"], metadata.canonical_url);
    }

    #[test]
    fn metadata_is_deterministic() {
        let post = post();
        let site = site();
        assert_eq!(build_metadata(&post, &site), build_metadata(&post, &site));
    }

    #[test]
    fn programmatic_page_substitutes_every_template() {
        let page = ProgrammaticPage {
            title_template: "Cursos de {{topic}} em {{city}}".to_string(),
            description_template: "Encontre {{count}} cursos de {{topic}} em {{city}}.".to_string(),
            path_template: "/cursos/{{slug}}".to_string(),
            schema_type: None,
            keywords: vec!["{{topic}}".to_string(), "{{missing}}".to_string()],
            image: None,
            noindex: false,
        };
        let variables = match json!({
            "topic": "Rust",
            "city": "Recife",
            "count": 4,
            "slug": "rust-recife"
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let metadata = build_programmatic_metadata(&page, &variables, &site());
        assert_eq!(metadata.title, "Cursos de Rust em Recife");
        assert_eq!(metadata.description, "Encontre 4 cursos de Rust em Recife.");
        assert_eq!(metadata.canonical_url, "https://escriba.dev/cursos/rust-recife");
        assert_eq!(metadata.keywords, vec!["Rust".to_string(), "{{missing}}".to_string()]);
        assert_eq!(metadata.structured_data["@type"], "WebPage");
        assert_eq!(metadata.structured_data["url"], metadata.canonical_url);
        assert_eq!(metadata.og_type, "website");
    }

    #[test]
    fn absolute_url_handles_relative_and_protocol_relative_paths() {
        let site = site();
        assert_eq!(site.absolute_url("img/a.png"), "https://escriba.dev/img/a.png");
        assert_eq!(site.absolute_url("/"), "https://escriba.dev");
        assert_eq!(site.absolute_url("//cdn.dev/a.png"), "https://cdn.dev/a.png");
        assert_eq!(site.absolute_url("https://x.dev/a"), "https://x.dev/a");
    }
}
