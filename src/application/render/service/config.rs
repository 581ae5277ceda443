use std::{
    borrow::Cow,
    collections::{HashMap, HashSet},
};

use ammonia::Builder as AmmoniaBuilder;
use comrak::options::{ListStyleType, Options};

/// Allow-listed tags and the attributes each may carry, in addition to
/// [`GENERIC_ATTRIBUTES`]. Anything absent from this table is unwrapped: the
/// element goes, its text stays.
pub(crate) const TAG_POLICY: &[(&str, &[&str])] = &[
    ("h1", &[]),
    ("h2", &[]),
    ("h3", &[]),
    ("h4", &[]),
    ("h5", &[]),
    ("h6", &[]),
    ("p", &[]),
    ("br", &[]),
    ("hr", &[]),
    ("strong", &[]),
    ("b", &[]),
    ("em", &[]),
    ("i", &[]),
    ("u", &[]),
    ("s", &[]),
    ("del", &[]),
    ("ins", &[]),
    ("mark", &[]),
    ("sub", &[]),
    ("sup", &[]),
    ("small", &[]),
    ("abbr", &[]),
    ("kbd", &[]),
    ("ul", &[]),
    ("ol", &[]),
    ("li", &[]),
    ("dl", &[]),
    ("dt", &[]),
    ("dd", &[]),
    ("input", &["checked", "disabled"]),
    ("blockquote", &[]),
    ("code", &[]),
    ("pre", &[]),
    ("a", &["href", "title", "target", "rel"]),
    ("img", &["src", "alt", "title", "width", "height"]),
    ("table", &[]),
    ("thead", &[]),
    ("tbody", &[]),
    ("tfoot", &[]),
    ("tr", &[]),
    ("th", &[]),
    ("td", &[]),
    ("caption", &[]),
    ("div", &[]),
    ("span", &[]),
    ("section", &[]),
    ("figure", &[]),
    ("figcaption", &[]),
];

pub(crate) const GENERIC_ATTRIBUTES: &[&str] = &["class", "id"];

pub(crate) const URL_SCHEMES: &[&str] = &["http", "https", "mailto"];

/// Scheme additionally accepted on `img[src]` for inline images.
const INLINE_IMAGE_PREFIX: &str = "data:image/";

pub(crate) fn default_options() -> Options<'static> {
    let mut options = Options::default();
    configure_extensions(&mut options);
    options
}

pub(crate) fn build_sanitizer() -> AmmoniaBuilder<'static> {
    let mut builder = AmmoniaBuilder::default();

    let tags: HashSet<&'static str> = TAG_POLICY.iter().map(|(tag, _)| *tag).collect();
    builder.tags(tags);

    let tag_attributes: HashMap<&'static str, HashSet<&'static str>> = TAG_POLICY
        .iter()
        .filter(|(_, attributes)| !attributes.is_empty())
        .map(|(tag, attributes)| (*tag, attributes.iter().copied().collect()))
        .collect();
    builder.tag_attributes(tag_attributes);

    builder.generic_attributes(GENERIC_ATTRIBUTES.iter().copied().collect());

    // Task list items are the only inputs the renderer emits.
    builder.set_tag_attribute_value("input", "type", "checkbox");
    builder.set_tag_attribute_value("input", "disabled", "");

    // `rel` is author-controlled; external links are hardened by the rewrite rules.
    builder.link_rel(None);

    let mut schemes: HashSet<&'static str> = URL_SCHEMES.iter().copied().collect();
    schemes.insert("data");
    builder.url_schemes(schemes);

    builder.attribute_filter(|element, attribute, value| {
        let is_url_attribute =
            attribute.eq_ignore_ascii_case("href") || attribute.eq_ignore_ascii_case("src");
        if is_url_attribute && is_data_url(value) && !is_inline_image(element, attribute, value) {
            None
        } else {
            Some(Cow::Borrowed(value))
        }
    });

    builder
}

fn is_data_url(value: &str) -> bool {
    value
        .trim_start()
        .get(..5)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("data:"))
}

fn is_inline_image(element: &str, attribute: &str, value: &str) -> bool {
    element.eq_ignore_ascii_case("img")
        && attribute.eq_ignore_ascii_case("src")
        && value
            .trim_start()
            .get(..INLINE_IMAGE_PREFIX.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(INLINE_IMAGE_PREFIX))
}

fn configure_extensions(options: &mut Options<'static>) {
    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.tagfilter = false;
    ext.table = true;
    ext.autolink = true;
    ext.tasklist = true;
    ext.superscript = false;
    ext.footnotes = true;
    ext.description_lists = true;

    let render = &mut options.render;
    render.github_pre_lang = true;
    render.list_style = ListStyleType::Dash;
    // Raw HTML must survive conversion; the sanitizer runs right after.
    render.r#unsafe = true;
    render.sourcepos = false;
}
