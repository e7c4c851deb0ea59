//! Post text rendering
//!
//! Raw post text carries service short-links (`https://t.co/...`) and
//! attachment references. Rendering happens once, at reconciliation
//! time: the trailing short-link is stripped, photo attachments become
//! inline images and remaining short-links become anchors.

use lazy_static::lazy_static;
use regex::Regex;

use crate::search::{ApiPost, Includes};

lazy_static! {
    /// Short-link at the very end of the text, with its leading space
    static ref TRAILING_SHORT_LINK: Regex =
        Regex::new(r"( )?https://t\.co/[a-zA-Z0-9]+$").unwrap();
    /// Any short-link
    static ref SHORT_LINK: Regex = Regex::new(r"https://t\.co/[a-zA-Z0-9]+").unwrap();
}

/// Render a post's text to HTML
///
/// Photo attachments are resolved through `includes`; media without a
/// URL or of another kind is skipped. The trailing short-link points
/// at the attachments, so it is only dropped when image markup
/// actually replaces it; otherwise it stays and becomes an anchor.
pub fn render_content(post: &ApiPost, includes: &Includes) -> String {
    let mut images = String::new();
    for media_key in post.media_keys() {
        let Some(media) = includes.media(media_key) else {
            continue;
        };
        if !media.is_photo() {
            continue;
        }
        let Some(url) = &media.url else {
            continue;
        };

        images.push_str(&format!(
            "\n<img src=\"{}\" alt=\"{}\" style=\"max-height: 200px; max-width: 100%; height: auto\" />",
            html_escape::encode_double_quoted_attribute(url.as_str()),
            html_escape::encode_double_quoted_attribute(media.media_key.as_str()),
        ));
    }

    let mut content = if images.is_empty() {
        post.text.clone()
    } else {
        TRAILING_SHORT_LINK.replace(&post.text, "").into_owned()
    };
    content.push_str(&images);

    SHORT_LINK
        .replace_all(&content, r#"<a href="${0}">${0}</a>"#)
        .into_owned()
}
